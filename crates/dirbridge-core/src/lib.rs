//! # dirbridge-core
//!
//! Shared error handling for the dirbridge directory adapter.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy, stable error codes and log classification

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;

// Re-export commonly used types
pub use error::{Error, Result};
