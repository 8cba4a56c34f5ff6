//! Utility types shared across the crate.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`BuildSettings`] - Construction and output settings

mod error;
mod settings;

pub use error::*;
pub use settings::*;
