//! Error handling
//!
//! Defines the error types returned by the storage core.

pub mod types;

pub use types::*;
