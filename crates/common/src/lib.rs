//! Shared error taxonomy and small utilities used across every `conflux-*` crate.

pub mod error;

pub use error::{Error, ErrorCode, Result};
