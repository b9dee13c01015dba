//! Shared data model for codexec: requests, test cases, the per-case result
//! protocol and the error taxonomy.

pub mod error;
pub mod types;

pub use error::{ExecutorError, Result};
