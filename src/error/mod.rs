//! Error handling for query parsing and execution.
//!
//! Errors are split by stage:
//! - `ParseError`: a statement could not be turned into an operation descriptor
//! - `ExecutionError`: a descriptor could not be run against MongoDB
//! - `ConfigError` / `ConnectionError`: ambient setup failures
//!
//! Driver errors are rendered through [`driver::DriverErrorInfo`] so the
//! per-statement error slot carries a short, structured message.
//!
//! # Example
//!
//! ```rust
//! use mongoquery::error::{ParseError, QueryError};
//!
//! let err: QueryError = ParseError::UnsupportedOperation("dropIndex".to_string()).into();
//! assert_eq!(err.to_string(), "Unsupported operation: dropIndex");
//! ```

pub mod driver;
pub mod kinds;

// Re-export commonly used types
pub use driver::DriverErrorInfo;
pub use kinds::{ConfigError, ConnectionError, ExecutionError, ParseError, QueryError, Result};
