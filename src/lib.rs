//! MongoDB shell-syntax query library
//!
//! This library turns MongoDB shell statements into executor-ready operation
//! descriptors and runs them against a MongoDB server.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `connection`: MongoDB connection management
//! - `error`: Error types and handling
//! - `executor`: Descriptor execution engine
//! - `formatter`: Output formatting and display
//! - `parser`: Statement splitting, normalization and mapping
//!
//! # Example
//!
//! ```
//! use mongoquery::parser::{OperationType, Parser};
//!
//! let outcomes = Parser::parse_script(
//!     "db.orders.find({status: 'A'}).sort({total: -1}); db.orders.countDocuments({})",
//! );
//! assert_eq!(outcomes.len(), 2);
//!
//! let first = outcomes[0].result.as_ref().unwrap();
//! assert_eq!(first.op_type, OperationType::Find);
//! assert_eq!(first.options.sort, Some(serde_json::json!({"total": -1})));
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod parser;

// Re-export commonly used types
pub use config::Config;
pub use connection::ConnectionManager;
pub use error::{QueryError, Result};
pub use executor::{ExecutionResult, MongoExecutor, QueryExecutor, ScriptRunner};
pub use formatter::Formatter;
pub use parser::{OperationDescriptor, Parser};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
