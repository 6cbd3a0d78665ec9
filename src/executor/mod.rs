//! Descriptor execution engine
//!
//! This module provides the execution layer that takes parsed
//! [`OperationDescriptor`]s and performs the corresponding MongoDB operations.
//! It includes:
//! - The [`QueryExecutor`] seam, with a driver-backed [`MongoExecutor`]
//! - Extended JSON to BSON conversion
//! - A [`ScriptRunner`] collecting per-statement reports
//! - Result types for formatting

use async_trait::async_trait;

use crate::error::Result;
use crate::parser::OperationDescriptor;

pub mod convert;
pub mod mongo;
pub mod result;
pub mod runner;

pub use mongo::MongoExecutor;
pub use result::{ExecutionResult, ExecutionStats, ResultData};
pub use runner::{ScriptRunner, StatementReport, all_succeeded, parse_only};

/// Executes one operation descriptor
///
/// Implemented by [`MongoExecutor`] for a live server; tests substitute an
/// in-memory implementation.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a descriptor
    ///
    /// # Returns
    /// * `Result<ExecutionResult>` - Result data or error
    async fn execute(&self, descriptor: &OperationDescriptor) -> Result<ExecutionResult>;
}
