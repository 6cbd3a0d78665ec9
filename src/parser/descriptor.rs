//! Operation descriptor types
//!
//! This module defines the executor-ready output of the parser. Every type
//! serializes to the wire shape consumed by query executors:
//!
//! ```text
//! { collection, type, data, options: { ... }, cursorOperations: [{ method, args }] }
//! ```
//!
//! Only options relevant to the operation type are populated; absent options
//! are omitted from the serialized form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `$date` text standing for the current time, from `new Date()` / `ISODate()`
pub const CURRENT_DATE: &str = "now";

/// API-level operation type
///
/// Shell methods collapse onto these: `insertOne`/`insertMany` become
/// `Insert`, `countDocuments`/`count` become `Count`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationType {
    Find,
    FindOne,
    Insert,
    Update,
    Delete,
    Count,
    Aggregate,
    Distinct,
}

impl OperationType {
    /// Map a shell method name onto its API type.
    ///
    /// Matching is case-sensitive; `None` means the operation is unsupported.
    pub fn from_shell_operation(operation: &str) -> Option<Self> {
        let op_type = match operation {
            "find" => OperationType::Find,
            "findOne" => OperationType::FindOne,
            "insertOne" | "insertMany" => OperationType::Insert,
            "updateOne" | "updateMany" => OperationType::Update,
            "deleteOne" | "deleteMany" => OperationType::Delete,
            "countDocuments" | "count" => OperationType::Count,
            "aggregate" => OperationType::Aggregate,
            "distinct" => OperationType::Distinct,
            _ => return None,
        };
        Some(op_type)
    }

    /// Name as it appears in the serialized descriptor
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Find => "find",
            OperationType::FindOne => "findOne",
            OperationType::Insert => "insert",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
            OperationType::Count => "count",
            OperationType::Aggregate => "aggregate",
            OperationType::Distinct => "distinct",
        }
    }

    /// Whether the operation only reads data
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            OperationType::Find
                | OperationType::FindOne
                | OperationType::Count
                | OperationType::Aggregate
                | OperationType::Distinct
        )
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a count is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CountMode {
    /// `find(...).count()`: counted by the server
    Server,

    /// `find(...).size()` / `find(...).itcount()`: the find cursor is iterated
    /// and counted by the client, so cursor options like limit still apply
    Client,
}

/// Client-side post-processing requested by `forEach` / `map`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessingMode {
    ForEach,
    Map,
}

/// `readConcern("level")` option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadConcernOption {
    pub level: String,
}

/// A `function(param) { body }` literal passed to `forEach` / `map`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorFunction {
    pub param: String,
    pub body: String,
}

/// Options collected from the cursor chain and the shell method name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(rename = "maxTimeMS", skip_serializing_if = "Option::is_none")]
    pub max_time_ms: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_disk_use: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_concern: Option<ReadConcernOption>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_preference: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_cursor_timeout: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_key: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_record_id: Option<bool>,

    /// Set when the shell method name ends in `Many`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub many: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_each: Option<CursorFunction>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<CursorFunction>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_mode: Option<ProcessingMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_mode: Option<CountMode>,

    /// Second argument of `find` / `findOne`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Value>,

    /// `upsert` from the third argument of `updateOne` / `updateMany`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsert: Option<bool>,
}

/// One `.method(args)` suffix of a statement, kept verbatim for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorOperation {
    pub method: String,
    pub args: String,
}

impl CursorOperation {
    pub fn new(method: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args: args.into(),
        }
    }
}

/// Executor-ready representation of one parsed statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    pub collection: String,

    #[serde(rename = "type")]
    pub op_type: OperationType,

    pub data: Value,

    pub options: QueryOptions,

    pub cursor_operations: Vec<CursorOperation>,
}

impl OperationDescriptor {
    /// Serialize to a JSON value in the executor wire shape
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Whether the descriptor is a count evaluated client-side
    pub fn is_client_count(&self) -> bool {
        self.op_type == OperationType::Count && self.options.count_mode == Some(CountMode::Client)
    }
}
