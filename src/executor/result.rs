//! Execution result types
//!
//! This module defines the data structures for representing execution results:
//! - ExecutionResult: Overall result of executing one descriptor
//! - ResultData: Various types of data that can be returned
//! - ExecutionStats: Statistics about the execution

use mongodb::bson::{Bson, Document};
use serde_json::{Value, json};

use crate::parser::ProcessingMode;

/// Result of descriptor execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Success status
    pub success: bool,

    /// Result data (documents, counts, write summaries)
    pub data: ResultData,

    /// Execution statistics
    pub stats: ExecutionStats,

    /// Client-side processing requested by `forEach` / `map`.
    ///
    /// The function body is not evaluated; the documents are returned as is.
    pub processing_mode: Option<ProcessingMode>,

    /// Error message if failed
    pub error: Option<String>,
}

/// Data returned from descriptor execution
#[derive(Debug, Clone, PartialEq)]
pub enum ResultData {
    /// List of documents
    Documents(Vec<Document>),

    /// Single document
    Document(Document),

    /// Insert one result
    InsertOne { inserted_id: Bson },

    /// Insert many result, ids in insertion order
    InsertMany { inserted_ids: Vec<Bson> },

    /// Update result
    Update {
        matched: u64,
        modified: u64,
        upserted_id: Option<Bson>,
    },

    /// Delete result
    Delete { deleted: u64 },

    /// Count result
    Count(u64),

    /// Distinct values
    Values(Vec<Bson>),

    /// No data
    None,
}

/// Execution statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Execution time in milliseconds
    pub execution_time_ms: u64,

    /// Number of documents returned
    pub documents_returned: usize,

    /// Number of documents affected
    pub documents_affected: Option<u64>,
}

impl ExecutionResult {
    /// Create a successful result
    pub fn success(data: ResultData, stats: ExecutionStats) -> Self {
        Self {
            success: true,
            data,
            stats,
            processing_mode: None,
            error: None,
        }
    }

    /// Create a failed result
    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: ResultData::None,
            stats: ExecutionStats::default(),
            processing_mode: None,
            error: Some(error),
        }
    }

    /// Render the result as relaxed extended JSON
    pub fn to_json(&self) -> Value {
        let mut value = self.data.to_json();
        if let (Some(mode), Value::Array(docs)) = (self.processing_mode, &value) {
            let mode = match mode {
                ProcessingMode::ForEach => "forEach",
                ProcessingMode::Map => "map",
            };
            value = json!({ "processingMode": mode, "documents": docs });
        }
        value
    }
}

impl ResultData {
    /// Render the data as relaxed extended JSON
    pub fn to_json(&self) -> Value {
        match self {
            ResultData::Documents(docs) => Value::Array(
                docs.iter()
                    .map(|doc| Bson::Document(doc.clone()).into_relaxed_extjson())
                    .collect(),
            ),
            ResultData::Document(doc) => Bson::Document(doc.clone()).into_relaxed_extjson(),
            ResultData::InsertOne { inserted_id } => json!({
                "acknowledged": true,
                "insertedId": inserted_id.clone().into_relaxed_extjson(),
            }),
            ResultData::InsertMany { inserted_ids } => json!({
                "acknowledged": true,
                "insertedIds": inserted_ids
                    .iter()
                    .map(|id| id.clone().into_relaxed_extjson())
                    .collect::<Vec<_>>(),
            }),
            ResultData::Update {
                matched,
                modified,
                upserted_id,
            } => {
                let mut value = json!({
                    "acknowledged": true,
                    "matchedCount": matched,
                    "modifiedCount": modified,
                });
                if let Some(id) = upserted_id {
                    value["upsertedId"] = id.clone().into_relaxed_extjson();
                }
                value
            }
            ResultData::Delete { deleted } => json!({
                "acknowledged": true,
                "deletedCount": deleted,
            }),
            ResultData::Count(n) => json!(n),
            ResultData::Values(values) => Value::Array(
                values
                    .iter()
                    .map(|v| v.clone().into_relaxed_extjson())
                    .collect(),
            ),
            ResultData::None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId};

    #[test]
    fn test_documents_to_json() {
        let data = ResultData::Documents(vec![doc! { "name": "Alice", "age": 30 }]);
        assert_eq!(data.to_json(), json!([{"name": "Alice", "age": 30}]));
    }

    #[test]
    fn test_object_id_uses_extended_json() {
        let oid = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let data = ResultData::InsertOne {
            inserted_id: Bson::ObjectId(oid),
        };
        assert_eq!(
            data.to_json(),
            json!({"acknowledged": true, "insertedId": {"$oid": "507f1f77bcf86cd799439011"}})
        );
    }

    #[test]
    fn test_update_summary() {
        let data = ResultData::Update {
            matched: 2,
            modified: 1,
            upserted_id: None,
        };
        assert_eq!(
            data.to_json(),
            json!({"acknowledged": true, "matchedCount": 2, "modifiedCount": 1})
        );
    }

    #[test]
    fn test_scalar_results() {
        assert_eq!(ResultData::Count(7).to_json(), json!(7));
        assert_eq!(
            ResultData::Values(vec![Bson::String("NYC".into()), Bson::Int32(3)]).to_json(),
            json!(["NYC", 3])
        );
        assert_eq!(ResultData::None.to_json(), Value::Null);
    }

    #[test]
    fn test_processing_mode_is_reported() {
        let mut result = ExecutionResult::success(
            ResultData::Documents(vec![doc! { "a": 1 }]),
            ExecutionStats::default(),
        );
        result.processing_mode = Some(ProcessingMode::Map);
        assert_eq!(
            result.to_json(),
            json!({"processingMode": "map", "documents": [{"a": 1}]})
        );
    }

    #[test]
    fn test_error_result() {
        let result = ExecutionResult::error("boom".to_string());
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.data, ResultData::None);
    }
}
