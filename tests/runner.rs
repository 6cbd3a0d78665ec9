//! Script execution through a stand-in executor

use async_trait::async_trait;
use mongodb::bson::doc;
use mongoquery::error::{ExecutionError, Result};
use mongoquery::executor::{
    ExecutionResult, ExecutionStats, QueryExecutor, ResultData, ScriptRunner, all_succeeded,
};
use mongoquery::formatter::Formatter;
use mongoquery::parser::{OperationDescriptor, OperationType};
use serde_json::json;

/// Answers finds with one document and rejects writes
struct ReadOnlyExecutor;

#[async_trait]
impl QueryExecutor for ReadOnlyExecutor {
    async fn execute(&self, descriptor: &OperationDescriptor) -> Result<ExecutionResult> {
        if !descriptor.op_type.is_read() {
            return Err(ExecutionError::InvalidPayload("writes are disabled".to_string()).into());
        }
        let data = match descriptor.op_type {
            OperationType::Count => ResultData::Count(1),
            _ => ResultData::Documents(vec![doc! { "collection": descriptor.collection.as_str() }]),
        };
        Ok(ExecutionResult::success(data, ExecutionStats::default()))
    }
}

#[tokio::test]
async fn test_mixed_script_reports() {
    let runner = ScriptRunner::new(&ReadOnlyExecutor);
    let reports = runner
        .run("db.users.find(); db.users.deleteMany({}); db.users.find().count(); not a statement")
        .await;

    assert_eq!(reports.len(), 4);
    assert!(!all_succeeded(&reports));

    let successes: Vec<bool> = reports.iter().map(|r| r.success).collect();
    assert_eq!(successes, [true, false, true, false]);

    assert_eq!(reports[0].to_json()["result"], json!([{"collection": "users"}]));
    assert_eq!(reports[2].to_json()["result"], json!(1));
    assert_eq!(
        reports[1].error.as_deref(),
        Some("Execution error: Invalid payload: writes are disabled")
    );
}

#[tokio::test]
async fn test_formatted_output() {
    let runner = ScriptRunner::new(&ReadOnlyExecutor);
    let reports = runner.run("db.items.find()").await;

    let output = Formatter::new(false, false, 2).format_reports(&reports).unwrap();
    assert_eq!(
        output,
        r#"{"statement":"db.items.find()","success":true,"result":[{"collection":"items"}]}"#
    );
}
