//! Sequential script execution
//!
//! Each statement is parsed and executed on its own; a statement that fails
//! to parse or execute is reported and the next one runs anyway.

use serde_json::{Value, json};
use tracing::{debug, warn};

use super::QueryExecutor;
use super::result::ExecutionResult;
use crate::parser::{OperationDescriptor, Parser, StatementOutcome};

/// Outcome of one statement of a script
#[derive(Debug, Clone, PartialEq)]
pub struct StatementReport {
    /// Statement text
    pub statement: String,

    /// Whether the statement parsed and executed
    pub success: bool,

    /// Parsed descriptor, if parsing succeeded
    pub descriptor: Option<OperationDescriptor>,

    /// Execution result, if execution succeeded
    pub result: Option<ExecutionResult>,

    /// Parse or execution error message
    pub error: Option<String>,

    /// Ignored cursor methods
    pub warnings: Vec<String>,
}

impl StatementReport {
    /// Report for a statement that was parsed but not executed
    pub fn from_outcome(outcome: StatementOutcome) -> Self {
        let warnings = outcome.warnings.iter().map(ToString::to_string).collect();
        match outcome.result {
            Ok(descriptor) => Self {
                statement: outcome.statement,
                success: true,
                descriptor: Some(descriptor),
                result: None,
                error: None,
                warnings,
            },
            Err(e) => Self {
                statement: outcome.statement,
                success: false,
                descriptor: None,
                result: None,
                error: Some(e.to_string()),
                warnings,
            },
        }
    }

    /// Render the report as JSON
    ///
    /// Carries the descriptor when nothing was executed, the execution result
    /// otherwise.
    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "statement": self.statement,
            "success": self.success,
        });

        if let Some(result) = &self.result {
            value["result"] = result.to_json();
        } else if let Some(descriptor) = &self.descriptor {
            value["descriptor"] = descriptor.to_json().unwrap_or(Value::Null);
        }
        if let Some(error) = &self.error {
            value["error"] = json!(error);
        }
        if !self.warnings.is_empty() {
            value["warnings"] = json!(self.warnings);
        }

        value
    }
}

/// Runs every statement of a script through a [`QueryExecutor`]
pub struct ScriptRunner<'a, E: QueryExecutor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: QueryExecutor + ?Sized> ScriptRunner<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// Parse and execute every statement in order
    pub async fn run(&self, script: &str) -> Vec<StatementReport> {
        let mut reports = Vec::new();

        for outcome in Parser::parse_script(script) {
            let mut report = StatementReport::from_outcome(outcome);

            if let Some(descriptor) = &report.descriptor {
                debug!("Executing statement: {}", report.statement);
                match self.executor.execute(descriptor).await {
                    Ok(result) => report.result = Some(result),
                    Err(e) => {
                        warn!("Statement failed: {}", e);
                        report.success = false;
                        report.error = Some(e.to_string());
                    }
                }
            }

            reports.push(report);
        }

        reports
    }
}

/// Parse every statement without executing anything
pub fn parse_only(script: &str) -> Vec<StatementReport> {
    Parser::parse_script(script)
        .into_iter()
        .map(StatementReport::from_outcome)
        .collect()
}

/// Whether every statement of a run succeeded
pub fn all_succeeded(reports: &[StatementReport]) -> bool {
    reports.iter().all(|report| report.success)
}
