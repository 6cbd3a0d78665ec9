//! MongoDB shell-syntax query parser
//!
//! This module turns shell statements such as
//! `db.users.find({ age: { $gt: 18 } }).sort({ age: 1 }).limit(5)` into
//! executor-ready [`OperationDescriptor`]s.
//!
//! # Architecture
//!
//! The parser is split into multiple focused modules:
//! - `splitter`: splits a script into statements on top-level semicolons
//! - `base_call`: extracts `db.<collection>.<operation>(<args>)`
//! - `chain`: tokenizes the cursor methods chained after the base call
//! - `normalizer`: turns loose shell literals into JSON arguments
//! - `function_literal`: reads `forEach` / `map` function literals
//! - `mapper`: builds the descriptor from the pieces above
//! - `descriptor`: the descriptor types and their wire shape
//!
//! # Examples
//!
//! ```
//! use mongoquery::parser::{OperationType, Parser};
//!
//! let descriptor = Parser::parse_statement("db.users.find({ age: { $gt: 18 } }).limit(5)").unwrap();
//! assert_eq!(descriptor.collection, "users");
//! assert_eq!(descriptor.op_type, OperationType::Find);
//! assert_eq!(descriptor.options.limit, Some(5));
//! ```

mod base_call;
mod chain;
mod descriptor;
mod function_literal;
mod mapper;
mod normalizer;
mod scanner;
mod splitter;

// Re-export public API
pub use base_call::{BaseCall, BaseCallExtractor};
pub use chain::{ChainTokenizer, CursorMethod};
pub use descriptor::*;
pub use function_literal::extract_function;
pub use mapper::{CursorOptionWarning, OperationMapper};
pub use normalizer::{ArgumentNormalizer, NormalizedArguments};
pub use splitter::StatementSplitter;

use tracing::debug;

use crate::error::ParseError;

/// Result of parsing one statement of a script
#[derive(Debug, Clone, PartialEq)]
pub struct StatementOutcome {
    /// Statement text as split from the script
    pub statement: String,

    /// Descriptor, or the reason the statement was rejected
    pub result: Result<OperationDescriptor, ParseError>,

    /// Cursor methods that were ignored while building the descriptor
    pub warnings: Vec<CursorOptionWarning>,
}

impl StatementOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Main parser for shell statements
///
/// Parsing is pure and holds no state, so every entry point is an associated
/// function.
pub struct Parser;

impl Parser {
    /// Parse a single statement into an [`OperationDescriptor`].
    ///
    /// A trailing semicolon is accepted. Ignored cursor methods are logged.
    ///
    /// # Examples
    ///
    /// ```
    /// use mongoquery::parser::Parser;
    ///
    /// let descriptor = Parser::parse_statement("db.orders.deleteMany({status: 'void'});").unwrap();
    /// assert!(descriptor.options.many);
    /// ```
    pub fn parse_statement(statement: &str) -> Result<OperationDescriptor, ParseError> {
        let (descriptor, warnings) = Self::parse_with_warnings(statement)?;
        for warning in &warnings {
            tracing::warn!("{}", warning);
        }
        Ok(descriptor)
    }

    /// Parse a single statement, returning ignored cursor methods alongside
    /// the descriptor instead of logging them.
    pub fn parse_with_warnings(
        statement: &str,
    ) -> Result<(OperationDescriptor, Vec<CursorOptionWarning>), ParseError> {
        let trimmed = statement.trim().trim_end_matches(';').trim();
        if trimmed.is_empty() {
            return Err(ParseError::EmptyStatement);
        }

        let (base, remainder) = BaseCallExtractor::extract(trimmed)?;
        let cursor_ops = ChainTokenizer::tokenize(remainder);
        let args = ArgumentNormalizer::normalize(&base.args_text)?;
        debug!(
            "Parsed {} argument(s) and {} cursor method(s) for {}.{}",
            args.len(),
            cursor_ops.len(),
            base.collection,
            base.operation
        );

        OperationMapper::map_with_warnings(&base, cursor_ops, args)
    }

    /// Split a script into statements and parse each one independently.
    ///
    /// A failing statement never prevents the following ones from being
    /// parsed; blank statements are dropped by the splitter.
    ///
    /// # Examples
    ///
    /// ```
    /// use mongoquery::parser::Parser;
    ///
    /// let outcomes = Parser::parse_script("db.logs.find({msg: \"a;b\"}); foo.bar(); db.logs.count({})");
    /// assert_eq!(outcomes.len(), 3);
    /// assert!(outcomes[0].is_success());
    /// assert!(!outcomes[1].is_success());
    /// assert!(outcomes[2].is_success());
    /// ```
    pub fn parse_script(script: &str) -> Vec<StatementOutcome> {
        StatementSplitter::split(script)
            .into_iter()
            .map(|statement| {
                let (result, warnings) = match Self::parse_with_warnings(&statement) {
                    Ok((descriptor, warnings)) => (Ok(descriptor), warnings),
                    Err(e) => {
                        debug!("Statement rejected: {}", e);
                        (Err(e), Vec::new())
                    }
                };
                StatementOutcome {
                    statement,
                    result,
                    warnings,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_find_empty() {
        let descriptor = Parser::parse_statement("db.users.find()").unwrap();
        assert_eq!(descriptor.collection, "users");
        assert_eq!(descriptor.op_type, OperationType::Find);
        assert_eq!(descriptor.data, json!({}));
    }

    #[test]
    fn test_parse_find_with_filter() {
        let descriptor = Parser::parse_statement("db.users.find({name:\"John\"})").unwrap();
        assert_eq!(
            descriptor.to_json().unwrap(),
            json!({
                "collection": "users",
                "type": "find",
                "data": {"name": "John"},
                "options": {},
                "cursorOperations": []
            })
        );
    }

    #[test]
    fn test_parse_find_with_operators() {
        let descriptor =
            Parser::parse_statement("db.users.find({age:{$gt:20}}).sort({age:1}).limit(5)")
                .unwrap();
        assert_eq!(descriptor.data, json!({"age": {"$gt": 20}}));
        assert_eq!(descriptor.options.sort, Some(json!({"age": 1})));
        assert_eq!(descriptor.options.limit, Some(5));
        assert_eq!(descriptor.cursor_operations.len(), 2);
    }

    #[test]
    fn test_parse_update_one() {
        let descriptor = Parser::parse_statement(
            "db.orders.updateOne({_id: ObjectId(\"507f1f77bcf86cd799439011\")}, {$set:{status:\"shipped\"}})",
        )
        .unwrap();
        assert_eq!(descriptor.op_type, OperationType::Update);
        assert!(!descriptor.options.many);
        assert_eq!(
            descriptor.data,
            json!({
                "filter": {"_id": {"$oid": "507f1f77bcf86cd799439011"}},
                "update": {"$set": {"status": "shipped"}}
            })
        );
    }

    #[test]
    fn test_parse_aggregate_with_date() {
        let descriptor = Parser::parse_statement(
            "db.sales.aggregate([{$match:{date:{$gte: new Date(\"2025-01-01\")}}}])",
        )
        .unwrap();
        assert_eq!(descriptor.op_type, OperationType::Aggregate);
        assert_eq!(
            descriptor.data[0]["$match"]["date"]["$gte"],
            json!({"$date": "2025-01-01"})
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Parser::parse_statement("foo.bar()"),
            Err(ParseError::InvalidFormat)
        );
        assert_eq!(
            Parser::parse_statement("db.coll.dropIndex({})"),
            Err(ParseError::UnsupportedOperation("dropIndex".to_string()))
        );
        assert!(matches!(
            Parser::parse_statement("db.users.find({name: })"),
            Err(ParseError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(Parser::parse_statement(""), Err(ParseError::EmptyStatement));
        assert_eq!(Parser::parse_statement("  ;  "), Err(ParseError::EmptyStatement));
    }

    #[test]
    fn test_parse_with_semicolon() {
        let descriptor = Parser::parse_statement("db.users.find();").unwrap();
        assert_eq!(descriptor.op_type, OperationType::Find);
    }

    #[test]
    fn test_parse_reports_warnings() {
        let (descriptor, warnings) =
            Parser::parse_with_warnings("db.users.insertOne({a: 1}).limit(1)").unwrap();
        assert_eq!(descriptor.options.limit, None);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_parse_script_continues_after_failure() {
        let outcomes = Parser::parse_script(
            "db.logs.find({msg:\"a;b\"}); db.logs.dropIndex({}); db.logs.count({})",
        );
        assert_eq!(outcomes.len(), 3);

        if let Ok(descriptor) = &outcomes[0].result {
            assert_eq!(descriptor.data, json!({"msg": "a;b"}));
        } else {
            panic!("Expected first statement to parse");
        }
        assert!(matches!(
            outcomes[1].result,
            Err(ParseError::UnsupportedOperation(_))
        ));
        assert_eq!(outcomes[2].statement, "db.logs.count({})");
        assert!(outcomes[2].is_success());
    }

    #[test]
    fn test_parse_script_empty() {
        assert!(Parser::parse_script("").is_empty());
        assert!(Parser::parse_script(" ;; ").is_empty());
    }
}
