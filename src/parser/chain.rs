//! Cursor chain handling
//!
//! This module tokenizes the chained method calls following a base call:
//! - `db.collection.find().sort({ a: 1 }).limit(10)`
//! - `db.collection.aggregate([...]).batchSize(100)`
//! - `db.collection.find().forEach(function(doc) { print(doc) })`
//!
//! Tokenizing keeps the raw argument text; interpretation happens in the
//! mapper through the closed [`CursorMethod`] set.

use tracing::warn;

use super::descriptor::{CursorOperation, OperationType};
use super::scanner::{find_closing, read_identifier, skip_whitespace};

/// Known cursor methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorMethod {
    Sort,
    Limit,
    Skip,
    Hint,
    Comment,
    MaxTimeMS,
    Collation,
    ReadConcern,
    ReadPref,
    AllowDiskUse,
    NoCursorTimeout,
    ReturnKey,
    ShowRecordId,
    BatchSize,
    Pretty,
    ForEach,
    Map,
    Count,
    Size,
    Itcount,
    ToArray,
}

impl CursorMethod {
    /// Resolve a chained method name (case-sensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let method = match name {
            "sort" => CursorMethod::Sort,
            "limit" => CursorMethod::Limit,
            "skip" => CursorMethod::Skip,
            "hint" => CursorMethod::Hint,
            "comment" => CursorMethod::Comment,
            "maxTimeMS" => CursorMethod::MaxTimeMS,
            "collation" => CursorMethod::Collation,
            "readConcern" => CursorMethod::ReadConcern,
            "readPref" => CursorMethod::ReadPref,
            "allowDiskUse" => CursorMethod::AllowDiskUse,
            "noCursorTimeout" => CursorMethod::NoCursorTimeout,
            "returnKey" => CursorMethod::ReturnKey,
            "showRecordId" => CursorMethod::ShowRecordId,
            "batchSize" => CursorMethod::BatchSize,
            "pretty" => CursorMethod::Pretty,
            "forEach" => CursorMethod::ForEach,
            "map" => CursorMethod::Map,
            "count" => CursorMethod::Count,
            "size" => CursorMethod::Size,
            "itcount" => CursorMethod::Itcount,
            "toArray" => CursorMethod::ToArray,
            _ => return None,
        };
        Some(method)
    }

    /// Whether this method has an effect on an operation of type `op_type`
    pub fn applies_to(&self, op_type: OperationType) -> bool {
        use OperationType::*;

        match self {
            CursorMethod::Sort | CursorMethod::Limit | CursorMethod::Skip => {
                matches!(op_type, Find | FindOne | Aggregate)
            }
            CursorMethod::Hint
            | CursorMethod::Comment
            | CursorMethod::MaxTimeMS
            | CursorMethod::Collation
            | CursorMethod::ReadConcern
            | CursorMethod::ReadPref => matches!(op_type, Find | FindOne | Aggregate | Count),
            CursorMethod::AllowDiskUse
            | CursorMethod::NoCursorTimeout
            | CursorMethod::ReturnKey
            | CursorMethod::ShowRecordId
            | CursorMethod::BatchSize
            | CursorMethod::ForEach
            | CursorMethod::Map => matches!(op_type, Find | Aggregate),
            CursorMethod::Count | CursorMethod::Size | CursorMethod::Itcount => op_type == Find,
            CursorMethod::Pretty | CursorMethod::ToArray => true,
        }
    }
}

/// Cursor chain tokenizer
pub struct ChainTokenizer;

impl ChainTokenizer {
    /// Tokenize the text following a base call into cursor operations.
    ///
    /// Repeatedly reads `.identifier(` and the argument text up to the
    /// matching `)`, and stops as soon as the remaining text no longer starts
    /// with such a call.
    pub fn tokenize(remainder: &str) -> Vec<CursorOperation> {
        let mut operations = Vec::new();
        let mut pos = skip_whitespace(remainder, 0);

        while remainder[pos..].starts_with('.') {
            let name_start = skip_whitespace(remainder, pos + 1);
            let Some((name, after_name)) = read_identifier(remainder, name_start) else {
                break;
            };

            let open = skip_whitespace(remainder, after_name);
            if !remainder[open..].starts_with('(') {
                break;
            }

            let Some(close) = find_closing(remainder, open, '(', ')') else {
                warn!("Unbalanced parentheses in cursor method '{}'", name);
                break;
            };

            operations.push(CursorOperation::new(
                name,
                remainder[open + 1..close].trim(),
            ));
            pos = skip_whitespace(remainder, close + 1);
        }

        if pos < remainder.len() {
            warn!("Ignoring text after cursor chain: '{}'", &remainder[pos..]);
        }

        operations
    }
}
