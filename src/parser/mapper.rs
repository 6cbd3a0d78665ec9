//! Operation mapping: base call + cursor chain + normalized arguments →
//! [`OperationDescriptor`].
//!
//! Cursor methods never fail a statement. A method that is unknown, does not
//! apply to the operation type, or has an unusable argument is dropped and
//! reported as a [`CursorOptionWarning`].

use std::fmt;

use serde_json::{Value, json};
use tracing::{debug, warn};

use super::base_call::BaseCall;
use super::chain::CursorMethod;
use super::descriptor::{
    CountMode, CursorOperation, OperationDescriptor, OperationType, ProcessingMode,
    QueryOptions, ReadConcernOption,
};
use super::function_literal::extract_function;
use super::normalizer::{ArgumentNormalizer, NormalizedArguments};
use crate::error::ParseError;

/// A cursor method that was ignored while building options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorOptionWarning {
    pub method: String,
    pub reason: String,
}

impl CursorOptionWarning {
    fn new(method: &str, reason: impl Into<String>) -> Self {
        Self {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CursorOptionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}() ignored: {}", self.method, self.reason)
    }
}

/// Operation mapper
pub struct OperationMapper;

impl OperationMapper {
    /// Build the descriptor for one statement, logging ignored cursor methods.
    pub fn map(
        base: &BaseCall,
        cursor_ops: Vec<CursorOperation>,
        args: NormalizedArguments,
    ) -> Result<OperationDescriptor, ParseError> {
        let (descriptor, warnings) = Self::map_with_warnings(base, cursor_ops, args)?;
        for warning in &warnings {
            warn!("{}", warning);
        }
        Ok(descriptor)
    }

    /// Build the descriptor and return the ignored cursor methods alongside it.
    pub fn map_with_warnings(
        base: &BaseCall,
        cursor_ops: Vec<CursorOperation>,
        args: NormalizedArguments,
    ) -> Result<(OperationDescriptor, Vec<CursorOptionWarning>), ParseError> {
        let base_type = OperationType::from_shell_operation(&base.operation)
            .ok_or_else(|| ParseError::UnsupportedOperation(base.operation.clone()))?;

        let (op_type, count_mode) = Self::reclassify(base_type, &cursor_ops);
        if op_type != base_type {
            debug!("Cursor chain turns '{}' into '{}'", base_type, op_type);
        }

        let mut options = QueryOptions {
            many: base.operation.ends_with("Many"),
            count_mode,
            ..Default::default()
        };
        Self::apply_extra_arguments(&mut options, base_type, &args);

        // A client-side count still iterates the find cursor, so find options apply.
        let options_type = if count_mode == Some(CountMode::Client) {
            OperationType::Find
        } else {
            op_type
        };

        let mut warnings = Vec::new();
        for op in &cursor_ops {
            if let Err(warning) =
                Self::apply_cursor_operation(&mut options, base_type, options_type, op)
            {
                warnings.push(warning);
            }
        }

        let descriptor = OperationDescriptor {
            collection: base.collection.clone(),
            op_type,
            data: Self::shape_data(base_type, &args),
            options,
            cursor_operations: cursor_ops,
        };

        Ok((descriptor, warnings))
    }

    /// Shape the argument payload for the operation type
    fn shape_data(op_type: OperationType, args: &NormalizedArguments) -> Value {
        match op_type {
            OperationType::Find
            | OperationType::FindOne
            | OperationType::Count
            | OperationType::Delete => args.get_or(0, json!({})),
            OperationType::Insert => args.get_or(0, Value::Null),
            OperationType::Update => json!({
                "filter": args.get_or(0, json!({})),
                "update": args.get_or(1, json!({"$set": {}})),
            }),
            OperationType::Aggregate => args.get_or(0, json!([])),
            OperationType::Distinct => json!({
                "field": args.get_or(0, json!("")),
                "filter": args.get_or(1, json!({})),
            }),
        }
    }

    /// `find` followed by `count()` / `size()` / `itcount()` becomes a count.
    ///
    /// When several appear, the last one decides.
    fn reclassify(
        base_type: OperationType,
        cursor_ops: &[CursorOperation],
    ) -> (OperationType, Option<CountMode>) {
        if base_type != OperationType::Find {
            return (base_type, None);
        }

        let mode = cursor_ops
            .iter()
            .filter_map(|op| match CursorMethod::from_name(&op.method) {
                Some(CursorMethod::Count) => Some(CountMode::Server),
                Some(CursorMethod::Size) | Some(CursorMethod::Itcount) => Some(CountMode::Client),
                _ => None,
            })
            .last();

        match mode {
            Some(mode) => (OperationType::Count, Some(mode)),
            None => (base_type, None),
        }
    }

    /// Arguments past the ones shaped into `data`: the projection of
    /// find/findOne and the options document of update.
    fn apply_extra_arguments(
        options: &mut QueryOptions,
        op_type: OperationType,
        args: &NormalizedArguments,
    ) {
        match op_type {
            OperationType::Find | OperationType::FindOne => {
                if let Some(projection @ Value::Object(_)) = args.get(1) {
                    options.projection = Some(projection.clone());
                }
            }
            OperationType::Update => {
                if let Some(upsert) = args.get(2).and_then(|opts| opts.get("upsert")) {
                    options.upsert = upsert.as_bool();
                }
            }
            _ => {}
        }
    }

    fn apply_cursor_operation(
        options: &mut QueryOptions,
        base_type: OperationType,
        options_type: OperationType,
        op: &CursorOperation,
    ) -> Result<(), CursorOptionWarning> {
        let method = CursorMethod::from_name(&op.method)
            .ok_or_else(|| CursorOptionWarning::new(&op.method, "unsupported cursor method"))?;

        // count()/size()/itcount() are judged against the call they follow
        let op_type = match method {
            CursorMethod::Count | CursorMethod::Size | CursorMethod::Itcount => base_type,
            _ => options_type,
        };
        if !method.applies_to(op_type) {
            return Err(CursorOptionWarning::new(
                &op.method,
                format!("not applicable to {op_type}"),
            ));
        }

        let args = op.args.as_str();
        let fail = |reason: &str| CursorOptionWarning::new(&op.method, reason);

        match method {
            CursorMethod::Sort => {
                options.sort = Some(Self::object_arg(args).ok_or_else(|| fail("expected an object"))?);
            }
            CursorMethod::Limit => {
                options.limit = Some(Self::integer_arg(args).ok_or_else(|| fail("expected an integer"))?);
            }
            CursorMethod::Skip => {
                let skip = Self::integer_arg(args).ok_or_else(|| fail("expected an integer"))?;
                if skip < 0 {
                    return Err(fail("value must be non-negative"));
                }
                options.skip = Some(skip);
            }
            CursorMethod::Hint => {
                let hint = match ArgumentNormalizer::normalize_first(args) {
                    Ok(Some(value @ (Value::Object(_) | Value::String(_)))) => value,
                    _ => return Err(fail("expected an index specification or name")),
                };
                options.hint = Some(hint);
            }
            CursorMethod::Comment => {
                options.comment = Some(Self::string_arg(args).ok_or_else(|| fail("expected a string"))?);
            }
            CursorMethod::MaxTimeMS => {
                let max_time = Self::integer_arg(args).ok_or_else(|| fail("expected an integer"))?;
                if max_time < 0 {
                    return Err(fail("value must be non-negative"));
                }
                options.max_time_ms = Some(max_time);
            }
            CursorMethod::Collation => {
                options.collation =
                    Some(Self::object_arg(args).ok_or_else(|| fail("expected an object"))?);
            }
            CursorMethod::ReadConcern => {
                let level = Self::string_arg(args).ok_or_else(|| fail("expected a level"))?;
                options.read_concern = Some(ReadConcernOption { level });
            }
            CursorMethod::ReadPref => {
                options.read_preference =
                    Some(Self::string_arg(args).ok_or_else(|| fail("expected a mode"))?);
            }
            CursorMethod::AllowDiskUse => {
                options.allow_disk_use = Some(Self::flag_arg(args).ok_or_else(|| fail("expected a boolean"))?);
            }
            CursorMethod::NoCursorTimeout => {
                options.no_cursor_timeout = Some(Self::flag_arg(args).ok_or_else(|| fail("expected a boolean"))?);
            }
            CursorMethod::ReturnKey => {
                options.return_key = Some(Self::flag_arg(args).ok_or_else(|| fail("expected a boolean"))?);
            }
            CursorMethod::ShowRecordId => {
                options.show_record_id = Some(Self::flag_arg(args).ok_or_else(|| fail("expected a boolean"))?);
            }
            CursorMethod::BatchSize => {
                let batch_size = Self::integer_arg(args).ok_or_else(|| fail("expected an integer"))?;
                if batch_size <= 0 {
                    return Err(fail("value must be positive"));
                }
                options.batch_size = Some(batch_size);
            }
            CursorMethod::Pretty => options.pretty = Some(true),
            CursorMethod::ForEach => {
                let function = extract_function(args).ok_or_else(|| fail("expected a function literal"))?;
                options.for_each = Some(function);
                options.processing_mode = Some(ProcessingMode::ForEach);
            }
            CursorMethod::Map => {
                let function = extract_function(args).ok_or_else(|| fail("expected a function literal"))?;
                options.map = Some(function);
                options.processing_mode = Some(ProcessingMode::Map);
            }
            // consumed by reclassification
            CursorMethod::Count | CursorMethod::Size | CursorMethod::Itcount => {}
            CursorMethod::ToArray => {}
        }

        Ok(())
    }

    fn object_arg(args: &str) -> Option<Value> {
        match ArgumentNormalizer::normalize_first(args) {
            Ok(Some(value @ Value::Object(_))) => Some(value),
            _ => None,
        }
    }

    fn integer_arg(args: &str) -> Option<i64> {
        match ArgumentNormalizer::normalize_first(args).ok()?? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            _ => None,
        }
    }

    /// Boolean flag; an empty argument list means `true`
    fn flag_arg(args: &str) -> Option<bool> {
        if args.trim().is_empty() {
            return Some(true);
        }
        match ArgumentNormalizer::normalize_first(args).ok()?? {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// First argument as a string, quoted or not
    fn string_arg(args: &str) -> Option<String> {
        if let Ok(Some(first)) = ArgumentNormalizer::normalize_first(args) {
            return match first {
                Value::String(s) => Some(s),
                _ => None,
            };
        }

        let raw = args.trim();
        let unquoted = raw
            .strip_prefix(['"', '\''])
            .and_then(|r| r.strip_suffix(['"', '\'']))
            .unwrap_or(raw);
        (!unquoted.is_empty()).then(|| unquoted.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::base_call::BaseCallExtractor;
    use crate::parser::chain::ChainTokenizer;

    fn map(statement: &str) -> (OperationDescriptor, Vec<CursorOptionWarning>) {
        let (base, rest) = BaseCallExtractor::extract(statement).unwrap();
        let chain = ChainTokenizer::tokenize(rest);
        let args = ArgumentNormalizer::normalize(&base.args_text).unwrap();
        OperationMapper::map_with_warnings(&base, chain, args).unwrap()
    }

    #[test]
    fn test_unsupported_operation() {
        let (base, _) = BaseCallExtractor::extract("db.coll.dropIndex({})").unwrap();
        let err = OperationMapper::map(&base, Vec::new(), NormalizedArguments::default())
            .unwrap_err();
        assert_eq!(err, ParseError::UnsupportedOperation("dropIndex".to_string()));
    }

    #[test]
    fn test_find_defaults_to_empty_filter() {
        let (descriptor, warnings) = map("db.users.find()");
        assert_eq!(descriptor.op_type, OperationType::Find);
        assert_eq!(descriptor.data, json!({}));
        assert_eq!(descriptor.options, QueryOptions::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_insert_shapes() {
        let (descriptor, _) = map("db.users.insertMany([{a: 1}, {a: 2}])");
        assert_eq!(descriptor.op_type, OperationType::Insert);
        assert_eq!(descriptor.data, json!([{"a": 1}, {"a": 2}]));
        assert!(descriptor.options.many);

        let (descriptor, _) = map("db.users.insertOne()");
        assert_eq!(descriptor.data, Value::Null);
        assert!(!descriptor.options.many);
    }

    #[test]
    fn test_update_defaults() {
        let (descriptor, _) = map("db.users.updateMany()");
        assert_eq!(descriptor.data, json!({"filter": {}, "update": {"$set": {}}}));
        assert!(descriptor.options.many);
    }

    #[test]
    fn test_update_upsert_option() {
        let (descriptor, _) = map("db.users.updateOne({a: 1}, {$set: {b: 2}}, {upsert: true})");
        assert_eq!(descriptor.options.upsert, Some(true));
    }

    #[test]
    fn test_aggregate_and_distinct_defaults() {
        let (descriptor, _) = map("db.sales.aggregate()");
        assert_eq!(descriptor.data, json!([]));

        let (descriptor, _) = map("db.users.distinct()");
        assert_eq!(descriptor.data, json!({"field": "", "filter": {}}));

        let (descriptor, _) = map("db.users.distinct('city', {active: true})");
        assert_eq!(descriptor.data, json!({"field": "city", "filter": {"active": true}}));
    }

    #[test]
    fn test_find_projection() {
        let (descriptor, _) = map("db.users.find({}, {name: 1, _id: 0})");
        assert_eq!(descriptor.options.projection, Some(json!({"name": 1, "_id": 0})));
    }

    #[test]
    fn test_count_reclassification() {
        let (descriptor, _) = map("db.users.find({active: true}).count()");
        assert_eq!(descriptor.op_type, OperationType::Count);
        assert_eq!(descriptor.options.count_mode, Some(CountMode::Server));
        assert_eq!(descriptor.data, json!({"active": true}));
    }

    #[test]
    fn test_client_count_keeps_find_options() {
        let (descriptor, warnings) = map("db.users.find().limit(3).size()");
        assert_eq!(descriptor.op_type, OperationType::Count);
        assert!(descriptor.is_client_count());
        assert_eq!(descriptor.options.limit, Some(3));
        assert!(warnings.is_empty());

        let (descriptor, _) = map("db.users.find().itcount()");
        assert!(descriptor.is_client_count());
    }

    #[test]
    fn test_server_count_drops_limit() {
        let (descriptor, warnings) = map("db.users.find().limit(3).count()");
        assert_eq!(descriptor.options.limit, None);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].method, "limit");
    }

    #[test]
    fn test_count_on_non_find_is_not_reclassified() {
        let (descriptor, warnings) = map("db.sales.aggregate([]).count()");
        assert_eq!(descriptor.op_type, OperationType::Aggregate);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_all_find_cursor_options() {
        let (descriptor, warnings) = map(
            "db.users.find({}).sort({age: -1}).limit(10).skip(20).hint({age: 1}).comment('audit')\
             .maxTimeMS(500).collation({locale: 'fr'}).readConcern('majority').readPref('secondary')\
             .allowDiskUse().noCursorTimeout(true).returnKey(false).showRecordId().batchSize(50).pretty()",
        );
        assert!(warnings.is_empty(), "{warnings:?}");

        let options = descriptor.options;
        assert_eq!(options.sort, Some(json!({"age": -1})));
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.skip, Some(20));
        assert_eq!(options.hint, Some(json!({"age": 1})));
        assert_eq!(options.comment.as_deref(), Some("audit"));
        assert_eq!(options.max_time_ms, Some(500));
        assert_eq!(options.collation, Some(json!({"locale": "fr"})));
        assert_eq!(
            options.read_concern,
            Some(ReadConcernOption { level: "majority".to_string() })
        );
        assert_eq!(options.read_preference.as_deref(), Some("secondary"));
        assert_eq!(options.allow_disk_use, Some(true));
        assert_eq!(options.no_cursor_timeout, Some(true));
        assert_eq!(options.return_key, Some(false));
        assert_eq!(options.show_record_id, Some(true));
        assert_eq!(options.batch_size, Some(50));
        assert_eq!(options.pretty, Some(true));
    }

    #[test]
    fn test_last_cursor_method_wins() {
        let (descriptor, _) = map("db.users.find().limit(5).limit(7)");
        assert_eq!(descriptor.options.limit, Some(7));
    }

    #[test]
    fn test_inapplicable_methods_are_ignored() {
        let (descriptor, warnings) = map("db.users.findOne({}).batchSize(10).allowDiskUse()");
        assert_eq!(descriptor.options.batch_size, None);
        assert_eq!(descriptor.options.allow_disk_use, None);
        assert_eq!(warnings.len(), 2);

        let (descriptor, warnings) = map("db.users.deleteMany({}).sort({a: 1})");
        assert_eq!(descriptor.options.sort, None);
        assert_eq!(warnings[0].reason, "not applicable to delete");
    }

    #[test]
    fn test_invalid_cursor_arguments_are_ignored() {
        let (descriptor, warnings) = map("db.users.find().limit('ten').skip(-1).sort(1)");
        assert_eq!(descriptor.options.limit, None);
        assert_eq!(descriptor.options.skip, None);
        assert_eq!(descriptor.options.sort, None);
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_unknown_cursor_method_is_ignored() {
        let (descriptor, warnings) = map("db.users.find().explain('executionStats')");
        assert_eq!(descriptor.op_type, OperationType::Find);
        assert_eq!(warnings[0].to_string(), "explain() ignored: unsupported cursor method");
        assert_eq!(descriptor.cursor_operations.len(), 1);
    }

    #[test]
    fn test_hint_accepts_index_name() {
        let (descriptor, _) = map("db.users.countDocuments({}).hint('age_1')");
        assert_eq!(descriptor.options.hint, Some(json!("age_1")));
    }

    #[test]
    fn test_comment_accepts_unquoted_text() {
        let (descriptor, _) = map("db.users.find().comment(nightly report)");
        assert_eq!(descriptor.options.comment.as_deref(), Some("nightly report"));
    }

    #[test]
    fn test_for_each_and_map() {
        let (descriptor, _) = map("db.users.find().forEach(function(doc) { print(doc.name) })");
        let function = descriptor.options.for_each.unwrap();
        assert_eq!(function.param, "doc");
        assert_eq!(function.body, "print(doc.name)");
        assert_eq!(descriptor.options.processing_mode, Some(ProcessingMode::ForEach));

        let (descriptor, _) = map("db.sales.aggregate([]).map(function(d) { return d.total })");
        assert_eq!(descriptor.options.map.unwrap().body, "return d.total");
        assert_eq!(descriptor.options.processing_mode, Some(ProcessingMode::Map));
    }

    #[test]
    fn test_for_each_requires_function() {
        let (descriptor, warnings) = map("db.users.find().forEach(printjson)");
        assert_eq!(descriptor.options.for_each, None);
        assert_eq!(descriptor.options.processing_mode, None);
        assert_eq!(warnings.len(), 1);
    }
}
