//! Loose-JSON argument normalizer
//!
//! Shell arguments are JavaScript object literals, not JSON. This module turns
//! argument text into JSON values in six ordered steps:
//!
//! 1. `ObjectId("…")` becomes `{"$oid":"…"}`
//! 2. `ISODate("…")` and `new Date("…")` become `{"$date":"…"}`
//! 3. bare object keys are quoted and single-quoted strings are re-quoted
//! 4. date-like string literals are swapped for placeholder tokens
//! 5. the text is wrapped in `[ … ]` and parsed as JSON
//! 6. placeholder tokens are swapped back for the original date text
//!
//! Step 3 is a string-aware scan, so text inside string values is never
//! rewritten.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use super::descriptor::CURRENT_DATE;
use super::scanner::{is_ident_start, is_quote, read_identifier, skip_whitespace};
use crate::error::ParseError;

const PLACEHOLDER_PREFIX: &str = "__DATE_PLACEHOLDER_";
const PLACEHOLDER_SUFFIX: &str = "__";

static OBJECT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\bnew\s+)?\bObjectId\(\s*(?:"([^"]*)"|'([^']*)')\s*\)"#)
        .expect("valid ObjectId pattern")
});

static DATE_CONSTRUCTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:(?:\bnew\s+)?\bISODate|\bnew\s+Date)\(\s*(?:"([^"]*)"|'([^']*)')?\s*\)"#)
        .expect("valid date constructor pattern")
});

/// Date string literals whose delimiters are ambiguous to later passes:
/// slash dates (year first and year last), space-separated date and time,
/// and ISO datetimes.
static DATE_LITERALS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"["']\d{4}/\d{1,2}/\d{1,2}(?:[ T]\d{1,2}:\d{2}(?::\d{2})?)?["']"#,
        r#"["']\d{1,2}/\d{1,2}/\d{4}(?:[ T]\d{1,2}:\d{2}(?::\d{2})?)?["']"#,
        r#"["']\d{4}-\d{2}-\d{2} \d{1,2}:\d{2}(?::\d{2}(?:\.\d+)?)?["']"#,
        r#"["']\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?["']"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid date literal pattern"))
    .collect()
});

/// Ordered top-level arguments of a call after normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedArguments(Vec<Value>);

impl NormalizedArguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Argument at `index`, if present
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Argument at `index`, or `default` when absent
    pub fn get_or(&self, index: usize, default: Value) -> Value {
        self.0.get(index).cloned().unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

/// Date literals swapped out during step 4, indexed by placeholder number
#[derive(Debug, Default)]
struct ProtectedDates {
    originals: Vec<String>,
}

impl ProtectedDates {
    fn placeholder(index: usize) -> String {
        format!("{PLACEHOLDER_PREFIX}{index}{PLACEHOLDER_SUFFIX}")
    }

    fn lookup(&self, candidate: &str) -> Option<&str> {
        let index = candidate
            .strip_prefix(PLACEHOLDER_PREFIX)?
            .strip_suffix(PLACEHOLDER_SUFFIX)?
            .parse::<usize>()
            .ok()?;
        self.originals.get(index).map(String::as_str)
    }
}

/// Loose-JSON argument normalizer
pub struct ArgumentNormalizer;

impl ArgumentNormalizer {
    /// Normalize argument text into its ordered top-level values.
    ///
    /// # Examples
    ///
    /// ```
    /// use mongoquery::parser::ArgumentNormalizer;
    /// use serde_json::json;
    ///
    /// let args = ArgumentNormalizer::normalize(r#"{_id: ObjectId("507f1f77bcf86cd799439011")}, {$set: {a: 1}}"#).unwrap();
    /// assert_eq!(args.get(0), Some(&json!({"_id": {"$oid": "507f1f77bcf86cd799439011"}})));
    /// assert_eq!(args.get(1), Some(&json!({"$set": {"a": 1}})));
    /// ```
    pub fn normalize(args_text: &str) -> Result<NormalizedArguments, ParseError> {
        let text = Self::rewrite_object_ids(args_text);
        let text = Self::rewrite_date_constructors(&text);
        let text = Self::quote_bare_keys(&text);
        let (text, dates) = Self::protect_date_literals(&text);

        debug!("Normalized argument text: [{}]", text);

        let parsed: Value = serde_json::from_str(&format!("[{text}]"))
            .map_err(|e| ParseError::InvalidArguments(e.to_string()))?;

        let mut values = match parsed {
            Value::Array(values) => values,
            other => vec![other],
        };
        for value in &mut values {
            Self::restore_date_literals(value, &dates);
        }

        Ok(NormalizedArguments::new(values))
    }

    /// Normalize and return only the first argument
    pub fn normalize_first(args_text: &str) -> Result<Option<Value>, ParseError> {
        Ok(Self::normalize(args_text)?.into_inner().into_iter().next())
    }

    /// Step 1: `ObjectId("x")` → `{"$oid":"x"}`
    fn rewrite_object_ids(text: &str) -> String {
        OBJECT_ID
            .replace_all(text, |caps: &Captures| {
                format!("{{\"$oid\":{}}}", Self::captured_literal(caps))
            })
            .into_owned()
    }

    /// Step 2: `ISODate("x")` / `new Date("x")` → `{"$date":"x"}`
    ///
    /// Without an argument the constructor means the current time, which is
    /// left for the executor to resolve.
    fn rewrite_date_constructors(text: &str) -> String {
        DATE_CONSTRUCTOR
            .replace_all(text, |caps: &Captures| {
                let literal = if caps.get(1).is_some() || caps.get(2).is_some() {
                    Self::captured_literal(caps)
                } else {
                    Value::String(CURRENT_DATE.to_string()).to_string()
                };
                format!("{{\"$date\":{literal}}}")
            })
            .into_owned()
    }

    /// JSON string literal for whichever quote style matched
    fn captured_literal(caps: &Captures) -> String {
        let raw = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        Value::String(raw.to_string()).to_string()
    }

    /// Step 3: quote `identifier:` keys that follow `{` or `,` outside strings,
    /// and re-quote `'…'` / `` `…` `` strings as JSON strings.
    fn quote_bare_keys(text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 16);
        let mut last_significant: Option<char> = None;
        let mut pos = 0;

        while pos < text.len() {
            let Some(ch) = text[pos..].chars().next() else {
                break;
            };

            if is_quote(ch) {
                let end = Self::string_literal_end(text, pos, ch);
                Self::push_json_string(&mut out, &text[pos..end], ch);
                last_significant = Some('"');
                pos = end;
                continue;
            }

            if is_ident_start(ch) {
                if let Some((ident, after)) = read_identifier(text, pos) {
                    let next = skip_whitespace(text, after);
                    let is_key = matches!(last_significant, Some('{') | Some(','))
                        && text[next..].starts_with(':');
                    if is_key {
                        out.push('"');
                        out.push_str(ident);
                        out.push('"');
                    } else {
                        out.push_str(ident);
                    }
                    last_significant = ident.chars().last();
                    pos = after;
                    continue;
                }
            }

            out.push(ch);
            if !ch.is_whitespace() {
                last_significant = Some(ch);
            }
            pos += ch.len_utf8();
        }

        out
    }

    /// Byte offset just past the string literal opened at `start`
    fn string_literal_end(text: &str, start: usize, delimiter: char) -> usize {
        let mut escaped = false;
        let body_start = start + delimiter.len_utf8();

        for (offset, ch) in text[body_start..].char_indices() {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == delimiter {
                return body_start + offset + ch.len_utf8();
            }
        }

        text.len()
    }

    /// Append a string literal, converting non-double-quoted literals to JSON
    fn push_json_string(out: &mut String, literal: &str, delimiter: char) {
        if delimiter == '"' {
            out.push_str(literal);
            return;
        }

        let body = literal
            .strip_prefix(delimiter)
            .map(|rest| rest.strip_suffix(delimiter).unwrap_or(rest))
            .unwrap_or(literal);

        out.push('"');
        let mut chars = body.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some(next) if next == delimiter => out.push(next),
                    Some(next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => out.push_str("\\\\"),
                },
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                _ => out.push(ch),
            }
        }
        out.push('"');
    }

    /// Step 4: swap ambiguous date literals for placeholders.
    ///
    /// A match is only taken when it spans a whole string literal in value
    /// position, so object keys and dates quoted inside a longer string are
    /// left alone. Matches are replaced in order of descending start offset so
    /// that each replacement leaves the offsets of the remaining matches intact.
    fn protect_date_literals(text: &str) -> (String, ProtectedDates) {
        let literals = Self::value_literal_spans(text);
        let mut matches: Vec<(usize, usize)> = DATE_LITERALS
            .iter()
            .flat_map(|pattern| pattern.find_iter(text).map(|m| (m.start(), m.end())))
            .filter(|span| literals.contains(span))
            .collect();
        matches.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        let mut protected = text.to_string();
        let mut dates = ProtectedDates::default();
        let mut lowest_start = usize::MAX;

        for (start, end) in matches {
            if end > lowest_start {
                // same literal matched by another pattern
                continue;
            }

            let original = &text[start..end];
            let unquoted = original[1..original.len() - 1].to_string();
            let placeholder = ProtectedDates::placeholder(dates.originals.len());
            protected.replace_range(start..end, &format!("\"{placeholder}\""));
            dates.originals.push(unquoted);
            lowest_start = start;
        }

        (protected, dates)
    }

    /// Spans of the string literals that are not object keys.
    ///
    /// Runs on step 3 output, where every string is double-quoted.
    fn value_literal_spans(text: &str) -> HashSet<(usize, usize)> {
        let mut spans = HashSet::new();
        let mut pos = 0;

        while let Some(offset) = text[pos..].find('"') {
            let start = pos + offset;
            let end = Self::string_literal_end(text, start, '"');
            let next = skip_whitespace(text, end);
            if !text[next..].starts_with(':') {
                spans.insert((start, end));
            }
            pos = end;
        }

        spans
    }

    /// Step 6: replace placeholder strings with their original date text
    fn restore_date_literals(value: &mut Value, dates: &ProtectedDates) {
        match value {
            Value::String(s) => {
                if let Some(original) = dates.lookup(s) {
                    *s = original.to_string();
                }
            }
            Value::Array(items) => {
                for item in items {
                    Self::restore_date_literals(item, dates);
                }
            }
            Value::Object(map) => {
                for (_, item) in map.iter_mut() {
                    Self::restore_date_literals(item, dates);
                }
            }
            _ => {}
        }
    }
}
