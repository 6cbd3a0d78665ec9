//! Base call extraction: the leading `db.<collection>.<operation>(<args>)` of
//! a statement.
//!
//! Besides the dotted form, the collection may be addressed the way the shell
//! allows for names that are not identifiers:
//! - `db.getCollection("system.profile").find()`
//! - `db["order-items"].find()`

use tracing::debug;

use super::scanner::{find_closing, read_identifier, skip_whitespace};
use crate::error::ParseError;

/// Leading call of a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseCall {
    pub collection: String,
    pub operation: String,
    /// Unparsed source between the operation's parentheses
    pub args_text: String,
}

/// Base call extractor
pub struct BaseCallExtractor;

impl BaseCallExtractor {
    /// Split a statement into its base call and the text following it.
    ///
    /// The argument span is the first balanced parenthesis group after the
    /// operation name. Fails with [`ParseError::InvalidFormat`] when the
    /// statement does not start with the call pattern.
    pub fn extract(statement: &str) -> Result<(BaseCall, &str), ParseError> {
        let text = statement.trim();

        let pos = Self::expect_keyword(text, 0, "db")?;
        let (collection, pos) = Self::read_collection(text, pos)?;
        let pos = Self::expect_char(text, pos, '.')?;
        let pos = skip_whitespace(text, pos);
        let (operation, pos) = read_identifier(text, pos).ok_or(ParseError::InvalidFormat)?;

        let open = skip_whitespace(text, pos);
        if !text[open..].starts_with('(') {
            return Err(ParseError::InvalidFormat);
        }
        let close = find_closing(text, open, '(', ')').ok_or(ParseError::InvalidFormat)?;

        let base = BaseCall {
            collection,
            operation: operation.to_string(),
            args_text: text[open + 1..close].trim().to_string(),
        };
        debug!(
            "Extracted base call: collection='{}' operation='{}'",
            base.collection, base.operation
        );

        Ok((base, &text[close + 1..]))
    }

    /// Read the collection part after `db`, returning the offset past it
    fn read_collection(text: &str, pos: usize) -> Result<(String, usize), ParseError> {
        let pos = skip_whitespace(text, pos);

        // db["name"]
        if text[pos..].starts_with('[') {
            let close = find_closing(text, pos, '[', ']').ok_or(ParseError::InvalidFormat)?;
            let name = Self::unquote(&text[pos + 1..close]).ok_or(ParseError::InvalidFormat)?;
            return Ok((name, close + 1));
        }

        let pos = Self::expect_char(text, pos, '.')?;
        let pos = skip_whitespace(text, pos);
        let (ident, after) = read_identifier(text, pos).ok_or(ParseError::InvalidFormat)?;

        // db.getCollection("name")
        if ident == "getCollection" {
            let open = skip_whitespace(text, after);
            if text[open..].starts_with('(') {
                let close =
                    find_closing(text, open, '(', ')').ok_or(ParseError::InvalidFormat)?;
                let name =
                    Self::unquote(&text[open + 1..close]).ok_or(ParseError::InvalidFormat)?;
                return Ok((name, close + 1));
            }
        }

        Ok((ident.to_string(), after))
    }

    /// Strip matching single or double quotes from a trimmed literal
    fn unquote(literal: &str) -> Option<String> {
        let literal = literal.trim();
        let mut chars = literal.chars();
        let first = chars.next()?;
        let last = chars.next_back()?;
        if (first == '"' || first == '\'') && first == last {
            let inner = &literal[1..literal.len() - 1];
            if !inner.is_empty() {
                return Some(inner.to_string());
            }
        }
        None
    }

    fn expect_keyword(text: &str, pos: usize, keyword: &str) -> Result<usize, ParseError> {
        match read_identifier(text, pos) {
            Some((ident, after)) if ident == keyword => Ok(after),
            _ => Err(ParseError::InvalidFormat),
        }
    }

    fn expect_char(text: &str, pos: usize, expected: char) -> Result<usize, ParseError> {
        let pos = skip_whitespace(text, pos);
        if text[pos..].starts_with(expected) {
            Ok(pos + expected.len_utf8())
        } else {
            Err(ParseError::InvalidFormat)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_call() {
        let (base, rest) = BaseCallExtractor::extract("db.users.find({name:\"John\"})").unwrap();
        assert_eq!(base.collection, "users");
        assert_eq!(base.operation, "find");
        assert_eq!(base.args_text, "{name:\"John\"}");
        assert_eq!(rest, "");
    }

    #[test]
    fn test_extract_returns_chain_remainder() {
        let (base, rest) =
            BaseCallExtractor::extract("db.users.find({}).sort({age:1}).limit(5)").unwrap();
        assert_eq!(base.args_text, "{}");
        assert_eq!(rest, ".sort({age:1}).limit(5)");
    }

    #[test]
    fn test_extract_empty_arguments() {
        let (base, _) = BaseCallExtractor::extract("db.users.find()").unwrap();
        assert_eq!(base.args_text, "");
    }

    #[test]
    fn test_extract_nested_parentheses_in_arguments() {
        let (base, rest) = BaseCallExtractor::extract(
            "db.orders.updateOne({_id: ObjectId(\"507f1f77bcf86cd799439011\")}, {$set:{a:1}})",
        )
        .unwrap();
        assert_eq!(
            base.args_text,
            "{_id: ObjectId(\"507f1f77bcf86cd799439011\")}, {$set:{a:1}}"
        );
        assert_eq!(rest, "");
    }

    #[test]
    fn test_extract_parenthesis_inside_string() {
        let (base, _) = BaseCallExtractor::extract("db.logs.find({msg: \"a)b\"})").unwrap();
        assert_eq!(base.args_text, "{msg: \"a)b\"}");
    }

    #[test]
    fn test_extract_get_collection() {
        let (base, rest) =
            BaseCallExtractor::extract("db.getCollection('system.profile').find().limit(1)")
                .unwrap();
        assert_eq!(base.collection, "system.profile");
        assert_eq!(base.operation, "find");
        assert_eq!(rest, ".limit(1)");
    }

    #[test]
    fn test_extract_bracket_collection() {
        let (base, _) = BaseCallExtractor::extract("db[\"order-items\"].countDocuments({})").unwrap();
        assert_eq!(base.collection, "order-items");
        assert_eq!(base.operation, "countDocuments");
    }

    #[test]
    fn test_extract_tolerates_surrounding_whitespace() {
        let (base, _) = BaseCallExtractor::extract("  db.users.find ( {} )  ").unwrap();
        assert_eq!(base.collection, "users");
        assert_eq!(base.args_text, "{}");
    }

    #[test]
    fn test_extract_rejects_missing_db_prefix() {
        assert_eq!(
            BaseCallExtractor::extract("foo.bar()"),
            Err(ParseError::InvalidFormat)
        );
        assert_eq!(
            BaseCallExtractor::extract("dbx.users.find()"),
            Err(ParseError::InvalidFormat)
        );
    }

    #[test]
    fn test_extract_rejects_incomplete_calls() {
        for input in ["db.users", "db.users.find", "db.users.find(", "db..find()", "db.users.()"] {
            assert_eq!(
                BaseCallExtractor::extract(input),
                Err(ParseError::InvalidFormat),
                "{input}"
            );
        }
    }

    #[test]
    fn test_extract_rejects_leading_garbage() {
        assert_eq!(
            BaseCallExtractor::extract("x = db.users.find()"),
            Err(ParseError::InvalidFormat)
        );
    }
}
