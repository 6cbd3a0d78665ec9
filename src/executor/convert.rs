//! Descriptor JSON to BSON conversion
//!
//! The parser emits plain JSON with two extended JSON wrappers:
//! `{"$oid": "<hex>"}` and `{"$date": "<text>"}`. Date text comes straight
//! from the shell source, so it is parsed leniently.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use mongodb::bson::{self, Bson, Document, oid::ObjectId};
use serde_json::{Map, Value};

use crate::error::ExecutionError;
use crate::parser::CURRENT_DATE;

/// Datetime layouts accepted without a timezone, interpreted as UTC
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Date-only layouts, interpreted as midnight UTC
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse the text of a `$date` wrapper.
///
/// Accepts RFC 3339, the naive layouts above, and integer epoch milliseconds.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc());
        }
    }

    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    text.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

/// Convert a JSON value to BSON, resolving `$oid` and `$date` wrappers
pub fn json_to_bson(value: &Value) -> Result<Bson, ExecutionError> {
    let bson = match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).map(Bson::Int32).unwrap_or(Bson::Int64(i))
            } else {
                // u64 beyond i64 range falls back to a double as well
                Bson::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(
            items
                .iter()
                .map(json_to_bson)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(map) => match wrapper(map) {
            Some(("$oid", inner)) => convert_object_id(inner)?,
            Some(("$date", inner)) => convert_date(inner)?,
            _ => Bson::Document(map_to_document(map)?),
        },
    };
    Ok(bson)
}

/// Convert a JSON object to a BSON document
pub fn json_to_document(value: &Value) -> Result<Document, ExecutionError> {
    match value {
        Value::Object(map) => map_to_document(map),
        other => Err(ExecutionError::InvalidPayload(format!(
            "expected a document, got {}",
            kind(other)
        ))),
    }
}

/// Convert a JSON array of objects to BSON documents
pub fn json_to_documents(value: &Value) -> Result<Vec<Document>, ExecutionError> {
    match value {
        Value::Array(items) => items.iter().map(json_to_document).collect(),
        other => Err(ExecutionError::InvalidPayload(format!(
            "expected an array of documents, got {}",
            kind(other)
        ))),
    }
}

fn map_to_document(map: &Map<String, Value>) -> Result<Document, ExecutionError> {
    let mut doc = Document::new();
    for (key, value) in map {
        doc.insert(key.clone(), json_to_bson(value)?);
    }
    Ok(doc)
}

/// The `(key, value)` of a single-key `$`-prefixed object
fn wrapper(map: &Map<String, Value>) -> Option<(&str, &Value)> {
    if map.len() != 1 {
        return None;
    }
    map.iter()
        .next()
        .filter(|(key, _)| key.starts_with('$'))
        .map(|(key, value)| (key.as_str(), value))
}

fn convert_object_id(value: &Value) -> Result<Bson, ExecutionError> {
    let hex = value
        .as_str()
        .ok_or_else(|| ExecutionError::Conversion("$oid must be a string".to_string()))?;
    ObjectId::parse_str(hex)
        .map(Bson::ObjectId)
        .map_err(|e| ExecutionError::Conversion(format!("invalid ObjectId '{hex}': {e}")))
}

fn convert_date(value: &Value) -> Result<Bson, ExecutionError> {
    let millis = match value {
        Value::String(text) if text == CURRENT_DATE => Utc::now().timestamp_millis(),
        Value::String(text) => parse_date(text)
            .map(|dt| dt.timestamp_millis())
            .ok_or_else(|| ExecutionError::Conversion(format!("invalid date '{text}'")))?,
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ExecutionError::Conversion(format!("invalid date {n}")))?,
        // {"$date": {"$numberLong": "..."}}
        Value::Object(map) => map
            .get("$numberLong")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| ExecutionError::Conversion("invalid $date value".to_string()))?,
        other => {
            return Err(ExecutionError::Conversion(format!(
                "invalid $date value of type {}",
                kind(other)
            )));
        }
    };
    Ok(Bson::DateTime(bson::DateTime::from_millis(millis)))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use mongodb::bson::doc;
    use serde_json::json;

    #[test]
    fn test_parse_date_formats() {
        let cases = [
            ("2025-01-01", (2025, 1, 1, 0, 0)),
            ("2025-01-01T10:30:00Z", (2025, 1, 1, 10, 30)),
            ("2025-01-01T10:30:00.123+02:00", (2025, 1, 1, 8, 30)),
            ("2025-01-01T10:30:00", (2025, 1, 1, 10, 30)),
            ("2025-01-01 10:30:45", (2025, 1, 1, 10, 30)),
            ("2025-01-01 10:30", (2025, 1, 1, 10, 30)),
            ("2025/03/04", (2025, 3, 4, 0, 0)),
            ("2025/03/04 08:15", (2025, 3, 4, 8, 15)),
            ("03/04/2025", (2025, 3, 4, 0, 0)),
        ];
        for (text, (y, m, d, h, min)) in cases {
            let dt = parse_date(text).unwrap_or_else(|| panic!("failed to parse {text}"));
            assert_eq!(
                (dt.year(), dt.month(), dt.day(), dt.hour(), dt.minute()),
                (y, m, d, h, min),
                "{text}"
            );
        }
    }

    #[test]
    fn test_parse_date_epoch_millis() {
        let dt = parse_date("1700000000000").unwrap();
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("2025-13-45").is_none());
    }

    #[test]
    fn test_wrappers_are_resolved() {
        let value = json!({
            "_id": {"$oid": "507f1f77bcf86cd799439011"},
            "created": {"$gte": {"$date": "2025-01-01"}}
        });
        let doc = json_to_document(&value).unwrap();

        assert!(matches!(doc.get("_id"), Some(Bson::ObjectId(_))));
        let created = doc.get_document("created").unwrap();
        if let Some(Bson::DateTime(dt)) = created.get("$gte") {
            assert_eq!(dt.timestamp_millis(), 1_735_689_600_000);
        } else {
            panic!("Expected DateTime");
        }
    }

    #[test]
    fn test_current_date_resolves_to_now() {
        let before = Utc::now().timestamp_millis();
        let value = json_to_bson(&json!({"$date": CURRENT_DATE})).unwrap();
        let after = Utc::now().timestamp_millis();

        if let Bson::DateTime(dt) = value {
            assert!((before..=after).contains(&dt.timestamp_millis()));
        } else {
            panic!("Expected DateTime");
        }
    }

    #[test]
    fn test_operator_documents_are_not_wrappers() {
        let doc = json_to_document(&json!({"age": {"$gt": 20}})).unwrap();
        assert_eq!(doc, doc! { "age": { "$gt": 20 } });
    }

    #[test]
    fn test_number_conversion() {
        assert_eq!(json_to_bson(&json!(5)).unwrap(), Bson::Int32(5));
        assert_eq!(
            json_to_bson(&json!(5_000_000_000i64)).unwrap(),
            Bson::Int64(5_000_000_000)
        );
        assert_eq!(json_to_bson(&json!(1.5)).unwrap(), Bson::Double(1.5));
    }

    #[test]
    fn test_key_order_is_preserved() {
        let doc = json_to_document(&json!({"z": 1, "a": 2, "m": 3})).unwrap();
        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_conversion_errors() {
        assert!(matches!(
            json_to_bson(&json!({"$oid": "xyz"})),
            Err(ExecutionError::Conversion(_))
        ));
        assert!(matches!(
            json_to_bson(&json!({"$date": "not a date"})),
            Err(ExecutionError::Conversion(_))
        ));
        assert!(matches!(
            json_to_document(&json!([1, 2])),
            Err(ExecutionError::InvalidPayload(_))
        ));
        assert!(matches!(
            json_to_documents(&json!([{"a": 1}, 2])),
            Err(ExecutionError::InvalidPayload(_))
        ));
    }
}
