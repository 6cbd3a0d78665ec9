//! Structured rendering of MongoDB driver errors.

use std::fmt;

use serde::Serialize;

/// Short, structured summary of a driver error.
///
/// Serialized into the per-statement error slot so that failures coming from
/// the server read the same way regardless of which operation produced them.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct DriverErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DriverErrorInfo {
    /// Extract a summary from a driver error using its typed error kinds.
    pub fn from_driver_error(error: &mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        let mut info = DriverErrorInfo::default();

        match error.kind.as_ref() {
            ErrorKind::Write(write_failure) => {
                info.error_type = Some("mongo.write_error".to_string());
                match write_failure {
                    WriteFailure::WriteError(write_error) => {
                        info.set_code(write_error.code, &write_error.message);
                    }
                    WriteFailure::WriteConcernError(wc_error) => {
                        info.set_code(wc_error.code, &wc_error.message);
                    }
                    _ => {}
                }
            }
            ErrorKind::Command(command_error) => {
                info.error_type = Some("mongo.command_error".to_string());
                info.set_code(command_error.code, &command_error.message);
            }
            ErrorKind::InsertMany(insert_error) => {
                info.error_type = Some("mongo.insert_many_error".to_string());
                if let Some(first) = insert_error
                    .write_errors
                    .as_ref()
                    .and_then(|errors| errors.first())
                {
                    info.set_code(first.code, &first.message);
                } else if let Some(wc_error) = &insert_error.write_concern_error {
                    info.set_code(wc_error.code, &wc_error.message);
                }
            }
            ErrorKind::Authentication { message, .. } => {
                info.error_type = Some("mongo.authentication_error".to_string());
                info.message = Some(message.clone());
            }
            ErrorKind::InvalidArgument { message, .. } => {
                info.error_type = Some("mongo.invalid_argument".to_string());
                info.message = Some(message.clone());
            }
            ErrorKind::ServerSelection { message, .. } => {
                info.error_type = Some("mongo.server_selection_error".to_string());
                info.message = Some(message.clone());
            }
            _ => {
                info.message = Some(error.to_string());
            }
        }

        info
    }

    fn set_code(&mut self, code: i32, message: &str) {
        self.code = Some(code);
        self.name = error_name(code);
        self.message = if code == 11000 || code == 11001 {
            Some("Duplicate key error".to_string())
        } else {
            Some(message.to_string())
        };
    }
}

/// Human-readable name for the server error codes a query is likely to hit.
fn error_name(code: i32) -> Option<String> {
    let name = match code {
        2 => "BadValue",
        11000 | 11001 => "DuplicateKey",
        13 => "Unauthorized",
        18 => "AuthenticationFailed",
        26 => "NamespaceNotFound",
        50 => "MaxTimeMSExpired",
        121 => "DocumentValidationFailure",
        292 => "QueryExceededMemoryLimitNoDiskUseAllowed",
        _ => return None,
    };

    Some(name.to_string())
}

/// Format a driver error as compact JSON wrapped in an `error` field.
pub fn format_driver_error(
    f: &mut fmt::Formatter<'_>,
    error: &mongodb::error::Error,
) -> fmt::Result {
    let info = DriverErrorInfo::from_driver_error(error);
    let wrapper = serde_json::json!({ "error": info });
    let json_output = serde_json::to_string(&wrapper).map_err(|_| fmt::Error)?;
    write!(f, "{json_output}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_name_known_codes() {
        assert_eq!(error_name(11000).as_deref(), Some("DuplicateKey"));
        assert_eq!(error_name(50).as_deref(), Some("MaxTimeMSExpired"));
        assert_eq!(error_name(12345), None);
    }

    #[test]
    fn test_duplicate_key_message_is_simplified() {
        let mut info = DriverErrorInfo::default();
        info.set_code(11000, "E11000 duplicate key error collection: test.users index: _id_");
        assert_eq!(info.message.as_deref(), Some("Duplicate key error"));
        assert_eq!(info.name.as_deref(), Some("DuplicateKey"));
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let info = DriverErrorInfo {
            message: Some("boom".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"message":"boom"}"#);
    }
}
