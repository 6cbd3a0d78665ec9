use std::{fmt, io};

use crate::error::driver::format_driver_error;

/// Message shown when a statement is not a `db.collection.operation(...)` call.
pub const INVALID_FORMAT_MESSAGE: &str =
    "Invalid MongoDB query format. Use: db.collection.operation(parameters)";

/// Crate-wide `Result` type using [`QueryError`] as the error.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Top-level error type for mongoquery.
///
/// This type wraps the stage-specific error kinds so that every fallible
/// function in the crate can return the same error.
#[derive(Debug)]
pub enum QueryError {
    /// Statement parsing errors.
    Parse(ParseError),

    /// Descriptor execution errors.
    Execution(ExecutionError),

    /// Configuration errors.
    Config(ConfigError),

    /// Connection errors.
    Connection(ConnectionError),

    /// I/O errors.
    Io(io::Error),

    /// MongoDB driver errors.
    MongoDb(mongodb::error::Error),

    /// JSON serialization errors.
    Json(serde_json::Error),
}

/// Parsing-specific errors.
///
/// Each variant is fatal for the statement it was raised on only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The statement does not start with `db.<collection>.<operation>(...)`.
    InvalidFormat,

    /// The normalized argument text is not valid JSON.
    InvalidArguments(String),

    /// The shell operation is not in the supported set.
    UnsupportedOperation(String),

    /// A blank statement was handed to the parser.
    EmptyStatement,
}

/// Execution-specific errors.
#[derive(Debug)]
pub enum ExecutionError {
    /// The descriptor payload has the wrong shape for its operation.
    InvalidPayload(String),

    /// Extended JSON value could not be converted to BSON.
    Conversion(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/// Connection-specific errors.
#[derive(Debug)]
pub enum ConnectionError {
    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// Invalid connection URI.
    InvalidUri(String),

    /// Not currently connected to MongoDB.
    NotConnected,

    /// Ping command failed.
    PingFailed(String),
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Parse(e) => write!(f, "{e}"),
            QueryError::Execution(e) => write!(f, "Execution error: {e}"),
            QueryError::Config(e) => write!(f, "Configuration error: {e}"),
            QueryError::Connection(e) => write!(f, "Connection error: {e}"),
            QueryError::Io(e) => write!(f, "I/O error: {e}"),
            QueryError::MongoDb(e) => format_driver_error(f, e),
            QueryError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidFormat => write!(f, "{INVALID_FORMAT_MESSAGE}"),
            ParseError::InvalidArguments(msg) => {
                write!(f, "error parsing query parameters: {msg}")
            }
            ParseError::UnsupportedOperation(op) => write!(f, "Unsupported operation: {op}"),
            ParseError::EmptyStatement => write!(f, "Empty statement"),
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::InvalidPayload(msg) => write!(f, "Invalid payload: {msg}"),
            ExecutionError::Conversion(msg) => write!(f, "Invalid extended JSON: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            ConnectionError::InvalidUri(uri) => write!(f, "Invalid connection URI: {uri}"),
            ConnectionError::NotConnected => write!(f, "Not connected to MongoDB"),
            ConnectionError::PingFailed(msg) => write!(f, "Ping failed: {msg}"),
        }
    }
}

impl std::error::Error for QueryError {}
impl std::error::Error for ParseError {}
impl std::error::Error for ExecutionError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for ConnectionError {}

/* ========================= Conversions to QueryError ========================= */

impl From<io::Error> for QueryError {
    fn from(err: io::Error) -> Self {
        QueryError::Io(err)
    }
}

impl From<mongodb::error::Error> for QueryError {
    fn from(err: mongodb::error::Error) -> Self {
        QueryError::MongoDb(err)
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Json(err)
    }
}

impl From<ParseError> for QueryError {
    fn from(err: ParseError) -> Self {
        QueryError::Parse(err)
    }
}

impl From<ExecutionError> for QueryError {
    fn from(err: ExecutionError) -> Self {
        QueryError::Execution(err)
    }
}

impl From<ConfigError> for QueryError {
    fn from(err: ConfigError) -> Self {
        QueryError::Config(err)
    }
}

impl From<ConnectionError> for QueryError {
    fn from(err: ConnectionError) -> Self {
        QueryError::Connection(err)
    }
}
