//! Typed errors for the analytics library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell a
//! bad field path from a failed execution.

use thiserror::Error;

/// Errors that can occur while resolving, compiling or executing a table.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Starting object is not one of the registered root families
    #[error("unknown root object: {0}")]
    UnknownRootObject(String),

    /// A path segment does not exist in the live schema
    #[error("field not found: {path} (missing segment '{segment}')")]
    FieldNotFound { path: String, segment: String },

    /// Path segment could not be parsed (e.g. unbalanced brackets)
    #[error("invalid path segment: {0}")]
    InvalidSegment(String),

    /// The resolved field exists but does not produce a value
    #[error("field does not produce a value: {0}")]
    NotAValue(String),

    /// Aggregate function is not supported by the field's type
    #[error("function {function} not supported by field {path}")]
    UnsupportedFunction { path: String, function: String },

    /// An alias or join was referenced that the compiled query never produced
    #[error("alias not compiled: {0}")]
    UncompiledAlias(String),

    /// Output alias collides with a column name the compiler uses itself
    #[error("reserved alias: {0}")]
    ReservedAlias(String),

    /// Two different values were registered under one parameter name
    #[error("parameter conflict: {0}")]
    ParamConflict(String),

    /// SQL references a parameter that was never registered
    #[error("missing parameter: {0}")]
    MissingParam(String),

    /// Statement execution failed
    #[error("execution error: {0}")]
    Execution(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A result column had a type the row parser does not understand
    #[error("unsupported column type: {0}")]
    UnsupportedColumnType(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
