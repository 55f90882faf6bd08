//! Error types for the chemical API, its store, client and CSV import.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the resource service and mapped onto HTTP statuses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("please provide proper credentials")]
    Unauthorized,

    #[error("record failed validation with {} error(s)", errors.len())]
    InvalidRecord { errors: Vec<FieldError> },

    #[error("no {resource} with id '{id}'")]
    NotFound { resource: String, id: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("no route for {path}")]
    NoRoute { path: String },

    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Returns the HTTP status code for this error type.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::InvalidRecord { .. } => 422,
            Self::NotFound { .. } | Self::NoRoute { .. } => 404,
            Self::MethodNotAllowed { .. } => 405,
            Self::BadRequest { .. } => 400,
            Self::Store(_) => 500,
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        Self::BadRequest {
            message: err.to_string(),
        }
    }
}

/// Constraint a field value violated.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    Missing,
    WrongType { expected: &'static str },
    Length { min: usize, max: usize, actual: usize },
    Unknown,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::Missing => write!(f, "required field"),
            Violation::WrongType { expected } => write!(f, "must be of {} type", expected),
            Violation::Length { min, max, actual } if actual < min => {
                write!(f, "min length is {} (got {})", min, actual)
            }
            Violation::Length { max, actual, .. } => {
                write!(f, "max length is {} (got {})", max, actual)
            }
            Violation::Unknown => write!(f, "unknown field"),
        }
    }
}

/// Single field failure within an invalid record.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FieldError {
    /// Name of the offending field.
    pub field: String,
    /// The constraint it broke.
    pub violation: Violation,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.violation)
    }
}

/// Errors while decoding a `where` filter.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid filter JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("filter must be a JSON object, got {actual}")]
    NotAnObject { actual: String },

    #[error("query operator '{operator}' is not allowed")]
    Blacklisted { operator: String },

    #[error("unknown query operator '{operator}' at {path}")]
    UnknownOperator { path: String, operator: String },

    #[error("invalid operand for '{operator}' at {path}: {message}")]
    InvalidOperand {
        path: String,
        operator: String,
        message: String,
    },
}

/// A filter was requested with no predicates at all.
///
/// Non-fatal: callers log it and carry on with an empty filter, which matches
/// every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{context}: no predicates were provided")]
pub struct EmptyFilterWarning {
    pub context: &'static str,
}

/// Errors from the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored document is malformed: {message}")]
    Corrupt { message: String },

    #[cfg(feature = "mongo")]
    #[error("mongodb error: {source}")]
    Mongo {
        #[source]
        source: mongodb::error::Error,
    },
}

/// Errors raised by the HTTP client.
#[cfg(feature = "remote")]
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("response from {url} has no _meta.total")]
    MissingTotal { url: String },
}

#[cfg(feature = "remote")]
impl ClientError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ClientError::Transport { .. } => 3,
            ClientError::Status { .. } | ClientError::MissingTotal { .. } => 1,
        }
    }
}

/// Errors during CSV to JSON conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid CSV: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("seed record {index} is invalid: {message}")]
    InvalidSeed { index: usize, message: String },

    #[error("cannot write JSON: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },
}

impl ConvertError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConvertError::FileNotFound { .. } | ConvertError::Io { .. } => 3,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_status_codes() {
        assert_eq!(ApiError::Unauthorized.status_code(), 401);
        assert_eq!(ApiError::InvalidRecord { errors: vec![] }.status_code(), 422);
        let err = ApiError::NotFound {
            resource: "chemicals".into(),
            id: "abc".into(),
        };
        assert_eq!(err.status_code(), 404);
        let err = ApiError::BadRequest {
            message: "empty body".into(),
        };
        assert_eq!(err.status_code(), 400);
        let err = ApiError::MethodNotAllowed {
            method: "PUT".into(),
            path: "/chemicals".into(),
        };
        assert_eq!(err.status_code(), 405);
    }

    #[test]
    fn filter_error_is_bad_request() {
        let err: ApiError = FilterError::Blacklisted {
            operator: "$where".into(),
        }
        .into();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("$where"));
    }

    #[test]
    fn field_error_display() {
        let err = FieldError {
            field: "formula".into(),
            violation: Violation::Missing,
        };
        assert_eq!(err.to_string(), "formula: required field");

        let err = FieldError {
            field: "color".into(),
            violation: Violation::Length {
                min: 1,
                max: 15,
                actual: 20,
            },
        };
        assert_eq!(err.to_string(), "color: max length is 15 (got 20)");

        let err = FieldError {
            field: "color".into(),
            violation: Violation::Length {
                min: 1,
                max: 15,
                actual: 0,
            },
        };
        assert_eq!(err.to_string(), "color: min length is 1 (got 0)");
    }

    #[test]
    fn convert_error_exit_codes() {
        let err = ConvertError::FileNotFound {
            path: PathBuf::from("data.csv"),
        };
        assert_eq!(err.exit_code(), 3);
    }
}
