use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use warp::{
    http::StatusCode,
    reject::{Reject, Rejection},
    reply::{self, Reply, Response},
};

/// Field name -> messages, rendered as `{"field": ["msg"]}`.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.fields
            .entry(field.to_owned())
            .or_default()
            .push(message.to_owned());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn into_fields(self) -> BTreeMap<String, Vec<String>> {
        self.fields
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication credentials were not provided.")]
    Unauthenticated,

    #[error("Invalid token.")]
    InvalidToken,

    #[error("You do not have permission to perform this action.")]
    Forbidden,

    #[error("Not found.")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(info: &str) -> Self {
        Self::BadRequest(info.to_owned())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::BadRequest(info) => json!({ "errors": info }),
            ApiError::Internal(_) => json!({ "detail": "Internal server error" }),
            other => json!({ "detail": other.to_string() }),
        }
    }

    pub fn to_response(&self) -> Response {
        if let ApiError::Internal(info) = self {
            log::error!("{info}");
        }
        reply::with_status(reply::json(&self.body()), self.status()).into_response()
    }
}

impl Reject for ApiError {}

impl From<ValidationErrors> for Rejection {
    fn from(value: ValidationErrors) -> Self {
        warp::reject::custom(ApiError::Validation(value))
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(value: ValidationErrors) -> Self {
        ApiError::Validation(value)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                Self::bad_request("Object already exists.")
            }
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => Self::NotFound,
            sqlx::Error::Database(e) => Self::Internal(format!("{e}")),
            sqlx::Error::Configuration(e) => Self::Internal(format!("{e}")),
            sqlx::Error::Io(e) => Self::Internal(format!("{e}")),
            sqlx::Error::Tls(e) => Self::Internal(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::Internal(e),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::Internal(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::Internal(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::Internal(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Internal(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::Internal(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::Internal("Pool timed out".to_owned()),
            sqlx::Error::PoolClosed => Self::Internal("Pool closed".to_owned()),
            sqlx::Error::WorkerCrashed => Self::Internal("Worker crashed".to_owned()),
            sqlx::Error::Migrate(e) => Self::Internal(format!("{e}")),
            e => Self::Internal(format!("{e}")),
        }
    }
}

impl Reply for ApiError {
    fn into_response(self) -> Response {
        self.to_response()
    }
}
