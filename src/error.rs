//! Error taxonomy.
//!
//! Everything a client can see is normalized into [`HttpError`], the unified error
//! shape (`{"error": "...", "errors": [...]}`). Request pipeline stages fail with
//! [`PipelineError`], whose variants carry fixed statuses. Registration and spec
//! export have their own error types; neither reaches clients.

use serde::Serialize;
use thiserror::Error;

use crate::schema::{Schema, ToSchema};

/// One offending field of a failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub name: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Unified error returned to clients.
///
/// Handlers may return it (through `anyhow`) to pick the status themselves; any other
/// error becomes a 500 unless a custom error handler says otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename = "HttpError")]
#[error("{message}")]
pub struct HttpError {
    #[serde(skip)]
    pub status: u16,
    #[serde(rename = "error")]
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl HttpError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = errors;
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(409, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }
}

impl ToSchema for FieldError {
    fn schema() -> Schema {
        let mut schema = Schema::object();
        schema.insert_property("name", Schema::string(), true);
        schema.insert_property("reason", Schema::string(), true);
        schema
    }
}

impl ToSchema for HttpError {
    fn schema() -> Schema {
        let mut schema = Schema::object();
        schema.description = Some("Unified error returned for every failed request".to_string());
        schema.insert_property(
            "error",
            Schema::string().with_example(serde_json::Value::from("validation failed")),
            true,
        );
        schema.insert_property("errors", Schema::array(FieldError::schema()), false);
        schema
    }

    fn schema_name() -> Option<&'static str> {
        Some("HttpError")
    }
}

/// Failure of a request pipeline stage. The handler never runs when one occurs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unsupported content type: {content_type}")]
    ContentTypeRejected { content_type: String },
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("cannot decode request body: {0}")]
    DecodeFailure(String),
    #[error("unknown field `{0}` in request body")]
    UnknownField(String),
    #[error("validation failed")]
    ValidationFailure(Vec<FieldError>),
}

impl PipelineError {
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::ContentTypeRejected { .. } => 415,
            Self::BodyTooLarge { .. } => 413,
            Self::DecodeFailure(_) | Self::UnknownField(_) | Self::ValidationFailure(_) => 400,
        }
    }
}

impl From<PipelineError> for HttpError {
    fn from(err: PipelineError) -> Self {
        let status = err.status();
        let message = err.to_string();
        match err {
            PipelineError::ValidationFailure(errors) => {
                HttpError::new(status, message).with_errors(errors)
            }
            _ => HttpError::new(status, message),
        }
    }
}

/// Registration-time programming error. Never recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route {method} {path} is already registered")]
    Conflict { method: String, path: String },
    #[error("invalid route path {path}: {reason}")]
    InvalidPath { path: String, reason: String },
}

/// Spec export configuration that disables a feature instead of aborting startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecConfigError {
    #[error("invalid spec JSON url {0}, serving the spec JSON is disabled")]
    InvalidJsonUrl(String),
    #[error("invalid documentation UI url {0}, the UI is disabled")]
    InvalidUiUrl(String),
    #[error("invalid spec file path {0}, local save is disabled")]
    InvalidLocalPath(String),
}
