use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::domain::geo::GeoError;
use crate::domain::tour::UnknownDifficulty;
use crate::repository::errors::RepositoryError;
use crate::usecase::api_features::FeatureError;

pub const INTERNAL_MESSAGE: &str = "Something went very wrong!";

#[derive(Debug, Error)]
pub enum UsecaseError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Duplicate field value: {0}. Please use another value!")]
    Duplicate(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Internal(String),
}

impl UsecaseError {
    pub fn no_document(id: impl std::fmt::Display) -> Self {
        UsecaseError::NotFound(format!("No document found with that ID: {id}"))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            UsecaseError::NotFound(_) => StatusCode::NOT_FOUND,
            UsecaseError::Validation(_)
            | UsecaseError::Duplicate(_)
            | UsecaseError::BadRequest(_) => StatusCode::BAD_REQUEST,
            UsecaseError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            UsecaseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to any client.
    pub fn public_message(&self) -> String {
        match self {
            UsecaseError::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Maps a repository `NotFound` to the 404 for `id`.
pub fn document_error(id: Uuid) -> impl FnOnce(RepositoryError) -> UsecaseError {
    move |e| match e {
        RepositoryError::NotFound => UsecaseError::no_document(id),
        other => other.into(),
    }
}

/// Envelope status for a failed response: `fail` for client errors,
/// `error` otherwise.
pub fn envelope_status(status: StatusCode) -> &'static str {
    if status.is_client_error() {
        "fail"
    } else {
        "error"
    }
}

/// Attached to every error response so outer layers can enrich the body.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
    pub detail: String,
}

impl From<RepositoryError> for UsecaseError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => UsecaseError::NotFound("No document found".to_string()),
            RepositoryError::Duplicate(field) => UsecaseError::Duplicate(field),
            RepositoryError::InvalidReference(constraint) => {
                UsecaseError::BadRequest(format!("Referenced document does not exist ({constraint})"))
            }
            RepositoryError::CheckViolation(constraint) => {
                UsecaseError::Validation(format!("Invalid input data. Constraint {constraint} violated"))
            }
            RepositoryError::DatabaseError(msg) => UsecaseError::Internal(msg),
        }
    }
}

impl From<ValidationErrors> for UsecaseError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(m) => m.to_string(),
                    None => format!("Invalid {field}"),
                })
            })
            .collect();
        messages.sort();
        UsecaseError::Validation(format!("Invalid input data. {}", messages.join(". ")))
    }
}

impl From<UnknownDifficulty> for UsecaseError {
    fn from(e: UnknownDifficulty) -> Self {
        UsecaseError::Validation(format!("Invalid input data. {e}"))
    }
}

impl From<FeatureError> for UsecaseError {
    fn from(e: FeatureError) -> Self {
        UsecaseError::BadRequest(e.to_string())
    }
}

impl From<GeoError> for UsecaseError {
    fn from(e: GeoError) -> Self {
        UsecaseError::BadRequest(e.to_string())
    }
}

impl From<serde_json::Error> for UsecaseError {
    fn from(e: serde_json::Error) -> Self {
        UsecaseError::Internal(e.to_string())
    }
}

impl From<anyhow::Error> for UsecaseError {
    fn from(e: anyhow::Error) -> Self {
        UsecaseError::Internal(e.to_string())
    }
}

impl IntoResponse for UsecaseError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            UsecaseError::Internal(_) => {
                tracing::error!(error = %self, "internal error");
            }
            UsecaseError::NotFound(_) => {
                tracing::warn!(error = %self, "resource not found");
            }
            UsecaseError::Unauthorized(_) => {
                tracing::warn!(error = %self, "unauthorized");
            }
            _ => {
                tracing::debug!(error = %self);
            }
        }

        let report = ErrorReport {
            status,
            message: self.public_message(),
            detail: format!("{self:?}"),
        };
        let body = json!({
            "status": envelope_status(status),
            "message": report.message,
        });

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(report);
        response
    }
}
