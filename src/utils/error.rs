use salvo::prelude::*;
use thiserror::Error;

use crate::core::queries::runner::RunnerError;
use crate::core::storage::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Query timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Message from the external system, passed through verbatim
    #[error("{0}")]
    Integration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Parse error: {0}")]
    ParseError(#[from] salvo::http::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("SQL error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("HTTP status error: {0}")]
    StatusError(#[from] salvo::http::StatusError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::Configuration(_)
            | AppError::Timeout { .. }
            | AppError::Integration(_)
            | AppError::ParseError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StatusError(status_error) => status_error.code,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound(id),
            StoreError::Conflict(id) => {
                AppError::Conflict(format!("document {} has been modified, re-fetch and retry", id))
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<RunnerError> for AppError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Timeout { timeout_ms } => AppError::Timeout { timeout_ms },
            RunnerError::Configuration(msg) => AppError::Configuration(msg),
            RunnerError::Integration(msg) => AppError::Integration(msg),
            other => AppError::Integration(other.to_string()),
        }
    }
}

#[async_trait]
impl Writer for AppError {
    async fn write(mut self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        res.status_code(self.status_code());
        res.render(Json(serde_json::json!({
            "error": self.to_string()
        })));
    }
}
