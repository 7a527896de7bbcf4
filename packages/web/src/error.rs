//! HTTP mapping for errors that escape the portal's own handlers.

use api::PortalError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error("session: {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error("not found")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Portal(PortalError::from(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Portal(PortalError::Forbidden) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Portal(PortalError::Security) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Portal(PortalError::Validation(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Portal(_) | AppError::Session(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        let body = match &self {
            AppError::Portal(e @ PortalError::Validation(errors)) => {
                json!({ "error": message, "message": e.user_message(), "errors": errors })
            }
            AppError::Portal(e) => json!({ "error": message, "message": e.user_message() }),
            _ => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
