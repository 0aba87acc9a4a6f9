//! HTTP mapping for [`AppError`].

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::AppError;

impl AppError {
    /// Status code a handler failure is reported with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NoData(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Transient(_) | Self::Fatal(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Db(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::NotFound(msg) | Self::Validation(msg) | Self::NoData(msg) => msg.clone(),
            other => {
                error!(%other, "request failed");
                "internal server error".to_owned()
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}
