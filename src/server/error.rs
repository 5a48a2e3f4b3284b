//! API error responses

use crate::gateway::GatewayError;
use crate::output::OutputError;
use crate::MapperError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors returned by HTTP handlers, rendered as `{"error": "..."}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(GatewayError::RunNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Gateway(GatewayError::NotFinished(_)) => StatusCode::CONFLICT,
            Self::Gateway(GatewayError::RunFailed { .. }) => StatusCode::CONFLICT,
            Self::Gateway(GatewayError::Start(MapperError::SeedInvalid { .. })) => {
                StatusCode::BAD_REQUEST
            }
            Self::Gateway(GatewayError::Start(_)) | Self::Output(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
