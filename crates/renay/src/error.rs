//! Top-level failure type for the tracker's entry points.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::compliance::ComplianceServiceError;
use crate::config::ConfigError;
use crate::telemetry::TelemetryError;

/// Everything that can stop `serve`, `demo`, or `sweep` from completing.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
    #[error("compliance error: {0}")]
    Compliance(#[from] ComplianceServiceError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Compliance(err) => err.into_response(),
            startup @ (AppError::Config(_) | AppError::Telemetry(_) | AppError::Io(_)) => {
                let body = Json(json!({ "error": startup.to_string() }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn compliance_failures_keep_their_http_status() {
        let not_found = AppError::from(ComplianceServiceError::NotFound("document"));
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let invalid = AppError::from(ComplianceServiceError::Validation("name".to_string()));
        assert_eq!(
            invalid.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn startup_failures_are_internal_and_keep_their_source() {
        let err = AppError::from(ConfigError::InvalidPort);

        assert_eq!(
            err.to_string(),
            "configuration error: APP_PORT must be a valid u16"
        );
        assert!(err.source().is_some());
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
