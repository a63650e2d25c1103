//! HTTP error response conversion
//!
//! This module provides HTTP-specific error response conversion for AppError.
//!
//! **Preferred handler pattern:** Return `Result<impl IntoResponse, HttpAppError>`. Use
//! `AppError` (or types that implement `Into<AppError>`) for errors and `.map_err(Into::into)`
//! so they become `HttpAppError` and render consistently (status, body, logging).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use motorlot_core::{AppError, ErrorMetadata, LogLevel};
use motorlot_storage::TransferError;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::upload::{BatchFailure, IntakeRejection};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client (e.g., "Retry the whole batch")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from motorlot-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let is_production = is_production_env();

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Remote failures carry host paths and protocol errors; operators see them, clients don't.
        let (details, error_type) = if is_production || app_error.is_sensitive() {
            (None, None)
        } else {
            (
                Some(app_error.detailed_message()),
                Some(app_error.error_type().to_string()),
            )
        };

        let body = Json(ErrorResponse {
            error: app_error.client_message(),
            details,
            error_type,
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        });

        (status, body).into_response()
    }
}

// Convert domain errors to HttpAppError (avoids orphan rule: we impl for local HttpAppError)

impl From<TransferError> for HttpAppError {
    fn from(err: TransferError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<IntakeRejection> for HttpAppError {
    fn from(err: IntakeRejection) -> Self {
        HttpAppError(err.into())
    }
}

impl From<BatchFailure> for HttpAppError {
    fn from(err: BatchFailure) -> Self {
        HttpAppError(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transfer_error_connect() {
        let err = TransferError::RemoteConnect {
            attempts: 4,
            reason: "connection refused".to_string(),
        };
        let HttpAppError(app_err) = err.into();
        assert!(matches!(app_err, AppError::RemoteConnect(_)));
        assert_eq!(app_err.http_status_code(), 503);
    }

    #[test]
    fn test_from_transfer_error_invalid_key() {
        let HttpAppError(app_err) = TransferError::InvalidKey("../etc".to_string()).into();
        match app_err {
            AppError::InvalidInput(msg) => assert!(msg.contains("../etc")),
            _ => panic!("Expected InvalidInput variant"),
        }
    }

    #[test]
    fn test_from_intake_rejection() {
        let HttpAppError(app_err) = IntakeRejection::UnsupportedMediaType {
            content_type: "application/pdf".to_string(),
        }
        .into();
        assert_eq!(app_err.http_status_code(), 415);

        let HttpAppError(app_err) = IntakeRejection::PayloadTooLarge {
            limit_bytes: 5 * 1024 * 1024,
        }
        .into();
        assert_eq!(app_err.http_status_code(), 413);

        let HttpAppError(app_err) = IntakeRejection::EmptyFile.into();
        assert_eq!(app_err.http_status_code(), 400);
    }

    #[test]
    fn test_remote_error_response_hides_details() {
        let response =
            HttpAppError(AppError::RemoteWrite("uploads/vehicles/a.jpg: EOF".to_string()))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    /// Verifies the public error response contract: serialized ErrorResponse has "error",
    /// "code", "recoverable", and optionally "details" / "error_type" / "suggested_action".
    #[test]
    fn test_error_response_shape() {
        let response = ErrorResponse {
            error: "File too large".to_string(),
            details: None,
            error_type: None,
            code: "PAYLOAD_TOO_LARGE".to_string(),
            recoverable: false,
            suggested_action: Some("Reduce file size and try again".to_string()),
        };
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(
            json.get("code").and_then(|v| v.as_str()),
            Some("PAYLOAD_TOO_LARGE")
        );
        assert_eq!(json.get("recoverable").and_then(|v| v.as_bool()), Some(false));
        assert!(json.get("details").is_none());
    }
}
