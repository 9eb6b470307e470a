use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the calmbreak-push service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // ── Configuration ───────────────────────────────────────────────────
    #[error("Not configured: {0}")]
    NotConfigured(&'static str),

    // ── Auth ────────────────────────────────────────────────────────────
    #[error("Authentication required")]
    Unauthorized,

    // ── Request errors ──────────────────────────────────────────────────
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Provider {0} not found")]
    ProviderNotFound(String),

    // ── Provider errors ─────────────────────────────────────────────────
    /// The provider rejected the refresh credential; the connection is
    /// effectively disconnected until a human reconnects it.
    #[error("Provider rejected refresh credential: {0}")]
    CredentialRejected(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        ApiError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotConfigured(_) => (StatusCode::SERVICE_UNAVAILABLE, "not_configured"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::ProviderNotFound(_) => (StatusCode::NOT_FOUND, "provider_not_found"),
            ApiError::CredentialRejected(_) => (StatusCode::CONFLICT, "disconnected"),
            ApiError::ProviderUnavailable(_) => (StatusCode::BAD_GATEWAY, "provider_unavailable"),
            ApiError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "crypto_error"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
