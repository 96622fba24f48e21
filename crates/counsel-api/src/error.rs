use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API-surface errors. Each variant maps to a status code and a JSON
/// `{"error": ...}` body; lookup-style failures additionally carry a
/// `redirect` hint for the alternate flow.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid credentials.")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("Please verify your email address to access this feature.")]
    VerificationRequired,
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid verification link.")]
    InvalidToken,
    #[error("Verification link has expired. Please request a new one.")]
    TokenExpired,
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::VerificationRequired => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::InvalidToken => StatusCode::NOT_FOUND,
            Self::TokenExpired => StatusCode::GONE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::VerificationRequired => Some("/profile"),
            Self::InvalidToken => Some("/auth/signup"),
            Self::TokenExpired => Some("/resend-verification"),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!("internal error: {e:#}");
        }

        let mut body = json!({ "error": self.to_string() });
        if let Some(target) = self.redirect() {
            body["redirect"] = json!(target);
        }

        (self.status(), Json(body)).into_response()
    }
}

/// Runs blocking DB work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {e}")))?
}
