use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use counsel_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::verification;

/// Extract and validate JWT from the Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Gates the admin analytics routes. Runs after `require_auth`.
pub async fn require_staff(req: Request, next: Next) -> Result<Response, ApiError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(ApiError::Unauthorized)?;

    if !claims.is_staff {
        return Err(ApiError::Forbidden("Staff access required.".into()));
    }

    Ok(next.run(req).await)
}

/// Gates verified-only features. A missing verification record is lazily
/// created (unverified) before the request is rejected, so the profile view
/// the caller is redirected to always has a token to show.
pub async fn require_verified(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or(ApiError::Unauthorized)?;

    verification::ensure_verified(&state, claims.sub).await?;

    Ok(next.run(req).await)
}
