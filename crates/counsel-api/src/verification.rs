use axum::{Json, extract::Path, extract::State};
use axum::Extension;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{error, warn};
use uuid::Uuid;

use counsel_db::{TS_FORMAT, now_ts};
use counsel_mail::templates;
use counsel_types::api::{
    Claims, ProfileResponse, ResendRequest, ResendResponse, ResendStatus, VerifyResponse,
    VerifyStatus,
};

use crate::auth::{AppState, verification_url};
use crate::error::{ApiError, blocking};

/// Verification tokens are valid for 7 days from creation.
const EXPIRY_DAYS: i64 = 7;

pub(crate) fn is_expired(created_at: &str, now: DateTime<Utc>) -> bool {
    let created = match NaiveDateTime::parse_from_str(created_at, TS_FORMAT) {
        Ok(ndt) => ndt.and_utc(),
        Err(e) => {
            // Unparseable creation time: treat the token as expired so the
            // resend flow replaces it.
            warn!("corrupt verification created_at '{created_at}': {e}");
            return true;
        }
    };

    now - created > chrono::Duration::days(EXPIRY_DAYS)
}

enum VerifyAction {
    Activated { email: String, username: String },
    AlreadyVerified,
}

pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let db_state = state.clone();
    let action = blocking(move || {
        let v = db_state
            .db
            .get_verification_by_token(&token)?
            .ok_or(ApiError::InvalidToken)?;

        if is_expired(&v.created_at, Utc::now()) {
            return Err(ApiError::TokenExpired);
        }

        if v.is_verified {
            return Ok(VerifyAction::AlreadyVerified);
        }

        db_state.db.mark_verified(&v.id)?;
        db_state.db.activate_user(&v.user_id)?;

        let user = db_state
            .db
            .get_user_by_id(&v.user_id)?
            .ok_or_else(|| anyhow::anyhow!("verification {} points at missing user", v.id))?;

        Ok(VerifyAction::Activated {
            email: user.email,
            username: user.username,
        })
    })
    .await?;

    match action {
        VerifyAction::Activated { email, username } => {
            if let Err(e) = state.mailer.send(templates::welcome_email(&email, &username)).await {
                error!("failed to send welcome email: {e}");
            }
            Ok(Json(VerifyResponse {
                status: VerifyStatus::Verified,
                message: "Email verified successfully! You can now log in.".into(),
            }))
        }
        VerifyAction::AlreadyVerified => Ok(Json(VerifyResponse {
            status: VerifyStatus::AlreadyVerified,
            message: "Email is already verified.".into(),
        })),
    }
}

enum ResendAction {
    Send {
        email: String,
        username: String,
        token: String,
    },
    AlreadyVerified,
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<ResendRequest>,
) -> Result<Json<ResendResponse>, ApiError> {
    let db_state = state.clone();
    let action = blocking(move || {
        let user = db_state
            .db
            .get_user_by_email(&req.email)?
            .ok_or_else(|| ApiError::NotFound("No account found with this email address.".into()))?;

        let token = match db_state.db.get_verification_by_user(&user.id)? {
            Some(v) if v.is_verified => return Ok(ResendAction::AlreadyVerified),
            Some(v) if is_expired(&v.created_at, Utc::now()) => {
                // Expired tokens are replaced, never renewed in place.
                db_state.db.delete_verification(&v.id)?;
                fresh_verification(&db_state, &user.id)?
            }
            Some(v) => v.token,
            None => fresh_verification(&db_state, &user.id)?,
        };

        Ok(ResendAction::Send {
            email: user.email,
            username: user.username,
            token,
        })
    })
    .await?;

    match action {
        ResendAction::Send {
            email,
            username,
            token,
        } => {
            let url = verification_url(&state.base_url, &token);
            if let Err(e) = state
                .mailer
                .send(templates::verification_email(&email, &username, &url))
                .await
            {
                error!("failed to send verification email: {e}");
            }
            Ok(Json(ResendResponse {
                status: ResendStatus::Sent,
                message: "Verification email sent! Please check your inbox.".into(),
            }))
        }
        ResendAction::AlreadyVerified => Ok(Json(ResendResponse {
            status: ResendStatus::AlreadyVerified,
            message: "Email is already verified.".into(),
        })),
    }
}

/// Verification status view. Creates the verification record lazily when it
/// is missing, so signup paths that predate the token table still converge.
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let db_state = state.clone();
    let profile = blocking(move || {
        let user = db_state
            .db
            .get_user_by_id(&claims.sub.to_string())?
            .ok_or(ApiError::Unauthorized)?;

        let v = match db_state.db.get_verification_by_user(&user.id)? {
            Some(v) => v,
            None => {
                fresh_verification(&db_state, &user.id)?;
                db_state
                    .db
                    .get_verification_by_user(&user.id)?
                    .ok_or_else(|| anyhow::anyhow!("verification vanished for user {}", user.id))?
            }
        };

        Ok(ProfileResponse {
            username: user.username,
            email: user.email,
            is_verified: v.is_verified,
            token_created_at: v.created_at,
        })
    })
    .await?;

    Ok(Json(profile))
}

/// The verified-only gate. A missing record is lazily created (unverified);
/// the caller is then redirected to the profile view by the error mapping.
pub async fn ensure_verified(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    let db_state = state.clone();
    blocking(move || {
        match db_state.db.get_verification_by_user(&user_id.to_string())? {
            Some(v) if v.is_verified => Ok(()),
            Some(_) => Err(ApiError::VerificationRequired),
            None => {
                fresh_verification(&db_state, &user_id.to_string())?;
                Err(ApiError::VerificationRequired)
            }
        }
    })
    .await
}

fn fresh_verification(
    state: &crate::auth::AppStateInner,
    user_id: &str,
) -> Result<String, ApiError> {
    let token = Uuid::new_v4().to_string();
    state
        .db
        .create_verification(&Uuid::new_v4().to_string(), user_id, &token, &now_ts())?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::is_expired;
    use chrono::{TimeZone, Utc};

    #[test]
    fn seven_day_window() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();

        // Six days old: still valid.
        assert!(!is_expired("2026-08-19 12:00:00.000", now));
        // Exactly seven days: still valid, the window is inclusive.
        assert!(!is_expired("2026-08-18 12:00:00.000", now));
        // A second past seven days: expired.
        assert!(is_expired("2026-08-18 11:59:59.000", now));
    }

    #[test]
    fn unparseable_timestamp_counts_as_expired() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
        assert!(is_expired("not-a-date", now));
    }
}
