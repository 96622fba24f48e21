use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::error;
use uuid::Uuid;

use counsel_db::{Database, now_ts};
use counsel_mail::{Mailer, templates};
use counsel_rag::AnswerService;
use counsel_types::api::{Claims, LoginRequest, LoginResponse, SignupRequest, SignupResponse};

use crate::error::{ApiError, blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Public origin used to build verification links.
    pub base_url: String,
    pub mailer: Arc<dyn Mailer>,
    pub answers: Arc<dyn AnswerService>,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation(
            "Username must be between 3 and 32 characters.".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters.".into(),
        ));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Validation("Enter a valid email address.".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();
    let token = Uuid::new_v4().to_string();

    let db_state = state.clone();
    let username = req.username.clone();
    let email = req.email.clone();
    let token_for_db = token.clone();
    blocking(move || {
        if db_state.db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::Validation(
                "This email address is already registered.".into(),
            ));
        }
        if db_state.db.get_user_by_username(&username)?.is_some() {
            return Err(ApiError::Validation(
                "This username is already taken.".into(),
            ));
        }

        // Account stays inactive until the email is verified.
        db_state
            .db
            .create_user(&user_id.to_string(), &username, &email, &password_hash, &now_ts())?;
        db_state.db.create_verification(
            &Uuid::new_v4().to_string(),
            &user_id.to_string(),
            &token_for_db,
            &now_ts(),
        )?;
        Ok(())
    })
    .await?;

    let url = verification_url(&state.base_url, &token);
    let email = templates::verification_email(&req.email, &req.username, &url);
    if let Err(e) = state.mailer.send(email).await {
        // The account exists; the user can recover through the resend flow.
        error!("failed to send verification email: {e}");
    }

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id,
            message: "Account created successfully! Please check your email to verify your account."
                .into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db_state = state.clone();
    let name = req.username.clone();
    let user = blocking(move || {
        // The login field accepts a username or an email address.
        let found = match db_state.db.get_user_by_username(&name)? {
            Some(user) => Some(user),
            None if name.contains('@') => db_state.db.get_user_by_email(&name)?,
            None => None,
        };
        found.ok_or(ApiError::Unauthorized)
    })
    .await?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {e}")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    if !user.is_active {
        return Err(ApiError::Forbidden(
            "Your account is not active yet. Please verify your email.".into(),
        ));
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {e}", user.id)))?;

    let token = issue_token(&state.jwt_secret, user_id, &user.username, user.is_staff)
        .map_err(ApiError::Internal)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    is_staff: bool,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        is_staff,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verification_url(base_url: &str, token: &str) -> String {
    format!("{}/verify-email/{}", base_url.trim_end_matches('/'), token)
}

#[cfg(test)]
mod tests {
    use super::verification_url;

    #[test]
    fn verification_url_tolerates_trailing_slash() {
        assert_eq!(
            verification_url("http://x.test/", "tok"),
            "http://x.test/verify-email/tok"
        );
        assert_eq!(
            verification_url("http://x.test", "tok"),
            "http://x.test/verify-email/tok"
        );
    }
}
