use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::{require_auth, require_staff, require_verified};
use crate::{admin, chat, verification};

/// Full API surface. CORS/trace layers are applied by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/verify-email/{token}", get(verification::verify_email))
        .route("/resend-verification", post(verification::resend_verification))
        .with_state(state.clone());

    let account_routes = Router::new()
        .route("/profile", get(verification::profile))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    // Chat is a verified-only feature: auth runs first, then the
    // lazy-creating verification gate.
    let chat_routes = Router::new()
        .route("/sessions", get(chat::list_sessions).post(chat::create_session))
        .route("/sessions/{session_id}/messages", get(chat::list_messages))
        .route("/messages", post(chat::send_message))
        .layer(from_fn_with_state(state.clone(), require_verified))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/sessions/{session_id}", get(admin::session_analytics))
        .layer(from_fn(require_staff))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(account_routes)
        .merge(chat_routes)
        .merge(admin_routes)
}
