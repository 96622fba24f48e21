use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use counsel_api::auth::{AppState, AppStateInner};
use counsel_mail::HttpMailer;
use counsel_rag::HttpAnswerClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counsel=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("COUNSEL_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("COUNSEL_DB_PATH").unwrap_or_else(|_| "counsel.db".into());
    let host = std::env::var("COUNSEL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("COUNSEL_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let base_url =
        std::env::var("COUNSEL_BASE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));
    let rag_url = std::env::var("COUNSEL_RAG_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8000/query".into());
    let mail_relay_url = std::env::var("COUNSEL_MAIL_RELAY_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8025/send".into());

    // Init database
    let db = counsel_db::Database::open(&PathBuf::from(&db_path))?;

    // Operator-designated staff accounts for the admin analytics routes.
    if let Ok(staff) = std::env::var("COUNSEL_STAFF_USERS") {
        for username in staff.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if db.set_user_staff(username)? {
                info!("granted staff access to {username}");
            } else {
                warn!("COUNSEL_STAFF_USERS names unknown user {username}");
            }
        }
    }

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        base_url,
        mailer: Arc::new(HttpMailer::new(mail_relay_url)?),
        answers: Arc::new(HttpAnswerClient::new(rag_url)?),
    });

    let app = counsel_api::routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Counsel server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
