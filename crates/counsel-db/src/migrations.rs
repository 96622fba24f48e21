use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            is_active   INTEGER NOT NULL DEFAULT 0,
            is_staff    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS email_verifications (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL UNIQUE REFERENCES users(id),
            token       TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL,
            is_verified INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS chat_sessions (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chat_messages (
            id              TEXT PRIMARY KEY,
            session_id      TEXT NOT NULL REFERENCES chat_sessions(id),
            content         TEXT NOT NULL,
            is_user         INTEGER NOT NULL,
            created_at      TEXT NOT NULL,
            thinking_time   REAL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON chat_messages(session_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_verifications_token
            ON email_verifications(token);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
