/// Database row types — these map directly to SQLite rows.
/// Distinct from the counsel-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: String,
}

pub struct VerificationRow {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub created_at: String,
    pub is_verified: bool,
}

pub struct SessionRow {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub session_id: String,
    pub content: String,
    pub is_user: bool,
    pub created_at: String,
    pub thinking_time: Option<f64>,
}

/// Session joined with its message count, for listings and analytics.
pub struct SessionWithCount {
    pub session: SessionRow,
    pub message_count: i64,
}

/// Per-session aggregate block for the admin analytics view.
pub struct SessionStats {
    pub total_messages: i64,
    pub user_messages: i64,
    pub ai_messages: i64,
    pub avg_thinking_time: Option<f64>,
    pub avg_user_message_length: Option<f64>,
    pub avg_ai_message_length: Option<f64>,
}
