use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared between the REST middleware and the handlers.
/// Canonical definition lives here in counsel-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub is_staff: bool,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Email verification --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    Verified,
    AlreadyVerified,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: VerifyStatus,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResendRequest {
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResendStatus {
    Sent,
    AlreadyVerified,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResendResponse {
    pub status: ResendStatus,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub username: String,
    pub email: String,
    pub is_verified: bool,
    /// When the current verification token was issued.
    pub token_created_at: String,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// A message as echoed back from the send call: formatted wall-clock
/// timestamp only, thinking_time present on AI messages.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessagePreview {
    pub id: Uuid,
    pub content: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_time: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub session_id: Uuid,
    pub user_message: MessagePreview,
    pub ai_message: MessagePreview,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub message_count: i64,
    pub last_activity: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessageView {
    pub id: Uuid,
    pub content: String,
    pub is_user: bool,
    pub timestamp: String,
    pub thinking_time: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<ChatMessageView>,
}

// -- Admin analytics --

#[derive(Debug, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: String,
    pub sessions: i64,
    pub messages: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionActivity {
    pub id: Uuid,
    pub title: String,
    pub message_count: i64,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub total_sessions: i64,
    pub total_messages: i64,
    pub user_messages: i64,
    pub ai_messages: i64,
    pub recent_sessions: Vec<SessionActivity>,
    pub daily_stats: Vec<DailyStat>,
    pub most_active_sessions: Vec<SessionActivity>,
    pub avg_thinking_time: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionAnalyticsResponse {
    pub session_id: Uuid,
    pub title: String,
    pub created_at: String,
    pub total_messages: i64,
    pub user_messages: i64,
    pub ai_messages: i64,
    pub avg_thinking_time: f64,
    pub avg_user_message_length: i64,
    pub avg_ai_message_length: i64,
    pub messages: Vec<ChatMessageView>,
}
