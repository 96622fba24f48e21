use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header,
};
use chrono::NaiveDateTime;
use tracing::{debug, error, warn};
use uuid::Uuid;

use counsel_db::models::MessageRow;
use counsel_db::{TS_FORMAT, now_ts};
use counsel_rag::{Answer, FALLBACK_ANSWER};
use counsel_types::api::{
    ChatMessageView, CreateSessionResponse, MessagePreview, MessagesResponse, SendMessageRequest,
    SendMessageResponse, SessionSummary, SessionsResponse,
};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::extract::{Attachment, augment_message};

const DEFAULT_SESSION_TITLE: &str = "New chat";
const TITLE_MAX_CHARS: usize = 50;

/// Prior messages attached to an outbound question.
const HISTORY_LIMIT: u32 = 10;

/// Upper bound on a send-message body, attachments included.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Session titles come from the first message, truncated with an ellipsis
/// marker. Character-based so multi-byte text never splits.
fn session_title(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn format_clock(ts: &str) -> String {
    format_ts(ts, "%H:%M")
}

fn format_day_minute(ts: &str) -> String {
    format_ts(ts, "%Y-%m-%d %H:%M")
}

fn format_ts(ts: &str, pattern: &str) -> String {
    match NaiveDateTime::parse_from_str(ts, TS_FORMAT) {
        Ok(ndt) => ndt.format(pattern).to_string(),
        Err(e) => {
            warn!("corrupt timestamp '{ts}': {e}");
            ts.to_string()
        }
    }
}

fn parse_id(id: &str, what: &str) -> Uuid {
    id.parse().unwrap_or_else(|e| {
        warn!("corrupt {what} id '{id}': {e}");
        Uuid::default()
    })
}

/// One prior turn of the conversation, in the role/content shape the answer
/// service would take for multi-turn context.
#[derive(Debug, serde::Serialize)]
struct ChatTurn {
    role: &'static str,
    content: String,
}

fn build_history(rows: &[MessageRow]) -> Vec<ChatTurn> {
    rows.iter()
        .map(|m| ChatTurn {
            role: if m.is_user { "user" } else { "assistant" },
            content: m.content.clone(),
        })
        .collect()
}

pub async fn send_message(
    State(state): State<AppState>,
    req: Request,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let (message, session_id, attachments) = read_send_request(&state, req).await?;

    let augmented = augment_message(message.trim(), &attachments);
    if augmented.trim().is_empty() {
        return Err(ApiError::Validation("Message content required".into()));
    }

    // The raw text titles a fresh session; attachment-only sends fall back
    // to the augmented body.
    let title_source = if message.trim().is_empty() {
        augmented.clone()
    } else {
        message.trim().to_string()
    };

    // The user message is durably persisted before the external call, so a
    // service outage never loses the user's input.
    let db_state = state.clone();
    let content = augmented.clone();
    let (session, user_msg_id, user_ts, history_rows) = blocking(move || {
        let session = match session_id {
            Some(sid) => db_state
                .db
                .get_session(&sid.to_string())?
                .ok_or_else(|| ApiError::NotFound("Chat session not found".into()))?,
            None => {
                let id = Uuid::new_v4().to_string();
                db_state
                    .db
                    .create_session(&id, &session_title(&title_source), &now_ts())?;
                db_state
                    .db
                    .get_session(&id)?
                    .ok_or_else(|| anyhow::anyhow!("session {id} vanished after create"))?
            }
        };

        let user_msg_id = Uuid::new_v4().to_string();
        let user_ts = now_ts();
        db_state
            .db
            .insert_message(&user_msg_id, &session.id, &content, true, &user_ts, None)?;

        let history_rows = db_state.db.get_history(&session.id, &user_msg_id, HISTORY_LIMIT)?;

        Ok((session, user_msg_id, user_ts, history_rows))
    })
    .await?;

    // Assembled for the day the answer service accepts multi-turn context;
    // its current contract takes only the latest question.
    let history = build_history(&history_rows);
    debug!(turns = history.len(), "assembled conversation history");

    let answer = match state.answers.answer(&augmented).await {
        Ok(answer) => answer,
        Err(e) => {
            error!("answer service error: {e}");
            Answer {
                content: FALLBACK_ANSWER.to_string(),
                thinking_time: 0.0,
            }
        }
    };

    let db_state = state.clone();
    let ai_content = answer.content.clone();
    let thinking_time = answer.thinking_time;
    let session_db_id = session.id.clone();
    let (ai_msg_id, ai_ts) = blocking(move || {
        let ai_msg_id = Uuid::new_v4().to_string();
        let ai_ts = now_ts();
        db_state.db.insert_message(
            &ai_msg_id,
            &session_db_id,
            &ai_content,
            false,
            &ai_ts,
            Some(thinking_time),
        )?;
        db_state.db.touch_session(&session_db_id, &ai_ts)?;
        Ok((ai_msg_id, ai_ts))
    })
    .await?;

    Ok(Json(SendMessageResponse {
        session_id: parse_id(&session.id, "session"),
        user_message: MessagePreview {
            id: parse_id(&user_msg_id, "message"),
            content: augmented,
            timestamp: format_clock(&user_ts),
            thinking_time: None,
        },
        ai_message: MessagePreview {
            id: parse_id(&ai_msg_id, "message"),
            content: answer.content,
            timestamp: format_clock(&ai_ts),
            thinking_time: Some(answer.thinking_time),
        },
    }))
}

/// Accepts either a JSON body or multipart/form-data with attachments.
async fn read_send_request(
    state: &AppState,
    req: Request,
) -> Result<(String, Option<Uuid>, Vec<Attachment>), ApiError> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if !is_multipart {
        let bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| ApiError::Validation(format!("unreadable request body: {e}")))?;
        let parsed: SendMessageRequest = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::Validation(format!("invalid JSON body: {e}")))?;
        return Ok((parsed.message, parsed.session_id, Vec::new()));
    }

    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?;

    let mut message = String::new();
    let mut session_id = None;
    let mut attachments = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("message") => {
                message = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("invalid message field: {e}")))?;
            }
            Some("session_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("invalid session_id field: {e}")))?;
                if !text.is_empty() {
                    session_id = Some(
                        Uuid::parse_str(&text)
                            .map_err(|_| ApiError::Validation("invalid session_id".into()))?,
                    );
                }
            }
            Some("attachments") => {
                let name = field.file_name().unwrap_or("attachment").to_string();
                let content_type = field.content_type().map(|ct| ct.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("unreadable attachment: {e}")))?
                    .to_vec();
                attachments.push(Attachment {
                    name,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }

    Ok((message, session_id, attachments))
}

pub async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let id = Uuid::new_v4();
    let db_state = state.clone();
    blocking(move || {
        db_state
            .db
            .create_session(&id.to_string(), DEFAULT_SESSION_TITLE, &now_ts())?;
        Ok(())
    })
    .await?;

    Ok(Json(CreateSessionResponse {
        session_id: id,
        title: DEFAULT_SESSION_TITLE.into(),
    }))
}

pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let db_state = state.clone();
    let rows = blocking(move || Ok(db_state.db.list_sessions()?)).await?;

    let sessions = rows
        .into_iter()
        .map(|row| SessionSummary {
            id: parse_id(&row.session.id, "session"),
            title: row.session.title,
            message_count: row.message_count,
            last_activity: format_day_minute(&row.session.updated_at),
        })
        .collect();

    Ok(Json(SessionsResponse { sessions }))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let db_state = state.clone();
    let rows = blocking(move || {
        let sid = session_id.to_string();
        db_state
            .db
            .get_session(&sid)?
            .ok_or_else(|| ApiError::NotFound("Chat session not found".into()))?;
        Ok(db_state.db.get_messages(&sid)?)
    })
    .await?;

    let messages = rows
        .into_iter()
        .map(|m| ChatMessageView {
            id: parse_id(&m.id, "message"),
            content: m.content,
            is_user: m.is_user,
            timestamp: format_clock(&m.created_at),
            thinking_time: m.thinking_time,
        })
        .collect();

    Ok(Json(MessagesResponse { messages }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_titles_verbatim() {
        assert_eq!(session_title("What is Article 21?"), "What is Article 21?");
    }

    #[test]
    fn fifty_chars_is_the_boundary() {
        let exactly = "x".repeat(50);
        assert_eq!(session_title(&exactly), exactly);

        let over = "x".repeat(51);
        let titled = session_title(&over);
        assert_eq!(titled, format!("{}...", "x".repeat(50)));
        assert_eq!(titled.chars().count(), 53);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "я".repeat(60);
        assert_eq!(session_title(&text), format!("{}...", "я".repeat(50)));
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock("2026-08-25 09:05:33.120"), "09:05");
        assert_eq!(format_day_minute("2026-08-25 09:05:33.120"), "2026-08-25 09:05");
        // Unparseable timestamps pass through untouched.
        assert_eq!(format_clock("garbage"), "garbage");
    }

    #[test]
    fn history_maps_roles() {
        let rows = vec![
            MessageRow {
                id: "a".into(),
                session_id: "s".into(),
                content: "question".into(),
                is_user: true,
                created_at: "2026-08-25 09:00:00.000".into(),
                thinking_time: None,
            },
            MessageRow {
                id: "b".into(),
                session_id: "s".into(),
                content: "answer".into(),
                is_user: false,
                created_at: "2026-08-25 09:00:01.000".into(),
                thinking_time: Some(0.0),
            },
        ];

        let turns = build_history(&rows);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
        assert_eq!(turns[1].content, "answer");
    }
}
