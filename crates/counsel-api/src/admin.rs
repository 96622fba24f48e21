//! Read-only analytics over the session/message store. Every value is
//! recomputed per request; there is no caching layer.

use std::collections::HashMap;

use axum::{Json, extract::Path, extract::State};
use chrono::{Days, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use counsel_db::TS_FORMAT;
use counsel_db::models::SessionWithCount;
use counsel_types::api::{
    ChatMessageView, DailyStat, DashboardResponse, SessionActivity, SessionAnalyticsResponse,
};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

const DAILY_WINDOW_DAYS: u64 = 7;
const TOP_SESSIONS: u32 = 10;

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>, ApiError> {
    let db_state = state.clone();
    let response = blocking(move || {
        let db = &db_state.db;

        let total_sessions = db.count_sessions()?;
        let total_messages = db.count_messages(None)?;
        let user_messages = db.count_messages(Some(true))?;
        let ai_messages = db.count_messages(Some(false))?;

        let recent_sessions = db.recent_sessions(TOP_SESSIONS)?;
        let most_active_sessions = db.most_active_sessions(TOP_SESSIONS)?;

        let avg_thinking_time = round2(db.avg_thinking_time()?.unwrap_or(0.0));

        // Last 7 days inclusive of today, zero-filled.
        let today = Utc::now().date_naive();
        let window_start = today - Days::new(DAILY_WINDOW_DAYS - 1);
        let since = window_start.format("%Y-%m-%d").to_string();

        let session_counts: HashMap<String, i64> =
            db.daily_session_counts(&since)?.into_iter().collect();
        let message_counts: HashMap<String, i64> =
            db.daily_message_counts(&since)?.into_iter().collect();

        let daily_stats = (0..DAILY_WINDOW_DAYS)
            .map(|offset| {
                let date = (window_start + Days::new(offset)).format("%Y-%m-%d").to_string();
                DailyStat {
                    sessions: session_counts.get(&date).copied().unwrap_or(0),
                    messages: message_counts.get(&date).copied().unwrap_or(0),
                    date,
                }
            })
            .collect();

        Ok(DashboardResponse {
            total_sessions,
            total_messages,
            user_messages,
            ai_messages,
            recent_sessions: recent_sessions.into_iter().map(session_activity).collect(),
            daily_stats,
            most_active_sessions: most_active_sessions
                .into_iter()
                .map(session_activity)
                .collect(),
            avg_thinking_time,
        })
    })
    .await?;

    Ok(Json(response))
}

pub async fn session_analytics(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionAnalyticsResponse>, ApiError> {
    let db_state = state.clone();
    let response = blocking(move || {
        let sid = session_id.to_string();
        let session = db_state
            .db
            .get_session(&sid)?
            .ok_or_else(|| ApiError::NotFound("Session not found".into()))?;

        let stats = db_state.db.session_stats(&sid)?;
        let rows = db_state.db.get_messages(&sid)?;

        let messages = rows
            .into_iter()
            .map(|m| ChatMessageView {
                id: parse_id(&m.id),
                content: m.content,
                is_user: m.is_user,
                timestamp: format_ts(&m.created_at, "%H:%M"),
                thinking_time: m.thinking_time,
            })
            .collect();

        Ok(SessionAnalyticsResponse {
            session_id,
            title: session.title,
            created_at: session.created_at,
            total_messages: stats.total_messages,
            user_messages: stats.user_messages,
            ai_messages: stats.ai_messages,
            avg_thinking_time: round2(stats.avg_thinking_time.unwrap_or(0.0)),
            avg_user_message_length: stats.avg_user_message_length.unwrap_or(0.0).round() as i64,
            avg_ai_message_length: stats.avg_ai_message_length.unwrap_or(0.0).round() as i64,
            messages,
        })
    })
    .await?;

    Ok(Json(response))
}

fn session_activity(row: SessionWithCount) -> SessionActivity {
    SessionActivity {
        id: parse_id(&row.session.id),
        title: row.session.title,
        message_count: row.message_count,
        updated_at: format_ts(&row.session.updated_at, "%Y-%m-%d %H:%M"),
    }
}

fn parse_id(id: &str) -> Uuid {
    id.parse().unwrap_or_else(|e| {
        warn!("corrupt session/message id '{id}': {e}");
        Uuid::default()
    })
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

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round2;

    #[test]
    fn rounding_to_two_places() {
        assert_eq!(round2(1.678), 1.68);
        assert_eq!(round2(2.0), 2.0);
        assert_eq!(round2(0.3333), 0.33);
    }
}
