//! Client for the external question-answering service.
//!
//! The service is an opaque HTTP dependency: `POST {url}` with
//! `{"question": "..."}` returns `{"status": "success", "answer": "..."}` or
//! `{"status": "...", "error": "..."}`. Anything else — timeout, connection
//! refused, non-2xx — is a service-unavailable condition that the chat flow
//! degrades into an in-band fallback message.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shown to the user in place of an answer when the service is unreachable.
pub const FALLBACK_ANSWER: &str =
    "Sorry, I'm having trouble connecting to the AI service. Please try again later.";

/// Shown when the service replies without an answer or error field.
pub const EMPTY_ANSWER: &str = "No response from AI service";

/// Bound on the whole outbound call. No retries behind it.
pub const ANSWER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("answer service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("answer service returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub content: String,
    /// The current service never reports one; kept for integrations that do.
    pub thinking_time: f64,
}

#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn answer(&self, question: &str) -> Result<Answer, AnswerError>;
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpAnswerClient {
    client: reqwest::Client,
    url: String,
}

impl HttpAnswerClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, ANSWER_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AnswerService for HttpAnswerClient {
    async fn answer(&self, question: &str) -> Result<Answer, AnswerError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&QueryRequest { question })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AnswerError::Status(resp.status()));
        }

        let body: QueryResponse = resp.json().await?;

        // A 2xx reply that isn't "success" still carries user-facing text in
        // its error field; it becomes the AI message rather than a failure.
        let content = if body.status == "success" {
            body.answer.unwrap_or_else(|| EMPTY_ANSWER.to_string())
        } else {
            body.error.unwrap_or_else(|| EMPTY_ANSWER.to_string())
        };

        Ok(Answer {
            content,
            thinking_time: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_payload_shape() {
        let body = serde_json::to_value(QueryRequest { question: "What is Article 21?" }).unwrap();
        assert_eq!(body, serde_json::json!({"question": "What is Article 21?"}));
    }

    #[test]
    fn response_parsing_tolerates_missing_fields() {
        let ok: QueryResponse =
            serde_json::from_str(r#"{"status":"success","answer":"Right to life"}"#).unwrap();
        assert_eq!(ok.status, "success");
        assert_eq!(ok.answer.as_deref(), Some("Right to life"));

        let err: QueryResponse = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert_eq!(err.answer, None);
        assert_eq!(err.error, None);
    }
}
