//! Transactional email boundary.
//!
//! Templates are built server-side as HTML with a plain-text fallback derived
//! by stripping markup. Delivery goes through a mail-relay HTTP endpoint; the
//! relay itself (SMTP, provider API) is outside this repository.

pub mod templates;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Plain-text alternative, derived from the HTML body.
    pub text: String,
}

impl Email {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: String) -> Self {
        let text = strip_tags(&html);
        Self {
            to: to.into(),
            subject: subject.into(),
            html,
            text,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Posts each email as JSON to the configured relay endpoint.
pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
}

impl HttpMailer {
    pub fn new(relay_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            relay_url: relay_url.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let resp = self.client.post(&self.relay_url).json(&email).send().await?;

        if !resp.status().is_success() {
            return Err(MailError::Status(resp.status()));
        }
        Ok(())
    }
}

/// Drops HTML tags and collapses the remaining whitespace, for the
/// plain-text body of an otherwise HTML email.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_tags_flattens_markup() {
        let html = "<html><body><h2>Hello</h2>\n<p>Verify your  email</p></body></html>";
        assert_eq!(strip_tags(html), "Hello Verify your email");
    }

    #[test]
    fn strip_tags_passes_plain_text_through() {
        assert_eq!(strip_tags("no markup here"), "no markup here");
    }

    #[test]
    fn email_derives_text_alternative() {
        let email = Email::new("a@b.c", "Subject", "<p>Body</p>".to_string());
        assert_eq!(email.text, "Body");
    }
}
