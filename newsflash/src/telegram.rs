use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

/// Default public Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Characters the MarkdownV2 dialect reserves; each must be escaped in
/// message text or Telegram rejects the send.
pub const RESERVED_CHARS: &str = "_*[]()~`>#+-=|{}.!";

/// Prefix every reserved MarkdownV2 character with a single backslash.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if RESERVED_CHARS.contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Delivery seam for formatted notifications. Send failures are reported to
/// the caller and not retried here.
#[async_trait::async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// Telegram Bot API client for message delivery
pub struct TelegramChannel {
    api_base: String,
    token: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            timeout: Duration::from_secs(10),
            client: reqwest::Client::new(),
        }
    }

    /// Override the API host (tests point this at a local mock server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait::async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        let req_body = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "MarkdownV2",
        };

        // Make HTTP request with timeout
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(self.send_message_url())
                .header("Content-Type", "application/json")
                .json(&req_body)
                .send(),
        )
        .await
        .context("Telegram request timed out")?
        .context("Telegram HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error {}: {}", status, body);
        }

        Ok(())
    }
}

// Bot API request structure
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}
