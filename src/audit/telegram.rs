//! Messaging API client (Telegram Bot API `sendMessage`).

use reqwest::StatusCode;
use serde::Serialize;

use crate::config::NotifierConfig;

/// Why a single delivery attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("API responded with status {0}")]
    Status(StatusCode),
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Posts alert text to one chat.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    endpoint: String,
    chat_id: String,
    parse_mode: String,
}

impl TelegramClient {
    pub fn new(config: &NotifierConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
            chat_id: config.chat_id.clone(),
            parse_mode: config.parse_mode.clone(),
        })
    }

    /// Single attempt. Any 2xx counts as delivered.
    pub async fn send(&self, text: &str) -> Result<(), SendError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: &self.parse_mode,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            // The URL carries the bot token.
            .map_err(|e| SendError::Transport(e.without_url()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SendError::Status(status))
        }
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("chat_id", &self.chat_id)
            .field("parse_mode", &self.parse_mode)
            .finish_non_exhaustive()
    }
}
