//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the alert credentials are present
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.notifier.bot_token.trim().is_empty() {
        errors.push(ValidationError::new(
            "notifier.bot_token",
            "must be set (TG_BOT_TOKEN)",
        ));
    }
    if config.notifier.chat_id.trim().is_empty() {
        errors.push(ValidationError::new(
            "notifier.chat_id",
            "must be set (TG_CHANNEL_ID)",
        ));
    }
    if url::Url::parse(&config.notifier.api_base).is_err() {
        errors.push(ValidationError::new(
            "notifier.api_base",
            format!("not a valid URL: {}", config.notifier.api_base),
        ));
    }
    if config.notifier.max_attempts == 0 {
        errors.push(ValidationError::new("notifier.max_attempts", "must be at least 1"));
    }
    if config.notifier.queue_capacity == 0 {
        errors.push(ValidationError::new("notifier.queue_capacity", "must be at least 1"));
    }
    if config.notifier.max_in_flight == 0 {
        errors.push(ValidationError::new("notifier.max_in_flight", "must be at least 1"));
    }

    if config.listener.http_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.http_address",
            format!("not a socket address: {}", config.listener.http_address),
        ));
    }
    if config.tls.enabled {
        let tls = &config.tls;
        if config.listener.https_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "listener.https_address",
                format!("not a socket address: {}", config.listener.https_address),
            ));
        }
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("tls.key_path", "must not be empty"));
        }
    }

    if config.tunnel.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "tunnel.connect_timeout_secs",
            "must be at least 1",
        ));
    }
    if config.access_log.path.is_empty() {
        errors.push(ValidationError::new("access_log.path", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
