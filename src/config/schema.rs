//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (plain and TLS bind addresses).
    pub listener: ListenerConfig,

    /// TLS listener settings.
    pub tls: TlsConfig,

    /// CONNECT tunnel settings.
    pub tunnel: TunnelConfig,

    /// External alert delivery settings.
    pub notifier: NotifierConfig,

    /// Local access log settings.
    pub access_log: AccessLogConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            tls: TlsConfig::default(),
            tunnel: TunnelConfig::default(),
            notifier: NotifierConfig::default(),
            access_log: AccessLogConfig::default(),
            observability: ObservabilityConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Plain HTTP bind address (e.g., "0.0.0.0:80").
    pub http_address: String,

    /// TLS bind address (e.g., "0.0.0.0:443").
    pub https_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            http_address: "0.0.0.0:80".to_string(),
            https_address: "0.0.0.0:443".to_string(),
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Serve the TLS listener. `false` leaves only the plain listener.
    pub enabled: bool,

    /// Path to certificate chain file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cert_path: "/etc/ssl/certs/fullchain.pem".to_string(),
            key_path: "/etc/ssl/private/privkey.pem".to_string(),
        }
    }
}

/// CONNECT tunnel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Upstream dial timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl TunnelConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
        }
    }
}

/// Alert delivery configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Bot API token. Overridden by `TG_BOT_TOKEN`.
    pub bot_token: String,

    /// Destination chat/channel id. Overridden by `TG_CHANNEL_ID`.
    pub chat_id: String,

    /// Base URL of the messaging API.
    pub api_base: String,

    /// Markup mode sent with every message.
    pub parse_mode: String,

    /// Total delivery attempts per alert (first try included).
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds.
    pub backoff_ms: u64,

    /// Per-attempt HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Capacity of the pending-alert queue.
    pub queue_capacity: usize,

    /// Deliveries allowed in flight at once.
    pub max_in_flight: usize,
}

impl NotifierConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .field("parse_mode", &self.parse_mode)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_ms", &self.backoff_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("queue_capacity", &self.queue_capacity)
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_string(),
            parse_mode: "HTML".to_string(),
            max_attempts: 3,
            backoff_ms: 2000,
            request_timeout_secs: 10,
            queue_capacity: 1024,
            max_in_flight: 16,
        }
    }
}

/// Local access log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessLogConfig {
    /// Append-only log file path.
    pub path: String,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            path: "/var/log/honeypot.log".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for live tunnels to unwind, in seconds.
    pub grace_secs: u64,
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.http_address, "0.0.0.0:80");
        assert_eq!(config.listener.https_address, "0.0.0.0:443");
        assert!(config.tls.enabled);
        assert_eq!(config.tunnel.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.notifier.max_attempts, 3);
        assert_eq!(config.notifier.backoff(), Duration::from_secs(2));
        assert_eq!(config.notifier.parse_mode, "HTML");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [notifier]
            bot_token = "abc"
            chat_id = "-100"
            backoff_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.notifier.bot_token, "abc");
        assert_eq!(config.notifier.backoff_ms, 50);
        assert_eq!(config.notifier.max_attempts, 3);
        assert_eq!(config.access_log.path, "/var/log/honeypot.log");
    }

    #[test]
    fn missing_tls_table_keeps_listener_enabled() {
        let config: ProxyConfig = toml::from_str("[notifier]\nbot_token = \"t\"\nchat_id = \"c\"").unwrap();
        assert!(config.tls.enabled);
        assert_eq!(config.tls.cert_path, "/etc/ssl/certs/fullchain.pem");
    }

    #[test]
    fn tls_listener_can_be_switched_off() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [tls]
            enabled = false
            "#,
        )
        .unwrap();

        assert!(!config.tls.enabled);
        assert_eq!(config.tls.key_path, "/etc/ssl/private/privkey.pem");

        let rendered = toml::to_string(&config).unwrap();
        let reparsed: ProxyConfig = toml::from_str(&rendered).unwrap();
        assert!(!reparsed.tls.enabled);
    }

    #[test]
    fn debug_output_hides_token() {
        let mut notifier = NotifierConfig::default();
        notifier.bot_token = "secret-token".into();
        assert!(!format!("{:?}", notifier).contains("secret-token"));
    }
}
