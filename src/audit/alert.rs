//! Alert payloads pushed to the messaging endpoint.

use chrono::{DateTime, Local};

/// One immutable alert, created per proxied connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEntry {
    pub client_ip: String,
    pub target: String,
    pub created_at: DateTime<Local>,
    /// HTML-formatted message body.
    pub text: String,
}

impl NotificationEntry {
    pub fn new(client_ip: &str, target: &str) -> Self {
        Self::at(Local::now(), client_ip, target)
    }

    pub fn at(created_at: DateTime<Local>, client_ip: &str, target: &str) -> Self {
        let text = format!(
            "<b>[{}]</b>\n🌐 Proxy activity detected\n├ Client: <code>{}</code>\n└ Target: <code>{}</code>",
            created_at.format("%Y-%m-%d %H:%M:%S"),
            escape_html(client_ip),
            escape_html(target),
        );
        Self {
            client_ip: client_ip.to_string(),
            target: target.to_string(),
            created_at,
            text,
        }
    }
}

/// Escape the characters the HTML parse mode treats as markup.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn text_contains_client_and_target() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 8, 0, 5).unwrap();
        let entry = NotificationEntry::at(at, "10.0.0.5", "example.com:443");

        assert!(entry.text.starts_with("<b>[2024-05-01 08:00:05]</b>\n"));
        assert!(entry.text.contains("Client: <code>10.0.0.5</code>"));
        assert!(entry.text.ends_with("Target: <code>example.com:443</code>"));
    }

    #[test]
    fn markup_in_target_is_escaped() {
        let entry = NotificationEntry::new("1.2.3.4", "<script>&x");
        assert!(entry.text.contains("&lt;script&gt;&amp;x"));
        assert_eq!(entry.target, "<script>&x");
    }
}
