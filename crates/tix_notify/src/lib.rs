//! Chat notifications over an incoming-webhook URL (Slack-compatible `{"text": ...}` payload).

use std::time::Duration;

use serde::Serialize;
use tix_core::error::AppError;
use tix_core::notify::{DisabledNotifier, Notifier};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`. Only `http://` and `https://` URLs are accepted.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, AppError> {
        let url = url.trim().to_string();
        let has_host = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'));
        if !has_host {
            return Err(AppError::new(
                "NOTIFY_INVALID_URL",
                "Webhook URL must be an http(s) URL with a host",
            )
            .with_details(format!("url={url}")));
        }
        Ok(Self { url, timeout })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, text: &str) -> Result<(), AppError> {
        let body = serde_json::to_value(WebhookPayload { text }).map_err(|e| {
            AppError::new("NOTIFY_ENCODE_FAILED", "Failed to encode webhook payload")
                .with_details(e.to_string())
        })?;

        let resp = ureq::post(&self.url).timeout(self.timeout).send_json(body);

        match resp {
            Ok(r) if (200..300).contains(&r.status()) => Ok(()),
            Ok(r) => Err(AppError::new("NOTIFY_REJECTED", "Webhook rejected the message")
                .with_details(format!("status={}", r.status()))),
            Err(ureq::Error::Status(code, _)) => Err(AppError::new(
                "NOTIFY_REJECTED",
                "Webhook rejected the message",
            )
            .with_details(format!("status={code}"))
            .with_retryable(code >= 500)),
            Err(e) => Err(AppError::new("NOTIFY_UNREACHABLE", "Failed to reach webhook")
                .with_details(e.to_string())
                .with_retryable(true)),
        }
    }
}

/// Build the notifier for the configured webhook.
///
/// No URL means notifications are disabled; an unusable URL is logged and also disables them,
/// so a misconfigured channel never blocks ticket operations.
pub fn notifier_from_config(url: Option<&str>, timeout: Duration) -> Box<dyn Notifier> {
    let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        tracing::warn!("webhook URL not configured; notifications disabled");
        return Box::new(DisabledNotifier);
    };

    match WebhookNotifier::new(url, timeout) {
        Ok(n) => Box::new(n),
        Err(e) => {
            tracing::warn!(code = %e.code, "invalid webhook URL; notifications disabled");
            Box::new(DisabledNotifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_http_urls_with_host() {
        assert!(WebhookNotifier::new("https://hooks.slack.com/services/T/B/X", DEFAULT_TIMEOUT).is_ok());
        assert!(WebhookNotifier::new("http://127.0.0.1:9000/hook", DEFAULT_TIMEOUT).is_ok());
        assert!(WebhookNotifier::new(" https://example.com ", DEFAULT_TIMEOUT).is_ok());

        assert!(WebhookNotifier::new("", DEFAULT_TIMEOUT).is_err());
        assert!(WebhookNotifier::new("https://", DEFAULT_TIMEOUT).is_err());
        assert!(WebhookNotifier::new("https:///path", DEFAULT_TIMEOUT).is_err());
        assert!(WebhookNotifier::new("ftp://example.com", DEFAULT_TIMEOUT).is_err());
        assert!(WebhookNotifier::new("hooks.slack.com/services", DEFAULT_TIMEOUT).is_err());
    }

    #[test]
    fn trims_configured_url() {
        let n = WebhookNotifier::new("  https://example.com/hook\n", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(n.url(), "https://example.com/hook");
    }

    #[test]
    fn missing_or_bad_url_disables_notifications() {
        assert!(notifier_from_config(None, DEFAULT_TIMEOUT).notify("x").is_ok());
        assert!(notifier_from_config(Some("   "), DEFAULT_TIMEOUT).notify("x").is_ok());
        assert!(notifier_from_config(Some("not a url"), DEFAULT_TIMEOUT).notify("x").is_ok());
    }
}
