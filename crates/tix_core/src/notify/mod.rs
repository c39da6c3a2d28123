use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Outbound chat channel. Delivery is best-effort: the lifecycle engine logs and drops errors.
pub trait Notifier: Send + Sync {
    fn notify(&self, text: &str) -> Result<(), AppError>;
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, text: &str) -> Result<(), AppError> {
        (**self).notify(text)
    }
}

/// Notifier used when no channel is configured. Every message is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn notify(&self, _text: &str) -> Result<(), AppError> {
        tracing::debug!("notification channel not configured; message dropped");
        Ok(())
    }
}

/// Keeps every message in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, text: &str) -> Result<(), AppError> {
        let mut guard = match self.sent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(text.to_string());
        Ok(())
    }
}

/// Ticket events announced on the chat channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    TicketCreated {
        project_id: String,
        severity: String,
        title: String,
        location: String,
    },
    TicketReopened {
        ticket_id: String,
        title: String,
    },
    SeverityEscalated {
        ticket_id: String,
        old_severity: String,
        new_severity: String,
    },
    TicketResolved {
        ticket_id: String,
        severity: String,
        sla_breached: bool,
    },
    SlaBreached {
        ticket_id: String,
        severity: String,
    },
}

pub(crate) fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}

impl Notification {
    pub fn text(&self) -> String {
        match self {
            Notification::TicketCreated {
                project_id,
                severity,
                title,
                location,
            } => format!(
                "🚨 New Ticket Created\nProject: {project_id}\nSeverity: {severity}\nTitle: {title}\nLocation: {location}"
            ),
            Notification::TicketReopened { ticket_id, title } => {
                format!("♻️ Ticket Reopened (Regression)\nTicket ID: {ticket_id}\nTitle: {title}")
            }
            Notification::SeverityEscalated {
                ticket_id,
                old_severity,
                new_severity,
            } => format!(
                "⬆️ Severity Escalated\nTicket ID: {ticket_id}\nOld: {old_severity}\nNew: {new_severity}"
            ),
            Notification::TicketResolved {
                ticket_id,
                severity,
                sla_breached,
            } => format!(
                "✅ Ticket Resolved\nTicket ID: {ticket_id}\nSeverity: {severity}\nSLA Breached: {}",
                yes_no(*sla_breached)
            ),
            Notification::SlaBreached {
                ticket_id,
                severity,
            } => format!("⏰ SLA BREACHED\nTicket ID: {ticket_id}\nSeverity: {severity}"),
        }
    }
}

/// Send each notification in order. Failures are logged and swallowed.
pub fn dispatch(notifier: &dyn Notifier, notifications: &[Notification]) {
    for n in notifications {
        if let Err(e) = notifier.notify(&n.text()) {
            tracing::warn!(
                code = %e.code,
                details = e.details.as_deref().unwrap_or(""),
                "failed to send notification: {}",
                e.message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenNotifier;

    impl Notifier for BrokenNotifier {
        fn notify(&self, _text: &str) -> Result<(), AppError> {
            Err(AppError::new("NOTIFY_UNREACHABLE", "down").with_retryable(true))
        }
    }

    #[test]
    fn resolved_text_reports_breach_flag() {
        let n = Notification::TicketResolved {
            ticket_id: "t1".to_string(),
            severity: "HIGH".to_string(),
            sla_breached: true,
        };
        assert_eq!(
            n.text(),
            "✅ Ticket Resolved\nTicket ID: t1\nSeverity: HIGH\nSLA Breached: YES"
        );
    }

    #[test]
    fn escalation_text_carries_old_and_new() {
        let n = Notification::SeverityEscalated {
            ticket_id: "t1".to_string(),
            old_severity: "LOW".to_string(),
            new_severity: "CRITICAL".to_string(),
        };
        let text = n.text();
        assert!(text.contains("Old: LOW"));
        assert!(text.contains("New: CRITICAL"));
    }

    #[test]
    fn dispatch_swallows_failures() {
        let notes = vec![Notification::SlaBreached {
            ticket_id: "t1".to_string(),
            severity: "LOW".to_string(),
        }];
        dispatch(&BrokenNotifier, &notes);
        dispatch(&DisabledNotifier, &notes);
    }

    #[test]
    fn recording_notifier_keeps_order() {
        let rec = RecordingNotifier::new();
        rec.notify("one").unwrap();
        rec.notify("two").unwrap();
        assert_eq!(rec.messages(), vec!["one".to_string(), "two".to_string()]);
    }
}
