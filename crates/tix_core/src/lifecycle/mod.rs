//! Ticket lifecycle: deduplication, escalation, reopen and SLA breach.
//!
//! `decide_*` functions are pure: given the stored ticket (if any), the incoming event and the
//! current instant they return the writes to perform and the notifications to announce.
//! `ingest_report` and `resolve_ticket` run those decisions inside one write transaction and
//! dispatch notifications only after the commit succeeded.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db;
use crate::domain::{escalates, sla_window, IncidentReport, Ticket, TicketStatus};
use crate::error::AppError;
use crate::notify::{dispatch, Notification, Notifier};
use crate::repo::{self, Resolution, TicketUpdate};
use crate::timestamps::{format_ts, parse_ts, truncate_to_seconds};
use crate::validate::{validate_report, SeverityPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestDecision {
    Create {
        ticket: Ticket,
        notifications: Vec<Notification>,
    },
    Update {
        ticket_id: String,
        update: TicketUpdate,
        reopened: bool,
        escalated: bool,
        notifications: Vec<Notification>,
    },
}

impl IngestDecision {
    pub fn notifications(&self) -> &[Notification] {
        match self {
            IngestDecision::Create { notifications, .. } => notifications,
            IngestDecision::Update { notifications, .. } => notifications,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestResult {
    pub ticket_id: String,
    pub created: bool,
    pub reopened: bool,
    pub escalated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveDecision {
    pub resolution: Resolution,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolveResult {
    pub ticket_id: String,
    pub status: TicketStatus,
    pub sla_breached: bool,
}

fn due_at(severity: &str, now: OffsetDateTime) -> Result<String, AppError> {
    format_ts(now + sla_window(severity))
}

/// Decide what a report does to the ticket stored under its dedup key.
pub fn decide_ingest(
    existing: Option<&Ticket>,
    report: &IncidentReport,
    now: OffsetDateTime,
) -> Result<IngestDecision, AppError> {
    let now = truncate_to_seconds(now);

    let Some(ticket) = existing else {
        let now_s = format_ts(now)?;
        let ticket = Ticket {
            ticket_id: Uuid::new_v4().to_string(),
            project_id: report.project_id.clone(),
            fingerprint: report.fingerprint.clone(),
            title: report.title.clone(),
            severity: report.severity.clone(),
            category: report.category.clone(),
            location: report.location.clone(),
            status: TicketStatus::Open,
            first_seen: now_s.clone(),
            last_seen: now_s,
            sla_due_at: Some(due_at(&report.severity, now)?),
            resolved_at: None,
            sla_breached: false,
        };
        let notifications = vec![Notification::TicketCreated {
            project_id: ticket.project_id.clone(),
            severity: ticket.severity.clone(),
            title: ticket.title.clone(),
            location: ticket.location.clone(),
        }];
        return Ok(IngestDecision::Create {
            ticket,
            notifications,
        });
    };

    let mut notifications = Vec::new();

    // last_seen never moves backwards, even if the caller's clock does.
    let stored_last_seen = parse_ts("last_seen", &ticket.last_seen)?;
    let last_seen = format_ts(stored_last_seen.max(now))?;

    let reopened = ticket.status == TicketStatus::Resolved;
    let status = if reopened {
        notifications.push(Notification::TicketReopened {
            ticket_id: ticket.ticket_id.clone(),
            title: ticket.title.clone(),
        });
        TicketStatus::Reopened
    } else {
        ticket.status
    };

    let escalated = escalates(&ticket.severity, &report.severity);
    let (severity, sla_due_at) = if escalated {
        notifications.push(Notification::SeverityEscalated {
            ticket_id: ticket.ticket_id.clone(),
            old_severity: ticket.severity.clone(),
            new_severity: report.severity.clone(),
        });
        (report.severity.clone(), Some(due_at(&report.severity, now)?))
    } else {
        (ticket.severity.clone(), ticket.sla_due_at.clone())
    };

    Ok(IngestDecision::Update {
        ticket_id: ticket.ticket_id.clone(),
        update: TicketUpdate {
            status,
            severity,
            sla_due_at,
            last_seen,
        },
        reopened,
        escalated,
        notifications,
    })
}

/// Decide the resolution of a ticket at `now`. Breach means the due date strictly passed.
pub fn decide_resolve(ticket: &Ticket, now: OffsetDateTime) -> Result<ResolveDecision, AppError> {
    let now = truncate_to_seconds(now);

    let sla_breached = match ticket.sla_due_at.as_deref() {
        Some(raw) => parse_ts("sla_due_at", raw)? < now,
        None => false,
    };

    let mut notifications = vec![Notification::TicketResolved {
        ticket_id: ticket.ticket_id.clone(),
        severity: ticket.severity.clone(),
        sla_breached,
    }];
    if sla_breached {
        notifications.push(Notification::SlaBreached {
            ticket_id: ticket.ticket_id.clone(),
            severity: ticket.severity.clone(),
        });
    }

    Ok(ResolveDecision {
        resolution: Resolution {
            resolved_at: format_ts(now)?,
            sla_breached,
        },
        notifications,
    })
}

/// Create or update the ticket for a report, atomically.
///
/// Either the whole decision is committed or nothing is written. Notifications go out after
/// the commit and never fail the call.
pub fn ingest_report(
    conn: &mut Connection,
    notifier: &dyn Notifier,
    report: &IncidentReport,
    now: OffsetDateTime,
) -> Result<IngestResult, AppError> {
    validate_report(report, SeverityPolicy::PassThrough)?;

    let tx = db::begin_write(conn)?;
    let existing = repo::find_by_key(&tx, &report.project_id, &report.fingerprint)?;
    let decision = decide_ingest(existing.as_ref(), report, now)?;

    let result = match &decision {
        IngestDecision::Create { ticket, .. } => {
            repo::insert_ticket(&tx, ticket)?;
            IngestResult {
                ticket_id: ticket.ticket_id.clone(),
                created: true,
                reopened: false,
                escalated: false,
            }
        }
        IngestDecision::Update {
            ticket_id,
            update,
            reopened,
            escalated,
            ..
        } => {
            repo::update_ticket(&tx, ticket_id, update)?;
            IngestResult {
                ticket_id: ticket_id.clone(),
                created: false,
                reopened: *reopened,
                escalated: *escalated,
            }
        }
    };

    tx.commit()
        .map_err(|e| AppError::from_db("DB_TX_FAILED", "Failed to commit ticket ingestion", e))?;

    if result.created {
        tracing::info!(
            ticket_id = %result.ticket_id,
            project_id = %report.project_id,
            severity = %report.severity,
            "ticket created"
        );
    } else if result.reopened || result.escalated {
        tracing::info!(
            ticket_id = %result.ticket_id,
            project_id = %report.project_id,
            reopened = result.reopened,
            escalated = result.escalated,
            "ticket updated"
        );
    } else {
        tracing::debug!(ticket_id = %result.ticket_id, "duplicate report; last_seen refreshed");
    }

    dispatch(notifier, decision.notifications());
    Ok(result)
}

/// Resolve a ticket and record whether its SLA was breached.
pub fn resolve_ticket(
    conn: &mut Connection,
    notifier: &dyn Notifier,
    ticket_id: &str,
    now: OffsetDateTime,
) -> Result<ResolveResult, AppError> {
    let tx = db::begin_write(conn)?;
    let ticket = repo::get_ticket(&tx, ticket_id)?;
    let decision = decide_resolve(&ticket, now)?;
    repo::mark_resolved(&tx, ticket_id, &decision.resolution)?;
    tx.commit()
        .map_err(|e| AppError::from_db("DB_TX_FAILED", "Failed to commit ticket resolution", e))?;

    tracing::info!(
        ticket_id = %ticket_id,
        sla_breached = decision.resolution.sla_breached,
        "ticket resolved"
    );

    dispatch(notifier, &decision.notifications);
    Ok(ResolveResult {
        ticket_id: ticket_id.to_string(),
        status: TicketStatus::Resolved,
        sla_breached: decision.resolution.sla_breached,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    fn report(severity: &str) -> IncidentReport {
        IncidentReport {
            project_id: "p1".to_string(),
            fingerprint: "fp1".to_string(),
            title: "Disk full".to_string(),
            severity: severity.to_string(),
            category: "infra".to_string(),
            location: "db-01".to_string(),
        }
    }

    fn created(severity: &str, now: OffsetDateTime) -> Ticket {
        match decide_ingest(None, &report(severity), now).unwrap() {
            IngestDecision::Create { ticket, .. } => ticket,
            other => panic!("expected create, got {other:?}"),
        }
    }

    fn update_of(decision: IngestDecision) -> (TicketUpdate, bool, bool, Vec<Notification>) {
        match decision {
            IngestDecision::Update {
                update,
                reopened,
                escalated,
                notifications,
                ..
            } => (update, reopened, escalated, notifications),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn create_sets_open_and_sla_window() {
        let t0 = datetime!(2026-01-01 12:00:00 UTC);
        let crit = created("CRITICAL", t0);
        assert_eq!(crit.status, TicketStatus::Open);
        assert_eq!(crit.first_seen, "2026-01-01T12:00:00Z");
        assert_eq!(crit.last_seen, crit.first_seen);
        assert_eq!(crit.sla_due_at.as_deref(), Some("2026-01-02T12:00:00Z"));

        let low = created("LOW", t0);
        assert_eq!(low.sla_due_at.as_deref(), Some("2026-01-15T12:00:00Z"));

        let unknown = created("SEV9", t0);
        assert_eq!(unknown.severity, "SEV9");
        assert_eq!(unknown.sla_due_at.as_deref(), Some("2026-01-08T12:00:00Z"));
    }

    #[test]
    fn create_announces_new_ticket() {
        let d = decide_ingest(None, &report("HIGH"), datetime!(2026-01-01 00:00 UTC)).unwrap();
        assert_eq!(
            d.notifications(),
            &[Notification::TicketCreated {
                project_id: "p1".to_string(),
                severity: "HIGH".to_string(),
                title: "Disk full".to_string(),
                location: "db-01".to_string(),
            }]
        );
    }

    #[test]
    fn same_severity_only_refreshes_last_seen() {
        let t0 = datetime!(2026-01-01 00:00 UTC);
        let ticket = created("MEDIUM", t0);
        let t1 = datetime!(2026-01-02 06:30 UTC);
        let (update, reopened, escalated, notes) =
            update_of(decide_ingest(Some(&ticket), &report("MEDIUM"), t1).unwrap());

        assert_eq!(
            update,
            TicketUpdate {
                status: TicketStatus::Open,
                severity: "MEDIUM".to_string(),
                sla_due_at: ticket.sla_due_at.clone(),
                last_seen: "2026-01-02T06:30:00Z".to_string(),
            }
        );
        assert!(!reopened);
        assert!(!escalated);
        assert!(notes.is_empty());
    }

    #[test]
    fn higher_severity_escalates_and_recomputes_due() {
        let ticket = created("LOW", datetime!(2026-01-01 00:00 UTC));
        let t1 = datetime!(2026-01-03 00:00 UTC);
        let (update, _, escalated, notes) =
            update_of(decide_ingest(Some(&ticket), &report("HIGH"), t1).unwrap());

        assert!(escalated);
        assert_eq!(update.severity, "HIGH");
        assert_eq!(update.sla_due_at.as_deref(), Some("2026-01-06T00:00:00Z"));
        assert_eq!(
            notes,
            vec![Notification::SeverityEscalated {
                ticket_id: ticket.ticket_id.clone(),
                old_severity: "LOW".to_string(),
                new_severity: "HIGH".to_string(),
            }]
        );
    }

    #[test]
    fn lower_severity_never_downgrades() {
        let ticket = created("CRITICAL", datetime!(2026-01-01 00:00 UTC));
        for sev in ["LOW", "MEDIUM", "HIGH", "CRITICAL", "BOGUS"] {
            let (update, _, escalated, _) = update_of(
                decide_ingest(Some(&ticket), &report(sev), datetime!(2026-01-01 01:00 UTC)).unwrap(),
            );
            assert!(!escalated, "{sev} must not escalate CRITICAL");
            assert_eq!(update.severity, "CRITICAL");
            assert_eq!(update.sla_due_at, ticket.sla_due_at);
        }
    }

    #[test]
    fn unrecognized_stored_severity_is_never_escalated() {
        let ticket = created("SEV9", datetime!(2026-01-01 00:00 UTC));
        for sev in ["LOW", "CRITICAL"] {
            let (update, _, escalated, notes) = update_of(
                decide_ingest(Some(&ticket), &report(sev), datetime!(2026-01-01 01:00 UTC)).unwrap(),
            );
            assert!(!escalated, "{sev} must not replace SEV9");
            assert_eq!(update.severity, "SEV9");
            assert_eq!(update.sla_due_at.as_deref(), Some("2026-01-08T00:00:00Z"));
            assert!(notes.is_empty());
        }
    }

    #[test]
    fn resolved_ticket_reopens() {
        let mut ticket = created("HIGH", datetime!(2026-01-01 00:00 UTC));
        ticket.status = TicketStatus::Resolved;
        let (update, reopened, escalated, notes) = update_of(
            decide_ingest(Some(&ticket), &report("LOW"), datetime!(2026-01-02 00:00 UTC)).unwrap(),
        );
        assert!(reopened);
        assert!(!escalated);
        assert_eq!(update.status, TicketStatus::Reopened);
        assert_eq!(update.severity, "HIGH");
        assert_eq!(update.last_seen, "2026-01-02T00:00:00Z");
        assert_eq!(
            notes,
            vec![Notification::TicketReopened {
                ticket_id: ticket.ticket_id.clone(),
                title: "Disk full".to_string(),
            }]
        );
    }

    #[test]
    fn reopened_ticket_stays_reopened() {
        let mut ticket = created("LOW", datetime!(2026-01-01 00:00 UTC));
        ticket.status = TicketStatus::Reopened;
        let (update, reopened, _, _) = update_of(
            decide_ingest(Some(&ticket), &report("LOW"), datetime!(2026-01-02 00:00 UTC)).unwrap(),
        );
        assert!(!reopened);
        assert_eq!(update.status, TicketStatus::Reopened);
    }

    #[test]
    fn last_seen_does_not_move_backwards() {
        let ticket = created("LOW", datetime!(2026-01-05 00:00 UTC));
        let (update, _, _, _) = update_of(
            decide_ingest(Some(&ticket), &report("LOW"), datetime!(2026-01-04 00:00 UTC)).unwrap(),
        );
        assert_eq!(update.last_seen, "2026-01-05T00:00:00Z");
    }

    #[test]
    fn breach_requires_strictly_past_due_date() {
        let ticket = created("CRITICAL", datetime!(2026-01-01 00:00 UTC));

        let before = decide_resolve(&ticket, datetime!(2026-01-01 23:59:59 UTC)).unwrap();
        assert!(!before.resolution.sla_breached);
        assert_eq!(before.notifications.len(), 1);

        let at_due = decide_resolve(&ticket, datetime!(2026-01-02 00:00:00 UTC)).unwrap();
        assert!(!at_due.resolution.sla_breached);

        let after = decide_resolve(&ticket, datetime!(2026-01-02 00:00:01 UTC)).unwrap();
        assert!(after.resolution.sla_breached);
        assert_eq!(after.resolution.resolved_at, "2026-01-02T00:00:01Z");
        assert_eq!(
            after.notifications[1],
            Notification::SlaBreached {
                ticket_id: ticket.ticket_id.clone(),
                severity: "CRITICAL".to_string(),
            }
        );
    }

    #[test]
    fn no_due_date_never_breaches() {
        let mut ticket = created("LOW", datetime!(2020-01-01 00:00 UTC));
        ticket.sla_due_at = None;
        let d = decide_resolve(&ticket, datetime!(2026-01-01 00:00 UTC)).unwrap();
        assert!(!d.resolution.sla_breached);
    }
}
