use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Duration;

/// SLA window applied to severities outside the recognized set.
pub const DEFAULT_SLA_DAYS: i64 = 7;

/// Recognized severity levels, ordered by rank.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn rank(self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn sla_days(self) -> i64 {
        match self {
            Severity::Low => 14,
            Severity::Medium => 7,
            Severity::High => 3,
            Severity::Critical => 1,
        }
    }

    pub fn sla_window(self) -> Duration {
        Duration::days(self.sla_days())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Parse a stored or reported severity. Matching is exact: `"high"` is not `HIGH`.
    pub fn parse(raw: &str) -> Option<Severity> {
        Severity::ALL.into_iter().find(|s| s.as_str() == raw)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rank of a raw severity string. Unrecognized values have no rank.
pub fn severity_rank(raw: &str) -> Option<u8> {
    Severity::parse(raw).map(Severity::rank)
}

/// Whether `incoming` outranks `stored`. Only two recognized severities can be compared, so a
/// ticket stored with an unrecognized severity is never escalated.
pub fn escalates(stored: &str, incoming: &str) -> bool {
    matches!(
        (severity_rank(stored), severity_rank(incoming)),
        (Some(old), Some(new)) if new > old
    )
}

/// SLA window of a raw severity string, falling back to [`DEFAULT_SLA_DAYS`].
pub fn sla_window(raw: &str) -> Duration {
    Severity::parse(raw)
        .map(Severity::sla_window)
        .unwrap_or_else(|| Duration::days(DEFAULT_SLA_DAYS))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    Resolved,
    Reopened,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "OPEN",
            TicketStatus::Resolved => "RESOLVED",
            TicketStatus::Reopened => "REOPENED",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(TicketStatus::Open),
            "RESOLVED" => Ok(TicketStatus::Resolved),
            "REOPENED" => Ok(TicketStatus::Reopened),
            other => Err(format!("unknown ticket status: {other}")),
        }
    }
}

/// A deduplicated ticket as persisted in the `tickets` table.
///
/// Notes:
/// - `severity` is stored exactly as reported; see [`Severity::parse`] for the recognized set.
/// - Timestamps are canonical RFC3339 UTC strings with whole-second precision.
/// - `sla_breached` only carries meaning once `status` is RESOLVED.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub ticket_id: String,
    pub project_id: String,
    pub fingerprint: String,
    pub title: String,
    pub severity: String,
    pub category: String,
    pub location: String,
    pub status: TicketStatus,
    pub first_seen: String,
    pub last_seen: String,
    pub sla_due_at: Option<String>,
    pub resolved_at: Option<String>,
    pub sla_breached: bool,
}

/// An incoming incident report. `(project_id, fingerprint)` is the dedup key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentReport {
    pub project_id: String,
    pub fingerprint: String,
    pub title: String,
    pub severity: String,
    pub category: String,
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_table_is_fixed() {
        let table: Vec<(&str, u8, i64)> = Severity::ALL
            .iter()
            .map(|s| (s.as_str(), s.rank(), s.sla_days()))
            .collect();
        assert_eq!(
            table,
            vec![
                ("LOW", 1, 14),
                ("MEDIUM", 2, 7),
                ("HIGH", 3, 3),
                ("CRITICAL", 4, 1)
            ]
        );
    }

    #[test]
    fn enum_order_matches_rank() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn unrecognized_severity_falls_back() {
        assert_eq!(Severity::parse("SEV1"), None);
        assert_eq!(Severity::parse("high"), None);
        assert_eq!(severity_rank("SEV1"), None);
        assert_eq!(severity_rank("HIGH"), Some(3));
        assert_eq!(sla_window("SEV1"), Duration::days(7));
        assert_eq!(sla_window("CRITICAL"), Duration::days(1));
    }

    #[test]
    fn escalation_needs_two_recognized_severities() {
        assert!(escalates("LOW", "HIGH"));
        assert!(!escalates("HIGH", "HIGH"));
        assert!(!escalates("CRITICAL", "LOW"));
        assert!(!escalates("SEV9", "CRITICAL"));
        assert!(!escalates("LOW", "SEV9"));
    }

    #[test]
    fn status_round_trips_through_text() {
        for s in [TicketStatus::Open, TicketStatus::Resolved, TicketStatus::Reopened] {
            assert_eq!(s.as_str().parse::<TicketStatus>(), Ok(s));
        }
        assert!("CLOSED".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_stored_text() {
        let json = serde_json::to_string(&TicketStatus::Reopened).unwrap();
        assert_eq!(json, "\"REOPENED\"");
    }
}
