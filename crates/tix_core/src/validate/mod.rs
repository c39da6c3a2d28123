use crate::domain::{IncidentReport, Severity};
use crate::error::AppError;

/// Severity handling for incoming reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeverityPolicy {
    /// Unrecognized severities are stored as given and get the default SLA window.
    #[default]
    PassThrough,
    /// Only LOW, MEDIUM, HIGH and CRITICAL are accepted.
    Strict,
}

fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::new(
            "VALIDATION_MISSING_FIELD",
            format!("Report is missing required field {field}"),
        ));
    }
    Ok(())
}

/// Reject reports that cannot be deduplicated or displayed. Runs before any store access.
pub fn validate_report(report: &IncidentReport, policy: SeverityPolicy) -> Result<(), AppError> {
    require_non_empty("project_id", &report.project_id)?;
    require_non_empty("fingerprint", &report.fingerprint)?;
    require_non_empty("title", &report.title)?;
    require_non_empty("severity", &report.severity)?;

    if policy == SeverityPolicy::Strict && Severity::parse(&report.severity).is_none() {
        return Err(AppError::new(
            "VALIDATION_UNKNOWN_SEVERITY",
            "Severity must be one of LOW, MEDIUM, HIGH, CRITICAL",
        )
        .with_details(format!("severity={}", report.severity)));
    }

    Ok(())
}
