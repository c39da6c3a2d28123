use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::error::AppError;

/// Canonical form of an instant: UTC, whole seconds.
///
/// Stored timestamps are RFC3339 strings of this form, so lexical order matches
/// chronological order and `ORDER BY last_seen` works on the raw column.
pub fn truncate_to_seconds(dt: OffsetDateTime) -> OffsetDateTime {
    let utc = dt.to_offset(UtcOffset::UTC);
    utc.replace_nanosecond(0).unwrap_or(utc)
}

pub fn now_utc() -> OffsetDateTime {
    truncate_to_seconds(OffsetDateTime::now_utc())
}

pub fn format_ts(dt: OffsetDateTime) -> Result<String, AppError> {
    truncate_to_seconds(dt).format(&Rfc3339).map_err(|e| {
        AppError::new("TS_FORMAT_FAILED", "Failed to format timestamp").with_details(e.to_string())
    })
}

pub fn parse_ts(field: &str, raw: &str) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|e| {
        AppError::new("DB_DECODE_FAILED", format!("Stored {field} is not RFC3339"))
            .with_details(format!("value={raw}; err={e}"))
    })
}
