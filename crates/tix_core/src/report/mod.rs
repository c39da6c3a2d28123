use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::domain::Ticket;
use crate::error::AppError;
use crate::notify::yes_no;
use crate::repo::get_ticket;

/// Render a single ticket as a deterministic Markdown summary.
pub fn render_ticket_summary(ticket: &Ticket) -> String {
    let mut out = String::new();
    out.push_str("# Ticket Summary\n\n");
    out.push_str(&format!("- Ticket ID: {}\n", ticket.ticket_id));
    out.push_str(&format!("- Project: {}\n", ticket.project_id));
    out.push_str(&format!("- Title: {}\n", ticket.title));
    out.push_str(&format!("- Severity: {}\n", ticket.severity));
    out.push_str(&format!("- Category: {}\n", ticket.category));
    out.push_str(&format!("- Location: {}\n", ticket.location));
    out.push_str(&format!("- Status: {}\n", ticket.status));
    out.push_str(&format!("- First Seen: {}\n", ticket.first_seen));
    out.push_str(&format!("- Last Seen: {}\n", ticket.last_seen));
    out.push_str(&format!(
        "- SLA Due: {}\n",
        ticket.sla_due_at.as_deref().unwrap_or("N/A")
    ));
    out.push_str(&format!("- SLA Breached: {}\n", yes_no(ticket.sla_breached)));
    out
}

/// Write `ticket-<id>.md` into `dest_dir` and return its path.
pub fn export_ticket_summary(
    conn: &Connection,
    ticket_id: &str,
    dest_dir: &Path,
) -> Result<PathBuf, AppError> {
    let ticket = get_ticket(conn, ticket_id)?;

    std::fs::create_dir_all(dest_dir).map_err(|e| {
        AppError::new("EXPORT_DIR_FAILED", "Failed to create export directory")
            .with_details(format!("path={}; err={}", dest_dir.display(), e))
    })?;

    let path = dest_dir.join(format!("ticket-{}.md", ticket.ticket_id));
    std::fs::write(&path, render_ticket_summary(&ticket)).map_err(|e| {
        AppError::new("EXPORT_WRITE_FAILED", "Failed to write ticket summary")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;

    Ok(path)
}
