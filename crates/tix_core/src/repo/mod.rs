//! Ticket store accessor.
//!
//! Every function takes a plain `&Connection`; a `rusqlite::Transaction` derefs to one, so the
//! lifecycle engine composes these calls inside a single write transaction.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::domain::{Ticket, TicketStatus};
use crate::error::AppError;

const TICKET_COLUMNS: &str = r#"
        ticket_id, project_id, fingerprint, title, severity, category, location,
        status, first_seen, last_seen, sla_due_at, resolved_at, sla_breached
"#;

/// Fields rewritten when a report matches an existing ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketUpdate {
    pub status: TicketStatus,
    pub severity: String,
    pub sla_due_at: Option<String>,
    pub last_seen: String,
}

/// Fields written when a ticket is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub resolved_at: String,
    pub sla_breached: bool,
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let status_raw: String = row.get(7)?;
    let status = status_raw
        .parse::<TicketStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, e.into()))?;

    Ok(Ticket {
        ticket_id: row.get(0)?,
        project_id: row.get(1)?,
        fingerprint: row.get(2)?,
        title: row.get(3)?,
        severity: row.get(4)?,
        category: row.get(5)?,
        location: row.get(6)?,
        status,
        first_seen: row.get(8)?,
        last_seen: row.get(9)?,
        sla_due_at: row.get(10)?,
        resolved_at: row.get(11)?,
        sla_breached: row.get(12)?,
    })
}

pub fn find_by_key(
    conn: &Connection,
    project_id: &str,
    fingerprint: &str,
) -> Result<Option<Ticket>, AppError> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE project_id = ?1 AND fingerprint = ?2");
    conn.query_row(&sql, params![project_id, fingerprint], ticket_from_row)
        .optional()
        .map_err(|e| AppError::from_db("DB_QUERY_FAILED", "Failed to query ticket by key", e))
}

pub fn find_by_id(conn: &Connection, ticket_id: &str) -> Result<Option<Ticket>, AppError> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_id = ?1");
    conn.query_row(&sql, [ticket_id], ticket_from_row)
        .optional()
        .map_err(|e| AppError::from_db("DB_QUERY_FAILED", "Failed to query ticket by id", e))
}

/// Like [`find_by_id`], but a missing ticket is a `TICKET_NOT_FOUND` error.
pub fn get_ticket(conn: &Connection, ticket_id: &str) -> Result<Ticket, AppError> {
    find_by_id(conn, ticket_id)?.ok_or_else(|| AppError::ticket_not_found(ticket_id))
}

pub fn insert_ticket(conn: &Connection, ticket: &Ticket) -> Result<(), AppError> {
    conn.execute(
        r#"
      INSERT INTO tickets(
        ticket_id, project_id, fingerprint, title, severity, category, location,
        status, first_seen, last_seen, sla_due_at, resolved_at, sla_breached
      ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
      "#,
        params![
            ticket.ticket_id,
            ticket.project_id,
            ticket.fingerprint,
            ticket.title,
            ticket.severity,
            ticket.category,
            ticket.location,
            ticket.status.as_str(),
            ticket.first_seen,
            ticket.last_seen,
            ticket.sla_due_at,
            ticket.resolved_at,
            ticket.sla_breached,
        ],
    )
    .map_err(|e| AppError::from_db("DB_WRITE_FAILED", "Failed to insert ticket", e))?;
    Ok(())
}

pub fn update_ticket(conn: &Connection, ticket_id: &str, update: &TicketUpdate) -> Result<(), AppError> {
    let changed = conn
        .execute(
            r#"
      UPDATE tickets
      SET status = ?1, severity = ?2, sla_due_at = ?3, last_seen = ?4
      WHERE ticket_id = ?5
      "#,
            params![
                update.status.as_str(),
                update.severity,
                update.sla_due_at,
                update.last_seen,
                ticket_id
            ],
        )
        .map_err(|e| AppError::from_db("DB_WRITE_FAILED", "Failed to update ticket", e))?;

    if changed == 0 {
        return Err(AppError::ticket_not_found(ticket_id));
    }
    Ok(())
}

pub fn mark_resolved(conn: &Connection, ticket_id: &str, resolution: &Resolution) -> Result<(), AppError> {
    let changed = conn
        .execute(
            r#"
      UPDATE tickets
      SET status = 'RESOLVED', resolved_at = ?1, sla_breached = ?2
      WHERE ticket_id = ?3
      "#,
            params![resolution.resolved_at, resolution.sla_breached, ticket_id],
        )
        .map_err(|e| AppError::from_db("DB_WRITE_FAILED", "Failed to resolve ticket", e))?;

    if changed == 0 {
        return Err(AppError::ticket_not_found(ticket_id));
    }
    Ok(())
}

/// List tickets, newest `last_seen` first, optionally scoped to one project.
pub fn list_tickets(conn: &Connection, project_id: Option<&str>) -> Result<Vec<Ticket>, AppError> {
    let sql = format!(
        "SELECT {TICKET_COLUMNS} FROM tickets WHERE (?1 IS NULL OR project_id = ?1) ORDER BY last_seen DESC, ticket_id ASC"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| AppError::from_db("DB_QUERY_FAILED", "Failed to prepare tickets query", e))?;

    let rows = stmt
        .query_map([project_id], ticket_from_row)
        .map_err(|e| AppError::from_db("DB_QUERY_FAILED", "Failed to query tickets", e))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| AppError::from_db("DB_DECODE_FAILED", "Failed to decode ticket row", e))?);
    }

    Ok(out)
}

pub fn count_tickets(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("SELECT COUNT(*) FROM tickets", [], |row| row.get(0))
        .map_err(|e| AppError::from_db("DB_QUERY_FAILED", "Failed to count tickets", e))
}
