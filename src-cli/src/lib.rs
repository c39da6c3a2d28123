//! Command layer of the `tix` binary: maps CLI requests onto the ticket core.

pub mod config;

use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use tix_core::domain::{IncidentReport, Ticket};
use tix_core::error::AppError;
use tix_core::fingerprint::derive_fingerprint;
use tix_core::lifecycle::{self, IngestResult, ResolveResult};
use tix_core::notify::Notifier;
use tix_core::repo;
use tix_core::report::export_ticket_summary;
use tix_core::timestamps;
use tix_core::validate::{validate_report, SeverityPolicy};
use tix_notify::notifier_from_config;

use crate::config::Config;

#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub db_path: String,
    pub tickets: i64,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub project_id: String,
    /// Derived from title, category and location when absent.
    pub fingerprint: Option<String>,
    pub title: String,
    pub severity: String,
    pub category: String,
    pub location: String,
    pub strict_severity: bool,
}

impl IngestRequest {
    fn into_report(self) -> IncidentReport {
        let fingerprint = match self.fingerprint.filter(|f| !f.trim().is_empty()) {
            Some(fp) => fp,
            None => derive_fingerprint(&self.title, &self.category, &self.location),
        };
        IncidentReport {
            project_id: self.project_id,
            fingerprint,
            title: self.title,
            severity: self.severity,
            category: self.category,
            location: self.location,
        }
    }
}

pub struct App {
    config: Config,
    notifier: Box<dyn Notifier>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let notifier = notifier_from_config(config.webhook_url.as_deref(), config.notify_timeout);
        Self { config, notifier }
    }

    pub fn with_notifier(config: Config, notifier: Box<dyn Notifier>) -> Self {
        Self { config, notifier }
    }

    fn open_store(&self) -> Result<rusqlite::Connection, AppError> {
        let mut conn = tix_core::db::open_with(&self.config.db_path, &self.config.store_options())?;
        tix_core::db::migrate(&mut conn)?;
        Ok(conn)
    }

    pub fn init(&self) -> Result<InitResponse, AppError> {
        let conn = self.open_store()?;
        Ok(InitResponse {
            db_path: self.config.db_path.to_string_lossy().to_string(),
            tickets: repo::count_tickets(&conn)?,
        })
    }

    pub fn ingest(&self, request: IngestRequest, now: OffsetDateTime) -> Result<IngestResult, AppError> {
        let policy = if request.strict_severity {
            SeverityPolicy::Strict
        } else {
            SeverityPolicy::PassThrough
        };
        let report = request.into_report();
        validate_report(&report, policy)?;

        let mut conn = self.open_store()?;
        lifecycle::ingest_report(&mut conn, self.notifier.as_ref(), &report, now)
    }

    pub fn list(&self, project_id: Option<&str>) -> Result<Vec<Ticket>, AppError> {
        let conn = self.open_store()?;
        repo::list_tickets(&conn, project_id)
    }

    pub fn resolve(&self, ticket_id: &str, now: OffsetDateTime) -> Result<ResolveResult, AppError> {
        let mut conn = self.open_store()?;
        lifecycle::resolve_ticket(&mut conn, self.notifier.as_ref(), ticket_id, now)
    }

    pub fn export(&self, ticket_id: &str, dest_dir: &Path) -> Result<ExportResponse, AppError> {
        let conn = self.open_store()?;
        let path: PathBuf = export_ticket_summary(&conn, ticket_id, dest_dir)?;
        Ok(ExportResponse {
            file_path: path.to_string_lossy().to_string(),
        })
    }
}

pub fn now() -> OffsetDateTime {
    timestamps::now_utc()
}

/// Process exit code for a failed command: 2 for an unknown ticket, 1 otherwise.
pub fn exit_code_for(err: &AppError) -> u8 {
    if err.is_not_found() {
        2
    } else {
        1
    }
}
