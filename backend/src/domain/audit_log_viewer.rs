//! Read side of the audit log: recent entries rendered for display.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::audit::{AuditAction, AuditLogEntry, ChangeSummary};
use crate::domain::ports::AuditLogRepository;

/// Entries shown when no limit is configured.
pub const DEFAULT_AUDIT_LIMIT: usize = 50;

/// One rendered audit row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    /// When the change was recorded.
    pub created_at: DateTime<Utc>,
    /// Mutation kind.
    pub action: AuditAction,
    /// Target table, upper-cased.
    pub table: String,
    /// What changed.
    pub summary: ChangeSummary,
}

impl From<&AuditLogEntry> for AuditRow {
    fn from(entry: &AuditLogEntry) -> Self {
        Self {
            created_at: entry.created_at,
            action: entry.action,
            table: entry.table_name.to_uppercase(),
            summary: entry.summary(),
        }
    }
}

/// Service behind the logs view.
#[derive(Clone)]
pub struct AuditLogViewer<A> {
    log: Arc<A>,
    limit: usize,
}

impl<A> AuditLogViewer<A> {
    /// Viewer showing the newest `limit` entries.
    pub fn new(log: Arc<A>, limit: usize) -> Self {
        Self { log, limit }
    }

    /// Configured page size.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }
}

impl<A: AuditLogRepository> AuditLogViewer<A> {
    /// Newest entries first, rendered.
    ///
    /// A read failure is logged and yields an empty list.
    pub async fn recent(&self) -> Vec<AuditRow> {
        match self.log.recent(self.limit).await {
            Ok(entries) => entries.iter().map(AuditRow::from).collect(),
            Err(error) => {
                warn!(%error, limit = self.limit, "failed to load audit log");
                Vec::new()
            }
        }
    }
}
