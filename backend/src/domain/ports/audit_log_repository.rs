//! Port for the append-only audit log.

use async_trait::async_trait;

use crate::domain::audit::AuditLogEntry;

use super::define_port_error;

define_port_error! {
    /// Errors raised by audit log adapters.
    pub enum AuditLogRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "audit log connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } =>
            "audit log query failed: {message}",
    }
}

/// Read access to audit rows written by the storage backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// The newest `limit` entries, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>, AuditLogRepositoryError>;
}
