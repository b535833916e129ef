//! In-memory storage adapter.
//!
//! Implements every storage port over plain tables held behind one mutex.
//! It plays the part of the relational backend: it enforces the
//! (visit, client) uniqueness rule, cascades client deletes onto memberships
//! and manifest rows, and appends an audit row for every mutation the way a
//! database trigger would. Used for the demo backend and integration tests.

mod seed;
mod tables;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockable::Clock;
use tracing::debug;

use crate::domain::ports::{
    AuditLogRepository, AuditLogRepositoryError, ClientRepository, ClientRepositoryError,
    TripRepository, TripRepositoryError, VisitRepository, VisitRepositoryError,
};
use crate::domain::{
    AuditLogEntry, Client, ClientId, ClientProfile, ManifestEntry, ManifestEntryId,
    NewManifestEntry, Trip, TripId, Visit, VisitDetails, VisitId, VisitMembership, VisitRecord,
};
use crate::outbound::rows::{CLIENTS_TABLE, MANIFEST_TABLE, TRIPS_TABLE, VISITS_TABLE};

use self::tables::{TableError, Tables};

/// Storage adapter keeping every table in process memory.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use divedesk::outbound::memory::InMemoryStorage;
/// use mockable::DefaultClock;
///
/// let storage = InMemoryStorage::with_demo_data(Arc::new(DefaultClock));
/// assert_eq!(storage.client_count(), 4);
/// ```
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStorage {
    /// Empty storage stamping audit rows with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
        }
    }

    /// Storage pre-loaded with the demo dataset.
    ///
    /// Four clients, two visits, five trips and their manifests, plus one
    /// audited certification change.
    pub fn with_demo_data(clock: Arc<dyn Clock>) -> Self {
        let tables = seed::demo_tables(clock.utc());
        Self {
            tables: Mutex::new(tables),
            clock,
        }
    }

    /// Number of stored clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.tables().clients.len()
    }

    /// Number of stored audit rows.
    #[must_use]
    pub fn audit_len(&self) -> usize {
        self.tables().audit.len()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }
}

fn map_client_error(error: TableError) -> ClientRepositoryError {
    debug!(%error, "in-memory client table operation failed");
    match error {
        TableError::Missing { table, id } if table == CLIENTS_TABLE => {
            ClientRepositoryError::not_found(id)
        }
        other => ClientRepositoryError::query(other.to_string()),
    }
}

fn map_visit_error(error: TableError) -> VisitRepositoryError {
    debug!(%error, "in-memory visit table operation failed");
    match error {
        TableError::Missing { table, id } if table == VISITS_TABLE => {
            VisitRepositoryError::not_found(id)
        }
        TableError::Duplicate {
            visit_id,
            client_id,
        } => VisitRepositoryError::duplicate_member(visit_id, client_id),
        other => VisitRepositoryError::query(other.to_string()),
    }
}

fn map_trip_error(error: TableError) -> TripRepositoryError {
    debug!(%error, "in-memory trip table operation failed");
    match error {
        TableError::Missing { table, id } if table == TRIPS_TABLE || table == MANIFEST_TABLE => {
            TripRepositoryError::not_found(id)
        }
        other => TripRepositoryError::query(other.to_string()),
    }
}

#[async_trait]
impl ClientRepository for InMemoryStorage {
    async fn list_clients(&self) -> Result<Vec<Client>, ClientRepositoryError> {
        Ok(self.tables().clients())
    }

    async fn find_client(&self, id: ClientId) -> Result<Option<Client>, ClientRepositoryError> {
        Ok(self.tables().client(id))
    }

    async fn search_by_first_name(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<Client>, ClientRepositoryError> {
        Ok(self.tables().search_first_name(term, limit))
    }

    async fn insert_client(
        &self,
        profile: &ClientProfile,
    ) -> Result<Client, ClientRepositoryError> {
        let at = self.now();
        self.tables()
            .insert_client(at, profile)
            .map_err(map_client_error)
    }

    async fn update_client(
        &self,
        id: ClientId,
        profile: &ClientProfile,
    ) -> Result<Client, ClientRepositoryError> {
        let at = self.now();
        self.tables()
            .update_client(at, id, profile)
            .map_err(map_client_error)
    }

    async fn delete_client(&self, id: ClientId) -> Result<(), ClientRepositoryError> {
        let at = self.now();
        self.tables().delete_client(at, id).map_err(map_client_error)
    }
}

#[async_trait]
impl VisitRepository for InMemoryStorage {
    async fn memberships_of(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<VisitMembership>, VisitRepositoryError> {
        Ok(self.tables().memberships_of(client_id))
    }

    async fn visit_records(
        &self,
        visit_ids: &[VisitId],
    ) -> Result<Vec<VisitRecord>, VisitRepositoryError> {
        self.tables()
            .visit_records(visit_ids.iter().copied().map(VisitId::get))
            .map_err(map_visit_error)
    }

    async fn insert_visit(&self, details: &VisitDetails) -> Result<Visit, VisitRepositoryError> {
        let at = self.now();
        self.tables()
            .insert_visit(at, details)
            .map_err(map_visit_error)
    }

    async fn update_visit(
        &self,
        id: VisitId,
        details: &VisitDetails,
    ) -> Result<Visit, VisitRepositoryError> {
        let at = self.now();
        self.tables()
            .update_visit(at, id, details)
            .map_err(map_visit_error)
    }

    async fn add_member(&self, membership: VisitMembership) -> Result<(), VisitRepositoryError> {
        let at = self.now();
        self.tables()
            .add_member(at, membership)
            .map_err(map_visit_error)
    }

    async fn remove_member(
        &self,
        membership: VisitMembership,
    ) -> Result<bool, VisitRepositoryError> {
        let at = self.now();
        self.tables()
            .remove_member(at, membership)
            .map_err(map_visit_error)
    }
}

#[async_trait]
impl TripRepository for InMemoryStorage {
    async fn trips_on(&self, day: NaiveDate) -> Result<Vec<Trip>, TripRepositoryError> {
        Ok(self.tables().trips_on(day))
    }

    async fn find_trip(&self, id: TripId) -> Result<Option<Trip>, TripRepositoryError> {
        Ok(self.tables().trip(id))
    }

    async fn manifests(
        &self,
        trip_ids: &[TripId],
    ) -> Result<Vec<ManifestEntry>, TripRepositoryError> {
        Ok(self.tables().manifests(trip_ids))
    }

    async fn insert_entries(
        &self,
        entries: &[NewManifestEntry],
    ) -> Result<Vec<ManifestEntry>, TripRepositoryError> {
        let at = self.now();
        self.tables()
            .insert_entries(at, entries)
            .map_err(map_trip_error)
    }

    async fn update_entry(
        &self,
        entry: &ManifestEntry,
    ) -> Result<ManifestEntry, TripRepositoryError> {
        let at = self.now();
        self.tables()
            .update_entry(at, entry)
            .map_err(map_trip_error)
    }

    async fn delete_entry(&self, id: ManifestEntryId) -> Result<bool, TripRepositoryError> {
        let at = self.now();
        self.tables().delete_entry(at, id).map_err(map_trip_error)
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryStorage {
    async fn recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>, AuditLogRepositoryError> {
        Ok(self.tables().recent_audit(limit))
    }
}
