//! Port for trips and their manifests.
//!
//! The backend does not enforce trip capacity; callers check occupancy
//! before inserting manifest rows.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::trip::{ManifestEntry, ManifestEntryId, NewManifestEntry, Trip, TripId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by trip repository adapters.
    pub enum TripRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "trip repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "trip repository query failed: {message}",
        /// Referenced trip or manifest row does not exist.
        NotFound { id: i64 } =>
            "trip record not found: {id}",
    }
}

/// Port for reading trips and editing manifests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Trips departing on `day`, earliest first.
    async fn trips_on(&self, day: NaiveDate) -> Result<Vec<Trip>, TripRepositoryError>;

    /// Fetch one trip; `None` when it does not exist.
    async fn find_trip(&self, id: TripId) -> Result<Option<Trip>, TripRepositoryError>;

    /// Manifest rows for the given trips.
    async fn manifests(
        &self,
        trip_ids: &[TripId],
    ) -> Result<Vec<ManifestEntry>, TripRepositoryError>;

    /// Insert manifest rows and return them as stored.
    async fn insert_entries(
        &self,
        entries: &[NewManifestEntry],
    ) -> Result<Vec<ManifestEntry>, TripRepositoryError>;

    /// Overwrite flags, gear and notes of a manifest row.
    async fn update_entry(
        &self,
        entry: &ManifestEntry,
    ) -> Result<ManifestEntry, TripRepositoryError>;

    /// Delete a manifest row; `false` when it did not exist.
    async fn delete_entry(&self, id: ManifestEntryId) -> Result<bool, TripRepositoryError>;
}
