//! Daily trip board: schedules, manifests and bookings.
//!
//! Capacity is checked here, against the manifest as last read. The storage
//! backend does not enforce it, so two desks booking the last seat at the
//! same moment can both succeed.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::warn;

use crate::domain::Error;
use crate::domain::client::ClientId;
use crate::domain::ports::{Notification, TripRepository, TripRepositoryError, UserInteraction};
use crate::domain::trip::{
    ManifestEntry, ManifestEntryId, NewManifestEntry, Trip, TripId, TripOccupancy,
};
use crate::domain::visit::VisitId;

/// A trip with its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripSchedule {
    /// The trip.
    pub trip: Trip,
    /// Divers booked on it.
    pub manifest: Vec<ManifestEntry>,
}

impl TripSchedule {
    /// Booked seats against capacity.
    #[must_use]
    pub fn occupancy(&self) -> TripOccupancy {
        let booked = u32::try_from(self.manifest.len()).unwrap_or(u32::MAX);
        TripOccupancy::new(booked, self.trip.capacity)
    }
}

/// Service behind the trips view.
#[derive(Clone)]
pub struct TripBoard<T, U> {
    trips: Arc<T>,
    interaction: Arc<U>,
}

impl<T, U> TripBoard<T, U> {
    /// Create a board over the given ports.
    pub fn new(trips: Arc<T>, interaction: Arc<U>) -> Self {
        Self { trips, interaction }
    }
}

impl<T, U> TripBoard<T, U>
where
    T: TripRepository,
    U: UserInteraction,
{
    fn map_trip_error(error: TripRepositoryError) -> Error {
        match error {
            TripRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("trip storage unavailable: {message}"))
            }
            TripRepositoryError::Query { message } => {
                Error::internal(format!("trip storage error: {message}"))
            }
            TripRepositoryError::NotFound { id } => {
                Error::not_found(format!("trip record {id} no longer exists"))
            }
        }
    }

    fn report(&self, error: Error) -> Error {
        self.interaction
            .notify(Notification::error(error.message().to_owned()));
        error
    }

    /// Trips departing on `day` with their manifests, earliest first.
    ///
    /// Read failures are logged and yield an empty board.
    pub async fn trips_on(&self, day: NaiveDate) -> Vec<TripSchedule> {
        let trips = match self.trips.trips_on(day).await {
            Ok(trips) => trips,
            Err(error) => {
                warn!(%day, %error, "failed to load trips");
                return Vec::new();
            }
        };
        if trips.is_empty() {
            return Vec::new();
        }
        let ids: Vec<TripId> = trips.iter().map(|trip| trip.id).collect();
        let entries = match self.trips.manifests(&ids).await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(%day, %error, "failed to load manifests");
                Vec::new()
            }
        };
        trips
            .into_iter()
            .map(|trip| {
                let manifest = entries
                    .iter()
                    .filter(|entry| entry.trip_id == trip.id)
                    .cloned()
                    .collect();
                TripSchedule { trip, manifest }
            })
            .collect()
    }

    /// Book `party` onto a trip, optionally under a visit.
    ///
    /// # Errors
    ///
    /// - [`crate::domain::ErrorCode::InvalidRequest`] for an empty party.
    /// - [`crate::domain::ErrorCode::NotFound`] for an unknown trip.
    /// - [`crate::domain::ErrorCode::Conflict`] when a diver is already on
    ///   the manifest or the party exceeds the spaces left.
    pub async fn book(
        &self,
        trip_id: TripId,
        party: &[ClientId],
        visit: Option<VisitId>,
    ) -> Result<Vec<ManifestEntry>, Error> {
        if party.is_empty() {
            return Err(self.report(Error::invalid_request("select at least one diver")));
        }
        let trip = self
            .trips
            .find_trip(trip_id)
            .await
            .map_err(|error| self.report(Self::map_trip_error(error)))?
            .ok_or_else(|| self.report(Error::not_found(format!("trip {trip_id} not found"))))?;
        let manifest = self
            .trips
            .manifests(&[trip_id])
            .await
            .map_err(|error| self.report(Self::map_trip_error(error)))?;

        let already: Vec<i64> = party
            .iter()
            .filter(|client| manifest.iter().any(|entry| entry.client_id == **client))
            .map(|client| client.get())
            .collect();
        if !already.is_empty() {
            return Err(self.report(
                Error::conflict("already on the manifest")
                    .with_details(json!({ "clientIds": already })),
            ));
        }

        let schedule = TripSchedule { trip, manifest };
        let occupancy = schedule.occupancy();
        let requested = u32::try_from(party.len()).unwrap_or(u32::MAX);
        if !occupancy.fits(requested) {
            return Err(self.report(
                Error::conflict(format!(
                    "Not enough space! Only {} spots left.",
                    occupancy.spaces_left()
                ))
                .with_details(json!({
                    "requested": requested,
                    "spacesLeft": occupancy.spaces_left(),
                })),
            ));
        }

        let rows: Vec<NewManifestEntry> = party
            .iter()
            .map(|client_id| NewManifestEntry {
                trip_id,
                client_id: *client_id,
                visit_id: visit,
            })
            .collect();
        let stored = self
            .trips
            .insert_entries(&rows)
            .await
            .map_err(|error| self.report(Self::map_trip_error(error)))?;
        self.interaction.notify(Notification::success(format!(
            "Booked {} on {}",
            stored.len(),
            schedule.trip.name
        )));
        Ok(stored)
    }

    /// Save checklist, gear and note edits on a manifest row.
    ///
    /// # Errors
    ///
    /// Returns the mapped storage error.
    pub async fn update_entry(&self, entry: &ManifestEntry) -> Result<ManifestEntry, Error> {
        self.trips
            .update_entry(entry)
            .await
            .map_err(|error| self.report(Self::map_trip_error(error)))
    }

    /// Remove a diver from a manifest; `false` when the row was already gone.
    ///
    /// # Errors
    ///
    /// Returns the mapped storage error.
    pub async fn remove_entry(&self, id: ManifestEntryId) -> Result<bool, Error> {
        self.trips
            .delete_entry(id)
            .await
            .map_err(|error| self.report(Self::map_trip_error(error)))
    }
}
