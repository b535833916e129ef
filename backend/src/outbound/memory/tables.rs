//! Row storage behind the in-memory adapter.
//!
//! Each mutation computes every audit snapshot before touching a table, so a
//! failed snapshot leaves the tables as they were.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{
    AuditAction, AuditLogEntry, AuditLogId, Client, ClientId, ClientProfile, ManifestEntry,
    ManifestEntryId, NewManifestEntry, Trip, TripId, Visit, VisitDetails, VisitId, VisitMembership,
    VisitRecord,
};
use crate::domain::visit::TripAssignment;
use crate::outbound::rows::{
    CLIENTS_TABLE, ClientRow, MANIFEST_TABLE, ManifestRow, TRIPS_TABLE, TripRow,
    VISIT_MEMBERS_TABLE, VISITS_TABLE, VisitMemberRow, VisitRow, belongs_to_visit,
};

/// Failures raised by table operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(super) enum TableError {
    #[error("{table} row {id} does not exist")]
    Missing { table: &'static str, id: i64 },
    #[error("duplicate key ({visit_id}, {client_id}) violates unique constraint on visit_members")]
    Duplicate { visit_id: i64, client_id: i64 },
    #[error("stored row is invalid: {0}")]
    Invalid(String),
    #[error("snapshot encoding failed: {0}")]
    Snapshot(String),
}

fn snapshot<T: Serialize>(row: &T) -> Result<Value, TableError> {
    serde_json::to_value(row).map_err(|error| TableError::Snapshot(error.to_string()))
}

fn next_key<V>(rows: &BTreeMap<i64, V>) -> i64 {
    rows.keys().next_back().map_or(1, |last| last + 1)
}

#[derive(Debug, Default)]
pub(super) struct Tables {
    pub(super) clients: BTreeMap<i64, ClientRow>,
    pub(super) visits: BTreeMap<i64, VisitRow>,
    /// `(visit_id, client_id)` pairs.
    pub(super) members: BTreeSet<(i64, i64)>,
    pub(super) trips: BTreeMap<i64, TripRow>,
    pub(super) manifest: BTreeMap<i64, ManifestRow>,
    pub(super) audit: Vec<AuditLogEntry>,
}

impl Tables {
    fn log(
        &mut self,
        at: DateTime<Utc>,
        action: AuditAction,
        table: &str,
        old_data: Option<Value>,
        new_data: Option<Value>,
    ) {
        let id = self
            .audit
            .last()
            .map_or(1, |entry| entry.id.get().saturating_add(1));
        self.audit.push(AuditLogEntry {
            id: AuditLogId::new(id),
            action,
            table_name: table.to_owned(),
            old_data,
            new_data,
            created_at: at,
        });
    }

    fn missing(table: &'static str, id: i64) -> TableError {
        TableError::Missing { table, id }
    }

    // --- clients ---------------------------------------------------------

    /// Every client, ordered like the PostgREST listing: last name, first
    /// name, id.
    pub(super) fn clients(&self) -> Vec<Client> {
        let mut clients: Vec<Client> = self
            .clients
            .values()
            .cloned()
            .map(ClientRow::into_domain)
            .collect();
        clients.sort_by_cached_key(Client::listing_key);
        clients
    }

    pub(super) fn client(&self, id: ClientId) -> Option<Client> {
        self.clients.get(&id.get()).cloned().map(ClientRow::into_domain)
    }

    pub(super) fn search_first_name(&self, term: &str, limit: usize) -> Vec<Client> {
        let needle = term.trim().to_lowercase();
        self.clients
            .values()
            .filter(|row| row.first_name.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .map(ClientRow::into_domain)
            .collect()
    }

    pub(super) fn insert_client(
        &mut self,
        at: DateTime<Utc>,
        profile: &ClientProfile,
    ) -> Result<Client, TableError> {
        let id = next_key(&self.clients);
        let row =
            ClientRow::from_domain(&Client::new(ClientId::new(id), profile.clone()), Some(at));
        let after = snapshot(&row)?;
        self.clients.insert(id, row.clone());
        self.log(at, AuditAction::Insert, CLIENTS_TABLE, None, Some(after));
        Ok(row.into_domain())
    }

    pub(super) fn update_client(
        &mut self,
        at: DateTime<Utc>,
        id: ClientId,
        profile: &ClientProfile,
    ) -> Result<Client, TableError> {
        let current = self
            .clients
            .get(&id.get())
            .ok_or_else(|| Self::missing(CLIENTS_TABLE, id.get()))?;
        let before = snapshot(current)?;
        let row = ClientRow::from_domain(&Client::new(id, profile.clone()), Some(at));
        let after = snapshot(&row)?;
        self.clients.insert(id.get(), row.clone());
        self.log(at, AuditAction::Update, CLIENTS_TABLE, Some(before), Some(after));
        Ok(row.into_domain())
    }

    /// Remove a client together with its memberships and manifest rows.
    pub(super) fn delete_client(
        &mut self,
        at: DateTime<Utc>,
        id: ClientId,
    ) -> Result<(), TableError> {
        let raw = id.get();
        let client = self
            .clients
            .get(&raw)
            .ok_or_else(|| Self::missing(CLIENTS_TABLE, raw))?;
        let client_snapshot = snapshot(client)?;
        let links: Vec<(i64, i64)> = self
            .members
            .iter()
            .filter(|(_, member)| *member == raw)
            .copied()
            .collect();
        let link_snapshots = links
            .iter()
            .map(|(visit_id, client_id)| {
                snapshot(&VisitMemberRow {
                    visit_id: *visit_id,
                    client_id: *client_id,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let entries: Vec<(i64, Value)> = self
            .manifest
            .values()
            .filter(|row| row.client_id == raw)
            .map(|row| snapshot(row).map(|value| (row.id, value)))
            .collect::<Result<_, _>>()?;

        for (link, before) in links.iter().zip(link_snapshots) {
            self.members.remove(link);
            self.log(at, AuditAction::Delete, VISIT_MEMBERS_TABLE, Some(before), None);
        }
        for (entry_id, before) in entries {
            self.manifest.remove(&entry_id);
            self.log(at, AuditAction::Delete, MANIFEST_TABLE, Some(before), None);
        }
        self.clients.remove(&raw);
        self.log(at, AuditAction::Delete, CLIENTS_TABLE, Some(client_snapshot), None);
        Ok(())
    }

    // --- visits ----------------------------------------------------------

    pub(super) fn memberships_of(&self, client_id: ClientId) -> Vec<VisitMembership> {
        self.members
            .iter()
            .filter(|(_, member)| *member == client_id.get())
            .map(|(visit_id, member)| {
                VisitMembership::from(VisitMemberRow {
                    visit_id: *visit_id,
                    client_id: *member,
                })
            })
            .collect()
    }

    fn assignments(&self, visit: &Visit, member_ids: &BTreeSet<i64>) -> Vec<TripAssignment> {
        let mut assignments: Vec<TripAssignment> = self
            .manifest
            .values()
            .filter(|row| member_ids.contains(&row.client_id))
            .filter_map(|row| {
                let trip = self.trips.get(&row.trip_id)?.clone().into_domain();
                belongs_to_visit(row.visit_id, &trip, visit).then(|| TripAssignment {
                    trip,
                    entry: row.clone().into_domain(),
                })
            })
            .collect();
        assignments.sort_by_key(|assignment| (assignment.trip.scheduled_at, assignment.entry.id));
        assignments
    }

    fn record(&self, visit_id: i64) -> Result<Option<VisitRecord>, TableError> {
        let Some(row) = self.visits.get(&visit_id) else {
            return Ok(None);
        };
        let visit = row.clone().into_domain().map_err(TableError::Invalid)?;
        let member_ids: BTreeSet<i64> = self
            .members
            .iter()
            .filter(|(owner, _)| *owner == visit_id)
            .map(|(_, member)| *member)
            .collect();
        let members = member_ids
            .iter()
            .filter_map(|client_id| self.clients.get(client_id))
            .cloned()
            .map(ClientRow::into_domain)
            .collect();
        let assignments = self.assignments(&visit, &member_ids);
        Ok(Some(VisitRecord {
            visit,
            members,
            assignments,
        }))
    }

    pub(super) fn visit_records(
        &self,
        visit_ids: impl IntoIterator<Item = i64>,
    ) -> Result<Vec<VisitRecord>, TableError> {
        let ids: BTreeSet<i64> = visit_ids.into_iter().collect();
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.record(id)? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| {
            b.visit
                .details
                .dates
                .start()
                .cmp(&a.visit.details.dates.start())
                .then_with(|| b.visit.id.cmp(&a.visit.id))
        });
        Ok(records)
    }

    pub(super) fn insert_visit(
        &mut self,
        at: DateTime<Utc>,
        details: &VisitDetails,
    ) -> Result<Visit, TableError> {
        let visit = Visit {
            id: VisitId::new(next_key(&self.visits)),
            details: details.clone(),
        };
        let row = VisitRow::from_domain(&visit);
        let after = snapshot(&row)?;
        self.visits.insert(row.id, row);
        self.log(at, AuditAction::Insert, VISITS_TABLE, None, Some(after));
        Ok(visit)
    }

    pub(super) fn update_visit(
        &mut self,
        at: DateTime<Utc>,
        id: VisitId,
        details: &VisitDetails,
    ) -> Result<Visit, TableError> {
        let current = self
            .visits
            .get(&id.get())
            .ok_or_else(|| Self::missing(VISITS_TABLE, id.get()))?;
        let before = snapshot(current)?;
        let visit = Visit {
            id,
            details: details.clone(),
        };
        let row = VisitRow::from_domain(&visit);
        let after = snapshot(&row)?;
        self.visits.insert(id.get(), row);
        self.log(at, AuditAction::Update, VISITS_TABLE, Some(before), Some(after));
        Ok(visit)
    }

    pub(super) fn add_member(
        &mut self,
        at: DateTime<Utc>,
        membership: VisitMembership,
    ) -> Result<(), TableError> {
        let row = VisitMemberRow::from(membership);
        if !self.visits.contains_key(&row.visit_id) {
            return Err(Self::missing(VISITS_TABLE, row.visit_id));
        }
        if !self.clients.contains_key(&row.client_id) {
            return Err(Self::missing(CLIENTS_TABLE, row.client_id));
        }
        let after = snapshot(&row)?;
        if !self.members.insert((row.visit_id, row.client_id)) {
            return Err(TableError::Duplicate {
                visit_id: row.visit_id,
                client_id: row.client_id,
            });
        }
        self.log(at, AuditAction::Insert, VISIT_MEMBERS_TABLE, None, Some(after));
        Ok(())
    }

    pub(super) fn remove_member(
        &mut self,
        at: DateTime<Utc>,
        membership: VisitMembership,
    ) -> Result<bool, TableError> {
        let row = VisitMemberRow::from(membership);
        let before = snapshot(&row)?;
        let removed = self.members.remove(&(row.visit_id, row.client_id));
        if removed {
            self.log(at, AuditAction::Delete, VISIT_MEMBERS_TABLE, Some(before), None);
        }
        Ok(removed)
    }

    // --- trips -----------------------------------------------------------

    pub(super) fn trips_on(&self, day: NaiveDate) -> Vec<Trip> {
        let mut trips: Vec<Trip> = self
            .trips
            .values()
            .filter(|row| row.scheduled_at.date() == day)
            .cloned()
            .map(TripRow::into_domain)
            .collect();
        trips.sort_by_key(|trip| (trip.scheduled_at, trip.id));
        trips
    }

    pub(super) fn trip(&self, id: TripId) -> Option<Trip> {
        self.trips.get(&id.get()).cloned().map(TripRow::into_domain)
    }

    pub(super) fn manifests(&self, trip_ids: &[TripId]) -> Vec<ManifestEntry> {
        self.manifest
            .values()
            .filter(|row| trip_ids.iter().any(|trip| trip.get() == row.trip_id))
            .cloned()
            .map(ManifestRow::into_domain)
            .collect()
    }

    /// Insert every entry or none.
    pub(super) fn insert_entries(
        &mut self,
        at: DateTime<Utc>,
        entries: &[NewManifestEntry],
    ) -> Result<Vec<ManifestEntry>, TableError> {
        let first = next_key(&self.manifest);
        let mut rows = Vec::with_capacity(entries.len());
        for (entry, id) in entries.iter().zip(first..) {
            if !self.trips.contains_key(&entry.trip_id.get()) {
                return Err(Self::missing(TRIPS_TABLE, entry.trip_id.get()));
            }
            if !self.clients.contains_key(&entry.client_id.get()) {
                return Err(Self::missing(CLIENTS_TABLE, entry.client_id.get()));
            }
            let row = ManifestRow {
                id,
                trip_id: entry.trip_id.get(),
                client_id: entry.client_id.get(),
                visit_id: entry.visit_id.map(VisitId::get),
                ..ManifestRow::default()
            };
            let after = snapshot(&row)?;
            rows.push((row, after));
        }
        let mut inserted = Vec::with_capacity(rows.len());
        for (row, after) in rows {
            self.manifest.insert(row.id, row.clone());
            self.log(at, AuditAction::Insert, MANIFEST_TABLE, None, Some(after));
            inserted.push(row.into_domain());
        }
        Ok(inserted)
    }

    pub(super) fn update_entry(
        &mut self,
        at: DateTime<Utc>,
        entry: &ManifestEntry,
    ) -> Result<ManifestEntry, TableError> {
        let current = self
            .manifest
            .get(&entry.id.get())
            .ok_or_else(|| Self::missing(MANIFEST_TABLE, entry.id.get()))?;
        let before = snapshot(current)?;
        let row = ManifestRow::from_domain(entry);
        let after = snapshot(&row)?;
        self.manifest.insert(row.id, row.clone());
        self.log(at, AuditAction::Update, MANIFEST_TABLE, Some(before), Some(after));
        Ok(row.into_domain())
    }

    pub(super) fn delete_entry(
        &mut self,
        at: DateTime<Utc>,
        id: ManifestEntryId,
    ) -> Result<bool, TableError> {
        let Some(current) = self.manifest.get(&id.get()) else {
            return Ok(false);
        };
        let before = snapshot(current)?;
        self.manifest.remove(&id.get());
        self.log(at, AuditAction::Delete, MANIFEST_TABLE, Some(before), None);
        Ok(true)
    }

    // --- audit -----------------------------------------------------------

    pub(super) fn recent_audit(&self, limit: usize) -> Vec<AuditLogEntry> {
        let mut entries: Vec<&AuditLogEntry> = self.audit.iter().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        entries.into_iter().take(limit).cloned().collect()
    }
}
