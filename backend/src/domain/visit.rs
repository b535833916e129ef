//! Visits: shared multi-day stays and the clients linked to them.
//!
//! A [`Visit`] groups one or more clients over a [`DateRange`]. The link
//! itself is a [`VisitMembership`]; a given (visit, client) pair exists at
//! most once, which the storage layer enforces and the domain reports as a
//! conflict.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::client::{Client, ClientId};
use super::trip::{ManifestEntry, Trip};

/// Server-assigned visit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitId(i64);

impl VisitId {
    /// Wrap a raw storage identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Access the raw storage identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error raised when a date range ends before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("visit must not end ({end}) before it starts ({start})")]
pub struct InvalidDateRange {
    /// Requested first day.
    pub start: NaiveDate,
    /// Requested last day.
    pub end: NaiveDate,
}

/// Inclusive date range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DateRangeDto", into = "DateRangeDto")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DateRangeDto {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting one that ends before it starts.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDateRange`] when `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidDateRange> {
        if end < start {
            return Err(InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A single-day range.
    #[must_use]
    pub const fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// First day.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `day` falls inside the range.
    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Number of nights in the stay.
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl From<DateRange> for DateRangeDto {
    fn from(value: DateRange) -> Self {
        Self {
            start: value.start,
            end: value.end,
        }
    }
}

impl TryFrom<DateRangeDto> for DateRange {
    type Error = InvalidDateRange;

    fn try_from(value: DateRangeDto) -> Result<Self, Self::Error> {
        Self::new(value.start, value.end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Editable visit fields, as submitted by the visit form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitDetails {
    /// Display name for the travelling group.
    pub group_name: String,
    /// Stay dates.
    pub dates: DateRange,
    /// Where the group is staying.
    pub location: String,
    /// Room identifier.
    pub room: String,
    /// Free-text notes.
    pub notes: String,
}

impl VisitDetails {
    /// Details with only a group name and dates.
    pub fn new(group_name: impl Into<String>, dates: DateRange) -> Self {
        Self {
            group_name: group_name.into(),
            dates,
            location: String::new(),
            room: String::new(),
            notes: String::new(),
        }
    }

    /// Set the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Set the room identifier.
    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }
}

/// A stored visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    /// Storage identity.
    pub id: VisitId,
    /// Editable fields.
    #[serde(flatten)]
    pub details: VisitDetails,
}

/// Join row linking one client to one visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitMembership {
    /// The visit.
    pub visit_id: VisitId,
    /// The member.
    pub client_id: ClientId,
}

impl VisitMembership {
    /// Link `client_id` to `visit_id`.
    #[must_use]
    pub const fn new(visit_id: VisitId, client_id: ClientId) -> Self {
        Self {
            visit_id,
            client_id,
        }
    }
}

/// A manifest row expanded with the trip it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripAssignment {
    /// The trip.
    pub trip: Trip,
    /// The client's manifest row on that trip.
    pub entry: ManifestEntry,
}

/// A visit expanded with its members and their trip manifests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitRecord {
    /// The visit row.
    pub visit: Visit,
    /// Linked clients.
    pub members: Vec<Client>,
    /// Manifest rows of every member, joined with their trips.
    pub assignments: Vec<TripAssignment>,
}

impl VisitRecord {
    /// Whether `client_id` is linked to this visit.
    #[must_use]
    pub fn has_member(&self, client_id: ClientId) -> bool {
        self.members.iter().any(|member| member.id == client_id)
    }
}

/// One visit as seen from a particular client's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitHistoryEntry {
    /// The visit row.
    pub visit: Visit,
    /// Other members of the visit.
    pub companions: Vec<Client>,
    /// Trips the viewing client joined during the visit, earliest first.
    pub trips: Vec<Trip>,
}

impl VisitHistoryEntry {
    /// Project a visit record onto the member `viewer`.
    #[must_use]
    pub fn for_member(record: &VisitRecord, viewer: ClientId) -> Self {
        let companions = record
            .members
            .iter()
            .filter(|member| member.id != viewer)
            .cloned()
            .collect();
        let mut trips: Vec<Trip> = record
            .assignments
            .iter()
            .filter(|assignment| assignment.entry.client_id == viewer)
            .map(|assignment| assignment.trip.clone())
            .collect();
        trips.sort_by_key(|trip| trip.scheduled_at);
        trips.dedup_by_key(|trip| trip.id);
        Self {
            visit: record.visit.clone(),
            companions,
            trips,
        }
    }

    /// Whether the viewing client travelled alone.
    #[must_use]
    pub fn is_solo(&self) -> bool {
        self.companions.is_empty()
    }
}

/// Build a client's visit history, newest visit first.
#[must_use]
pub fn visit_history(records: &[VisitRecord], viewer: ClientId) -> Vec<VisitHistoryEntry> {
    let mut history: Vec<VisitHistoryEntry> = records
        .iter()
        .filter(|record| record.has_member(viewer))
        .map(|record| VisitHistoryEntry::for_member(record, viewer))
        .collect();
    history.sort_by(|a, b| {
        b.visit
            .details
            .dates
            .start()
            .cmp(&a.visit.details.dates.start())
            .then_with(|| b.visit.id.cmp(&a.visit.id))
    });
    history
}
