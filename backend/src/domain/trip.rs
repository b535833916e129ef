//! Boat trips, their manifests and occupancy.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::client::ClientId;
use super::visit::VisitId;

/// Server-assigned trip identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(i64);

impl TripId {
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

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned manifest row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestEntryId(i64);

impl ManifestEntryId {
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

impl fmt::Display for ManifestEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scheduled boat trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    /// Storage identity.
    pub id: TripId,
    /// Dive site or trip name.
    pub name: String,
    /// Departure time.
    pub scheduled_at: NaiveDateTime,
    /// Maximum number of divers.
    pub capacity: u32,
    /// Boat identifier.
    pub boat: String,
}

/// Equipment sizing recorded on a manifest row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GearSizing {
    /// Weight belt load.
    pub weights: String,
    /// Mask size or "own".
    pub mask: String,
    /// BCD size.
    pub bcd: String,
    /// Wetsuit size.
    pub wetsuit: String,
    /// Fin size.
    pub fins: String,
    /// Whether a rental regulator is needed.
    pub regulator: bool,
    /// Gas for the first tank.
    pub tank1: String,
    /// Gas for the second tank.
    pub tank2: String,
}

/// Operational checklist for one diver on one trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestChecklist {
    /// Waiver signed.
    pub waiver: bool,
    /// Deposit paid.
    pub deposit: bool,
    /// Hotel pickup needed.
    pub pickup: bool,
}

/// One diver's row on a trip manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Storage identity.
    pub id: ManifestEntryId,
    /// Owning trip.
    pub trip_id: TripId,
    /// The diver.
    pub client_id: ClientId,
    /// Visit the booking was made under, if any.
    pub visit_id: Option<VisitId>,
    /// Paperwork flags.
    #[serde(flatten)]
    pub checklist: ManifestChecklist,
    /// Rental gear.
    #[serde(flatten)]
    pub gear: GearSizing,
    /// Free-text notes.
    #[serde(default)]
    pub notes: String,
}

impl ManifestEntry {
    /// An entry with every flag cleared and no gear recorded.
    #[must_use]
    pub fn new(id: ManifestEntryId, trip_id: TripId, client_id: ClientId) -> Self {
        Self {
            id,
            trip_id,
            client_id,
            visit_id: None,
            checklist: ManifestChecklist::default(),
            gear: GearSizing::default(),
            notes: String::new(),
        }
    }
}

/// Fields needed to add a diver to a trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewManifestEntry {
    /// Target trip.
    pub trip_id: TripId,
    /// The diver.
    pub client_id: ClientId,
    /// Visit the booking is made under.
    pub visit_id: Option<VisitId>,
}

/// How full a trip is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OccupancyLevel {
    /// Under 80 % booked.
    Available,
    /// At least 80 % booked.
    NearlyFull,
    /// No spaces left.
    Full,
}

impl OccupancyLevel {
    /// Short label for listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::NearlyFull => "nearly full",
            Self::Full => "full",
        }
    }
}

/// Booked seats against capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripOccupancy {
    /// Manifest rows on the trip.
    pub booked: u32,
    /// Trip capacity.
    pub capacity: u32,
}

impl TripOccupancy {
    const NEARLY_FULL_PERCENT: u64 = 80;

    /// Occupancy for `booked` divers on a boat of `capacity`.
    #[must_use]
    pub const fn new(booked: u32, capacity: u32) -> Self {
        Self { booked, capacity }
    }

    /// Seats still free; never negative.
    #[must_use]
    pub const fn spaces_left(self) -> u32 {
        self.capacity.saturating_sub(self.booked)
    }

    /// Fraction booked; a zero-capacity trip counts as full.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "ratio is only used for display")]
    pub fn fill_ratio(self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        f64::from(self.booked) / f64::from(self.capacity)
    }

    /// Colour band used by the trip board.
    #[must_use]
    pub fn level(self) -> OccupancyLevel {
        if self.booked >= self.capacity {
            return OccupancyLevel::Full;
        }
        // Integer comparison avoids float rounding at the 80 % boundary.
        if u64::from(self.booked) * 100 >= u64::from(self.capacity) * Self::NEARLY_FULL_PERCENT {
            return OccupancyLevel::NearlyFull;
        }
        OccupancyLevel::Available
    }

    /// Whether `party` more divers fit.
    #[must_use]
    pub const fn fits(self, party: u32) -> bool {
        party <= self.spaces_left()
    }
}

impl fmt::Display for TripOccupancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.booked, self.capacity)
    }
}
