//! Relational row shapes shared by the storage adapters.
//!
//! Column names follow the backend schema (`snake_case`). Adapters decode
//! into these rows first, then map into domain records in one pass. The
//! in-memory adapter also serialises them as audit snapshots, so audit rows
//! look the same whichever backend wrote them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    CertificationLevel, Client, ClientId, ClientProfile, DateRange, ManifestEntry, ManifestEntryId,
    NewManifestEntry, Trip, TripId, Visit, VisitDetails, VisitId, VisitMembership,
};
use crate::domain::trip::{GearSizing, ManifestChecklist};

/// Table holding clients.
pub const CLIENTS_TABLE: &str = "clients";
/// Table holding visits.
pub const VISITS_TABLE: &str = "visits";
/// Join table between visits and clients.
pub const VISIT_MEMBERS_TABLE: &str = "visit_members";
/// Table holding trips.
pub const TRIPS_TABLE: &str = "trips";
/// Table holding manifest rows.
pub const MANIFEST_TABLE: &str = "trip_manifest";
/// Append-only audit table.
pub const AUDIT_TABLE: &str = "audit_logs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ClientRow {
    pub(crate) id: i64,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    #[serde(default)]
    pub(crate) email: Option<String>,
    #[serde(default)]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    pub(crate) cert_level: Option<String>,
    #[serde(default)]
    pub(crate) last_dive: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

/// Writable client columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ClientWrite<'a> {
    pub(crate) first_name: &'a str,
    pub(crate) last_name: &'a str,
    pub(crate) email: Option<&'a str>,
    pub(crate) phone: Option<&'a str>,
    pub(crate) cert_level: Option<&'static str>,
    pub(crate) last_dive: Option<NaiveDate>,
    pub(crate) notes: &'a str,
}

impl<'a> From<&'a ClientProfile> for ClientWrite<'a> {
    fn from(profile: &'a ClientProfile) -> Self {
        Self {
            first_name: profile.first_name.trim(),
            last_name: profile.last_name.trim(),
            email: profile
                .email
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty()),
            phone: profile
                .phone
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty()),
            cert_level: profile.certification.map(CertificationLevel::label),
            last_dive: profile.last_dive,
            notes: profile.notes.as_str(),
        }
    }
}

impl ClientRow {
    pub(crate) fn from_domain(client: &Client, updated_at: Option<DateTime<Utc>>) -> Self {
        let write = ClientWrite::from(&client.profile);
        Self {
            id: client.id.get(),
            first_name: write.first_name.to_owned(),
            last_name: write.last_name.to_owned(),
            email: write.email.map(str::to_owned),
            phone: write.phone.map(str::to_owned),
            cert_level: write.cert_level.map(str::to_owned),
            last_dive: write.last_dive,
            notes: Some(write.notes.to_owned()),
            updated_at,
        }
    }

    /// Unrecognised certification labels are dropped rather than rejected;
    /// the backend column is free text.
    pub(crate) fn into_domain(self) -> Client {
        let certification = self
            .cert_level
            .as_deref()
            .and_then(|label| label.parse::<CertificationLevel>().ok());
        Client::new(
            ClientId::new(self.id),
            ClientProfile {
                first_name: self.first_name,
                last_name: self.last_name,
                email: self.email,
                phone: self.phone,
                certification,
                last_dive: self.last_dive,
                notes: self.notes.unwrap_or_default(),
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct VisitRow {
    pub(crate) id: i64,
    #[serde(default)]
    pub(crate) group_name: Option<String>,
    pub(crate) start_date: NaiveDate,
    pub(crate) end_date: NaiveDate,
    #[serde(default)]
    pub(crate) location: Option<String>,
    #[serde(default)]
    pub(crate) room_number: Option<String>,
    #[serde(default)]
    pub(crate) notes: Option<String>,
}

/// Writable visit columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct VisitWrite<'a> {
    pub(crate) group_name: &'a str,
    pub(crate) start_date: NaiveDate,
    pub(crate) end_date: NaiveDate,
    pub(crate) location: &'a str,
    pub(crate) room_number: &'a str,
    pub(crate) notes: &'a str,
}

impl<'a> From<&'a VisitDetails> for VisitWrite<'a> {
    fn from(details: &'a VisitDetails) -> Self {
        Self {
            group_name: details.group_name.as_str(),
            start_date: details.dates.start(),
            end_date: details.dates.end(),
            location: details.location.as_str(),
            room_number: details.room.as_str(),
            notes: details.notes.as_str(),
        }
    }
}

impl VisitRow {
    pub(crate) fn from_domain(visit: &Visit) -> Self {
        let write = VisitWrite::from(&visit.details);
        Self {
            id: visit.id.get(),
            group_name: Some(write.group_name.to_owned()),
            start_date: write.start_date,
            end_date: write.end_date,
            location: Some(write.location.to_owned()),
            room_number: Some(write.room_number.to_owned()),
            notes: Some(write.notes.to_owned()),
        }
    }

    pub(crate) fn into_domain(self) -> Result<Visit, String> {
        let dates = DateRange::new(self.start_date, self.end_date)
            .map_err(|error| format!("visit {}: {error}", self.id))?;
        Ok(Visit {
            id: VisitId::new(self.id),
            details: VisitDetails {
                group_name: self.group_name.unwrap_or_default(),
                dates,
                location: self.location.unwrap_or_default(),
                room: self.room_number.unwrap_or_default(),
                notes: self.notes.unwrap_or_default(),
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct VisitMemberRow {
    pub(crate) visit_id: i64,
    pub(crate) client_id: i64,
}

impl From<VisitMembership> for VisitMemberRow {
    fn from(value: VisitMembership) -> Self {
        Self {
            visit_id: value.visit_id.get(),
            client_id: value.client_id.get(),
        }
    }
}

impl From<VisitMemberRow> for VisitMembership {
    fn from(value: VisitMemberRow) -> Self {
        Self::new(VisitId::new(value.visit_id), ClientId::new(value.client_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TripRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) scheduled_at: NaiveDateTime,
    pub(crate) capacity: i64,
    #[serde(default)]
    pub(crate) boat: Option<String>,
}

impl TripRow {
    /// Negative capacities are clamped to zero.
    pub(crate) fn into_domain(self) -> Trip {
        Trip {
            id: TripId::new(self.id),
            name: self.name,
            scheduled_at: self.scheduled_at,
            capacity: u32::try_from(self.capacity.max(0)).unwrap_or(u32::MAX),
            boat: self.boat.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ManifestRow {
    pub(crate) id: i64,
    pub(crate) trip_id: i64,
    pub(crate) client_id: i64,
    pub(crate) visit_id: Option<i64>,
    pub(crate) waiver: bool,
    pub(crate) deposit: bool,
    pub(crate) pickup: bool,
    pub(crate) weights: String,
    pub(crate) mask: String,
    pub(crate) bcd: String,
    pub(crate) wetsuit: String,
    pub(crate) fins: String,
    pub(crate) reg: bool,
    pub(crate) tank1: String,
    pub(crate) tank2: String,
    pub(crate) notes: String,
}

impl ManifestRow {
    pub(crate) fn from_domain(entry: &ManifestEntry) -> Self {
        Self {
            id: entry.id.get(),
            trip_id: entry.trip_id.get(),
            client_id: entry.client_id.get(),
            visit_id: entry.visit_id.map(VisitId::get),
            waiver: entry.checklist.waiver,
            deposit: entry.checklist.deposit,
            pickup: entry.checklist.pickup,
            weights: entry.gear.weights.clone(),
            mask: entry.gear.mask.clone(),
            bcd: entry.gear.bcd.clone(),
            wetsuit: entry.gear.wetsuit.clone(),
            fins: entry.gear.fins.clone(),
            reg: entry.gear.regulator,
            tank1: entry.gear.tank1.clone(),
            tank2: entry.gear.tank2.clone(),
            notes: entry.notes.clone(),
        }
    }

    pub(crate) fn into_domain(self) -> ManifestEntry {
        ManifestEntry {
            id: ManifestEntryId::new(self.id),
            trip_id: TripId::new(self.trip_id),
            client_id: ClientId::new(self.client_id),
            visit_id: self.visit_id.map(VisitId::new),
            checklist: ManifestChecklist {
                waiver: self.waiver,
                deposit: self.deposit,
                pickup: self.pickup,
            },
            gear: GearSizing {
                weights: self.weights,
                mask: self.mask,
                bcd: self.bcd,
                wetsuit: self.wetsuit,
                fins: self.fins,
                regulator: self.reg,
                tank1: self.tank1,
                tank2: self.tank2,
            },
            notes: self.notes,
        }
    }
}

/// Whether a manifest row counts towards a visit.
///
/// Rows booked under a visit belong to that visit only. Rows booked without
/// one belong to any visit whose dates cover the trip's departure day.
pub(crate) fn belongs_to_visit(row_visit: Option<i64>, trip: &Trip, visit: &Visit) -> bool {
    row_visit.map_or_else(
        || visit.details.dates.contains(trip.scheduled_at.date()),
        |visit_id| visit_id == visit.id.get(),
    )
}

/// Columns written when booking a diver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct ManifestInsert {
    pub(crate) trip_id: i64,
    pub(crate) client_id: i64,
    pub(crate) visit_id: Option<i64>,
}

impl From<&NewManifestEntry> for ManifestInsert {
    fn from(value: &NewManifestEntry) -> Self {
        Self {
            trip_id: value.trip_id.get(),
            client_id: value.client_id.get(),
            visit_id: value.visit_id.map(VisitId::get),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn client_row_keeps_unknown_certification_out_of_domain() {
        let row: ClientRow = serde_json::from_value(json!({
            "id": 3,
            "first_name": "James",
            "last_name": "Bond",
            "email": "007@mi6.gov",
            "cert_level": "Master Scuba Diver",
        }))
        .expect("decode client row");
        let client = row.into_domain();
        assert_eq!(client.profile.certification, None);
        assert_eq!(client.profile.notes, "");
    }

    #[rstest]
    fn client_write_trims_and_drops_blank_contacts() {
        let mut profile = ClientProfile::named(" John ", "Doe").with_email("  ");
        profile.certification = Some(CertificationLevel::Rescue);
        let write = ClientWrite::from(&profile);
        assert_eq!(write.first_name, "John");
        assert_eq!(write.email, None);
        assert_eq!(write.cert_level, Some("Rescue Diver"));
    }

    #[rstest]
    fn reversed_visit_row_is_rejected() {
        let row: VisitRow = serde_json::from_value(json!({
            "id": 9,
            "start_date": "2025-01-17",
            "end_date": "2025-01-10",
        }))
        .expect("decode visit row");
        let err = row.into_domain().expect_err("reversed dates");
        assert!(err.starts_with("visit 9:"));
    }

    #[rstest]
    #[case(-4, 0)]
    #[case(12, 12)]
    fn trip_capacity_is_clamped(#[case] raw: i64, #[case] expected: u32) {
        let row = TripRow {
            id: 1,
            name: "Night dive".to_owned(),
            scheduled_at: "2025-01-11T18:00:00".parse().expect("timestamp"),
            capacity: raw,
            boat: None,
        };
        assert_eq!(row.into_domain().capacity, expected);
    }

    #[rstest]
    #[case::booked_under_visit(Some(101), "2024-06-02T08:00:00", true)]
    #[case::booked_under_other_visit(Some(102), "2025-01-11T08:00:00", false)]
    #[case::walk_in_inside_dates(None, "2025-01-17T13:00:00", true)]
    #[case::walk_in_outside_dates(None, "2025-01-18T08:00:00", false)]
    fn manifest_rows_attach_to_visits(
        #[case] row_visit: Option<i64>,
        #[case] departs: &str,
        #[case] expected: bool,
    ) {
        let visit = VisitRow {
            id: 101,
            group_name: None,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 10).expect("date"),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 17).expect("date"),
            location: None,
            room_number: None,
            notes: None,
        }
        .into_domain()
        .expect("valid visit");
        let trip = TripRow {
            id: 1,
            name: "Morning 2-Tank".to_owned(),
            scheduled_at: departs.parse().expect("timestamp"),
            capacity: 10,
            boat: None,
        }
        .into_domain();
        assert_eq!(belongs_to_visit(row_visit, &trip, &visit), expected);
    }

    #[rstest]
    fn manifest_row_uses_reg_column_for_regulator() {
        let row: ManifestRow = serde_json::from_value(json!({
            "id": 1, "trip_id": 2, "client_id": 3, "reg": true, "tank1": "Air",
        }))
        .expect("decode manifest row");
        let entry = row.into_domain();
        assert!(entry.gear.regulator);
        assert_eq!(entry.gear.tank1, "Air");
    }
}
