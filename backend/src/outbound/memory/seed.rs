//! Deterministic demo dataset.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::warn;

use crate::domain::{CertificationLevel, ClientId};
use crate::outbound::rows::{ClientRow, ManifestRow, TripRow, VisitRow};

use super::tables::Tables;

const JOHN: i64 = 1;
const MARIA: i64 = 2;
const JAMES: i64 = 3;
const SARAH: i64 = 4;

const WINTER_STAY: i64 = 101;
const SUMMER_STAY: i64 = 102;

fn day(year: i32, month: u32, date: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, date).unwrap_or_default()
}

fn departure(on: NaiveDate, hour: u32) -> NaiveDateTime {
    on.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default())
}

fn client(id: i64, first: &str, last: &str, email: &str, cert: &str) -> ClientRow {
    ClientRow {
        id,
        first_name: first.to_owned(),
        last_name: last.to_owned(),
        email: Some(email.to_owned()),
        phone: None,
        cert_level: Some(cert.to_owned()),
        last_dive: None,
        notes: Some(String::new()),
        updated_at: None,
    }
}

fn visit(id: i64, group: &str, start: NaiveDate, end: NaiveDate, room: &str) -> VisitRow {
    VisitRow {
        id,
        group_name: Some(group.to_owned()),
        start_date: start,
        end_date: end,
        location: Some("Reef Lodge".to_owned()),
        room_number: Some(room.to_owned()),
        notes: Some(String::new()),
    }
}

fn trip(id: i64, name: &str, at: NaiveDateTime, capacity: i64, boat: &str) -> TripRow {
    TripRow {
        id,
        name: name.to_owned(),
        scheduled_at: at,
        capacity,
        boat: Some(boat.to_owned()),
    }
}

fn booking(id: i64, trip_id: i64, client_id: i64, visit_id: i64) -> ManifestRow {
    ManifestRow {
        id,
        trip_id,
        client_id,
        visit_id: Some(visit_id),
        waiver: true,
        deposit: true,
        ..ManifestRow::default()
    }
}

/// Build the demo tables.
///
/// Rows are loaded without audit entries; Maria's certification upgrade is
/// then applied as an audited update stamped `now`.
pub(super) fn demo_tables(now: DateTime<Utc>) -> Tables {
    let mut tables = Tables::default();

    for row in [
        client(JOHN, "John", "Doe", "john@example.com", "Open Water"),
        client(MARIA, "Maria", "Silva", "maria@brazil.com", "Advanced Open Water"),
        // Not one of the recognised levels; the desk shows no certification.
        client(JAMES, "James", "Bond", "007@mi6.gov", "Master Scuba Diver"),
        client(SARAH, "Sarah", "Connor", "sarah@skynet.net", "Advanced Open Water"),
    ] {
        tables.clients.insert(row.id, row);
    }

    let winter = visit(WINTER_STAY, "Doe party", day(2025, 1, 10), day(2025, 1, 17), "12");
    let summer = visit(SUMMER_STAY, "Doe & Connor", day(2024, 6, 1), day(2024, 6, 5), "7");
    tables.visits.insert(winter.id, winter);
    tables.visits.insert(summer.id, summer);
    tables.members.extend([
        (WINTER_STAY, JOHN),
        (WINTER_STAY, MARIA),
        (WINTER_STAY, JAMES),
        (SUMMER_STAY, JOHN),
        (SUMMER_STAY, SARAH),
    ]);

    for row in [
        trip(1, "Morning 2-Tank", departure(day(2025, 1, 11), 8), 10, "Big Blue"),
        trip(2, "Afternoon 1-Tank", departure(day(2025, 1, 11), 13), 12, "Little Mermaid"),
        trip(3, "Morning 2-Tank", departure(day(2025, 1, 13), 8), 12, "Little Mermaid"),
        trip(4, "Morning 2-Tank", departure(day(2025, 1, 15), 8), 10, "Big Blue"),
        trip(5, "Morning 2-Tank", departure(day(2024, 6, 2), 8), 10, "Big Blue"),
    ] {
        tables.trips.insert(row.id, row);
    }

    for row in [
        booking(1, 1, JOHN, WINTER_STAY),
        booking(2, 1, MARIA, WINTER_STAY),
        booking(3, 3, JOHN, WINTER_STAY),
        booking(4, 4, JOHN, WINTER_STAY),
        booking(5, 4, MARIA, WINTER_STAY),
        booking(6, 5, JOHN, SUMMER_STAY),
    ] {
        tables.manifest.insert(row.id, row);
    }

    if let Some(maria) = tables.client(ClientId::new(MARIA)) {
        let upgraded = maria.profile.with_certification(CertificationLevel::Rescue);
        if let Err(error) = tables.update_client(now, maria.id, &upgraded) {
            warn!(%error, "demo certification update skipped");
        }
    }

    tables
}
