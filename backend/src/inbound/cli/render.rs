//! Plain-text views printed by the CLI.
//!
//! Renderers are pure: they take domain values and return the text to
//! print, so the command layer decides where it goes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::domain::{AuditRow, Client, ClientId, TripSchedule, VisitHistoryEntry};

const EMPTY_FIELD: &str = "-";

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|text| !text.trim().is_empty()).unwrap_or(EMPTY_FIELD)
}

/// One client per line: id, name, certification and email.
#[must_use]
pub fn client_table(clients: &[Client]) -> String {
    if clients.is_empty() {
        return "No clients found.\n".to_owned();
    }
    let mut out = String::new();
    for client in clients {
        let certification = client
            .profile
            .certification
            .map_or(EMPTY_FIELD, |level| level.label());
        // Writing to a String cannot fail.
        let _written = writeln!(
            out,
            "{:<5} {:<24} {:<20} {}",
            format!("#{}", client.id),
            client.full_name(),
            certification,
            or_dash(client.profile.email.as_deref()),
        );
    }
    out
}

/// Profile card followed by the client's visit history.
#[must_use]
pub fn client_profile(client: &Client, history: &[VisitHistoryEntry]) -> String {
    let profile = &client.profile;
    let mut out = format!("{} (#{})\n", client.full_name(), client.id);
    let last_dive = profile
        .last_dive
        .map_or_else(|| EMPTY_FIELD.to_owned(), |day| day.to_string());
    let _fields = write!(
        out,
        "  Email: {}\n  Phone: {}\n  Certification: {}\n  Last dive: {}\n",
        or_dash(profile.email.as_deref()),
        or_dash(profile.phone.as_deref()),
        profile.certification.map_or(EMPTY_FIELD, |level| level.label()),
        last_dive,
    );
    if !profile.notes.trim().is_empty() {
        let _notes = writeln!(out, "  Notes: {}", profile.notes.trim());
    }
    out.push_str(&visit_history(history));
    out
}

/// Visit history, newest first, with companions and trips.
#[must_use]
pub fn visit_history(history: &[VisitHistoryEntry]) -> String {
    if history.is_empty() {
        return "No visits recorded.\n".to_owned();
    }
    let mut out = "Visits:\n".to_owned();
    for entry in history {
        let details = &entry.visit.details;
        let _heading = writeln!(
            out,
            "  {} → {}  {} (#{})",
            details.dates.start(),
            details.dates.end(),
            details.group_name,
            entry.visit.id,
        );
        let companions = if entry.companions.is_empty() {
            "nobody (solo)".to_owned()
        } else {
            entry
                .companions
                .iter()
                .map(Client::full_name)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _with = writeln!(out, "    With: {companions}");
        if !entry.trips.is_empty() {
            let trips = entry
                .trips
                .iter()
                .map(|trip| format!("{} ({})", trip.scheduled_at.format("%b %d"), trip.boat))
                .collect::<Vec<_>>()
                .join(", ");
            let _trips = writeln!(out, "    Trips: {trips}");
        }
    }
    out
}

/// Trips departing on `day` with their manifests.
///
/// `clients` resolves manifest rows to names; unknown ids print as `#id`.
#[must_use]
pub fn trip_board(day: NaiveDate, schedules: &[TripSchedule], clients: &[Client]) -> String {
    let mut out = format!("Trips on {day}\n");
    if schedules.is_empty() {
        out.push_str("No trips scheduled for this date.\n");
        return out;
    }
    let names: BTreeMap<ClientId, String> = clients
        .iter()
        .map(|client| (client.id, client.full_name()))
        .collect();
    for schedule in schedules {
        let occupancy = schedule.occupancy();
        let _heading = writeln!(
            out,
            "{}  {} (#{})  {}  {} Pax  {}",
            schedule.trip.scheduled_at.format("%H:%M"),
            schedule.trip.name,
            schedule.trip.id,
            schedule.trip.boat,
            occupancy,
            occupancy.level().label(),
        );
        for entry in &schedule.manifest {
            let name = names
                .get(&entry.client_id)
                .cloned()
                .unwrap_or_else(|| format!("#{}", entry.client_id));
            let mut flags = Vec::new();
            if entry.checklist.waiver {
                flags.push("waiver");
            }
            if entry.checklist.deposit {
                flags.push("deposit");
            }
            if entry.checklist.pickup {
                flags.push("pickup");
            }
            let _line = if flags.is_empty() {
                writeln!(out, "  - {name}")
            } else {
                writeln!(out, "  - {name} [{}]", flags.join(" "))
            };
        }
    }
    out
}

/// Audit rows, one block per entry.
///
/// Multi-line summaries continue on indented lines under the header.
#[must_use]
pub fn audit_table(rows: &[AuditRow]) -> String {
    if rows.is_empty() {
        return "No audit entries.\n".to_owned();
    }
    let mut out = String::new();
    for row in rows {
        let summary = row.summary.to_string();
        let mut lines = summary.lines();
        let _header = writeln!(
            out,
            "{}  {:<6}  {:<14}  {}",
            row.created_at.format("%Y-%m-%d %H:%M"),
            row.action.as_str(),
            row.table,
            lines.next().unwrap_or_default(),
        );
        for line in lines {
            let _continued = writeln!(out, "{:>42}{line}", "");
        }
    }
    out
}
