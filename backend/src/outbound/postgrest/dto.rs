//! PostgREST payload shapes that are not plain table rows.

use serde::Deserialize;

use crate::domain::VisitRecord;
use crate::domain::visit::TripAssignment;
use crate::outbound::rows::{ClientRow, ManifestRow, TripRow, VisitRow, belongs_to_visit};

/// Resource embedding used to load full visit records in one request.
pub(super) const VISIT_RECORD_SELECT: &str =
    "*,visit_members(client:clients(*,trip_manifest(*,trip:trips(*))))";

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
pub(super) struct PostgrestErrorDto {
    #[serde(default)]
    pub(super) code: Option<String>,
    #[serde(default)]
    pub(super) message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct VisitRecordDto {
    #[serde(flatten)]
    visit: VisitRow,
    #[serde(default)]
    visit_members: Vec<MemberDto>,
}

#[derive(Debug, Deserialize)]
struct MemberDto {
    #[serde(default)]
    client: Option<MemberClientDto>,
}

#[derive(Debug, Deserialize)]
struct MemberClientDto {
    #[serde(flatten)]
    client: ClientRow,
    #[serde(default)]
    trip_manifest: Vec<ManifestWithTripDto>,
}

#[derive(Debug, Deserialize)]
struct ManifestWithTripDto {
    #[serde(default)]
    trip: Option<TripRow>,
    #[serde(flatten)]
    entry: ManifestRow,
}

impl VisitRecordDto {
    /// Map the embedded payload into a domain record.
    ///
    /// Memberships whose client was not embedded (row-level security, a
    /// concurrent delete) are skipped, as are manifest rows without a trip.
    pub(super) fn into_domain(self) -> Result<VisitRecord, String> {
        let visit = self.visit.into_domain()?;
        let mut members = Vec::with_capacity(self.visit_members.len());
        let mut assignments = Vec::new();
        for member in self.visit_members.into_iter().filter_map(|row| row.client) {
            for booking in member.trip_manifest {
                let Some(trip_row) = booking.trip else {
                    continue;
                };
                let trip = trip_row.into_domain();
                if belongs_to_visit(booking.entry.visit_id, &trip, &visit) {
                    assignments.push(TripAssignment {
                        trip,
                        entry: booking.entry.into_domain(),
                    });
                }
            }
            members.push(member.client.into_domain());
        }
        members.sort_by_key(|client| client.id);
        assignments.sort_by_key(|assignment| (assignment.trip.scheduled_at, assignment.entry.id));
        Ok(VisitRecord {
            visit,
            members,
            assignments,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for embedded visit payloads.

    use super::*;
    use crate::domain::ClientId;
    use rstest::rstest;

    const PAYLOAD: &str = r#"{
        "id": 101,
        "group_name": "Doe party",
        "start_date": "2025-01-10",
        "end_date": "2025-01-17",
        "location": "Reef Lodge",
        "room_number": "12",
        "notes": null,
        "visit_members": [
            {
                "client": {
                    "id": 2,
                    "first_name": "Maria",
                    "last_name": "Silva",
                    "cert_level": "Rescue Diver",
                    "trip_manifest": [
                        {
                            "id": 2, "trip_id": 1, "client_id": 2, "visit_id": 101,
                            "waiver": true,
                            "trip": {
                                "id": 1, "name": "Morning 2-Tank",
                                "scheduled_at": "2025-01-11T08:00:00",
                                "capacity": 10, "boat": "Big Blue"
                            }
                        }
                    ]
                }
            },
            {
                "client": {
                    "id": 1,
                    "first_name": "John",
                    "last_name": "Doe",
                    "trip_manifest": [
                        {
                            "id": 6, "trip_id": 5, "client_id": 1, "visit_id": 102,
                            "trip": {
                                "id": 5, "name": "Morning 2-Tank",
                                "scheduled_at": "2024-06-02T08:00:00",
                                "capacity": 10, "boat": "Big Blue"
                            }
                        },
                        { "id": 9, "trip_id": 8, "client_id": 1, "trip": null }
                    ]
                }
            },
            { "client": null }
        ]
    }"#;

    #[rstest]
    fn embedded_record_keeps_members_and_visit_trips() {
        let dto: VisitRecordDto = serde_json::from_str(PAYLOAD).expect("payload decodes");

        let record = dto.into_domain().expect("valid record");

        let ids: Vec<ClientId> = record.members.iter().map(|member| member.id).collect();
        assert_eq!(ids, [ClientId::new(1), ClientId::new(2)]);
        assert_eq!(record.assignments.len(), 1, "only Maria's trip belongs to visit 101");
        let assignment = record.assignments.first().expect("one assignment");
        assert_eq!(assignment.trip.boat, "Big Blue");
        assert!(assignment.entry.checklist.waiver);
    }
}
