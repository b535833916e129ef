//! Port implementations over the PostgREST transport.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use super::dto::{VISIT_RECORD_SELECT, VisitRecordDto};
use super::http::{
    BackendError, Filter, PostgrestHttp, PostgrestSettings, eq, ilike_contains, in_list,
};
use crate::domain::ports::{
    AuditLogRepository, AuditLogRepositoryError, ClientRepository, ClientRepositoryError,
    TripRepository, TripRepositoryError, VisitRepository, VisitRepositoryError,
};
use crate::domain::{
    AuditLogEntry, Client, ClientId, ClientProfile, ManifestEntry, ManifestEntryId,
    NewManifestEntry, Trip, TripId, Visit, VisitDetails, VisitId, VisitMembership, VisitRecord,
};
use crate::outbound::rows::{
    AUDIT_TABLE, CLIENTS_TABLE, ClientRow, ClientWrite, MANIFEST_TABLE, ManifestInsert, ManifestRow,
    TRIPS_TABLE, TripRow, VISIT_MEMBERS_TABLE, VISITS_TABLE, VisitMemberRow, VisitRow, VisitWrite,
};

/// Storage adapter speaking PostgREST over HTTP.
///
/// Integrity rules (membership uniqueness, cascades, audit triggers) are
/// owned by the database behind the endpoint.
pub struct PostgrestStorage {
    http: PostgrestHttp,
}

impl PostgrestStorage {
    /// Build an adapter for one endpoint.
    /// ```rust,ignore
    /// let storage = PostgrestStorage::new(&settings);
    /// assert!(storage.is_ok() || storage.is_err());
    /// ```
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(settings: &PostgrestSettings) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: PostgrestHttp::new(settings)?,
        })
    }
}

fn single<T>(rows: Vec<T>) -> Option<T> {
    rows.into_iter().next()
}

fn map_client_error(error: BackendError) -> ClientRepositoryError {
    debug!(%error, "PostgREST client request failed");
    if error.is_unavailable() {
        ClientRepositoryError::connection(error.to_string())
    } else {
        ClientRepositoryError::query(error.to_string())
    }
}

fn map_visit_error(error: BackendError) -> VisitRepositoryError {
    debug!(%error, "PostgREST visit request failed");
    if error.is_unavailable() {
        VisitRepositoryError::connection(error.to_string())
    } else {
        VisitRepositoryError::query(error.to_string())
    }
}

/// Unique violations on `visit_members` become [`VisitRepositoryError::DuplicateMember`].
fn map_member_insert_error(error: BackendError, row: VisitMemberRow) -> VisitRepositoryError {
    if error.is_unique_violation() {
        debug!(%error, visit_id = row.visit_id, client_id = row.client_id, "duplicate membership");
        VisitRepositoryError::duplicate_member(row.visit_id, row.client_id)
    } else {
        map_visit_error(error)
    }
}

fn map_trip_error(error: BackendError) -> TripRepositoryError {
    debug!(%error, "PostgREST trip request failed");
    if error.is_unavailable() {
        TripRepositoryError::connection(error.to_string())
    } else {
        TripRepositoryError::query(error.to_string())
    }
}

/// Departure window `[day 00:00, next day 00:00)` as filters.
///
/// The last representable date has no following day, so it is bounded
/// below only.
fn day_window(day: NaiveDate) -> Vec<Filter> {
    let start = format!("gte.{}T00:00:00", day.format("%Y-%m-%d"));
    let mut filters = vec![("scheduled_at", start)];
    if let Some(next) = day.succ_opt() {
        let end = format!("lt.{}T00:00:00", next.format("%Y-%m-%d"));
        filters.push(("scheduled_at", end));
    }
    filters
}

#[async_trait]
impl ClientRepository for PostgrestStorage {
    async fn list_clients(&self) -> Result<Vec<Client>, ClientRepositoryError> {
        let rows: Vec<ClientRow> = self
            .http
            .select(
                CLIENTS_TABLE,
                &[("order", "last_name.asc,first_name.asc,id.asc".to_owned())],
            )
            .await
            .map_err(map_client_error)?;
        Ok(rows.into_iter().map(ClientRow::into_domain).collect())
    }

    async fn find_client(&self, id: ClientId) -> Result<Option<Client>, ClientRepositoryError> {
        let rows: Vec<ClientRow> = self
            .http
            .select(CLIENTS_TABLE, &[eq("id", id)])
            .await
            .map_err(map_client_error)?;
        Ok(single(rows).map(ClientRow::into_domain))
    }

    async fn search_by_first_name(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<Client>, ClientRepositoryError> {
        let rows: Vec<ClientRow> = self
            .http
            .select(
                CLIENTS_TABLE,
                &[
                    ilike_contains("first_name", term.trim()),
                    ("order", "first_name.asc,id.asc".to_owned()),
                    ("limit", limit.to_string()),
                ],
            )
            .await
            .map_err(map_client_error)?;
        Ok(rows.into_iter().map(ClientRow::into_domain).collect())
    }

    async fn insert_client(
        &self,
        profile: &ClientProfile,
    ) -> Result<Client, ClientRepositoryError> {
        let rows: Vec<ClientRow> = self
            .http
            .insert(CLIENTS_TABLE, &ClientWrite::from(profile))
            .await
            .map_err(map_client_error)?;
        single(rows)
            .map(ClientRow::into_domain)
            .ok_or_else(|| ClientRepositoryError::query("insert returned no client row"))
    }

    async fn update_client(
        &self,
        id: ClientId,
        profile: &ClientProfile,
    ) -> Result<Client, ClientRepositoryError> {
        let rows: Vec<ClientRow> = self
            .http
            .update(CLIENTS_TABLE, &[eq("id", id)], &ClientWrite::from(profile))
            .await
            .map_err(|error| {
                if error.is_not_found() {
                    ClientRepositoryError::not_found(id.get())
                } else {
                    map_client_error(error)
                }
            })?;
        single(rows)
            .map(ClientRow::into_domain)
            .ok_or_else(|| ClientRepositoryError::not_found(id.get()))
    }

    async fn delete_client(&self, id: ClientId) -> Result<(), ClientRepositoryError> {
        let rows: Vec<ClientRow> = self
            .http
            .delete(CLIENTS_TABLE, &[eq("id", id)])
            .await
            .map_err(map_client_error)?;
        if rows.is_empty() {
            return Err(ClientRepositoryError::not_found(id.get()));
        }
        Ok(())
    }
}

impl PostgrestStorage {
    async fn fetch_records(
        &self,
        filters: &[Filter],
    ) -> Result<Vec<VisitRecord>, VisitRepositoryError> {
        let mut query = vec![
            ("select", VISIT_RECORD_SELECT.to_owned()),
            ("order", "start_date.desc,id.desc".to_owned()),
        ];
        query.extend_from_slice(filters);
        let rows: Vec<VisitRecordDto> = self
            .http
            .select(VISITS_TABLE, &query)
            .await
            .map_err(map_visit_error)?;
        rows.into_iter()
            .map(VisitRecordDto::into_domain)
            .collect::<Result<Vec<_>, _>>()
            .map_err(VisitRepositoryError::query)
    }
}

#[async_trait]
impl VisitRepository for PostgrestStorage {
    async fn memberships_of(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<VisitMembership>, VisitRepositoryError> {
        let rows: Vec<VisitMemberRow> = self
            .http
            .select(
                VISIT_MEMBERS_TABLE,
                &[
                    ("select", "visit_id,client_id".to_owned()),
                    eq("client_id", client_id),
                ],
            )
            .await
            .map_err(map_visit_error)?;
        Ok(rows.into_iter().map(VisitMembership::from).collect())
    }

    async fn visit_records(
        &self,
        visit_ids: &[VisitId],
    ) -> Result<Vec<VisitRecord>, VisitRepositoryError> {
        if visit_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_records(&[in_list("id", visit_ids.iter().copied().map(VisitId::get))])
            .await
    }

    async fn insert_visit(&self, details: &VisitDetails) -> Result<Visit, VisitRepositoryError> {
        let rows: Vec<VisitRow> = self
            .http
            .insert(VISITS_TABLE, &VisitWrite::from(details))
            .await
            .map_err(map_visit_error)?;
        single(rows)
            .ok_or_else(|| VisitRepositoryError::query("insert returned no visit row"))?
            .into_domain()
            .map_err(VisitRepositoryError::query)
    }

    async fn update_visit(
        &self,
        id: VisitId,
        details: &VisitDetails,
    ) -> Result<Visit, VisitRepositoryError> {
        let rows: Vec<VisitRow> = self
            .http
            .update(VISITS_TABLE, &[eq("id", id)], &VisitWrite::from(details))
            .await
            .map_err(map_visit_error)?;
        single(rows)
            .ok_or_else(|| VisitRepositoryError::not_found(id.get()))?
            .into_domain()
            .map_err(VisitRepositoryError::query)
    }

    async fn add_member(&self, membership: VisitMembership) -> Result<(), VisitRepositoryError> {
        let row = VisitMemberRow::from(membership);
        let _inserted: Vec<VisitMemberRow> = self
            .http
            .insert(VISIT_MEMBERS_TABLE, &row)
            .await
            .map_err(|error| map_member_insert_error(error, row))?;
        Ok(())
    }

    async fn remove_member(
        &self,
        membership: VisitMembership,
    ) -> Result<bool, VisitRepositoryError> {
        let rows: Vec<VisitMemberRow> = self
            .http
            .delete(
                VISIT_MEMBERS_TABLE,
                &[
                    eq("visit_id", membership.visit_id),
                    eq("client_id", membership.client_id),
                ],
            )
            .await
            .map_err(map_visit_error)?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl TripRepository for PostgrestStorage {
    async fn trips_on(&self, day: NaiveDate) -> Result<Vec<Trip>, TripRepositoryError> {
        let mut filters = day_window(day);
        filters.push(("order", "scheduled_at.asc,id.asc".to_owned()));
        let rows: Vec<TripRow> = self
            .http
            .select(TRIPS_TABLE, &filters)
            .await
            .map_err(map_trip_error)?;
        Ok(rows.into_iter().map(TripRow::into_domain).collect())
    }

    async fn find_trip(&self, id: TripId) -> Result<Option<Trip>, TripRepositoryError> {
        let rows: Vec<TripRow> = self
            .http
            .select(TRIPS_TABLE, &[eq("id", id)])
            .await
            .map_err(map_trip_error)?;
        Ok(single(rows).map(TripRow::into_domain))
    }

    async fn manifests(
        &self,
        trip_ids: &[TripId],
    ) -> Result<Vec<ManifestEntry>, TripRepositoryError> {
        if trip_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ManifestRow> = self
            .http
            .select(
                MANIFEST_TABLE,
                &[
                    in_list("trip_id", trip_ids.iter().copied().map(TripId::get)),
                    ("order", "id.asc".to_owned()),
                ],
            )
            .await
            .map_err(map_trip_error)?;
        Ok(rows.into_iter().map(ManifestRow::into_domain).collect())
    }

    async fn insert_entries(
        &self,
        entries: &[NewManifestEntry],
    ) -> Result<Vec<ManifestEntry>, TripRepositoryError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let body: Vec<ManifestInsert> = entries.iter().map(ManifestInsert::from).collect();
        let rows: Vec<ManifestRow> = self
            .http
            .insert(MANIFEST_TABLE, body.as_slice())
            .await
            .map_err(map_trip_error)?;
        Ok(rows.into_iter().map(ManifestRow::into_domain).collect())
    }

    async fn update_entry(
        &self,
        entry: &ManifestEntry,
    ) -> Result<ManifestEntry, TripRepositoryError> {
        let rows: Vec<ManifestRow> = self
            .http
            .update(
                MANIFEST_TABLE,
                &[eq("id", entry.id.get())],
                &ManifestRow::from_domain(entry),
            )
            .await
            .map_err(map_trip_error)?;
        single(rows)
            .map(ManifestRow::into_domain)
            .ok_or_else(|| TripRepositoryError::not_found(entry.id.get()))
    }

    async fn delete_entry(&self, id: ManifestEntryId) -> Result<bool, TripRepositoryError> {
        let rows: Vec<ManifestRow> = self
            .http
            .delete(MANIFEST_TABLE, &[eq("id", id.get())])
            .await
            .map_err(map_trip_error)?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl AuditLogRepository for PostgrestStorage {
    async fn recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>, AuditLogRepositoryError> {
        self.http
            .select(
                AUDIT_TABLE,
                &[
                    ("order", "created_at.desc,id.desc".to_owned()),
                    ("limit", limit.to_string()),
                ],
            )
            .await
            .map_err(|error| {
                debug!(%error, "PostgREST audit request failed");
                if error.is_unavailable() {
                    AuditLogRepositoryError::connection(error.to_string())
                } else {
                    AuditLogRepositoryError::query(error.to_string())
                }
            })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for request-building helpers.

    use super::*;
    use reqwest::StatusCode;
    use rstest::rstest;

    use crate::outbound::postgrest::http::map_status_error;

    #[rstest]
    fn day_window_spans_one_calendar_day() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 11).expect("date");
        assert_eq!(
            day_window(day),
            [
                ("scheduled_at", "gte.2025-01-11T00:00:00".to_owned()),
                ("scheduled_at", "lt.2025-01-12T00:00:00".to_owned()),
            ]
        );
    }

    #[rstest]
    fn last_representable_day_is_open_ended() {
        let filters = day_window(NaiveDate::MAX);
        assert_eq!(filters.len(), 1);
        assert!(filters.iter().all(|(_, value)| value.starts_with("gte.")));
    }

    #[rstest]
    #[case::sqlstate(StatusCode::CONFLICT, r#"{"code":"23505","message":"duplicate key"}"#)]
    #[case::bare_conflict(StatusCode::CONFLICT, "")]
    fn unique_violation_on_membership_is_duplicate_member(
        #[case] status: StatusCode,
        #[case] body: &str,
    ) {
        let row = VisitMemberRow {
            visit_id: 101,
            client_id: 2,
        };
        let error = map_member_insert_error(map_status_error(status, body.as_bytes()), row);
        assert_eq!(error, VisitRepositoryError::duplicate_member(101, 2));
    }

    #[rstest]
    fn foreign_key_failure_stays_a_query_error() {
        let row = VisitMemberRow {
            visit_id: 999,
            client_id: 2,
        };
        let error = map_member_insert_error(
            map_status_error(StatusCode::CONFLICT, br#"{"code":"23503","message":"fk"}"#),
            row,
        );
        assert!(matches!(error, VisitRepositoryError::Query { .. }));
    }

    #[rstest]
    #[case::gateway(StatusCode::SERVICE_UNAVAILABLE, true)]
    #[case::server(StatusCode::INTERNAL_SERVER_ERROR, false)]
    fn outages_map_to_connection_errors(#[case] status: StatusCode, #[case] connection: bool) {
        let error = map_visit_error(map_status_error(status, b"{}"));
        assert_eq!(
            matches!(error, VisitRepositoryError::Connection { .. }),
            connection
        );
    }
}
