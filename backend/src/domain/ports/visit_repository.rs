//! Port for visits and their membership links.
//!
//! The backend owns the uniqueness rule on (visit, client) pairs. Adapters
//! must translate a violation into [`VisitRepositoryError::DuplicateMember`]
//! rather than a generic query failure so the domain can tell the user the
//! client is already in the group.

use async_trait::async_trait;

use crate::domain::client::ClientId;
use crate::domain::visit::{Visit, VisitDetails, VisitId, VisitMembership, VisitRecord};

use super::define_port_error;

define_port_error! {
    /// Errors raised by visit repository adapters.
    pub enum VisitRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "visit repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "visit repository query failed: {message}",
        /// Referenced visit does not exist.
        NotFound { visit_id: i64 } =>
            "visit not found: {visit_id}",
        /// The client is already linked to the visit.
        DuplicateMember { visit_id: i64, client_id: i64 } =>
            "client {client_id} is already a member of visit {visit_id}",
    }
}

/// Port for reading and writing visits and memberships.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitRepository: Send + Sync {
    /// Membership rows of one client.
    async fn memberships_of(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<VisitMembership>, VisitRepositoryError>;

    /// Full records for the given visits, newest start date first.
    ///
    /// Each record carries its members and every member's manifest rows on
    /// trips, joined with the trip itself. Unknown ids are skipped.
    async fn visit_records(
        &self,
        visit_ids: &[VisitId],
    ) -> Result<Vec<VisitRecord>, VisitRepositoryError>;

    /// Insert a visit with no members.
    async fn insert_visit(&self, details: &VisitDetails) -> Result<Visit, VisitRepositoryError>;

    /// Overwrite the editable fields of a visit.
    async fn update_visit(
        &self,
        id: VisitId,
        details: &VisitDetails,
    ) -> Result<Visit, VisitRepositoryError>;

    /// Link a client to a visit.
    ///
    /// Returns [`VisitRepositoryError::DuplicateMember`] when the link exists.
    async fn add_member(&self, membership: VisitMembership) -> Result<(), VisitRepositoryError>;

    /// Unlink a client; `false` when there was no such link.
    async fn remove_member(&self, membership: VisitMembership)
    -> Result<bool, VisitRepositoryError>;
}
