//! Port for client record persistence.
//!
//! Deleting a client cascades to its visit memberships and manifest rows;
//! that cascade belongs to the storage backend, not to callers.

use async_trait::async_trait;

use crate::domain::client::{Client, ClientId, ClientProfile};

use super::define_port_error;

define_port_error! {
    /// Errors raised by client repository adapters.
    pub enum ClientRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "client repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "client repository query failed: {message}",
        /// Referenced client does not exist.
        NotFound { client_id: i64 } =>
            "client not found: {client_id}",
    }
}

/// Port for reading and writing client rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Every client, ordered by last name then first name.
    async fn list_clients(&self) -> Result<Vec<Client>, ClientRepositoryError>;

    /// Fetch one client; `None` when it does not exist.
    async fn find_client(&self, id: ClientId) -> Result<Option<Client>, ClientRepositoryError>;

    /// Clients whose first name contains `term`, case-insensitively.
    ///
    /// At most `limit` rows are returned.
    async fn search_by_first_name(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<Client>, ClientRepositoryError>;

    /// Insert a new client and return the stored row.
    async fn insert_client(&self, profile: &ClientProfile) -> Result<Client, ClientRepositoryError>;

    /// Overwrite the editable fields of an existing client.
    ///
    /// Returns [`ClientRepositoryError::NotFound`] when `id` is unknown.
    async fn update_client(
        &self,
        id: ClientId,
        profile: &ClientProfile,
    ) -> Result<Client, ClientRepositoryError>;

    /// Delete a client together with its memberships and manifest rows.
    ///
    /// Returns [`ClientRepositoryError::NotFound`] when `id` is unknown.
    async fn delete_client(&self, id: ClientId) -> Result<(), ClientRepositoryError>;
}
