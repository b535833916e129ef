//! Client-side cache of loaded entities.
//!
//! The store keeps the client index and the visit records loaded for the
//! selected client, keyed by id. Callers get read-only views; writes are
//! crate-private and happen only inside workspace operations.

use std::collections::BTreeMap;

use super::client::{Client, ClientId};
use super::visit::{VisitHistoryEntry, VisitId, VisitRecord, visit_history};

/// Loaded clients and visit records.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    clients: BTreeMap<ClientId, Client>,
    visits: BTreeMap<VisitId, VisitRecord>,
}

impl EntityStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a client in the index.
    #[must_use]
    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Every indexed client, ordered by last name then first name.
    #[must_use]
    pub fn clients(&self) -> Vec<&Client> {
        let mut listed: Vec<&Client> = self.clients.values().collect();
        listed.sort_by_cached_key(|client| client.listing_key());
        listed
    }

    /// Number of indexed clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Case-insensitive substring search over first name, last name and
    /// email. A blank term matches nothing.
    ///
    /// # Examples
    /// ```
    /// use divedesk::domain::EntityStore;
    ///
    /// let store = EntityStore::new();
    /// assert!(store.search("").is_empty());
    /// ```
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<Client> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.clients()
            .into_iter()
            .filter(|client| client.profile.matches_lowercase(&needle))
            .cloned()
            .collect()
    }

    /// A loaded visit record.
    #[must_use]
    pub fn visit(&self, id: VisitId) -> Option<&VisitRecord> {
        self.visits.get(&id)
    }

    /// Visit history of `viewer` built from the loaded records.
    #[must_use]
    pub fn history_of(&self, viewer: ClientId) -> Vec<VisitHistoryEntry> {
        let records: Vec<VisitRecord> = self.visits.values().cloned().collect();
        visit_history(&records, viewer)
    }

    pub(crate) fn replace_clients(&mut self, clients: Vec<Client>) {
        self.clients = clients
            .into_iter()
            .map(|client| (client.id, client))
            .collect();
    }

    pub(crate) fn upsert_client(&mut self, client: Client) {
        self.clients.insert(client.id, client);
    }

    pub(crate) fn remove_client(&mut self, id: ClientId) {
        self.clients.remove(&id);
    }

    pub(crate) fn replace_visits(&mut self, records: Vec<VisitRecord>) {
        self.visits = records
            .into_iter()
            .map(|record| (record.visit.id, record))
            .collect();
    }

    pub(crate) fn clear_visits(&mut self) {
        self.visits.clear();
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::client::ClientProfile;
    use rstest::{fixture, rstest};

    #[fixture]
    fn store() -> EntityStore {
        let mut store = EntityStore::new();
        store.replace_clients(vec![
            Client::new(
                ClientId::new(1),
                ClientProfile::named("John", "Doe").with_email("john@example.com"),
            ),
            Client::new(
                ClientId::new(2),
                ClientProfile::named("Maria", "Silva").with_email("maria@example.com"),
            ),
            Client::new(ClientId::new(3), ClientProfile::named("James", "Bond")),
        ]);
        store
    }

    #[rstest]
    #[case("", &[])]
    #[case("   ", &[])]
    #[case("J", &[3, 1])]
    #[case("SILVA", &[2])]
    #[case("example.com", &[1, 2])]
    #[case("nobody", &[])]
    fn search_matches_names_and_email(
        store: EntityStore,
        #[case] term: &str,
        #[case] expected: &[i64],
    ) {
        let ids: Vec<i64> = store
            .search(term)
            .iter()
            .map(|client| client.id.get())
            .collect();
        assert_eq!(ids, expected);
    }

    #[rstest]
    fn clients_are_sorted_by_last_name(store: EntityStore) {
        let names: Vec<String> = store.clients().iter().map(|c| c.full_name()).collect();
        assert_eq!(names, vec!["James Bond", "John Doe", "Maria Silva"]);
    }

    #[rstest]
    fn upsert_and_remove_keep_index_in_sync(mut store: EntityStore) {
        store.upsert_client(Client::new(
            ClientId::new(4),
            ClientProfile::named("Sarah", "Connor"),
        ));
        assert_eq!(store.client_count(), 4);
        store.remove_client(ClientId::new(1));
        assert!(store.client(ClientId::new(1)).is_none());
        assert_eq!(store.client_count(), 3);
    }
}
