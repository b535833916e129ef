//! Client workspace: the selected client's profile form and visit membership.
//!
//! The workspace is `Unselected` until a client is opened. Opening a stored
//! client shows its profile at once and then loads its visits; opening a
//! draft shows an empty form with no visits and touches no storage.
//!
//! Every `select` or `create_draft` takes a fresh generation token. A visit
//! fetch that finishes after a newer selection has started is discarded, so
//! the visits on screen always belong to the client on screen.
//!
//! State sits behind a [`std::sync::Mutex`] that is never held across an
//! `.await`, so operations take `&self` and a second selection may begin
//! while the first is still waiting on storage.
//!
//! Failures of mutating operations are reported once through
//! [`UserInteraction::notify`] and leave the workspace as it was. Failed
//! reads are logged and treated as empty.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::json;
use tracing::{debug, warn};

use crate::domain::client::{Client, ClientId, ClientKey, ClientProfile, DraftId};
use crate::domain::ports::{
    ClientRepository, ClientRepositoryError, Notification, UserInteraction, VisitRepository,
    VisitRepositoryError,
};
use crate::domain::store::EntityStore;
use crate::domain::visit::{
    Visit, VisitDetails, VisitHistoryEntry, VisitId, VisitMembership, VisitRecord,
};
use crate::domain::Error;

/// Rows fetched for member search.
pub const MEMBER_SEARCH_LIMIT: usize = 5;
/// Shortest search term that triggers a member search.
pub const MEMBER_SEARCH_MIN_CHARS: usize = 2;

const DUPLICATE_MEMBER_MESSAGE: &str = "Client is already in this group.";
const REMOVE_MEMBER_PROMPT: &str = "Remove from group?";

/// Whether the selected client's visits have been fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitsStatus {
    /// A fetch is in flight.
    Loading,
    /// The visits in the store belong to the selected client.
    Loaded,
}

/// The client open in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedClient {
    /// Stored id or draft placeholder.
    pub key: ClientKey,
    /// Profile form contents.
    pub form: ClientProfile,
    /// Visit fetch status.
    pub visits: VisitsStatus,
}

/// Top-level workspace state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// No client is open.
    #[default]
    Unselected,
    /// A client or draft is open.
    Selected(SelectedClient),
}

impl Selection {
    /// The open client, if any.
    #[must_use]
    pub const fn selected(&self) -> Option<&SelectedClient> {
        match self {
            Self::Selected(selected) => Some(selected),
            Self::Unselected => None,
        }
    }

    fn persisted_id(&self) -> Option<ClientId> {
        self.selected().and_then(|selected| selected.key.persisted())
    }

    fn form_of(&mut self, key: ClientKey) -> Option<&mut ClientProfile> {
        match self {
            Self::Selected(selected) if selected.key == key => Some(&mut selected.form),
            Self::Selected(_) | Self::Unselected => None,
        }
    }
}

/// Target of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitRef {
    /// The visit being drafted, not yet stored.
    Draft,
    /// A stored visit.
    Persisted(VisitId),
}

#[derive(Debug, Default)]
struct WorkspaceState {
    generation: u64,
    selection: Selection,
    store: EntityStore,
    visit_draft: Option<Vec<Client>>,
}

impl WorkspaceState {
    fn begin_selection(&mut self, selected: SelectedClient) -> u64 {
        self.generation += 1;
        self.selection = Selection::Selected(selected);
        self.visit_draft = None;
        self.store.clear_visits();
        self.generation
    }

    fn acting_client(&self) -> Result<ClientId, Error> {
        match &self.selection {
            Selection::Unselected => Err(Error::invalid_request("no client is selected")),
            Selection::Selected(selected) => selected
                .key
                .persisted()
                .ok_or_else(|| Error::invalid_request("save the client before managing visits")),
        }
    }
}

/// Per-desk manager for one selected client and its visits.
pub struct ClientWorkspace<C, V, U> {
    clients: Arc<C>,
    visits: Arc<V>,
    interaction: Arc<U>,
    state: Mutex<WorkspaceState>,
}

impl<C, V, U> ClientWorkspace<C, V, U> {
    /// Create an unselected workspace over the given ports.
    pub fn new(clients: Arc<C>, visits: Arc<V>, interaction: Arc<U>) -> Self {
        Self {
            clients,
            visits,
            interaction,
            state: Mutex::new(WorkspaceState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, WorkspaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current selection.
    #[must_use]
    pub fn selection(&self) -> Selection {
        self.state().selection.clone()
    }

    /// Current generation token.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Visit history of the selected stored client, newest first.
    ///
    /// Empty while unselected, for drafts, and while visits are loading.
    #[must_use]
    pub fn visit_history(&self) -> Vec<VisitHistoryEntry> {
        let state = self.state();
        let Some(selected) = state.selection.selected() else {
            return Vec::new();
        };
        match (selected.key, selected.visits) {
            (ClientKey::Persisted(id), VisitsStatus::Loaded) => state.store.history_of(id),
            _ => Vec::new(),
        }
    }

    /// Companions queued on the open visit draft.
    #[must_use]
    pub fn pending_companions(&self) -> Option<Vec<Client>> {
        self.state().visit_draft.clone()
    }

    /// Snapshot of the client index.
    #[must_use]
    pub fn client_index(&self) -> Vec<Client> {
        self.state().store.clients().into_iter().cloned().collect()
    }

    /// Search the client index by first name, last name or email.
    ///
    /// A blank term yields nothing.
    #[must_use]
    pub fn search_clients(&self, term: &str) -> Vec<Client> {
        self.state().store.search(term)
    }

    /// Look a client up in the index.
    #[must_use]
    pub fn indexed_client(&self, id: ClientId) -> Option<Client> {
        self.state().store.client(id).cloned()
    }

    /// Open a fresh, unsaved client form.
    ///
    /// Any in-flight selection is superseded. No storage call is made.
    pub fn create_draft(&self) -> DraftId {
        let draft = DraftId::random();
        self.state().begin_selection(SelectedClient {
            key: ClientKey::Draft(draft),
            form: ClientProfile::default(),
            visits: VisitsStatus::Loaded,
        });
        draft
    }

    /// Close the visit draft and drop its pending companions.
    pub fn discard_visit_draft(&self) {
        self.state().visit_draft = None;
    }
}

impl<C, V, U> ClientWorkspace<C, V, U>
where
    C: ClientRepository,
    V: VisitRepository,
    U: UserInteraction,
{
    fn report(&self, error: Error) -> Error {
        self.interaction
            .notify(Notification::error(error.message().to_owned()));
        error
    }

    fn map_client_error(error: ClientRepositoryError) -> Error {
        match error {
            ClientRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("client storage unavailable: {message}"))
            }
            ClientRepositoryError::Query { message } => {
                Error::internal(format!("client storage error: {message}"))
            }
            ClientRepositoryError::NotFound { client_id } => {
                Error::not_found(format!("client {client_id} no longer exists"))
                    .with_details(json!({ "clientId": client_id }))
            }
        }
    }

    fn map_visit_error(error: VisitRepositoryError) -> Error {
        match error {
            VisitRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("visit storage unavailable: {message}"))
            }
            VisitRepositoryError::Query { message } => {
                Error::internal(format!("visit storage error: {message}"))
            }
            VisitRepositoryError::NotFound { visit_id } => {
                Error::not_found(format!("visit {visit_id} no longer exists"))
                    .with_details(json!({ "visitId": visit_id }))
            }
            VisitRepositoryError::DuplicateMember {
                visit_id,
                client_id,
            } => Error::conflict(DUPLICATE_MEMBER_MESSAGE).with_details(json!({
                "visitId": visit_id,
                "clientId": client_id,
                "code": "duplicate_member",
            })),
        }
    }

    fn acting_client(&self) -> Result<ClientId, Error> {
        let result = self.state().acting_client();
        result.map_err(|error| self.report(error))
    }

    async fn fetch_visit_records(&self, client_id: ClientId) -> Vec<VisitRecord> {
        let memberships = match self.visits.memberships_of(client_id).await {
            Ok(rows) => rows,
            Err(error) => {
                warn!(%client_id, %error, "failed to load visit memberships");
                return Vec::new();
            }
        };
        if memberships.is_empty() {
            return Vec::new();
        }
        let ids: Vec<VisitId> = memberships.iter().map(|row| row.visit_id).collect();
        match self.visits.visit_records(&ids).await {
            Ok(records) => records,
            Err(error) => {
                warn!(%client_id, %error, "failed to load visit records");
                Vec::new()
            }
        }
    }

    /// Fetch visits for `client_id` and commit them if `token` is current.
    async fn load_visits(&self, client_id: ClientId, token: u64) -> bool {
        let records = self.fetch_visit_records(client_id).await;
        let mut state = self.state();
        if state.generation != token {
            warn!(
                %client_id,
                token,
                current = state.generation,
                "discarding stale visit fetch"
            );
            return false;
        }
        state.store.replace_visits(records);
        if let Selection::Selected(selected) = &mut state.selection {
            selected.visits = VisitsStatus::Loaded;
        }
        true
    }

    async fn reload_visits(&self) -> bool {
        let (client_id, token) = {
            let state = self.state();
            match state.selection.persisted_id() {
                Some(id) => (id, state.generation),
                None => return false,
            }
        };
        self.load_visits(client_id, token).await
    }

    /// Open an empty new-visit draft for the selected stored client.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::ErrorCode::InvalidRequest`] unless a stored
    /// client is selected.
    pub fn begin_visit_draft(&self) -> Result<(), Error> {
        self.acting_client()?;
        self.state().visit_draft = Some(Vec::new());
        Ok(())
    }

    /// Open a stored client and load its visits.
    ///
    /// The profile form is filled before any storage call. Returns `true`
    /// when the visit fetch committed and `false` when a newer selection
    /// superseded it.
    pub async fn select(&self, client: Client) -> bool {
        let client_id = client.id;
        let token = self.state().begin_selection(SelectedClient {
            key: ClientKey::Persisted(client_id),
            form: client.profile,
            visits: VisitsStatus::Loading,
        });
        self.load_visits(client_id, token).await
    }

    /// Open a stored client by id, fetching it when it is not indexed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::ErrorCode::NotFound`] for an unknown id, or
    /// the mapped storage error when the lookup fails.
    pub async fn select_id(&self, id: ClientId) -> Result<bool, Error> {
        let indexed = self.indexed_client(id);
        let client = match indexed {
            Some(client) => client,
            None => self
                .clients
                .find_client(id)
                .await
                .map_err(|error| self.report(Self::map_client_error(error)))?
                .ok_or_else(|| self.report(Error::not_found(format!("client {id} not found"))))?,
        };
        Ok(self.select(client).await)
    }

    /// Reload the client index from storage.
    ///
    /// On failure the previous index is kept.
    pub async fn refresh_client_index(&self) -> bool {
        match self.clients.list_clients().await {
            Ok(clients) => {
                self.state().store.replace_clients(clients);
                true
            }
            Err(error) => {
                warn!(%error, "failed to refresh client index");
                false
            }
        }
    }

    /// Validate and store the profile form.
    ///
    /// A draft is inserted and then selected, which loads its (empty)
    /// visits, unless another client was selected while the insert was in
    /// flight. A stored client is updated in place and keeps its visits.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::ErrorCode::InvalidRequest`] when nothing is
    /// selected or a required field is blank, otherwise the mapped storage
    /// error.
    pub async fn save_profile(&self, form: &ClientProfile) -> Result<Client, Error> {
        let (selected_key, token) = {
            let state = self.state();
            let key = state.selection.selected().map(|selected| selected.key);
            (key, state.generation)
        };
        let Some(key) = selected_key else {
            return Err(self.report(Error::invalid_request("no client is selected")));
        };
        if let Err(invalid) = form.validate() {
            return Err(self.report(
                Error::invalid_request(invalid.to_string())
                    .with_details(json!({ "field": invalid.field() })),
            ));
        }

        let saved = match key {
            ClientKey::Draft(_) => {
                let stored = self
                    .clients
                    .insert_client(form)
                    .await
                    .map_err(|error| self.report(Self::map_client_error(error)))?;
                let superseded = {
                    let mut state = self.state();
                    state.store.upsert_client(stored.clone());
                    state.generation != token
                };
                if superseded {
                    debug!(
                        client_id = %stored.id,
                        "selection moved on during insert; not reselecting"
                    );
                } else {
                    self.select(stored.clone()).await;
                }
                stored
            }
            ClientKey::Persisted(id) => {
                let stored = self
                    .clients
                    .update_client(id, form)
                    .await
                    .map_err(|error| self.report(Self::map_client_error(error)))?;
                let mut state = self.state();
                state.store.upsert_client(stored.clone());
                if let Some(shown) = state.selection.form_of(ClientKey::Persisted(id)) {
                    *shown = stored.profile.clone();
                }
                stored
            }
        };
        self.refresh_client_index().await;
        self.interaction.notify(Notification::success(format!(
            "Saved {}",
            saved.full_name()
        )));
        Ok(saved)
    }

    /// Delete the selected stored client after explicit confirmation.
    ///
    /// Returns `false` when the user declined. On success the workspace
    /// returns to `Unselected`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::ErrorCode::InvalidRequest`] for drafts and
    /// when nothing is selected, otherwise the mapped storage error.
    pub async fn delete_client(&self) -> Result<bool, Error> {
        let target = {
            let state = self.state();
            match state.selection.selected() {
                None => Err(Error::invalid_request("no client is selected")),
                Some(selected) => match selected.key {
                    ClientKey::Draft(_) => {
                        Err(Error::invalid_request("an unsaved client cannot be deleted"))
                    }
                    ClientKey::Persisted(id) => Ok((id, selected.form.full_name())),
                },
            }
        };
        let (id, name) = target.map_err(|error| self.report(error))?;

        if !self
            .interaction
            .confirm(&format!("Delete {name}? This cannot be undone."))
        {
            debug!(client_id = %id, "client deletion declined");
            return Ok(false);
        }

        self.clients
            .delete_client(id)
            .await
            .map_err(|error| self.report(Self::map_client_error(error)))?;

        {
            let mut state = self.state();
            state.store.remove_client(id);
            if state.selection.persisted_id() == Some(id) {
                state.generation += 1;
                state.selection = Selection::Unselected;
                state.visit_draft = None;
                state.store.clear_visits();
            }
        }
        self.refresh_client_index().await;
        self.interaction
            .notify(Notification::success(format!("Deleted {name}")));
        Ok(true)
    }

    /// Store a new visit with the selected client and pending companions.
    ///
    /// The visit row, the acting client's membership and each companion's
    /// membership are written one after another. A failure part-way leaves
    /// the rows written so far in place.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::ErrorCode::InvalidRequest`] unless a stored
    /// client is selected, otherwise the mapped storage error.
    pub async fn add_visit(&self, details: &VisitDetails) -> Result<Visit, Error> {
        let acting = self.acting_client()?;
        let companions = self.state().visit_draft.clone().unwrap_or_default();

        let visit = self
            .visits
            .insert_visit(details)
            .await
            .map_err(|error| self.report(Self::map_visit_error(error)))?;

        let members = std::iter::once(acting).chain(companions.iter().map(|client| client.id));
        for member in members {
            if let Err(error) = self
                .visits
                .add_member(VisitMembership::new(visit.id, member))
                .await
            {
                warn!(
                    visit_id = %visit.id,
                    client_id = %member,
                    %error,
                    "visit stored without its full membership"
                );
                self.reload_visits().await;
                return Err(self.report(Self::map_visit_error(error)));
            }
        }

        self.state().visit_draft = None;
        self.reload_visits().await;
        self.interaction.notify(Notification::success(format!(
            "Added visit {}",
            visit.details.group_name
        )));
        Ok(visit)
    }

    /// Overwrite a stored visit's details.
    ///
    /// # Errors
    ///
    /// Returns the mapped storage error.
    pub async fn edit_visit(&self, id: VisitId, details: &VisitDetails) -> Result<Visit, Error> {
        let visit = self
            .visits
            .update_visit(id, details)
            .await
            .map_err(|error| self.report(Self::map_visit_error(error)))?;
        self.reload_visits().await;
        self.interaction
            .notify(Notification::success(format!("Updated visit {id}")));
        Ok(visit)
    }

    /// Add `client` to a visit.
    ///
    /// On the draft this queues the client as a pending companion; on a
    /// stored visit it writes the membership and reloads visits.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::ErrorCode::Conflict`] when the client is
    /// already a member (or pending), and
    /// [`crate::domain::ErrorCode::InvalidRequest`] when no stored client is
    /// selected or no draft is open.
    pub async fn add_member(&self, visit: VisitRef, client: Client) -> Result<(), Error> {
        let acting = self.acting_client()?;
        match visit {
            VisitRef::Draft => {
                let outcome = {
                    let mut state = self.state();
                    match state.visit_draft.as_mut() {
                        None => Err(Error::invalid_request("no visit draft is open")),
                        Some(pending) => {
                            if client.id == acting
                                || pending.iter().any(|member| member.id == client.id)
                            {
                                Err(Error::conflict(DUPLICATE_MEMBER_MESSAGE))
                            } else {
                                pending.push(client);
                                Ok(())
                            }
                        }
                    }
                };
                outcome.map_err(|error| self.report(error))
            }
            VisitRef::Persisted(visit_id) => {
                self.visits
                    .add_member(VisitMembership::new(visit_id, client.id))
                    .await
                    .map_err(|error| self.report(Self::map_visit_error(error)))?;
                self.reload_visits().await;
                self.interaction.notify(Notification::success(format!(
                    "Added {} to the group",
                    client.full_name()
                )));
                Ok(())
            }
        }
    }

    /// Remove `client_id` from a visit.
    ///
    /// Returns `false` when the client was not a member (nothing changes)
    /// or when the user declined the confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::ErrorCode::InvalidRequest`] when asked to
    /// remove the selected client itself, otherwise the mapped storage error.
    pub async fn remove_member(&self, visit: VisitRef, client_id: ClientId) -> Result<bool, Error> {
        let acting = self.acting_client()?;
        if client_id == acting {
            return Err(self.report(Error::invalid_request(
                "the selected client cannot be removed from their own visit",
            )));
        }
        match visit {
            VisitRef::Draft => {
                let mut state = self.state();
                let Some(pending) = state.visit_draft.as_mut() else {
                    return Ok(false);
                };
                let before = pending.len();
                pending.retain(|member| member.id != client_id);
                Ok(pending.len() != before)
            }
            VisitRef::Persisted(visit_id) => {
                let known_non_member = self
                    .state()
                    .store
                    .visit(visit_id)
                    .is_some_and(|record| !record.has_member(client_id));
                if known_non_member {
                    debug!(%visit_id, %client_id, "client is not a member; nothing to remove");
                    return Ok(false);
                }
                if !self.interaction.confirm(REMOVE_MEMBER_PROMPT) {
                    return Ok(false);
                }
                let removed = self
                    .visits
                    .remove_member(VisitMembership::new(visit_id, client_id))
                    .await
                    .map_err(|error| self.report(Self::map_visit_error(error)))?;
                if removed {
                    self.reload_visits().await;
                }
                Ok(removed)
            }
        }
    }

    /// Clients that could join a visit.
    ///
    /// Searches first names server-side once `term` has at least two
    /// characters, then drops the selected client, current members and
    /// pending companions. The search over-fetches by the number of
    /// excluded clients so at most [`MEMBER_SEARCH_LIMIT`] eligible
    /// clients are still offered.
    pub async fn member_candidates(&self, visit: VisitRef, term: &str) -> Vec<Client> {
        let needle = term.trim();
        if needle.chars().count() < MEMBER_SEARCH_MIN_CHARS {
            return Vec::new();
        }
        let excluded = self.excluded_candidates(visit);
        let limit = MEMBER_SEARCH_LIMIT.saturating_add(excluded.len());
        match self.clients.search_by_first_name(needle, limit).await {
            Ok(found) => found
                .into_iter()
                .filter(|client| !excluded.contains(&client.id))
                .take(MEMBER_SEARCH_LIMIT)
                .collect(),
            Err(error) => {
                warn!(%error, "member search failed");
                Vec::new()
            }
        }
    }

    fn excluded_candidates(&self, visit: VisitRef) -> Vec<ClientId> {
        let state = self.state();
        let mut excluded: Vec<ClientId> = state.selection.persisted_id().into_iter().collect();
        match visit {
            VisitRef::Draft => excluded.extend(
                state
                    .visit_draft
                    .iter()
                    .flatten()
                    .map(|member| member.id),
            ),
            VisitRef::Persisted(visit_id) => excluded.extend(
                state
                    .store
                    .visit(visit_id)
                    .into_iter()
                    .flat_map(|record| record.members.iter().map(|member| member.id)),
            ),
        }
        excluded
    }
}
