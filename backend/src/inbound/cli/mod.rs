//! Command-line front-end for the dive desk.
//!
//! Each invocation runs one command against the domain services. Command
//! output goes to the supplied writer (stdout in the binary); success and
//! failure notices travel through the [`UserInteraction`] port, so a failed
//! command has already been reported by the time [`Desk::run`] returns.

pub mod console;
pub mod render;

#[cfg(test)]
mod tests;

use std::io::{self, Write};
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::domain::ports::{
    AuditLogRepository, ClientRepository, Notification, TripRepository, UserInteraction,
    VisitRepository,
};
use crate::domain::visit::InvalidDateRange;
use crate::domain::{
    AuditLogViewer, CertificationLevel, Client, ClientId, ClientProfile, ClientWorkspace, DateRange,
    DomainError, ManifestEntry, ManifestEntryId, TripBoard, TripId, Visit, VisitDetails, VisitId,
    VisitRef,
};

pub use console::ConsoleInteraction;

/// `divedesk` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "divedesk",
    about = "Front-desk tool for a dive shop: clients, visits, trips and the audit log",
    version
)]
pub struct Cli {
    /// Answer yes to every confirmation prompt.
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Client records.
    #[command(subcommand)]
    Clients(ClientsCommand),
    /// Visits and their travelling groups.
    #[command(subcommand)]
    Visits(VisitsCommand),
    /// Trips departing on a date, with their manifests.
    Trips {
        /// Departure day, `YYYY-MM-DD`.
        date: NaiveDate,
    },
    /// Book divers onto a trip.
    Book {
        /// Trip id.
        trip: i64,
        /// Client ids making up the party.
        #[arg(required = true)]
        clients: Vec<i64>,
        /// Visit the booking belongs to.
        #[arg(long)]
        visit: Option<i64>,
    },
    /// Update the checklist of a manifest row.
    Checklist {
        /// Departure day of the trip holding the row.
        #[arg(long)]
        date: NaiveDate,
        /// Manifest row id.
        entry: i64,
        /// Waiver signed.
        #[arg(long)]
        waiver: Option<bool>,
        /// Deposit taken.
        #[arg(long)]
        deposit: Option<bool>,
        /// Hotel pickup arranged.
        #[arg(long)]
        pickup: Option<bool>,
        /// Free-text notes.
        #[arg(long)]
        notes: Option<String>,
    },
    /// Remove a diver from a trip manifest.
    Unbook {
        /// Manifest row id.
        entry: i64,
    },
    /// Recent audit log entries, newest first.
    Logs {
        /// Number of entries to show.
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// `clients` subcommands.
#[derive(Debug, Subcommand)]
pub enum ClientsCommand {
    /// List every client.
    List,
    /// Search by first name, last name or email.
    Search {
        /// Case-insensitive search term.
        term: String,
    },
    /// Show a profile and its visit history.
    Show {
        /// Client id.
        id: i64,
    },
    /// Create a client.
    Create(ProfileArgs),
    /// Change fields of a stored client.
    Edit {
        /// Client id.
        id: i64,
        /// Fields to overwrite.
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Delete a client with their memberships and bookings.
    Delete {
        /// Client id.
        id: i64,
    },
}

/// `visits` subcommands. Each acts on behalf of a selected client.
#[derive(Debug, Subcommand)]
pub enum VisitsCommand {
    /// Visit history of a client.
    List {
        /// Client id.
        client: i64,
    },
    /// Record a visit for a client and their companions.
    Create {
        /// Client making the booking.
        client: i64,
        /// Group name.
        #[arg(long)]
        group: String,
        /// First day, `YYYY-MM-DD`.
        #[arg(long)]
        start: NaiveDate,
        /// Last day, `YYYY-MM-DD`.
        #[arg(long)]
        end: NaiveDate,
        /// Where the group stays.
        #[arg(long, default_value = "")]
        location: String,
        /// Room identifier.
        #[arg(long, default_value = "")]
        room: String,
        /// Free-text notes.
        #[arg(long, default_value = "")]
        notes: String,
        /// Companion client ids.
        #[arg(long = "with", value_name = "client")]
        companions: Vec<i64>,
    },
    /// Change a stored visit.
    Edit {
        /// Client whose history holds the visit.
        client: i64,
        /// Visit id.
        visit: i64,
        /// Fields to overwrite.
        #[command(flatten)]
        details: VisitArgs,
    },
    /// Add a member to a stored visit.
    AddMember {
        /// Client whose visit it is.
        client: i64,
        /// Visit id.
        visit: i64,
        /// Client to add.
        member: i64,
    },
    /// Remove a member from a stored visit.
    RemoveMember {
        /// Client whose visit it is.
        client: i64,
        /// Visit id.
        visit: i64,
        /// Client to remove.
        member: i64,
    },
    /// Clients matching a first name who could join a visit.
    Candidates {
        /// Client whose visit it is.
        client: i64,
        /// Visit id.
        visit: i64,
        /// First-name search term, at least two characters.
        term: String,
    },
}

/// Profile fields accepted by `clients create` and `clients edit`.
#[derive(Debug, Clone, Default, Args)]
pub struct ProfileArgs {
    /// First name.
    #[arg(long)]
    pub first: Option<String>,
    /// Last name.
    #[arg(long)]
    pub last: Option<String>,
    /// Email address.
    #[arg(long)]
    pub email: Option<String>,
    /// Phone number.
    #[arg(long)]
    pub phone: Option<String>,
    /// Certification level, e.g. `"Open Water"` or `AOW`.
    #[arg(long, value_name = "level")]
    pub cert: Option<CertificationLevel>,
    /// Date of the last logged dive.
    #[arg(long, value_name = "date")]
    pub last_dive: Option<NaiveDate>,
    /// Free-text notes.
    #[arg(long)]
    pub notes: Option<String>,
}

impl ProfileArgs {
    /// Overwrite the fields that were given.
    pub fn apply(self, profile: &mut ClientProfile) {
        if let Some(first) = self.first {
            profile.first_name = first;
        }
        if let Some(last) = self.last {
            profile.last_name = last;
        }
        if self.email.is_some() {
            profile.email = self.email;
        }
        if self.phone.is_some() {
            profile.phone = self.phone;
        }
        if self.cert.is_some() {
            profile.certification = self.cert;
        }
        if self.last_dive.is_some() {
            profile.last_dive = self.last_dive;
        }
        if let Some(notes) = self.notes {
            profile.notes = notes;
        }
    }
}

/// Visit fields accepted by `visits edit`.
#[derive(Debug, Clone, Default, Args)]
pub struct VisitArgs {
    /// Group name.
    #[arg(long)]
    pub group: Option<String>,
    /// First day.
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// Last day.
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// Where the group stays.
    #[arg(long)]
    pub location: Option<String>,
    /// Room identifier.
    #[arg(long)]
    pub room: Option<String>,
    /// Free-text notes.
    #[arg(long)]
    pub notes: Option<String>,
}

impl VisitArgs {
    /// `current` with the given fields overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDateRange`] when the merged dates are reversed.
    pub fn merge(self, current: &VisitDetails) -> Result<VisitDetails, InvalidDateRange> {
        let dates = DateRange::new(
            self.start.unwrap_or_else(|| current.dates.start()),
            self.end.unwrap_or_else(|| current.dates.end()),
        )?;
        Ok(VisitDetails {
            group_name: self.group.unwrap_or_else(|| current.group_name.clone()),
            dates,
            location: self.location.unwrap_or_else(|| current.location.clone()),
            room: self.room.unwrap_or_else(|| current.room.clone()),
            notes: self.notes.unwrap_or_else(|| current.notes.clone()),
        })
    }
}

/// Failure of a CLI command.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A domain operation failed; the user has already been notified.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Command output could not be written.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Storage that backs every desk view.
pub trait DeskStorage:
    ClientRepository + VisitRepository + TripRepository + AuditLogRepository
{
}

impl<S> DeskStorage for S where
    S: ClientRepository + VisitRepository + TripRepository + AuditLogRepository
{
}

/// The desk's services wired over one storage adapter.
pub struct Desk<S, U> {
    storage: Arc<S>,
    interaction: Arc<U>,
    workspace: ClientWorkspace<S, S, U>,
    board: TripBoard<S, U>,
    audit_limit: usize,
}

impl<S, U> Desk<S, U>
where
    S: DeskStorage,
    U: UserInteraction,
{
    /// Build the services; `audit_limit` is the default page of `logs`.
    pub fn new(storage: Arc<S>, interaction: Arc<U>, audit_limit: usize) -> Self {
        Self {
            workspace: ClientWorkspace::new(
                Arc::clone(&storage),
                Arc::clone(&storage),
                Arc::clone(&interaction),
            ),
            board: TripBoard::new(Arc::clone(&storage), Arc::clone(&interaction)),
            storage,
            interaction,
            audit_limit,
        }
    }

    /// Run one command, writing its output to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Domain`] after the failure was reported through
    /// the interaction port, or [`CliError::Output`] when `out` fails.
    pub async fn run<O: Write>(&self, command: Command, out: &mut O) -> Result<(), CliError> {
        match command {
            Command::Clients(clients) => self.run_clients(clients, out).await,
            Command::Visits(visits) => self.run_visits(visits, out).await,
            Command::Trips { date } => self.show_trips(date, out).await,
            Command::Book {
                trip,
                clients,
                visit,
            } => {
                let party: Vec<ClientId> = clients.into_iter().map(ClientId::new).collect();
                self.book(TripId::new(trip), &party, visit.map(VisitId::new), out)
                    .await
            }
            Command::Checklist {
                date,
                entry,
                waiver,
                deposit,
                pickup,
                notes,
            } => {
                let mut row = self.manifest_entry(date, ManifestEntryId::new(entry)).await?;
                row.checklist.waiver = waiver.unwrap_or(row.checklist.waiver);
                row.checklist.deposit = deposit.unwrap_or(row.checklist.deposit);
                row.checklist.pickup = pickup.unwrap_or(row.checklist.pickup);
                if let Some(text) = notes {
                    row.notes = text;
                }
                let saved = self.board.update_entry(&row).await?;
                self.interaction
                    .notify(Notification::success(format!("Updated manifest row {}", saved.id)));
                Ok(())
            }
            Command::Unbook { entry } => {
                if !self.board.remove_entry(ManifestEntryId::new(entry)).await? {
                    writeln!(out, "Manifest row {entry} was already removed.")?;
                }
                Ok(())
            }
            Command::Logs { limit } => self.show_logs(limit, out).await,
        }
    }

    async fn show_trips<O: Write>(&self, date: NaiveDate, out: &mut O) -> Result<(), CliError> {
        let schedules = self.board.trips_on(date).await;
        self.workspace.refresh_client_index().await;
        let text = render::trip_board(date, &schedules, &self.workspace.client_index());
        out.write_all(text.as_bytes())?;
        Ok(())
    }

    async fn book<O: Write>(
        &self,
        trip: TripId,
        party: &[ClientId],
        visit: Option<VisitId>,
        out: &mut O,
    ) -> Result<(), CliError> {
        let booked = self.board.book(trip, party, visit).await?;
        for entry in booked {
            writeln!(out, "#{} client {}", entry.id, entry.client_id)?;
        }
        Ok(())
    }

    async fn show_logs<O: Write>(&self, limit: Option<usize>, out: &mut O) -> Result<(), CliError> {
        let viewer = AuditLogViewer::new(
            Arc::clone(&self.storage),
            limit.unwrap_or(self.audit_limit).max(1),
        );
        out.write_all(render::audit_table(&viewer.recent().await).as_bytes())?;
        Ok(())
    }

    async fn run_clients<O: Write>(
        &self,
        command: ClientsCommand,
        out: &mut O,
    ) -> Result<(), CliError> {
        match command {
            ClientsCommand::List => {
                self.workspace.refresh_client_index().await;
                out.write_all(render::client_table(&self.workspace.client_index()).as_bytes())?;
            }
            ClientsCommand::Search { term } => {
                self.workspace.refresh_client_index().await;
                let found = self.workspace.search_clients(&term);
                out.write_all(render::client_table(&found).as_bytes())?;
            }
            ClientsCommand::Show { id } => {
                let client = self.open(ClientId::new(id)).await?;
                let history = self.workspace.visit_history();
                out.write_all(render::client_profile(&client, &history).as_bytes())?;
            }
            ClientsCommand::Create(profile) => {
                self.workspace.create_draft();
                let mut form = ClientProfile::default();
                profile.apply(&mut form);
                let saved = self.workspace.save_profile(&form).await?;
                writeln!(out, "Created client #{}", saved.id)?;
            }
            ClientsCommand::Edit { id, profile } => {
                let client = self.open(ClientId::new(id)).await?;
                let mut form = client.profile;
                profile.apply(&mut form);
                self.workspace.save_profile(&form).await?;
            }
            ClientsCommand::Delete { id } => {
                self.open(ClientId::new(id)).await?;
                if !self.workspace.delete_client().await? {
                    writeln!(out, "Nothing deleted.")?;
                }
            }
        }
        Ok(())
    }

    async fn run_visits<O: Write>(
        &self,
        command: VisitsCommand,
        out: &mut O,
    ) -> Result<(), CliError> {
        match command {
            VisitsCommand::List { client } => {
                self.open(ClientId::new(client)).await?;
                let history = self.workspace.visit_history();
                out.write_all(render::visit_history(&history).as_bytes())?;
            }
            VisitsCommand::Create {
                client,
                group,
                start,
                end,
                location,
                room,
                notes,
                companions,
            } => {
                self.open(ClientId::new(client)).await?;
                let dates = DateRange::new(start, end).map_err(|invalid| {
                    self.report(DomainError::invalid_request(invalid.to_string()))
                })?;
                let details = VisitDetails {
                    group_name: group,
                    dates,
                    location,
                    room,
                    notes,
                };
                let visit = self.create_visit(&details, companions).await?;
                writeln!(out, "Created visit #{}", visit.id)?;
            }
            VisitsCommand::Edit {
                client,
                visit,
                details,
            } => {
                self.open(ClientId::new(client)).await?;
                self.edit_visit(VisitId::new(visit), details).await?;
            }
            VisitsCommand::AddMember {
                client,
                visit,
                member,
            } => {
                self.open(ClientId::new(client)).await?;
                let joining = self.indexed(ClientId::new(member)).await?;
                self.workspace
                    .add_member(VisitRef::Persisted(VisitId::new(visit)), joining)
                    .await?;
            }
            VisitsCommand::RemoveMember {
                client,
                visit,
                member,
            } => {
                self.open(ClientId::new(client)).await?;
                let removed = self
                    .workspace
                    .remove_member(VisitRef::Persisted(VisitId::new(visit)), ClientId::new(member))
                    .await?;
                if !removed {
                    writeln!(out, "No change.")?;
                }
            }
            VisitsCommand::Candidates {
                client,
                visit,
                term,
            } => {
                self.open(ClientId::new(client)).await?;
                let found = self
                    .workspace
                    .member_candidates(VisitRef::Persisted(VisitId::new(visit)), &term)
                    .await;
                out.write_all(render::client_table(&found).as_bytes())?;
            }
        }
        Ok(())
    }

    async fn edit_visit(
        &self,
        visit_id: VisitId,
        changes: VisitArgs,
    ) -> Result<Visit, DomainError> {
        let current = self
            .workspace
            .visit_history()
            .into_iter()
            .find(|entry| entry.visit.id == visit_id)
            .ok_or_else(|| {
                self.report(DomainError::not_found(format!(
                    "visit {visit_id} is not in this client's history"
                )))
            })?;
        let merged = changes
            .merge(&current.visit.details)
            .map_err(|invalid| self.report(DomainError::invalid_request(invalid.to_string())))?;
        self.workspace.edit_visit(visit_id, &merged).await
    }

    fn report(&self, error: DomainError) -> DomainError {
        self.interaction
            .notify(Notification::error(error.message().to_owned()));
        error
    }

    /// Select a stored client and return it as shown in the form.
    async fn open(&self, id: ClientId) -> Result<Client, DomainError> {
        self.workspace.select_id(id).await?;
        let profile = self
            .workspace
            .selection()
            .selected()
            .filter(|selected| selected.key.persisted() == Some(id))
            .map(|selected| selected.form.clone());
        profile
            .map(|form| Client::new(id, form))
            .ok_or_else(|| {
                self.report(DomainError::internal(format!("client {id} was not opened")))
            })
    }

    /// Look a client up in a freshly loaded index.
    async fn indexed(&self, id: ClientId) -> Result<Client, DomainError> {
        self.workspace.refresh_client_index().await;
        self.workspace
            .indexed_client(id)
            .ok_or_else(|| self.report(DomainError::not_found(format!("client {id} not found"))))
    }

    async fn create_visit(
        &self,
        details: &VisitDetails,
        companions: Vec<i64>,
    ) -> Result<Visit, DomainError> {
        self.workspace.begin_visit_draft()?;
        for raw in companions {
            if let Err(error) = self.queue_companion(ClientId::new(raw)).await {
                debug!(client_id = raw, "visit draft discarded");
                self.workspace.discard_visit_draft();
                return Err(error);
            }
        }
        self.workspace.add_visit(details).await
    }

    async fn queue_companion(&self, id: ClientId) -> Result<(), DomainError> {
        let companion = self.indexed(id).await?;
        self.workspace.add_member(VisitRef::Draft, companion).await
    }

    async fn manifest_entry(
        &self,
        date: NaiveDate,
        id: ManifestEntryId,
    ) -> Result<ManifestEntry, DomainError> {
        self.board
            .trips_on(date)
            .await
            .into_iter()
            .flat_map(|schedule| schedule.manifest)
            .find(|entry| entry.id == id)
            .ok_or_else(|| {
                self.report(DomainError::not_found(format!(
                    "manifest row {id} is not booked on {date}"
                )))
            })
    }
}
