//! Behaviour tests for the desk services over the in-memory demo storage.
//!
//! Scenarios drive the client workspace, the trip board and the audit log
//! viewer exactly as the CLI does, and observe the operator's view through
//! a recording interaction fixture.

use std::cell::RefCell;
use std::sync::Arc;

use chrono::NaiveDate;
use divedesk::domain::ports::{FixtureUserInteraction, VisitRepository};
use divedesk::domain::{
    AuditLogViewer, AuditRow, ClientId, ClientWorkspace, DateRange, DomainError, TripBoard, TripId,
    TripSchedule, VisitDetails, VisitId, VisitRef,
};
use divedesk::outbound::memory::InMemoryStorage;
use mockable::DefaultClock;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tokio::runtime::{Builder, Runtime};

type Workspace = ClientWorkspace<InMemoryStorage, InMemoryStorage, FixtureUserInteraction>;

struct Services {
    storage: Arc<InMemoryStorage>,
    interaction: Arc<FixtureUserInteraction>,
    workspace: Workspace,
    board: TripBoard<InMemoryStorage, FixtureUserInteraction>,
    audit: AuditLogViewer<InMemoryStorage>,
}

impl Services {
    fn demo(interaction: FixtureUserInteraction) -> Self {
        let storage = Arc::new(InMemoryStorage::with_demo_data(Arc::new(DefaultClock)));
        let operator = Arc::new(interaction);
        Self {
            workspace: ClientWorkspace::new(
                Arc::clone(&storage),
                Arc::clone(&storage),
                Arc::clone(&operator),
            ),
            board: TripBoard::new(Arc::clone(&storage), Arc::clone(&operator)),
            audit: AuditLogViewer::new(Arc::clone(&storage), 10),
            storage,
            interaction: operator,
        }
    }
}

struct DeskWorld {
    runtime: Runtime,
    services: RefCell<Option<Arc<Services>>>,
    board: RefCell<Vec<TripSchedule>>,
    audit: RefCell<Vec<AuditRow>>,
    last_error: RefCell<Option<DomainError>>,
}

impl DeskWorld {
    fn new() -> Self {
        Self {
            runtime: Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("create runtime"),
            services: RefCell::new(None),
            board: RefCell::new(Vec::new()),
            audit: RefCell::new(Vec::new()),
            last_error: RefCell::new(None),
        }
    }

    fn start(&self, interaction: FixtureUserInteraction) {
        *self.services.borrow_mut() = Some(Arc::new(Services::demo(interaction)));
    }

    fn services(&self) -> Arc<Services> {
        self.services
            .borrow()
            .clone()
            .expect("a desk should be started by a Given step")
    }

    fn record<T>(&self, outcome: Result<T, DomainError>) {
        if let Err(error) = outcome {
            *self.last_error.borrow_mut() = Some(error);
        }
    }
}

fn day(raw: &str) -> NaiveDate {
    raw.parse().expect("valid date")
}

#[fixture]
fn world() -> DeskWorld {
    DeskWorld::new()
}

// -----------------------------------------------------------------------------
// Given Steps
// -----------------------------------------------------------------------------

#[given("the demo dive desk")]
fn the_demo_dive_desk(world: &DeskWorld) {
    world.start(FixtureUserInteraction::approving());
}

#[given("the demo dive desk where the operator declines")]
fn the_demo_dive_desk_where_the_operator_declines(world: &DeskWorld) {
    world.start(FixtureUserInteraction::declining());
}

#[given("client {id:i64} is selected")]
fn client_is_selected(world: &DeskWorld, id: i64) {
    let services = world.services();
    let selected = world
        .runtime
        .block_on(services.workspace.select_id(ClientId::new(id)))
        .expect("demo client exists");
    assert!(selected, "selection should commit");
}

// -----------------------------------------------------------------------------
// When Steps
// -----------------------------------------------------------------------------

#[when("a visit draft is opened")]
fn a_visit_draft_is_opened(world: &DeskWorld) {
    world
        .services()
        .workspace
        .begin_visit_draft()
        .expect("a stored client is selected");
}

#[when("client {id:i64} is queued as a companion")]
fn client_is_queued_as_a_companion(world: &DeskWorld, id: i64) {
    let services = world.services();
    world
        .runtime
        .block_on(services.workspace.refresh_client_index());
    let companion = services
        .workspace
        .indexed_client(ClientId::new(id))
        .expect("demo client is indexed");
    let outcome = world
        .runtime
        .block_on(services.workspace.add_member(VisitRef::Draft, companion));
    world.record(outcome);
}

#[when("the visit \"{group}\" from {start} to {end} is saved")]
fn the_visit_is_saved(world: &DeskWorld, group: String, start: String, end: String) {
    let services = world.services();
    let dates = DateRange::new(day(&start), day(&end)).expect("ordered dates");
    let outcome = world
        .runtime
        .block_on(services.workspace.add_visit(&VisitDetails::new(group, dates)));
    world.record(outcome);
}

#[when("client {member:i64} is added to visit {visit:i64}")]
fn client_is_added_to_visit(world: &DeskWorld, member: i64, visit: i64) {
    let services = world.services();
    world
        .runtime
        .block_on(services.workspace.refresh_client_index());
    let joining = services
        .workspace
        .indexed_client(ClientId::new(member))
        .expect("demo client is indexed");
    let outcome = world.runtime.block_on(
        services
            .workspace
            .add_member(VisitRef::Persisted(VisitId::new(visit)), joining),
    );
    world.record(outcome);
}

#[when("client {member:i64} is removed from visit {visit:i64}")]
fn client_is_removed_from_visit(world: &DeskWorld, member: i64, visit: i64) {
    let services = world.services();
    let outcome = world.runtime.block_on(services.workspace.remove_member(
        VisitRef::Persisted(VisitId::new(visit)),
        ClientId::new(member),
    ));
    world.record(outcome);
}

#[when("the selected client is deleted")]
fn the_selected_client_is_deleted(world: &DeskWorld) {
    let services = world.services();
    let deleted = world
        .runtime
        .block_on(services.workspace.delete_client())
        .expect("delete succeeds");
    assert!(deleted, "the approving operator confirms");
}

#[when("the audit log is viewed")]
fn the_audit_log_is_viewed(world: &DeskWorld) {
    let services = world.services();
    *world.audit.borrow_mut() = world.runtime.block_on(services.audit.recent());
}

#[when("the board for {date} is opened")]
fn the_board_is_opened(world: &DeskWorld, date: String) {
    let services = world.services();
    *world.board.borrow_mut() = world.runtime.block_on(services.board.trips_on(day(&date)));
}

#[when("client {client:i64} is booked on trip {trip:i64}")]
fn client_is_booked_on_trip(world: &DeskWorld, client: i64, trip: i64) {
    let services = world.services();
    let outcome = world.runtime.block_on(services.board.book(
        TripId::new(trip),
        &[ClientId::new(client)],
        None,
    ));
    world.record(outcome);
}

// -----------------------------------------------------------------------------
// Then Steps
// -----------------------------------------------------------------------------

#[then("the newest visit of client {id:i64} is \"{group}\"")]
fn the_newest_visit_is(world: &DeskWorld, id: i64, group: String) {
    let services = world.services();
    let selected = services
        .workspace
        .selection()
        .selected()
        .and_then(|selected| selected.key.persisted());
    assert_eq!(selected, Some(ClientId::new(id)));
    let history = services.workspace.visit_history();
    let newest = history.first().expect("at least one visit");
    assert_eq!(newest.visit.details.group_name, group);
}

#[then("that visit lists {count:usize} members")]
fn that_visit_lists_members(world: &DeskWorld, count: usize) {
    let services = world.services();
    let history = services.workspace.visit_history();
    let newest = history.first().expect("at least one visit");
    // Companions exclude the selected client.
    assert_eq!(newest.companions.len() + 1, count);
}

#[then("client {viewer:i64} sees client {companion:i64} as a companion on \"{group}\"")]
fn client_sees_companion(world: &DeskWorld, viewer: i64, companion: i64, group: String) {
    let services = world.services();
    world
        .runtime
        .block_on(services.workspace.select_id(ClientId::new(viewer)))
        .expect("demo client exists");
    let history = services.workspace.visit_history();
    let visit = history
        .iter()
        .find(|entry| entry.visit.details.group_name == group)
        .expect("the shared visit is in the companion's history");
    assert!(
        visit
            .companions
            .iter()
            .any(|member| member.id == ClientId::new(companion))
    );
}

#[then("the operator is told \"{message}\"")]
fn the_operator_is_told(world: &DeskWorld, message: String) {
    let services = world.services();
    assert_eq!(services.interaction.last_error(), Some(message));
    assert!(world.last_error.borrow().is_some(), "the operation failed");
}

#[then("the draft holds {count:usize} companion")]
fn the_draft_holds(world: &DeskWorld, count: usize) {
    let pending = world
        .services()
        .workspace
        .pending_companions()
        .expect("draft still open");
    assert_eq!(pending.len(), count);
}

#[then("the operator was asked \"{prompt}\"")]
fn the_operator_was_asked(world: &DeskWorld, prompt: String) {
    assert_eq!(world.services().interaction.prompts(), [prompt]);
}

#[then("visit {visit:i64} still lists {count:usize} members")]
fn visit_still_lists_members(world: &DeskWorld, visit: i64, count: usize) {
    let services = world.services();
    let records = world
        .runtime
        .block_on(services.storage.visit_records(&[VisitId::new(visit)]))
        .expect("visit loads");
    let record = records.first().expect("visit exists");
    assert_eq!(record.members.len(), count);
}

#[then("the newest audit row records {action} on {table}")]
fn the_newest_audit_row_records(world: &DeskWorld, action: String, table: String) {
    let audit = world.audit.borrow();
    let newest = audit.first().expect("audit rows were loaded");
    assert_eq!(newest.action.as_str(), action);
    assert_eq!(newest.table, table);
}

#[then("the newest audit row reads \"{summary}\"")]
fn the_newest_audit_row_reads(world: &DeskWorld, summary: String) {
    let audit = world.audit.borrow();
    let newest = audit.first().expect("audit rows were loaded");
    assert_eq!(newest.summary.to_string(), summary);
}

#[then("no trips are listed")]
fn no_trips_are_listed(world: &DeskWorld) {
    assert!(world.board.borrow().is_empty());
}

#[then("trip {trip:i64} shows {occupancy} booked")]
fn trip_shows_booked(world: &DeskWorld, trip: i64, occupancy: String) {
    let board = world.board.borrow();
    let schedule = board
        .iter()
        .find(|schedule| schedule.trip.id == TripId::new(trip))
        .expect("trip is on the board");
    assert_eq!(schedule.occupancy().to_string(), occupancy);
}

// -----------------------------------------------------------------------------
// Scenarios
// -----------------------------------------------------------------------------

#[scenario(path = "tests/features/visit_membership.feature", index = 0)]
fn new_visit_stores_members(world: DeskWorld) {
    drop(world);
}

#[scenario(path = "tests/features/visit_membership.feature", index = 1)]
fn companion_cannot_be_queued_twice(world: DeskWorld) {
    drop(world);
}

#[scenario(path = "tests/features/visit_membership.feature", index = 2)]
fn existing_member_is_rejected(world: DeskWorld) {
    drop(world);
}

#[scenario(path = "tests/features/visit_membership.feature", index = 3)]
fn removal_needs_confirmation(world: DeskWorld) {
    drop(world);
}

#[scenario(path = "tests/features/audit_log.feature", index = 0)]
fn certification_upgrade_is_one_line(world: DeskWorld) {
    drop(world);
}

#[scenario(path = "tests/features/audit_log.feature", index = 1)]
fn client_deletion_is_logged(world: DeskWorld) {
    drop(world);
}

#[scenario(path = "tests/features/trip_board.feature", index = 0)]
fn day_without_trips(world: DeskWorld) {
    drop(world);
}

#[scenario(path = "tests/features/trip_board.feature", index = 1)]
fn bookings_count_towards_occupancy(world: DeskWorld) {
    drop(world);
}

#[scenario(path = "tests/features/trip_board.feature", index = 2)]
fn duplicate_booking_is_refused(world: DeskWorld) {
    drop(world);
}
