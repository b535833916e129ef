//! End-to-end runs of CLI commands against the in-memory demo storage.
//!
//! Each test parses real arguments, runs them through the desk and checks
//! what reached stdout and the operator console.

use std::io::Cursor;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use clap::Parser;
use divedesk::inbound::cli::{Cli, CliError, ConsoleInteraction, Desk};
use divedesk::outbound::memory::InMemoryStorage;
use insta::assert_snapshot;
use mockable::MockClock;
use rstest::{fixture, rstest};

type Console = ConsoleInteraction<Cursor<Vec<u8>>, Vec<u8>>;

struct Run {
    outcome: Result<(), CliError>,
    stdout: String,
    console: String,
}

fn recorded_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 12, 9, 30, 0)
        .single()
        .expect("valid instant")
}

#[fixture]
fn storage() -> Arc<InMemoryStorage> {
    let mut clock = MockClock::new();
    clock.expect_utc().returning(recorded_at);
    Arc::new(InMemoryStorage::with_demo_data(Arc::new(clock)))
}

async fn run(storage: &Arc<InMemoryStorage>, args: &[&str], answers: &str) -> Run {
    let cli = Cli::try_parse_from(std::iter::once("divedesk").chain(args.iter().copied()))
        .expect("arguments should parse");
    let console: Arc<Console> = Arc::new(ConsoleInteraction::new(
        Cursor::new(answers.as_bytes().to_vec()),
        Vec::new(),
        cli.yes,
    ));
    let desk = Desk::new(Arc::clone(storage), Arc::clone(&console), 50);
    let mut stdout = Vec::new();
    let outcome = desk.run(cli.command, &mut stdout).await;
    drop(desk);
    let console = Arc::try_unwrap(console).expect("desk released the console");
    Run {
        outcome,
        stdout: String::from_utf8(stdout).expect("utf-8 stdout"),
        console: String::from_utf8(console.into_output()).expect("utf-8 console"),
    }
}

#[rstest]
#[tokio::test]
async fn clients_are_listed_by_last_name(storage: Arc<InMemoryStorage>) {
    let listed = run(&storage, &["clients", "list"], "").await;

    assert!(listed.outcome.is_ok());
    assert_snapshot!(listed.stdout, @r"
    #3    James Bond               -                    007@mi6.gov
    #4    Sarah Connor             Advanced Open Water  sarah@skynet.net
    #1    John Doe                 Open Water           john@example.com
    #2    Maria Silva              Rescue Diver         maria@brazil.com
    ");
}

#[rstest]
#[tokio::test]
async fn profile_shows_visit_history(storage: Arc<InMemoryStorage>) {
    let shown = run(&storage, &["clients", "show", "1"], "").await;

    assert!(shown.outcome.is_ok());
    assert_snapshot!(shown.stdout, @r"
    John Doe (#1)
      Email: john@example.com
      Phone: -
      Certification: Open Water
      Last dive: -
    Visits:
      2025-01-10 → 2025-01-17  Doe party (#101)
        With: Maria Silva, James Bond
        Trips: Jan 11 (Big Blue), Jan 13 (Little Mermaid), Jan 15 (Big Blue)
      2024-06-01 → 2024-06-05  Doe & Connor (#102)
        With: Sarah Connor
        Trips: Jun 02 (Big Blue)
    ");
}

#[rstest]
#[tokio::test]
async fn unknown_client_is_reported_once(storage: Arc<InMemoryStorage>) {
    let shown = run(&storage, &["clients", "show", "77"], "").await;

    assert!(matches!(shown.outcome, Err(CliError::Domain(_))));
    assert_eq!(shown.stdout, "");
    assert_eq!(shown.console, "error: client 77 not found\n");
}

#[rstest]
#[tokio::test]
async fn created_client_is_searchable(storage: Arc<InMemoryStorage>) {
    let created = run(
        &storage,
        &[
            "clients",
            "create",
            "--first",
            "Ana",
            "--last",
            "Lima",
            "--email",
            "ana@reef.io",
            "--cert",
            "AOW",
        ],
        "",
    )
    .await;
    assert!(created.outcome.is_ok());
    assert_eq!(created.stdout, "Created client #5\n");
    assert_eq!(created.console, "Saved Ana Lima\n");

    let found = run(&storage, &["clients", "search", "lima"], "").await;

    assert_snapshot!(found.stdout, @"#5    Ana Lima                 Advanced Open Water  ana@reef.io");
}

#[rstest]
#[tokio::test]
async fn blank_last_name_is_rejected(storage: Arc<InMemoryStorage>) {
    let created = run(&storage, &["clients", "create", "--first", "Ana"], "").await;

    assert!(matches!(created.outcome, Err(CliError::Domain(_))));
    assert!(created.console.starts_with("error: "));
    assert_eq!(storage.client_count(), 4);
}

#[rstest]
#[tokio::test]
async fn visit_with_companion_appears_in_both_histories(storage: Arc<InMemoryStorage>) {
    let created = run(
        &storage,
        &[
            "visits",
            "create",
            "4",
            "--group",
            "Connor trip",
            "--start",
            "2025-02-01",
            "--end",
            "2025-02-04",
            "--with",
            "3",
        ],
        "",
    )
    .await;
    assert!(created.outcome.is_ok());
    assert!(created.stdout.starts_with("Created visit #"));
    assert_eq!(created.console, "Added visit Connor trip\n");

    let companion = run(&storage, &["visits", "list", "3"], "").await;

    assert!(companion.stdout.contains("Connor trip"));
    assert!(companion.stdout.contains("With: Sarah Connor"));
}

#[rstest]
#[tokio::test]
async fn duplicate_companion_stores_nothing(storage: Arc<InMemoryStorage>) {
    let audit_before = storage.audit_len();

    let created = run(
        &storage,
        &[
            "visits",
            "create",
            "1",
            "--group",
            "Twice",
            "--start",
            "2025-02-01",
            "--end",
            "2025-02-02",
            "--with",
            "2",
            "--with",
            "2",
        ],
        "",
    )
    .await;

    assert!(matches!(created.outcome, Err(CliError::Domain(_))));
    assert_eq!(created.console, "error: Client is already in this group.\n");
    assert_eq!(storage.audit_len(), audit_before);
}

#[rstest]
#[tokio::test]
async fn declined_deletion_keeps_the_client(storage: Arc<InMemoryStorage>) {
    let deleted = run(&storage, &["clients", "delete", "4"], "n\n").await;

    assert!(deleted.outcome.is_ok());
    assert_eq!(deleted.stdout, "Nothing deleted.\n");
    assert_eq!(
        deleted.console,
        "Delete Sarah Connor? This cannot be undone. [y/N] "
    );
    assert_eq!(storage.client_count(), 4);
}

#[rstest]
#[tokio::test]
async fn confirmed_deletion_is_logged(storage: Arc<InMemoryStorage>) {
    let deleted = run(&storage, &["clients", "delete", "4", "--yes"], "").await;
    assert!(deleted.outcome.is_ok());
    assert_eq!(deleted.console, "Deleted Sarah Connor\n");
    assert_eq!(storage.client_count(), 3);

    let logs = run(&storage, &["logs", "--limit", "1"], "").await;

    assert_snapshot!(logs.stdout, @"2025-01-12 09:30  DELETE  CLIENTS         record deleted");
}

#[rstest]
#[tokio::test]
async fn member_removal_asks_first(storage: Arc<InMemoryStorage>) {
    let removed = run(
        &storage,
        &["visits", "remove-member", "1", "101", "3"],
        "yes\n",
    )
    .await;
    assert!(removed.outcome.is_ok());
    assert_eq!(removed.console, "Remove from group? [y/N] ");

    let history = run(&storage, &["visits", "list", "1"], "").await;

    assert!(history.stdout.contains("With: Maria Silva\n"));
}

#[rstest]
#[tokio::test]
async fn trip_board_lists_the_day(storage: Arc<InMemoryStorage>) {
    let board = run(&storage, &["trips", "2025-01-11"], "").await;

    assert_snapshot!(board.stdout, @r"
    Trips on 2025-01-11
    08:00  Morning 2-Tank (#1)  Big Blue  2/10 Pax  available
      - John Doe [waiver deposit]
      - Maria Silva [waiver deposit]
    13:00  Afternoon 1-Tank (#2)  Little Mermaid  0/12 Pax  available
    ");
}

#[rstest]
#[tokio::test]
async fn booking_and_unbooking(storage: Arc<InMemoryStorage>) {
    let booked = run(&storage, &["book", "2", "3", "4", "--visit", "102"], "").await;
    assert!(booked.outcome.is_ok());
    assert_eq!(booked.console, "Booked 2 on Afternoon 1-Tank\n");
    assert_eq!(booked.stdout.lines().count(), 2);

    let again = run(&storage, &["book", "2", "3"], "").await;
    assert!(matches!(again.outcome, Err(CliError::Domain(_))));
    assert_eq!(again.console, "error: already on the manifest\n");

    let removed = run(&storage, &["unbook", "7"], "").await;
    assert!(removed.outcome.is_ok());
    let board = run(&storage, &["trips", "2025-01-11"], "").await;
    assert!(board.stdout.contains("1/12 Pax"));
}

#[rstest]
#[tokio::test]
async fn checklist_flags_are_saved(storage: Arc<InMemoryStorage>) {
    let updated = run(
        &storage,
        &[
            "checklist",
            "--date",
            "2025-01-11",
            "1",
            "--pickup",
            "true",
            "--deposit",
            "false",
        ],
        "",
    )
    .await;
    assert!(updated.outcome.is_ok());
    assert_eq!(updated.console, "Updated manifest row 1\n");

    let board = run(&storage, &["trips", "2025-01-11"], "").await;

    assert!(board.stdout.contains("  - John Doe [waiver pickup]\n"));
}

#[rstest]
#[tokio::test]
async fn audit_log_summarises_the_seed_upgrade(storage: Arc<InMemoryStorage>) {
    let logs = run(&storage, &["logs"], "").await;

    assert_snapshot!(logs.stdout, @"2025-01-12 09:30  UPDATE  CLIENTS         cert_level: Advanced Open Water → Rescue Diver");
}
