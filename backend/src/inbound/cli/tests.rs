//! Argument parsing and field merging for the CLI.

use super::*;
use clap::CommandFactory;
use rstest::rstest;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("divedesk").chain(args.iter().copied()))
        .expect("arguments should parse")
}

fn day(raw: &str) -> NaiveDate {
    raw.parse().expect("valid date")
}

#[rstest]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[rstest]
fn yes_flag_is_accepted_after_the_subcommand() {
    let cli = parse(&["clients", "delete", "3", "--yes"]);

    assert!(cli.yes);
    assert!(matches!(
        cli.command,
        Command::Clients(ClientsCommand::Delete { id: 3 })
    ));
}

#[rstest]
fn visit_create_collects_companions() {
    let cli = parse(&[
        "visits", "create", "1", "--group", "Doe party", "--start", "2025-01-10", "--end",
        "2025-01-17", "--with", "2", "--with", "3",
    ]);

    let Command::Visits(VisitsCommand::Create {
        client,
        group,
        start,
        companions,
        ..
    }) = cli.command
    else {
        panic!("expected visits create");
    };
    assert_eq!(client, 1);
    assert_eq!(group, "Doe party");
    assert_eq!(start, day("2025-01-10"));
    assert_eq!(companions, [2, 3]);
}

#[rstest]
#[case::label("Open Water", CertificationLevel::OpenWater)]
#[case::shorthand("rescue", CertificationLevel::Rescue)]
fn certification_parses_from_labels(#[case] raw: &str, #[case] expected: CertificationLevel) {
    let cli = parse(&["clients", "create", "--first", "Ana", "--last", "Lima", "--cert", raw]);

    let Command::Clients(ClientsCommand::Create(profile)) = cli.command else {
        panic!("expected clients create");
    };
    assert_eq!(profile.cert, Some(expected));
}

#[rstest]
#[case::no_party(&["book", "1"])]
#[case::bad_date(&["trips", "11/01/2025"])]
#[case::unknown_cert(&["clients", "create", "--cert", "Aquanaut"])]
fn invalid_arguments_are_rejected(#[case] args: &[&str]) {
    let parsed = Cli::try_parse_from(std::iter::once("divedesk").chain(args.iter().copied()));

    assert!(parsed.is_err());
}

#[rstest]
fn profile_args_only_touch_given_fields() {
    let mut profile = ClientProfile::named("Maria", "Silva").with_email("maria@brazil.com");
    let changes = ProfileArgs {
        cert: Some(CertificationLevel::Rescue),
        notes: Some("Prefers nitrox".to_owned()),
        ..ProfileArgs::default()
    };

    changes.apply(&mut profile);

    assert_eq!(profile.first_name, "Maria");
    assert_eq!(profile.email.as_deref(), Some("maria@brazil.com"));
    assert_eq!(profile.certification, Some(CertificationLevel::Rescue));
    assert_eq!(profile.notes, "Prefers nitrox");
}

#[rstest]
fn visit_args_merge_over_current_details() {
    let dates = DateRange::new(day("2025-01-10"), day("2025-01-17")).expect("ordered");
    let current = VisitDetails::new("Doe party", dates).with_room("12");
    let changes = VisitArgs {
        end: Some(day("2025-01-19")),
        room: Some("14".to_owned()),
        ..VisitArgs::default()
    };

    let merged = changes.merge(&current).expect("dates stay ordered");

    assert_eq!(merged.group_name, "Doe party");
    assert_eq!(merged.dates.start(), day("2025-01-10"));
    assert_eq!(merged.dates.end(), day("2025-01-19"));
    assert_eq!(merged.room, "14");
}

#[rstest]
fn visit_args_reject_reversed_dates() {
    let dates = DateRange::new(day("2025-01-10"), day("2025-01-17")).expect("ordered");
    let current = VisitDetails::new("Doe party", dates);
    let changes = VisitArgs {
        start: Some(day("2025-01-20")),
        ..VisitArgs::default()
    };

    assert!(changes.merge(&current).is_err());
}
