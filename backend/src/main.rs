//! Desk entry-point: loads configuration, wires the storage adapter and runs
//! one CLI command.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use mockable::DefaultClock;
use tokio::runtime::Builder;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt};

use divedesk::config::{DeskSettings, StorageChoice};
use divedesk::inbound::cli::{Cli, CliError, Command, ConsoleInteraction, Desk, DeskStorage};
use divedesk::outbound::memory::InMemoryStorage;
use divedesk::outbound::postgrest::PostgrestStorage;

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let settings = DeskSettings::load_without_cli().wrap_err("load desk configuration")?;
    init_tracing(settings.json_logs);

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("create Tokio runtime")?;
    let interaction = Arc::new(ConsoleInteraction::stdio(cli.yes));
    let audit_limit = settings.audit_limit();

    let outcome = match settings.storage()? {
        StorageChoice::Memory => {
            debug!("using in-memory demo storage");
            let demo = InMemoryStorage::with_demo_data(Arc::new(DefaultClock));
            runtime.block_on(run(Arc::new(demo), interaction, audit_limit, cli.command))
        }
        StorageChoice::Postgrest(postgrest) => {
            debug!(url = %postgrest.base_url, "using PostgREST storage");
            let remote = PostgrestStorage::new(&postgrest).wrap_err("build PostgREST client")?;
            runtime.block_on(run(Arc::new(remote), interaction, audit_limit, cli.command))
        }
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(CliError::Domain(error)) => {
            // Already shown to the operator through the console.
            debug!(code = error.code().as_str(), "command failed");
            Ok(ExitCode::FAILURE)
        }
        Err(other @ CliError::Output(_)) => Err(other.into()),
    }
}

fn init_tracing(json: bool) {
    let builder = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = installed {
        warn!(error = %e, "tracing init failed");
    }
}

async fn run<S: DeskStorage>(
    storage: Arc<S>,
    interaction: Arc<ConsoleInteraction<io::BufReader<io::Stdin>, io::Stderr>>,
    audit_limit: usize,
    command: Command,
) -> Result<(), CliError> {
    let desk = Desk::new(storage, interaction, audit_limit);
    let mut stdout = io::stdout().lock();
    desk.run(command, &mut stdout).await
}
