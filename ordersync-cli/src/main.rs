//! ordersync: mirror commerce-platform orders into a local store.
//!
//! # Usage
//!
//! ```text
//! ordersync init [--store-url URL] [--access-token TOKEN] [--status S] [--interval SECS]
//! ordersync sync [--dry-run] [--json] [--status S]
//! ordersync compare [--json] [--status S]
//! ordersync ingest [--json] [--status S]
//! ordersync ship [--json]
//! ordersync status [--json]
//! ordersync daemon start|stop|status|sync|compare
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    compare::CompareArgs, daemon::DaemonCommand, ingest::IngestArgs, init::InitArgs,
    ship::ShipArgs, status::StatusArgs, sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ordersync",
    version,
    about = "Reconcile commerce-platform orders with a local mirror",
    long_about = None,
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.ordersync/config.yaml.
    Init(InitArgs),

    /// Fetch a snapshot and bring the local mirror up to date.
    Sync(SyncArgs),

    /// Fetch a snapshot and report per-order differences without writing.
    Compare(CompareArgs),

    /// Insert orders that are not stored yet; never updates existing ones.
    Ingest(IngestArgs),

    /// Build shipment documents for stored orders.
    Ship(ShipArgs),

    /// Show configuration, mirror size and the last sync.
    Status(StatusArgs),

    /// Run or talk to the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    // The daemon installs its own subscriber with an info default.
    if !matches!(
        cli.command,
        Commands::Daemon {
            command: DaemonCommand::Start
        }
    ) {
        init_tracing(cli.verbose);
    }

    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Compare(args) => args.run(),
        Commands::Ingest(args) => args.run(),
        Commands::Ship(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}

/// Log to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
