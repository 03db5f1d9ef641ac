//! `ordersync daemon`: run the scheduler or talk to a running one.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::Value;

use ordersync_core::StatusFilter;
use ordersync_daemon::{
    request_compare, request_status, request_stop, request_sync, start_blocking, DaemonError,
};
use ordersync_engine::ReconciliationReport;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (scheduler + socket server).
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status,
    /// Ask the running daemon for an immediate sync pass.
    Sync {
        #[arg(long)]
        status: Option<StatusFilter>,
        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Ask the running daemon for a report-mode pass.
    Compare {
        #[arg(long)]
        status: Option<StatusFilter>,
    },
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = super::home_dir()?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => println!("daemon is not running"),
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match request_status(&home) {
            Ok(status) => super::print_json(&status)?,
            Err(DaemonError::DaemonNotRunning { socket }) => {
                super::print_json(&serde_json::json!({
                    "running": false,
                    "socket": socket.display().to_string(),
                }))?;
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Sync { status, json } => {
            let data = request_sync(&home, status, false).context("daemon sync failed")?;
            if json {
                return super::print_json(&data);
            }
            let report: ReconciliationReport = serde_json::from_value(data)
                .context("daemon returned an unexpected sync report")?;
            super::sync::print_report(&report);
        }
        DaemonCommand::Compare { status } => {
            let data: Value = request_compare(&home, status).context("daemon compare failed")?;
            super::print_json(&data)?;
        }
    }

    Ok(())
}
