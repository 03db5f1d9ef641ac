//! `ordersync ingest`: insert-only import of orders not yet mirrored.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ordersync_core::{FileOrderStore, StatusFilter};
use ordersync_daemon::request_ingest;
use ordersync_engine::{pipeline, IngestReport};

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Override the configured status filter.
    #[arg(long)]
    pub status: Option<StatusFilter>,
}

impl IngestArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let report: IngestReport = if super::use_daemon(&home) {
            let data = request_ingest(&home, self.status).context("daemon ingest failed")?;
            serde_json::from_value(data).context("daemon returned an unexpected ingest report")?
        } else {
            let config = super::load_config()?;
            let feed = super::open_feed(&config)?;
            let status = self.status.unwrap_or_else(|| config.status());
            let mut store = FileOrderStore::open()?;
            pipeline::ingest(&feed, &mut store, status).context("ingest failed")?
        };

        if self.json {
            return super::print_json(&report);
        }
        println!(
            "✓ {} inserted, {} already stored, {} failed",
            report.inserted.len(),
            report.skipped.len(),
            report.failed.len()
        );
        for r in &report.inserted {
            println!("  {} {} {}", "+".green(), r.id, r.label);
        }
        for f in &report.failed {
            let id = f.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into());
            println!("  {} {id} {}: {}", "✗".red(), f.label, f.reason);
        }
        Ok(())
    }
}
