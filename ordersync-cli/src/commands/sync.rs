//! `ordersync sync`: one reconciliation pass against the local mirror.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use ordersync_core::{order_schema, FileOrderStore, StatusFilter};
use ordersync_daemon::request_sync;
use ordersync_engine::{pipeline, ReconciliationReport};

/// Arguments for `ordersync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Classify only; write nothing to the store.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Override the configured status filter.
    #[arg(long)]
    pub status: Option<StatusFilter>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let report = if super::use_daemon(&home) {
            let data = request_sync(&home, self.status, self.dry_run)
                .context("daemon sync failed")?;
            serde_json::from_value(data).context("daemon returned an unexpected sync report")?
        } else {
            self.run_here(&home)?
        };

        if self.json {
            return super::print_json(&report);
        }
        print_report(&report);
        Ok(())
    }

    fn run_here(&self, home: &Path) -> Result<ReconciliationReport> {
        let config = super::load_config()?;
        let feed = super::open_feed(&config)?;
        let status = self.status.unwrap_or_else(|| config.status());

        let mut store = FileOrderStore::open()?;
        let report = pipeline::sync(&feed, &mut store, &order_schema(), status, self.dry_run)
            .context("sync failed")?;
        pipeline::record_pass(home, status, &report).context("failed to record sync state")?;
        Ok(report)
    }
}

#[derive(Tabled)]
struct OrderRow {
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "order")]
    label: String,
    #[tabled(rename = "detail")]
    detail: String,
}

/// Summary line plus one row per order that did not stay unchanged.
pub(crate) fn print_report(report: &ReconciliationReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    println!(
        "{prefix}✓ {} new, {} updated, {} unchanged, {} archived, {} failed",
        report.new.len(),
        report.updated.len(),
        report.unchanged.len(),
        report.archived.len(),
        report.failed.len(),
    );

    let row = |outcome: String, id: String, label: &str, detail: &str| OrderRow {
        outcome,
        id,
        label: label.to_string(),
        detail: detail.to_string(),
    };
    let mut rows = Vec::new();
    for r in &report.new {
        rows.push(row("new".green().to_string(), r.id.to_string(), &r.label, ""));
    }
    for r in &report.updated {
        rows.push(row("updated".cyan().to_string(), r.id.to_string(), &r.label, ""));
    }
    for r in &report.archived {
        rows.push(row("archived".yellow().to_string(), r.id.to_string(), &r.label, ""));
    }
    for f in &report.failed {
        let id = f.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into());
        rows.push(row("failed".red().to_string(), id, &f.label, &f.reason));
    }
    if rows.is_empty() {
        return;
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
