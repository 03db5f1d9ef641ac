//! `ordersync status`: configuration, mirror size and last sync.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use ordersync_core::paths::ordersync_root;
use ordersync_core::{Config, FileOrderStore, FileShipmentStore, OrderStore, StatusFilter};
use ordersync_engine::state::{self, SyncState};

/// Arguments for `ordersync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let config = super::load_config()?;
        let stored = FileOrderStore::open()?
            .find_all()
            .context("failed to read stored orders")?;
        let shipments = FileShipmentStore::open()?
            .load()
            .context("failed to read shipments")?
            .len();
        let last_sync = state::load_at(&home).context("failed to read sync state")?;

        let report = StatusReport {
            root: ordersync_root(&home).display().to_string(),
            configured: config.feed_settings().is_ok(),
            store_url: config.store_url.clone(),
            status: config.status(),
            sync_interval_secs: config.sync_interval().as_secs(),
            orders: stored.records.len(),
            unreadable_orders: stored.unreadable.len(),
            shipments,
            last_sync,
        };
        if self.json {
            return super::print_json(&report);
        }
        print_table(&report, &config);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    root: String,
    configured: bool,
    store_url: Option<String>,
    status: StatusFilter,
    sync_interval_secs: u64,
    orders: usize,
    unreadable_orders: usize,
    shipments: usize,
    last_sync: Option<SyncState>,
}

#[derive(Tabled)]
struct LastSyncRow {
    #[tabled(rename = "synced")]
    synced: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "new")]
    new: usize,
    #[tabled(rename = "updated")]
    updated: usize,
    #[tabled(rename = "unchanged")]
    unchanged: usize,
    #[tabled(rename = "archived")]
    archived: usize,
    #[tabled(rename = "failed")]
    failed: usize,
}

fn print_table(report: &StatusReport, config: &Config) {
    println!(
        "ordersync v{} | {} orders | {} shipments",
        env!("CARGO_PKG_VERSION"),
        report.orders,
        report.shipments,
    );
    println!("  root:     {}", report.root);
    if report.unreadable_orders > 0 {
        println!(
            "  {}",
            format!("{} stored orders are unreadable", report.unreadable_orders).yellow()
        );
    }
    let feed = match (&config.store_url, report.configured) {
        (Some(url), true) => url.green().to_string(),
        (Some(url), false) => format!("{url} {}", "(no access token)".yellow()),
        (None, _) => "not configured".red().to_string(),
    };
    println!("  feed:     {feed}");
    println!(
        "  schedule: every {}s, status={}",
        report.sync_interval_secs, report.status
    );

    let Some(last) = &report.last_sync else {
        println!("  last sync: never");
        return;
    };
    let row = LastSyncRow {
        synced: format!("{} ({} ago)", last.synced_at.to_rfc3339(), age(last.synced_at)),
        status: last.status.to_string(),
        new: last.counts.new,
        updated: last.counts.updated,
        unchanged: last.counts.unchanged,
        archived: last.counts.archived,
        failed: last.counts.failed,
    };
    let mut table = Table::new([row]);
    table.with(Style::rounded());
    println!("{table}");
}

/// Compact age: `42s`, `5m`, `3h`, `2d`.
fn age(at: DateTime<Utc>) -> String {
    let secs = Utc::now().signed_duration_since(at).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3_600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3_600),
        s => format!("{}d", s / 86_400),
    }
}
