//! `ordersync compare`: report-mode pass; the store is never written.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use serde_json::Value;

use ordersync_core::{order_schema, FileOrderStore, StatusFilter};
use ordersync_daemon::request_compare;
use ordersync_engine::{changed_paths_in, pipeline};

/// Arguments for `ordersync compare`.
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Emit `{"comparisonData": [...]}` JSON.
    #[arg(long)]
    pub json: bool,

    /// Override the configured status filter.
    #[arg(long)]
    pub status: Option<StatusFilter>,
}

impl CompareArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let report = if super::use_daemon(&home) {
            request_compare(&home, self.status).context("daemon compare failed")?
        } else {
            let config = super::load_config()?;
            let feed = super::open_feed(&config)?;
            let status = self.status.unwrap_or_else(|| config.status());
            let store = FileOrderStore::open()?;
            let report = pipeline::compare(&feed, &store, &order_schema(), status)
                .context("compare failed")?;
            serde_json::to_value(&report).context("failed to serialize comparison")?
        };

        if self.json {
            return super::print_json(&report);
        }
        print_report(&report);
        Ok(())
    }
}

#[derive(Tabled)]
struct DiffRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "order")]
    label: String,
    #[tabled(rename = "changes")]
    changes: String,
}

/// Renders the JSON form so local and daemon reports print the same way.
fn print_report(report: &Value) {
    let entries = report["comparisonData"].as_array().map(Vec::as_slice).unwrap_or_default();
    let failed = report["failed"].as_array().map(Vec::as_slice).unwrap_or_default();
    if entries.is_empty() && failed.is_empty() {
        println!("✓ mirror matches the feed");
        return;
    }

    let text = |value: &Value| match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    };
    let rows: Vec<DiffRow> = entries
        .iter()
        .map(|entry| DiffRow {
            id: text(&entry["id"]),
            label: text(&entry["label"]),
            changes: match &entry["diff"] {
                Value::String(marker) => marker.yellow().to_string(),
                diff => changed_paths_in(diff).join(", "),
            },
        })
        .collect();
    println!("{} orders differ", rows.len());
    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    for f in failed {
        println!(
            "  {} {} {}: {}",
            "✗".red(),
            text(&f["id"]),
            text(&f["label"]),
            text(&f["reason"])
        );
    }
}
