//! `ordersync ship`: build shipment documents for stored orders.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ordersync_core::{FileOrderStore, FileShipmentStore};
use ordersync_engine::{pipeline, ShipmentIssue};

#[derive(Args, Debug)]
pub struct ShipArgs {
    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ShipArgs {
    pub fn run(self) -> Result<()> {
        let orders = FileOrderStore::open()?;
        let mut shipments = FileShipmentStore::open()?;
        let report =
            pipeline::ship_orders(&orders, &mut shipments).context("shipment pass failed")?;

        if self.json {
            return super::print_json(&report);
        }
        println!(
            "✓ {} saved, {} already shipped, {} failed, {} with warnings",
            report.saved.len(),
            report.skipped.len(),
            report.failed.len(),
            report.warnings.len()
        );
        for name in &report.saved {
            println!("  {} {name}", "+".green());
        }
        print_issues(&report.warnings, &"!".yellow().to_string());
        print_issues(&report.failed, &"✗".red().to_string());
        Ok(())
    }
}

fn print_issues(issues: &[ShipmentIssue], marker: &str) {
    for issue in issues {
        println!("  {marker} {} {}: {}", issue.id, issue.label, issue.details.join("; "));
    }
}
