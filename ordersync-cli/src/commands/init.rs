//! `ordersync init [--store-url URL] [--access-token TOKEN] ...`

use anyhow::{Context, Result};
use clap::Args;

use ordersync_core::paths::config_path;
use ordersync_core::{Config, StatusFilter};

/// Create or update `~/.ordersync/config.yaml`. Unset flags keep the
/// existing value.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Shop base URL, e.g. https://example.myshopify.com.
    #[arg(long)]
    pub store_url: Option<String>,

    /// Admin API access token.
    #[arg(long)]
    pub access_token: Option<String>,

    /// Admin API version, e.g. 2024-07.
    #[arg(long)]
    pub api_version: Option<String>,

    /// Default order status filter: open | closed | cancelled | any.
    #[arg(long)]
    pub status: Option<StatusFilter>,

    /// Daemon sync interval in seconds.
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let mut config = Config::load_at(&home).context("failed to load existing config")?;
        merge(&mut config, self);
        config.save_at(&home).context("failed to write config")?;

        println!("✓ Wrote {}", config_path(&home).display());
        if config.store_url.is_none() || config.access_token.is_none() {
            println!(
                "  store_url and access_token must be set (here or via SHOPIFY_STORE_URL / SHOPIFY_ACCESS_TOKEN) before syncing"
            );
        }
        Ok(())
    }
}

fn merge(config: &mut Config, args: InitArgs) {
    if args.store_url.is_some() {
        config.store_url = args.store_url;
    }
    if args.access_token.is_some() {
        config.access_token = args.access_token;
    }
    if args.api_version.is_some() {
        config.api_version = args.api_version;
    }
    if args.status.is_some() {
        config.status = args.status;
    }
    if args.interval.is_some() {
        config.sync_interval_secs = args.interval;
    }
}
