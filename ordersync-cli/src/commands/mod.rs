pub mod compare;
pub mod daemon;
pub mod ingest;
pub mod init;
pub mod ship;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use ordersync_core::Config;
use ordersync_feed::ShopifyFeed;

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// `~/.ordersync/config.yaml` with the process environment applied.
pub(crate) fn load_config() -> Result<Config> {
    Config::load().context("failed to load config")
}

pub(crate) fn open_feed(config: &Config) -> Result<ShopifyFeed> {
    let settings = config
        .feed_settings()
        .context("feed is not configured; run `ordersync init` first")?;
    Ok(ShopifyFeed::new(settings))
}

/// True when a daemon listens under `home`. Passes then go through its queue
/// instead of running beside the one it may be running.
pub(crate) fn use_daemon(home: &Path) -> bool {
    let running = ordersync_daemon::daemon_running(home);
    if running {
        eprintln!("{}", "daemon is running; queueing the pass there".dimmed());
    }
    running
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}
