//! Daemon runtime.
//!
//! Four tasks share one broadcast shutdown channel: the interval scheduler,
//! the pass processor, the socket server and the ctrl-c handler. Passes from
//! every source go through one mpsc queue and run one at a time on the
//! blocking pool, so two passes never touch the store concurrently. Whichever
//! task finishes first takes the others down with it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use ordersync_core::paths::{ordersync_root, socket_path};
use ordersync_core::{order_schema, Config, FileOrderStore, SourceFeed, StatusFilter};
use ordersync_engine::{pipeline, state};
use ordersync_feed::ShopifyFeed;

use crate::error::{io_err, DaemonError};
use crate::socket;

/// Set to `json` for JSON log lines.
pub const LOG_FORMAT_ENV: &str = "ORDERSYNC_LOG_FORMAT";

const PASS_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    Sync,
    Compare,
    Ingest,
}

/// One queued pass. `dry_run` only applies to syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pass {
    pub kind: PassKind,
    pub status: StatusFilter,
    pub dry_run: bool,
}

impl Pass {
    pub fn new(kind: PassKind, status: StatusFilter) -> Self {
        Self {
            kind,
            status,
            dry_run: false,
        }
    }
}

/// Who asked for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassSource {
    Schedule,
    Socket,
}

struct PassJob {
    pass: Pass,
    source: PassSource,
    reply: oneshot::Sender<Result<Value, String>>,
}

/// Outcome of the most recent pass, reported by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct LastPass {
    pub kind: PassKind,
    pub source: PassSource,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Scheduler knobs resolved from the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    pub interval: Duration,
    pub status: StatusFilter,
}

impl DaemonSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.sync_interval(),
            status: config.status(),
        }
    }
}

/// State every task can reach.
#[derive(Clone)]
pub(crate) struct Shared {
    pub(crate) home: PathBuf,
    pub(crate) settings: DaemonSettings,
    started_at: DateTime<Utc>,
    last_pass: Arc<RwLock<Option<LastPass>>>,
    passes: mpsc::Sender<PassJob>,
    shutdown: broadcast::Sender<()>,
}

impl Shared {
    /// Queue a pass and wait for its JSON report.
    pub(crate) async fn run_pass(
        &self,
        pass: Pass,
        source: PassSource,
    ) -> Result<Value, DaemonError> {
        let (reply, response) = oneshot::channel();
        let job = PassJob {
            pass,
            source,
            reply,
        };
        self.passes
            .send(job)
            .await
            .map_err(|_| DaemonError::ChannelClosed("pass queue"))?;
        response
            .await
            .map_err(|_| DaemonError::ChannelClosed("pass reply"))?
            .map_err(DaemonError::Protocol)
    }

    pub(crate) async fn status_payload(&self) -> Value {
        let last_pass = self.last_pass.read().await.clone();
        let home = self.home.clone();
        let last_sync = match tokio::task::spawn_blocking(move || state::load_at(&home)).await {
            Ok(Ok(state)) => state,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "sync state unreadable");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "sync state read task failed");
                None
            }
        };
        json!({
            "running": true,
            "started_at": self.started_at,
            "interval_secs": self.settings.interval.as_secs(),
            "status": self.settings.status,
            "last_pass": last_pass,
            "last_sync": last_sync,
            "socket": socket_path(&self.home),
        })
    }

    pub(crate) fn request_shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio runtime", e))?
        .block_on(run(home.to_path_buf()))
}

/// Resolve config under `home`, build the HTTP feed and serve.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let mut config = Config::load_at(&home)?;
    config.apply_overrides(|key| std::env::var(key).ok())?;
    let feed: Arc<dyn SourceFeed> = Arc::new(ShopifyFeed::new(config.feed_settings()?));
    serve(home, feed, DaemonSettings::from_config(&config)).await
}

/// Serve until `stop`, ctrl-c, or the first task failure.
pub async fn serve(
    home: PathBuf,
    feed: Arc<dyn SourceFeed>,
    settings: DaemonSettings,
) -> Result<(), DaemonError> {
    let root = ordersync_root(&home);
    std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    let listener = socket::bind(&socket_path(&home))?;

    let (passes, queue) = mpsc::channel(PASS_QUEUE_DEPTH);
    let (shutdown, _) = broadcast::channel(4);
    let shared = Shared {
        home: home.clone(),
        settings,
        started_at: Utc::now(),
        last_pass: Arc::new(RwLock::new(None)),
        passes,
        shutdown: shutdown.clone(),
    };
    tracing::info!(
        interval_secs = shared.settings.interval.as_secs(),
        status = %shared.settings.status,
        "daemon starting"
    );

    let tasks = [
        supervise(
            "scheduler",
            &shutdown,
            schedule_syncs(shared.clone(), shutdown.subscribe()),
        ),
        supervise(
            "pass processor",
            &shutdown,
            process_passes(
                home,
                feed,
                Arc::clone(&shared.last_pass),
                queue,
                shutdown.subscribe(),
            ),
        ),
        supervise(
            "socket server",
            &shutdown,
            socket::serve(listener, shared.clone(), shutdown.subscribe()),
        ),
        supervise("signal handler", &shutdown, wait_for_ctrl_c(shutdown.subscribe())),
    ];
    drop(shared);

    let mut first_failure = None;
    for (name, handle) in tasks {
        let outcome = handle
            .await
            .unwrap_or_else(|err| Err(DaemonError::Protocol(format!("{name} task panicked: {err}"))));
        if let Err(err) = outcome {
            tracing::error!(task = name, error = %err, "daemon task failed");
            first_failure.get_or_insert(err);
        }
    }
    match first_failure {
        Some(err) => Err(err),
        None => {
            tracing::info!("daemon stopped");
            Ok(())
        }
    }
}

/// Spawn `task`; when it returns, for any reason, signal shutdown.
fn supervise<F>(
    name: &'static str,
    shutdown: &broadcast::Sender<()>,
    task: F,
) -> (&'static str, JoinHandle<Result<(), DaemonError>>)
where
    F: Future<Output = Result<(), DaemonError>> + Send + 'static,
{
    let shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        let outcome = task.await;
        let _ = shutdown.send(());
        outcome
    });
    (name, handle)
}

/// First tick fires immediately, so the daemon syncs on startup.
async fn schedule_syncs(
    shared: Shared,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticks = tokio::time::interval(shared.settings.interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.recv() => return Ok(()),
            _ = ticks.tick() => {}
        }
        let pass = Pass::new(PassKind::Sync, shared.settings.status);
        match shared.run_pass(pass, PassSource::Schedule).await
        {
            Ok(_) => {}
            Err(DaemonError::ChannelClosed(_)) => return Ok(()),
            // Already logged by the processor.
            Err(err) => tracing::debug!(error = %err, "scheduled sync failed"),
        }
    }
}

async fn process_passes(
    home: PathBuf,
    feed: Arc<dyn SourceFeed>,
    last_pass: Arc<RwLock<Option<LastPass>>>,
    mut queue: mpsc::Receiver<PassJob>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        let job = tokio::select! {
            _ = shutdown.recv() => return Ok(()),
            job = queue.recv() => match job {
                Some(job) => job,
                None => return Ok(()),
            },
        };

        let started = Instant::now();
        let pass = job.pass;
        let kind = pass.kind;
        let (pass_home, pass_feed) = (home.clone(), Arc::clone(&feed));
        let outcome = tokio::task::spawn_blocking(move || {
            run_pass(&pass_home, pass_feed.as_ref(), pass)
        })
        .await
        .map_err(|err| DaemonError::Protocol(format!("{kind:?} pass panicked: {err}")))?
        .map_err(|err| err.to_string());

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if let Err(err) = &outcome {
            tracing::error!(kind = ?kind, source = ?job.source, error = %err, "pass failed");
        }
        *last_pass.write().await = Some(LastPass {
            kind,
            source: job.source,
            finished_at: Utc::now(),
            duration_ms,
            error: outcome.as_ref().err().cloned(),
        });
        let _ = job.reply.send(outcome);
    }
}

/// One blocking pass against the file store under `home`.
fn run_pass(home: &Path, feed: &dyn SourceFeed, pass: Pass) -> Result<Value, DaemonError> {
    let schema = order_schema();
    let mut store = FileOrderStore::open_at(home);
    let status = pass.status;
    match pass.kind {
        PassKind::Sync => {
            let report = pipeline::sync(feed, &mut store, &schema, status, pass.dry_run)?;
            pipeline::record_pass(home, status, &report)?;
            let counts = report.counts();
            tracing::info!(
                new = counts.new,
                updated = counts.updated,
                unchanged = counts.unchanged,
                archived = counts.archived,
                failed = counts.failed,
                dry_run = report.dry_run,
                "sync pass completed"
            );
            Ok(serde_json::to_value(&report)?)
        }
        PassKind::Compare => {
            let report = pipeline::compare(feed, &store, &schema, status)?;
            tracing::info!(
                differences = report.comparison_data.len(),
                failed = report.failed.len(),
                "compare pass completed"
            );
            Ok(serde_json::to_value(&report)?)
        }
        PassKind::Ingest => {
            let report = pipeline::ingest(feed, &mut store, status)?;
            tracing::info!(
                inserted = report.inserted.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "ingest pass completed"
            );
            Ok(serde_json::to_value(&report)?)
        }
    }
}

async fn wait_for_ctrl_c(mut shutdown: broadcast::Receiver<()>) -> Result<(), DaemonError> {
    tokio::select! {
        _ = shutdown.recv() => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| io_err("ctrl-c handler", e))?;
            tracing::info!("ctrl-c received, stopping");
            Ok(())
        }
    }
}

/// `RUST_LOG` filter (default `info`); JSON lines when `ORDERSYNC_LOG_FORMAT=json`.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_target(false);
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let _ = if json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
}
