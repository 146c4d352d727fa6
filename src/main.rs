mod archive;
mod audit_log;
mod cli;
mod config;
mod control;
mod engine;
mod error;
mod export;
mod logging;
mod processor;
mod server;
mod state_machine;
mod status;
mod ui;
mod x_api;

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::FixedOffset;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use cli::{Cli, Command};
use config::SweepConfig;
use engine::{EngineConfig, JobEngine};
use export::ExportRequest;
use processor::{DeleteProcessor, ItemProcessor, LookupProcessor};
use state_machine::{Phase, WorkItem};
use status::StatusReport;
use ui::JobProgress;
use x_api::{TimelineOptions, XClient};

/// How often the terminal bar is refreshed from the engine.
const PROGRESS_REFRESH: Duration = Duration::from_millis(500);

/// Pause between two timeline pages during an export.
const EXPORT_PAGE_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = SweepConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(interval) = cli.interval {
        config.interval_secs = interval;
    }
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    let tz = config.timezone().context("utc_offset_hours out of range")?;
    let linger = !cli.exit_when_done;

    match cli.command {
        Command::Check => check(&config).await,
        Command::Delete { archive } => delete(&config, tz, &archive, linger).await,
        Command::Lookup { archive, out } => lookup(&config, tz, &archive, &out, linger).await,
        Command::Export {
            username,
            count,
            exclude_rts,
            exclude_replies,
            out,
        } => {
            let request = ExportRequest {
                username,
                count,
                options: TimelineOptions {
                    include_retweets: !exclude_rts,
                    exclude_replies,
                },
                page_delay: EXPORT_PAGE_DELAY,
                max_throttled: export::MAX_THROTTLED,
            };
            export(&config, &request, &out).await
        }
    }
}

fn client(config: &SweepConfig, token: &str) -> anyhow::Result<XClient> {
    XClient::with_base_url(token.to_string(), config.api_base.clone(), config.request_timeout())
        .context("building HTTP client")
}

async fn check(config: &SweepConfig) -> anyhow::Result<()> {
    let client = client(config, config.require_user_token()?)?;
    let me = client.me().await.context("GET /users/me")?;
    println!("authenticated as @{} ({}, id {})", me.username, me.name, me.id);
    Ok(())
}

async fn load_items(path: &Path, tz: FixedOffset) -> anyhow::Result<Vec<WorkItem>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let items = archive::parse_archive(&bytes, tz)
        .with_context(|| format!("parsing {}", path.display()))?;
    info!(items = items.len(), archive = %path.display(), "archive loaded");
    Ok(items)
}

fn engine_config(config: &SweepConfig, tz: FixedOffset, interval: Duration, prefix: &str) -> EngineConfig {
    EngineConfig {
        interval,
        poll_interval: config.poll_interval(),
        log_dir: config.log_dir.clone(),
        log_prefix: prefix.to_string(),
        timezone: tz,
    }
}

async fn delete(config: &SweepConfig, tz: FixedOffset, archive: &Path, linger: bool) -> anyhow::Result<()> {
    let items = load_items(archive, tz).await?;
    let client = client(config, config.require_user_token()?)?;
    let processor = Arc::new(DeleteProcessor::new(client, config.interval()));

    let engine_config = engine_config(config, tz, config.interval(), "deleted_ids");
    let job = run_job(config, engine_config, "delete", items, processor).await?;
    job.close(linger).await
}

async fn lookup(
    config: &SweepConfig,
    tz: FixedOffset,
    archive: &Path,
    out: &Path,
    linger: bool,
) -> anyhow::Result<()> {
    let items = load_items(archive, tz).await?;
    let client = client(config, config.read_token()?)?;
    let processor = Arc::new(LookupProcessor::new(client, config.interval()));

    let engine_config = engine_config(config, tz, config.lookup_interval(), "fetched_ids");
    let job = run_job(config, engine_config, "lookup", items, Arc::clone(&processor)).await?;

    // Whatever was fetched is kept, even after a cancel or a fault.
    let found = processor.found();
    let bytes = archive::write_archive(&found)?;
    tokio::fs::write(out, bytes)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    println!("  wrote {} posts to {}", found.len(), out.display());
    job.close(linger).await
}

async fn export(config: &SweepConfig, request: &ExportRequest, out: &Path) -> anyhow::Result<()> {
    let client = client(config, config.read_token()?)?;
    let tweets = export::export_timeline(&client, request)
        .await
        .with_context(|| format!("exporting @{}", request.username))?;
    let bytes = archive::write_archive(&tweets)?;
    tokio::fs::write(out, bytes)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    println!("  wrote {} posts to {}", tweets.len(), out.display());
    Ok(())
}

/// A job that reached a terminal phase while its status server keeps running.
struct FinishedJob {
    report: StatusReport,
    addr: SocketAddr,
    server: JoinHandle<io::Result<()>>,
    stop: oneshot::Sender<()>,
}

impl FinishedJob {
    /// Optionally keep serving `/status` and `/logs` until Ctrl-C, then shut
    /// the server down and turn an `Error` phase into a failing exit.
    async fn close(self, linger: bool) -> anyhow::Result<()> {
        if linger {
            println!("  status: http://{}/status", self.addr);
            if let Some(log) = &self.report.log_filename {
                println!("  log:    http://{}/logs/{log}", self.addr);
            }
            println!("  press Ctrl-C to exit");
            tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
        }
        let _ = self.stop.send(());
        self.server
            .await
            .context("status server task failed")?
            .context("status server failed")?;

        if self.report.phase == Phase::Error {
            bail!("job stopped with an error: {}", self.report.message);
        }
        Ok(())
    }
}

/// Start the engine, serve the status surface next to it and block until
/// the job reaches a terminal phase. Ctrl-C is turned into a cancel.
async fn run_job<P: ItemProcessor>(
    config: &SweepConfig,
    engine_config: EngineConfig,
    label: &str,
    items: Vec<WorkItem>,
    processor: Arc<P>,
) -> anyhow::Result<FinishedJob> {
    let engine = JobEngine::new(engine_config);
    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    let addr = listener.local_addr().context("reading bound address")?;
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(listener, server::router(engine.clone()), async move {
        let _ = stopped.await;
    }));

    let total = items.len() as u64;
    let handle = engine.start(items, processor).context("starting job")?;
    info!(job_id = %handle.job_id, log = %handle.log_filename, "job running");

    let controller = engine.controller();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, canceling after the current item");
            controller.cancel();
        }
    });

    let progress = JobProgress::start(label, total);
    let mut ticker = tokio::time::interval(PROGRESS_REFRESH);
    let mut finished = std::pin::pin!(handle.wait());
    loop {
        tokio::select! {
            joined = &mut finished => {
                joined.context("engine task failed")?;
                break;
            }
            _ = ticker.tick() => progress.update(&engine.status()),
        }
    }
    interrupt.abort();

    let report = engine.status();
    progress.complete(&report);
    Ok(FinishedJob {
        report,
        addr,
        server,
        stop,
    })
}
