//! spoolguardd - print job firewall daemon.
//!
//! Wires the CUPS queue control port, both detection sources, the
//! firewall engine, and the housekeeping timer together, then runs until
//! interrupted.

use anyhow::Result;
use spoolguard::config::Config;
use spoolguard::detect::notify::NotifySource;
use spoolguard::detect::poll::PollSource;
use spoolguard::detect::DetectorEvent;
use spoolguard::engine::{
    spawn_housekeeping_task, EngineEvent, FirewallEngine, HOUSEKEEPING_PERIOD,
};
use spoolguard::spool::cups::CupsControl;
use spoolguard::spool::QueueControl;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "spoolguard.toml".to_string());
    let config = Config::load_or_default(&config_path);

    info!(
        enabled = config.protection.enabled,
        protect_all = config.protection.protect_all,
        poll_ms = config.detection.polling_interval_ms,
        "Starting spoolguardd"
    );

    let port: Arc<dyn QueueControl> = Arc::new(CupsControl::new());
    let engine = Arc::new(FirewallEngine::new(Arc::clone(&port), &config));

    // Re-secure jobs left in the spooler by a previous session.
    engine.start(config.policy.reassert_on_startup).await;

    // Detection sources -> engine.
    let (detector_tx, mut detector_rx) = mpsc::channel::<DetectorEvent>(256);

    let mut poll_source = PollSource::new(
        Arc::clone(&port),
        detector_tx.clone(),
        config.detection.polling_interval_ms,
    );
    poll_source.start();
    info!("Polling detection source started");

    let mut notify_source = match &config.detection.notify_pipe {
        Some(pipe) => {
            let (raw_tx, raw_rx) = mpsc::channel::<String>(64);
            spawn_notify_reader(pipe.clone(), raw_tx);
            let mut source = NotifySource::new(raw_rx, detector_tx.clone());
            source.start();
            info!(pipe = %pipe.display(), "Notification detection source started");
            Some(source)
        }
        None => {
            info!("No notify pipe configured; relying on polling only");
            None
        }
    };

    // Single consumer for both racing sources.
    {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            while let Some(event) = detector_rx.recv().await {
                match event {
                    DetectorEvent::Observed(job) => engine.handle_observation(job).await,
                    DetectorEvent::SourceError { source, message } => {
                        warn!(source, message = %message, "detection source error");
                    }
                }
            }
        });
    }

    // Log engine events; the interactive authorization surface subscribes
    // the same way.
    {
        let mut events = engine.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    EngineEvent::JobBlocked { job, kind } => {
                        warn!(
                            job = %job.key,
                            owner = %job.owner,
                            source = job.origin.name(),
                            kind = kind.name(),
                            "job blocked, awaiting authorization"
                        );
                    }
                    EngineEvent::StateChanged {
                        enabled,
                        unlock_remaining_secs,
                    } => {
                        info!(enabled, ?unlock_remaining_secs, "protection state changed");
                    }
                }
            }
        });
    }

    let shutdown = CancellationToken::new();
    let housekeeping = spawn_housekeeping_task(
        Arc::clone(&engine),
        shutdown.clone(),
        HOUSEKEEPING_PERIOD,
    );
    info!("Housekeeping task started");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    shutdown.cancel();
    poll_source.stop().await;
    if let Some(source) = notify_source.as_mut() {
        source.stop().await;
    }
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), housekeeping).await;

    Ok(())
}

/// Tail a FIFO that a spooler notifier writes `printer,jobid` lines to,
/// forwarding each line to the notification source. Reopens the pipe when
/// the writer side closes.
fn spawn_notify_reader(path: PathBuf, raw_tx: mpsc::Sender<String>) {
    tokio::spawn(async move {
        loop {
            let file = match tokio::fs::File::open(&path).await {
                Ok(file) => file,
                Err(e) => {
                    warn!(pipe = %path.display(), error = %e, "cannot open notify pipe, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };
            let mut lines = tokio::io::BufReader::new(file).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if raw_tx.send(line).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "notify pipe read error");
                        break;
                    }
                }
            }
        }
    });
}
