//! Polling detection source.
//!
//! Rescans every queue on a fixed interval and emits jobs it has not seen
//! before. Notification delivery is not 100% reliable across drivers, so
//! this source is the safety net behind [`super::notify::NotifySource`].

use super::{DetectorEvent, STOP_GRACE};
use crate::model::DetectionOrigin;
use crate::spool::QueueControl;
use crate::ttl::ExpiringMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Interval bounds; configured values outside are clamped.
pub const MIN_INTERVAL_MS: u64 = 300;
pub const MAX_INTERVAL_MS: u64 = 800;

/// TTL of the source's internal seen-set. Long enough that a slow job is
/// not re-announced while it sits in the queue.
const SEEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Detection source that periodically scans all queues.
pub struct PollSource {
    port: Arc<dyn QueueControl>,
    events: mpsc::Sender<DetectorEvent>,
    interval: Duration,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollSource {
    pub fn new(
        port: Arc<dyn QueueControl>,
        events: mpsc::Sender<DetectorEvent>,
        interval_ms: u64,
    ) -> Self {
        Self {
            port,
            events,
            interval: Duration::from_millis(interval_ms.clamp(MIN_INTERVAL_MS, MAX_INTERVAL_MS)),
            token: CancellationToken::new(),
            handle: None,
        }
    }

    /// Spawn the scan loop. Calling start while running is a no-op; a
    /// stopped source can be started again.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        // Fresh token per run so a restart does not observe the previous
        // stop's cancellation.
        self.token = CancellationToken::new();
        let port = Arc::clone(&self.port);
        let events = self.events.clone();
        let token = self.token.clone();
        let period = self.interval;
        self.handle = Some(tokio::spawn(async move {
            let mut seen: ExpiringMap<String> = ExpiringMap::new();
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        scan_once(&port, &events, &mut seen).await;
                        seen.sweep();
                    }
                }
            }
            debug!("polling source stopped");
        }));
    }

    /// Cancel the loop and wait for the in-flight scan, bounded by
    /// [`STOP_GRACE`].
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if tokio::time::timeout(STOP_GRACE, handle).await.is_err() {
                warn!("polling source did not stop within grace period");
            }
        }
    }
}

async fn scan_once(
    port: &Arc<dyn QueueControl>,
    events: &mpsc::Sender<DetectorEvent>,
    seen: &mut ExpiringMap<String>,
) {
    let jobs = match port.list_current_jobs().await {
        Ok(jobs) => jobs,
        Err(e) => {
            let _ = events
                .send(DetectorEvent::SourceError {
                    source: "poll",
                    message: e.to_string(),
                })
                .await;
            return;
        }
    };

    for job in jobs {
        let composite = job.key.composite();
        if seen.contains_live(&composite) {
            continue;
        }
        seen.insert(composite, SEEN_TTL);
        let observed = job.into_observed(DetectionOrigin::Polling);
        debug!(job = %observed.key, paused = observed.already_paused, "polling scan found new job");
        let _ = events.send(DetectorEvent::Observed(observed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobKey;
    use crate::spool::{PortReply, SpoolError, SpoolJob};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct StaticSpooler {
        jobs: Mutex<Vec<SpoolJob>>,
        fail_listing: Mutex<bool>,
    }

    impl StaticSpooler {
        fn with_jobs(jobs: Vec<SpoolJob>) -> Arc<Self> {
            Arc::new(Self {
                jobs: Mutex::new(jobs),
                fail_listing: Mutex::new(false),
            })
        }
    }

    #[async_trait]
    impl QueueControl for StaticSpooler {
        async fn list_printers(&self) -> Result<Vec<String>, SpoolError> {
            Ok(Vec::new())
        }

        async fn list_current_jobs(&self) -> Result<Vec<SpoolJob>, SpoolError> {
            if *self.fail_listing.lock() {
                return Err(SpoolError("spooler unreachable".into()));
            }
            Ok(self.jobs.lock().clone())
        }

        async fn pause_job(&self, _: &JobKey) -> PortReply {
            PortReply::success()
        }
        async fn resume_job(&self, _: &JobKey) -> PortReply {
            PortReply::success()
        }
        async fn cancel_job(&self, _: &JobKey) -> PortReply {
            PortReply::success()
        }
        async fn pause_queue(&self, _: &str) -> PortReply {
            PortReply::success()
        }
        async fn resume_queue(&self, _: &str) -> PortReply {
            PortReply::success()
        }
        async fn job_exists(&self, _: &JobKey) -> bool {
            true
        }
    }

    fn job(printer: &str, id: u32) -> SpoolJob {
        SpoolJob {
            key: JobKey::new(printer, id),
            document: "doc".into(),
            owner: "alice".into(),
            paused: false,
        }
    }

    #[tokio::test]
    async fn scan_emits_each_job_once() {
        let spooler = StaticSpooler::with_jobs(vec![job("HP-01", 1), job("HP-01", 2)]);
        let (tx, mut rx) = mpsc::channel(16);
        let mut seen = ExpiringMap::new();
        let port: Arc<dyn QueueControl> = spooler;

        scan_once(&port, &tx, &mut seen).await;
        scan_once(&port, &tx, &mut seen).await;

        let mut observed = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, DetectorEvent::Observed(_)));
            observed += 1;
        }
        assert_eq!(observed, 2, "repeat scans must not re-emit seen jobs");
    }

    #[tokio::test]
    async fn listing_failure_surfaces_source_error() {
        let spooler = StaticSpooler::with_jobs(vec![]);
        *spooler.fail_listing.lock() = true;
        let (tx, mut rx) = mpsc::channel(4);
        let mut seen = ExpiringMap::new();
        let port: Arc<dyn QueueControl> = spooler;

        scan_once(&port, &tx, &mut seen).await;
        assert!(matches!(
            rx.try_recv().unwrap(),
            DetectorEvent::SourceError { source: "poll", .. }
        ));
    }

    #[tokio::test]
    async fn start_and_stop_do_not_leak() {
        let spooler = StaticSpooler::with_jobs(vec![job("HP-01", 1)]);
        let (tx, mut rx) = mpsc::channel(16);
        let mut source = PollSource::new(spooler, tx, 300);
        source.start();
        source.start(); // idempotent

        // First tick fires immediately.
        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("poll tick")
            .expect("event");
        assert!(matches!(event, DetectorEvent::Observed(_)));

        source.stop().await;
        source.stop().await;
    }

    #[tokio::test]
    async fn stopped_source_can_be_started_again() {
        let spooler = StaticSpooler::with_jobs(vec![job("HP-01", 1)]);
        let (tx, mut rx) = mpsc::channel(16);
        let mut source = PollSource::new(spooler, tx, 300);

        source.start();
        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("first run tick")
            .expect("event");
        assert!(matches!(event, DetectorEvent::Observed(_)));
        source.stop().await;

        // The seen-set is per-run, so the second run re-emits the job.
        source.start();
        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("second run tick")
            .expect("event");
        assert!(matches!(event, DetectorEvent::Observed(_)));
        source.stop().await;
    }

    #[test]
    fn interval_is_clamped() {
        let spooler = StaticSpooler::with_jobs(vec![]);
        let (tx, _rx) = mpsc::channel(1);
        let source = PollSource::new(spooler.clone(), tx.clone(), 50);
        assert_eq!(source.interval, Duration::from_millis(300));
        let source = PollSource::new(spooler, tx, 5_000);
        assert_eq!(source.interval, Duration::from_millis(800));
    }
}
