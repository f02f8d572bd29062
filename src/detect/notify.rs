//! Event-driven detection source.
//!
//! Consumes raw spooler job-creation notifications shaped `printer,jobid`
//! and emits observations tagged [`DetectionOrigin::Notification`]. The
//! spooler has not had a chance to pause a freshly created job, so
//! `already_paused` is always false here. Malformed payloads are logged
//! and dropped; the source keeps running.

use super::{DetectorEvent, STOP_GRACE};
use crate::model::{DetectionOrigin, JobKey, ObservedJob};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Parse a raw notification payload.
///
/// Printer names may themselves contain commas, so the job id is taken
/// from after the last comma.
pub fn parse_notification(raw: &str) -> Option<JobKey> {
    let (printer, job_id) = raw.trim().rsplit_once(',')?;
    let printer = printer.trim();
    if printer.is_empty() {
        return None;
    }
    let job_id: u32 = job_id.trim().parse().ok()?;
    Some(JobKey::new(printer, job_id))
}

/// Detection source fed by spooler job-creation notifications.
///
/// One-shot lifecycle: `start` consumes the raw receiver, so a stopped
/// source cannot be restarted. Build a new source over a fresh channel
/// to resume consuming notifications.
pub struct NotifySource {
    raw: Option<mpsc::Receiver<String>>,
    events: mpsc::Sender<DetectorEvent>,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl NotifySource {
    pub fn new(raw: mpsc::Receiver<String>, events: mpsc::Sender<DetectorEvent>) -> Self {
        Self {
            raw: Some(raw),
            events,
            token: CancellationToken::new(),
            handle: None,
        }
    }

    /// Spawn the consumer task. Calling start twice, or again after stop,
    /// is a no-op; the receiver has already been consumed.
    pub fn start(&mut self) {
        let Some(mut raw) = self.raw.take() else {
            return;
        };
        let events = self.events.clone();
        let token = self.token.clone();
        self.handle = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    payload = raw.recv() => {
                        let Some(payload) = payload else { break };
                        handle_payload(&events, &payload).await;
                    }
                }
            }
            debug!("notification source stopped");
        }));
    }

    /// Cancel the task and wait for in-flight work, bounded by
    /// [`STOP_GRACE`].
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if tokio::time::timeout(STOP_GRACE, handle).await.is_err() {
                warn!("notification source did not stop within grace period");
            }
        }
    }
}

async fn handle_payload(events: &mpsc::Sender<DetectorEvent>, payload: &str) {
    match parse_notification(payload) {
        Some(key) => {
            debug!(job = %key, "job creation notification");
            let job = ObservedJob {
                key,
                document: String::new(),
                owner: String::new(),
                detected_at: Utc::now(),
                already_paused: false,
                origin: DetectionOrigin::Notification,
            };
            let _ = events.send(DetectorEvent::Observed(job)).await;
        }
        None => {
            warn!(payload = %payload, "unparseable job notification dropped");
            let _ = events
                .send(DetectorEvent::SourceError {
                    source: "notify",
                    message: format!("unparseable notification: {payload:?}"),
                })
                .await;
        }
    }
}
