//! Integration test common infrastructure.
//!
//! Provides a scriptable in-memory spooler implementing the queue control
//! port, plus config helpers for driving the engine.

use async_trait::async_trait;
use parking_lot::Mutex;
use spoolguard::config::Config;
use spoolguard::model::JobKey;
use spoolguard::spool::{PortReply, QueueControl, SpoolError, SpoolJob};
use std::sync::Arc;
use tokio::sync::Notify;

/// Two-phase gate for stalling `pause_job` mid-call: the spooler signals
/// `entered` when the call arrives, then waits on `release`.
pub struct PauseGate {
    pub entered: Notify,
    pub release: Notify,
}

/// In-memory spooler with switchable capabilities and a call log.
#[derive(Default)]
pub struct MockSpooler {
    /// Whether per-job pause succeeds.
    pub per_job_pause_ok: Mutex<bool>,
    /// Whether whole-queue pause succeeds.
    pub queue_pause_ok: Mutex<bool>,
    jobs: Mutex<Vec<SpoolJob>>,
    calls: Mutex<Vec<String>>,
    pause_gate: Mutex<Option<Arc<PauseGate>>>,
}

impl MockSpooler {
    pub fn new() -> Self {
        Self {
            per_job_pause_ok: Mutex::new(true),
            queue_pause_ok: Mutex::new(true),
            jobs: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            pause_gate: Mutex::new(None),
        }
    }

    /// Make every subsequent `pause_job` stall on the returned gate.
    pub fn gate_pauses(&self) -> Arc<PauseGate> {
        let gate = Arc::new(PauseGate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        *self.pause_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Register a job so `job_exists` and `list_current_jobs` see it.
    pub fn add_job(&self, printer: &str, id: u32, owner: &str) {
        self.jobs.lock().push(SpoolJob {
            key: JobKey::new(printer, id),
            document: format!("doc-{id}"),
            owner: owner.to_string(),
            paused: false,
        });
    }

    /// Drop a job, simulating an out-of-band cancel.
    pub fn drop_job(&self, key: &JobKey) {
        let composite = key.composite();
        self.jobs
            .lock()
            .retain(|j| j.key.composite() != composite);
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    /// How many recorded calls start with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl QueueControl for MockSpooler {
    async fn list_printers(&self) -> Result<Vec<String>, SpoolError> {
        let mut printers: Vec<String> = self
            .jobs
            .lock()
            .iter()
            .map(|j| j.key.printer.clone())
            .collect();
        printers.dedup();
        Ok(printers)
    }

    async fn list_current_jobs(&self) -> Result<Vec<SpoolJob>, SpoolError> {
        Ok(self.jobs.lock().clone())
    }

    async fn pause_job(&self, key: &JobKey) -> PortReply {
        self.record(format!("pause_job {}", key.composite()));
        let gate = self.pause_gate.lock().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if *self.per_job_pause_ok.lock() {
            PortReply::success()
        } else {
            PortReply::failure("per-job pause unsupported by driver")
        }
    }

    async fn resume_job(&self, key: &JobKey) -> PortReply {
        self.record(format!("resume_job {}", key.composite()));
        PortReply::success()
    }

    async fn cancel_job(&self, key: &JobKey) -> PortReply {
        self.record(format!("cancel_job {}", key.composite()));
        self.drop_job(key);
        PortReply::success()
    }

    async fn pause_queue(&self, printer: &str) -> PortReply {
        self.record(format!("pause_queue {}", printer.to_uppercase()));
        if *self.queue_pause_ok.lock() {
            PortReply::success()
        } else {
            PortReply::failure("queue pause rejected by spooler")
        }
    }

    async fn resume_queue(&self, printer: &str) -> PortReply {
        self.record(format!("resume_queue {}", printer.to_uppercase()));
        PortReply::success()
    }

    async fn job_exists(&self, key: &JobKey) -> bool {
        let composite = key.composite();
        self.jobs
            .lock()
            .iter()
            .any(|j| j.key.composite() == composite)
    }
}

/// Default config with protection on and every escalation policy off.
pub fn base_config() -> Config {
    Config::default()
}
