//! Shared data model for observed and held print jobs.
//!
//! A job is identified by its printer name and spooler job id. Printer
//! names compare case-insensitively, so every map in the engine is keyed
//! by the normalized composite string from [`JobKey::composite`].

use chrono::{DateTime, Utc};

/// Identity of a print job: printer name plus spooler job id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    /// Printer (queue) name as reported by the spooler.
    pub printer: String,
    /// Spooler-assigned job identifier.
    pub job_id: u32,
}

impl JobKey {
    pub fn new(printer: impl Into<String>, job_id: u32) -> Self {
        Self {
            printer: printer.into(),
            job_id,
        }
    }

    /// Canonical lookup key: `UPPER(printer)|job_id`.
    pub fn composite(&self) -> String {
        format!("{}|{}", self.printer.to_uppercase(), self.job_id)
    }

    /// Normalized printer key used for printer-scoped maps.
    pub fn printer_key(&self) -> String {
        self.printer.to_uppercase()
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.printer, self.job_id)
    }
}

/// Which detection path produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionOrigin {
    /// Spooler job-creation notification.
    Notification,
    /// Periodic queue scan.
    Polling,
    /// Startup re-scan of jobs left over from a previous session.
    Reassert,
}

impl DetectionOrigin {
    pub fn name(&self) -> &'static str {
        match self {
            DetectionOrigin::Notification => "notification",
            DetectionOrigin::Polling => "polling",
            DetectionOrigin::Reassert => "reassert",
        }
    }
}

/// A job observation emitted by a detection source, consumed once by the
/// firewall engine.
#[derive(Debug, Clone)]
pub struct ObservedJob {
    pub key: JobKey,
    /// Document name, empty when the source carries no metadata.
    pub document: String,
    /// Submitting user as reported by the spooler (unreliable, display only).
    pub owner: String,
    pub detected_at: DateTime<Utc>,
    /// Whether the source saw the job already paused.
    pub already_paused: bool,
    pub origin: DetectionOrigin,
}

/// Bookkeeping for a job the engine is currently holding.
#[derive(Debug, Clone)]
pub struct BlockedJobRecord {
    /// Snapshot of the observation that triggered the hold.
    pub job: ObservedJob,
    pub blocked_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Consecutive wrong-password attempts against this job.
    pub failed_unlocks: u32,
    /// Hold was achieved by pausing the whole queue, not the job.
    pub queue_fallback: bool,
}

impl BlockedJobRecord {
    pub fn new(job: ObservedJob, queue_fallback: bool) -> Self {
        let now = Utc::now();
        Self {
            job,
            blocked_at: now,
            last_seen: now,
            failed_unlocks: 0,
            queue_fallback,
        }
    }
}

/// How a "job blocked" event came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldKind {
    /// Per-job pause succeeded.
    PerJob,
    /// Per-job pause unsupported; the whole queue was paused instead.
    QueueFallback,
    /// Neither pause worked; the job was canceled and the next submission
    /// on the printer was pre-authorized.
    CanceledFallback,
    /// No control path worked and cancel-on-pause-failure is off. The job
    /// will print despite the prompt; informational only.
    PauseUnavailable,
}

impl HoldKind {
    /// Whether this outcome actually keeps the job from printing.
    pub fn is_held(&self) -> bool {
        matches!(self, HoldKind::PerJob | HoldKind::QueueFallback)
    }

    pub fn name(&self) -> &'static str {
        match self {
            HoldKind::PerJob => "per-job",
            HoldKind::QueueFallback => "queue-fallback",
            HoldKind::CanceledFallback => "canceled-fallback",
            HoldKind::PauseUnavailable => "pause-unavailable",
        }
    }
}
