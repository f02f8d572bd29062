//! Queue control port: the boundary to the OS print spooler.
//!
//! Everything the engine does to the spooler goes through [`QueueControl`].
//! Expected failure modes (job gone, operation unsupported, spooler
//! unreachable) are reported as values so the engine can chain fallbacks;
//! implementations never panic for them.

pub mod cups;

use crate::model::{DetectionOrigin, JobKey, ObservedJob};
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

/// Diagnostic for a failed list operation.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SpoolError(pub String);

/// Outcome of a control operation. `ok == false` carries a diagnostic
/// message; it is not an error in the Rust sense.
#[derive(Debug, Clone)]
pub struct PortReply {
    pub ok: bool,
    pub message: String,
}

impl PortReply {
    pub fn success() -> Self {
        Self {
            ok: true,
            message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// A job as enumerated by the spooler.
#[derive(Debug, Clone)]
pub struct SpoolJob {
    pub key: JobKey,
    pub document: String,
    pub owner: String,
    pub paused: bool,
}

impl SpoolJob {
    /// Tag an enumerated job with the detection path that surfaced it.
    pub fn into_observed(self, origin: DetectionOrigin) -> ObservedJob {
        ObservedJob {
            key: self.key,
            document: self.document,
            owner: self.owner,
            detected_at: Utc::now(),
            already_paused: self.paused,
            origin,
        }
    }
}

/// Control surface over the OS print spooler.
///
/// All operations are best-effort: a missing job or an unsupported
/// operation comes back as `PortReply { ok: false, .. }` or an empty/Err
/// listing, never a panic.
#[async_trait]
pub trait QueueControl: Send + Sync {
    async fn list_printers(&self) -> Result<Vec<String>, SpoolError>;

    async fn list_current_jobs(&self) -> Result<Vec<SpoolJob>, SpoolError>;

    async fn pause_job(&self, key: &JobKey) -> PortReply;

    async fn resume_job(&self, key: &JobKey) -> PortReply;

    async fn cancel_job(&self, key: &JobKey) -> PortReply;

    async fn pause_queue(&self, printer: &str) -> PortReply;

    async fn resume_queue(&self, printer: &str) -> PortReply;

    /// Whether the job is still present in any queue.
    async fn job_exists(&self, key: &JobKey) -> bool;
}
