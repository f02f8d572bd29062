//! Job detection sources.
//!
//! Two independent producers feed the firewall engine: an event-driven
//! source reacting to spooler job-creation notifications
//! ([`notify::NotifySource`]) and a polling source that re-scans all
//! queues ([`poll::PollSource`]). Event delivery is not reliable on every
//! driver, so the polling source is the safety net; the engine's own
//! debounce map handles duplicates across the two.

pub mod notify;
pub mod poll;

use crate::model::ObservedJob;
use std::time::Duration;

/// How long `stop()` waits for a source's in-flight work before giving up.
pub const STOP_GRACE: Duration = Duration::from_secs(2);

/// Event emitted by a detection source.
#[derive(Debug, Clone)]
pub enum DetectorEvent {
    /// A job surfaced in a queue.
    Observed(ObservedJob),
    /// Non-fatal source diagnostic; the source keeps running.
    SourceError {
        source: &'static str,
        message: String,
    },
}
