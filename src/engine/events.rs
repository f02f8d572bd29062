//! Events the engine raises toward the UI layer.

use crate::model::{HoldKind, ObservedJob};

/// Broadcast to UI subscribers. Delivery is best-effort: a lagging or
/// absent subscriber never blocks the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A job was intercepted. `kind` tells the UI whether it is a genuine
    /// hold or a fallback/informational variant.
    JobBlocked { job: ObservedJob, kind: HoldKind },

    /// Protection flag or unlock window changed.
    StateChanged {
        enabled: bool,
        /// Seconds left in the global unlock window, if one is active.
        unlock_remaining_secs: Option<u64>,
    },
}
