//! Firewall engine and its surroundings.

mod events;
mod firewall;
mod housekeeping;

pub use events::EngineEvent;
pub use firewall::{EngineStats, FailedUnlock, FirewallEngine};
pub use housekeeping::{HOUSEKEEPING_PERIOD, spawn_housekeeping_task};
