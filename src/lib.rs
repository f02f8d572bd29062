//! spoolguard - password-gated print job firewall.
//!
//! Intercepts newly submitted print jobs, holds them via a layered
//! fallback chain (per-job pause, whole-queue pause, cancel), and
//! releases them only after password authorization. Two racing detection
//! sources feed one engine; a housekeeping timer reconciles and sweeps
//! its bookkeeping.

pub mod auth;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod model;
pub mod spool;
pub mod ttl;
