//! Engine-level error types.
//!
//! Expected spooler failures travel as values through the queue control
//! port; these errors exist for the operations the UI layer invokes,
//! where the caller needs a definite success-or-why-not answer.

use thiserror::Error;

/// Errors from engine operations exposed to the authorization layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The referenced job is not currently held.
    #[error("job {0} is not held")]
    NotHeld(String),

    /// The spooler refused or failed a control action.
    #[error("spooler action failed: {0}")]
    Port(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
