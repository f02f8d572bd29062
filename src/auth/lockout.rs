//! Consecutive-failure tracking and timed lockout around password checks.
//!
//! The lockout check runs before any hashing so a locked-out caller gets
//! an immediate, timing-neutral rejection. The whole verification runs
//! under one mutex; concurrent attempts serialize and never double-count.

use super::password::PasswordRecord;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Structured result of a gated verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Password correct; failure counter reset.
    Granted,
    /// Password wrong (or record unreadable, in which case `remaining`
    /// is zero and the operator should reset the password).
    Denied { failures: u32, remaining: u32 },
    /// Too many failures; attempts rejected without hashing until the
    /// window passes.
    LockedOut { remaining_secs: u64 },
}

#[derive(Debug, Default)]
struct LockoutState {
    failures: u32,
    locked_until: Option<Instant>,
}

/// Serializes verification attempts and enforces the lockout policy.
///
/// Counters are process-lifetime only; restarts clear them.
#[derive(Debug)]
pub struct LockoutGate {
    max_attempts: u32,
    lockout: Duration,
    state: Mutex<LockoutState>,
}

impl LockoutGate {
    pub fn new(max_attempts: u32, lockout_seconds: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lockout: Duration::from_secs(lockout_seconds),
            state: Mutex::new(LockoutState::default()),
        }
    }

    /// Verify a candidate password against the stored record.
    pub fn verify(&self, record: &PasswordRecord, candidate: &str) -> VerifyOutcome {
        let mut state = self.state.lock();

        if let Some(until) = state.locked_until {
            let now = Instant::now();
            if now < until {
                return VerifyOutcome::LockedOut {
                    remaining_secs: (until - now).as_secs().max(1),
                };
            }
            // Window passed; start fresh.
            state.locked_until = None;
            state.failures = 0;
        }

        match record.verify(candidate) {
            Ok(true) => {
                state.failures = 0;
                state.locked_until = None;
                VerifyOutcome::Granted
            }
            Ok(false) => {
                state.failures += 1;
                if state.failures >= self.max_attempts {
                    state.locked_until = Some(Instant::now() + self.lockout);
                }
                VerifyOutcome::Denied {
                    failures: state.failures,
                    remaining: self.max_attempts.saturating_sub(state.failures),
                }
            }
            Err(e) => {
                // Unreadable record: report zero remaining attempts so the
                // caller steers the operator toward a password reset.
                warn!(error = %e, "stored password record unusable");
                VerifyOutcome::Denied {
                    failures: self.max_attempts,
                    remaining: 0,
                }
            }
        }
    }

    /// Clear failures and lockout. Called on password change.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.failures = 0;
        state.locked_until = None;
    }

    /// Whether the gate is currently locked out.
    pub fn is_locked(&self) -> bool {
        self.state
            .lock()
            .locked_until
            .is_some_and(|until| Instant::now() < until)
    }
}
