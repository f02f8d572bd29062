//! Password storage and the failed-attempt lockout gate.

mod lockout;
mod password;

pub use lockout::{LockoutGate, VerifyOutcome};
pub use password::{ALGORITHM, PasswordError, PasswordRecord};
