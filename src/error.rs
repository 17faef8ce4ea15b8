//! Unified error type for the control plane.
//!
//! A single `Copy` enum that both subsystems return, keeping error handling
//! in feature-module callbacks uniform. Argument and state errors are
//! always returned to the caller; a subscriber's own error is logged by the
//! dispatcher and never propagated past it.

use core::fmt;

/// Every fallible control-plane operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A null, zero-sized, or oversized input (the `&'static str` names it).
    InvalidArgument(&'static str),
    /// A bounded queue is full — retryable back-pressure, never a drop.
    QueueFull,
    /// A fixed-capacity registry has no free slot left.
    NoMemory,
    /// Unsubscribe of a `(category, mask, handler)` tuple that is not
    /// registered.
    NotFound,
    /// A signal arrived in a state that cannot consume it (e.g. `Resend`
    /// with no slot awaiting acknowledgement).
    InvalidState(&'static str),
    /// The collaborator-supplied send function reported failure.
    SendFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Self::QueueFull => write!(f, "queue full"),
            Self::NoMemory => write!(f, "registry capacity exhausted"),
            Self::NotFound => write!(f, "subscription not found"),
            Self::InvalidState(what) => write!(f, "invalid state: {what}"),
            Self::SendFailed => write!(f, "send function reported failure"),
        }
    }
}

impl core::error::Error for Error {}

/// Control-plane-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
