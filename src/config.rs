//! Control-plane configuration.
//!
//! Queue depths and payload ceilings are compile-time constants — they size
//! `heapless` collections and `embassy-sync` channels, so they cannot be
//! runtime-negotiated. The few knobs that are safe to tune at runtime
//! (publish timeout, resend ceiling) live in [`CtrlConfig`].

use core::time::Duration;

use serde::{Deserialize, Serialize};

// ── Compile-time sizing ────────────────────────────────────────

/// Envelopes in flight before `publish` back-pressures with `QueueFull`.
pub const CONTROL_QUEUE_DEPTH: usize = 10;

/// Payload copy ceiling per envelope, in bytes. Publishing more returns
/// `InvalidArgument` — the slot is fixed-size, never heap-grown.
pub const EVENT_PARAM_MAX_LEN: usize = 64;

/// Pending acknowledged sends per transmission queue.
pub const TX_QUEUE_DEPTH: usize = 10;

/// Subscription records per event category. Exhaustion returns `NoMemory`.
pub const SUBS_PER_CATEGORY: usize = 8;

/// Control task worker thread name.
pub const CONTROL_TASK_NAME: &str = "meshx-ctrl";

/// Control task worker stack size in bytes.
pub const CONTROL_TASK_STACK_SIZE: usize = 4096;

// ── Runtime-tunable knobs ──────────────────────────────────────

/// Runtime-tunable control-plane parameters.
///
/// Serializable so provisioning tooling can snapshot and restore it
/// alongside the rest of the node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtrlConfig {
    /// How long a task-context `publish` may block on a full envelope
    /// queue. `None` blocks indefinitely.
    pub publish_timeout: Option<Duration>,
    /// Resends attempted for a `WaitingAck` slot before the engine gives
    /// up, frees the slot, and promotes the next one. `None` resends
    /// forever (the slot is then only released by an `Ack` or a
    /// force-release).
    pub retry_limit: Option<u8>,
}

impl Default for CtrlConfig {
    fn default() -> Self {
        Self {
            publish_timeout: None,
            retry_limit: Some(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = CtrlConfig::default();
        assert!(c.publish_timeout.is_none(), "publish blocks by default");
        assert_eq!(c.retry_limit, Some(3));
    }

    #[test]
    fn queue_sizing_constants_are_consistent() {
        assert!(CONTROL_QUEUE_DEPTH > 1);
        assert!(TX_QUEUE_DEPTH > 1);
        assert!(EVENT_PARAM_MAX_LEN >= 16, "timer + completion payloads must fit");
        assert!(SUBS_PER_CATEGORY >= 4);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = CtrlConfig {
            publish_timeout: Some(Duration::from_millis(250)),
            retry_limit: None,
        };
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: CtrlConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c2.publish_timeout, Some(Duration::from_millis(250)));
        assert_eq!(c2.retry_limit, None);
    }
}
