//! One pending-or-in-flight acknowledged message.

use heapless::Vec;

use crate::config::EVENT_PARAM_MAX_LEN;

use super::request::SendFn;

/// Lifecycle of a transmission slot.
///
/// ```text
/// New ──▶ Sending ──▶ WaitingAck ──▶ Acked (terminal, slot recycled)
///            ▲             │
///            └── resend ───┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Queued, not yet transmitted.
    New,
    /// `send_fn` is being invoked (transient; the queue mutex is not held
    /// across the call).
    Sending,
    /// Handed to the radio, waiting for the destination's acknowledgement.
    WaitingAck,
    /// Acknowledged — terminal.
    Acked,
}

pub(crate) struct TxSlot {
    pub dest_addr: u16,
    pub params: Vec<u8, EVENT_PARAM_MAX_LEN>,
    pub send_fn: SendFn,
    pub state: SlotState,
    pub retries: u8,
}

impl TxSlot {
    pub(crate) fn new(dest_addr: u16, params: Vec<u8, EVENT_PARAM_MAX_LEN>, send_fn: SendFn) -> Self {
        Self {
            dest_addr,
            params,
            send_fn,
            state: SlotState::New,
            retries: 0,
        }
    }

    /// Whether this slot occupies the single in-flight position — the
    /// invariant is that at most one slot per queue is ever in one of
    /// these states.
    pub(crate) fn is_active(&self) -> bool {
        matches!(self.state, SlotState::Sending | SlotState::WaitingAck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fresh_slot_is_new_and_inactive() {
        let send: SendFn = Arc::new(|_| Ok(()));
        let slot = TxSlot::new(0x0010, Vec::new(), send);
        assert_eq!(slot.state, SlotState::New);
        assert_eq!(slot.retries, 0);
        assert!(!slot.is_active());
    }

    #[test]
    fn sending_and_waiting_count_as_active() {
        let send: SendFn = Arc::new(|_| Ok(()));
        let mut slot = TxSlot::new(0x0010, Vec::new(), send);
        slot.state = SlotState::Sending;
        assert!(slot.is_active());
        slot.state = SlotState::WaitingAck;
        assert!(slot.is_active());
        slot.state = SlotState::Acked;
        assert!(!slot.is_active());
    }
}
