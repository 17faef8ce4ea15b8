//! Transmission requests and the completion payload.

use std::sync::Arc;

use heapless::Vec;

use crate::config::EVENT_PARAM_MAX_LEN;
use crate::error::{Error, Result};

/// Model-supplied send function.
///
/// Invoked synchronously by the engine with the message payload; the
/// collaborator hands the bytes to the radio stack and reports whether the
/// handoff was accepted. The async delivery outcome comes back later as a
/// `FromRadio` status envelope.
pub type SendFn = Arc<dyn Fn(&[u8]) -> Result<()> + Send + Sync>;

/// The four signals the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxSignal {
    /// Queue an acknowledged send; transmitted when it reaches the front.
    EnqueueSend,
    /// Send immediately, no queue slot — unacknowledged and group/broadcast
    /// traffic.
    DirectSend,
    /// Re-transmit the slot currently awaiting acknowledgement.
    Resend,
    /// The slot currently awaiting acknowledgement is done.
    Ack,
}

/// One consumed-exactly-once request to the engine.
pub struct TxRequest {
    pub signal: TxSignal,
    pub dest_addr: u16,
    pub params: Vec<u8, EVENT_PARAM_MAX_LEN>,
    pub send_fn: Option<SendFn>,
}

impl TxRequest {
    /// An acknowledged send bound for `dest_addr`.
    pub fn enqueue(dest_addr: u16, params: &[u8], send_fn: SendFn) -> Result<Self> {
        Ok(Self {
            signal: TxSignal::EnqueueSend,
            dest_addr,
            params: Self::copy_params(params)?,
            send_fn: Some(send_fn),
        })
    }

    /// An immediate queue-bypassing send.
    pub fn direct(dest_addr: u16, params: &[u8], send_fn: SendFn) -> Result<Self> {
        Ok(Self {
            signal: TxSignal::DirectSend,
            dest_addr,
            params: Self::copy_params(params)?,
            send_fn: Some(send_fn),
        })
    }

    /// Re-transmit whatever is awaiting acknowledgement.
    pub fn resend() -> Self {
        Self {
            signal: TxSignal::Resend,
            dest_addr: 0,
            params: Vec::new(),
            send_fn: None,
        }
    }

    /// Acknowledge the in-flight slot.
    pub fn ack() -> Self {
        Self {
            signal: TxSignal::Ack,
            dest_addr: 0,
            params: Vec::new(),
            send_fn: None,
        }
    }

    fn copy_params(params: &[u8]) -> Result<Vec<u8, EVENT_PARAM_MAX_LEN>> {
        Vec::from_slice(params).map_err(|()| Error::InvalidArgument("params_len"))
    }
}

// ── Completion payload ─────────────────────────────────────────

/// Delivery outcome carried in completion envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TxStatus {
    /// Destination acknowledged the message.
    Acked = 0,
    /// The ack window expired.
    TimedOut = 1,
    /// Destination reported failure.
    Nacked = 2,
    /// The engine exhausted its resend ceiling and dropped the slot.
    GaveUp = 3,
}

/// Payload of `FromRadio` status envelopes (radio glue → engine) and
/// `ToApp` completion envelopes (engine → application).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEvent {
    pub dest_addr: u16,
    pub status: TxStatus,
}

impl CompletionEvent {
    pub const ENCODED_LEN: usize = 3;

    /// Little-endian address followed by the status discriminant.
    pub fn to_bytes(self) -> [u8; Self::ENCODED_LEN] {
        let [lo, hi] = self.dest_addr.to_le_bytes();
        [lo, hi, self.status as u8]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(Error::InvalidArgument("completion_len"));
        }
        let status = match bytes[2] {
            0 => TxStatus::Acked,
            1 => TxStatus::TimedOut,
            2 => TxStatus::Nacked,
            3 => TxStatus::GaveUp,
            _ => return Err(Error::InvalidArgument("completion_status")),
        };
        Ok(Self {
            dest_addr: u16::from_le_bytes([bytes[0], bytes[1]]),
            status,
        })
    }
}
