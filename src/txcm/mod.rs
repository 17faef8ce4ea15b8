//! Transmission control — serialized, acknowledged sends over the radio.
//!
//! The radio stack accepts message handoffs without flow control, but a
//! node that fires acknowledged messages faster than its peers acknowledge
//! them floods the mesh. [`TxcmEngine`] serializes them: acknowledged sends
//! queue in [`TxRequest`] order, exactly one is in flight per queue, and
//! the next is transmitted only once the current one is acknowledged or
//! abandoned. Unacknowledged traffic bypasses the queue entirely.
//!
//! Delivery outcomes travel as [`CompletionEvent`] payloads: radio glue
//! publishes them on `FromRadio` status events, the engine's completion
//! handler converts them into `Ack`/`Resend` signals, and applications
//! observe the final outcome on `ToApp` completion events.

mod engine;
mod request;
mod slot;

pub use engine::TxcmEngine;
pub use request::{CompletionEvent, SendFn, TxRequest, TxSignal, TxStatus};
pub use slot::SlotState;
