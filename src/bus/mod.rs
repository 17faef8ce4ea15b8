//! Event bus — the control task.
//!
//! Feature modules publish [`Envelope`]s into a bounded queue; one worker
//! task drains it and fans each envelope out to every subscriber whose
//! event mask overlaps. See [`control_task`] for the delivery contract.

pub mod events;

mod control_task;
mod envelope;
mod registry;

pub use control_task::EventBus;
pub use envelope::Envelope;
pub use events::{EventCategory, EventMask};
pub use registry::{EventHandler, Handler};
