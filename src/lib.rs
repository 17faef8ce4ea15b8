//! MeshX mesh-node control plane.
//!
//! Two tightly coupled subsystems route everything that moves inside the
//! node:
//!
//! - [`bus`] — the control task: a single-consumer, multi-producer
//!   publish/subscribe router that decouples feature modules (lighting
//!   models, provisioning, storage glue) from each other and from the
//!   radio stack.
//! - [`txcm`] — the transmission control engine: serializes outgoing
//!   acknowledged mesh messages, drives resend on timeout/failure, and
//!   lets unacknowledged/broadcast traffic bypass the queue.
//!
//! Everything else (model encoding, NVS, provisioning, radio bindings) is
//! an external collaborator reached through the callback contracts in
//! [`bus::EventHandler`] and [`txcm::SendFn`].

#![deny(unused_must_use)]

pub mod addr;
pub mod bus;
pub mod config;
pub mod txcm;

mod error;

pub use error::{Error, Result};
