//! The unit of delivery on the event bus.

use heapless::Vec;

use crate::config::EVENT_PARAM_MAX_LEN;
use crate::error::{Error, Result};

use super::events::{EventCategory, EventMask};

/// One published event plus a by-value copy of its payload.
///
/// The payload is copied into a fixed-size slot at construction, so the
/// publisher's buffer may be freed or reused the moment `publish` returns.
#[derive(Debug, Clone)]
pub struct Envelope {
    category: EventCategory,
    event: EventMask,
    params: Vec<u8, EVENT_PARAM_MAX_LEN>,
}

impl Envelope {
    /// Copy `params` into a new envelope.
    ///
    /// Returns `InvalidArgument` when the payload exceeds
    /// [`EVENT_PARAM_MAX_LEN`] — the queue slot is fixed-size and the bus
    /// never truncates silently.
    pub fn new(category: EventCategory, event: EventMask, params: &[u8]) -> Result<Self> {
        let params = Vec::from_slice(params).map_err(|()| Error::InvalidArgument("params_len"))?;
        Ok(Self {
            category,
            event,
            params,
        })
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    pub fn event(&self) -> EventMask {
        self.event
    }

    /// The copied payload bytes (may be empty).
    pub fn params(&self) -> &[u8] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_copied_not_referenced() {
        let mut buf = [0xAA_u8; 4];
        let env = Envelope::new(EventCategory::System, 0b1, &buf).unwrap();
        buf.fill(0x00); // publisher reuses its buffer
        assert_eq!(env.params(), &[0xAA, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn empty_payload_is_allowed() {
        let env = Envelope::new(EventCategory::ToApp, 0b10, &[]).unwrap();
        assert!(env.params().is_empty());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let big = [0u8; EVENT_PARAM_MAX_LEN + 1];
        assert_eq!(
            Envelope::new(EventCategory::System, 0b1, &big).unwrap_err(),
            Error::InvalidArgument("params_len")
        );
    }

    #[test]
    fn max_sized_payload_fits_exactly() {
        let max = [0x5A_u8; EVENT_PARAM_MAX_LEN];
        let env = Envelope::new(EventCategory::ToCore, 0b1, &max).unwrap();
        assert_eq!(env.params().len(), EVENT_PARAM_MAX_LEN);
    }
}
