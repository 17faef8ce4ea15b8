//! Event categories and per-category event bitmaps.
//!
//! A category is the coarse routing key an envelope is filed under; the
//! event is a bitmask within that category. Subscribers register a mask and
//! receive every envelope whose event overlaps it. The control plane treats
//! both as opaque keys — the constants below are the closed set the feature
//! modules and radio glue agree on.

/// Fine-grained event bitmask within a category.
pub type EventMask = u32;

/// Coarse routing key for envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventCategory {
    /// An element's published state changed (on/off, CTL, ...).
    ElementStateChanged = 0,
    /// System housekeeping: restart, OS-timer arm/fire, fresh boot.
    System = 1,
    /// Outbound requests toward the radio stack.
    ToRadio = 2,
    /// Notifications originating from the radio stack.
    FromRadio = 3,
    /// Provisioning lifecycle events.
    Provisioning = 4,
    /// Messages surfaced to the application layer.
    ToApp = 5,
    /// Messages from the application layer into the core.
    ToCore = 6,
}

impl EventCategory {
    /// Number of categories — sizes the per-category registry table.
    pub const COUNT: usize = 7;

    /// Table index for this category.
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// All categories, in table order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::ElementStateChanged,
        Self::System,
        Self::ToRadio,
        Self::FromRadio,
        Self::Provisioning,
        Self::ToApp,
        Self::ToCore,
    ];
}

const fn bit(n: u8) -> EventMask {
    1 << n
}

/// Events in [`EventCategory::ElementStateChanged`].
pub mod el_state {
    use super::{EventMask, bit};

    pub const SET_ON_OFF: EventMask = bit(0);
    pub const SET_CTL: EventMask = bit(1);
}

/// Events in [`EventCategory::System`].
pub mod system {
    use super::{EventMask, bit};

    pub const RESTART: EventMask = bit(0);
    pub const TIMER_ARM: EventMask = bit(1);
    pub const TIMER_REARM: EventMask = bit(2);
    pub const TIMER_DISARM: EventMask = bit(3);
    pub const TIMER_FIRE: EventMask = bit(4);
    pub const TIMER_PERIOD: EventMask = bit(5);
    pub const FRESH_BOOT: EventMask = bit(6);
}

/// Events in [`EventCategory::ToRadio`].
pub mod to_radio {
    use super::{EventMask, bit};

    pub const SET_ON_OFF: EventMask = bit(0);
    pub const SET_CTL: EventMask = bit(1);
    pub const SET_LIGHTNESS: EventMask = bit(2);
}

/// Events in [`EventCategory::FromRadio`].
///
/// The ack/timeout/nack bits are the delivery-status notifications the
/// radio glue publishes for an in-flight acknowledged send; the
/// transmission control engine subscribes to them to close its retry loop.
pub mod from_radio {
    use super::{EventMask, bit};

    pub const STATUS_ACK: EventMask = bit(0);
    pub const STATUS_TIMEOUT: EventMask = bit(1);
    pub const STATUS_NACK: EventMask = bit(2);
    pub const RECV_DATA: EventMask = bit(3);
}

/// Events in [`EventCategory::Provisioning`].
pub mod provisioning {
    use super::{EventMask, bit};

    pub const PROVISION_STOP: EventMask = bit(1);
    pub const IDENTIFY_START: EventMask = bit(2);
    pub const IDENTIFY_STOP: EventMask = bit(3);
    pub const NODE_RESET: EventMask = bit(4);
    pub const PROXY_CONNECT: EventMask = bit(5);
    pub const PROXY_DISCONN: EventMask = bit(6);
    pub const EN_NODE_PROV: EventMask = bit(7);
    pub const ALL: EventMask = 0xFF;
}

/// Events in [`EventCategory::ToApp`].
pub mod to_app {
    use super::{EventMask, bit};

    pub const DATA: EventMask = bit(0);
    pub const CTRL: EventMask = bit(1);
    /// An acknowledged send completed (ack received, slot recycled).
    pub const TX_COMPLETE: EventMask = bit(2);
    /// The engine exhausted its resend ceiling and dropped the slot.
    pub const TX_GIVE_UP: EventMask = bit(3);
}

/// Events in [`EventCategory::ToCore`].
pub mod to_core {
    use super::{EventMask, bit};

    pub const DATA: EventMask = bit(0);
    pub const CTRL: EventMask = bit(1);
}
