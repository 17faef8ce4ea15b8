//! Subscriber registry — who hears what.
//!
//! One fixed-capacity vector of subscription records per category, indexed
//! by [`EventCategory`]. Records are matched by bitmask overlap at dispatch
//! time and removed by identity (`category`, `mask`, handler) on
//! unsubscribe. Using indexed vectors instead of a hand-linked list keeps
//! removal a position lookup and leaves no pointer-chasing to get wrong.

use std::sync::Arc;

use heapless::Vec;

use crate::config::SUBS_PER_CATEGORY;
use crate::error::{Error, Result};

use super::events::{EventCategory, EventMask};

/// A dispatched-event callback.
///
/// Implemented by feature modules (and by the transmission control engine
/// for its completion loop). The device context `C` is owned by the bus and
/// passed to every invocation unchanged; the bus never interprets it.
///
/// Any `Fn(&C, EventMask, &[u8]) -> Result<()>` closure qualifies.
pub trait EventHandler<C>: Send + Sync {
    fn handle(&self, ctx: &C, event: EventMask, params: &[u8]) -> Result<()>;
}

impl<C, F> EventHandler<C> for F
where
    F: Fn(&C, EventMask, &[u8]) -> Result<()> + Send + Sync,
{
    fn handle(&self, ctx: &C, event: EventMask, params: &[u8]) -> Result<()> {
        self(ctx, event, params)
    }
}

/// Shared handle to a registered handler.
pub type Handler<C> = Arc<dyn EventHandler<C>>;

struct Subscription<C> {
    event_mask: EventMask,
    handler: Handler<C>,
}

/// Per-category subscription table. Owned exclusively by the bus; all
/// access goes through the bus's registry mutex.
pub(crate) struct SubscriberRegistry<C> {
    table: [Vec<Subscription<C>, SUBS_PER_CATEGORY>; EventCategory::COUNT],
}

impl<C> SubscriberRegistry<C> {
    pub(crate) fn new() -> Self {
        Self {
            table: core::array::from_fn(|_| Vec::new()),
        }
    }

    /// Append a record. No ordering guarantee among handlers of one
    /// category is given to subscribers.
    pub(crate) fn subscribe(
        &mut self,
        category: EventCategory,
        event_mask: EventMask,
        handler: Handler<C>,
    ) -> Result<()> {
        if event_mask == 0 {
            return Err(Error::InvalidArgument("event_mask"));
        }
        self.table[category.index()]
            .push(Subscription {
                event_mask,
                handler,
            })
            .map_err(|_| Error::NoMemory)
    }

    /// Remove the first record matching `(category, event_mask, handler)`
    /// by identity. Returns `NotFound` when no such record exists.
    pub(crate) fn unsubscribe(
        &mut self,
        category: EventCategory,
        event_mask: EventMask,
        handler: &Handler<C>,
    ) -> Result<()> {
        if event_mask == 0 {
            return Err(Error::InvalidArgument("event_mask"));
        }
        let list = &mut self.table[category.index()];
        let pos = list
            .iter()
            .position(|s| s.event_mask == event_mask && Arc::ptr_eq(&s.handler, handler));
        match pos {
            Some(i) => {
                let _ = list.remove(i);
                Ok(())
            }
            None => Err(Error::NotFound),
        }
    }

    /// Clone out every handler whose mask overlaps `event`, so dispatch can
    /// run without the registry lock held.
    pub(crate) fn matches(
        &self,
        category: EventCategory,
        event: EventMask,
        out: &mut Vec<Handler<C>, SUBS_PER_CATEGORY>,
    ) {
        for sub in &self.table[category.index()] {
            if event & sub.event_mask != 0 {
                // Capacity cannot overflow: `out` is sized like the list.
                let _ = out.push(sub.handler.clone());
            }
        }
    }

    /// Whether any record exists for `category` at all (used for the
    /// "nobody is listening" diagnostic).
    pub(crate) fn has_subscribers(&self, category: EventCategory) -> bool {
        !self.table[category.index()].is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop() -> Handler<()> {
        Arc::new(|_: &(), _, _: &[u8]| Ok(()))
    }

    #[test]
    fn zero_mask_is_rejected() {
        let mut reg = SubscriberRegistry::<()>::new();
        assert_eq!(
            reg.subscribe(EventCategory::System, 0, nop()).unwrap_err(),
            Error::InvalidArgument("event_mask")
        );
    }

    #[test]
    fn unsubscribe_requires_exact_identity() {
        let mut reg = SubscriberRegistry::<()>::new();
        let a = nop();
        let b = nop();
        reg.subscribe(EventCategory::System, 0b01, a.clone()).unwrap();

        // Same mask, different handler: not found.
        assert_eq!(
            reg.unsubscribe(EventCategory::System, 0b01, &b).unwrap_err(),
            Error::NotFound
        );
        // Same handler, different mask: not found.
        assert_eq!(
            reg.unsubscribe(EventCategory::System, 0b10, &a).unwrap_err(),
            Error::NotFound
        );
        // Exact tuple: removed.
        reg.unsubscribe(EventCategory::System, 0b01, &a).unwrap();
        assert!(!reg.has_subscribers(EventCategory::System));
    }

    #[test]
    fn unsubscribe_leaves_other_records_intact() {
        let mut reg = SubscriberRegistry::<()>::new();
        let a = nop();
        let b = nop();
        reg.subscribe(EventCategory::ToApp, 0b01, a.clone()).unwrap();
        reg.subscribe(EventCategory::ToApp, 0b01, b.clone()).unwrap();
        reg.unsubscribe(EventCategory::ToApp, 0b01, &a).unwrap();

        let mut matched = Vec::new();
        reg.matches(EventCategory::ToApp, 0b01, &mut matched);
        assert_eq!(matched.len(), 1);
        assert!(Arc::ptr_eq(&matched[0], &b));
    }

    #[test]
    fn matching_is_by_mask_overlap_not_equality() {
        let mut reg = SubscriberRegistry::<()>::new();
        reg.subscribe(EventCategory::FromRadio, 0b011, nop()).unwrap();

        let mut matched = Vec::new();
        reg.matches(EventCategory::FromRadio, 0b010, &mut matched);
        assert_eq!(matched.len(), 1);

        matched.clear();
        reg.matches(EventCategory::FromRadio, 0b100, &mut matched);
        assert!(matched.is_empty());
    }

    #[test]
    fn category_capacity_is_bounded() {
        let mut reg = SubscriberRegistry::<()>::new();
        for _ in 0..SUBS_PER_CATEGORY {
            reg.subscribe(EventCategory::System, 0b1, nop()).unwrap();
        }
        assert_eq!(
            reg.subscribe(EventCategory::System, 0b1, nop()).unwrap_err(),
            Error::NoMemory
        );
        // Other categories are unaffected by one category filling up.
        reg.subscribe(EventCategory::ToApp, 0b1, nop()).unwrap();
    }
}
