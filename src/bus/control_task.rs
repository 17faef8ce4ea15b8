//! The control task — the bus's single consumer.
//!
//! ```text
//! ┌──────────────┐
//! │ feature mod  │──publish──▶┌───────────────┐     ┌─────────────┐
//! │ radio glue   │──publish──▶│ envelope queue │────▶│ worker task │
//! │ ISR / timer  │──try_send─▶│  (bounded)     │     │ (dispatch)  │
//! └──────────────┘            └───────────────┘     └──────┬──────┘
//!                                                          │
//!                                   mask-matched subscriber callbacks
//! ```
//!
//! Envelopes are dispatched in publish order by one consumer. The registry
//! mutex is never held across a handler invocation, so handlers are free to
//! publish, subscribe, or signal the transmission engine from inside a
//! callback.

use core::cell::RefCell;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use futures_lite::future::block_on;
use heapless::Vec;
use log::{debug, info, warn};

use crate::config::{
    CONTROL_QUEUE_DEPTH, CONTROL_TASK_NAME, CONTROL_TASK_STACK_SIZE, CtrlConfig, SUBS_PER_CATEGORY,
};
use crate::error::{Error, Result};

use super::envelope::Envelope;
use super::events::{EventCategory, EventMask};
use super::registry::{Handler, SubscriberRegistry};

/// Poll interval while waiting on a full queue with a publish timeout.
const FULL_QUEUE_POLL: Duration = Duration::from_micros(500);

struct BusShared<C> {
    registry: BlockingMutex<CriticalSectionRawMutex, RefCell<SubscriberRegistry<C>>>,
    queue: Channel<CriticalSectionRawMutex, Envelope, CONTROL_QUEUE_DEPTH>,
    publish_timeout: Option<Duration>,
    ctx: C,
}

/// The event bus. Cheap to clone — every handle shares one registry, one
/// envelope queue, and one device context.
pub struct EventBus<C> {
    shared: Arc<BusShared<C>>,
}

impl<C> Clone for EventBus<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C> EventBus<C> {
    /// Build a bus owning `ctx`, with default [`CtrlConfig`] (task-context
    /// publishes block indefinitely on a full queue).
    pub fn new(ctx: C) -> Self {
        Self::with_config(ctx, &CtrlConfig::default())
    }

    /// Build a bus owning `ctx` with explicit runtime knobs.
    pub fn with_config(ctx: C, config: &CtrlConfig) -> Self {
        Self {
            shared: Arc::new(BusShared {
                registry: BlockingMutex::new(RefCell::new(SubscriberRegistry::new())),
                queue: Channel::new(),
                publish_timeout: config.publish_timeout,
                ctx,
            }),
        }
    }

    /// The device context handlers receive. The bus never interprets it.
    pub fn ctx(&self) -> &C {
        &self.shared.ctx
    }

    // ── Registry ──────────────────────────────────────────────

    /// Register `handler` for every event in `category` overlapping
    /// `event_mask`.
    ///
    /// Dispatch order among handlers of one category is unspecified.
    pub fn subscribe(
        &self,
        category: EventCategory,
        event_mask: EventMask,
        handler: Handler<C>,
    ) -> Result<()> {
        self.shared
            .registry
            .lock(|reg| reg.borrow_mut().subscribe(category, event_mask, handler))
    }

    /// Remove the first exact `(category, event_mask, handler)` match.
    pub fn unsubscribe(
        &self,
        category: EventCategory,
        event_mask: EventMask,
        handler: &Handler<C>,
    ) -> Result<()> {
        self.shared
            .registry
            .lock(|reg| reg.borrow_mut().unsubscribe(category, event_mask, handler))
    }

    // ── Publishing ────────────────────────────────────────────

    /// Publish from task context.
    ///
    /// Blocks on a full queue — indefinitely by default, or up to the
    /// configured publish timeout, after which `QueueFull` is returned.
    /// The payload is copied before this returns; the caller's buffer is
    /// immediately reusable.
    pub fn publish(&self, category: EventCategory, event: EventMask, params: &[u8]) -> Result<()> {
        let envelope = Envelope::new(category, event, params)?;
        match self.shared.publish_timeout {
            None => {
                block_on(self.shared.queue.send(envelope));
                Ok(())
            }
            Some(timeout) => self.publish_deadline(envelope, timeout),
        }
    }

    /// Publish from interrupt-like context. Never blocks; a full queue is
    /// reported as `QueueFull` and the caller decides whether to drop,
    /// retry, or escalate.
    pub fn publish_from_isr(
        &self,
        category: EventCategory,
        event: EventMask,
        params: &[u8],
    ) -> Result<()> {
        let envelope = Envelope::new(category, event, params)?;
        self.shared
            .queue
            .try_send(envelope)
            .map_err(|_| Error::QueueFull)
    }

    fn publish_deadline(&self, envelope: Envelope, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut envelope = envelope;
        loop {
            match self.shared.queue.try_send(envelope) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(returned)) => {
                    if Instant::now() >= deadline {
                        warn!(
                            "bus: publish timed out, queue full (category {:?})",
                            returned.category()
                        );
                        return Err(Error::QueueFull);
                    }
                    envelope = returned;
                    thread::sleep(FULL_QUEUE_POLL);
                }
            }
        }
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Deliver one queued envelope, waiting up to `timeout` for it.
    ///
    /// Returns `true` when an envelope was dispatched. This is the
    /// fold-into-your-own-loop alternative to [`start`](Self::start) for
    /// ports that already own a control loop, and the deterministic drain
    /// used by host tests.
    pub fn service_one(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(envelope) = self.shared.queue.try_receive() {
                Self::dispatch(&self.shared, &envelope);
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(FULL_QUEUE_POLL);
        }
    }

    fn dispatch(shared: &BusShared<C>, envelope: &Envelope) {
        let category = envelope.category();
        let event = envelope.event();

        let mut matched: Vec<Handler<C>, SUBS_PER_CATEGORY> = Vec::new();
        let any_for_category = shared.registry.lock(|reg| {
            let reg = reg.borrow();
            reg.matches(category, event, &mut matched);
            reg.has_subscribers(category)
        });

        if !any_for_category {
            warn!("bus: no subscriber registered for category {category:?}");
            return;
        }
        if matched.is_empty() {
            debug!("bus: no handler for category {category:?} event {event:#x}");
            return;
        }

        // Registry lock released: handlers may publish or (un)subscribe.
        for handler in &matched {
            if let Err(e) = handler.handle(&shared.ctx, event, envelope.params()) {
                warn!("bus: handler failed for category {category:?} event {event:#x}: {e}");
            }
        }
    }
}

impl<C: Send + Sync + 'static> EventBus<C> {
    /// Spawn the worker task. It blocks on the envelope queue and
    /// dispatches forever; one slow or failing handler delays, but never
    /// corrupts, delivery to the rest.
    pub fn start(&self) -> std::io::Result<thread::JoinHandle<()>> {
        let shared = self.shared.clone();
        thread::Builder::new()
            .name(CONTROL_TASK_NAME.into())
            .stack_size(CONTROL_TASK_STACK_SIZE)
            .spawn(move || {
                info!("bus: control task started");
                loop {
                    let envelope = block_on(shared.queue.receive());
                    Self::dispatch(&shared, &envelope);
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::events::system;
    use core::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Ctx {
        hits: AtomicU32,
    }

    fn counting_handler() -> Handler<Ctx> {
        Arc::new(|ctx: &Ctx, _evt, _params: &[u8]| {
            ctx.hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn publish_copies_and_dispatch_delivers() {
        let bus = EventBus::new(Ctx::default());
        bus.subscribe(EventCategory::System, system::TIMER_FIRE, counting_handler())
            .unwrap();

        bus.publish(EventCategory::System, system::TIMER_FIRE, &[1, 2, 3])
            .unwrap();
        assert!(bus.service_one(Duration::ZERO));
        assert_eq!(bus.ctx().hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_overlapping_event_is_filtered_out() {
        let bus = EventBus::new(Ctx::default());
        bus.subscribe(EventCategory::System, system::RESTART, counting_handler())
            .unwrap();

        bus.publish(EventCategory::System, system::TIMER_FIRE, &[])
            .unwrap();
        assert!(bus.service_one(Duration::ZERO));
        assert_eq!(bus.ctx().hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn isr_publish_reports_queue_full_instead_of_blocking() {
        let bus = EventBus::new(Ctx::default());
        for _ in 0..CONTROL_QUEUE_DEPTH {
            bus.publish_from_isr(EventCategory::System, system::RESTART, &[])
                .unwrap();
        }
        assert_eq!(
            bus.publish_from_isr(EventCategory::System, system::RESTART, &[])
                .unwrap_err(),
            Error::QueueFull
        );
    }

    #[test]
    fn publish_timeout_surfaces_back_pressure() {
        let cfg = CtrlConfig {
            publish_timeout: Some(Duration::from_millis(5)),
            ..CtrlConfig::default()
        };
        let bus = EventBus::with_config(Ctx::default(), &cfg);
        for _ in 0..CONTROL_QUEUE_DEPTH {
            bus.publish(EventCategory::System, system::RESTART, &[]).unwrap();
        }
        assert_eq!(
            bus.publish(EventCategory::System, system::RESTART, &[])
                .unwrap_err(),
            Error::QueueFull
        );
    }

    #[test]
    fn timed_publish_retries_the_same_envelope_until_space_opens() {
        let cfg = CtrlConfig {
            publish_timeout: Some(Duration::from_secs(2)),
            ..CtrlConfig::default()
        };
        let bus = EventBus::with_config(Ctx::default(), &cfg);
        bus.subscribe(EventCategory::System, system::TIMER_FIRE, counting_handler())
            .unwrap();
        for _ in 0..CONTROL_QUEUE_DEPTH {
            bus.publish_from_isr(EventCategory::System, system::RESTART, &[])
                .unwrap();
        }

        // Drain one slot while the publisher is polling the full queue.
        let drainer = bus.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            assert!(drainer.service_one(Duration::ZERO));
        });
        bus.publish(EventCategory::System, system::TIMER_FIRE, &[0x42])
            .unwrap();
        t.join().unwrap();

        // The retried envelope arrives with its payload and event intact.
        for _ in 0..CONTROL_QUEUE_DEPTH {
            assert!(bus.service_one(Duration::from_millis(100)));
        }
        assert_eq!(bus.ctx().hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_error_does_not_stop_remaining_handlers() {
        let bus = EventBus::new(Ctx::default());
        let failing: Handler<Ctx> =
            Arc::new(|_: &Ctx, _, _: &[u8]| Err(Error::InvalidState("model busy")));
        bus.subscribe(EventCategory::ToApp, 0b1, failing).unwrap();
        bus.subscribe(EventCategory::ToApp, 0b1, counting_handler())
            .unwrap();

        bus.publish(EventCategory::ToApp, 0b1, &[]).unwrap();
        assert!(bus.service_one(Duration::ZERO));
        assert_eq!(bus.ctx().hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_subscribe_from_inside_dispatch() {
        let bus = EventBus::new(Ctx::default());
        let bus2 = bus.clone();
        let reentrant: Handler<Ctx> = Arc::new(move |_: &Ctx, _, _: &[u8]| {
            bus2.subscribe(EventCategory::ToCore, 0b1, counting_handler())
        });
        bus.subscribe(EventCategory::System, system::FRESH_BOOT, reentrant)
            .unwrap();

        bus.publish(EventCategory::System, system::FRESH_BOOT, &[])
            .unwrap();
        assert!(bus.service_one(Duration::ZERO));

        bus.publish(EventCategory::ToCore, 0b1, &[]).unwrap();
        assert!(bus.service_one(Duration::ZERO));
        assert_eq!(bus.ctx().hits.load(Ordering::SeqCst), 1);
    }
}
