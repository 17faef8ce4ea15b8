//! The transmission control engine.
//!
//! ```text
//!                 enqueue ─▶ ┌────────────────────────────┐
//!                            │ pending queue (bounded)     │
//!                            │ [WaitingAck][New][New]...   │
//!                            └──────┬─────────────────────┘
//!                                   │ head only, one in flight
//!                                   ▼
//!  direct ──────────────────▶   send_fn ──▶ radio stack
//!                                   ▲
//!        FromRadio ack/timeout ─────┘ (completion handler: Ack / Resend)
//! ```
//!
//! At most one slot per queue is ever `Sending`/`WaitingAck`, which bounds
//! outstanding unacknowledged radio traffic to one message. The queue mutex
//! is released around every `send_fn` call and every bus publish.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Weak};

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::{Deque, Vec};

use log::{debug, info, warn};

use crate::addr;
use crate::bus::events::{from_radio, to_app};
use crate::bus::{EventBus, EventCategory, EventHandler, EventMask, Handler};
use crate::config::{CtrlConfig, EVENT_PARAM_MAX_LEN, TX_QUEUE_DEPTH};
use crate::error::{Error, Result};

use super::request::{CompletionEvent, SendFn, TxRequest, TxSignal, TxStatus};
use super::slot::{SlotState, TxSlot};

type SlotParams = Vec<u8, EVENT_PARAM_MAX_LEN>;

/// What `resend` decided while holding the queue lock.
enum ResendPlan {
    Retry(u16, SlotParams, SendFn),
    GiveUp(u16, u8),
}

/// Per-destination-queue transmission control.
///
/// Owns the pending-send queue and the outstanding-ack counter; publishes
/// completion and give-up envelopes on the bus it was built from.
pub struct TxcmEngine<C> {
    bus: EventBus<C>,
    queue: BlockingMutex<CriticalSectionRawMutex, RefCell<Deque<TxSlot, TX_QUEUE_DEPTH>>>,
    outstanding: AtomicU16,
    retry_limit: Option<u8>,
}

impl<C> TxcmEngine<C> {
    /// Build an engine on top of `bus`. Returned in an `Arc` so the
    /// completion handler can hold a weak reference back to it.
    pub fn new(bus: EventBus<C>, config: &CtrlConfig) -> Arc<Self> {
        Arc::new(Self {
            bus,
            queue: BlockingMutex::new(RefCell::new(Deque::new())),
            outstanding: AtomicU16::new(0),
            retry_limit: config.retry_limit,
        })
    }

    /// Consume one request. Each request drives exactly one signal.
    pub fn send_request(&self, request: TxRequest) -> Result<()> {
        match request.signal {
            TxSignal::EnqueueSend => {
                let send_fn = request.send_fn.ok_or(Error::InvalidArgument("send_fn"))?;
                self.enqueue_send(request.dest_addr, &request.params, send_fn)
            }
            TxSignal::DirectSend => {
                let send_fn = request.send_fn.ok_or(Error::InvalidArgument("send_fn"))?;
                self.direct_send(request.dest_addr, &request.params, &send_fn)
            }
            TxSignal::Resend => self.resend(),
            TxSignal::Ack => self.ack(),
        }
    }

    // ── Signals ───────────────────────────────────────────────

    /// Queue an acknowledged send. Transmitted immediately when nothing is
    /// in flight, otherwise when every earlier slot has been acknowledged.
    ///
    /// Only unicast destinations are accepted: a group or broadcast
    /// destination never produces a unicast acknowledgement, so its slot
    /// would starve the queue forever — use [`direct_send`](Self::direct_send).
    pub fn enqueue_send(&self, dest_addr: u16, params: &[u8], send_fn: SendFn) -> Result<()> {
        if !addr::is_unicast(dest_addr) {
            return Err(Error::InvalidArgument("dest_addr"));
        }
        let params =
            SlotParams::from_slice(params).map_err(|()| Error::InvalidArgument("params_len"))?;
        self.queue.lock(|q| {
            q.borrow_mut()
                .push_back(TxSlot::new(dest_addr, params, send_fn))
                .map_err(|_| Error::QueueFull)
        })?;
        self.promote_head()
    }

    /// Invoke `send_fn` immediately — no slot, no acknowledgement
    /// bookkeeping. For unacknowledged opcodes and group/broadcast
    /// destinations.
    pub fn direct_send(&self, dest_addr: u16, params: &[u8], send_fn: &SendFn) -> Result<()> {
        send_fn(params).map_err(|e| {
            warn!("txcm: direct send to {dest_addr:#06x} failed: {e}");
            Error::SendFailed
        })
    }

    /// Re-transmit the slot awaiting acknowledgement with its original
    /// payload. Does not touch the outstanding-ack counter. When a retry
    /// ceiling is configured and exhausted, the slot is given up instead:
    /// freed, counted down, reported via a `ToApp` give-up envelope, and
    /// the next slot promoted.
    pub fn resend(&self) -> Result<()> {
        let plan = self.queue.lock(|q| {
            let mut q = q.borrow_mut();
            match q.front().map(|slot| (slot.state, slot.retries)) {
                None => Err(Error::InvalidState("no slot awaiting acknowledgement")),
                Some((SlotState::WaitingAck, retries)) => {
                    if self.retry_limit.is_some_and(|limit| retries >= limit) {
                        q.pop_front()
                            .map(|slot| ResendPlan::GiveUp(slot.dest_addr, slot.retries))
                            .ok_or(Error::InvalidState("no slot awaiting acknowledgement"))
                    } else if let Some(slot) = q.front_mut() {
                        slot.retries += 1;
                        slot.state = SlotState::Sending;
                        Ok(ResendPlan::Retry(
                            slot.dest_addr,
                            slot.params.clone(),
                            slot.send_fn.clone(),
                        ))
                    } else {
                        Err(Error::InvalidState("no slot awaiting acknowledgement"))
                    }
                }
                Some(_) => Err(Error::InvalidState("transmission in progress")),
            }
        })?;

        match plan {
            ResendPlan::Retry(dest_addr, params, send_fn) => {
                let sent = send_fn(&params);
                self.queue.lock(|q| {
                    if let Some(slot) = q.borrow_mut().front_mut() {
                        slot.state = SlotState::WaitingAck;
                    }
                });
                match sent {
                    Ok(()) => {
                        debug!("txcm: resent {} bytes to {dest_addr:#06x}", params.len());
                        Ok(())
                    }
                    Err(e) => {
                        warn!("txcm: resend to {dest_addr:#06x} failed: {e}");
                        Err(Error::SendFailed)
                    }
                }
            }
            ResendPlan::GiveUp(dest_addr, retries) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                warn!("txcm: giving up on {dest_addr:#06x} after {retries} resends");
                self.notify(
                    to_app::TX_GIVE_UP,
                    CompletionEvent {
                        dest_addr,
                        status: TxStatus::GaveUp,
                    },
                );
                self.promote_next_after_release();
                Ok(())
            }
        }
    }

    /// Complete the slot awaiting acknowledgement: free it, count it down,
    /// publish the completion envelope, and promote the next queued slot.
    ///
    /// A no-op (success) when nothing is outstanding, so stale or
    /// duplicated acknowledgements from the radio are harmless.
    pub fn ack(&self) -> Result<()> {
        if self.outstanding.load(Ordering::SeqCst) == 0 {
            debug!("txcm: ack with nothing outstanding, ignored");
            return Ok(());
        }
        let done = self.queue.lock(|q| {
            let mut q = q.borrow_mut();
            match q.front().map(|slot| slot.state) {
                Some(SlotState::WaitingAck) => {
                    q.pop_front()
                        .map(|mut slot| {
                            slot.state = SlotState::Acked;
                            slot
                        })
                        .ok_or(Error::InvalidState("no slot awaiting acknowledgement"))
                }
                Some(_) => Err(Error::InvalidState("transmission in progress")),
                None => Err(Error::InvalidState("no slot awaiting acknowledgement")),
            }
        })?;
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        info!(
            "txcm: {:#06x} acknowledged after {} resends",
            done.dest_addr, done.retries
        );
        self.notify(
            to_app::TX_COMPLETE,
            CompletionEvent {
                dest_addr: done.dest_addr,
                status: TxStatus::Acked,
            },
        );
        self.promote_next_after_release();
        Ok(())
    }

    /// Unstick a starved queue by releasing the in-flight slot as if it
    /// had been acknowledged.
    pub fn force_release(&self) -> Result<()> {
        info!("txcm: force-releasing in-flight slot");
        self.ack()
    }

    // ── Queries ───────────────────────────────────────────────

    /// Sent-but-not-yet-acknowledged messages.
    pub fn outstanding(&self) -> u16 {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Slots in the pending queue, including the in-flight one.
    pub fn pending(&self) -> usize {
        self.queue.lock(|q| q.borrow().len())
    }

    // ── Internal ──────────────────────────────────────────────

    /// Transmit the head slot when it is still `New`.
    ///
    /// Two-phase so the queue mutex is never held across `send_fn`: claim
    /// the head as `Sending` under the lock, call out, then re-lock and
    /// record `WaitingAck`. Concurrent enqueues see an active head and
    /// stay queued; the counter is bumped exactly once per slot here.
    fn promote_head(&self) -> Result<()> {
        let claim = self.queue.lock(|q| {
            let mut q = q.borrow_mut();
            match q.front_mut() {
                Some(slot) if slot.state == SlotState::New => {
                    slot.state = SlotState::Sending;
                    Some((slot.dest_addr, slot.params.clone(), slot.send_fn.clone()))
                }
                _ => None,
            }
        });
        let Some((dest_addr, params, send_fn)) = claim else {
            return Ok(());
        };

        let sent = send_fn(&params);

        self.queue.lock(|q| {
            let mut q = q.borrow_mut();
            if let Some(slot) = q.front_mut() {
                slot.state = SlotState::WaitingAck;
            }
            debug_assert!(q.iter().filter(|slot| slot.is_active()).count() <= 1);
        });
        self.outstanding.fetch_add(1, Ordering::SeqCst);

        match sent {
            Ok(()) => {
                debug!("txcm: sent {} bytes to {dest_addr:#06x}", params.len());
                Ok(())
            }
            Err(e) => {
                // The slot stays WaitingAck so a Resend (or force-release)
                // can still reach it; it is never dropped silently.
                warn!("txcm: send to {dest_addr:#06x} failed: {e}");
                Err(Error::SendFailed)
            }
        }
    }

    /// Promote after an ack or give-up freed the head. A failure here
    /// belongs to the *next* slot, not to the signal that freed this one,
    /// so it is logged rather than returned.
    fn promote_next_after_release(&self) {
        if let Err(e) = self.promote_head() {
            warn!("txcm: promoting next queued slot failed: {e}");
        }
    }

    /// Non-blocking on purpose: this may run on the bus worker itself, and
    /// a blocked completion notification must never stall dispatch.
    fn notify(&self, event: EventMask, completion: CompletionEvent) {
        if let Err(e) =
            self.bus
                .publish_from_isr(EventCategory::ToApp, event, &completion.to_bytes())
        {
            warn!(
                "txcm: completion notification dropped for {:#06x}: {e}",
                completion.dest_addr
            );
        }
    }
}

// ── Completion loop ────────────────────────────────────────────

/// The engine's own bus subscriber: turns radio-originated delivery-status
/// envelopes into `Ack`/`Resend` signals, so feature modules never see the
/// retry machinery.
struct CompletionHandler<C> {
    engine: Weak<TxcmEngine<C>>,
}

impl<C: Send + Sync + 'static> EventHandler<C> for CompletionHandler<C> {
    fn handle(&self, _ctx: &C, event: EventMask, params: &[u8]) -> Result<()> {
        let Some(engine) = self.engine.upgrade() else {
            return Ok(());
        };
        let completion = CompletionEvent::from_bytes(params)?;
        if event & from_radio::STATUS_ACK != 0 {
            debug!("txcm: ack status from {:#06x}", completion.dest_addr);
            engine.ack()
        } else if event & (from_radio::STATUS_TIMEOUT | from_radio::STATUS_NACK) != 0 {
            info!(
                "txcm: {:?} from {:#06x}, resending",
                completion.status, completion.dest_addr
            );
            engine.resend()
        } else {
            Ok(())
        }
    }
}

impl<C: Send + Sync + 'static> TxcmEngine<C> {
    /// Subscribe the engine's completion handler to the radio's
    /// delivery-status events. After this, ack/timeout/nack envelopes
    /// drive the retry state machine with no feature-module involvement.
    pub fn register_completion_handler(self: &Arc<Self>) -> Result<()> {
        let handler: Handler<C> = Arc::new(CompletionHandler {
            engine: Arc::downgrade(self),
        });
        self.bus.subscribe(
            EventCategory::FromRadio,
            from_radio::STATUS_ACK | from_radio::STATUS_TIMEOUT | from_radio::STATUS_NACK,
            handler,
        )
    }
}
