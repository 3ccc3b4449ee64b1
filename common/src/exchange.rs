//! Single-slot frame exchange between the capture core and the render core.
//!
//! Two shapes exist. [`FrameExchange`] copies a small frame (the band levels)
//! into the slot under the lock, and its [`ExchangePolicy`] decides whether an
//! unconsumed frame is overwritten or the producer waits. [`SpectrumHandoff`]
//! lends the producer's one spectrum buffer to the consumer and hands it back
//! once the consumer is done with it.
//!
//! Whatever runs after the exchange only sees delivered frames. With
//! [`ExchangePolicy::DropFrames`] a replaced frame never reaches the
//! consumer's peak hold, so a short transient can go without a marker.
//!
//! Lock sections only move a flag and a copy or a pointer. Waiting is done by
//! polling with a short delay outside the lock.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};

use crate::io::POLL_INTERVAL_US;

/// What the producer does when the previous frame has not been consumed yet.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExchangePolicy {
    /// Overwrite it; the newest frame always wins.
    #[default]
    DropFrames,
    /// Wait until the consumer has drained the slot; nothing is lost.
    Block,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// An unconsumed frame was discarded to make room.
    Replaced,
}

/// The slot still holds an unconsumed frame and the policy is [`ExchangePolicy::Block`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotBusy;

struct Slot<T> {
    frame: T,
    ready: bool,
    published: u32,
    dropped: u32,
}

pub struct FrameExchange<M: RawMutex, T> {
    policy: ExchangePolicy,
    slot: Mutex<M, RefCell<Slot<T>>>,
}

impl<M: RawMutex, T: Copy> FrameExchange<M, T> {
    /// `initial` is only a placeholder; it is never handed to the consumer.
    pub const fn new(initial: T, policy: ExchangePolicy) -> Self {
        Self {
            policy,
            slot: Mutex::new(RefCell::new(Slot {
                frame: initial,
                ready: false,
                published: 0,
                dropped: 0,
            })),
        }
    }

    pub fn policy(&self) -> ExchangePolicy {
        self.policy
    }

    pub fn try_publish(&self, frame: &T) -> Result<PublishOutcome, SlotBusy> {
        let (outcome, dropped) = self.slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            let outcome = if slot.ready {
                match self.policy {
                    ExchangePolicy::Block => return Err(SlotBusy),
                    ExchangePolicy::DropFrames => {
                        slot.dropped = slot.dropped.wrapping_add(1);
                        PublishOutcome::Replaced
                    }
                }
            } else {
                PublishOutcome::Published
            };
            slot.frame = *frame;
            slot.ready = true;
            slot.published = slot.published.wrapping_add(1);
            Ok((outcome, slot.dropped))
        })?;

        if outcome == PublishOutcome::Replaced {
            log::trace!("frame dropped, {} so far", dropped);
        }
        Ok(outcome)
    }

    /// Publishes `frame`, polling while the slot is busy.
    ///
    /// Never waits under [`ExchangePolicy::DropFrames`].
    pub fn publish<D: DelayNs>(&self, frame: &T, delay: &mut D) -> PublishOutcome {
        loop {
            match self.try_publish(frame) {
                Ok(outcome) => return outcome,
                Err(SlotBusy) => delay.delay_us(POLL_INTERVAL_US),
            }
        }
    }

    /// Takes a private copy of the pending frame and marks the slot consumed.
    pub fn try_take(&self) -> Option<T> {
        self.slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.ready {
                slot.ready = false;
                Some(slot.frame)
            } else {
                None
            }
        })
    }

    pub fn take<D: DelayNs>(&self, delay: &mut D) -> T {
        loop {
            if let Some(frame) = self.try_take() {
                return frame;
            }
            delay.delay_us(POLL_INTERVAL_US);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.slot.lock(|slot| slot.borrow().ready)
    }

    /// Frames accepted into the slot so far.
    pub fn published(&self) -> u32 {
        self.slot.lock(|slot| slot.borrow().published)
    }

    /// Frames overwritten before the consumer saw them.
    pub fn dropped(&self) -> u32 {
        self.slot.lock(|slot| slot.borrow().dropped)
    }
}

enum HandoffState<T> {
    /// The producer owns the buffer.
    Idle,
    Published(T),
    /// The consumer is working on the buffer.
    InUse,
    /// Done; waiting for the producer to take it back.
    Returned(T),
}

/// Lends one buffer back and forth without copying it.
///
/// The producer may only refill the buffer after reclaiming it, so the
/// consumer never sees it change underneath. On the device `T` is
/// `&'static mut Spectrum`.
pub struct SpectrumHandoff<M: RawMutex, T> {
    state: Mutex<M, RefCell<HandoffState<T>>>,
}

impl<M: RawMutex, T> SpectrumHandoff<M, T> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(HandoffState::Idle)),
        }
    }

    /// Producer side. Gives the buffer back if one is already lent out.
    pub fn publish(&self, buffer: T) -> Result<(), T> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if matches!(*state, HandoffState::Idle) {
                *state = HandoffState::Published(buffer);
                Ok(())
            } else {
                Err(buffer)
            }
        })
    }

    /// Producer side. Returns the buffer once the consumer has released it.
    pub fn try_reclaim(&self) -> Option<T> {
        self.swap_out(HandoffState::Idle, |state| match state {
            HandoffState::Returned(buffer) => Ok(buffer),
            other => Err(other),
        })
    }

    pub fn reclaim<D: DelayNs>(&self, delay: &mut D) -> T {
        loop {
            if let Some(buffer) = self.try_reclaim() {
                return buffer;
            }
            delay.delay_us(POLL_INTERVAL_US);
        }
    }

    /// Consumer side. Takes the published buffer, if any.
    pub fn try_acquire(&self) -> Option<T> {
        self.swap_out(HandoffState::InUse, |state| match state {
            HandoffState::Published(buffer) => Ok(buffer),
            other => Err(other),
        })
    }

    pub fn acquire<D: DelayNs>(&self, delay: &mut D) -> T {
        loop {
            if let Some(buffer) = self.try_acquire() {
                return buffer;
            }
            delay.delay_us(POLL_INTERVAL_US);
        }
    }

    /// Consumer side. Signals that the buffer is no longer read.
    pub fn release(&self, buffer: T) -> Result<(), T> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if matches!(*state, HandoffState::InUse) {
                *state = HandoffState::Returned(buffer);
                Ok(())
            } else {
                Err(buffer)
            }
        })
    }

    /// `true` while the buffer is away from the producer.
    pub fn is_busy(&self) -> bool {
        self.state
            .lock(|state| !matches!(*state.borrow(), HandoffState::Idle))
    }

    /// Moves the state to `next` if `take` accepts the current one.
    fn swap_out(
        &self,
        next: HandoffState<T>,
        take: impl FnOnce(HandoffState<T>) -> Result<T, HandoffState<T>>,
    ) -> Option<T> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let current = core::mem::replace(&mut *state, next);
            match take(current) {
                Ok(buffer) => Some(buffer),
                Err(current) => {
                    *state = current;
                    None
                }
            }
        })
    }
}

impl<M: RawMutex, T> Default for SpectrumHandoff<M, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    type Levels = FrameExchange<CriticalSectionRawMutex, [u8; 4]>;

    #[test]
    fn empty_slot_yields_nothing() {
        let exchange = Levels::new([0; 4], ExchangePolicy::DropFrames);
        assert_eq!(exchange.try_take(), None);
        assert!(!exchange.is_ready());
    }

    #[test]
    fn drop_policy_keeps_only_latest() {
        let exchange = Levels::new([0; 4], ExchangePolicy::DropFrames);
        assert_eq!(exchange.try_publish(&[1; 4]), Ok(PublishOutcome::Published));
        assert_eq!(exchange.try_publish(&[2; 4]), Ok(PublishOutcome::Replaced));
        assert_eq!(exchange.try_publish(&[3; 4]), Ok(PublishOutcome::Replaced));

        assert_eq!(exchange.try_take(), Some([3; 4]));
        assert_eq!(exchange.try_take(), None);
        assert_eq!(exchange.published(), 3);
        assert_eq!(exchange.dropped(), 2);
    }

    #[test]
    fn block_policy_refuses_until_drained() {
        let exchange = Levels::new([0; 4], ExchangePolicy::Block);
        assert_eq!(exchange.try_publish(&[1; 4]), Ok(PublishOutcome::Published));
        assert_eq!(exchange.try_publish(&[2; 4]), Err(SlotBusy));

        assert_eq!(exchange.try_take(), Some([1; 4]));
        assert_eq!(exchange.try_publish(&[2; 4]), Ok(PublishOutcome::Published));
        assert_eq!(exchange.try_take(), Some([2; 4]));
        assert_eq!(exchange.dropped(), 0);
    }

    #[test]
    fn handoff_cycle() {
        let handoff: SpectrumHandoff<CriticalSectionRawMutex, Box<[f32; 4]>> =
            SpectrumHandoff::new();
        assert!(!handoff.is_busy());
        assert!(handoff.try_acquire().is_none());

        handoff.publish(Box::new([1.0; 4])).unwrap();
        assert!(handoff.is_busy());
        // nothing to reclaim while the consumer has not seen it
        assert!(handoff.try_reclaim().is_none());

        let mut buffer = handoff.try_acquire().unwrap();
        assert!(handoff.try_acquire().is_none());
        assert!(handoff.is_busy());
        buffer[0] = 2.0;
        handoff.release(buffer).unwrap();

        let buffer = handoff.try_reclaim().unwrap();
        assert_eq!(buffer[0], 2.0);
        assert!(!handoff.is_busy());
    }

    #[test]
    fn handoff_rejects_out_of_order_calls() {
        let handoff: SpectrumHandoff<CriticalSectionRawMutex, u32> = SpectrumHandoff::default();
        assert_eq!(handoff.release(1), Err(1));
        handoff.publish(2).unwrap();
        assert_eq!(handoff.publish(3), Err(3));
        assert_eq!(handoff.try_acquire(), Some(2));
        assert_eq!(handoff.publish(4), Err(4));
    }

    #[test]
    fn policy_serializes() {
        let mut buf = [0u8; 4];
        let bytes = postcard::to_slice(&ExchangePolicy::Block, &mut buf).unwrap();
        assert_eq!(
            postcard::from_bytes::<ExchangePolicy>(bytes).unwrap(),
            ExchangePolicy::Block
        );
    }
}
