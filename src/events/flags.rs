//! Event-flag groups
//!
//! A typed bitset wait/notify primitive. Any task may set bits, one or more
//! tasks may wait until any bit of a mask is set, and the waiter clears the
//! bits it consumed. Bits are level-triggered: a set bit stays set until
//! somebody clears it, so a notification is never lost because nobody was
//! waiting at the time.

use core::cell::RefCell;
use core::future::poll_fn;
use core::marker::PhantomData;
use core::task::Poll;

use bitflags::Flags;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::MultiWakerRegistration;
use embassy_time::{with_deadline, with_timeout, Duration, Instant};

use crate::config::MAX_GROUP_WAITERS;

/// Flag sets that reserve a bit for the watchdog liveness request
pub trait Supervised: Flags<Bits = u32> + Copy {
    /// The bit the watchdog sets to ask the owner for a liveness token
    const WATCHDOG: Self;
}

struct GroupState {
    bits: u32,
    waiters: MultiWakerRegistration<MAX_GROUP_WAITERS>,
}

/// Event-flag group over the flag type `F`
///
/// The flag type fixes which bits exist, so bits of one worker domain can
/// never be set on another domain's group.
pub struct EventGroup<F> {
    state: Mutex<CriticalSectionRawMutex, RefCell<GroupState>>,
    _flags: PhantomData<F>,
}

impl<F> EventGroup<F>
where
    F: Flags<Bits = u32> + Copy,
{
    /// Create an empty group
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(GroupState {
                bits: 0,
                waiters: MultiWakerRegistration::new(),
            })),
            _flags: PhantomData,
        }
    }

    /// OR `flags` into the group and wake every waiter
    pub fn set(&self, flags: F) {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            state.bits |= flags.bits();
            state.waiters.wake();
        });
    }

    /// Clear `flags`, returning the bits that were set among them
    pub fn clear(&self, flags: F) -> F {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            let was = state.bits & flags.bits();
            state.bits &= !flags.bits();
            F::from_bits_retain(was)
        })
    }

    /// Current bits
    #[must_use]
    pub fn get(&self) -> F {
        self.state.lock(|cell| F::from_bits_retain(cell.borrow().bits))
    }

    /// True if every bit of `flags` is set
    #[must_use]
    pub fn contains(&self, flags: F) -> bool {
        let bits = flags.bits();
        self.state.lock(|cell| cell.borrow().bits & bits == bits)
    }

    fn poll_mask(&self, mask: u32, consume: bool, cx: &mut core::task::Context<'_>) -> Poll<F> {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            let hit = state.bits & mask;
            if hit != 0 {
                if consume {
                    state.bits &= !hit;
                }
                Poll::Ready(F::from_bits_retain(hit))
            } else {
                state.waiters.register(cx.waker());
                Poll::Pending
            }
        })
    }

    /// Wait until any bit of `mask` is set
    ///
    /// Returns the set bits of `mask` and leaves them set; the caller clears
    /// what it handles.
    pub async fn wait_any(&self, mask: F) -> F {
        let mask = mask.bits();
        poll_fn(|cx| self.poll_mask(mask, false, cx)).await
    }

    /// Wait until any bit of `mask` is set, then clear the bits that woke us
    pub async fn wait_any_and_clear(&self, mask: F) -> F {
        let mask = mask.bits();
        poll_fn(|cx| self.poll_mask(mask, true, cx)).await
    }

    /// [`Self::wait_any`] bounded by `timeout`; `None` on expiry
    pub async fn wait_any_timeout(&self, mask: F, timeout: Duration) -> Option<F> {
        with_timeout(timeout, self.wait_any(mask)).await.ok()
    }

    /// [`Self::wait_any`] bounded by an absolute deadline; `None` on expiry
    pub async fn wait_any_until(&self, mask: F, deadline: Instant) -> Option<F> {
        with_deadline(deadline, self.wait_any(mask)).await.ok()
    }

    /// [`Self::wait_any_and_clear`] bounded by `timeout`; `None` on expiry
    pub async fn wait_any_and_clear_timeout(&self, mask: F, timeout: Duration) -> Option<F> {
        with_timeout(timeout, self.wait_any_and_clear(mask)).await.ok()
    }
}

impl<F> Default for EventGroup<F>
where
    F: Flags<Bits = u32> + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Anything the watchdog can ask for a liveness token
pub trait LivenessRequest {
    /// Raise the owner's watchdog bit
    fn request_liveness(&self);
}

impl<F: Supervised> LivenessRequest for EventGroup<F> {
    fn request_liveness(&self) {
        self.set(F::WATCHDOG);
    }
}
