//! Worker-side contract
//!
//! A worker owns one event group and one liveness queue. [`WorkerHandle`]
//! bundles the two and answers watchdog requests inside every wait, so a
//! worker loop only sees the bits it asked for.

use crate::channels::{Channels, LivenessQueue};
use crate::events::{EventGroup, Supervised};
use crate::watchdog::SupervisedTask;

/// A worker's view of its own signalling
pub struct WorkerHandle<'a, F: Supervised> {
    events: &'a EventGroup<F>,
    liveness: &'a LivenessQueue,
    counter: u32,
}

impl<'a, F: Supervised> WorkerHandle<'a, F> {
    /// Bind a worker to its group and liveness queue
    #[must_use]
    pub const fn new(events: &'a EventGroup<F>, liveness: &'a LivenessQueue) -> Self {
        Self {
            events,
            liveness,
            counter: 0,
        }
    }

    /// The worker's event group
    #[must_use]
    pub const fn events(&self) -> &'a EventGroup<F> {
        self.events
    }

    /// Liveness tokens deposited so far
    #[must_use]
    pub const fn counter(&self) -> u32 {
        self.counter
    }

    /// Clear a pending watchdog request and deposit a token
    ///
    /// Returns `true` if a request was pending. A token still sitting in the
    /// single-slot queue is left in place.
    pub fn acknowledge_watchdog(&mut self) -> bool {
        if self.events.clear(F::WATCHDOG).is_empty() {
            return false;
        }
        self.deposit();
        true
    }

    fn deposit(&mut self) {
        self.counter = self.counter.wrapping_add(1);
        if self.liveness.try_send(self.counter).is_err() {
            trace!("liveness slot already holds a token");
        }
    }

    /// Wait for any bit of `mask`, answering watchdog requests meanwhile
    ///
    /// The returned bits are cleared from the group.
    pub async fn wait(&mut self, mask: F) -> F {
        loop {
            let woke = self.events.wait_any_and_clear(mask.union(F::WATCHDOG)).await;
            if woke.contains(F::WATCHDOG) {
                self.deposit();
            }
            let bits = woke.difference(F::WATCHDOG);
            if !bits.is_empty() {
                return bits;
            }
        }
    }
}

/// Handle for a supervised worker task, wired from the shared channels
macro_rules! worker_handle {
    ($(#[$doc:meta])* $fn:ident, $flags:ty, $group:ident, $queue:ident) => {
        $(#[$doc])*
        #[must_use]
        pub fn $fn(channels: &Channels) -> WorkerHandle<'_, $flags> {
            WorkerHandle::new(&channels.$group, &channels.liveness.$queue)
        }
    };
}

worker_handle!(
    /// Energy sampler handle
    energy, crate::events::EnergyEvents, energy, energy
);
worker_handle!(
    /// Command worker handle
    command, crate::events::CommandEvents, command, command
);
worker_handle!(
    /// Firmware updater handle
    fw_update, crate::events::FwUpdateEvents, fw_update, fw_update
);
worker_handle!(
    /// Time-sync worker handle
    time_sync, crate::events::TimeSyncEvents, time_sync, time_sync
);
worker_handle!(
    /// LED indicator handle
    led, crate::events::LedEvents, led, led
);

/// Handle for the fast or slow variable reader
#[must_use]
pub fn vars(
    channels: &Channels,
    task: SupervisedTask,
) -> Option<WorkerHandle<'_, crate::events::VarsEvents>> {
    match task {
        SupervisedTask::FastVars => {
            Some(WorkerHandle::new(&channels.fast_vars, &channels.liveness.fast_vars))
        }
        SupervisedTask::SlowVars => {
            Some(WorkerHandle::new(&channels.slow_vars, &channels.liveness.slow_vars))
        }
        _ => None,
    }
}

/// Handle for the fast or slow stream publisher
#[must_use]
pub fn stream(
    channels: &Channels,
    task: SupervisedTask,
) -> Option<WorkerHandle<'_, crate::events::StreamEvents>> {
    match task {
        SupervisedTask::FastStream => {
            Some(WorkerHandle::new(&channels.fast_stream, &channels.liveness.fast_stream))
        }
        SupervisedTask::SlowStream => {
            Some(WorkerHandle::new(&channels.slow_stream, &channels.liveness.slow_stream))
        }
        _ => None,
    }
}
