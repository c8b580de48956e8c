//! Shared channels
//!
//! Every event-flag group and queue the supervisor and the workers share,
//! gathered in one struct so firmware can place it in a `static` and tests
//! can build a fresh set per case.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;

use crate::aggregator::{Alert, DomainStatus};
use crate::config::{ALERT_QUEUE_DEPTH, EVENT_QUEUE_DEPTH, STATUS_QUEUE_DEPTH};
use crate::events::{
    CommandEvents, EnergyEvents, EventGroup, EventInfo, FwUpdateEvents, LedEvents, LivenessRequest,
    StreamEvents, SystemEvents, TimeSyncEvents, VarsEvents, WatchdogEvents,
};
use crate::types::SystemState;
use crate::watchdog::SupervisedTask;

/// Cross-task queue of reported events
pub type EventQueue = Channel<CriticalSectionRawMutex, &'static EventInfo, EVENT_QUEUE_DEPTH>;

/// Outbound domain status snapshots (`send_states_queue`)
pub type StatusQueue = Channel<CriticalSectionRawMutex, DomainStatus, STATUS_QUEUE_DEPTH>;

/// Outbound alerts (`send_alerts_queue`)
pub type AlertQueue = Channel<CriticalSectionRawMutex, Alert, ALERT_QUEUE_DEPTH>;

/// Single-slot queue a task deposits its liveness token into
pub type LivenessQueue = Channel<CriticalSectionRawMutex, u32, 1>;

/// Read-only view of the system state for workers
///
/// Only the supervisor writes it.
pub struct StateCell {
    inner: Mutex<CriticalSectionRawMutex, Cell<SystemState>>,
}

impl StateCell {
    /// Cell holding [`SystemState::Init`]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(SystemState::Init)),
        }
    }

    /// Current system state
    #[must_use]
    pub fn get(&self) -> SystemState {
        self.inner.lock(Cell::get)
    }

    pub(crate) fn set(&self, state: SystemState) {
        self.inner.lock(|cell| cell.set(state));
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// One liveness queue per supervised task
pub struct LivenessQueues {
    /// Supervisor
    pub system: LivenessQueue,
    /// Energy sampler
    pub energy: LivenessQueue,
    /// Fast variable reader
    pub fast_vars: LivenessQueue,
    /// Slow variable reader
    pub slow_vars: LivenessQueue,
    /// Fast stream publisher
    pub fast_stream: LivenessQueue,
    /// Slow stream publisher
    pub slow_stream: LivenessQueue,
    /// Command / protocol handler
    pub command: LivenessQueue,
    /// Firmware updater
    pub fw_update: LivenessQueue,
    /// Time sync
    pub time_sync: LivenessQueue,
    /// LED indicator
    pub led: LivenessQueue,
}

impl LivenessQueues {
    /// Empty queues
    #[must_use]
    pub const fn new() -> Self {
        Self {
            system: Channel::new(),
            energy: Channel::new(),
            fast_vars: Channel::new(),
            slow_vars: Channel::new(),
            fast_stream: Channel::new(),
            slow_stream: Channel::new(),
            command: Channel::new(),
            fw_update: Channel::new(),
            time_sync: Channel::new(),
            led: Channel::new(),
        }
    }
}

impl Default for LivenessQueues {
    fn default() -> Self {
        Self::new()
    }
}

/// All shared signalling state
pub struct Channels {
    /// Supervisor's own group
    pub system: EventGroup<SystemEvents>,
    /// Energy sampler
    pub energy: EventGroup<EnergyEvents>,
    /// Fast variable reader
    pub fast_vars: EventGroup<VarsEvents>,
    /// Slow variable reader
    pub slow_vars: EventGroup<VarsEvents>,
    /// Fast stream publisher
    pub fast_stream: EventGroup<StreamEvents>,
    /// Slow stream publisher
    pub slow_stream: EventGroup<StreamEvents>,
    /// Command / protocol handler
    pub command: EventGroup<CommandEvents>,
    /// Firmware updater
    pub fw_update: EventGroup<FwUpdateEvents>,
    /// Time sync
    pub time_sync: EventGroup<TimeSyncEvents>,
    /// LED indicator
    pub led: EventGroup<LedEvents>,
    /// Watchdog thread control
    pub watchdog: EventGroup<WatchdogEvents>,
    /// Reported events awaiting classification
    pub events: EventQueue,
    /// Status snapshots for the command worker
    pub send_states: StatusQueue,
    /// Alerts for the command worker
    pub send_alerts: AlertQueue,
    /// Liveness tokens
    pub liveness: LivenessQueues,
    /// Authoritative system state
    pub state: StateCell,
}

impl Channels {
    /// Fresh channels: no bits set, every queue empty
    #[must_use]
    pub const fn new() -> Self {
        Self {
            system: EventGroup::new(),
            energy: EventGroup::new(),
            fast_vars: EventGroup::new(),
            slow_vars: EventGroup::new(),
            fast_stream: EventGroup::new(),
            slow_stream: EventGroup::new(),
            command: EventGroup::new(),
            fw_update: EventGroup::new(),
            time_sync: EventGroup::new(),
            led: EventGroup::new(),
            watchdog: EventGroup::new(),
            events: Channel::new(),
            send_states: Channel::new(),
            send_alerts: Channel::new(),
            liveness: LivenessQueues::new(),
            state: StateCell::new(),
        }
    }

    /// Event group and liveness queue the watchdog uses for `task`
    #[must_use]
    pub fn liveness_pair(&self, task: SupervisedTask) -> (&dyn LivenessRequest, &LivenessQueue) {
        match task {
            SupervisedTask::Supervisor => (&self.system, &self.liveness.system),
            SupervisedTask::Energy => (&self.energy, &self.liveness.energy),
            SupervisedTask::FastVars => (&self.fast_vars, &self.liveness.fast_vars),
            SupervisedTask::SlowVars => (&self.slow_vars, &self.liveness.slow_vars),
            SupervisedTask::FastStream => (&self.fast_stream, &self.liveness.fast_stream),
            SupervisedTask::SlowStream => (&self.slow_stream, &self.liveness.slow_stream),
            SupervisedTask::Command => (&self.command, &self.liveness.command),
            SupervisedTask::FwUpdate => (&self.fw_update, &self.liveness.fw_update),
            SupervisedTask::TimeSync => (&self.time_sync, &self.liveness.time_sync),
            SupervisedTask::Led => (&self.led, &self.liveness.led),
        }
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}
