//! Task watchdog
//!
//! Cooperative liveness supervision. Every round the watchdog raises the
//! watchdog bit in each supervised task's event group, gives the tasks a
//! grace interval to answer with a token in their liveness queue, then
//! counts the tasks that stayed silent. A task silent for `threshold`
//! consecutive rounds is declared starved and the device is reset with that
//! task's fault code.
//!
//! This only detects a task whose event loop stopped running, not a task
//! doing the wrong thing.

use embassy_time::Timer;
use heapless::Vec;

use crate::board::ResetControl;
use crate::channels::{Channels, LivenessQueue};
use crate::config::{WatchdogConfig, MAX_SUPERVISED_TASKS};
use crate::events::{EventGroup, LivenessRequest, WatchdogEvents};
use crate::fault::{Fault, FaultCode};

/// Tasks that can be supervised
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SupervisedTask {
    /// System supervisor state machine
    Supervisor,
    /// Energy sampler
    Energy,
    /// Fast variable reader
    FastVars,
    /// Slow variable reader
    SlowVars,
    /// Fast stream publisher
    FastStream,
    /// Slow stream publisher
    SlowStream,
    /// Command / protocol handler
    Command,
    /// Firmware updater
    FwUpdate,
    /// Time sync
    TimeSync,
    /// LED indicator
    Led,
}

impl SupervisedTask {
    /// Every task, in fault-code order
    pub const ALL: [Self; 10] = [
        Self::Supervisor,
        Self::Energy,
        Self::FastVars,
        Self::SlowVars,
        Self::FastStream,
        Self::SlowStream,
        Self::Command,
        Self::FwUpdate,
        Self::TimeSync,
        Self::Led,
    ];

    /// Task name for logs and fault reports
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::Energy => "energy",
            Self::FastVars => "fast-vars",
            Self::SlowVars => "slow-vars",
            Self::FastStream => "fast-stream",
            Self::SlowStream => "slow-stream",
            Self::Command => "command",
            Self::FwUpdate => "fw-update",
            Self::TimeSync => "time-sync",
            Self::Led => "led",
        }
    }

    const fn ordinal(self) -> u16 {
        match self {
            Self::Supervisor => 1,
            Self::Energy => 2,
            Self::FastVars => 3,
            Self::SlowVars => 4,
            Self::FastStream => 5,
            Self::SlowStream => 6,
            Self::Command => 7,
            Self::FwUpdate => 8,
            Self::TimeSync => 9,
            Self::Led => 10,
        }
    }

    /// Unique fault code persisted when this task starves
    #[must_use]
    pub const fn fault_code(self) -> FaultCode {
        FaultCode(FaultCode::WATCHDOG_BASE + self.ordinal())
    }

    /// Task whose starvation produced `code`
    #[must_use]
    pub fn from_fault_code(code: FaultCode) -> Option<Self> {
        Self::ALL.into_iter().find(|task| task.fault_code() == code)
    }
}

/// Supervision record for one task
pub struct WatchdogEntry<'a> {
    task: SupervisedTask,
    target: &'a dyn LivenessRequest,
    liveness: &'a LivenessQueue,
    missed: u8,
    threshold: u8,
}

impl<'a> WatchdogEntry<'a> {
    /// Supervise `task` through its channels in `channels`
    #[must_use]
    pub fn new(channels: &'a Channels, task: SupervisedTask, threshold: u8) -> Self {
        let (target, liveness) = channels.liveness_pair(task);
        Self {
            task,
            target,
            liveness,
            missed: 0,
            threshold: threshold.max(1),
        }
    }

    /// Supervised task
    #[must_use]
    pub const fn task(&self) -> SupervisedTask {
        self.task
    }

    /// Consecutive rounds without a token
    #[must_use]
    pub const fn missed_count(&self) -> u8 {
        self.missed
    }

    /// Rounds of silence that count as starvation
    #[must_use]
    pub const fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Fault code reported if this task starves
    #[must_use]
    pub const fn fault_code(&self) -> FaultCode {
        self.task.fault_code()
    }
}

/// Watchdog supervisor
pub struct Watchdog<'a> {
    entries: Vec<WatchdogEntry<'a>, MAX_SUPERVISED_TASKS>,
    control: &'a EventGroup<WatchdogEvents>,
    config: WatchdogConfig,
    rounds: u32,
}

impl<'a> Watchdog<'a> {
    /// Watchdog with no supervised tasks yet
    #[must_use]
    pub fn new(channels: &'a Channels, config: WatchdogConfig) -> Self {
        Self {
            entries: Vec::new(),
            control: &channels.watchdog,
            config,
            rounds: 0,
        }
    }

    /// Add a task to the supervision list
    ///
    /// Supervising the same task twice, or more than
    /// [`MAX_SUPERVISED_TASKS`] tasks, is a boot-time configuration fault.
    pub fn supervise(&mut self, entry: WatchdogEntry<'a>) -> Result<(), Fault> {
        if self.entries.iter().any(|e| e.task == entry.task) {
            return Err(Fault::ResourceInit("task supervised twice"));
        }
        self.entries
            .push(entry)
            .map_err(|_| Fault::ResourceInit("watchdog table full"))
    }

    /// Supervision records
    #[must_use]
    pub fn entries(&self) -> &[WatchdogEntry<'a>] {
        &self.entries
    }

    /// Completed supervision rounds
    #[must_use]
    pub const fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Discard stale tokens and ask every task for a fresh one
    pub fn request_liveness(&mut self) {
        for entry in &self.entries {
            let _ = entry.liveness.try_receive();
            entry.target.request_liveness();
        }
    }

    /// Collect tokens and update missed counts
    ///
    /// Returns the starvation fault of the first task that reached its
    /// threshold.
    pub fn check(&mut self) -> Result<(), Fault> {
        self.rounds = self.rounds.wrapping_add(1);
        for entry in &mut self.entries {
            if entry.liveness.try_receive().is_ok() {
                entry.missed = 0;
                continue;
            }
            entry.missed = entry.missed.saturating_add(1);
            warn!(
                "task {} missed liveness ({}/{})",
                entry.task.name(),
                entry.missed,
                entry.threshold
            );
            if entry.missed >= entry.threshold {
                error!("task {} starved", entry.task.name());
                return Err(Fault::WatchdogStarvation {
                    task: entry.task.name(),
                    code: entry.task.fault_code(),
                });
            }
        }
        Ok(())
    }

    /// One supervision round: request, wait the grace interval, check
    pub async fn tick(&mut self) -> Result<(), Fault> {
        self.request_liveness();
        Timer::after(self.config.grace).await;
        self.check()
    }

    /// Supervise forever
    ///
    /// Starvation resets the device through `reset`. Raising
    /// [`WatchdogEvents::STOP`] parks the watchdog ahead of an orderly reset.
    pub async fn run<R: ResetControl>(mut self, reset: &mut R) -> ! {
        info!("watchdog supervising {} tasks", self.entries.len());
        loop {
            let period = self.config.period;
            if self
                .control
                .wait_any_and_clear_timeout(WatchdogEvents::STOP, period)
                .await
                .is_some()
            {
                info!("watchdog stopped");
                loop {
                    core::future::pending::<()>().await;
                }
            }
            if let Err(fault) = self.tick().await {
                reset.hard_fault(fault.code());
            }
        }
    }
}
