//! System configuration and constants
//!
//! Compile-time capacities for every bounded structure in the supervisor
//! core, plus the runtime timing configuration for the supervisor and the
//! watchdog. Runtime values default to the production timings and can be
//! shortened for host tests.

use embassy_time::Duration;

/// Depth of each per-domain error-code history ring
pub const MAX_ERROR_CODES: usize = 8;

/// Capacity of the backlog kept while no server connection exists
pub const MAX_EVENT_NO_CONN: usize = 16;

/// Number of metering sensors (front-end chips) on the board
pub const MAX_SENSORS: usize = 2;

/// Number of services each sensor exposes (waveform + registers)
pub const SERVICES_PER_SENSOR: usize = 2;

/// Depth of the cross-task event queue feeding the supervisor
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Depth of the outbound status queue read by the command worker
pub const STATUS_QUEUE_DEPTH: usize = 8;

/// Depth of the outbound alert queue read by the command worker
pub const ALERT_QUEUE_DEPTH: usize = 8;

/// Repeated non-error alerts with the same code inside this window are dropped
pub const ALERT_DEDUP_WINDOW_US: u64 = 1_000_000;

/// Number of distinct codes the alert de-duplicator remembers
pub const DEDUP_TRACKED_CODES: usize = 16;

/// Maximum length of an alert's human-readable source string
pub const SOURCE_NAME_LEN: usize = 24;

/// Initial time-sync wait during Init
pub const TIME_SYNC_TIMEOUT_S: u64 = 30;

/// Wait for the firmware updater to confirm the update area is erased
pub const FW_ERASE_TIMEOUT_S: u64 = 60;

/// Failsafe reboot deadline for a stuck reconnection sequence
pub const CONNECTION_FAILSAFE_S: u64 = 30;

/// Link state polling interval while waiting for the Ethernet link
pub const LINK_POLL_INTERVAL_MS: u64 = 500;

/// Watchdog supervision period
pub const WATCHDOG_PERIOD_MS: u64 = 1_000;

/// Grace interval between requesting liveness and checking the queues
pub const WATCHDOG_GRACE_MS: u64 = 200;

/// Default number of consecutive missed ticks before a task is declared dead
pub const WATCHDOG_DEFAULT_THRESHOLD: u8 = 3;

/// Maximum number of watchdog-supervised tasks
pub const MAX_SUPERVISED_TASKS: usize = 12;

/// Maximum number of tasks blocked on one event group at the same time
pub const MAX_GROUP_WAITERS: usize = 4;

/// Supervisor timing configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Bounded wait for the initial time sync
    pub time_sync_timeout: Duration,
    /// Bounded wait for the firmware area erase confirmation
    pub fw_erase_timeout: Duration,
    /// Failsafe reboot deadline while reconnecting
    pub connection_failsafe: Duration,
    /// Link polling interval in `WaitEthLink`
    pub link_poll_interval: Duration,
}

impl SupervisorConfig {
    /// Production timings
    #[must_use]
    pub const fn new() -> Self {
        Self {
            time_sync_timeout: Duration::from_secs(TIME_SYNC_TIMEOUT_S),
            fw_erase_timeout: Duration::from_secs(FW_ERASE_TIMEOUT_S),
            connection_failsafe: Duration::from_secs(CONNECTION_FAILSAFE_S),
            link_poll_interval: Duration::from_millis(LINK_POLL_INTERVAL_MS),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Watchdog timing configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Time between supervision rounds
    pub period: Duration,
    /// Time tasks get to answer a liveness request
    pub grace: Duration,
}

impl WatchdogConfig {
    /// Production timings
    #[must_use]
    pub const fn new() -> Self {
        Self {
            period: Duration::from_millis(WATCHDOG_PERIOD_MS),
            grace: Duration::from_millis(WATCHDOG_GRACE_MS),
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self::new()
    }
}
