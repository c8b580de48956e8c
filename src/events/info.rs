//! Event descriptors
//!
//! An [`EventInfo`] says *what* happened, independent of *when*. Reporters
//! keep them in static tables and hand the table plus an index to
//! [`crate::aggregator::notify`].

use crate::error_codes::{codes, ErrorCode};
use crate::types::{EventSource, Severity};

/// Immutable description of one reportable condition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventInfo {
    /// Severity class
    pub severity: Severity,
    /// Device, sensor or service the event concerns
    pub source: EventSource,
    /// Catalog entry; `None` marks a misconfigured table entry
    pub code: Option<&'static ErrorCode>,
}

impl EventInfo {
    /// Event with a catalog entry
    #[must_use]
    pub const fn new(severity: Severity, source: EventSource, code: &'static ErrorCode) -> Self {
        Self {
            severity,
            source,
            code: Some(code),
        }
    }

    /// Device-level event
    #[must_use]
    pub const fn device(severity: Severity, code: &'static ErrorCode) -> Self {
        Self::new(severity, EventSource::Device, code)
    }

    /// Numeric code, zero if none was given
    #[must_use]
    pub fn code_number(&self) -> u16 {
        self.code.map_or(0, |c| c.code)
    }
}

/// Events the supervisor itself raises
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum SupervisorEvent {
    /// Server session established
    DeviceOnline,
    /// Manufacturing data unreadable
    ManufacturingInvalid,
    /// Device waiting for provisioning
    NotProvisioned,
    /// Previous reset came from the task watchdog
    WatchdogResetDetected,
    /// Previous reset came from another hard fault
    FaultResetDetected,
    /// Previous reset came from the connection failsafe
    ConnectionTimeoutReset,
    /// Offline backlog dropped events
    BacklogOverflow,
    /// Initial time sync timed out
    TimeSyncTimeout,
    /// Link lost
    LinkLost,
    /// Server session lost
    ServerLost,
    /// Server unreachable
    NoServer,
    /// Firmware update started
    FwUpdateStarted,
    /// Firmware update aborted by disconnect
    FwUpdateAborted,
    /// Firmware area erased
    FwAreaErased,
    /// Erase confirmation timed out
    FwEraseTimeout,
    /// Update interrupted by a reset
    FwUpdateInterrupted,
}

impl SupervisorEvent {
    /// Number of supervisor events
    pub const COUNT: usize = 16;

    /// Descriptor for this event
    #[must_use]
    pub fn info(self) -> &'static EventInfo {
        &SUPERVISOR_EVENTS[self as usize]
    }
}

/// Supervisor event table, indexed by [`SupervisorEvent`]
pub static SUPERVISOR_EVENTS: [EventInfo; SupervisorEvent::COUNT] = [
    EventInfo::device(Severity::Info, &codes::DEVICE_ONLINE),
    EventInfo::device(Severity::Error, &codes::MANUFACTURING_DATA_INVALID),
    EventInfo::device(Severity::Warning, &codes::NOT_PROVISIONED),
    EventInfo::device(Severity::Warning, &codes::WATCHDOG_RESET_DETECTED),
    EventInfo::device(Severity::Warning, &codes::FAULT_RESET_DETECTED),
    EventInfo::device(Severity::Warning, &codes::CONNECTION_TIMEOUT_RESET),
    EventInfo::device(Severity::Warning, &codes::BACKLOG_OVERFLOW),
    EventInfo::device(Severity::Warning, &codes::TIME_SYNC_TIMEOUT),
    EventInfo::device(Severity::Warning, &codes::LINK_LOST),
    EventInfo::device(Severity::Warning, &codes::SERVER_LOST),
    EventInfo::device(Severity::Info, &codes::NO_SERVER),
    EventInfo::device(Severity::Info, &codes::FW_UPDATE_STARTED),
    EventInfo::device(Severity::Warning, &codes::FW_UPDATE_ABORTED),
    EventInfo::device(Severity::Info, &codes::FW_AREA_ERASED),
    EventInfo::device(Severity::Warning, &codes::FW_ERASE_TIMEOUT),
    EventInfo::device(Severity::Warning, &codes::FW_UPDATE_INTERRUPTED),
];
