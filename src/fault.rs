//! Hard-fault taxonomy
//!
//! Conditions the firmware cannot recover from in place. Each carries a
//! stable [`FaultCode`] that is persisted before the reset and read back on
//! the next boot to tell the server why the device restarted.

use core::fmt;

use crate::types::SystemState;

/// Persisted diagnostic code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FaultCode(pub u16);

impl FaultCode {
    /// First watchdog code; task `n` starves with `WATCHDOG_BASE + n`
    pub const WATCHDOG_BASE: u16 = 0x0600;
    /// Supervisor reached a state it has no handler for
    pub const INVALID_STATE: Self = Self(0x0701);
    /// Reconnection failsafe expired
    pub const CONNECTION_TIMEOUT: Self = Self(0x0702);
    /// Boot-time resource creation failed
    pub const RESOURCE_INIT: Self = Self(0x0703);

    /// True if the code was written by the task watchdog
    #[must_use]
    pub const fn is_watchdog(self) -> bool {
        self.0 & 0xFF00 == Self::WATCHDOG_BASE
    }

    /// Little-endian encoding for the persisted fault slot
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// Decode the persisted fault slot; erased flash (`0xFFFF`) and zero mean none
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        match u16::from_le_bytes(bytes) {
            0 | 0xFFFF => None,
            code => Some(Self(code)),
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for FaultCode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "0x{:04X}", self.0);
    }
}

/// Unrecoverable condition
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    /// The state machine was asked to run a state with no handler
    #[error("no handler for state {0}")]
    InvalidState(SystemState),
    /// A supervised task stopped answering liveness requests
    #[error("task {task} starved, fault code {code}")]
    WatchdogStarvation {
        /// Task name
        task: &'static str,
        /// Task's unique code
        code: FaultCode,
    },
    /// Reconnection did not complete before the failsafe deadline
    #[error("connection failsafe expired")]
    ConnectionTimeout,
    /// A boot-time resource could not be created
    #[error("resource initialisation failed: {0}")]
    ResourceInit(&'static str),
}

impl Fault {
    /// Diagnostic code to persist
    #[must_use]
    pub const fn code(&self) -> FaultCode {
        match self {
            Self::InvalidState(_) => FaultCode::INVALID_STATE,
            Self::WatchdogStarvation { code, .. } => *code,
            Self::ConnectionTimeout => FaultCode::CONNECTION_TIMEOUT,
            Self::ResourceInit(_) => FaultCode::RESOURCE_INIT,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Fault {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::InvalidState(state) => defmt::write!(f, "InvalidState({})", state),
            Self::WatchdogStarvation { task, code } => {
                defmt::write!(f, "WatchdogStarvation({=str}, {})", task, code);
            }
            Self::ConnectionTimeout => defmt::write!(f, "ConnectionTimeout"),
            Self::ResourceInit(what) => defmt::write!(f, "ResourceInit({=str})", what),
        }
    }
}
