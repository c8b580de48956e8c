//! Error/event code registry
//!
//! Static catalog mapping numeric event codes to human-readable text. Every
//! component reports problems by pointing at one of these entries; the
//! catalog is compile-time data and [`validate_catalog`] checks it at boot.

use core::fmt;

/// Catalog entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Numeric code sent to the server (never zero for a real entry)
    pub code: u16,
    /// Human-readable description
    pub description: &'static str,
}

impl ErrorCode {
    /// Create a catalog entry
    #[must_use]
    pub const fn new(code: u16, description: &'static str) -> Self {
        Self { code, description }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X} {}", self.code, self.description)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ErrorCode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "0x{:04X} {=str}", self.code, self.description);
    }
}

/// Named catalog entries
///
/// Code ranges: `0x01xx` device, `0x02xx` network, `0x03xx` sensor,
/// `0x04xx` service, `0x05xx` firmware update.
pub mod codes {
    use super::ErrorCode;

    /// Reported in place of a misconfigured event
    pub const NO_ERROR_CODE_SPECIFIED: ErrorCode = ErrorCode::new(0x0101, "No error code specified");
    /// Server session established
    pub const DEVICE_ONLINE: ErrorCode = ErrorCode::new(0x0102, "Device online");
    /// Manufacturing section could not be read
    pub const MANUFACTURING_DATA_INVALID: ErrorCode =
        ErrorCode::new(0x0103, "Manufacturing data unreadable");
    /// Manufacturing section is empty
    pub const NOT_PROVISIONED: ErrorCode = ErrorCode::new(0x0104, "Device not provisioned");
    /// Previous boot ended in a watchdog reset
    pub const WATCHDOG_RESET_DETECTED: ErrorCode =
        ErrorCode::new(0x0105, "Previous reset caused by task watchdog");
    /// Previous boot ended in another hard fault
    pub const FAULT_RESET_DETECTED: ErrorCode =
        ErrorCode::new(0x0106, "Previous reset caused by a hard fault");
    /// Previous boot ended in the reconnection failsafe
    pub const CONNECTION_TIMEOUT_RESET: ErrorCode =
        ErrorCode::new(0x0107, "Previous reset caused by connection failsafe");
    /// Oldest offline events were dropped
    pub const BACKLOG_OVERFLOW: ErrorCode = ErrorCode::new(0x0108, "Offline event backlog overflowed");

    /// Initial time sync did not finish in time
    pub const TIME_SYNC_TIMEOUT: ErrorCode =
        ErrorCode::new(0x0201, "Initial time synchronisation timed out");
    /// Physical link dropped
    pub const LINK_LOST: ErrorCode = ErrorCode::new(0x0202, "Ethernet link lost");
    /// Server session dropped
    pub const SERVER_LOST: ErrorCode = ErrorCode::new(0x0203, "Connection to server lost");
    /// Server unreachable, address being renewed
    pub const NO_SERVER: ErrorCode = ErrorCode::new(0x0204, "Server unreachable");

    /// Sensor configured successfully
    pub const SENSOR_CONFIGURED: ErrorCode = ErrorCode::new(0x0301, "Sensor configured");
    /// Sensor configuration failed
    pub const SENSOR_CONFIG_FAILED: ErrorCode = ErrorCode::new(0x0302, "Sensor configuration failed");
    /// Sensor reconfiguration requested
    pub const SENSOR_RECONFIG: ErrorCode = ErrorCode::new(0x0303, "Sensor reconfiguration requested");
    /// Sensor bus transfer failed
    pub const SENSOR_COMM_FAILURE: ErrorCode = ErrorCode::new(0x0304, "Sensor communication failure");

    /// Service started
    pub const SERVICE_STARTED: ErrorCode = ErrorCode::new(0x0401, "Service started");
    /// Service stopped
    pub const SERVICE_STOPPED: ErrorCode = ErrorCode::new(0x0402, "Service stopped");
    /// Sample buffer overrun
    pub const SAMPLE_OVERRUN: ErrorCode = ErrorCode::new(0x0403, "Sample buffer overrun");
    /// Stream publish failed
    pub const STREAM_PUBLISH_FAILED: ErrorCode = ErrorCode::new(0x0404, "Stream publish failed");

    /// Firmware update started
    pub const FW_UPDATE_STARTED: ErrorCode = ErrorCode::new(0x0501, "Firmware update started");
    /// Firmware update aborted by a disconnect
    pub const FW_UPDATE_ABORTED: ErrorCode = ErrorCode::new(0x0502, "Firmware update aborted");
    /// Firmware update area erased
    pub const FW_AREA_ERASED: ErrorCode = ErrorCode::new(0x0503, "Firmware update area erased");
    /// Erase confirmation did not arrive in time
    pub const FW_ERASE_TIMEOUT: ErrorCode =
        ErrorCode::new(0x0504, "Firmware area erase confirmation timed out");
    /// Reset happened during an update
    pub const FW_UPDATE_INTERRUPTED: ErrorCode =
        ErrorCode::new(0x0505, "Firmware update interrupted by reset");
}

/// Every catalog entry
pub static CATALOG: &[ErrorCode] = &[
    codes::NO_ERROR_CODE_SPECIFIED,
    codes::DEVICE_ONLINE,
    codes::MANUFACTURING_DATA_INVALID,
    codes::NOT_PROVISIONED,
    codes::WATCHDOG_RESET_DETECTED,
    codes::FAULT_RESET_DETECTED,
    codes::CONNECTION_TIMEOUT_RESET,
    codes::BACKLOG_OVERFLOW,
    codes::TIME_SYNC_TIMEOUT,
    codes::LINK_LOST,
    codes::SERVER_LOST,
    codes::NO_SERVER,
    codes::SENSOR_CONFIGURED,
    codes::SENSOR_CONFIG_FAILED,
    codes::SENSOR_RECONFIG,
    codes::SENSOR_COMM_FAILURE,
    codes::SERVICE_STARTED,
    codes::SERVICE_STOPPED,
    codes::SAMPLE_OVERRUN,
    codes::STREAM_PUBLISH_FAILED,
    codes::FW_UPDATE_STARTED,
    codes::FW_UPDATE_ABORTED,
    codes::FW_AREA_ERASED,
    codes::FW_ERASE_TIMEOUT,
    codes::FW_UPDATE_INTERRUPTED,
];

/// Find a catalog entry by numeric code
#[must_use]
pub fn lookup(code: u16) -> Option<&'static ErrorCode> {
    CATALOG.iter().find(|entry| entry.code == code)
}

/// Catalog consistency problem
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// An entry uses the reserved code zero
    #[error("catalog entry {index} uses code zero")]
    ZeroCode {
        /// Position in the catalog
        index: usize,
    },
    /// Two entries share a code
    #[error("code 0x{code:04X} appears more than once")]
    DuplicateCode {
        /// The repeated code
        code: u16,
    },
    /// An entry has no description
    #[error("code 0x{code:04X} has an empty description")]
    EmptyDescription {
        /// The offending code
        code: u16,
    },
}

#[cfg(feature = "embedded")]
impl defmt::Format for CatalogError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::ZeroCode { index } => defmt::write!(f, "ZeroCode({=usize})", index),
            Self::DuplicateCode { code } => defmt::write!(f, "DuplicateCode(0x{:04X})", code),
            Self::EmptyDescription { code } => {
                defmt::write!(f, "EmptyDescription(0x{:04X})", code);
            }
        }
    }
}

/// Check that the given catalog has unique, non-zero codes with text
pub fn validate(catalog: &[ErrorCode]) -> Result<(), CatalogError> {
    for (index, entry) in catalog.iter().enumerate() {
        if entry.code == 0 {
            return Err(CatalogError::ZeroCode { index });
        }
        if entry.description.is_empty() {
            return Err(CatalogError::EmptyDescription { code: entry.code });
        }
        if catalog[..index].iter().any(|other| other.code == entry.code) {
            return Err(CatalogError::DuplicateCode { code: entry.code });
        }
    }
    Ok(())
}

/// Check the built-in [`CATALOG`]
pub fn validate_catalog() -> Result<(), CatalogError> {
    validate(CATALOG)
}
