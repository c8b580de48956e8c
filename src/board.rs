//! Board collaborators
//!
//! Narrow interfaces the supervisor consumes from the platform: the link
//! monitor, the non-volatile store and the reset controller. Firmware
//! implements them over the MCU peripherals; tests implement them in RAM.

use crate::fault::FaultCode;

/// Physical network link
pub trait LinkMonitor {
    /// Polled link state
    fn is_link_up(&mut self) -> bool;

    /// Drop and re-acquire the IP address after the server was unreachable
    fn renew_address(&mut self);
}

/// Logical NVM sections
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NvmSection {
    /// Serial number, calibration reference, server identity
    Manufacturing,
    /// Firmware update progress flags
    FirmwareFlags,
}

/// NVM operation failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NvmError {
    /// Write target is not erased
    #[error("section not empty")]
    NotEmpty,
    /// Section has never been written
    #[error("section not configured")]
    NotConfigured,
    /// Hardware or integrity failure
    #[error("nvm access failed")]
    Failed,
}

#[cfg(feature = "embedded")]
impl defmt::Format for NvmError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::NotEmpty => defmt::write!(f, "NotEmpty"),
            Self::NotConfigured => defmt::write!(f, "NotConfigured"),
            Self::Failed => defmt::write!(f, "Failed"),
        }
    }
}

/// Byte-range access to the non-volatile store
pub trait Nvm {
    /// Read `buf.len()` bytes at `offset` within `section`
    fn read(&mut self, section: NvmSection, offset: usize, buf: &mut [u8]) -> Result<(), NvmError>;

    /// Write `data` at `offset` within `section`
    fn write(&mut self, section: NvmSection, offset: usize, data: &[u8]) -> Result<(), NvmError>;

    /// Erase the whole section
    fn erase(&mut self, section: NvmSection) -> Result<(), NvmError>;
}

/// Reset and fault persistence
pub trait ResetControl {
    /// Fault code persisted by the previous boot, consumed on read
    fn take_last_fault(&mut self) -> Option<FaultCode>;

    /// Persist `code` and reset the device
    fn hard_fault(&mut self, code: FaultCode) -> !;
}

/// Persisted firmware-update progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FirmwareFlags {
    /// An update was requested and started
    pub update_started: bool,
    /// Image transfer is in progress
    pub update_in_progress: bool,
}

impl FirmwareFlags {
    /// Encoded size in the NVM section
    pub const SIZE: usize = 2;

    /// Flags for a freshly started update
    #[must_use]
    pub const fn started() -> Self {
        Self {
            update_started: true,
            update_in_progress: true,
        }
    }

    /// True if either flag is set
    #[must_use]
    pub const fn any(self) -> bool {
        self.update_started || self.update_in_progress
    }

    /// Encode for storage
    #[must_use]
    pub const fn to_bytes(self) -> [u8; Self::SIZE] {
        [self.update_started as u8, self.update_in_progress as u8]
    }

    /// Decode from storage; erased flash (`0xFF`) reads as cleared
    #[must_use]
    pub const fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            update_started: bytes[0] == 1,
            update_in_progress: bytes[1] == 1,
        }
    }

    /// Load from `nvm`; an unconfigured section reads as cleared
    pub fn load<N: Nvm>(nvm: &mut N) -> Result<Self, NvmError> {
        let mut bytes = [0_u8; Self::SIZE];
        match nvm.read(NvmSection::FirmwareFlags, 0, &mut bytes) {
            Ok(()) => Ok(Self::from_bytes(bytes)),
            Err(NvmError::NotConfigured) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Erase the section and store `self`
    pub fn store<N: Nvm>(self, nvm: &mut N) -> Result<(), NvmError> {
        nvm.erase(NvmSection::FirmwareFlags)?;
        if self.any() {
            nvm.write(NvmSection::FirmwareFlags, 0, &self.to_bytes())?;
        }
        Ok(())
    }
}

/// Manufacturing record header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManufacturingInfo {
    /// Device serial number
    pub serial: u32,
    /// Hardware revision
    pub hw_revision: u8,
}

impl ManufacturingInfo {
    /// Encoded size in the NVM section
    pub const SIZE: usize = 6;
    /// Magic byte marking a provisioned record
    pub const MAGIC: u8 = 0xA5;

    /// Encode for storage
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut bytes = [0_u8; Self::SIZE];
        bytes[0] = Self::MAGIC;
        bytes[1..5].copy_from_slice(&self.serial.to_le_bytes());
        bytes[5] = self.hw_revision;
        bytes
    }

    /// Load from `nvm`
    ///
    /// A record without the magic byte reads as [`NvmError::NotConfigured`].
    pub fn load<N: Nvm>(nvm: &mut N) -> Result<Self, NvmError> {
        let mut bytes = [0_u8; Self::SIZE];
        nvm.read(NvmSection::Manufacturing, 0, &mut bytes)?;
        if bytes[0] != Self::MAGIC {
            return Err(NvmError::NotConfigured);
        }
        let mut serial = [0_u8; 4];
        serial.copy_from_slice(&bytes[1..5]);
        Ok(Self {
            serial: u32::from_le_bytes(serial),
            hw_revision: bytes[5],
        })
    }
}
