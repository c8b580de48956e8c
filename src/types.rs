//! Shared types used across the supervisor core
//!
//! Domain types for the system state, event severity and the
//! device / sensor / service hierarchy that status and error history are
//! tracked against.

use core::fmt;

use crate::config::{MAX_SENSORS, SERVICES_PER_SENSOR};

/// Top-level operational state of the device
///
/// Exactly one instance exists and only the supervisor writes it; workers
/// read it through [`crate::channels::StateCell`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SystemState {
    /// Boot sequence, runs once
    #[default]
    Init,
    /// Device has no manufacturing data and waits for provisioning
    Manufacturing,
    /// Waiting for the physical Ethernet link
    WaitEthLink,
    /// Link is up, waiting for the server session
    WaitServer,
    /// Connected and operating
    Normal,
    /// A device-level error was reported
    Error,
    /// Firmware update in progress
    FwUpdate,
}

impl SystemState {
    /// Short label used in logs and status messages
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Manufacturing => "manufacturing",
            Self::WaitEthLink => "wait-eth-link",
            Self::WaitServer => "wait-server",
            Self::Normal => "normal",
            Self::Error => "error",
            Self::FwUpdate => "fw-update",
        }
    }

    /// True for the states that hold a live server session
    #[must_use]
    pub const fn is_connected_state(self) -> bool {
        matches!(self, Self::Normal | Self::Error | Self::FwUpdate)
    }

    /// Stable numeric encoding for the shared state cell
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Manufacturing => 1,
            Self::WaitEthLink => 2,
            Self::WaitServer => 3,
            Self::Normal => 4,
            Self::Error => 5,
            Self::FwUpdate => 6,
        }
    }

    /// Decode from [`Self::as_u8`]
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Init),
            1 => Some(Self::Manufacturing),
            2 => Some(Self::WaitEthLink),
            3 => Some(Self::WaitServer),
            4 => Some(Self::Normal),
            5 => Some(Self::Error),
            6 => Some(Self::FwUpdate),
            _ => None,
        }
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for SystemState {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.label());
    }
}

/// Event severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// No report
    None,
    /// Benign status change, always reported
    Info,
    /// Recoverable anomaly, rate-limited per code
    Warning,
    /// Domain-affecting failure
    Error,
}

impl Severity {
    /// Short label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Severity {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.label());
    }
}

/// Index of a metering sensor
///
/// Not range-checked on construction so that static event tables stay
/// `const`; an out-of-range id resolves to [`Domain::Corrupted`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SensorId(u8);

impl SensorId {
    /// Create a sensor id
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Raw index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// True if the index addresses a fitted sensor
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.index() < MAX_SENSORS
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for SensorId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "sensor{}", self.0);
    }
}

/// Function provided by a sensor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceId {
    /// Raw waveform sampling (fast path)
    Waveform,
    /// Register / aggregate readout (slow path)
    Registers,
}

impl ServiceId {
    /// All services, in ring order
    pub const ALL: [Self; SERVICES_PER_SENSOR] = [Self::Waveform, Self::Registers];

    /// Position in per-sensor tables
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Waveform => 0,
            Self::Registers => 1,
        }
    }

    /// Short label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Waveform => "waveform",
            Self::Registers => "registers",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ServiceId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.label());
    }
}

/// Where an event originated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// The device as a whole
    Device,
    /// A sensor, independent of its services
    Sensor(SensorId),
    /// One service of one sensor
    Service(SensorId, ServiceId),
}

/// Granularity at which health and error history are tracked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Whole device
    Device,
    /// One sensor
    Sensor(SensorId),
    /// One service of one sensor
    Service(SensorId, ServiceId),
    /// Fallback for events that name a sensor that does not exist
    Corrupted,
}

impl Domain {
    /// Resolve the domain an event source reports into
    #[must_use]
    pub const fn from_source(source: EventSource) -> Self {
        match source {
            EventSource::Device => Self::Device,
            EventSource::Sensor(sensor) if sensor.is_valid() => Self::Sensor(sensor),
            EventSource::Service(sensor, service) if sensor.is_valid() => {
                Self::Service(sensor, service)
            }
            EventSource::Sensor(_) | EventSource::Service(..) => Self::Corrupted,
        }
    }

    /// Domain kind label ("system", "sensor" or "service")
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Device | Self::Corrupted => "system",
            Self::Sensor(_) => "sensor",
            Self::Service(..) => "service",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Domain {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Device => defmt::write!(f, "device"),
            Self::Sensor(s) => defmt::write!(f, "{}", s),
            Self::Service(s, svc) => defmt::write!(f, "{}/{}", s, svc),
            Self::Corrupted => defmt::write!(f, "corrupted"),
        }
    }
}

/// Health of a domain as reported in status messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DomainHealth {
    /// No outstanding error
    #[default]
    Ok,
    /// An error was reported and not yet cleared
    Failed,
}
