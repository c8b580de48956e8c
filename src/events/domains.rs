//! Per-domain event bit assignments
//!
//! One flag type per worker domain. Each bit has exactly one producer; bit
//! 31 is reserved in every domain for the watchdog liveness request.

use bitflags::bitflags;

use super::flags::Supervised;

bitflags! {
    /// Bits the supervisor waits on
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SystemEvents: u32 {
        /// Server session established (command worker)
        const CONNECTED = 1 << 0;
        /// Physical link dropped (link monitor)
        const LINK_LOST = 1 << 1;
        /// Server session dropped (command worker)
        const CONNECTION_TO_SERVER_LOST = 1 << 2;
        /// Server unreachable, address needs renewal (command worker)
        const NO_SERVER = 1 << 3;
        /// Cross-task event queue has entries (any worker via `notify`)
        const EVENT_TO_PROCESS = 1 << 4;
        /// Remote requested a firmware update (command worker)
        const TO_FW_UPDATE = 1 << 5;
        /// Update area must be erased before continuing (firmware updater)
        const ERASE_NEEDED = 1 << 6;
        /// Update area erase finished (firmware updater)
        const FW_AREA_ERASED = 1 << 7;
        /// Time sync finished (time-sync worker)
        const TIME_SYNC_FINISHED = 1 << 8;
        /// Sensor configured (energy worker)
        const SENSOR_CONFIGURED = 1 << 9;
        /// Sensor needs reconfiguration (command worker)
        const SENSOR_RECONFIG = 1 << 10;
        /// Waveform service running (energy worker)
        const RAW_RUNNING = 1 << 11;
        /// Waveform service stopped (energy worker)
        const RAW_STOPPED = 1 << 12;
        /// Register service running (energy worker)
        const REG_RUNNING = 1 << 13;
        /// Register service stopped (energy worker)
        const REG_STOPPED = 1 << 14;
        /// Manufacturing data was provisioned (command worker)
        const MANUFACTURING_DONE = 1 << 15;
        /// Watchdog liveness request
        const WATCHDOG = 1 << 31;
    }
}

bitflags! {
    /// Energy sampling worker
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EnergyEvents: u32 {
        /// Configure the metering front end
        const CONFIGURE = 1 << 0;
        /// Re-apply configuration
        const RECONFIGURE = 1 << 1;
        /// Start waveform sampling
        const START_RAW = 1 << 2;
        /// Stop waveform sampling
        const STOP_RAW = 1 << 3;
        /// Start register readout
        const START_REG = 1 << 4;
        /// Stop register readout
        const STOP_REG = 1 << 5;
        /// Watchdog liveness request
        const WATCHDOG = 1 << 31;
    }
}

bitflags! {
    /// Fast and slow variable readers
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct VarsEvents: u32 {
        /// Begin reading
        const START = 1 << 0;
        /// Stop reading
        const STOP = 1 << 1;
        /// New samples available from the energy worker
        const DATA_READY = 1 << 2;
        /// Watchdog liveness request
        const WATCHDOG = 1 << 31;
    }
}

bitflags! {
    /// Fast and slow stream publishers
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct StreamEvents: u32 {
        /// Begin publishing
        const START = 1 << 0;
        /// Stop publishing
        const STOP = 1 << 1;
        /// A batch is ready to publish
        const BATCH_READY = 1 << 2;
        /// Watchdog liveness request
        const WATCHDOG = 1 << 31;
    }
}

bitflags! {
    /// Command / protocol worker
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CommandEvents: u32 {
        /// `send_states_queue` has a status to publish
        const SEND_STATUS_CHANGE = 1 << 0;
        /// `send_alerts_queue` has an alert to publish
        const SEND_ALERT = 1 << 1;
        /// Announce the device online
        const SEND_ONLINE = 1 << 2;
        /// Tear down the server session
        const SERVER_DISCONNECT = 1 << 3;
        /// Open the server session
        const CONNECT = 1 << 4;
        /// Watchdog liveness request
        const WATCHDOG = 1 << 31;
    }
}

bitflags! {
    /// Firmware updater
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FwUpdateEvents: u32 {
        /// Drop any in-progress update state
        const RESET_FW_UPDATE = 1 << 0;
        /// Erase the new-firmware area
        const ERASE_NEW_FW_SECTOR = 1 << 1;
        /// Watchdog liveness request
        const WATCHDOG = 1 << 31;
    }
}

bitflags! {
    /// Time-sync worker
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TimeSyncEvents: u32 {
        /// Synchronise the clock now
        const DO_SYNC = 1 << 0;
        /// Watchdog liveness request
        const WATCHDOG = 1 << 31;
    }
}

bitflags! {
    /// LED / status indicator worker
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct LedEvents: u32 {
        /// System state changed, re-read the state cell
        const STATE_CHANGED = 1 << 0;
        /// Watchdog liveness request
        const WATCHDOG = 1 << 31;
    }
}

bitflags! {
    /// Watchdog thread control
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct WatchdogEvents: u32 {
        /// Stop supervising, an orderly reset is about to happen
        const STOP = 1 << 0;
    }
}

macro_rules! supervised {
    ($($flags:ty),* $(,)?) => {
        $(
            impl Supervised for $flags {
                const WATCHDOG: Self = <$flags>::from_bits_retain(1 << 31);
            }
        )*
    };
}

supervised!(
    SystemEvents,
    EnergyEvents,
    VarsEvents,
    StreamEvents,
    CommandEvents,
    FwUpdateEvents,
    TimeSyncEvents,
    LedEvents,
);
