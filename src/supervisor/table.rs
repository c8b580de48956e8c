//! Per-state wait masks
//!
//! Which system bits each state blocks on, and which stale bits are
//! discarded when the state is entered. Bits outside a state's wait mask
//! stay set until a state that waits on them consumes them.

use crate::events::SystemEvents;
use crate::types::SystemState;

const CONNECTIVITY: SystemEvents = SystemEvents::CONNECTED
    .union(SystemEvents::LINK_LOST)
    .union(SystemEvents::CONNECTION_TO_SERVER_LOST)
    .union(SystemEvents::NO_SERVER);

const SERVICE_STATE: SystemEvents = SystemEvents::RAW_RUNNING
    .union(SystemEvents::RAW_STOPPED)
    .union(SystemEvents::REG_RUNNING)
    .union(SystemEvents::REG_STOPPED);

/// Bits the supervisor blocks on in `state`
///
/// `WaitEthLink` polls the link monitor instead; its mask bounds the sleep
/// between polls.
#[must_use]
pub const fn wait_mask(state: SystemState) -> SystemEvents {
    let base = SystemEvents::WATCHDOG;
    match state {
        SystemState::Init => SystemEvents::empty(),
        SystemState::Manufacturing => base
            .union(SystemEvents::MANUFACTURING_DONE)
            .union(SystemEvents::EVENT_TO_PROCESS),
        SystemState::WaitEthLink => base.union(SystemEvents::EVENT_TO_PROCESS),
        SystemState::WaitServer => base
            .union(SystemEvents::CONNECTED)
            .union(SystemEvents::LINK_LOST)
            .union(SystemEvents::NO_SERVER)
            .union(SystemEvents::EVENT_TO_PROCESS),
        SystemState::Normal => base
            .union(SystemEvents::SENSOR_CONFIGURED)
            .union(SystemEvents::LINK_LOST)
            .union(SystemEvents::CONNECTION_TO_SERVER_LOST)
            .union(SystemEvents::TO_FW_UPDATE)
            .union(SystemEvents::SENSOR_RECONFIG)
            .union(SystemEvents::EVENT_TO_PROCESS)
            .union(SERVICE_STATE),
        SystemState::Error => base
            .union(SystemEvents::CONNECTED)
            .union(SystemEvents::NO_SERVER)
            .union(SystemEvents::LINK_LOST)
            .union(SystemEvents::CONNECTION_TO_SERVER_LOST)
            .union(SystemEvents::TO_FW_UPDATE)
            .union(SystemEvents::EVENT_TO_PROCESS),
        SystemState::FwUpdate => base
            .union(SystemEvents::LINK_LOST)
            .union(SystemEvents::CONNECTION_TO_SERVER_LOST)
            .union(SystemEvents::EVENT_TO_PROCESS)
            .union(SystemEvents::ERASE_NEEDED),
    }
}

/// Stale bits discarded on entry to `state`
#[must_use]
pub const fn clear_on_entry(state: SystemState) -> SystemEvents {
    match state {
        SystemState::Init | SystemState::Manufacturing => SystemEvents::empty(),
        SystemState::WaitEthLink => CONNECTIVITY,
        SystemState::WaitServer => {
            SystemEvents::CONNECTED.union(SystemEvents::CONNECTION_TO_SERVER_LOST)
        }
        SystemState::Normal | SystemState::Error => {
            SystemEvents::CONNECTED.union(SystemEvents::NO_SERVER)
        }
        SystemState::FwUpdate => SystemEvents::TO_FW_UPDATE.union(SystemEvents::FW_AREA_ERASED),
    }
}
