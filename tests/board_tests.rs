//! Tests for persisted records, fault codes and shared types

mod common;

use common::MemNvm;
use pq_meter_firmware::board::{FirmwareFlags, ManufacturingInfo, Nvm, NvmError, NvmSection};
use pq_meter_firmware::fault::{Fault, FaultCode};
use pq_meter_firmware::types::{Domain, EventSource, SensorId, ServiceId, SystemState};

// ============================================================================
// Firmware Flags Tests
// ============================================================================

#[test]
fn unconfigured_flags_read_as_cleared() {
    let mut nvm = MemNvm::default();
    assert_eq!(FirmwareFlags::load(&mut nvm), Ok(FirmwareFlags::default()));
}

#[test]
fn erased_flash_bytes_decode_as_cleared() {
    assert!(!FirmwareFlags::from_bytes([0xFF, 0xFF]).any());
    assert_eq!(FirmwareFlags::started().to_bytes(), [1, 1]);
}

#[test]
fn started_flags_persist() {
    let mut nvm = MemNvm::default();
    FirmwareFlags::started().store(&mut nvm).unwrap();
    assert_eq!(FirmwareFlags::load(&mut nvm), Ok(FirmwareFlags::started()));

    FirmwareFlags::default().store(&mut nvm).unwrap();
    assert!(!FirmwareFlags::load(&mut nvm).unwrap().any());
}

#[test]
fn flags_store_propagates_nvm_failure() {
    let mut nvm = MemNvm::default();
    nvm.fail = true;
    assert_eq!(FirmwareFlags::started().store(&mut nvm), Err(NvmError::Failed));
    assert_eq!(FirmwareFlags::load(&mut nvm), Err(NvmError::Failed));
}

// ============================================================================
// Manufacturing Record Tests
// ============================================================================

#[test]
fn provisioned_record_loads() {
    let mut nvm = MemNvm::provisioned();
    let info = ManufacturingInfo::load(&mut nvm).unwrap();
    assert_eq!(info.serial, 0x00C0_FFEE);
    assert_eq!(info.hw_revision, 3);
}

#[test]
fn missing_record_is_not_configured() {
    let mut nvm = MemNvm::default();
    assert_eq!(ManufacturingInfo::load(&mut nvm), Err(NvmError::NotConfigured));
}

#[test]
fn record_without_magic_is_not_configured() {
    let mut nvm = MemNvm::default();
    nvm.write(NvmSection::Manufacturing, 0, &[0x00, 1, 2, 3, 4, 5])
        .unwrap();
    assert_eq!(ManufacturingInfo::load(&mut nvm), Err(NvmError::NotConfigured));
}

#[test]
fn record_encoding_leads_with_magic() {
    let bytes = ManufacturingInfo {
        serial: 0x0102_0304,
        hw_revision: 9,
    }
    .to_bytes();
    assert_eq!(bytes, [ManufacturingInfo::MAGIC, 0x04, 0x03, 0x02, 0x01, 9]);
}

// ============================================================================
// Fault Code Tests
// ============================================================================

#[test]
fn fault_slot_decoding() {
    assert_eq!(FaultCode::from_bytes([0, 0]), None);
    assert_eq!(FaultCode::from_bytes([0xFF, 0xFF]), None);
    let code = FaultCode::CONNECTION_TIMEOUT;
    assert_eq!(FaultCode::from_bytes(code.to_bytes()), Some(code));
}

#[test]
fn fault_code_display_is_hex() {
    assert_eq!(FaultCode(0x0602).to_string(), "0x0602");
}

#[test]
fn faults_map_to_their_codes() {
    assert_eq!(
        Fault::InvalidState(SystemState::Init).code(),
        FaultCode::INVALID_STATE
    );
    assert_eq!(Fault::ConnectionTimeout.code(), FaultCode::CONNECTION_TIMEOUT);
    assert_eq!(Fault::ResourceInit("spawn").code(), FaultCode::RESOURCE_INIT);
    let starved = Fault::WatchdogStarvation {
        task: "energy",
        code: FaultCode(0x0602),
    };
    assert_eq!(starved.code(), FaultCode(0x0602));
    assert_eq!(starved.to_string(), "task energy starved, fault code 0x0602");
}

// ============================================================================
// System State Tests
// ============================================================================

#[test]
fn state_encoding_is_stable() {
    for raw in 0..7 {
        let state = SystemState::from_u8(raw).unwrap();
        assert_eq!(state.as_u8(), raw);
    }
    assert_eq!(SystemState::from_u8(7), None);
    assert_eq!(SystemState::default(), SystemState::Init);
}

#[test]
fn connected_states() {
    assert!(SystemState::Normal.is_connected_state());
    assert!(SystemState::Error.is_connected_state());
    assert!(SystemState::FwUpdate.is_connected_state());
    assert!(!SystemState::WaitServer.is_connected_state());
    assert!(!SystemState::WaitEthLink.is_connected_state());
    assert!(!SystemState::Manufacturing.is_connected_state());
}

// ============================================================================
// Domain Tests
// ============================================================================

#[test]
fn sources_resolve_to_domains() {
    let s1 = SensorId::new(1);
    assert_eq!(Domain::from_source(EventSource::Device), Domain::Device);
    assert_eq!(Domain::from_source(EventSource::Sensor(s1)), Domain::Sensor(s1));
    assert_eq!(
        Domain::from_source(EventSource::Service(s1, ServiceId::Registers)),
        Domain::Service(s1, ServiceId::Registers)
    );
}

#[test]
fn out_of_range_sensor_is_corrupted() {
    let bad = SensorId::new(200);
    assert!(!bad.is_valid());
    assert_eq!(Domain::from_source(EventSource::Sensor(bad)), Domain::Corrupted);
    assert_eq!(
        Domain::from_source(EventSource::Service(bad, ServiceId::Waveform)),
        Domain::Corrupted
    );
}
