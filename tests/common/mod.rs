//! In-memory board fakes shared by the integration tests

#![allow(dead_code)]

use embassy_time::Duration;
use pq_meter_firmware::board::{
    FirmwareFlags, LinkMonitor, ManufacturingInfo, Nvm, NvmError, NvmSection, ResetControl,
};
use pq_meter_firmware::channels::Channels;
use pq_meter_firmware::config::SupervisorConfig;
use pq_meter_firmware::events::EventInfo;
use pq_meter_firmware::fault::FaultCode;
use pq_meter_firmware::supervisor::Supervisor;

/// Route `log` output to the test harness; safe to call repeatedly
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Link monitor with a settable link state
#[derive(Debug, Default)]
pub struct FakeLink {
    pub up: bool,
    pub renewals: u32,
}

impl LinkMonitor for FakeLink {
    fn is_link_up(&mut self) -> bool {
        self.up
    }

    fn renew_address(&mut self) {
        self.renewals += 1;
    }
}

/// RAM-backed NVM; a never-written section reads as not configured
#[derive(Clone, Debug, Default)]
pub struct MemNvm {
    manufacturing: Vec<u8>,
    firmware_flags: Vec<u8>,
    pub fail: bool,
}

impl MemNvm {
    /// Store with a valid manufacturing record
    pub fn provisioned() -> Self {
        let mut nvm = Self::default();
        nvm.provision();
        nvm
    }

    /// Write a manufacturing record
    pub fn provision(&mut self) {
        let record = ManufacturingInfo {
            serial: 0x00C0_FFEE,
            hw_revision: 3,
        };
        self.manufacturing = record.to_bytes().to_vec();
    }

    /// Firmware flags as currently persisted
    pub fn firmware_flags(&self) -> FirmwareFlags {
        FirmwareFlags::load(&mut self.clone()).unwrap()
    }

    fn section(&mut self, section: NvmSection) -> &mut Vec<u8> {
        match section {
            NvmSection::Manufacturing => &mut self.manufacturing,
            NvmSection::FirmwareFlags => &mut self.firmware_flags,
        }
    }
}

impl Nvm for MemNvm {
    fn read(&mut self, section: NvmSection, offset: usize, buf: &mut [u8]) -> Result<(), NvmError> {
        if self.fail {
            return Err(NvmError::Failed);
        }
        let data = self.section(section);
        if data.is_empty() {
            return Err(NvmError::NotConfigured);
        }
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = data.get(offset + i).copied().unwrap_or(0xFF);
        }
        Ok(())
    }

    fn write(&mut self, section: NvmSection, offset: usize, bytes: &[u8]) -> Result<(), NvmError> {
        if self.fail {
            return Err(NvmError::Failed);
        }
        let data = self.section(section);
        if data.len() > offset {
            return Err(NvmError::NotEmpty);
        }
        data.resize(offset, 0xFF);
        data.extend_from_slice(bytes);
        Ok(())
    }

    fn erase(&mut self, section: NvmSection) -> Result<(), NvmError> {
        if self.fail {
            return Err(NvmError::Failed);
        }
        self.section(section).clear();
        Ok(())
    }
}

/// Reset controller that panics instead of resetting
#[derive(Debug, Default)]
pub struct FakeReset {
    pub last_fault: Option<FaultCode>,
}

impl ResetControl for FakeReset {
    fn take_last_fault(&mut self) -> Option<FaultCode> {
        self.last_fault.take()
    }

    fn hard_fault(&mut self, code: FaultCode) -> ! {
        panic!("hard fault {code}");
    }
}

pub type TestSupervisor<'a> = Supervisor<'a, FakeLink, MemNvm, FakeReset>;

/// Production behaviour with millisecond timeouts
pub fn fast_config() -> SupervisorConfig {
    SupervisorConfig {
        time_sync_timeout: Duration::from_millis(20),
        fw_erase_timeout: Duration::from_millis(30),
        connection_failsafe: Duration::from_millis(500),
        link_poll_interval: Duration::from_millis(5),
    }
}

pub fn supervisor(channels: &Channels, link_up: bool, nvm: MemNvm) -> TestSupervisor<'_> {
    init_logger();
    let link = FakeLink {
        up: link_up,
        renewals: 0,
    };
    Supervisor::new(channels, link, nvm, FakeReset::default(), fast_config())
}

/// Drive one supervisor iteration that must not fault
pub fn step(supervisor: &mut TestSupervisor<'_>) {
    embassy_futures::block_on(supervisor.step()).expect("unexpected fault");
}

/// True if `code` is parked in the backlog
pub fn backlog_has(supervisor: &TestSupervisor<'_>, code: u16) -> bool {
    supervisor
        .backlog()
        .iter()
        .any(|pending| pending.info.code_number() == code)
}

/// Drain the alert queue, returning the alert codes in order
pub fn drain_alerts(channels: &Channels) -> Vec<u16> {
    let mut out = Vec::new();
    while let Ok(alert) = channels.send_alerts.try_receive() {
        out.push(alert.code.code);
    }
    out
}

/// Drain the status queue
pub fn drain_statuses(channels: &Channels) -> usize {
    let mut n = 0;
    while channels.send_states.try_receive().is_ok() {
        n += 1;
    }
    n
}

/// Descriptor codes in backlog order
pub fn backlog_codes(supervisor: &TestSupervisor<'_>) -> Vec<u16> {
    supervisor.backlog().iter().map(|p| p.info.code_number()).collect()
}

pub fn code_of(info: &EventInfo) -> u16 {
    info.code_number()
}
