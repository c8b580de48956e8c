//! Power-Quality Meter Main Application
//!
//! Entry point for the STM32G474-based meter firmware.
//! Wires the board collaborators to the MCU peripherals and spawns the
//! supervisor, the watchdog and the status LED task.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_stm32::flash::{Blocking, Flash};
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::with_timeout;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use pq_meter_firmware::prelude::*;
use pq_meter_firmware::worker;

type FlashCell = Mutex<CriticalSectionRawMutex, RefCell<Flash<'static, Blocking>>>;

/// Flash page size on the STM32G474
const PAGE_SIZE: u32 = 2048;
/// Flash program granularity (double word)
const WRITE_SIZE: usize = 8;
/// Manufacturing record page
const MANUFACTURING_OFFSET: u32 = 0x7_E000;
/// Firmware update flags page
const FW_FLAGS_OFFSET: u32 = 0x7_E800;
/// Persisted fault code page
const FAULT_SLOT_OFFSET: u32 = 0x7_F000;

static CHANNELS: Channels = Channels::new();
static FLASH: StaticCell<FlashCell> = StaticCell::new();

/// Ethernet PHY link indication on a GPIO
struct PhyLink {
    pin: Input<'static>,
    renewals: u32,
}

impl LinkMonitor for PhyLink {
    fn is_link_up(&mut self) -> bool {
        self.pin.is_high()
    }

    fn renew_address(&mut self) {
        self.renewals = self.renewals.wrapping_add(1);
        info!("address renewal #{}", self.renewals);
    }
}

/// NVM sections mapped onto internal flash pages
struct FlashNvm {
    flash: &'static FlashCell,
}

const fn section_base(section: NvmSection) -> u32 {
    match section {
        NvmSection::Manufacturing => MANUFACTURING_OFFSET,
        NvmSection::FirmwareFlags => FW_FLAGS_OFFSET,
    }
}

fn flash_read(flash: &FlashCell, offset: u32, buf: &mut [u8]) -> Result<(), NvmError> {
    flash
        .lock(|f| f.borrow_mut().blocking_read(offset, buf))
        .map_err(|_| NvmError::Failed)
}

fn flash_erase(flash: &FlashCell, base: u32) -> Result<(), NvmError> {
    flash
        .lock(|f| f.borrow_mut().blocking_erase(base, base + PAGE_SIZE))
        .map_err(|_| NvmError::Failed)
}

/// Program `data` padded with erased bytes to the write granularity
fn flash_write(flash: &FlashCell, offset: u32, data: &[u8]) -> Result<(), NvmError> {
    let mut block = [0xFF_u8; 4 * WRITE_SIZE];
    let len = data.len().div_ceil(WRITE_SIZE) * WRITE_SIZE;
    if len > block.len() || offset as usize % WRITE_SIZE != 0 {
        return Err(NvmError::Failed);
    }
    let mut current = [0_u8; 4 * WRITE_SIZE];
    flash_read(flash, offset, &mut current[..len])?;
    if current[..len].iter().any(|&b| b != 0xFF) {
        return Err(NvmError::NotEmpty);
    }
    block[..data.len()].copy_from_slice(data);
    flash
        .lock(|f| f.borrow_mut().blocking_write(offset, &block[..len]))
        .map_err(|_| NvmError::Failed)
}

impl Nvm for FlashNvm {
    #[allow(clippy::cast_possible_truncation)]
    fn read(&mut self, section: NvmSection, offset: usize, buf: &mut [u8]) -> Result<(), NvmError> {
        flash_read(self.flash, section_base(section) + offset as u32, buf)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write(&mut self, section: NvmSection, offset: usize, data: &[u8]) -> Result<(), NvmError> {
        flash_write(self.flash, section_base(section) + offset as u32, data)
    }

    fn erase(&mut self, section: NvmSection) -> Result<(), NvmError> {
        flash_erase(self.flash, section_base(section))
    }
}

/// Fault slot in flash plus a system reset
struct BoardReset {
    flash: &'static FlashCell,
}

impl ResetControl for BoardReset {
    fn take_last_fault(&mut self) -> Option<FaultCode> {
        let mut bytes = [0_u8; 2];
        flash_read(self.flash, FAULT_SLOT_OFFSET, &mut bytes).ok()?;
        let code = FaultCode::from_bytes(bytes)?;
        if flash_erase(self.flash, FAULT_SLOT_OFFSET).is_err() {
            warn!("could not clear fault slot");
        }
        Some(code)
    }

    fn hard_fault(&mut self, code: FaultCode) -> ! {
        error!("hard fault {}, resetting", code);
        CHANNELS.watchdog.set(WatchdogEvents::STOP);
        let persisted = flash_erase(self.flash, FAULT_SLOT_OFFSET)
            .and_then(|()| flash_write(self.flash, FAULT_SLOT_OFFSET, &code.to_bytes()));
        if let Err(e) = persisted {
            error!("fault code not persisted: {}", e);
        }
        cortex_m::peripheral::SCB::sys_reset()
    }
}

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("PQ Meter Firmware v{}", env!("CARGO_PKG_VERSION"));

    let p = embassy_stm32::init(embassy_stm32::Config::default());
    info!("Peripherals initialized");

    let flash: &'static FlashCell = FLASH.init(Mutex::new(RefCell::new(Flash::new_blocking(p.FLASH))));
    let mut reset = BoardReset { flash };

    if let Err(e) = pq_meter_firmware::error_codes::validate_catalog() {
        error!("error-code catalog invalid: {}", e);
        reset.hard_fault(FaultCode::RESOURCE_INIT);
    }

    // PHY link LED output doubles as link indication on PC0
    let link = PhyLink {
        pin: Input::new(p.PC0, Pull::Down),
        renewals: 0,
    };
    // Status LED (PA5 on Nucleo boards)
    let led = Output::new(p.PA5, Level::Low, Speed::Low);

    let supervisor = Supervisor::new(
        &CHANNELS,
        link,
        FlashNvm { flash },
        BoardReset { flash },
        SupervisorConfig::default(),
    );

    let mut watchdog = Watchdog::new(&CHANNELS, WatchdogConfig::default());
    for task in [SupervisedTask::Supervisor, SupervisedTask::Led] {
        let entry = WatchdogEntry::new(&CHANNELS, task, WATCHDOG_DEFAULT_THRESHOLD);
        if let Err(fault) = watchdog.supervise(entry) {
            reset.hard_fault(fault.code());
        }
    }

    let spawned = spawner
        .spawn(supervisor_task(supervisor))
        .and_then(|()| spawner.spawn(watchdog_task(watchdog, BoardReset { flash })))
        .and_then(|()| spawner.spawn(led_task(led)));
    if let Err(e) = spawned {
        error!("task spawn failed: {}", e);
        reset.hard_fault(FaultCode::RESOURCE_INIT);
    }

    info!("Tasks spawned");
}

#[embassy_executor::task]
async fn supervisor_task(supervisor: Supervisor<'static, PhyLink, FlashNvm, BoardReset>) {
    supervisor.run().await
}

#[embassy_executor::task]
async fn watchdog_task(watchdog: Watchdog<'static>, mut reset: BoardReset) {
    watchdog.run(&mut reset).await
}

/// Blink half-period for each state; `None` means solid on
const fn blink_period(state: SystemState) -> Option<Duration> {
    match state {
        SystemState::Normal => None,
        SystemState::WaitEthLink => Some(Duration::from_millis(100)),
        SystemState::WaitServer => Some(Duration::from_millis(250)),
        SystemState::Error => Some(Duration::from_millis(50)),
        SystemState::FwUpdate => Some(Duration::from_millis(500)),
        SystemState::Init | SystemState::Manufacturing => Some(Duration::from_millis(1000)),
    }
}

/// Status LED - blink pattern follows the system state
#[embassy_executor::task]
async fn led_task(mut led: Output<'static>) {
    let mut handle = worker::led(&CHANNELS);
    let mut state = CHANNELS.state.get();
    loop {
        let woke = match blink_period(state) {
            Some(period) => with_timeout(period, handle.wait(LedEvents::STATE_CHANGED))
                .await
                .is_ok(),
            None => {
                led.set_high();
                handle.wait(LedEvents::STATE_CHANGED).await;
                true
            }
        };
        if woke {
            state = CHANNELS.state.get();
            info!("led: {}", state.label());
        } else {
            led.toggle();
        }
    }
}
