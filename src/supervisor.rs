//! System supervisor
//!
//! The top-level control loop. It owns the [`SystemState`], the event
//! aggregator and the offline backlog, and is the only writer of all three.
//! Workers talk to it by setting bits in the system event group and by
//! queueing [`EventInfo`]s through [`crate::aggregator::notify`].
//!
//! Each [`Supervisor::step`] blocks on the current state's wait mask, then
//! handles the bits that woke it in a fixed priority order:
//!
//! 1. watchdog
//! 2. connectivity (link lost, server lost, connected, no server,
//!    provisioning done)
//! 3. sensor configuration and service state
//! 4. queued events
//! 5. firmware update
//!
//! A handler only runs if its bit is still in the wait mask of the state
//! the previous handler left the machine in.

mod table;
mod timer;

pub use table::{clear_on_entry, wait_mask};
pub use timer::ConnectionTimer;

use embassy_time::{Duration, Instant};

use crate::aggregator::{Aggregator, Classified};
use crate::backlog::PendingEventBacklog;
use crate::board::{FirmwareFlags, LinkMonitor, ManufacturingInfo, Nvm, NvmError, ResetControl};
use crate::channels::Channels;
use crate::config::{SupervisorConfig, MAX_SENSORS};
use crate::events::{
    CommandEvents, EnergyEvents, EventInfo, FwUpdateEvents, LedEvents, StreamEvents,
    SupervisorEvent, SystemEvents, TimeSyncEvents, VarsEvents,
};
use crate::fault::{Fault, FaultCode};
use crate::types::{Domain, SensorId, ServiceId, SystemState};

/// Supervisor context
///
/// Generic over the board collaborators so the whole state machine runs on
/// the host against in-memory fakes.
pub struct Supervisor<'a, L, N, R> {
    channels: &'a Channels,
    link: L,
    nvm: N,
    reset: R,
    config: SupervisorConfig,
    state: SystemState,
    state_before_disconnection: SystemState,
    wait_mask: SystemEvents,
    booted: bool,
    server_connected: bool,
    raw_running: bool,
    reg_running: bool,
    fw_flags: FirmwareFlags,
    timer: ConnectionTimer,
    aggregator: Aggregator,
    backlog: PendingEventBacklog,
    backlog_overflowed: bool,
    liveness_counter: u32,
}

impl<'a, L, N, R> Supervisor<'a, L, N, R>
where
    L: LinkMonitor,
    N: Nvm,
    R: ResetControl,
{
    /// Supervisor in [`SystemState::Init`], not yet booted
    #[must_use]
    pub fn new(channels: &'a Channels, link: L, nvm: N, reset: R, config: SupervisorConfig) -> Self {
        channels.state.set(SystemState::Init);
        Self {
            channels,
            link,
            nvm,
            reset,
            config,
            state: SystemState::Init,
            state_before_disconnection: SystemState::WaitServer,
            wait_mask: wait_mask(SystemState::Init),
            booted: false,
            server_connected: false,
            raw_running: false,
            reg_running: false,
            fw_flags: FirmwareFlags::default(),
            timer: ConnectionTimer::new(config.connection_failsafe),
            aggregator: Aggregator::new(),
            backlog: PendingEventBacklog::new(),
            backlog_overflowed: false,
            liveness_counter: 0,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SystemState {
        self.state
    }

    /// State recorded when the last server session was lost
    #[must_use]
    pub const fn state_before_disconnection(&self) -> SystemState {
        self.state_before_disconnection
    }

    /// Bits the current state blocks on
    #[must_use]
    pub const fn current_wait_mask(&self) -> SystemEvents {
        self.wait_mask
    }

    /// True while a server session is up
    #[must_use]
    pub const fn is_server_connected(&self) -> bool {
        self.server_connected
    }

    /// Persisted firmware-update progress as last written
    #[must_use]
    pub const fn firmware_flags(&self) -> FirmwareFlags {
        self.fw_flags
    }

    /// Reconnection failsafe
    #[must_use]
    pub const fn connection_timer(&self) -> &ConnectionTimer {
        &self.timer
    }

    /// Event aggregator
    #[must_use]
    pub const fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Offline backlog
    #[must_use]
    pub const fn backlog(&self) -> &PendingEventBacklog {
        &self.backlog
    }

    /// Liveness tokens deposited so far
    #[must_use]
    pub const fn liveness_counter(&self) -> u32 {
        self.liveness_counter
    }

    /// Link monitor
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// NVM store
    #[must_use]
    pub const fn nvm(&self) -> &N {
        &self.nvm
    }

    /// NVM store, for provisioning
    pub fn nvm_mut(&mut self) -> &mut N {
        &mut self.nvm
    }

    /// Run one iteration of the state machine
    ///
    /// The first call performs the boot sequence. Returns the fault the
    /// caller must reset the device with.
    pub async fn step(&mut self) -> Result<(), Fault> {
        match self.state {
            SystemState::Init if self.booted => Err(Fault::InvalidState(self.state)),
            SystemState::Init => {
                self.boot().await;
                Ok(())
            }
            SystemState::WaitEthLink => {
                self.poll_link().await;
                Ok(())
            }
            SystemState::Manufacturing
            | SystemState::WaitServer
            | SystemState::Normal
            | SystemState::Error
            | SystemState::FwUpdate => self.wait_and_handle().await,
        }
    }

    /// Run the state machine forever, resetting the device on a fault
    pub async fn run(mut self) -> ! {
        loop {
            if let Err(fault) = self.step().await {
                error!("hard fault in {}: {}", self.state.label(), fault);
                self.reset.hard_fault(fault.code());
            }
        }
    }

    // ------------------------------------------------------------------
    // Init
    // ------------------------------------------------------------------

    async fn boot(&mut self) {
        self.booted = true;
        info!("supervisor booting");
        if let Some(code) = self.reset.take_last_fault() {
            warn!("previous reset caused by fault {}", code);
            self.report(reset_cause(code));
        }
        self.init().await;
    }

    async fn init(&mut self) {
        match ManufacturingInfo::load(&mut self.nvm) {
            Ok(record) => info!("serial {} hw rev {}", record.serial, record.hw_revision),
            Err(NvmError::NotConfigured) => {
                warn!("manufacturing data missing, waiting for provisioning");
                self.report(SupervisorEvent::NotProvisioned);
                self.change_state(SystemState::Manufacturing);
                return;
            }
            Err(e) => {
                error!("manufacturing data unreadable: {}", e);
                self.report(SupervisorEvent::ManufacturingInvalid);
                // Reconnecting keeps Error and flushes the report.
                self.state_before_disconnection = SystemState::Error;
                self.change_state(SystemState::Error);
                self.channels.command.set(CommandEvents::CONNECT);
                return;
            }
        }

        match FirmwareFlags::load(&mut self.nvm) {
            Ok(flags) if flags.any() => {
                warn!("firmware update interrupted by reset, discarding");
                self.fw_flags = flags;
                self.clear_fw_flags();
                self.channels.fw_update.set(FwUpdateEvents::ERASE_NEW_FW_SECTOR);
                self.report(SupervisorEvent::FwUpdateInterrupted);
            }
            Ok(_) => {}
            Err(e) => warn!("firmware flags unreadable: {}", e),
        }

        self.channels.energy.set(EnergyEvents::CONFIGURE);

        if !self.link.is_link_up() {
            self.change_state(SystemState::WaitEthLink);
            return;
        }
        self.sync_time().await;
        self.change_state(SystemState::WaitServer);
    }

    async fn sync_time(&mut self) {
        self.channels.time_sync.set(TimeSyncEvents::DO_SYNC);
        let timeout = self.config.time_sync_timeout;
        if self.wait_serving_watchdog(SystemEvents::TIME_SYNC_FINISHED, timeout).await {
            debug!("time synchronised");
        } else {
            warn!("time sync timed out");
            self.report(SupervisorEvent::TimeSyncTimeout);
        }
    }

    // ------------------------------------------------------------------
    // Waiting
    // ------------------------------------------------------------------

    async fn poll_link(&mut self) {
        if self.link.is_link_up() {
            info!("ethernet link up");
            self.change_state(SystemState::WaitServer);
            return;
        }
        let woke = self
            .channels
            .system
            .wait_any_timeout(self.wait_mask, self.config.link_poll_interval)
            .await;
        if let Some(woke) = woke {
            self.handle(woke).await;
        }
    }

    async fn wait_and_handle(&mut self) -> Result<(), Fault> {
        if self.timer.expired(Instant::now()) {
            error!("connection failsafe expired in {}", self.state.label());
            return Err(Fault::ConnectionTimeout);
        }
        let mask = self.wait_mask;
        let woke = match self.timer.deadline() {
            Some(deadline) => self.channels.system.wait_any_until(mask, deadline).await,
            None => Some(self.channels.system.wait_any(mask).await),
        };
        let Some(woke) = woke else {
            error!("server connection not established in time");
            return Err(Fault::ConnectionTimeout);
        };
        self.handle(woke).await;
        Ok(())
    }

    /// Wait up to `timeout` for `bit`, answering watchdog requests meanwhile
    async fn wait_serving_watchdog(&mut self, bit: SystemEvents, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mask = bit | SystemEvents::WATCHDOG;
        loop {
            let Some(woke) = self.channels.system.wait_any_until(mask, deadline).await else {
                return false;
            };
            if woke.contains(SystemEvents::WATCHDOG) {
                self.channels.system.clear(SystemEvents::WATCHDOG);
                self.serve_watchdog();
            }
            if woke.contains(bit) {
                self.channels.system.clear(bit);
                return true;
            }
        }
    }

    fn take(&self, woke: SystemEvents, bit: SystemEvents) -> bool {
        if woke.contains(bit) && self.wait_mask.contains(bit) {
            self.channels.system.clear(bit);
            true
        } else {
            false
        }
    }

    async fn handle(&mut self, woke: SystemEvents) {
        if self.take(woke, SystemEvents::WATCHDOG) {
            self.serve_watchdog();
        }

        if self.take(woke, SystemEvents::LINK_LOST) {
            self.on_disconnected(SystemState::WaitEthLink, SupervisorEvent::LinkLost).await;
        }
        if self.take(woke, SystemEvents::CONNECTION_TO_SERVER_LOST) {
            self.on_disconnected(SystemState::WaitServer, SupervisorEvent::ServerLost).await;
        }
        if self.take(woke, SystemEvents::CONNECTED) {
            self.on_connected();
        }
        if self.take(woke, SystemEvents::NO_SERVER) {
            self.on_no_server();
        }
        if self.take(woke, SystemEvents::MANUFACTURING_DONE) {
            info!("manufacturing data provisioned");
            self.init().await;
        }

        if self.take(woke, SystemEvents::SENSOR_CONFIGURED) {
            self.on_sensor_configured();
        }
        if self.take(woke, SystemEvents::SENSOR_RECONFIG) {
            self.on_sensor_reconfig();
        }
        if self.take(woke, SystemEvents::RAW_RUNNING) {
            self.on_service_changed(ServiceId::Waveform, true);
        }
        if self.take(woke, SystemEvents::RAW_STOPPED) {
            self.on_service_changed(ServiceId::Waveform, false);
        }
        if self.take(woke, SystemEvents::REG_RUNNING) {
            self.on_service_changed(ServiceId::Registers, true);
        }
        if self.take(woke, SystemEvents::REG_STOPPED) {
            self.on_service_changed(ServiceId::Registers, false);
        }

        if self.take(woke, SystemEvents::EVENT_TO_PROCESS) {
            self.process_events();
        }

        if self.take(woke, SystemEvents::TO_FW_UPDATE) {
            self.on_fw_update_requested();
        }
        if self.take(woke, SystemEvents::ERASE_NEEDED) {
            self.on_erase_needed().await;
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn change_state(&mut self, next: SystemState) {
        let prev = self.state;
        info!("state {} -> {}", prev.label(), next.label());

        self.channels.system.clear(clear_on_entry(next));
        self.state = next;
        self.wait_mask = wait_mask(next);
        self.channels.state.set(next);
        self.channels.led.set(LedEvents::STATE_CHANGED);

        if prev == SystemState::Normal && !next.is_connected_state() {
            self.pause_streams();
        }

        match next {
            SystemState::WaitEthLink | SystemState::FwUpdate => self.timer.stop(),
            SystemState::WaitServer => {
                self.arm_failsafe();
                self.channels.command.set(CommandEvents::CONNECT);
            }
            SystemState::Error => self.arm_failsafe(),
            SystemState::Normal => {
                self.timer.stop();
                if prev != SystemState::Normal {
                    self.resume_streams();
                }
            }
            SystemState::Init | SystemState::Manufacturing => {}
        }
    }

    fn arm_failsafe(&mut self) {
        if self.timer.arm(Instant::now()) {
            debug!("connection failsafe armed");
        }
    }

    fn on_connected(&mut self) {
        info!("server connected");
        self.server_connected = true;

        let resume = match self.state_before_disconnection {
            SystemState::FwUpdate => {
                self.clear_fw_flags();
                SystemState::Normal
            }
            SystemState::Error => SystemState::Error,
            _ => SystemState::Normal,
        };
        self.change_state(resume);

        self.report(SupervisorEvent::DeviceOnline);
        self.flush_backlog();
        self.queue_status(Domain::Device);
        self.channels
            .command
            .set(CommandEvents::SEND_ONLINE | CommandEvents::SEND_STATUS_CHANGE);
    }

    async fn on_disconnected(&mut self, next: SystemState, event: SupervisorEvent) {
        if self.state.is_connected_state() {
            self.state_before_disconnection = self.state;
        }
        let was_connected = self.server_connected;
        self.server_connected = false;
        warn!("connectivity lost in {}, moving to {}", self.state.label(), next.label());

        if self.state == SystemState::FwUpdate || self.fw_flags.any() {
            self.abort_fw_update().await;
        }
        self.change_state(next);
        if was_connected {
            self.report(event);
        }
    }

    fn on_no_server(&mut self) {
        info!("no server, renewing address");
        self.link.renew_address();
        self.report(SupervisorEvent::NoServer);
        self.channels.command.set(CommandEvents::CONNECT);
    }

    // ------------------------------------------------------------------
    // Sensor and services
    // ------------------------------------------------------------------

    fn on_sensor_configured(&mut self) {
        info!("sensors configured");
        for index in 0..MAX_SENSORS {
            let domain = Domain::Sensor(sensor(index));
            self.aggregator.mark_healthy(domain);
            self.queue_status(domain);
        }
        self.channels
            .energy
            .set(EnergyEvents::START_RAW | EnergyEvents::START_REG);
        self.channels.command.set(CommandEvents::SEND_STATUS_CHANGE);
    }

    fn on_sensor_reconfig(&mut self) {
        info!("sensor reconfiguration requested");
        self.raw_running = false;
        self.reg_running = false;
        self.pause_streams();
        self.channels.energy.set(EnergyEvents::RECONFIGURE);
    }

    fn on_service_changed(&mut self, service: ServiceId, running: bool) {
        debug!("{} running: {}", service.label(), running);
        match service {
            ServiceId::Waveform => self.raw_running = running,
            ServiceId::Registers => self.reg_running = running,
        }
        self.set_streams(service, running);
        if running {
            for index in 0..MAX_SENSORS {
                let domain = Domain::Service(sensor(index), service);
                self.aggregator.mark_healthy(domain);
                self.queue_status(domain);
            }
        }
        self.channels.command.set(CommandEvents::SEND_STATUS_CHANGE);
    }

    fn set_streams(&self, service: ServiceId, running: bool) {
        let (vars, stream) = match service {
            ServiceId::Waveform => (&self.channels.fast_vars, &self.channels.fast_stream),
            ServiceId::Registers => (&self.channels.slow_vars, &self.channels.slow_stream),
        };
        if running {
            vars.set(VarsEvents::START);
            stream.set(StreamEvents::START);
        } else {
            vars.set(VarsEvents::STOP);
            stream.set(StreamEvents::STOP);
        }
    }

    fn pause_streams(&self) {
        self.set_streams(ServiceId::Waveform, false);
        self.set_streams(ServiceId::Registers, false);
    }

    fn resume_streams(&self) {
        if self.raw_running {
            self.set_streams(ServiceId::Waveform, true);
        }
        if self.reg_running {
            self.set_streams(ServiceId::Registers, true);
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn process_events(&mut self) {
        while let Ok(info) = self.channels.events.try_receive() {
            self.submit(info, Instant::now().as_micros());
        }
    }

    fn report(&mut self, event: SupervisorEvent) {
        self.submit(event.info(), Instant::now().as_micros());
    }

    fn submit(&mut self, info: &'static EventInfo, timestamp_us: u64) {
        if self.server_connected {
            self.dispatch(info, timestamp_us);
        } else if self.backlog.push(info, timestamp_us) {
            warn!("offline backlog full, dropped oldest event");
            self.backlog_overflowed = true;
        }
    }

    fn dispatch(&mut self, info: &'static EventInfo, timestamp_us: u64) {
        match self.aggregator.classify(info, timestamp_us) {
            Classified::Error(report) => {
                self.queue_status(report.domain);
                self.channels.command.set(CommandEvents::SEND_STATUS_CHANGE);
                if report.domain == Domain::Device && self.state == SystemState::Normal {
                    self.change_state(SystemState::Error);
                }
            }
            Classified::Warning(alert) | Classified::Info(alert) => {
                if self.channels.send_alerts.try_send(alert).is_err() {
                    warn!("alert queue full, dropping 0x{:04X}", info.code_number());
                }
                self.channels.command.set(CommandEvents::SEND_ALERT);
            }
            Classified::None => {}
        }
    }

    fn flush_backlog(&mut self) {
        if !self.backlog.is_empty() {
            info!("replaying {} offline events", self.backlog.len());
        }
        while let Some(pending) = self.backlog.pop() {
            self.dispatch(pending.info, pending.timestamp_us);
        }
        if core::mem::take(&mut self.backlog_overflowed) {
            warn!("offline backlog dropped {} events since boot", self.backlog.dropped());
            self.report(SupervisorEvent::BacklogOverflow);
        }
    }

    fn queue_status(&self, domain: Domain) {
        if self.channels.send_states.try_send(self.aggregator.status(domain)).is_err() {
            warn!("status queue full, dropping {} status", domain.kind());
        }
    }

    fn serve_watchdog(&mut self) {
        self.liveness_counter = self.liveness_counter.wrapping_add(1);
        if self.channels.liveness.system.try_send(self.liveness_counter).is_err() {
            trace!("supervisor liveness slot occupied");
        }
    }

    // ------------------------------------------------------------------
    // Firmware update
    // ------------------------------------------------------------------

    fn on_fw_update_requested(&mut self) {
        info!("firmware update requested");
        self.fw_flags = FirmwareFlags::started();
        self.persist_fw_flags();
        self.report(SupervisorEvent::FwUpdateStarted);
        self.change_state(SystemState::FwUpdate);
    }

    async fn on_erase_needed(&mut self) {
        info!("firmware area erase needed, disconnecting");
        self.channels.command.set(CommandEvents::SERVER_DISCONNECT);
        self.state_before_disconnection = self.state;
        self.server_connected = false;
        self.clear_fw_flags();
        if self.await_erase().await {
            self.report(SupervisorEvent::FwAreaErased);
        } else {
            self.report(SupervisorEvent::FwEraseTimeout);
        }
        self.change_state(SystemState::WaitServer);
    }

    async fn abort_fw_update(&mut self) {
        warn!("aborting firmware update");
        self.channels.command.set(CommandEvents::SERVER_DISCONNECT);
        self.clear_fw_flags();
        self.report(SupervisorEvent::FwUpdateAborted);
        if self.await_erase().await {
            self.report(SupervisorEvent::FwAreaErased);
        } else {
            self.report(SupervisorEvent::FwEraseTimeout);
        }
    }

    /// Ask the updater to erase the update area and wait for confirmation
    async fn await_erase(&mut self) -> bool {
        self.channels
            .fw_update
            .set(FwUpdateEvents::RESET_FW_UPDATE | FwUpdateEvents::ERASE_NEW_FW_SECTOR);
        let timeout = self.config.fw_erase_timeout;
        let erased = self.wait_serving_watchdog(SystemEvents::FW_AREA_ERASED, timeout).await;
        if !erased {
            warn!("firmware area erase not confirmed in time");
        }
        erased
    }

    fn clear_fw_flags(&mut self) {
        self.fw_flags = FirmwareFlags::default();
        self.persist_fw_flags();
    }

    fn persist_fw_flags(&mut self) {
        if let Err(e) = self.fw_flags.store(&mut self.nvm) {
            error!("persisting firmware flags failed: {}", e);
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn sensor(index: usize) -> SensorId {
    SensorId::new(index as u8)
}

/// Supervisor event reporting why the previous boot ended
#[must_use]
pub fn reset_cause(code: FaultCode) -> SupervisorEvent {
    if code.is_watchdog() {
        SupervisorEvent::WatchdogResetDetected
    } else if code == FaultCode::CONNECTION_TIMEOUT {
        SupervisorEvent::ConnectionTimeoutReset
    } else {
        SupervisorEvent::FaultResetDetected
    }
}
