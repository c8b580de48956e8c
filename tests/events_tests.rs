//! Tests for event-flag groups and the worker contract

use embassy_futures::block_on;
use embassy_futures::join::join;
use embassy_time::{Duration, Instant, Timer};
use pq_meter_firmware::channels::Channels;
use pq_meter_firmware::events::{
    CommandEvents, EnergyEvents, EventGroup, LedEvents, LivenessRequest, StreamEvents,
    Supervised, SystemEvents, TimeSyncEvents, VarsEvents,
};
use pq_meter_firmware::watchdog::SupervisedTask;
use pq_meter_firmware::worker::{self, WorkerHandle};

// ============================================================================
// Event Group Tests
// ============================================================================

#[test]
fn set_bits_are_level_triggered() {
    let group = EventGroup::<SystemEvents>::new();
    group.set(SystemEvents::CONNECTED);
    group.set(SystemEvents::LINK_LOST);
    assert!(group.contains(SystemEvents::CONNECTED | SystemEvents::LINK_LOST));

    let woke = block_on(group.wait_any(SystemEvents::CONNECTED));
    assert_eq!(woke, SystemEvents::CONNECTED);
    // wait_any leaves bits for the caller to clear
    assert!(group.contains(SystemEvents::CONNECTED));
}

#[test]
fn wait_returns_only_masked_bits() {
    let group = EventGroup::<SystemEvents>::new();
    group.set(SystemEvents::NO_SERVER | SystemEvents::TO_FW_UPDATE);
    let woke = block_on(group.wait_any_and_clear(SystemEvents::NO_SERVER | SystemEvents::CONNECTED));
    assert_eq!(woke, SystemEvents::NO_SERVER);
    assert_eq!(group.get(), SystemEvents::TO_FW_UPDATE);
}

#[test]
fn clear_reports_previously_set_bits() {
    let group = EventGroup::<EnergyEvents>::new();
    group.set(EnergyEvents::START_RAW);
    assert_eq!(
        group.clear(EnergyEvents::START_RAW | EnergyEvents::START_REG),
        EnergyEvents::START_RAW
    );
    assert!(group.clear(EnergyEvents::START_RAW).is_empty());
}

#[test]
fn wait_timeout_expires_without_bits() {
    let group = EventGroup::<SystemEvents>::new();
    let woke = block_on(group.wait_any_timeout(SystemEvents::CONNECTED, Duration::from_millis(5)));
    assert!(woke.is_none());
}

#[test]
fn wait_until_past_deadline_still_sees_set_bits() {
    let group = EventGroup::<SystemEvents>::new();
    group.set(SystemEvents::FW_AREA_ERASED);
    let woke = block_on(group.wait_any_until(SystemEvents::FW_AREA_ERASED, Instant::now()));
    assert_eq!(woke, Some(SystemEvents::FW_AREA_ERASED));
}

#[test]
fn waiter_wakes_when_bit_set_later() {
    let group = EventGroup::<SystemEvents>::new();
    let (woke, ()) = block_on(join(
        group.wait_any_timeout(SystemEvents::TIME_SYNC_FINISHED, Duration::from_millis(500)),
        async {
            Timer::after(Duration::from_millis(2)).await;
            group.set(SystemEvents::TIME_SYNC_FINISHED);
        },
    ));
    assert_eq!(woke, Some(SystemEvents::TIME_SYNC_FINISHED));
}

#[test]
fn every_domain_reserves_bit_31_for_watchdog() {
    assert_eq!(<SystemEvents as Supervised>::WATCHDOG.bits(), 1 << 31);
    assert_eq!(<EnergyEvents as Supervised>::WATCHDOG, EnergyEvents::WATCHDOG);
    assert_eq!(<VarsEvents as Supervised>::WATCHDOG, VarsEvents::WATCHDOG);
    assert_eq!(<StreamEvents as Supervised>::WATCHDOG, StreamEvents::WATCHDOG);
    assert_eq!(<LedEvents as Supervised>::WATCHDOG, LedEvents::WATCHDOG);
}

// ============================================================================
// Worker Handle Tests
// ============================================================================

#[test]
fn acknowledge_without_request_does_nothing() {
    let channels = Channels::new();
    let mut energy = worker::energy(&channels);
    assert!(!energy.acknowledge_watchdog());
    assert_eq!(energy.counter(), 0);
    assert!(channels.liveness.energy.try_receive().is_err());
}

#[test]
fn acknowledge_deposits_token_and_clears_request() {
    let channels = Channels::new();
    let mut led = worker::led(&channels);
    channels.led.set(LedEvents::WATCHDOG);

    assert!(led.acknowledge_watchdog());
    assert!(!channels.led.contains(LedEvents::WATCHDOG));
    assert_eq!(channels.liveness.led.try_receive(), Ok(1));
}

#[test]
fn wait_answers_watchdog_and_returns_work_bits() {
    let channels = Channels::new();
    let mut energy = worker::energy(&channels);
    channels.energy.set(EnergyEvents::WATCHDOG | EnergyEvents::CONFIGURE);

    let bits = block_on(energy.wait(EnergyEvents::CONFIGURE | EnergyEvents::RECONFIGURE));
    assert_eq!(bits, EnergyEvents::CONFIGURE);
    assert_eq!(energy.counter(), 1);
    assert!(channels.liveness.energy.try_receive().is_ok());
    assert!(channels.energy.get().is_empty());
}

#[test]
fn wait_keeps_waiting_after_watchdog_only_wake() {
    let channels = Channels::new();
    let mut handle = worker::time_sync(&channels);
    channels.time_sync.request_liveness();

    let (bits, ()) = block_on(join(
        handle.wait(TimeSyncEvents::DO_SYNC),
        async {
            Timer::after(Duration::from_millis(2)).await;
            channels.time_sync.set(TimeSyncEvents::DO_SYNC);
        },
    ));
    assert_eq!(bits, TimeSyncEvents::DO_SYNC);
    assert_eq!(handle.counter(), 1);
}

#[test]
fn full_liveness_slot_keeps_first_token() {
    let channels = Channels::new();
    let mut command = worker::command(&channels);
    for _ in 0..3 {
        channels.command.set(CommandEvents::WATCHDOG);
        command.acknowledge_watchdog();
    }
    assert_eq!(command.counter(), 3);
    assert_eq!(channels.liveness.command.try_receive(), Ok(1));
}

#[test]
fn vars_and_stream_handles_bind_matching_tasks() {
    let channels = Channels::new();
    let mut fast: WorkerHandle<'_, VarsEvents> =
        worker::vars(&channels, SupervisedTask::FastVars).unwrap();
    channels.fast_vars.set(VarsEvents::WATCHDOG);
    assert!(fast.acknowledge_watchdog());
    assert!(channels.liveness.fast_vars.try_receive().is_ok());
    assert!(channels.liveness.slow_vars.try_receive().is_err());

    let mut slow = worker::stream(&channels, SupervisedTask::SlowStream).unwrap();
    channels.slow_stream.set(StreamEvents::WATCHDOG);
    assert!(slow.acknowledge_watchdog());
    assert!(channels.liveness.slow_stream.try_receive().is_ok());

    assert!(worker::vars(&channels, SupervisedTask::Energy).is_none());
    assert!(worker::stream(&channels, SupervisedTask::FastVars).is_none());
}
