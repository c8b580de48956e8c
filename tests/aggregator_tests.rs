//! Tests for event aggregation
//!
//! Classification, alert de-duplication, per-domain error history and the
//! worker-facing `notify` entry point.

use pq_meter_firmware::aggregator::{notify, Aggregator, Classified, ErrorCodeRing};
use pq_meter_firmware::channels::Channels;
use pq_meter_firmware::config::{ALERT_DEDUP_WINDOW_US, EVENT_QUEUE_DEPTH, MAX_ERROR_CODES};
use pq_meter_firmware::error_codes::{codes, ErrorCode, CATALOG};
use pq_meter_firmware::events::{EventInfo, SystemEvents};
use pq_meter_firmware::types::{
    Domain, DomainHealth, EventSource, SensorId, ServiceId, Severity,
};

const S0: SensorId = SensorId::new(0);
const S1: SensorId = SensorId::new(1);

static MISSING_CODE: EventInfo = EventInfo {
    severity: Severity::Warning,
    source: EventSource::Device,
    code: None,
};

static ZERO_CODE: ErrorCode = ErrorCode::new(0, "zero");

static TABLE: [EventInfo; 3] = [
    EventInfo::new(Severity::Warning, EventSource::Sensor(S0), &codes::SENSOR_COMM_FAILURE),
    EventInfo::new(Severity::None, EventSource::Device, &codes::SERVICE_STOPPED),
    EventInfo::new(
        Severity::Error,
        EventSource::Service(S1, ServiceId::Registers),
        &codes::STREAM_PUBLISH_FAILED,
    ),
];

fn error_at(source: EventSource, code: &'static ErrorCode) -> EventInfo {
    EventInfo::new(Severity::Error, source, code)
}

// ============================================================================
// ErrorCodeRing Tests
// ============================================================================

#[test]
fn ring_is_newest_first() {
    let mut ring = ErrorCodeRing::new();
    ring.push(&codes::LINK_LOST);
    ring.push(&codes::SERVER_LOST);
    assert_eq!(ring.count(), 2);
    assert_eq!(ring.codes()[0].code, codes::SERVER_LOST.code);
    assert_eq!(ring.codes()[1].code, codes::LINK_LOST.code);
}

#[test]
fn ring_saturates_and_drops_oldest() {
    let mut ring = ErrorCodeRing::new();
    let pushed: Vec<&'static ErrorCode> = CATALOG.iter().take(MAX_ERROR_CODES + 3).collect();
    for &code in &pushed {
        ring.push(code);
    }
    assert_eq!(ring.count(), MAX_ERROR_CODES);
    let expected: Vec<u16> = pushed.iter().rev().take(MAX_ERROR_CODES).map(|c| c.code).collect();
    let actual: Vec<u16> = ring.codes().iter().map(|c| c.code).collect();
    assert_eq!(actual, expected);
}

// ============================================================================
// Classification Tests
// ============================================================================

#[test]
fn error_is_recorded_at_position_zero() {
    let mut agg = Aggregator::new();
    let domain = Domain::Service(S0, ServiceId::Waveform);
    let info = error_at(EventSource::Service(S0, ServiceId::Waveform), &codes::SAMPLE_OVERRUN);

    let classified = agg.classify(&info, 0);
    assert_eq!(classified.severity(), Severity::Error);
    assert!(matches!(classified, Classified::Error(report) if report.domain == domain));
    assert_eq!(agg.get_history(domain)[0].code, codes::SAMPLE_OVERRUN.code);
    assert_eq!(agg.get_history(domain).len(), 1);
    assert_eq!(agg.health(domain), DomainHealth::Failed);
}

#[test]
fn errors_beyond_capacity_keep_most_recent() {
    let mut agg = Aggregator::new();
    let source = EventSource::Sensor(S1);
    let infos: Vec<EventInfo> = CATALOG
        .iter()
        .take(MAX_ERROR_CODES + 5)
        .map(|code| error_at(source, code))
        .collect();
    for (t, info) in infos.iter().enumerate() {
        agg.classify(info, t as u64);
    }
    let history: Vec<u16> = agg.get_history(Domain::Sensor(S1)).iter().map(|c| c.code).collect();
    let expected: Vec<u16> = infos
        .iter()
        .rev()
        .take(MAX_ERROR_CODES)
        .map(EventInfo::code_number)
        .collect();
    assert_eq!(history, expected);
}

#[test]
fn errors_are_never_deduplicated() {
    let mut agg = Aggregator::new();
    let info = error_at(EventSource::Device, &codes::SENSOR_CONFIG_FAILED);
    agg.classify(&info, 10);
    agg.classify(&info, 11);
    assert_eq!(agg.get_history(Domain::Device).len(), 2);
}

#[test]
fn errors_route_to_their_domain() {
    let mut agg = Aggregator::new();
    agg.classify(&error_at(EventSource::Device, &codes::LINK_LOST), 0);
    agg.classify(&error_at(EventSource::Sensor(S0), &codes::SENSOR_COMM_FAILURE), 0);
    agg.classify(
        &error_at(EventSource::Service(S1, ServiceId::Registers), &codes::SAMPLE_OVERRUN),
        0,
    );
    agg.classify(&error_at(EventSource::Sensor(SensorId::new(9)), &codes::SENSOR_RECONFIG), 0);

    assert_eq!(agg.get_history(Domain::Device)[0].code, codes::LINK_LOST.code);
    assert_eq!(agg.get_history(Domain::Sensor(S0))[0].code, codes::SENSOR_COMM_FAILURE.code);
    assert_eq!(
        agg.get_history(Domain::Service(S1, ServiceId::Registers))[0].code,
        codes::SAMPLE_OVERRUN.code
    );
    assert_eq!(agg.get_history(Domain::Corrupted)[0].code, codes::SENSOR_RECONFIG.code);
    assert!(agg.get_history(Domain::Sensor(S1)).is_empty());
}

#[test]
fn missing_or_zero_code_becomes_synthetic_error() {
    let mut agg = Aggregator::new();
    let classified = agg.classify(&MISSING_CODE, 0);
    assert!(matches!(
        classified,
        Classified::Error(report) if report.code.code == codes::NO_ERROR_CODE_SPECIFIED.code
    ));

    let zero = EventInfo::new(Severity::Info, EventSource::Device, &ZERO_CODE);
    assert_eq!(agg.classify(&zero, 0).severity(), Severity::Error);
    assert_eq!(agg.get_history(Domain::Device).len(), 2);
}

#[test]
fn severity_none_classifies_as_none() {
    let mut agg = Aggregator::new();
    assert_eq!(agg.classify(&TABLE[1], 0), Classified::None);
}

#[test]
fn warning_builds_alert_with_source_name() {
    let mut agg = Aggregator::new();
    let info = EventInfo::new(
        Severity::Warning,
        EventSource::Service(S1, ServiceId::Waveform),
        &codes::SAMPLE_OVERRUN,
    );
    let Classified::Warning(alert) = agg.classify(&info, 42) else {
        panic!("expected a warning");
    };
    assert_eq!(alert.source.as_str(), "sensor1/waveform");
    assert_eq!(alert.timestamp_us, 42);
    assert_eq!(alert.domain, Domain::Service(S1, ServiceId::Waveform));
    assert!(agg.get_history(alert.domain).is_empty());
}

#[test]
fn corrupted_source_is_named_generically() {
    let mut agg = Aggregator::new();
    let info = EventInfo::new(
        Severity::Info,
        EventSource::Sensor(SensorId::new(7)),
        &codes::SENSOR_CONFIGURED,
    );
    let Classified::Info(alert) = agg.classify(&info, 0) else {
        panic!("expected info");
    };
    assert_eq!(alert.source.as_str(), "sensor/service");
    assert_eq!(alert.domain.kind(), "system");
}

// ============================================================================
// De-duplication Tests
// ============================================================================

#[test]
fn repeated_warning_inside_window_is_suppressed() {
    let mut agg = Aggregator::new();
    let info = &TABLE[0];
    assert_eq!(agg.classify(info, 1_000).severity(), Severity::Warning);
    assert_eq!(
        agg.classify(info, 1_000 + ALERT_DEDUP_WINDOW_US - 1),
        Classified::None
    );
}

#[test]
fn repeated_warning_after_window_is_reported() {
    let mut agg = Aggregator::new();
    let info = &TABLE[0];
    assert_eq!(agg.classify(info, 0).severity(), Severity::Warning);
    assert_eq!(
        agg.classify(info, ALERT_DEDUP_WINDOW_US).severity(),
        Severity::Warning
    );
}

#[test]
fn window_runs_from_last_occurrence() {
    let mut agg = Aggregator::new();
    let info = &TABLE[0];
    assert_eq!(agg.classify(info, 0).severity(), Severity::Warning);
    // Each suppressed repeat restarts the window.
    assert_eq!(agg.classify(info, 600_000), Classified::None);
    assert_eq!(agg.classify(info, 1_000_000), Classified::None);
    assert_eq!(agg.classify(info, 1_599_999), Classified::None);
    assert_eq!(agg.classify(info, 2_600_000).severity(), Severity::Warning);
}

#[test]
fn older_replayed_stamp_does_not_rewind_window() {
    let mut agg = Aggregator::new();
    let info = &TABLE[0];
    assert_eq!(agg.classify(info, 5_000_000).severity(), Severity::Warning);
    // Backlog replay carries the original, earlier timestamp.
    assert_eq!(agg.classify(info, 1_000_000), Classified::None);
    assert_eq!(agg.classify(info, 5_000_000 + ALERT_DEDUP_WINDOW_US).severity(), Severity::Warning);
}

#[test]
fn different_codes_do_not_suppress_each_other() {
    let mut agg = Aggregator::new();
    let a = EventInfo::device(Severity::Info, &codes::SERVICE_STARTED);
    let b = EventInfo::device(Severity::Info, &codes::SERVICE_STOPPED);
    assert_eq!(agg.classify(&a, 0).severity(), Severity::Info);
    assert_eq!(agg.classify(&b, 1).severity(), Severity::Info);
}

// ============================================================================
// Status Tests
// ============================================================================

#[test]
fn status_snapshot_copies_history() {
    let mut agg = Aggregator::new();
    agg.record_error(Domain::Sensor(S0), &codes::SENSOR_COMM_FAILURE);
    let status = agg.status(Domain::Sensor(S0));
    agg.record_error(Domain::Sensor(S0), &codes::SENSOR_RECONFIG);

    assert_eq!(status.history.len(), 1);
    assert_eq!(status.health, DomainHealth::Ok);
    assert_eq!(agg.get_history(Domain::Sensor(S0)).len(), 2);
}

#[test]
fn mark_healthy_keeps_history() {
    let mut agg = Aggregator::new();
    agg.classify(&error_at(EventSource::Sensor(S0), &codes::SENSOR_COMM_FAILURE), 0);
    agg.mark_healthy(Domain::Sensor(S0));
    assert_eq!(agg.health(Domain::Sensor(S0)), DomainHealth::Ok);
    assert_eq!(agg.get_history(Domain::Sensor(S0)).len(), 1);
}

// ============================================================================
// Notify Tests
// ============================================================================

#[test]
fn notify_queues_and_raises_event_bit() {
    let channels = Channels::new();
    notify(&channels, &TABLE, 2);
    assert!(channels.system.contains(SystemEvents::EVENT_TO_PROCESS));
    let queued = channels.events.try_receive().unwrap();
    assert_eq!(queued.code_number(), codes::STREAM_PUBLISH_FAILED.code);
}

#[test]
fn notify_ignores_severity_none() {
    let channels = Channels::new();
    notify(&channels, &TABLE, 1);
    assert!(!channels.system.contains(SystemEvents::EVENT_TO_PROCESS));
    assert!(channels.events.try_receive().is_err());
}

#[test]
fn notify_ignores_out_of_range_index() {
    let channels = Channels::new();
    notify(&channels, &TABLE, TABLE.len());
    assert!(channels.system.get().is_empty());
}

#[test]
fn notify_drops_silently_when_queue_full() {
    let channels = Channels::new();
    for _ in 0..EVENT_QUEUE_DEPTH + 4 {
        notify(&channels, &TABLE, 0);
    }
    let mut drained = 0;
    while channels.events.try_receive().is_ok() {
        drained += 1;
    }
    assert_eq!(drained, EVENT_QUEUE_DEPTH);
    assert!(channels.system.contains(SystemEvents::EVENT_TO_PROCESS));
}
