//! Event aggregation
//!
//! Classifies incoming [`EventInfo`]s into ERROR / WARNING / INFO / NONE,
//! rate-limits repeated non-error alerts, keeps a newest-first error history
//! per domain and builds the status and alert payloads the command worker
//! publishes.

use core::fmt::Write as _;

use heapless::{LinearMap, String, Vec};

use crate::channels::Channels;
use crate::config::{
    ALERT_DEDUP_WINDOW_US, DEDUP_TRACKED_CODES, MAX_ERROR_CODES, MAX_SENSORS, SERVICES_PER_SENSOR,
    SOURCE_NAME_LEN,
};
use crate::error_codes::{codes, ErrorCode};
use crate::events::{EventInfo, SystemEvents};
use crate::types::{Domain, DomainHealth, Severity};

/// Bounded newest-first history of error codes
///
/// Once full, recording a new code drops the oldest; the count saturates
/// at [`MAX_ERROR_CODES`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorCodeRing {
    codes: Vec<&'static ErrorCode, MAX_ERROR_CODES>,
}

impl ErrorCodeRing {
    /// Empty ring
    #[must_use]
    pub const fn new() -> Self {
        Self { codes: Vec::new() }
    }

    /// Prepend `code`, dropping the oldest entry if the ring is full
    pub fn push(&mut self, code: &'static ErrorCode) {
        if self.codes.is_full() {
            self.codes.pop();
        }
        // Cannot fail: a slot was freed above if needed.
        let _ = self.codes.insert(0, code);
    }

    /// Codes, newest first
    #[must_use]
    pub fn codes(&self) -> &[&'static ErrorCode] {
        &self.codes
    }

    /// Number of recorded codes
    #[must_use]
    pub fn count(&self) -> usize {
        self.codes.len()
    }
}

#[derive(Clone, Debug, Default)]
struct DomainRecord {
    ring: ErrorCodeRing,
    health: DomainHealth,
}

/// Alert payload for WARNING and INFO events
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    /// WARNING or INFO
    pub severity: Severity,
    /// Domain the alert concerns
    pub domain: Domain,
    /// Human-readable source, e.g. `sensor0/waveform`
    pub source: String<SOURCE_NAME_LEN>,
    /// Catalog entry
    pub code: &'static ErrorCode,
    /// Monotonic timestamp in microseconds
    pub timestamp_us: u64,
}

/// Result of recording an ERROR event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorReport {
    /// Domain whose history was updated
    pub domain: Domain,
    /// Catalog entry recorded
    pub code: &'static ErrorCode,
}

/// Classification of one event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classified {
    /// Recorded into a domain history
    Error(ErrorReport),
    /// Warning to publish
    Warning(Alert),
    /// Info to publish
    Info(Alert),
    /// Nothing to publish (no severity, or suppressed duplicate)
    None,
}

impl Classified {
    /// Effective severity after classification
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Error(_) => Severity::Error,
            Self::Warning(_) => Severity::Warning,
            Self::Info(_) => Severity::Info,
            Self::None => Severity::None,
        }
    }
}

/// Owned snapshot of a domain's status, safe to queue across tasks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainStatus {
    /// Domain described
    pub domain: Domain,
    /// Current health
    pub health: DomainHealth,
    /// Error history, newest first
    pub history: Vec<&'static ErrorCode, MAX_ERROR_CODES>,
}

/// Per-domain error history, health and alert de-duplication
#[derive(Clone, Debug)]
pub struct Aggregator {
    device: DomainRecord,
    sensors: [DomainRecord; MAX_SENSORS],
    services: [[DomainRecord; SERVICES_PER_SENSOR]; MAX_SENSORS],
    corrupted: DomainRecord,
    last_seen: LinearMap<u16, u64, DEDUP_TRACKED_CODES>,
}

impl Aggregator {
    /// Empty histories, every domain healthy
    #[must_use]
    pub fn new() -> Self {
        Self {
            device: DomainRecord::default(),
            sensors: core::array::from_fn(|_| DomainRecord::default()),
            services: core::array::from_fn(|_| core::array::from_fn(|_| DomainRecord::default())),
            corrupted: DomainRecord::default(),
            last_seen: LinearMap::new(),
        }
    }

    fn record(&self, domain: Domain) -> &DomainRecord {
        match domain {
            Domain::Device => &self.device,
            Domain::Sensor(s) if s.is_valid() => &self.sensors[s.index()],
            Domain::Service(s, svc) if s.is_valid() => &self.services[s.index()][svc.index()],
            Domain::Sensor(_) | Domain::Service(..) | Domain::Corrupted => &self.corrupted,
        }
    }

    fn record_mut(&mut self, domain: Domain) -> &mut DomainRecord {
        match domain {
            Domain::Device => &mut self.device,
            Domain::Sensor(s) if s.is_valid() => &mut self.sensors[s.index()],
            Domain::Service(s, svc) if s.is_valid() => &mut self.services[s.index()][svc.index()],
            Domain::Sensor(_) | Domain::Service(..) | Domain::Corrupted => &mut self.corrupted,
        }
    }

    /// Classify an event observed at `now_us`
    ///
    /// ERROR events are always recorded into their domain's history and mark
    /// the domain failed. WARNING and INFO events repeating a code seen less
    /// than [`ALERT_DEDUP_WINDOW_US`] ago are suppressed; a suppressed repeat
    /// still counts as the latest occurrence.
    pub fn classify(&mut self, info: &EventInfo, now_us: u64) -> Classified {
        let domain = Domain::from_source(info.source);

        let code = match info.code {
            Some(code) if code.code != 0 => code,
            _ => {
                error!("event without error code from {}", domain.kind());
                return self.record_failure(domain, &codes::NO_ERROR_CODE_SPECIFIED);
            }
        };

        match info.severity {
            Severity::None => Classified::None,
            Severity::Error => self.record_failure(domain, code),
            severity @ (Severity::Warning | Severity::Info) => {
                let repeated = self.is_duplicate(code.code, now_us);
                self.remember(code.code, now_us);
                if repeated {
                    trace!("suppressing repeated alert 0x{:04X}", code.code);
                    return Classified::None;
                }
                let alert = Alert {
                    severity,
                    domain,
                    source: source_name(domain),
                    code,
                    timestamp_us: now_us,
                };
                if severity == Severity::Warning {
                    Classified::Warning(alert)
                } else {
                    Classified::Info(alert)
                }
            }
        }
    }

    fn record_failure(&mut self, domain: Domain, code: &'static ErrorCode) -> Classified {
        self.record_error(domain, code);
        self.record_mut(domain).health = DomainHealth::Failed;
        Classified::Error(ErrorReport { domain, code })
    }

    fn is_duplicate(&self, code: u16, now_us: u64) -> bool {
        self.last_seen
            .get(&code)
            .is_some_and(|&last| now_us.saturating_sub(last) < ALERT_DEDUP_WINDOW_US)
    }

    fn remember(&mut self, code: u16, now_us: u64) {
        if self.last_seen.get(&code).is_none() && self.last_seen.len() == DEDUP_TRACKED_CODES {
            let oldest = self
                .last_seen
                .iter()
                .min_by_key(|(_, at)| **at)
                .map(|(&code, _)| code);
            if let Some(oldest) = oldest {
                self.last_seen.remove(&oldest);
            }
        }
        // Replayed backlog stamps may be older than a live occurrence.
        let at = self.last_seen.get(&code).map_or(now_us, |&last| last.max(now_us));
        let _ = self.last_seen.insert(code, at);
    }

    /// Prepend `code` to `domain`'s history
    pub fn record_error(&mut self, domain: Domain, code: &'static ErrorCode) {
        self.record_mut(domain).ring.push(code);
    }

    /// Read-only view of `domain`'s history, newest first
    #[must_use]
    pub fn get_history(&self, domain: Domain) -> &[&'static ErrorCode] {
        self.record(domain).ring.codes()
    }

    /// Current health of `domain`
    #[must_use]
    pub fn health(&self, domain: Domain) -> DomainHealth {
        self.record(domain).health
    }

    /// Mark `domain` healthy again (its history is kept)
    pub fn mark_healthy(&mut self, domain: Domain) {
        self.record_mut(domain).health = DomainHealth::Ok;
    }

    /// Owned copy of `domain`'s status for the outbound queue
    #[must_use]
    pub fn status(&self, domain: Domain) -> DomainStatus {
        let record = self.record(domain);
        DomainStatus {
            domain,
            health: record.health,
            history: record.ring.codes.clone(),
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn source_name(domain: Domain) -> String<SOURCE_NAME_LEN> {
    let mut name = String::new();
    // Longest name is "sensorNNN/registers", well inside the capacity.
    let _ = match domain {
        Domain::Device => name.push_str("device").map_err(|()| core::fmt::Error),
        Domain::Sensor(s) => write!(name, "sensor{}", s.index()),
        Domain::Service(s, svc) => write!(name, "sensor{}/{}", s.index(), svc.label()),
        Domain::Corrupted => name.push_str("sensor/service").map_err(|()| core::fmt::Error),
    };
    name
}

/// Report `table[index]` to the supervisor
///
/// Events with severity NONE are ignored. Otherwise the descriptor is queued
/// on the cross-task event queue and `EVENT_TO_PROCESS` is raised. A full
/// queue drops the event; that is logged, not returned.
pub fn notify(channels: &Channels, table: &'static [EventInfo], index: usize) {
    let Some(info) = table.get(index) else {
        error!("notify index {} outside table of {}", index, table.len());
        return;
    };
    if info.severity == Severity::None {
        return;
    }
    if channels.events.try_send(info).is_err() {
        warn!("event queue full, dropping 0x{:04X}", info.code_number());
    }
    channels.system.set(SystemEvents::EVENT_TO_PROCESS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SensorId, ServiceId};

    #[test]
    fn source_names() {
        assert_eq!(source_name(Domain::Device).as_str(), "device");
        assert_eq!(source_name(Domain::Sensor(SensorId::new(1))).as_str(), "sensor1");
        assert_eq!(
            source_name(Domain::Service(SensorId::new(0), ServiceId::Registers)).as_str(),
            "sensor0/registers"
        );
        assert_eq!(source_name(Domain::Corrupted).as_str(), "sensor/service");
    }

    #[test]
    fn dedup_table_evicts_oldest_code() {
        let mut agg = Aggregator::new();
        for code in 1..=DEDUP_TRACKED_CODES as u16 {
            agg.remember(code, u64::from(code) * 10);
        }
        agg.remember(999, 5_000);
        assert!(agg.last_seen.get(&1).is_none());
        assert!(agg.last_seen.get(&999).is_some());
        assert_eq!(agg.last_seen.len(), DEDUP_TRACKED_CODES);
    }
}
