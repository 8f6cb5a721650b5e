/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Monitor`], its shared state, and the handle through which events reach it.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use typed_builder::TypedBuilder;

use crate::events::Event;
use crate::logging::{secs_since_unix_epoch, RAISE_ALERT};

use super::{
    alerts::{Alert, AlertKind, AlertList, Thresholds},
    desync_log::{DesyncEvent, DesyncKind, DesyncLog},
    metric_window::{MetricWindow, WindowStats},
    Severity,
};

/// Sizes, intervals, and thresholds of a [`Monitor`].
#[derive(Clone, Debug, TypedBuilder)]
pub struct MonitorConfiguration {
    /// Samples kept per signal.
    #[builder(default = 100)]
    pub window_capacity: usize,
    #[builder(default = 100)]
    pub alert_capacity: usize,
    #[builder(default = 500)]
    pub desync_log_capacity: usize,
    /// Number of most recent desync events included in a [`MonitorReport`].
    #[builder(default = 50)]
    pub report_event_count: usize,
    #[builder(default = Duration::from_secs(5))]
    pub evaluation_interval: Duration,
    /// How far back desync events count towards critical alerts.
    #[builder(default = Duration::from_secs(60))]
    pub retention_window: Duration,
    #[builder(default)]
    pub thresholds: Thresholds,
}

impl Default for MonitorConfiguration {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Sampled signals. Latencies are recorded in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Signal {
    /// Time between the authority sending a diff and an observer receiving it.
    BoardReceiveLatency,
    /// Difference between consecutive board-receive latencies of one observer.
    SyncVariance,
    /// Ping round-trip time.
    NetworkLatency,
    /// Frame render time, reported by the user interface through [`MonitorHandle::record_sample`].
    RenderTime,
    /// Resource use estimate in `[0, 1]`, reported through [`MonitorHandle::record_sample`].
    ResourceUse,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::BoardReceiveLatency,
        Signal::SyncVariance,
        Signal::NetworkLatency,
        Signal::RenderTime,
        Signal::ResourceUse,
    ];
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub boards_generated: u64,
    pub mutations_applied: u64,
    pub validation_failures: u64,
    pub diffs_broadcast: u64,
    pub snapshots_sent: u64,
    pub diffs_received: u64,
    pub checksum_mismatches: u64,
    pub sequence_gaps: u64,
    pub malformed_changes: u64,
    pub resync_requests: u64,
    pub snapshots_installed: u64,
    pub snapshots_discarded: u64,
    pub snapshot_timeouts: u64,
    pub unrecoverable_desyncs: u64,
    pub connection_drops: u64,
}

/// Point-in-time copy of everything the monitor knows.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorReport {
    pub generated_at: SystemTime,
    pub counters: Counters,
    /// Aggregates of every non-empty window.
    pub windows: BTreeMap<Signal, WindowStats>,
    pub alerts: Vec<Alert>,
    pub recent_events: Vec<DesyncEvent>,
}

struct MonitorState {
    config: MonitorConfiguration,
    counters: Counters,
    windows: BTreeMap<Signal, MetricWindow>,
    desync_log: DesyncLog,
    alerts: AlertList,
}

impl MonitorState {
    fn new(config: MonitorConfiguration) -> Self {
        Self {
            windows: Signal::ALL
                .iter()
                .map(|signal| (*signal, MetricWindow::new(config.window_capacity)))
                .collect(),
            desync_log: DesyncLog::new(config.desync_log_capacity),
            alerts: AlertList::new(config.alert_capacity),
            counters: Counters::default(),
            config,
        }
    }

    fn record(&mut self, event: &Event) {
        match event {
            Event::GenerateBoard(_) => self.counters.boards_generated += 1,
            Event::ApplyChanges(_) => self.counters.mutations_applied += 1,
            Event::RejectMutation(_) => self.counters.validation_failures += 1,
            Event::BroadcastChanges(_) => self.counters.diffs_broadcast += 1,
            Event::SendSnapshot(_) => self.counters.snapshots_sent += 1,
            Event::ReceiveChanges(e) => {
                self.counters.diffs_received += 1;
                self.push_sample(Signal::BoardReceiveLatency, millis(e.latency));
                if let Some(variance) = e.variance {
                    self.push_sample(Signal::SyncVariance, millis(variance));
                }
            }
            Event::ReceivePong(e) => self.push_sample(Signal::NetworkLatency, millis(e.round_trip)),
            Event::ChecksumMismatch(e) => {
                self.counters.checksum_mismatches += 1;
                self.record_desync(
                    e.timestamp,
                    DesyncKind::ChecksumMismatch,
                    format!(
                        "connection {} at sequence {}: local {} received {}",
                        e.connection, e.sequence_number, e.local_checksum, e.received_checksum
                    ),
                );
            }
            Event::SequenceGap(e) => {
                self.counters.sequence_gaps += 1;
                self.record_desync(
                    e.timestamp,
                    DesyncKind::SequenceGap,
                    format!(
                        "connection {} expected {} received {}",
                        e.connection, e.expected, e.received
                    ),
                );
            }
            Event::MalformedChanges(e) => {
                self.counters.malformed_changes += 1;
                self.record_desync(
                    e.timestamp,
                    DesyncKind::MalformedChanges,
                    format!(
                        "connection {} at sequence {}: {}",
                        e.connection, e.sequence_number, e.reason
                    ),
                );
            }
            Event::RequestSnapshot(_) => self.counters.resync_requests += 1,
            Event::InstallSnapshot(_) => self.counters.snapshots_installed += 1,
            Event::DiscardSnapshot(_) => self.counters.snapshots_discarded += 1,
            Event::SnapshotTimeout(e) => {
                self.counters.snapshot_timeouts += 1;
                self.record_desync(
                    e.timestamp,
                    DesyncKind::SnapshotTimeout,
                    format!(
                        "connection {} attempt {} after {} ms",
                        e.connection,
                        e.attempt,
                        e.timeout.as_millis()
                    ),
                );
            }
            Event::UnrecoverableDesync(e) => {
                self.counters.unrecoverable_desyncs += 1;
                let detail = format!(
                    "connection {} gave up after {} snapshot requests",
                    e.connection, e.attempts
                );
                self.raise(Alert {
                    kind: AlertKind::UnrecoverableDesync,
                    severity: Severity::Critical,
                    message: detail.clone(),
                    timestamp: e.timestamp,
                    data: BTreeMap::from([("attempts".to_string(), e.attempts as f64)]),
                    resolved: false,
                });
                self.record_desync(e.timestamp, DesyncKind::UnrecoverableDesync, detail);
            }
            Event::Disconnect(_) => self.counters.connection_drops += 1,
        }
    }

    fn push_sample(&mut self, signal: Signal, sample: f64) {
        if let Some(window) = self.windows.get_mut(&signal) {
            window.push(sample);
        }
    }

    fn record_desync(&mut self, timestamp: SystemTime, kind: DesyncKind, detail: String) {
        self.desync_log.push(DesyncEvent {
            timestamp,
            kind,
            severity: kind.severity(),
            detail,
        });
        self.check_desync_frequency(timestamp);
    }

    fn check_desync_frequency(&mut self, now: SystemTime) {
        let window = self.config.retention_window;
        let (mut mismatches, mut desyncs) = (0, 0);
        for event in self.desync_log.recent(now, window) {
            desyncs += 1;
            if event.kind == DesyncKind::ChecksumMismatch {
                mismatches += 1;
            }
        }

        let thresholds = &self.config.thresholds;
        let mut raised = Vec::new();
        if mismatches >= thresholds.critical_mismatches {
            raised.push((
                AlertKind::MultipleMismatches,
                format!("{} checksum mismatches in the last {:?}", mismatches, window),
                mismatches,
            ));
        }
        if desyncs >= thresholds.critical_desyncs {
            raised.push((
                AlertKind::FrequentDesyncs,
                format!("{} desync events in the last {:?}", desyncs, window),
                desyncs,
            ));
        }

        for (kind, message, count) in raised {
            self.raise(Alert {
                kind,
                severity: Severity::Critical,
                message,
                timestamp: now,
                data: BTreeMap::from([
                    ("count".to_string(), count as f64),
                    ("window_secs".to_string(), window.as_secs_f64()),
                ]),
                resolved: false,
            });
        }
    }

    fn evaluate(&mut self, now: SystemTime) {
        let thresholds = self.config.thresholds.clone();
        let checks = [
            (
                Signal::BoardReceiveLatency,
                AlertKind::HighReceiveLatency,
                Severity::High,
                "p95",
                thresholds.receive_latency_p95,
            ),
            (
                Signal::SyncVariance,
                AlertKind::HighSyncVariance,
                Severity::Medium,
                "p95",
                thresholds.sync_variance_p95,
            ),
            (
                Signal::NetworkLatency,
                AlertKind::HighNetworkLatency,
                Severity::Medium,
                "p95",
                thresholds.network_latency_p95,
            ),
            (
                Signal::RenderTime,
                AlertKind::SlowRender,
                Severity::Low,
                "p95",
                thresholds.render_time_p95,
            ),
            (
                Signal::ResourceUse,
                AlertKind::HighResourceUse,
                Severity::Medium,
                "mean",
                thresholds.resource_use_mean,
            ),
        ];

        for (signal, kind, severity, aggregate, threshold) in checks {
            let stats = match self.windows.get(&signal).and_then(MetricWindow::stats) {
                Some(stats) => stats,
                None => continue,
            };
            let value = if aggregate == "mean" {
                stats.mean
            } else {
                stats.p95
            };
            if value > threshold {
                self.raise(Alert {
                    kind,
                    severity,
                    message: format!(
                        "{:?} {} is {:.1}, above {:.1}",
                        signal, aggregate, value, threshold
                    ),
                    timestamp: now,
                    data: BTreeMap::from([
                        (aggregate.to_string(), value),
                        ("threshold".to_string(), threshold),
                        ("samples".to_string(), stats.count as f64),
                    ]),
                    resolved: false,
                });
            }
        }

        self.check_desync_frequency(now);
    }

    fn raise(&mut self, alert: Alert) {
        let kind = alert.kind;
        let severity = alert.severity;
        let timestamp = alert.timestamp;
        let message = alert.message.clone();
        if self.alerts.raise(alert) {
            log::warn!(
                "{}, {}, {:?}, {:?}, {}",
                RAISE_ALERT,
                secs_since_unix_epoch(timestamp),
                kind,
                severity,
                message
            );
        }
    }

    fn report(&self, now: SystemTime) -> MonitorReport {
        MonitorReport {
            generated_at: now,
            counters: self.counters.clone(),
            windows: self
                .windows
                .iter()
                .filter_map(|(signal, window)| window.stats().map(|stats| (*signal, stats)))
                .collect(),
            alerts: self.alerts.iter().cloned().collect(),
            recent_events: self.desync_log.last(self.config.report_event_count),
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Cloneable handle to a monitor's state. Every method holds the state's lock only for the
/// duration of the call.
#[derive(Clone)]
pub struct MonitorHandle {
    state: Arc<Mutex<MonitorState>>,
}

impl MonitorHandle {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        // The state stays usable even if a thread panicked while holding the lock.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Update counters, windows, and the desync log according to `event`.
    pub fn record(&self, event: &Event) {
        self.lock().record(event)
    }

    /// Record a sample that does not arrive through an event, e.g. render time.
    pub fn record_sample(&self, signal: Signal, sample: f64) {
        self.lock().push_sample(signal, sample)
    }

    /// Run a threshold evaluation as if at `now`.
    pub fn evaluate_at(&self, now: SystemTime) {
        self.lock().evaluate(now)
    }

    /// Mark the alert at `index` in [`MonitorReport::alerts`] resolved.
    pub fn resolve_alert(&self, index: usize) -> bool {
        self.lock().alerts.resolve(index)
    }

    pub fn export(&self) -> MonitorReport {
        self.lock().report(SystemTime::now())
    }
}

/// Owns the periodic evaluation thread. Dropping a running monitor stops it.
pub struct Monitor {
    handle: MonitorHandle,
    evaluation_interval: Duration,
    evaluator: Option<(JoinHandle<()>, Sender<()>)>,
}

impl Monitor {
    pub fn new(config: MonitorConfiguration) -> Self {
        Self {
            evaluation_interval: config.evaluation_interval,
            handle: MonitorHandle {
                state: Arc::new(Mutex::new(MonitorState::new(config))),
            },
            evaluator: None,
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.evaluator.is_some()
    }

    /// Start periodic evaluation. Does nothing if it is already running.
    pub fn start(&mut self) {
        if self.evaluator.is_some() {
            return;
        }
        let (shutdown, shutdown_signal) = mpsc::channel();
        let handle = self.handle.clone();
        let interval = self.evaluation_interval;
        let thread = thread::spawn(move || loop {
            match shutdown_signal.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => handle.evaluate_at(SystemTime::now()),
            }
        });
        self.evaluator = Some((thread, shutdown));
    }

    /// Stop periodic evaluation and wait for the evaluator thread to exit.
    pub fn stop(&mut self) {
        if let Some((thread, shutdown)) = self.evaluator.take() {
            let _ = shutdown.send(());
            if thread.join().is_err() {
                log::error!("monitor evaluator thread panicked");
            }
        }
    }

    pub fn export(&self) -> MonitorReport {
        self.handle.export()
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChecksumMismatchEvent, ReceiveChangesEvent, SequenceGapEvent};
    use crate::types::{
        checksum::Checksum,
        data_types::{ConnectionId, SequenceNumber},
    };

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn mismatch(secs: u64) -> Event {
        Event::ChecksumMismatch(ChecksumMismatchEvent {
            timestamp: at(secs),
            connection: ConnectionId::new(1),
            sequence_number: SequenceNumber::new(secs),
            local_checksum: Checksum::new([1; 32]),
            received_checksum: Checksum::new([2; 32]),
        })
    }

    fn gap(secs: u64) -> Event {
        Event::SequenceGap(SequenceGapEvent {
            timestamp: at(secs),
            connection: ConnectionId::new(1),
            expected: SequenceNumber::new(1),
            received: SequenceNumber::new(3),
        })
    }

    fn critical_alerts(report: &MonitorReport) -> Vec<AlertKind> {
        report
            .alerts
            .iter()
            .filter(|alert| alert.severity == Severity::Critical)
            .map(|alert| alert.kind)
            .collect()
    }

    #[test]
    fn scenario_b_four_mismatches_raise_one_critical_alert() {
        let monitor = Monitor::new(MonitorConfiguration::default());
        let handle = monitor.handle();
        for secs in [0, 10, 20, 30] {
            handle.record(&mismatch(secs));
        }
        handle.evaluate_at(at(35));

        let report = monitor.export();
        assert_eq!(report.counters.checksum_mismatches, 4);
        assert_eq!(critical_alerts(&report), vec![AlertKind::MultipleMismatches]);
        assert_eq!(report.recent_events.len(), 4);
    }

    #[test]
    fn desyncs_outside_the_retention_window_do_not_count() {
        let monitor = Monitor::new(MonitorConfiguration::default());
        let handle = monitor.handle();
        handle.record(&mismatch(0));
        handle.record(&mismatch(30));
        handle.record(&mismatch(100));
        assert!(critical_alerts(&handle.export()).is_empty());

        for secs in [101, 102, 103, 104] {
            handle.record(&gap(secs));
        }
        assert_eq!(
            critical_alerts(&handle.export()),
            vec![AlertKind::FrequentDesyncs]
        );
    }

    #[test]
    fn resolved_alert_can_be_raised_again() {
        let monitor = Monitor::new(MonitorConfiguration::default());
        let handle = monitor.handle();
        for secs in 0..3 {
            handle.record(&mismatch(secs));
        }
        assert!(handle.resolve_alert(0));
        handle.record(&mismatch(4));

        let report = handle.export();
        assert_eq!(report.alerts.len(), 2);
        assert!(report.alerts[0].resolved);
        assert!(!report.alerts[1].resolved);
    }

    #[test]
    fn threshold_crossing_raises_an_alert_on_evaluation() {
        let monitor = Monitor::new(MonitorConfiguration::default());
        let handle = monitor.handle();
        for _ in 0..20 {
            handle.record(&Event::ReceiveChanges(ReceiveChangesEvent {
                timestamp: at(0),
                connection: ConnectionId::new(1),
                sequence_number: SequenceNumber::new(1),
                latency: Duration::from_millis(900),
                variance: Some(Duration::from_millis(5)),
            }));
        }
        assert!(handle.export().alerts.is_empty());

        handle.evaluate_at(at(5));
        let report = handle.export();
        let kinds: Vec<AlertKind> = report.alerts.iter().map(|alert| alert.kind).collect();
        assert_eq!(kinds, vec![AlertKind::HighReceiveLatency]);
        assert_eq!(report.windows[&Signal::BoardReceiveLatency].p95, 900.0);
        assert_eq!(report.windows[&Signal::SyncVariance].count, 20);
    }

    #[test]
    fn export_does_not_mutate() {
        let monitor = Monitor::new(MonitorConfiguration::default());
        let handle = monitor.handle();
        handle.record(&mismatch(0));
        handle.record_sample(Signal::RenderTime, 12.0);

        let first = handle.export();
        let second = handle.export();
        assert_eq!(first.counters, second.counters);
        assert_eq!(first.windows, second.windows);
        assert_eq!(first.alerts, second.alerts);
        assert_eq!(first.recent_events, second.recent_events);
    }

    #[test]
    fn start_and_stop() {
        let mut monitor = Monitor::new(
            MonitorConfiguration::builder()
                .evaluation_interval(Duration::from_millis(10))
                .build(),
        );
        monitor.start();
        monitor.start();
        assert!(monitor.is_running());
        monitor
            .handle()
            .record_sample(Signal::ResourceUse, 0.99);
        thread::sleep(Duration::from_millis(100));
        monitor.stop();
        assert!(!monitor.is_running());

        let kinds: Vec<AlertKind> = monitor.export().alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::HighResourceUse]);
    }
}
