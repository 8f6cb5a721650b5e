/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Alerts raised by threshold evaluation, and the thresholds themselves.

use std::collections::{BTreeMap, VecDeque};
use std::time::SystemTime;

use super::Severity;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertKind {
    HighReceiveLatency,
    HighSyncVariance,
    HighNetworkLatency,
    SlowRender,
    HighResourceUse,
    /// Several checksum mismatches within the retention window.
    MultipleMismatches,
    /// Many desync events of any kind within the retention window.
    FrequentDesyncs,
    UnrecoverableDesync,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub timestamp: SystemTime,
    pub data: BTreeMap<String, f64>,
    pub resolved: bool,
}

/// Bounded list of alerts, oldest first.
///
/// Raising an alert while an unresolved alert of the same kind exists is a no-op. Alerts are only
/// ever resolved through [`AlertList::resolve`].
#[derive(Clone, Debug)]
pub struct AlertList {
    alerts: VecDeque<Alert>,
    capacity: usize,
}

impl AlertList {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            alerts: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `alert` unless it duplicates an unresolved one. Returns whether it was appended.
    pub fn raise(&mut self, alert: Alert) -> bool {
        if self.has_unresolved(alert.kind) {
            return false;
        }
        if self.alerts.len() == self.capacity {
            self.alerts.pop_front();
        }
        self.alerts.push_back(alert);
        true
    }

    pub fn has_unresolved(&self, kind: AlertKind) -> bool {
        self.alerts
            .iter()
            .any(|alert| alert.kind == kind && !alert.resolved)
    }

    /// Mark the alert at `index` (as listed by [`iter`](Self::iter)) resolved. Returns false if
    /// there is no such alert.
    pub fn resolve(&mut self, index: usize) -> bool {
        match self.alerts.get_mut(index) {
            Some(alert) => {
                alert.resolved = true;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

/// Static thresholds compared against window aggregates. Latencies are in milliseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct Thresholds {
    /// p95 of board-receive latency.
    pub receive_latency_p95: f64,
    /// p95 of sync variance.
    pub sync_variance_p95: f64,
    /// p95 of ping round trips.
    pub network_latency_p95: f64,
    /// p95 of frame render time.
    pub render_time_p95: f64,
    /// Mean resource use estimate, as a fraction of capacity.
    pub resource_use_mean: f64,
    /// Checksum mismatches within the retention window that raise a critical alert.
    pub critical_mismatches: usize,
    /// Desync events of any kind within the retention window that raise a critical alert.
    pub critical_desyncs: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            receive_latency_p95: 500.0,
            sync_variance_p95: 250.0,
            network_latency_p95: 300.0,
            render_time_p95: 33.0,
            resource_use_mean: 0.9,
            critical_mismatches: 3,
            critical_desyncs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(kind: AlertKind) -> Alert {
        Alert {
            kind,
            severity: Severity::Critical,
            message: String::new(),
            timestamp: SystemTime::UNIX_EPOCH,
            data: BTreeMap::new(),
            resolved: false,
        }
    }

    #[test]
    fn unresolved_alert_suppresses_duplicates_until_resolved() {
        let mut alerts = AlertList::new(10);
        assert!(alerts.raise(alert(AlertKind::MultipleMismatches)));
        assert!(!alerts.raise(alert(AlertKind::MultipleMismatches)));
        assert!(alerts.raise(alert(AlertKind::FrequentDesyncs)));

        assert!(alerts.resolve(0));
        assert!(alerts.raise(alert(AlertKind::MultipleMismatches)));
        assert_eq!(alerts.len(), 3);
        assert!(!alerts.resolve(3));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut alerts = AlertList::new(1);
        alerts.raise(alert(AlertKind::SlowRender));
        alerts.raise(alert(AlertKind::HighResourceUse));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts.iter().next().unwrap().kind, AlertKind::HighResourceUse);
    }
}
