/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use super::Severity;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DesyncKind {
    ChecksumMismatch,
    SequenceGap,
    MalformedChanges,
    SnapshotTimeout,
    UnrecoverableDesync,
}

impl DesyncKind {
    pub fn severity(&self) -> Severity {
        match self {
            DesyncKind::ChecksumMismatch | DesyncKind::MalformedChanges => Severity::High,
            DesyncKind::SequenceGap | DesyncKind::SnapshotTimeout => Severity::Medium,
            DesyncKind::UnrecoverableDesync => Severity::Critical,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DesyncEvent {
    pub timestamp: SystemTime,
    pub kind: DesyncKind,
    pub severity: Severity,
    pub detail: String,
}

/// Append-only log of desync events. When full, the oldest event is evicted.
#[derive(Clone, Debug)]
pub struct DesyncLog {
    events: VecDeque<DesyncEvent>,
    capacity: usize,
}

impl DesyncLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: DesyncEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &DesyncEvent> {
        self.events.iter()
    }

    /// Events no older than `window` at `now`. Events timestamped after `now` count as recent.
    pub fn recent(&self, now: SystemTime, window: Duration) -> impl Iterator<Item = &DesyncEvent> {
        self.events.iter().filter(move |event| {
            now.duration_since(event.timestamp)
                .map_or(true, |age| age <= window)
        })
    }

    /// The last `n` events, oldest first.
    pub fn last(&self, n: usize) -> Vec<DesyncEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: DesyncKind, secs: u64) -> DesyncEvent {
        DesyncEvent {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            kind,
            severity: kind.severity(),
            detail: String::new(),
        }
    }

    #[test]
    fn old_events_stay_in_the_log_but_are_not_recent() {
        let mut log = DesyncLog::new(10);
        log.push(event(DesyncKind::SequenceGap, 0));
        log.push(event(DesyncKind::ChecksumMismatch, 100));
        log.push(event(DesyncKind::ChecksumMismatch, 130));

        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(150);
        assert_eq!(log.len(), 3);
        assert_eq!(log.recent(now, Duration::from_secs(60)).count(), 2);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut log = DesyncLog::new(2);
        for secs in 0..5 {
            log.push(event(DesyncKind::SnapshotTimeout, secs));
        }
        assert_eq!(log.len(), 2);
        assert_eq!(
            log.iter().next().unwrap().timestamp,
            SystemTime::UNIX_EPOCH + Duration::from_secs(3)
        );
        assert_eq!(log.last(1).len(), 1);
    }
}
