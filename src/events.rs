/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Structured events emitted by the board store, the cascade engine, and observers.
//!
//! Note: an event for a given action indicates that the action has been completed.
//!
//! Every component that emits events holds an [`EventPublisher`]. Publishing an event does two
//! things, both optional:
//! 1. Hands the event to a [`MonitorHandle`], which updates counters, metric windows, and the desync
//!    log synchronously.
//! 2. Sends the event down a channel to the [event bus](crate::event_bus), which runs logging and
//!    user-registered handlers on its own thread.

use std::sync::mpsc::Sender;
use std::time::{Duration, SystemTime};

use crate::monitoring::MonitorHandle;
use crate::networking::messages::RejectionReason;
use crate::types::{
    checksum::Checksum,
    data_types::{BoardId, ConnectionId, SequenceNumber},
};

pub enum Event {
    // Events emitted by the authority.
    GenerateBoard(GenerateBoardEvent),
    ApplyChanges(ApplyChangesEvent),
    RejectMutation(RejectMutationEvent),
    BroadcastChanges(BroadcastChangesEvent),
    SendSnapshot(SendSnapshotEvent),
    // Events emitted by observers while consuming diffs.
    ReceiveChanges(ReceiveChangesEvent),
    ChecksumMismatch(ChecksumMismatchEvent),
    SequenceGap(SequenceGapEvent),
    MalformedChanges(MalformedChangesEvent),
    ReceivePong(ReceivePongEvent),
    // Resync events.
    RequestSnapshot(RequestSnapshotEvent),
    InstallSnapshot(InstallSnapshotEvent),
    DiscardSnapshot(DiscardSnapshotEvent),
    SnapshotTimeout(SnapshotTimeoutEvent),
    UnrecoverableDesync(UnrecoverableDesyncEvent),
    Disconnect(DisconnectEvent),
}

pub struct GenerateBoardEvent {
    pub timestamp: SystemTime,
    pub attempts: u32,
    pub words_found: usize,
    pub checksum: Checksum,
}

pub struct ApplyChangesEvent {
    pub timestamp: SystemTime,
    pub board: BoardId,
    pub sequence_number: SequenceNumber,
    pub removed: usize,
    pub checksum: Checksum,
}

pub struct RejectMutationEvent {
    pub timestamp: SystemTime,
    pub reason: RejectionReason,
}

pub struct BroadcastChangesEvent {
    pub timestamp: SystemTime,
    pub board: BoardId,
    pub sequence_number: SequenceNumber,
    pub recipients: usize,
}

pub struct SendSnapshotEvent {
    pub timestamp: SystemTime,
    pub peer: ConnectionId,
    pub sequence_number: SequenceNumber,
    pub checksum: Checksum,
}

pub struct ReceiveChangesEvent {
    pub timestamp: SystemTime,
    pub connection: ConnectionId,
    pub sequence_number: SequenceNumber,
    /// Time between the authority sending the diff and this observer receiving it.
    pub latency: Duration,
    /// Absolute difference between this latency and the previous one seen by this observer.
    pub variance: Option<Duration>,
}

pub struct ChecksumMismatchEvent {
    pub timestamp: SystemTime,
    pub connection: ConnectionId,
    pub sequence_number: SequenceNumber,
    pub local_checksum: Checksum,
    pub received_checksum: Checksum,
}

pub struct SequenceGapEvent {
    pub timestamp: SystemTime,
    pub connection: ConnectionId,
    pub expected: SequenceNumber,
    pub received: SequenceNumber,
}

pub struct MalformedChangesEvent {
    pub timestamp: SystemTime,
    pub connection: ConnectionId,
    pub sequence_number: SequenceNumber,
    pub reason: String,
}

pub struct ReceivePongEvent {
    pub timestamp: SystemTime,
    pub connection: ConnectionId,
    pub round_trip: Duration,
}

pub struct RequestSnapshotEvent {
    pub timestamp: SystemTime,
    pub connection: ConnectionId,
    /// 0 for the first request of a resync, incremented on every retry.
    pub attempt: u32,
}

pub struct InstallSnapshotEvent {
    pub timestamp: SystemTime,
    pub connection: ConnectionId,
    pub sequence_number: SequenceNumber,
}

pub struct DiscardSnapshotEvent {
    pub timestamp: SystemTime,
    pub connection: ConnectionId,
    pub sequence_number: SequenceNumber,
    pub last_installed: Option<SequenceNumber>,
}

pub struct SnapshotTimeoutEvent {
    pub timestamp: SystemTime,
    pub connection: ConnectionId,
    pub attempt: u32,
    pub timeout: Duration,
}

pub struct UnrecoverableDesyncEvent {
    pub timestamp: SystemTime,
    pub connection: ConnectionId,
    pub attempts: u32,
}

pub struct DisconnectEvent {
    pub timestamp: SystemTime,
    pub connection: ConnectionId,
}

/// Capability through which components emit [`Event`]s. Cheap to clone.
///
/// The default publisher discards everything.
#[derive(Clone, Default)]
pub struct EventPublisher {
    event_bus: Option<Sender<Event>>,
    monitor: Option<MonitorHandle>,
}

impl EventPublisher {
    pub fn new(event_bus: Option<Sender<Event>>, monitor: Option<MonitorHandle>) -> Self {
        Self { event_bus, monitor }
    }

    pub fn to_monitor(monitor: MonitorHandle) -> Self {
        Self::new(None, Some(monitor))
    }

    pub fn to_event_bus(event_bus: Sender<Event>) -> Self {
        Self::new(Some(event_bus), None)
    }

    pub(crate) fn publish(&self, event: Event) {
        if let Some(monitor) = &self.monitor {
            monitor.record(&event);
        }
        if let Some(event_bus) = &self.event_bus {
            // The event bus may already have been shut down, in which case there is nobody left to
            // log the event.
            let _ = event_bus.send(event);
        }
    }
}
