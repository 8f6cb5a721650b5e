/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! State machine that decides when an observer must fetch a full snapshot, and when it may go back
//! to applying diffs.
//!
//! ## States
//!
//! ```text
//!            diff out of order / inconsistency
//!   Synced ─────────────────────────────────────► AwaitingSnapshot ──► Unrecoverable
//!     ▲                                               │    ▲    retries exhausted
//!     └──────────── usable snapshot installed ────────┘    └── timeout: re-request
//! ```
//!
//! - **Synced**: a diff is accepted if and only if its sequence number is exactly one more than the
//!   last known sequence number.
//! - **AwaitingSnapshot**: exactly one snapshot request is outstanding. Diffs are dropped, and
//!   further inconsistencies are coalesced into the outstanding request. If no usable snapshot
//!   arrives within the request's timeout, the request is retried with double the timeout.
//! - **Unrecoverable**: terminal. Every call returns [`UnrecoverableDesync`].
//!
//! ## Discarding snapshots
//!
//! A snapshot is discarded if its sequence number is not greater than that of the last installed
//! snapshot, or less than the last known sequence number. Either way the coordinator stays in its
//! current state.
//!
//! The coordinator never blocks and never reads the clock: callers pass in the current [`Instant`]
//! and call [`tick`](ResyncCoordinator::tick) periodically so that timeouts fire.

use std::time::{Duration, Instant, SystemTime};

use crate::events::{
    DisconnectEvent, DiscardSnapshotEvent, Event, EventPublisher, InstallSnapshotEvent,
    MalformedChangesEvent, RequestSnapshotEvent, SequenceGapEvent, SnapshotTimeoutEvent,
    UnrecoverableDesyncEvent,
};
use crate::types::{
    board::InvariantViolation,
    data_types::{ConnectionId, SequenceNumber},
};

use super::{ConsistencyViolation, MalformedReason, UnrecoverableDesync};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResyncConfiguration {
    /// How long to wait for the first snapshot response. Every retry doubles it.
    pub snapshot_timeout: Duration,
    /// Number of retries after the first request before giving up.
    pub max_snapshot_retries: u32,
}

impl Default for ResyncConfiguration {
    fn default() -> Self {
        Self {
            snapshot_timeout: Duration::from_secs(5),
            max_snapshot_retries: 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    AwaitingSnapshot,
    Unrecoverable,
}

/// What to do with a received diff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffDisposition {
    /// The diff directly follows the local board. Apply and validate it, then call
    /// [`ResyncCoordinator::advance`] if it checks out.
    Apply,
    /// Drop the diff; a snapshot is on its way.
    Ignore,
    /// The diff does not follow the local board. Drop it and perform the action.
    OutOfOrder(ResyncAction),
}

/// Something the caller must send on the coordinator's behalf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResyncAction {
    None,
    SendRequest { attempt: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotDisposition {
    Install,
    Discard,
}

#[derive(Clone, Copy, Debug)]
struct PendingRequest {
    attempt: u32,
    deadline: Instant,
}

pub struct ResyncCoordinator {
    connection: ConnectionId,
    config: ResyncConfiguration,
    state: SyncState,
    last_known_sequence: SequenceNumber,
    last_installed_snapshot: Option<SequenceNumber>,
    pending: Option<PendingRequest>,
    event_publisher: EventPublisher,
}

impl ResyncCoordinator {
    /// A coordinator for a connection whose board is known to be at `last_known_sequence`.
    pub fn new(
        connection: ConnectionId,
        last_known_sequence: SequenceNumber,
        config: ResyncConfiguration,
        event_publisher: EventPublisher,
    ) -> Self {
        Self {
            connection,
            config,
            state: SyncState::Synced,
            last_known_sequence,
            last_installed_snapshot: None,
            pending: None,
            event_publisher,
        }
    }

    /// A coordinator for a connection that has no board yet. The returned action carries the
    /// initial snapshot request.
    pub fn joining(
        connection: ConnectionId,
        config: ResyncConfiguration,
        event_publisher: EventPublisher,
        now: Instant,
    ) -> (Self, ResyncAction) {
        let mut coordinator = Self::new(connection, SequenceNumber::init(), config, event_publisher);
        let action = coordinator.request_snapshot(now);
        (coordinator, action)
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn last_known_sequence(&self) -> SequenceNumber {
        self.last_known_sequence
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Decide what to do with a diff carrying `sequence_number`.
    pub fn on_diff(
        &mut self,
        sequence_number: SequenceNumber,
        now: Instant,
    ) -> Result<DiffDisposition, UnrecoverableDesync> {
        match self.state {
            SyncState::Unrecoverable => Err(self.unrecoverable()),
            SyncState::AwaitingSnapshot => Ok(DiffDisposition::Ignore),
            SyncState::Synced => {
                let violation = match self.last_known_sequence.next() {
                    Some(expected) if sequence_number == expected => {
                        return Ok(DiffDisposition::Apply)
                    }
                    Some(expected) => ConsistencyViolation::SequenceGap {
                        expected,
                        received: sequence_number,
                    },
                    // Nothing can follow the last sequence number.
                    None => ConsistencyViolation::MalformedChanges {
                        sequence_number,
                        reason: MalformedReason::Invariant(InvariantViolation::CounterOverflow),
                    },
                };
                let action = self.report_inconsistency(violation, now)?;
                Ok(DiffDisposition::OutOfOrder(action))
            }
        }
    }

    /// Record that the diff with `sequence_number` was applied and validated.
    pub fn advance(&mut self, sequence_number: SequenceNumber) {
        if self.state == SyncState::Synced
            && self.last_known_sequence.next() == Some(sequence_number)
        {
            self.last_known_sequence = sequence_number;
        }
    }

    /// Start a resync because the local board was found to be inconsistent. Coalesces into the
    /// outstanding request if there is one.
    ///
    /// Gaps and malformed diffs are published here. Checksum mismatches were already published by
    /// the [`SyncValidator`](super::validator::SyncValidator) that found them.
    pub fn report_inconsistency(
        &mut self,
        violation: ConsistencyViolation,
        now: Instant,
    ) -> Result<ResyncAction, UnrecoverableDesync> {
        if self.state == SyncState::Unrecoverable {
            return Err(self.unrecoverable());
        }

        log::debug!("connection {}: {:?}", self.connection, violation);
        match violation {
            ConsistencyViolation::ChecksumMismatch { .. } => (),
            ConsistencyViolation::SequenceGap { expected, received } => self
                .event_publisher
                .publish(Event::SequenceGap(SequenceGapEvent {
                    timestamp: SystemTime::now(),
                    connection: self.connection,
                    expected,
                    received,
                })),
            ConsistencyViolation::MalformedChanges {
                sequence_number,
                reason,
            } => self
                .event_publisher
                .publish(Event::MalformedChanges(MalformedChangesEvent {
                    timestamp: SystemTime::now(),
                    connection: self.connection,
                    sequence_number,
                    reason: format!("{:?}", reason),
                })),
        }

        Ok(self.request_snapshot(now))
    }

    /// Decide whether a received snapshot at `sequence_number` should replace the local board.
    ///
    /// The caller is responsible for checking that the snapshot is internally consistent before
    /// calling this.
    pub fn on_snapshot(
        &mut self,
        sequence_number: SequenceNumber,
    ) -> Result<SnapshotDisposition, UnrecoverableDesync> {
        if self.state == SyncState::Unrecoverable {
            return Err(self.unrecoverable());
        }

        let not_newer = self
            .last_installed_snapshot
            .map_or(false, |installed| sequence_number <= installed);
        if not_newer || sequence_number < self.last_known_sequence {
            self.event_publisher
                .publish(Event::DiscardSnapshot(DiscardSnapshotEvent {
                    timestamp: SystemTime::now(),
                    connection: self.connection,
                    sequence_number,
                    last_installed: self.last_installed_snapshot,
                }));
            return Ok(SnapshotDisposition::Discard);
        }

        self.state = SyncState::Synced;
        self.last_known_sequence = sequence_number;
        self.last_installed_snapshot = Some(sequence_number);
        self.pending = None;
        self.event_publisher
            .publish(Event::InstallSnapshot(InstallSnapshotEvent {
                timestamp: SystemTime::now(),
                connection: self.connection,
                sequence_number,
            }));
        Ok(SnapshotDisposition::Install)
    }

    /// Fire the outstanding request's timeout if it has passed, retrying or giving up.
    pub fn tick(&mut self, now: Instant) -> Result<ResyncAction, UnrecoverableDesync> {
        if self.state == SyncState::Unrecoverable {
            return Err(self.unrecoverable());
        }
        let pending = match self.pending {
            Some(pending) if self.state == SyncState::AwaitingSnapshot && now >= pending.deadline => {
                pending
            }
            _ => return Ok(ResyncAction::None),
        };

        self.event_publisher
            .publish(Event::SnapshotTimeout(SnapshotTimeoutEvent {
                timestamp: SystemTime::now(),
                connection: self.connection,
                attempt: pending.attempt,
                timeout: self.timeout_of(pending.attempt),
            }));

        let attempt = pending.attempt + 1;
        if attempt > self.config.max_snapshot_retries {
            self.state = SyncState::Unrecoverable;
            self.pending = None;
            self.event_publisher
                .publish(Event::UnrecoverableDesync(UnrecoverableDesyncEvent {
                    timestamp: SystemTime::now(),
                    connection: self.connection,
                    attempts: attempt,
                }));
            return Err(self.unrecoverable());
        }

        Ok(self.send_request(attempt, now))
    }

    /// Fail if the connection has given up on resynchronizing.
    pub fn ensure_recoverable(&self) -> Result<(), UnrecoverableDesync> {
        match self.state {
            SyncState::Unrecoverable => Err(self.unrecoverable()),
            _ => Ok(()),
        }
    }

    /// Drop all in-flight state for the connection.
    pub fn disconnect(self) {
        self.event_publisher
            .publish(Event::Disconnect(DisconnectEvent {
                timestamp: SystemTime::now(),
                connection: self.connection,
            }));
    }

    fn request_snapshot(&mut self, now: Instant) -> ResyncAction {
        if self.state != SyncState::Synced {
            return ResyncAction::None;
        }
        self.state = SyncState::AwaitingSnapshot;
        self.send_request(0, now)
    }

    fn send_request(&mut self, attempt: u32, now: Instant) -> ResyncAction {
        self.pending = Some(PendingRequest {
            attempt,
            deadline: now + self.timeout_of(attempt),
        });
        self.event_publisher
            .publish(Event::RequestSnapshot(RequestSnapshotEvent {
                timestamp: SystemTime::now(),
                connection: self.connection,
                attempt,
            }));
        ResyncAction::SendRequest { attempt }
    }

    fn timeout_of(&self, attempt: u32) -> Duration {
        self.config
            .snapshot_timeout
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    fn unrecoverable(&self) -> UnrecoverableDesync {
        UnrecoverableDesync {
            connection: self.connection,
            attempts: self.config.max_snapshot_retries + 1,
        }
    }
}
