/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The viewer side of a board: a local copy kept in sync with the authority over a [`Network`].
//!
//! A [`BoardObserver`] is event-driven. The library user feeds it every [`ServerMessage`] received
//! from the authority through [`on_receive_msg`](BoardObserver::on_receive_msg), and calls
//! [`tick`](BoardObserver::tick) periodically so that resync timeouts can fire. Both return
//! [`UnrecoverableDesync`] once the observer has given up, after which the connection should be
//! torn down.

use std::time::{Duration, Instant, SystemTime};

use crate::cascade::engine::apply;
use crate::events::{Event, EventPublisher, ReceiveChangesEvent, ReceivePongEvent};
use crate::networking::{
    messages::{
        unix_millis, BoardDiff, BoardSnapshot, ClearTiles, ClientMessage, Ping, Pong,
        RejectionReason, ServerMessage,
    },
    network::Network,
    receiving::{check_board_diff, recv_server_message},
    sending::SenderHandle,
};
use crate::types::{
    board::Board,
    data_types::{CellPosition, ConnectionId, SequenceNumber},
};

use super::{
    coordinator::{
        DiffDisposition, ResyncAction, ResyncConfiguration, ResyncCoordinator,
        SnapshotDisposition, SyncState,
    },
    validator::{SyncValidator, ValidationContext},
    ConsistencyViolation, MalformedReason, RequestClearError, UnrecoverableDesync,
};

pub struct BoardObserver<N: Network> {
    connection: ConnectionId,
    authority: ConnectionId,
    board: Option<Board>,
    validator: SyncValidator,
    coordinator: ResyncCoordinator,
    sender: SenderHandle<N>,
    network: N,
    event_publisher: EventPublisher,
    last_latency: Option<Duration>,
    last_rejection: Option<RejectionReason>,
    next_nonce: u64,
}

impl<N: Network> BoardObserver<N> {
    /// Start observing a board that this connection has not seen yet. A snapshot request is sent to
    /// `authority` immediately.
    pub fn join(
        connection: ConnectionId,
        authority: ConnectionId,
        network: N,
        config: ResyncConfiguration,
        event_publisher: EventPublisher,
        now: Instant,
    ) -> Self {
        let (coordinator, action) =
            ResyncCoordinator::joining(connection, config, event_publisher.clone(), now);
        let mut observer = Self::assemble(
            connection,
            authority,
            None,
            coordinator,
            network,
            event_publisher,
        );
        observer.perform(action);
        observer
    }

    /// Start observing from a board obtained out of band, e.g. from the response that admitted this
    /// connection to the match.
    pub fn with_board(
        connection: ConnectionId,
        authority: ConnectionId,
        board: Board,
        network: N,
        config: ResyncConfiguration,
        event_publisher: EventPublisher,
    ) -> Self {
        let coordinator =
            ResyncCoordinator::new(connection, board.sequence(), config, event_publisher.clone());
        Self::assemble(
            connection,
            authority,
            Some(board),
            coordinator,
            network,
            event_publisher,
        )
    }

    fn assemble(
        connection: ConnectionId,
        authority: ConnectionId,
        board: Option<Board>,
        coordinator: ResyncCoordinator,
        network: N,
        event_publisher: EventPublisher,
    ) -> Self {
        Self {
            connection,
            authority,
            board,
            validator: SyncValidator::new(event_publisher.clone()),
            coordinator,
            sender: SenderHandle::new(network.clone()),
            network,
            event_publisher,
            last_latency: None,
            last_rejection: None,
            next_nonce: 0,
        }
    }

    /// The local board, or `None` if the first snapshot has not arrived yet.
    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn sync_state(&self) -> SyncState {
        self.coordinator.state()
    }

    pub fn last_known_sequence(&self) -> SequenceNumber {
        self.coordinator.last_known_sequence()
    }

    /// Why the authority refused this connection's most recent rejected clear request.
    pub fn last_rejection(&self) -> Option<RejectionReason> {
        self.last_rejection
    }

    /// Drain every message currently available on the network.
    pub fn poll(&mut self, now: Instant) -> Result<(), UnrecoverableDesync> {
        while let Some((origin, msg)) = recv_server_message(&mut self.network) {
            self.on_receive_msg(origin, msg, now)?;
        }
        Ok(())
    }

    pub fn on_receive_msg(
        &mut self,
        origin: ConnectionId,
        msg: ServerMessage,
        now: Instant,
    ) -> Result<(), UnrecoverableDesync> {
        if origin != self.authority {
            log::debug!(
                "connection {} dropping message from non-authority {}",
                self.connection,
                origin
            );
            return Ok(());
        }

        match msg {
            ServerMessage::BoardDiff(diff) => self.on_receive_diff(diff, now),
            ServerMessage::Snapshot(snapshot) => self.on_receive_snapshot(snapshot),
            ServerMessage::Rejected(rejected) => {
                self.coordinator.ensure_recoverable()?;
                self.last_rejection = Some(rejected.reason);
                Ok(())
            }
            ServerMessage::Pong(pong) => {
                self.coordinator.ensure_recoverable()?;
                self.on_receive_pong(pong);
                Ok(())
            }
        }
    }

    /// Fire resync timeouts.
    pub fn tick(&mut self, now: Instant) -> Result<(), UnrecoverableDesync> {
        let action = self.coordinator.tick(now)?;
        self.perform(action);
        Ok(())
    }

    /// Ask the authority to clear `positions`, expecting each to still hold the tile this observer
    /// sees there. Nothing is sent until the first snapshot has been installed.
    pub fn request_clear(&mut self, positions: Vec<CellPosition>) -> Result<(), RequestClearError> {
        self.coordinator.ensure_recoverable()?;
        let board = self.board.as_ref().ok_or(RequestClearError::NoBoard)?;
        let request = ClearTiles::seen_on(board, positions)?;
        self.sender.send(self.authority, request);
        Ok(())
    }

    /// Send a ping to measure round-trip latency.
    pub fn ping(&mut self) -> Result<(), UnrecoverableDesync> {
        self.coordinator.ensure_recoverable()?;
        let ping = Ping {
            nonce: self.next_nonce,
            sent_at: unix_millis(SystemTime::now()),
        };
        self.next_nonce += 1;
        self.sender.send(self.authority, ping);
        Ok(())
    }

    /// Leave the board. The authority stops sending diffs to this connection.
    pub fn disconnect(mut self) {
        self.sender.send(self.authority, ClientMessage::Leave);
        self.coordinator.disconnect();
    }

    fn on_receive_diff(&mut self, diff: BoardDiff, now: Instant) -> Result<(), UnrecoverableDesync> {
        let sequence_number = diff.changes.sequence_number;
        match self.coordinator.on_diff(sequence_number, now)? {
            DiffDisposition::Ignore => return Ok(()),
            DiffDisposition::OutOfOrder(action) => {
                self.perform(action);
                return Ok(());
            }
            DiffDisposition::Apply => (),
        }

        self.record_latency(&diff, sequence_number);

        let board = match &self.board {
            Some(board) => board,
            None => {
                log::warn!(
                    "connection {} dropping diff {} received before any board",
                    self.connection,
                    sequence_number
                );
                return Ok(());
            }
        };

        if let Err(error) = check_board_diff(&diff, board) {
            let violation = ConsistencyViolation::MalformedChanges {
                sequence_number,
                reason: MalformedReason::Shape(error),
            };
            return self.resync(violation, now);
        }
        let next = match apply(board, &diff.changes) {
            Ok(next) => next,
            Err(violation) => {
                let violation = ConsistencyViolation::MalformedChanges {
                    sequence_number,
                    reason: MalformedReason::Invariant(violation),
                };
                return self.resync(violation, now);
            }
        };

        let context = ValidationContext {
            connection: self.connection,
            sequence_number,
        };
        let result = self
            .validator
            .validate(&next, diff.changes.resulting_checksum, &context);
        if let Some(violation) = result.into_violation(&context) {
            return self.resync(violation, now);
        }

        self.board = Some(next);
        self.coordinator.advance(sequence_number);
        Ok(())
    }

    fn on_receive_snapshot(&mut self, snapshot: BoardSnapshot) -> Result<(), UnrecoverableDesync> {
        self.coordinator.ensure_recoverable()?;
        if !snapshot.is_consistent() {
            log::warn!(
                "connection {} dropping inconsistent snapshot at {}",
                self.connection,
                snapshot.sequence_number
            );
            return Ok(());
        }
        if self.coordinator.on_snapshot(snapshot.sequence_number)? == SnapshotDisposition::Install {
            self.board = Some(snapshot.board);
        }
        Ok(())
    }

    fn on_receive_pong(&mut self, pong: Pong) {
        let round_trip = unix_millis(SystemTime::now()).saturating_sub(pong.sent_at);
        self.event_publisher
            .publish(Event::ReceivePong(ReceivePongEvent {
                timestamp: SystemTime::now(),
                connection: self.connection,
                round_trip: Duration::from_millis(round_trip),
            }));
    }

    fn record_latency(&mut self, diff: &BoardDiff, sequence_number: SequenceNumber) {
        let latency =
            Duration::from_millis(unix_millis(SystemTime::now()).saturating_sub(diff.sent_at));
        let variance = self.last_latency.map(|last| {
            if latency > last {
                latency - last
            } else {
                last - latency
            }
        });
        self.last_latency = Some(latency);
        self.event_publisher
            .publish(Event::ReceiveChanges(ReceiveChangesEvent {
                timestamp: SystemTime::now(),
                connection: self.connection,
                sequence_number,
                latency,
                variance,
            }));
    }

    fn resync(
        &mut self,
        violation: ConsistencyViolation,
        now: Instant,
    ) -> Result<(), UnrecoverableDesync> {
        let action = self.coordinator.report_inconsistency(violation, now)?;
        self.perform(action);
        Ok(())
    }

    fn perform(&mut self, action: ResyncAction) {
        if let ResyncAction::SendRequest { .. } = action {
            self.sender
                .send(self.authority, ClientMessage::RequestSnapshot);
        }
    }
}
