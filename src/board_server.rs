/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The authority's request loop.
//!
//! A [`BoardServer`] owns the [`BoardStore`] of every board it serves, which makes it the single
//! writer of each of them. It responds to [`ClientMessage`]s as follows:
//! - [`ClearTiles`](ClientMessage::ClearTiles): submit the request to the connection's board. If it
//!   is accepted, broadcast the resulting [`BoardDiff`] to every connection on the board, including
//!   the requester. Otherwise, send the requester a [`Rejected`] message.
//! - [`RequestSnapshot`](ClientMessage::RequestSnapshot): send the requester the full board.
//! - [`Ping`](ClientMessage::Ping): echo it back as a [`Pong`].
//! - [`Leave`](ClientMessage::Leave): remove the connection from its board.
//!
//! Which connection is looking at which board is not the server's business; it asks the library
//! user's [`Rooms`] implementation.

use rand::Rng;
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use crate::board_store::BoardStore;
use crate::events::{BroadcastChangesEvent, Event, EventPublisher, SendSnapshotEvent};
use crate::networking::{
    messages::{
        unix_millis, BoardDiff, ClearTiles, ClientMessage, Pong, Rejected, RejectionReason,
    },
    network::Network,
    receiving::recv_client_message,
    sending::SenderHandle,
};
use crate::types::data_types::{BoardId, ConnectionId};

/// Session bookkeeping consumed by the board server.
pub trait Rooms: Send {
    /// The board `connection` is looking at, if any.
    fn board_of(&self, connection: ConnectionId) -> Option<BoardId>;

    /// Every connection looking at `board`.
    fn connections_on(&self, board: BoardId) -> Vec<ConnectionId>;

    /// Forget `connection`.
    fn leave(&mut self, connection: ConnectionId);
}

pub struct BoardServer<N: Network, R: Rng, S: Rooms> {
    stores: HashMap<BoardId, BoardStore<R>>,
    rooms: S,
    network: N,
    sender: SenderHandle<N>,
    event_publisher: EventPublisher,
}

impl<N: Network, R: Rng, S: Rooms> BoardServer<N, R, S> {
    pub fn new(network: N, rooms: S, event_publisher: EventPublisher) -> Self {
        Self {
            stores: HashMap::new(),
            rooms,
            sender: SenderHandle::new(network.clone()),
            network,
            event_publisher,
        }
    }

    /// Start serving `store`. Replaces any store previously served under the same id.
    pub fn add_board(&mut self, store: BoardStore<R>) {
        self.stores.insert(store.id(), store);
    }

    pub fn store(&self, board: BoardId) -> Option<&BoardStore<R>> {
        self.stores.get(&board)
    }

    /// Mutable access to a served board, e.g. to [regenerate](BoardStore::regenerate) it between
    /// matches.
    pub fn store_mut(&mut self, board: BoardId) -> Option<&mut BoardStore<R>> {
        self.stores.get_mut(&board)
    }

    pub fn rooms(&self) -> &S {
        &self.rooms
    }

    /// Handle every message currently available on the network.
    pub fn poll(&mut self) {
        while let Some((origin, msg)) = recv_client_message(&mut self.network) {
            self.handle(origin, msg);
        }
    }

    /// Handle one message from `origin`.
    pub fn handle(&mut self, origin: ConnectionId, msg: ClientMessage) {
        match msg {
            ClientMessage::ClearTiles(request) => self.on_clear_tiles(origin, request),
            ClientMessage::RequestSnapshot => self.on_request_snapshot(origin),
            ClientMessage::Ping(ping) => self.sender.send(
                origin,
                Pong {
                    nonce: ping.nonce,
                    sent_at: ping.sent_at,
                },
            ),
            ClientMessage::Leave => self.rooms.leave(origin),
        }
    }

    fn on_clear_tiles(&mut self, origin: ConnectionId, request: ClearTiles) {
        let store = match self
            .rooms
            .board_of(origin)
            .and_then(|board| self.stores.get_mut(&board))
        {
            Some(store) => store,
            None => {
                self.sender.send(
                    origin,
                    Rejected {
                        reason: RejectionReason::NoBoard,
                    },
                );
                return;
            }
        };

        match store.submit(&request) {
            Ok(changes) => {
                let board = store.id();
                let sequence_number = changes.sequence_number;
                let recipients = self.rooms.connections_on(board);
                self.sender.broadcast(
                    &recipients,
                    BoardDiff {
                        changes,
                        sent_at: unix_millis(SystemTime::now()),
                    },
                );
                self.event_publisher
                    .publish(Event::BroadcastChanges(BroadcastChangesEvent {
                        timestamp: SystemTime::now(),
                        board,
                        sequence_number,
                        recipients: recipients.len(),
                    }));
            }
            Err(error) => match error.rejection_reason() {
                Some(reason) => self.sender.send(origin, Rejected { reason }),
                None => log::error!(
                    "board {} failed to apply a request from {}: {:?}",
                    store.id(),
                    origin,
                    error
                ),
            },
        }
    }

    fn on_request_snapshot(&mut self, origin: ConnectionId) {
        let store = match self
            .rooms
            .board_of(origin)
            .and_then(|board| self.stores.get(&board))
        {
            Some(store) => store,
            None => {
                self.sender.send(
                    origin,
                    Rejected {
                        reason: RejectionReason::NoBoard,
                    },
                );
                return;
            }
        };

        let snapshot = store.snapshot();
        let (sequence_number, checksum) = (snapshot.sequence_number, snapshot.checksum);
        self.sender.send(origin, snapshot);
        self.event_publisher
            .publish(Event::SendSnapshot(SendSnapshotEvent {
                timestamp: SystemTime::now(),
                peer: origin,
                sequence_number,
                checksum,
            }));
    }
}

impl<N, R, S> BoardServer<N, R, S>
where
    N: Network + 'static,
    R: Rng + Send + 'static,
    S: Rooms + 'static,
{
    /// Serve requests on a new thread until `shutdown_signal` fires or its sender is dropped.
    pub fn start(mut self, shutdown_signal: Receiver<()>) -> JoinHandle<()> {
        thread::spawn(move || loop {
            match shutdown_signal.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => return,
                Err(TryRecvError::Empty) => (),
            }

            if let Some((origin, msg)) = recv_client_message(&mut self.network) {
                self.handle(origin, msg);
            }

            thread::yield_now();
        })
    }
}
