/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Exhaustive enumerations around every message variant exchanged between the authority and
//! observers.
//!
//! Every message is a variant of a tagged enum, so the receiving end always knows what it is looking
//! at after decoding, and never has to guess from the shape of a payload.

use borsh::{BorshDeserialize, BorshSerialize};
use std::time::SystemTime;

use crate::cascade::engine::{validate_clear_set, ValidationError};
use crate::types::{
    board::Board,
    change_set::TileChangeSet,
    checksum::{checksum, Checksum},
    data_types::{CellPosition, SequenceNumber, TileId},
};

/// All message variants.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Message {
    /// See: [`ClientMessage`].
    ClientMessage(ClientMessage),

    /// See: [`ServerMessage`].
    ServerMessage(ServerMessage),
}

/// Messages sent by an observer to the authority.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum ClientMessage {
    ClearTiles(ClearTiles),
    RequestSnapshot,
    Ping(Ping),
    /// The connection is going away and should no longer receive diffs.
    Leave,
}

/// Messages sent by the authority to observers.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum ServerMessage {
    BoardDiff(BoardDiff),
    Snapshot(BoardSnapshot),
    Rejected(Rejected),
    Pong(Pong),
}

/// A request to clear tiles from the board.
///
/// `expected_tile_ids` lists the id of the tile the requester saw at each of `positions`, in the
/// same order. The request is rejected as stale if any of those tiles has since been cleared or
/// moved by another accepted request.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ClearTiles {
    pub positions: Vec<CellPosition>,
    pub expected_tile_ids: Vec<TileId>,
}

impl ClearTiles {
    /// A request to clear `positions`, expecting each to still hold the tile it holds on `board`.
    pub fn seen_on(board: &Board, positions: Vec<CellPosition>) -> Result<Self, ValidationError> {
        validate_clear_set(board, &positions)?;
        let expected_tile_ids = positions
            .iter()
            .filter_map(|position| board.tile(*position).map(|tile| tile.id))
            .collect();
        Ok(Self {
            positions,
            expected_tile_ids,
        })
    }
}

/// A diff broadcast to every observer of a board.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BoardDiff {
    pub changes: TileChangeSet,
    /// Wall-clock time at which the authority sent the diff, in milliseconds since the Unix Epoch.
    pub sent_at: u64,
}

/// The authority's full board, sent in response to [`ClientMessage::RequestSnapshot`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BoardSnapshot {
    pub board: Board,
    pub sequence_number: SequenceNumber,
    pub checksum: Checksum,
}

impl BoardSnapshot {
    /// Check that the snapshot is internally consistent: the board is full, is at the advertised
    /// sequence number, and hashes to the advertised checksum.
    pub fn is_consistent(&self) -> bool {
        self.board.check_invariant().is_ok()
            && self.board.sequence() == self.sequence_number
            && checksum(&self.board) == self.checksum
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Rejected {
    pub reason: RejectionReason,
}

/// Why a [`ClearTiles`] request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum RejectionReason {
    EmptyClearSet,
    OutOfBounds { position: CellPosition },
    DuplicatePosition { position: CellPosition },
    ExpectedTileCount { positions: u32, expected_tile_ids: u32 },
    Stale { position: CellPosition },
    NoBoard,
}

impl From<&ValidationError> for RejectionReason {
    fn from(value: &ValidationError) -> Self {
        match value {
            ValidationError::EmptyClearSet => RejectionReason::EmptyClearSet,
            ValidationError::OutOfBounds { position, .. } => RejectionReason::OutOfBounds {
                position: *position,
            },
            ValidationError::DuplicatePosition { position } => {
                RejectionReason::DuplicatePosition {
                    position: *position,
                }
            }
            ValidationError::ExpectedTileCount {
                positions,
                expected_tile_ids,
            } => RejectionReason::ExpectedTileCount {
                positions: *positions as u32,
                expected_tile_ids: *expected_tile_ids as u32,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Ping {
    pub nonce: u64,
    /// Milliseconds since the Unix Epoch, echoed back unchanged in the [`Pong`].
    pub sent_at: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Pong {
    pub nonce: u64,
    pub sent_at: u64,
}

impl From<ClientMessage> for Message {
    fn from(value: ClientMessage) -> Self {
        Message::ClientMessage(value)
    }
}

impl From<ServerMessage> for Message {
    fn from(value: ServerMessage) -> Self {
        Message::ServerMessage(value)
    }
}

impl From<ClearTiles> for Message {
    fn from(value: ClearTiles) -> Self {
        Message::ClientMessage(ClientMessage::ClearTiles(value))
    }
}

impl From<Ping> for Message {
    fn from(value: Ping) -> Self {
        Message::ClientMessage(ClientMessage::Ping(value))
    }
}

impl From<BoardDiff> for Message {
    fn from(value: BoardDiff) -> Self {
        Message::ServerMessage(ServerMessage::BoardDiff(value))
    }
}

impl From<BoardSnapshot> for Message {
    fn from(value: BoardSnapshot) -> Self {
        Message::ServerMessage(ServerMessage::Snapshot(value))
    }
}

impl From<Rejected> for Message {
    fn from(value: Rejected) -> Self {
        Message::ServerMessage(ServerMessage::Rejected(value))
    }
}

impl From<Pong> for Message {
    fn from(value: Pong) -> Self {
        Message::ServerMessage(ServerMessage::Pong(value))
    }
}

/// Milliseconds since the Unix Epoch, the unit of [`BoardDiff::sent_at`] and [`Ping::sent_at`].
/// Times before the epoch map to 0.
pub fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
