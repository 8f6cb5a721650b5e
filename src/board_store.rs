/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The authoritative copy of a single board.
//!
//! A [`BoardStore`] is the only writer of its board. Every accepted clear request replaces the board
//! with the result of applying one [`TileChangeSet`], and the store's sequence number grows by
//! exactly one per accepted request. Requests are processed in the order [`BoardStore::submit`] is
//! called.
//!
//! ## Staleness
//!
//! A [`ClearTiles`] request carries the ids of the tiles its sender saw at each position. If any of
//! those positions holds a different tile by the time the request is processed (because an earlier
//! request cleared or moved it), the request is rejected as [`MutationError::Stale`] and the board is
//! left untouched. A request without one expected id per position is rejected outright.

use rand::Rng;
use std::time::SystemTime;

use crate::cascade::{
    engine::{apply, validate_clear_set, CascadeEngine, CascadeError, ValidationError},
    generation::{GenerationConfiguration, GenerationFailure, WordOracle},
};
use crate::events::{ApplyChangesEvent, Event, EventPublisher, RejectMutationEvent};
use crate::networking::messages::{BoardSnapshot, ClearTiles, RejectionReason};
use crate::types::{
    board::{Board, InvariantViolation},
    change_set::TileChangeSet,
    checksum::checksum,
    data_types::{BoardId, CellPosition, SequenceNumber, TileId},
};

pub struct BoardStore<R: Rng> {
    id: BoardId,
    board: Board,
    engine: CascadeEngine<R>,
    event_publisher: EventPublisher,
}

impl<R: Rng> BoardStore<R> {
    pub fn new(
        id: BoardId,
        board: Board,
        engine: CascadeEngine<R>,
        event_publisher: EventPublisher,
    ) -> Self {
        Self {
            id,
            board,
            engine: engine.with_event_publisher(event_publisher.clone()),
            event_publisher,
        }
    }

    /// Create a store around a freshly generated board.
    pub fn generate<O: WordOracle + ?Sized>(
        id: BoardId,
        engine: CascadeEngine<R>,
        config: &GenerationConfiguration,
        oracle: &O,
        event_publisher: EventPublisher,
    ) -> Result<Self, GenerationFailure> {
        let mut engine = engine.with_event_publisher(event_publisher.clone());
        let board = engine.generate_board(config, oracle)?;
        Ok(Self::new(id, board, engine, event_publisher))
    }

    pub fn id(&self) -> BoardId {
        self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn sequence(&self) -> SequenceNumber {
        self.board.sequence()
    }

    /// Validate `request` against the current board and, if it is accepted, apply the resulting
    /// cascade and return the diff that observers need to follow along.
    pub fn submit(&mut self, request: &ClearTiles) -> Result<TileChangeSet, MutationError> {
        if let Err(error) = self.check_request(request) {
            if let Some(reason) = error.rejection_reason() {
                self.event_publisher
                    .publish(Event::RejectMutation(RejectMutationEvent {
                        timestamp: SystemTime::now(),
                        reason,
                    }));
            }
            return Err(error);
        }

        let changes = self
            .engine
            .compute_changes(&self.board, &request.positions)?;
        let next = apply(&self.board, &changes).map_err(|violation| {
            log::error!(
                "board {} produced a cascade it cannot apply: {:?}",
                self.id,
                violation
            );
            violation
        })?;
        self.board = next;

        self.event_publisher
            .publish(Event::ApplyChanges(ApplyChangesEvent {
                timestamp: SystemTime::now(),
                board: self.id,
                sequence_number: changes.sequence_number,
                removed: changes.removed_positions.len(),
                checksum: changes.resulting_checksum,
            }));

        Ok(changes)
    }

    /// The full current board, for an observer that is joining or resynchronizing.
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            board: self.board.clone(),
            sequence_number: self.board.sequence(),
            checksum: checksum(&self.board),
        }
    }

    /// Swap in a brand new board, e.g. at the start of a new match.
    ///
    /// The new board continues the store's sequence, so observers that still hold the old board see
    /// a gap on the next diff and resynchronize.
    pub fn replace_board(&mut self, board: Board) -> Result<(), InvariantViolation> {
        let sequence = self
            .board
            .sequence()
            .next()
            .ok_or(InvariantViolation::CounterOverflow)?;
        self.board = board.with_sequence(sequence);
        Ok(())
    }

    /// Generate a new board and [replace](Self::replace_board) the current one with it.
    pub fn regenerate<O: WordOracle + ?Sized>(
        &mut self,
        config: &GenerationConfiguration,
        oracle: &O,
    ) -> Result<(), RegenerateError> {
        let board = self.engine.generate_board(config, oracle)?;
        self.replace_board(board)?;
        Ok(())
    }

    fn check_request(&self, request: &ClearTiles) -> Result<(), MutationError> {
        validate_clear_set(&self.board, &request.positions)?;

        if request.expected_tile_ids.len() != request.positions.len() {
            return Err(ValidationError::ExpectedTileCount {
                positions: request.positions.len(),
                expected_tile_ids: request.expected_tile_ids.len(),
            }
            .into());
        }
        for (position, expected) in request.positions.iter().zip(&request.expected_tile_ids) {
            // Positions were checked to be in bounds above.
            if let Some(tile) = self.board.tile(*position) {
                if tile.id != *expected {
                    return Err(MutationError::Stale {
                        position: *position,
                        expected: *expected,
                        found: tile.id,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Enumerates the reasons [`BoardStore::submit`] can refuse a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// See: [`ValidationError`].
    Validation(ValidationError),

    /// The request was computed against a board that has since changed under it.
    Stale {
        position: CellPosition,
        expected: TileId,
        found: TileId,
    },

    /// The cascade engine produced a diff that violates the full-board invariant. This is a bug.
    Invariant(InvariantViolation),
}

impl MutationError {
    /// What the requester should be told, or `None` if the failure is internal.
    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            MutationError::Validation(error) => Some(error.into()),
            MutationError::Stale { position, .. } => Some(RejectionReason::Stale {
                position: *position,
            }),
            MutationError::Invariant(_) => None,
        }
    }
}

impl From<ValidationError> for MutationError {
    fn from(value: ValidationError) -> Self {
        MutationError::Validation(value)
    }
}

impl From<InvariantViolation> for MutationError {
    fn from(value: InvariantViolation) -> Self {
        MutationError::Invariant(value)
    }
}

impl From<CascadeError> for MutationError {
    fn from(value: CascadeError) -> Self {
        match value {
            CascadeError::ValidationError(error) => MutationError::Validation(error),
            CascadeError::InvariantViolation(violation) => MutationError::Invariant(violation),
        }
    }
}

/// Enumerates the reasons [`BoardStore::regenerate`] can fail. The current board is kept in either
/// case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenerateError {
    /// See: [`GenerationFailure`].
    Generation(GenerationFailure),

    /// The store's sequence number has run out.
    Invariant(InvariantViolation),
}

impl From<GenerationFailure> for RegenerateError {
    fn from(value: GenerationFailure) -> Self {
        RegenerateError::Generation(value)
    }
}

impl From<InvariantViolation> for RegenerateError {
    fn from(value: InvariantViolation) -> Self {
        RegenerateError::Invariant(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn store(seed: u64) -> BoardStore<StdRng> {
        let mut engine = CascadeEngine::seeded(seed);
        let board = engine.fill_board(5, 5).unwrap();
        BoardStore::new(BoardId::new(1), board, engine, EventPublisher::default())
    }

    fn seen(store: &BoardStore<StdRng>, positions: &[CellPosition]) -> ClearTiles {
        ClearTiles::seen_on(store.board(), positions.to_vec()).unwrap()
    }

    #[test]
    fn accepted_requests_advance_the_sequence_by_one() {
        let mut store = store(1);
        for expected in 1..=5 {
            let changes = store
                .submit(&seen(&store, &[CellPosition::new(2, 2)]))
                .unwrap();
            assert_eq!(changes.sequence_number, SequenceNumber::new(expected));
            assert_eq!(store.sequence(), SequenceNumber::new(expected));
            assert_eq!(checksum(store.board()), changes.resulting_checksum);
        }
    }

    #[test]
    fn request_computed_against_an_old_board_is_stale() {
        let mut store = store(2);
        let first = seen(&store, &[CellPosition::new(0, 4)]);
        let second = seen(&store, &[CellPosition::new(0, 3)]);

        store.submit(&first).unwrap();
        let before = store.board().clone();

        // The tile that was at (0, 3) fell into (0, 4).
        assert!(matches!(
            store.submit(&second),
            Err(MutationError::Stale { position, .. }) if position == CellPosition::new(0, 3)
        ));
        assert_eq!(store.board(), &before);
    }

    #[test]
    fn mismatched_expectation_count_is_a_validation_error() {
        let mut store = store(3);
        let request = ClearTiles {
            positions: vec![CellPosition::new(0, 0), CellPosition::new(1, 0)],
            expected_tile_ids: vec![TileId::new(0)],
        };
        assert_eq!(
            store.submit(&request),
            Err(MutationError::Validation(ValidationError::ExpectedTileCount {
                positions: 2,
                expected_tile_ids: 1
            }))
        );
        assert_eq!(store.sequence(), SequenceNumber::init());
    }

    #[test]
    fn request_without_expectations_is_refused() {
        let mut store = store(6);
        let request = ClearTiles {
            positions: vec![CellPosition::new(4, 4)],
            expected_tile_ids: Vec::new(),
        };
        assert_eq!(
            store.submit(&request),
            Err(MutationError::Validation(ValidationError::ExpectedTileCount {
                positions: 1,
                expected_tile_ids: 0
            }))
        );
        assert_eq!(store.sequence(), SequenceNumber::init());
    }

    #[test]
    fn snapshot_is_consistent() {
        let mut store = store(4);
        store
            .submit(&seen(&store, &[CellPosition::new(4, 4)]))
            .unwrap();
        let snapshot = store.snapshot();
        assert!(snapshot.is_consistent());
        assert_eq!(snapshot.sequence_number, SequenceNumber::new(1));
    }

    #[test]
    fn replacing_the_board_continues_the_sequence() {
        let mut store = store(5);
        store
            .submit(&seen(&store, &[CellPosition::new(1, 1)]))
            .unwrap();
        let fresh = CascadeEngine::seeded(50).fill_board(5, 5).unwrap();
        store.replace_board(fresh).unwrap();
        assert_eq!(store.sequence(), SequenceNumber::new(2));
    }
}
