/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Removal, gravity, and refill.
//!
//! Main type: [`CascadeEngine`]. Main functions: [`CascadeEngine::compute_changes`] and [`apply`].
//!
//! ## Cascade
//!
//! Each column is processed independently, from the bottom row up:
//! 1. Cleared cells are counted as they are passed.
//! 2. Every surviving tile above a cleared cell falls down by the number of cleared cells below it.
//!    Tiles never pass one another, so the vertical order of survivors is preserved.
//! 3. The top `k` cells of the column, where `k` is the number of cleared cells in it, are filled
//!    with freshly generated tiles, top to bottom, drawn from the engine's
//!    [`LetterDistribution`].
//!
//! `compute_changes` only describes this transformation as a [`TileChangeSet`]. The board passed in
//! is never touched; the next board is materialized by [`apply`].

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;
use std::time::SystemTime;

use crate::events::{Event, EventPublisher, RejectMutationEvent};
use crate::types::{
    board::{Board, InvariantViolation, Tile},
    change_set::{FallingTile, NewTile, TileChangeSet},
    checksum::{checksum, Checksum},
    data_types::{CellPosition, TileId},
};

use super::distribution::LetterDistribution;

pub struct CascadeEngine<R: Rng> {
    distribution: LetterDistribution,
    rng: R,
    event_publisher: EventPublisher,
}

impl CascadeEngine<StdRng> {
    /// An engine with the English distribution whose output is fully determined by `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::new(
            LetterDistribution::english(),
            StdRng::seed_from_u64(seed),
            EventPublisher::default(),
        )
    }

    /// An engine with the English distribution, seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self::new(
            LetterDistribution::english(),
            StdRng::from_entropy(),
            EventPublisher::default(),
        )
    }
}

impl<R: Rng> CascadeEngine<R> {
    pub fn new(distribution: LetterDistribution, rng: R, event_publisher: EventPublisher) -> Self {
        Self {
            distribution,
            rng,
            event_publisher,
        }
    }

    pub fn with_event_publisher(mut self, event_publisher: EventPublisher) -> Self {
        self.event_publisher = event_publisher;
        self
    }

    pub fn distribution(&self) -> &LetterDistribution {
        &self.distribution
    }

    pub(crate) fn event_publisher(&self) -> &EventPublisher {
        &self.event_publisher
    }

    /// Compute the diff that clears `cleared` from `board`.
    ///
    /// # Preconditions
    ///
    /// `cleared` must be non-empty, in bounds, and free of duplicates. Otherwise this returns a
    /// [`ValidationError`] and draws nothing from the engine's random source.
    ///
    /// # Guarantees
    ///
    /// For the returned change set `c`:
    /// - `c.sequence_number` is one more than `board.sequence()`.
    /// - Every falling tile stays in its column and moves strictly down.
    /// - No new tile lands on a cell that a surviving or falling tile occupies afterwards.
    /// - `apply(board, &c)` succeeds and its checksum is `c.resulting_checksum`.
    pub fn compute_changes(
        &mut self,
        board: &Board,
        cleared: &[CellPosition],
    ) -> Result<TileChangeSet, CascadeError> {
        if let Err(error) = validate_clear_set(board, cleared) {
            self.event_publisher
                .publish(Event::RejectMutation(RejectMutationEvent {
                    timestamp: SystemTime::now(),
                    reason: (&error).into(),
                }));
            return Err(error.into());
        }

        let mut is_cleared = vec![false; board.cell_count()];
        for position in cleared {
            is_cleared[board.index(*position)] = true;
        }

        let mut falling_tiles = Vec::new();
        let mut new_tiles = Vec::with_capacity(cleared.len());
        let mut next_tile_id = board.next_tile_id();
        for x in 0..board.width() {
            let mut drop_by = 0;
            for y in (0..board.height()).rev() {
                let from = CellPosition::new(x, y);
                let index = board.index(from);
                if is_cleared[index] {
                    drop_by += 1;
                } else if drop_by > 0 {
                    falling_tiles.push(FallingTile {
                        tile_id: board.tiles()[index].id,
                        from,
                        to: CellPosition::new(x, y + drop_by),
                    });
                }
            }

            for y in 0..drop_by {
                let (letter, points) = self.distribution.sample(&mut self.rng);
                new_tiles.push(NewTile {
                    position: CellPosition::new(x, y),
                    letter,
                    points,
                    id: next_tile_id,
                });
                next_tile_id = next_tile_id
                    .next()
                    .ok_or(InvariantViolation::CounterOverflow)?;
            }
        }

        let sequence_number = board
            .sequence()
            .next()
            .ok_or(InvariantViolation::CounterOverflow)?;
        let mut changes = TileChangeSet {
            removed_positions: cleared.to_vec(),
            falling_tiles,
            new_tiles,
            sequence_number,
            resulting_checksum: Checksum::new([0; 32]),
        };
        changes.resulting_checksum = checksum(&apply(board, &changes)?);

        Ok(changes)
    }

    /// Draw a completely new board from the engine's distribution.
    pub fn fill_board(&mut self, width: u32, height: u32) -> Result<Board, InvariantViolation> {
        let mut tiles = Vec::with_capacity((width as usize) * (height as usize));
        let mut id = TileId::new(0);
        for y in 0..height {
            for x in 0..width {
                let (letter, points) = self.distribution.sample(&mut self.rng);
                tiles.push(Tile::new(id, letter, points, CellPosition::new(x, y)));
                id = id.next().ok_or(InvariantViolation::CounterOverflow)?;
            }
        }
        Board::new(width, height, tiles)
    }
}

/// Produce the board that results from applying `changes` to `board`.
///
/// Removed cells are vacated, then every falling tile is lifted out of its source cell, then every
/// falling tile is dropped into its destination, and finally new tiles fill the remaining holes.
/// Lifting all sources before occupying any destination means the order of `falling_tiles` does not
/// matter.
///
/// Fails if `changes` does not directly follow `board`, if it refers to tiles that are not where it
/// claims, if two tiles would share a cell, or if any cell would be left empty.
pub fn apply(board: &Board, changes: &TileChangeSet) -> Result<Board, InvariantViolation> {
    let sequence_number = board
        .sequence()
        .next()
        .ok_or(InvariantViolation::CounterOverflow)?;
    if changes.sequence_number != sequence_number {
        return Err(InvariantViolation::SequenceMismatch {
            board: board.sequence(),
            changes: changes.sequence_number,
        });
    }

    let in_bounds = |position: CellPosition| {
        if board.contains(position) {
            Ok(board.index(position))
        } else {
            Err(InvariantViolation::TileOutOfBounds { position })
        }
    };

    let mut cells = board.to_cells();
    for position in &changes.removed_positions {
        cells[in_bounds(*position)?] = None;
    }

    let mut lifted = Vec::with_capacity(changes.falling_tiles.len());
    for falling in &changes.falling_tiles {
        let from = in_bounds(falling.from)?;
        let to = in_bounds(falling.to)?;
        match cells[from].take() {
            Some(tile) if tile.id == falling.tile_id => lifted.push((tile, falling.to, to)),
            _ => {
                return Err(InvariantViolation::TileNotFound {
                    tile: falling.tile_id,
                    position: falling.from,
                })
            }
        }
    }
    for (tile, position, index) in lifted {
        if cells[index].is_some() {
            return Err(InvariantViolation::OccupiedCell { position });
        }
        cells[index] = Some(tile.moved_to(position));
    }

    let mut next_tile_id = board.next_tile_id();
    for new_tile in &changes.new_tiles {
        let index = in_bounds(new_tile.position)?;
        if cells[index].is_some() {
            return Err(InvariantViolation::OccupiedCell {
                position: new_tile.position,
            });
        }
        cells[index] = Some(Tile::new(
            new_tile.id,
            new_tile.letter,
            new_tile.points,
            new_tile.position,
        ));
        if new_tile.id >= next_tile_id {
            next_tile_id = new_tile
                .id
                .next()
                .ok_or(InvariantViolation::CounterOverflow)?;
        }
    }

    Board::from_cells(
        board.width(),
        board.height(),
        cells,
        changes.sequence_number,
        next_tile_id,
    )
}

/// Check that `cleared` is a non-empty, in-bounds, duplicate-free set of cells of `board`.
pub fn validate_clear_set(board: &Board, cleared: &[CellPosition]) -> Result<(), ValidationError> {
    if cleared.is_empty() {
        return Err(ValidationError::EmptyClearSet);
    }
    let mut seen = HashSet::with_capacity(cleared.len());
    for position in cleared {
        if !board.contains(*position) {
            return Err(ValidationError::OutOfBounds {
                position: *position,
                width: board.width(),
                height: board.height(),
            });
        }
        if !seen.insert(*position) {
            return Err(ValidationError::DuplicatePosition {
                position: *position,
            });
        }
    }
    Ok(())
}

/// Enumerates the ways a clear request can be malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyClearSet,
    OutOfBounds {
        position: CellPosition,
        width: u32,
        height: u32,
    },
    DuplicatePosition {
        position: CellPosition,
    },
    /// The request does not list exactly one expected tile id per position.
    ExpectedTileCount {
        positions: usize,
        expected_tile_ids: usize,
    },
}

/// Enumerates the different ways a call to [`CascadeEngine::compute_changes`] can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeError {
    /// See: [`ValidationError`].
    ValidationError(ValidationError),

    /// See: [`InvariantViolation`]. Never returned for valid input.
    InvariantViolation(InvariantViolation),
}

impl From<ValidationError> for CascadeError {
    fn from(value: ValidationError) -> Self {
        CascadeError::ValidationError(value)
    }
}

impl From<InvariantViolation> for CascadeError {
    fn from(value: InvariantViolation) -> Self {
        CascadeError::InvariantViolation(value)
    }
}
