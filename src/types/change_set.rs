/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`TileChangeSet`]: the diff produced by one cascade.

use borsh::{BorshDeserialize, BorshSerialize};
use std::collections::HashSet;

use super::{
    checksum::Checksum,
    data_types::{CellPosition, Letter, SequenceNumber, TileId},
};

/// A surviving tile that moves down its column.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FallingTile {
    pub tile_id: TileId,
    pub from: CellPosition,
    pub to: CellPosition,
}

/// A freshly generated tile that fills a vacated cell at the top of a column.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NewTile {
    pub position: CellPosition,
    pub letter: Letter,
    pub points: u32,
    pub id: TileId,
}

/// Minimal description of the effect of one accepted clear request.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TileChangeSet {
    pub removed_positions: Vec<CellPosition>,
    pub falling_tiles: Vec<FallingTile>,
    pub new_tiles: Vec<NewTile>,
    pub sequence_number: SequenceNumber,
    pub resulting_checksum: Checksum,
}

impl TileChangeSet {
    /// Structural checks that can be done without looking at any board other than its dimensions.
    ///
    /// A change set produced by the cascade engine always passes these checks. They exist so that a
    /// change set received from the network can be rejected at the boundary before it touches local
    /// state.
    pub fn check_shape(&self, width: u32, height: u32) -> Result<(), ChangeSetShapeError> {
        let in_bounds = |position: &CellPosition| position.x < width && position.y < height;

        if self.removed_positions.is_empty() {
            return Err(ChangeSetShapeError::NothingRemoved);
        }
        if self.new_tiles.len() != self.removed_positions.len() {
            return Err(ChangeSetShapeError::CountMismatch {
                removed: self.removed_positions.len(),
                new: self.new_tiles.len(),
            });
        }

        let mut removed = HashSet::new();
        for position in &self.removed_positions {
            if !in_bounds(position) {
                return Err(ChangeSetShapeError::OutOfBounds { position: *position });
            }
            if !removed.insert(*position) {
                return Err(ChangeSetShapeError::DuplicatePosition { position: *position });
            }
        }

        let mut destinations = HashSet::new();
        for falling in &self.falling_tiles {
            if !in_bounds(&falling.from) || !in_bounds(&falling.to) {
                return Err(ChangeSetShapeError::OutOfBounds { position: falling.to });
            }
            if falling.from.x != falling.to.x || falling.to.y <= falling.from.y {
                return Err(ChangeSetShapeError::NotFallingDown {
                    tile_id: falling.tile_id,
                });
            }
            if !destinations.insert(falling.to) {
                return Err(ChangeSetShapeError::DuplicatePosition { position: falling.to });
            }
        }

        for new_tile in &self.new_tiles {
            if !in_bounds(&new_tile.position) {
                return Err(ChangeSetShapeError::OutOfBounds {
                    position: new_tile.position,
                });
            }
            if !destinations.insert(new_tile.position) {
                return Err(ChangeSetShapeError::DuplicatePosition {
                    position: new_tile.position,
                });
            }
        }

        Ok(())
    }
}

/// Enumerates the ways in which a received change set can be structurally malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSetShapeError {
    NothingRemoved,
    CountMismatch { removed: usize, new: usize },
    OutOfBounds { position: CellPosition },
    DuplicatePosition { position: CellPosition },
    NotFallingDown { tile_id: TileId },
}
