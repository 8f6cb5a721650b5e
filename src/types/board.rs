/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Board`]: a full grid of lettered [`Tile`]s.
//!
//! ## Full-board invariant
//!
//! Every cell of a `Board` holds exactly one tile. The only way to construct a `Board` is through
//! [`Board::new`] or [`Board::from_cells`], both of which reject partially empty grids, so any
//! `Board` value in the program satisfies the invariant.
//!
//! ## Bookkeeping fields
//!
//! Besides its tiles, a board remembers the [sequence number](SequenceNumber) of the last diff
//! applied to it and the next [tile id](TileId) that may be handed out. Neither field is part of
//! the board's [checksum](super::checksum::checksum), which only covers visible content.

use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt::{self, Display, Formatter};

use super::data_types::{CellPosition, Letter, SequenceNumber, TileId};

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Tile {
    pub id: TileId,
    pub letter: Letter,
    pub points: u32,
    pub position: CellPosition,
}

impl Tile {
    pub fn new(id: TileId, letter: Letter, points: u32, position: CellPosition) -> Self {
        Self {
            id,
            letter,
            points,
            position,
        }
    }

    pub fn x(&self) -> u32 {
        self.position.x
    }

    pub fn y(&self) -> u32 {
        self.position.y
    }

    /// The same physical tile, sitting at `position`.
    pub(crate) fn moved_to(&self, position: CellPosition) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Board {
    width: u32,
    height: u32,
    // Row-major: the tile at (x, y) is at index y * width + x.
    tiles: Vec<Tile>,
    sequence: SequenceNumber,
    next_tile_id: TileId,
}

impl Board {
    /// Build a board from tiles listed in any order.
    ///
    /// The board starts at [`SequenceNumber::init`], and its next tile id is one past the largest id
    /// among `tiles`.
    pub fn new(width: u32, height: u32, tiles: Vec<Tile>) -> Result<Board, InvariantViolation> {
        let mut cells = vec![None; (width as usize) * (height as usize)];
        let mut next_tile_id = TileId::new(0);
        for tile in tiles {
            if tile.x() >= width || tile.y() >= height {
                return Err(InvariantViolation::TileOutOfBounds {
                    position: tile.position,
                });
            }
            let index = (tile.y() * width + tile.x()) as usize;
            if cells[index].is_some() {
                return Err(InvariantViolation::OccupiedCell {
                    position: tile.position,
                });
            }
            if tile.id >= next_tile_id {
                next_tile_id = tile.id.next().ok_or(InvariantViolation::CounterOverflow)?;
            }
            cells[index] = Some(tile);
        }
        Board::from_cells(width, height, cells, SequenceNumber::init(), next_tile_id)
    }

    /// Build a board from row-major `cells`, failing if any cell is empty or if a tile's recorded
    /// position disagrees with the cell it is stored in.
    pub(crate) fn from_cells(
        width: u32,
        height: u32,
        cells: Vec<Option<Tile>>,
        sequence: SequenceNumber,
        next_tile_id: TileId,
    ) -> Result<Board, InvariantViolation> {
        if width == 0 || height == 0 {
            return Err(InvariantViolation::EmptyGeometry);
        }
        if cells.len() != (width as usize) * (height as usize) {
            return Err(InvariantViolation::CellCount {
                expected: (width as usize) * (height as usize),
                found: cells.len(),
            });
        }

        let mut tiles = Vec::with_capacity(cells.len());
        for (index, cell) in cells.into_iter().enumerate() {
            let position = CellPosition::new(index as u32 % width, index as u32 / width);
            match cell {
                Some(tile) if tile.position == position => tiles.push(tile),
                Some(tile) => {
                    return Err(InvariantViolation::MisplacedTile {
                        tile: tile.id,
                        recorded: tile.position,
                        actual: position,
                    })
                }
                None => return Err(InvariantViolation::EmptyCell { position }),
            }
        }

        Ok(Board {
            width,
            height,
            tiles,
            sequence,
            next_tile_id,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells, which is always also the number of tiles.
    pub fn cell_count(&self) -> usize {
        self.tiles.len()
    }

    /// Sequence number of the last diff applied to this board.
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub fn next_tile_id(&self) -> TileId {
        self.next_tile_id
    }

    pub fn contains(&self, position: CellPosition) -> bool {
        position.x < self.width && position.y < self.height
    }

    pub fn tile(&self, position: CellPosition) -> Option<&Tile> {
        if self.contains(position) {
            self.tiles.get(self.index(position))
        } else {
            None
        }
    }

    /// All tiles, row-major.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> {
        self.tiles.chunks(self.width as usize)
    }

    pub(crate) fn index(&self, position: CellPosition) -> usize {
        (position.y * self.width + position.x) as usize
    }

    /// Cells of this board as a mutable scratch grid, for computing the next board.
    pub(crate) fn to_cells(&self) -> Vec<Option<Tile>> {
        self.tiles.iter().cloned().map(Some).collect()
    }

    /// Re-check the full-board invariant. Boards built in this crate always pass; boards decoded
    /// from the wire may not.
    pub fn check_invariant(&self) -> Result<(), InvariantViolation> {
        Board::from_cells(
            self.width,
            self.height,
            self.to_cells(),
            self.sequence,
            self.next_tile_id,
        )
        .map(|_| ())
    }

    /// The same content, renumbered so that it sits at `sequence` in its board's history.
    pub(crate) fn with_sequence(mut self, sequence: SequenceNumber) -> Board {
        self.sequence = sequence;
        self
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let line: String = row.iter().map(|tile| tile.letter.as_char()).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Enumerates the ways in which a would-be board can fail the full-board invariant, or a diff can
/// fail to describe a legal transition of a board.
///
/// On the authority these indicate a bug in the cascade engine and are never recoverable. On an
/// observer they indicate that the local board has diverged from the authority's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The board has zero width or zero height.
    EmptyGeometry,

    /// The grid does not have `width * height` cells.
    CellCount { expected: usize, found: usize },

    /// A cell was left without a tile.
    EmptyCell { position: CellPosition },

    /// Two tiles were placed on the same cell.
    OccupiedCell { position: CellPosition },

    /// A tile's recorded position lies outside of the board.
    TileOutOfBounds { position: CellPosition },

    /// A tile is stored in a cell other than the one it records.
    MisplacedTile {
        tile: TileId,
        recorded: CellPosition,
        actual: CellPosition,
    },

    /// A diff refers to a tile that is not at the position the diff says it is.
    TileNotFound {
        tile: TileId,
        position: CellPosition,
    },

    /// A diff does not directly follow the board it is being applied to.
    SequenceMismatch {
        board: SequenceNumber,
        changes: SequenceNumber,
    },

    /// The board's sequence number or tile ids have run out.
    CounterOverflow,
}
