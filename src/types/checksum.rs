/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The board fingerprint shared by the authority and every observer.
//!
//! ## Canonical encoding
//!
//! The bytes fed into the hasher are, in order:
//! 1. The board's width and height, each as a little-endian `u32`.
//! 2. For every tile, visiting cells row-major (top row first, left to right): the tile's letter as a
//!    single ASCII byte, then its points, x, and y, each as a little-endian `u32`.
//!
//! The hash function is SHA-256, provided by the [`sha2`] crate. Tile ids and sequence numbers are
//! not hashed: two boards showing the same letters and points in the same cells have the
//! same checksum regardless of how they came to be.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256 as CryptoHasher};
use std::fmt::{self, Debug, Display, Formatter};

use super::board::Board;

/// A SHA-256 digest of a board's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct Checksum([u8; 32]);

impl Checksum {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD_NO_PAD.encode(self.0)
    }
}

impl Display for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Debug for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_base64())
    }
}

/// Compute the canonical checksum of `board`.
pub fn checksum(board: &Board) -> Checksum {
    let mut hasher = CryptoHasher::new();
    hasher.update(board.width().to_le_bytes());
    hasher.update(board.height().to_le_bytes());
    for tile in board.tiles() {
        hasher.update([tile.letter.byte()]);
        hasher.update(tile.points.to_le_bytes());
        hasher.update(tile.x().to_le_bytes());
        hasher.update(tile.y().to_le_bytes());
    }
    Checksum::new(hasher.finalize().into())
}
