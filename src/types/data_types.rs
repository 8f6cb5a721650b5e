/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! "Inert" newtypes that are sent around and inspected but have no active behavior.

use borsh::{BorshDeserialize, BorshSerialize};
use std::{
    fmt::{self, Display, Formatter},
    io,
};

/// Identifies one physical tile instance across its whole lifetime, including every fall it takes.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize,
)]
pub struct TileId(u64);

impl TileId {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    /// The id that comes right after this one, or `None` if this is the last id.
    pub const fn next(&self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(int) => Some(Self(int)),
            None => None,
        }
    }
}

impl Display for TileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Per-board counter that totally orders the diffs produced for that board.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize,
)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn init() -> Self {
        Self(0)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    /// The sequence number that comes right after this one, or `None` if this is the last one.
    pub const fn next(&self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(int) => Some(Self(int)),
            None => None,
        }
    }
}

impl Display for SequenceNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Opaque identifier of a viewer connection, handed out by the session layer.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize,
)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Opaque identifier of a board instance (one per match).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize,
)]
pub struct BoardId(u64);

impl BoardId {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for BoardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// An uppercase ASCII letter printed on a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize)]
pub struct Letter(u8);

impl Letter {
    /// Returns `None` if `c` is not an ASCII letter. Lowercase input is uppercased.
    pub fn new(c: char) -> Option<Self> {
        if c.is_ascii_alphabetic() {
            Some(Self(c.to_ascii_uppercase() as u8))
        } else {
            None
        }
    }

    pub const fn byte(&self) -> u8 {
        self.0
    }

    pub const fn as_char(&self) -> char {
        self.0 as char
    }
}

/// Decoding fails on any byte that is not an uppercase ASCII letter.
impl BorshDeserialize for Letter {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let byte = u8::deserialize_reader(reader)?;
        if byte.is_ascii_uppercase() {
            Ok(Self(byte))
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{:#04x} is not an uppercase letter", byte),
            ))
        }
    }
}

impl Display for Letter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A cell on the board. `x` is the column, `y` is the row, and `y == 0` is the top row.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize,
)]
pub struct CellPosition {
    pub x: u32,
    pub y: u32,
}

impl CellPosition {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl Display for CellPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_stop_at_their_maximum() {
        assert_eq!(TileId::new(41).next(), Some(TileId::new(42)));
        assert_eq!(TileId::new(u64::MAX).next(), None);
        assert_eq!(SequenceNumber::init().next(), Some(SequenceNumber::new(1)));
        assert_eq!(SequenceNumber::new(u64::MAX).next(), None);
    }

    #[test]
    fn decoding_a_letter_rejects_other_bytes() {
        let letter = Letter::new('q').unwrap();
        assert_eq!(Letter::try_from_slice(&letter.try_to_vec().unwrap()).unwrap(), letter);

        for byte in [b'q', b'0', b' ', 0x00, 0xC9] {
            assert!(Letter::try_from_slice(&[byte]).is_err(), "{:#04x}", byte);
        }
    }
}
