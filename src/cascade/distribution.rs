/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Weighted letter/point distribution used both to fill a fresh board and to refill a board after
//! a cascade.

use rand::Rng;

use crate::types::data_types::Letter;

/// How often a letter is drawn, and what it is worth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LetterWeight {
    pub letter: Letter,
    pub frequency: u32,
    pub points: u32,
}

#[derive(Clone, Debug)]
pub struct LetterDistribution {
    weights: Vec<LetterWeight>,
    total_frequency: u32,
}

// (letter, frequency, points), as in the English-language Scrabble tile set without blanks.
const ENGLISH: [(char, u32, u32); 26] = [
    ('A', 9, 1), ('B', 2, 3), ('C', 2, 3), ('D', 4, 2), ('E', 12, 1), ('F', 2, 4),
    ('G', 3, 2), ('H', 2, 4), ('I', 9, 1), ('J', 1, 8), ('K', 1, 5), ('L', 4, 1),
    ('M', 2, 3), ('N', 6, 1), ('O', 8, 1), ('P', 2, 3), ('Q', 1, 10), ('R', 6, 1),
    ('S', 4, 1), ('T', 6, 1), ('U', 4, 1), ('V', 2, 4), ('W', 2, 4), ('X', 1, 8),
    ('Y', 2, 4), ('Z', 1, 10),
];

impl LetterDistribution {
    /// Returns `None` if no letter has a non-zero frequency.
    pub fn new(weights: Vec<LetterWeight>) -> Option<Self> {
        let total_frequency = weights.iter().map(|weight| weight.frequency).sum();
        if total_frequency == 0 {
            return None;
        }
        Some(Self {
            weights,
            total_frequency,
        })
    }

    pub fn english() -> Self {
        let weights = ENGLISH
            .iter()
            .filter_map(|(c, frequency, points)| {
                Letter::new(*c).map(|letter| LetterWeight {
                    letter,
                    frequency: *frequency,
                    points: *points,
                })
            })
            .collect();
        Self::new(weights).unwrap_or_else(|| unreachable!("the English table is non-empty"))
    }

    /// Draw one letter, with probability proportional to its frequency, together with its points.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> (Letter, u32) {
        let mut remaining = rng.gen_range(0, self.total_frequency);
        for weight in &self.weights {
            if remaining < weight.frequency {
                return (weight.letter, weight.points);
            }
            remaining -= weight.frequency;
        }
        unreachable!("`remaining` is always below the total frequency")
    }

    pub fn points_of(&self, letter: Letter) -> Option<u32> {
        self.weights
            .iter()
            .find(|weight| weight.letter == letter)
            .map(|weight| weight.points)
    }

    pub fn weights(&self) -> &[LetterWeight] {
        &self.weights
    }
}

impl Default for LetterDistribution {
    fn default() -> Self {
        Self::english()
    }
}
