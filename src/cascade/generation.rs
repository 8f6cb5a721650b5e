/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Generation of fresh boards that are guaranteed to be playable.
//!
//! A board is playable if at least [`GenerationConfiguration::min_words`] distinct words can be
//! traced on it. A word is traced by starting at any cell and repeatedly stepping to one of the up
//! to eight neighbouring cells, never visiting the same cell twice. Whether a string of letters is a
//! word is decided by a [`WordOracle`] supplied by the caller.

use rand::Rng;
use std::collections::BTreeSet;
use std::time::SystemTime;

use crate::events::{Event, GenerateBoardEvent};
use crate::types::{board::Board, checksum::checksum, data_types::CellPosition};

use super::engine::CascadeEngine;

/// Dictionary lookups consumed by board generation.
pub trait WordOracle {
    /// Whether `word` (in upper case) is a valid word.
    fn is_valid_word(&self, word: &str) -> bool;

    /// Whether some valid word starts with `prefix`. Used to prune the search; an oracle that
    /// cannot answer this cheaply should keep the default.
    fn is_valid_prefix(&self, prefix: &str) -> bool {
        let _ = prefix;
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationConfiguration {
    pub width: u32,
    pub height: u32,
    pub min_words: usize,
    pub max_attempts: u32,
    pub min_word_length: usize,
    pub max_word_length: usize,
}

impl Default for GenerationConfiguration {
    fn default() -> Self {
        Self {
            width: 5,
            height: 5,
            min_words: 10,
            max_attempts: 20,
            min_word_length: 3,
            max_word_length: 5,
        }
    }
}

/// Enumerates the ways [`CascadeEngine::generate_board`] can fail. Either way, the match cannot
/// start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    /// Every attempt produced a board with fewer than `min_words` words.
    QuotaNotMet {
        attempts: u32,
        best_word_count: usize,
    },

    /// The configured board has no cells.
    EmptyBoard,
}

impl<R: Rng> CascadeEngine<R> {
    /// Draw boards until one supports `config.min_words` words, or `config.max_attempts` boards
    /// have been drawn.
    pub fn generate_board<O: WordOracle + ?Sized>(
        &mut self,
        config: &GenerationConfiguration,
        oracle: &O,
    ) -> Result<Board, GenerationFailure> {
        let mut best_word_count = 0;
        for attempt in 1..=config.max_attempts {
            let board = self
                .fill_board(config.width, config.height)
                .map_err(|_| GenerationFailure::EmptyBoard)?;
            let words = discoverable_words(
                &board,
                oracle,
                config.min_word_length,
                config.max_word_length,
                config.min_words,
            );

            if words.len() >= config.min_words {
                self.event_publisher()
                    .publish(Event::GenerateBoard(GenerateBoardEvent {
                        timestamp: SystemTime::now(),
                        attempts: attempt,
                        words_found: words.len(),
                        checksum: checksum(&board),
                    }));
                return Ok(board);
            }

            log::debug!(
                "generation attempt {} found {} of {} words",
                attempt,
                words.len(),
                config.min_words
            );
            best_word_count = best_word_count.max(words.len());
        }

        Err(GenerationFailure::QuotaNotMet {
            attempts: config.max_attempts,
            best_word_count,
        })
    }
}

/// Collect the distinct words of length `min_len..=max_len` that can be traced on `board`,
/// stopping once `limit` words have been found.
pub fn discoverable_words<O: WordOracle + ?Sized>(
    board: &Board,
    oracle: &O,
    min_len: usize,
    max_len: usize,
    limit: usize,
) -> BTreeSet<String> {
    let mut search = WordSearch {
        board,
        oracle,
        min_len,
        max_len,
        limit,
        visited: vec![false; board.cell_count()],
        prefix: String::with_capacity(max_len),
        found: BTreeSet::new(),
    };

    if max_len == 0 || limit == 0 {
        return search.found;
    }
    for tile in board.tiles() {
        if search.walk(tile.position) {
            break;
        }
    }
    search.found
}

struct WordSearch<'a, O: WordOracle + ?Sized> {
    board: &'a Board,
    oracle: &'a O,
    min_len: usize,
    max_len: usize,
    limit: usize,
    visited: Vec<bool>,
    prefix: String,
    found: BTreeSet<String>,
}

impl<'a, O: WordOracle + ?Sized> WordSearch<'a, O> {
    // Returns true once the limit has been reached.
    fn walk(&mut self, position: CellPosition) -> bool {
        let index = self.board.index(position);
        self.visited[index] = true;
        self.prefix.push(self.board.tiles()[index].letter.as_char());

        let mut done = false;
        let len = self.prefix.len();
        if len >= self.min_len && self.oracle.is_valid_word(&self.prefix) {
            self.found.insert(self.prefix.clone());
            done = self.found.len() >= self.limit;
        }
        if !done && len < self.max_len && self.oracle.is_valid_prefix(&self.prefix) {
            let board = self.board;
            for neighbour in neighbours(board, position) {
                if !self.visited[board.index(neighbour)] && self.walk(neighbour) {
                    done = true;
                    break;
                }
            }
        }

        self.prefix.pop();
        self.visited[index] = false;
        done
    }
}

fn neighbours(board: &Board, position: CellPosition) -> impl Iterator<Item = CellPosition> + '_ {
    (-1i64..=1)
        .flat_map(|dy| (-1i64..=1).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| dx != 0 || dy != 0)
        .filter_map(move |(dx, dy)| {
            let x = position.x as i64 + dx;
            let y = position.y as i64 + dy;
            if x < 0 || y < 0 {
                return None;
            }
            let neighbour = CellPosition::new(x as u32, y as u32);
            board.contains(neighbour).then_some(neighbour)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        board::Tile,
        data_types::{Letter, TileId},
    };
    use std::collections::HashSet;

    struct Words(HashSet<&'static str>);

    impl WordOracle for Words {
        fn is_valid_word(&self, word: &str) -> bool {
            self.0.contains(word)
        }

        fn is_valid_prefix(&self, prefix: &str) -> bool {
            self.0.iter().any(|word| word.starts_with(prefix))
        }
    }

    struct Everything;

    impl WordOracle for Everything {
        fn is_valid_word(&self, _: &str) -> bool {
            true
        }
    }

    struct Nothing;

    impl WordOracle for Nothing {
        fn is_valid_word(&self, _: &str) -> bool {
            false
        }
    }

    fn board_from_rows(rows: &[&str]) -> Board {
        let mut tiles = Vec::new();
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                let id = TileId::new((y * row.len() + x) as u64);
                let position = CellPosition::new(x as u32, y as u32);
                tiles.push(Tile::new(id, Letter::new(c).unwrap(), 1, position));
            }
        }
        Board::new(rows[0].len() as u32, rows.len() as u32, tiles).unwrap()
    }

    #[test]
    fn traces_words_across_diagonals_without_reuse() {
        let board = board_from_rows(&["CAX", "XTX", "XXX"]);
        let oracle = Words(["CAT", "TAC", "ACT", "TACT"].into_iter().collect());

        let words = discoverable_words(&board, &oracle, 3, 5, usize::MAX);

        // "TACT" would need the T twice.
        assert_eq!(
            words.into_iter().collect::<Vec<_>>(),
            vec!["ACT".to_string(), "CAT".to_string(), "TAC".to_string()]
        );
    }

    #[test]
    fn search_stops_at_the_limit() {
        let board = board_from_rows(&["ABC", "DEF", "GHI"]);
        let words = discoverable_words(&board, &Everything, 3, 3, 4);
        assert_eq!(words.len(), 4);
    }

    #[test]
    fn generation_succeeds_with_a_permissive_oracle() {
        let mut engine = CascadeEngine::seeded(11);
        let board = engine
            .generate_board(&GenerationConfiguration::default(), &Everything)
            .unwrap();
        assert_eq!(board.cell_count(), 25);
        assert_eq!(board.sequence().int(), 0);
    }

    #[test]
    fn generation_fails_after_the_attempt_budget() {
        let mut engine = CascadeEngine::seeded(12);
        let config = GenerationConfiguration {
            max_attempts: 3,
            ..Default::default()
        };
        assert_eq!(
            engine.generate_board(&config, &Nothing),
            Err(GenerationFailure::QuotaNotMet {
                attempts: 3,
                best_word_count: 0
            })
        );
    }

    #[test]
    fn generation_rejects_empty_geometry() {
        let mut engine = CascadeEngine::seeded(13);
        let config = GenerationConfiguration {
            width: 0,
            ..Default::default()
        };
        assert_eq!(
            engine.generate_board(&config, &Everything),
            Err(GenerationFailure::EmptyBoard)
        );
    }
}
