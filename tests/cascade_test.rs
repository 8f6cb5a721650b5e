use log::LevelFilter;

use tile_cascade::{
    board_store::{BoardStore, MutationError, RegenerateError},
    cascade::{
        engine::{apply, CascadeEngine},
        generation::{GenerationConfiguration, GenerationFailure},
    },
    config::Configuration,
    events::EventPublisher,
    networking::messages::ClearTiles,
    sync::coordinator::ResyncConfiguration,
    types::{
        board::{Board, Tile},
        checksum::checksum,
        data_types::{BoardId, CellPosition, Letter, SequenceNumber, TileId},
    },
};

mod common;

use common::{
    dictionary::{NoWords, WordList},
    logging::setup_logger,
};

fn board_from_rows(rows: &[&str]) -> Board {
    let width = rows[0].len();
    let tiles = rows
        .iter()
        .enumerate()
        .flat_map(|(y, row)| {
            row.chars().enumerate().map(move |(x, c)| {
                Tile::new(
                    TileId::new((y * width + x) as u64),
                    Letter::new(c).unwrap(),
                    1,
                    CellPosition::new(x as u32, y as u32),
                )
            })
        })
        .collect();
    Board::new(width as u32, rows.len() as u32, tiles).unwrap()
}

fn column(board: &Board, x: u32) -> String {
    (0..board.height())
        .map(|y| board.tile(CellPosition::new(x, y)).unwrap().letter.as_char())
        .collect()
}

/// Scenario: on a 5x5 board, clearing (1,1), (2,1) and (1,2) drops the tile above each gap and
/// refills the top of columns 1 and 2, leaving the other columns untouched.
#[test]
fn clearing_tiles_drops_survivors_and_refills_from_the_top() {
    setup_logger(LevelFilter::Debug);

    let board = board_from_rows(&["ABCDE", "FGHIJ", "KLMNO", "PQRST", "UVWXY"]);
    let mut engine = CascadeEngine::seeded(42);
    let cleared = [
        CellPosition::new(1, 1),
        CellPosition::new(2, 1),
        CellPosition::new(1, 2),
    ];

    let changes = engine.compute_changes(&board, &cleared).unwrap();
    let next = apply(&board, &changes).unwrap();

    assert_eq!(changes.sequence_number, SequenceNumber::new(1));
    assert_eq!(changes.falling_tiles.len(), 2);
    assert_eq!(changes.new_tiles.len(), 3);
    assert_eq!(checksum(&next), changes.resulting_checksum);

    // B fell from the top of column 1 past G and L; C fell one row past H.
    assert_eq!(&column(&next, 1)[2..], "BQV");
    assert_eq!(&column(&next, 2)[1..], "CMRW");
    for x in [0, 3, 4] {
        assert_eq!(column(&next, x), column(&board, x));
    }
    assert_eq!(next.tile(CellPosition::new(1, 2)).unwrap().id, TileId::new(1));
}

#[test]
fn long_random_play_preserves_the_full_board() {
    setup_logger(LevelFilter::Debug);

    let (generation, _): (GenerationConfiguration, ResyncConfiguration) =
        Configuration::default().into();
    let mut store = BoardStore::generate(
        BoardId::new(1),
        CascadeEngine::seeded(7),
        &GenerationConfiguration {
            min_words: 3,
            max_attempts: 100,
            ..generation
        },
        &WordList::english(),
        EventPublisher::default(),
    )
    .unwrap();

    for round in 0..200u32 {
        let x = round % 5;
        let positions: Vec<CellPosition> = (0..=(round % 3))
            .map(|dy| CellPosition::new(x, (round + dy) % 5))
            .collect();
        let request = ClearTiles::seen_on(store.board(), positions).unwrap();

        let before = store.board().clone();
        let changes = store.submit(&request).unwrap();

        assert_eq!(store.board().cell_count(), 25);
        assert_eq!(store.sequence().int(), round as u64 + 1);
        assert_eq!(&apply(&before, &changes).unwrap(), store.board());
        for falling in &changes.falling_tiles {
            assert_eq!(falling.from.x, falling.to.x);
            assert!(falling.to.y > falling.from.y);
        }
    }
}

#[test]
fn racing_requests_cannot_double_clear() {
    setup_logger(LevelFilter::Debug);

    let mut engine = CascadeEngine::seeded(3);
    let board = engine.fill_board(5, 5).unwrap();
    let mut store = BoardStore::new(BoardId::new(9), board, engine, EventPublisher::default());

    let target = CellPosition::new(2, 4);
    let seen = store.board().tile(target).unwrap().id;
    let request = ClearTiles {
        positions: vec![target],
        expected_tile_ids: vec![seen],
    };

    store.submit(&request).unwrap();
    assert_eq!(
        store.submit(&request),
        Err(MutationError::Stale {
            position: target,
            expected: seen,
            found: store.board().tile(target).unwrap().id,
        })
    );
    assert_eq!(store.sequence(), SequenceNumber::new(1));
}

#[test]
fn generation_gives_up_after_the_attempt_budget() {
    setup_logger(LevelFilter::Debug);

    let config = GenerationConfiguration {
        max_attempts: 5,
        ..Default::default()
    };
    let result = BoardStore::generate(
        BoardId::new(1),
        CascadeEngine::seeded(1),
        &config,
        &NoWords,
        EventPublisher::default(),
    );
    assert!(matches!(
        result,
        Err(GenerationFailure::QuotaNotMet { attempts: 5, .. })
    ));
}

#[test]
fn failed_regeneration_keeps_the_current_board() {
    setup_logger(LevelFilter::Debug);

    let mut engine = CascadeEngine::seeded(4);
    let board = engine.fill_board(5, 5).unwrap();
    let mut store = BoardStore::new(BoardId::new(2), board, engine, EventPublisher::default());
    let before = store.board().clone();

    let config = GenerationConfiguration {
        max_attempts: 3,
        ..Default::default()
    };
    assert!(matches!(
        store.regenerate(&config, &NoWords),
        Err(RegenerateError::Generation(GenerationFailure::QuotaNotMet { attempts: 3, .. }))
    ));
    assert_eq!(store.board(), &before);
    assert_eq!(store.sequence(), SequenceNumber::init());
}
