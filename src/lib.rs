/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! An authoritative letter-tile board, and the protocol that keeps every observer's copy of it
//! consistent over an unreliable network.
//!
//! ## Overview
//!
//! The authority owns each board in a [`BoardStore`](board_store::BoardStore). A request to clear
//! tiles is turned by the [cascade engine](cascade) into a
//! [`TileChangeSet`](types::change_set::TileChangeSet): the cleared cells, the tiles that fall into
//! them, and the freshly generated tiles that refill the top of each column. Every change set is
//! tagged with the next sequence number of its board and the [checksum](types::checksum) of the
//! board it produces.
//!
//! The [`BoardServer`](board_server::BoardServer) broadcasts change sets to observers. Each
//! [`BoardObserver`](sync::observer::BoardObserver) applies them to its local copy and compares
//! checksums. On a mismatch or a gap in sequence numbers, it stops applying diffs and requests a full
//! snapshot, retrying with exponential backoff until one arrives or it gives up.
//!
//! Everything of interest is published as an [event](events). Events can be logged through the
//! [event bus](event_bus), and aggregated by a [`Monitor`](monitoring::Monitor), which raises alerts
//! when synchronization is unhealthy.
//!
//! ## Pluggable collaborators
//!
//! The library user supplies:
//! - A [`Network`](networking::network::Network) that carries messages between connections.
//! - A [`WordOracle`](cascade::generation::WordOracle) that decides which strings are words.
//! - A [`Rooms`](board_server::Rooms) implementation that knows which connection looks at which
//!   board.

pub mod board_server;

pub mod board_store;

pub mod cascade;

pub mod config;

pub mod event_bus;

pub mod events;

pub mod logging;

pub mod monitoring;

pub mod networking;

pub mod sync;

pub mod types;
