/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The cascade engine: board generation, and the removal, gravity, and refill rules that turn a
//! clear request into a [`TileChangeSet`](crate::types::change_set::TileChangeSet).

pub mod distribution;

pub mod engine;

pub mod generation;

pub use engine::{apply, CascadeEngine, CascadeError, ValidationError};
