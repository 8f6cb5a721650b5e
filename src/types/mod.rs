/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types shared by the authority and by observers: the board, its diffs, and its fingerprint.

pub mod board;

pub mod change_set;

pub mod checksum;

pub mod data_types;
