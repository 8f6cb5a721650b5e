/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable networking between the authority and its observers.
//!
//! The library user supplies a type implementing [`Network`](network::Network) that moves
//! [`Message`](messages::Message)s between connections. Transports that carry bytes rather than
//! values can use [`encode`](receiving::encode) and [`decode`](receiving::decode) for the wire form.

pub mod network;

pub mod messages;

pub mod receiving;

pub(crate) mod sending;
