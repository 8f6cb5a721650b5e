/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::types::data_types::ConnectionId;

use super::messages::Message;

/// Transport between the authority and observers.
///
/// Delivery may be delayed, reordered, or lossy; the sync protocol recovers from all three. Neither
/// method may block.
pub trait Network: Clone + Send {
    /// Send a message to the specified connection without blocking.
    fn send(&mut self, peer: ConnectionId, message: Message);

    /// Receive a message from any connection. Returns immediately with a None if no message is
    /// available now.
    fn recv(&mut self) -> Option<(ConnectionId, Message)>;

    /// Send the same message to every connection in `peers` without blocking.
    fn broadcast(&mut self, peers: &[ConnectionId], message: Message) {
        for peer in peers {
            self.send(*peer, message.clone());
        }
    }
}
