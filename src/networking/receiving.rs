/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions for receiving messages from the network, and for checking them at the boundary before
//! they are handed to the board store or an observer.

use std::io;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{board::Board, change_set::ChangeSetShapeError, data_types::ConnectionId};

use super::{
    messages::{BoardDiff, ClientMessage, Message, ServerMessage},
    network::Network,
};

/// Largest encoded message [`decode`] will attempt to parse.
pub const MAX_MESSAGE_LEN: usize = 1 << 20;

/// Serialize `message` into its wire form.
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    message.try_to_vec().map_err(CodecError::Encode)
}

/// Parse a message from its wire form. Trailing bytes, unknown variant tags, and oversized inputs
/// are all rejected.
pub fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
    if bytes.len() > MAX_MESSAGE_LEN {
        return Err(CodecError::TooLarge {
            len: bytes.len(),
            max: MAX_MESSAGE_LEN,
        });
    }
    Message::try_from_slice(bytes).map_err(CodecError::Decode)
}

#[derive(Debug)]
pub enum CodecError {
    Encode(io::Error),
    Decode(io::Error),
    TooLarge { len: usize, max: usize },
}

/// Receive the next [`ClientMessage`] from `network`, skipping server messages, which an authority
/// never expects to receive.
pub(crate) fn recv_client_message<N: Network>(
    network: &mut N,
) -> Option<(ConnectionId, ClientMessage)> {
    while let Some((origin, message)) = network.recv() {
        match message {
            Message::ClientMessage(msg) => return Some((origin, msg)),
            Message::ServerMessage(_) => {
                log::debug!("dropping server message received from connection {}", origin)
            }
        }
    }
    None
}

/// Receive the next [`ServerMessage`] from `network`, skipping client messages, which an observer
/// never expects to receive.
pub(crate) fn recv_server_message<N: Network>(
    network: &mut N,
) -> Option<(ConnectionId, ServerMessage)> {
    while let Some((origin, message)) = network.recv() {
        match message {
            Message::ServerMessage(msg) => return Some((origin, msg)),
            Message::ClientMessage(_) => {
                log::debug!("dropping client message received from connection {}", origin)
            }
        }
    }
    None
}

/// Check that a received diff is structurally valid for a board with `local_board`'s dimensions.
pub(crate) fn check_board_diff(
    diff: &BoardDiff,
    local_board: &Board,
) -> Result<(), ChangeSetShapeError> {
    diff.changes
        .check_shape(local_board.width(), local_board.height())
}
