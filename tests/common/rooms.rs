use std::collections::BTreeMap;

use tile_cascade::{
    board_server::Rooms,
    types::data_types::{BoardId, ConnectionId},
};

/// Rooms kept in a map from connection to board.
#[derive(Clone, Default)]
pub(crate) struct MemRooms {
    boards: BTreeMap<ConnectionId, BoardId>,
}

impl MemRooms {
    pub(crate) fn with(members: impl IntoIterator<Item = (ConnectionId, BoardId)>) -> Self {
        Self {
            boards: members.into_iter().collect(),
        }
    }
}

impl Rooms for MemRooms {
    fn board_of(&self, connection: ConnectionId) -> Option<BoardId> {
        self.boards.get(&connection).copied()
    }

    fn connections_on(&self, board: BoardId) -> Vec<ConnectionId> {
        self.boards
            .iter()
            .filter(|(_, b)| **b == board)
            .map(|(connection, _)| *connection)
            .collect()
    }

    fn leave(&mut self, connection: ConnectionId) {
        self.boards.remove(&connection);
    }
}
