use std::{
    collections::{HashMap, HashSet},
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use tile_cascade::{
    networking::{
        messages::{Message, ServerMessage},
        network::Network,
        receiving::{decode, encode},
    },
    types::{checksum::Checksum, data_types::ConnectionId},
};

/// Faults injected into messages on their way to a connection.
#[derive(Default)]
struct Faults {
    unreachable: HashSet<ConnectionId>,
    drop_next_diff: HashSet<ConnectionId>,
    corrupt_next_diff: HashSet<ConnectionId>,
}

/// Shared switchboard through which a test injects faults into a mock network.
#[derive(Clone, Default)]
pub(crate) struct NetworkControl {
    faults: Arc<Mutex<Faults>>,
}

impl NetworkControl {
    /// Drop every message sent to `peer` from now on.
    pub(crate) fn make_unreachable(&self, peer: ConnectionId) {
        self.faults.lock().unwrap().unreachable.insert(peer);
    }

    /// Silently drop the next board diff sent to `peer`.
    pub(crate) fn drop_next_diff(&self, peer: ConnectionId) {
        self.faults.lock().unwrap().drop_next_diff.insert(peer);
    }

    /// Replace the checksum of the next board diff sent to `peer` with garbage.
    pub(crate) fn corrupt_next_diff(&self, peer: ConnectionId) {
        self.faults.lock().unwrap().corrupt_next_diff.insert(peer);
    }
}

/// A mock network stub which passes encoded messages from and to threads using channels.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    me: ConnectionId,
    all_peers: HashMap<ConnectionId, Sender<(ConnectionId, Vec<u8>)>>,
    inbox: Arc<Mutex<Receiver<(ConnectionId, Vec<u8>)>>>,
    control: NetworkControl,
}

impl Network for NetworkStub {
    fn send(&mut self, peer: ConnectionId, mut message: Message) {
        {
            let mut faults = self.control.faults.lock().unwrap();
            if faults.unreachable.contains(&peer) {
                return;
            }
            if let Message::ServerMessage(ServerMessage::BoardDiff(diff)) = &mut message {
                if faults.drop_next_diff.remove(&peer) {
                    return;
                }
                if faults.corrupt_next_diff.remove(&peer) {
                    diff.changes.resulting_checksum = Checksum::new([0xAB; 32]);
                }
            }
        }

        if let Some(inbox) = self.all_peers.get(&peer) {
            let bytes = encode(&message).unwrap();
            let _ = inbox.send((self.me, bytes));
        }
    }

    fn recv(&mut self) -> Option<(ConnectionId, Message)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok((origin, bytes)) => Some((origin, decode(&bytes).unwrap())),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!(),
        }
    }
}

/// Create one network stub per peer, all connected to each other, plus the control through which
/// faults are injected.
pub(crate) fn mock_network(
    peers: impl Iterator<Item = ConnectionId>,
) -> (Vec<NetworkStub>, NetworkControl) {
    let control = NetworkControl::default();
    let mut all_peers = HashMap::new();
    let peer_and_inboxes: Vec<(ConnectionId, Receiver<(ConnectionId, Vec<u8>)>)> = peers
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer, sender);

            (peer, receiver)
        })
        .collect();

    let stubs = peer_and_inboxes
        .into_iter()
        .map(|(me, inbox)| NetworkStub {
            me,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
            control: control.clone(),
        })
        .collect();

    (stubs, control)
}
