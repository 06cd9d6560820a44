//! Room fan-out router: live connections, room membership, broadcasts.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use courier_database::{Message, Thread};
use courier_messaging::{DeliveryReceipt, EventSink};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::events::ServerEvent;

pub type ConnectionId = u64;

struct ConnectionState {
    participant_id: String,
    sender: mpsc::UnboundedSender<ServerEvent>,
    rooms: HashSet<i64>,
}

/// Multiplexes live connections into thread-scoped rooms and fans events
/// out to them.
///
/// Each connection owns an unbounded FIFO channel; emitting a source
/// operation's events in one pass over the member list preserves source
/// order per room. Dead connections discovered mid-broadcast are pruned
/// from membership instead of failing the originating operation.
pub struct RoomRouter {
    next_connection_id: AtomicU64,
    connections: RwLock<HashMap<ConnectionId, ConnectionState>>,
    rooms: RwLock<HashMap<i64, HashSet<ConnectionId>>>,
}

impl RoomRouter {
    pub fn new() -> Self {
        Self {
            next_connection_id: AtomicU64::new(1),
            connections: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Bind a new live connection to a participant identity.
    pub fn register(
        &self,
        participant_id: &str,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        self.connections.write().expect("connections poisoned").insert(
            id,
            ConnectionState {
                participant_id: participant_id.to_string(),
                sender,
                rooms: HashSet::new(),
            },
        );

        debug!(connection_id = id, participant_id, "connection registered");
        (id, receiver)
    }

    /// Drop a connection and release all of its room memberships before
    /// any further broadcast can target it.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let state = self
            .connections
            .write()
            .expect("connections poisoned")
            .remove(&connection_id);

        let Some(state) = state else {
            return;
        };

        let mut rooms = self.rooms.write().expect("rooms poisoned");
        for thread_id in &state.rooms {
            if let Some(members) = rooms.get_mut(thread_id) {
                members.remove(&connection_id);
                if members.is_empty() {
                    rooms.remove(thread_id);
                }
            }
        }

        debug!(
            connection_id,
            participant_id = %state.participant_id,
            "connection closed, memberships released"
        );
    }

    /// Subscribe a connection to a thread's room. Idempotent. Returns
    /// false when the connection is already gone. Membership authorization
    /// happens in the gateway before this is called.
    pub fn join_room(&self, connection_id: ConnectionId, thread_id: i64) -> bool {
        let mut connections = self.connections.write().expect("connections poisoned");
        let Some(state) = connections.get_mut(&connection_id) else {
            return false;
        };
        state.rooms.insert(thread_id);
        drop(connections);

        self.rooms
            .write()
            .expect("rooms poisoned")
            .entry(thread_id)
            .or_default()
            .insert(connection_id);
        true
    }

    /// Idempotent unsubscription.
    pub fn leave_room(&self, connection_id: ConnectionId, thread_id: i64) {
        let mut connections = self.connections.write().expect("connections poisoned");
        if let Some(state) = connections.get_mut(&connection_id) {
            state.rooms.remove(&thread_id);
        }
        drop(connections);

        let mut rooms = self.rooms.write().expect("rooms poisoned");
        if let Some(members) = rooms.get_mut(&thread_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                rooms.remove(&thread_id);
            }
        }
    }

    /// Push an event to one specific connection.
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        let connections = self.connections.read().expect("connections poisoned");
        match connections.get(&connection_id) {
            Some(state) => state.sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Fan an event out to a room. Skips connections bound to
    /// `except_participant` (used for typing, where the originator must
    /// not hear its own signal). Returns the participant ids that were
    /// actually reached over a live connection.
    pub fn broadcast(
        &self,
        thread_id: i64,
        event: &ServerEvent,
        except_participant: Option<&str>,
    ) -> HashSet<String> {
        let members: Vec<ConnectionId> = {
            let rooms = self.rooms.read().expect("rooms poisoned");
            match rooms.get(&thread_id) {
                Some(members) => members.iter().copied().collect(),
                None => return HashSet::new(),
            }
        };

        let mut reached = HashSet::new();
        let mut dead = Vec::new();
        {
            let connections = self.connections.read().expect("connections poisoned");
            for connection_id in members {
                let Some(state) = connections.get(&connection_id) else {
                    continue;
                };
                if except_participant == Some(state.participant_id.as_str()) {
                    continue;
                }
                if state.sender.send(event.clone()).is_ok() {
                    reached.insert(state.participant_id.clone());
                } else {
                    dead.push(connection_id);
                }
            }
        }

        for connection_id in dead {
            warn!(connection_id, thread_id, "pruning dead connection from room");
            self.disconnect(connection_id);
        }

        reached
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().expect("connections poisoned").len()
    }

    pub fn room_size(&self, thread_id: i64) -> usize {
        self.rooms
            .read()
            .expect("rooms poisoned")
            .get(&thread_id)
            .map(|members| members.len())
            .unwrap_or(0)
    }
}

impl Default for RoomRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RoomRouter {
    fn message_created(&self, thread: &Thread, message: &Message) -> bool {
        let event = ServerEvent::MessageNew {
            thread_id: thread.public_id.clone(),
            message: message.clone(),
        };
        let reached = self.broadcast(thread.id, &event, None);
        reached.contains(&message.recipient_id)
    }

    fn status_changed(&self, thread: &Thread, receipt: &DeliveryReceipt) {
        let event = ServerEvent::MessageStatus {
            thread_id: thread.public_id.clone(),
            message_id: receipt.message_id.clone(),
            seq: receipt.seq,
            status: receipt.status,
            actor: receipt.actor.clone(),
            changed_at: receipt.changed_at.clone(),
        };
        self.broadcast(thread.id, &event, None);
    }
}
