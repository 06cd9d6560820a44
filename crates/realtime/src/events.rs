//! Server→client events carried over the live channel.

use courier_database::{Message, MessageStatus};
use courier_messaging::SyncBatch;
use serde::{Deserialize, Serialize};

/// Everything the server pushes at a connection. Wire names follow the
/// dotted `scope.action` convention of the client protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename = "message.new")]
    MessageNew { thread_id: String, message: Message },

    #[serde(rename = "message.status")]
    MessageStatus {
        thread_id: String,
        message_id: String,
        seq: i64,
        status: MessageStatus,
        actor: String,
        changed_at: String,
    },

    #[serde(rename = "typing.signal")]
    Typing {
        thread_id: String,
        actor: String,
        is_active: bool,
    },

    #[serde(rename = "sync.batch")]
    SyncBatch { batch: SyncBatch },

    #[serde(rename = "room.joined")]
    RoomJoined { thread_id: String },

    #[serde(rename = "room.left")]
    RoomLeft { thread_id: String },

    Pong,

    Error { code: String, message: String },
}
