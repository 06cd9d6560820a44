//! Event seam between the durable core and the realtime fan-out layer.

use courier_database::{Message, MessageStatus, Thread};
use serde::{Deserialize, Serialize};

/// Audit record of one effective status transition: which message moved,
/// to what state, when, and which participant drove it. Derived from the
/// message row, never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub seq: i64,
    pub status: MessageStatus,
    pub actor: String,
    pub changed_at: String,
}

impl DeliveryReceipt {
    pub fn for_message(message: &Message, actor: &str) -> Self {
        let changed_at = match message.status {
            MessageStatus::Read => message.read_at.clone(),
            MessageStatus::Delivered => message.delivered_at.clone(),
            MessageStatus::Sent => None,
        }
        .unwrap_or_else(|| message.created_at.clone());

        Self {
            message_id: message.public_id.clone(),
            seq: message.seq,
            status: message.status,
            actor: actor.to_string(),
            changed_at,
        }
    }
}

/// Where the durable core hands events to the realtime layer. The router
/// implements this; services stay unaware of transports.
pub trait EventSink: Send + Sync {
    /// Fan a freshly appended message out to the thread's room. Returns
    /// true when the push reached at least one live connection bound to
    /// the recipient (which drives the automatic `delivered` transition).
    fn message_created(&self, thread: &Thread, message: &Message) -> bool;

    /// Propagate an effective status transition to the thread's room.
    fn status_changed(&self, thread: &Thread, receipt: &DeliveryReceipt);
}

/// Sink with no live connections; used when no realtime layer is wired up.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn message_created(&self, _thread: &Thread, _message: &Message) -> bool {
        false
    }

    fn status_changed(&self, _thread: &Thread, _receipt: &DeliveryReceipt) {}
}
