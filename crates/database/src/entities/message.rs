//! Message entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub public_id: String,
    pub thread_id: i64,
    pub thread_public_id: String,
    /// Thread-scoped sequence number, strictly increasing, never reused.
    pub seq: i64,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: String,
    pub kind: MessageKind,
    pub attachment_ref: Option<String>,
    pub status: MessageStatus,
    pub created_at: String,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
}

/// Delivery state. Transitions only move forward; `Read` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    /// Ordering rank used to enforce forward-only transitions.
    pub fn rank(&self) -> u8 {
        match self {
            MessageStatus::Sent => 0,
            MessageStatus::Delivered => 1,
            MessageStatus::Read => 2,
        }
    }

    pub fn advances_to(&self, next: MessageStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl From<&str> for MessageStatus {
    fn from(s: &str) -> Self {
        match s {
            "delivered" => MessageStatus::Delivered,
            "read" => MessageStatus::Read,
            _ => MessageStatus::Sent,
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::File => "file",
        }
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        match s {
            "image" => MessageKind::Image,
            "file" => MessageKind::File,
            _ => MessageKind::Text,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of a message to append: text body and/or an attachment
/// reference with its declared media kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub body: String,
    pub kind: MessageKind,
    pub attachment_ref: Option<String>,
}

impl NewMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            kind: MessageKind::Text,
            attachment_ref: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ranks_are_forward_only() {
        assert!(MessageStatus::Sent.advances_to(MessageStatus::Delivered));
        assert!(MessageStatus::Sent.advances_to(MessageStatus::Read));
        assert!(MessageStatus::Delivered.advances_to(MessageStatus::Read));
        assert!(!MessageStatus::Read.advances_to(MessageStatus::Delivered));
        assert!(!MessageStatus::Delivered.advances_to(MessageStatus::Delivered));
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Read,
        ] {
            assert_eq!(MessageStatus::from(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_kind_defaults_to_text() {
        assert_eq!(MessageKind::from("video"), MessageKind::Text);
    }
}
