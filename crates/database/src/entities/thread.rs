//! Thread entity definitions

use serde::{Deserialize, Serialize};

use super::message::Message;

/// A conversation scoped to exactly two participants. The pair is stored
/// in lexicographic order so the same two accounts always map to one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub public_id: String,
    pub participant_low: String,
    pub participant_high: String,
    /// Opaque foreign key into the booking domain, never interpreted here.
    pub booking_ref: Option<String>,
    pub archived: bool,
    pub created_at: String,
}

impl Thread {
    /// Normalize an unordered pair into storage order.
    pub fn canonical_pair(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    pub fn is_member(&self, participant_id: &str) -> bool {
        self.participant_low == participant_id || self.participant_high == participant_id
    }

    /// The peer of `participant_id` in this thread, or `None` for outsiders.
    pub fn other_participant(&self, participant_id: &str) -> Option<&str> {
        if self.participant_low == participant_id {
            Some(&self.participant_high)
        } else if self.participant_high == participant_id {
            Some(&self.participant_low)
        } else {
            None
        }
    }
}

/// Conversation-list row: a thread plus the bits list consumers render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub other_participant: String,
    pub booking_ref: Option<String>,
    pub archived: bool,
    pub last_message: Option<Message>,
    pub unread_count: i64,
    pub last_activity_at: String,
}
