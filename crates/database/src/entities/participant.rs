//! Participant entity definitions

use serde::{Deserialize, Serialize};

/// A marketplace account mirrored into the messaging core. Rows are
/// provisioned by the account system; messaging never invents them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub role: ParticipantRole,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Customer,
    Provider,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Customer => "customer",
            ParticipantRole::Provider => "provider",
        }
    }
}

impl From<&str> for ParticipantRole {
    fn from(s: &str) -> Self {
        match s {
            "provider" => ParticipantRole::Provider,
            _ => ParticipantRole::Customer,
        }
    }
}

impl std::fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
