use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix marking a not-yet-persisted conversation key.
pub const EPHEMERAL_PREFIX: &str = "temp_";

/// Condition label used when the roster has none for a patient.
pub const DEFAULT_CONDITION: &str = "General Care";

/// Avatar color assigned to conversations with no stored color.
pub const DEFAULT_AVATAR_COLOR: &str = "bg-stone-700";

/// Palette a new conversation's avatar color is drawn from.
pub const AVATAR_COLORS: &[&str] = &[
    "bg-emerald-500",
    "bg-amber-500",
    "bg-sky-500",
    "bg-rose-500",
    "bg-indigo-500",
    "bg-stone-700",
];

/// A persisted conversation between one clinician and one patient.
///
/// Patient display fields are denormalized at creation time; `last_message`
/// and `updated_at` track the newest append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub doctor_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub condition: String,
    pub status: String, // presence label, e.g. "online" / "offline"
    #[serde(alias = "lastMsg")]
    pub last_message: String,
    pub updated_at: DateTime<Utc>,
    #[serde(alias = "unread")]
    pub unread_count: u32,
    pub avatar_color: String,
}

/// Creation payload; the store assigns the id and the server update time.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub doctor_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub condition: String,
    pub status: String,
    pub initial_summary: String,
    pub avatar_color: String,
}

/// The two representations a conversation can be addressed by.
///
/// An ephemeral key is derived deterministically from the patient id and
/// carries no message history; a persisted key is a stable store id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationKey {
    Ephemeral { patient_id: String },
    Persisted { id: String },
}

impl ConversationKey {
    pub fn ephemeral(patient_id: impl Into<String>) -> Self {
        Self::Ephemeral {
            patient_id: patient_id.into(),
        }
    }

    pub fn persisted(id: impl Into<String>) -> Self {
        Self::Persisted { id: id.into() }
    }

    /// Total: any string with the ephemeral prefix is an ephemeral key,
    /// everything else is treated as a persisted id.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(EPHEMERAL_PREFIX) {
            Some(patient_id) => Self::Ephemeral {
                patient_id: patient_id.to_string(),
            },
            None => Self::Persisted { id: raw.to_string() },
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Ephemeral { .. })
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ephemeral { patient_id } => write!(f, "{EPHEMERAL_PREFIX}{patient_id}"),
            Self::Persisted { id } => f.write_str(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips_through_display() {
        let key = ConversationKey::ephemeral("p42");
        assert_eq!(key.to_string(), "temp_p42");
        assert_eq!(ConversationKey::parse("temp_p42"), key);

        let key = ConversationKey::persisted("c-9001");
        assert_eq!(key.to_string(), "c-9001");
        assert_eq!(ConversationKey::parse("c-9001"), key);
    }

    #[test]
    fn ephemeral_key_is_deterministic_per_patient() {
        assert_eq!(
            ConversationKey::ephemeral("p1"),
            ConversationKey::parse(&ConversationKey::ephemeral("p1").to_string()),
        );
        assert!(ConversationKey::parse("temp_p1").is_ephemeral());
        assert!(!ConversationKey::parse("p1").is_ephemeral());
    }
}
