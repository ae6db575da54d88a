use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::MedicationEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Doctor,
    Patient,
}

/// Message payload tag. Every kind still carries a human-readable `text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    File,
    Audio,
    Alert,
    VitalsRequest,
    Prescription,
}

impl MessageKind {
    /// Conversation-list summary tag for non-text kinds, e.g. `[ALERT]`.
    pub fn summary_tag(&self) -> &'static str {
        match self {
            MessageKind::Text => "",
            MessageKind::File => "[FILE]",
            MessageKind::Audio => "[AUDIO]",
            MessageKind::Alert => "[ALERT]",
            MessageKind::VitalsRequest => "[VITALS_REQUEST]",
            MessageKind::Prescription => "[PRESCRIPTION]",
        }
    }
}

/// One entry in a conversation's append-only log. Immutable once created,
/// except for deletion; `created_at` is assigned by the store and is
/// strictly increasing within the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: SenderRole,
    pub sender_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Audio length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication: Option<MedicationEntry>,
}

impl Message {
    /// Text used for the conversation's `last_message` denormalization.
    pub fn summary(&self) -> String {
        summary_for(self.kind, &self.text)
    }
}

/// A message before the store assigns identity and server time.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub sender: SenderRole,
    pub sender_id: String,
    pub kind: MessageKind,
    pub text: String,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub duration: Option<u32>,
    pub medication: Option<MedicationEntry>,
}

impl MessageDraft {
    pub fn text(sender: SenderRole, sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::typed(sender, sender_id, MessageKind::Text, text)
    }

    pub fn typed(
        sender: SenderRole,
        sender_id: impl Into<String>,
        kind: MessageKind,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            sender_id: sender_id.into(),
            kind,
            text: text.into(),
            file_url: None,
            file_name: None,
            duration: None,
            medication: None,
        }
    }

    pub fn summary(&self) -> String {
        summary_for(self.kind, &self.text)
    }
}

fn summary_for(kind: MessageKind, text: &str) -> String {
    match kind {
        MessageKind::Text => text.to_string(),
        other => other.summary_tag().to_string(),
    }
}
