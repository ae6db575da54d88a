//! Domain models for the conversation core.
//!
//! Patients and medical records are owned by external collaborators and are
//! read-only here; conversations and messages are owned by this core.

pub mod conversation;
pub mod message;
pub mod patient;
pub mod record;

pub use conversation::{Conversation, ConversationKey, NewConversation};
pub use message::{Message, MessageDraft, MessageKind, SenderRole};
pub use patient::Patient;
pub use record::{MedicalRecord, MedicationEntry, RecordVitals, VitalSigns};
