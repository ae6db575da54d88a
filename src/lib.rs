//! Carelink conversation core.
//!
//! Real-time clinician/patient messaging with typed clinical message kinds,
//! one-way promotion of placeholder conversations on first contact, a
//! two-phase attachment pipeline, and on-demand derivation of a patient's
//! current clinical picture from structured and legacy records.
//!
//! The persistence and transport substrate (document store with realtime
//! push, blob store, identity) is consumed through the traits in [`store`];
//! [`store::memory`] is the in-memory reference implementation used by the
//! demo binary and the test suite.

pub mod attachments;
pub mod config;
pub mod directory;
pub mod error;
pub mod extract;
pub mod lifecycle;
pub mod messaging;
pub mod models;
pub mod service;
pub mod snapshot;
pub mod store;

pub use directory::DirectoryEntry;
pub use error::CoreError;
pub use models::conversation::{Conversation, ConversationKey};
pub use models::message::{Message, MessageDraft, MessageKind, SenderRole};
pub use models::patient::Patient;
pub use models::record::{MedicalRecord, MedicationEntry, VitalSigns};
pub use service::ChatService;
pub use snapshot::ClinicalSnapshot;
