//! Collaborator seams: the document store, blob store, clinical records,
//! patient directory, and identity services this core consumes.
//!
//! The substrate behind these traits (its wire format, its persistence) is
//! not part of this core. [`memory`] provides the in-memory reference
//! implementation used by the demo binary and the test suite.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{BlobError, StoreError};
use crate::models::conversation::{Conversation, NewConversation};
use crate::models::message::{Message, MessageDraft, SenderRole};
use crate::models::patient::Patient;
use crate::models::record::MedicalRecord;

/// Live full-view subscription. Every delivery replaces the previous view
/// and must be treated as authoritative; dropping the receiver releases the
/// subscription.
pub type Subscription<T> = watch::Receiver<T>;

/// How an append adjusts the conversation's unread counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadUpdate {
    Increment,
    Clear,
}

/// Conversation and message documents, with server-assigned write times.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn conversations(&self, doctor_id: &str) -> Result<Vec<Conversation>, StoreError>;

    async fn find_for_patient(
        &self,
        doctor_id: &str,
        patient_id: &str,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Creates the conversation, assigning its id and server update time.
    async fn create_conversation(&self, new: NewConversation)
        -> Result<Conversation, StoreError>;

    /// Appends with a server timestamp strictly greater than every message
    /// already in the conversation.
    async fn append_message(
        &self,
        conversation_id: &str,
        draft: MessageDraft,
    ) -> Result<Message, StoreError>;

    async fn message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<Option<Message>, StoreError>;

    async fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<(), StoreError>;

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Refreshes the denormalized summary line and bumps the server update
    /// time.
    async fn touch_conversation(
        &self,
        conversation_id: &str,
        last_message: &str,
        unread: UnreadUpdate,
    ) -> Result<(), StoreError>;

    /// Zeroes the unread counter without touching the update time.
    async fn mark_read(&self, conversation_id: &str) -> Result<(), StoreError>;

    fn watch_conversations(&self, doctor_id: &str) -> Subscription<Vec<Conversation>>;

    /// Live ascending-timestamp view of a conversation's log. A key with no
    /// backing log yields a valid subscription whose view is empty.
    fn watch_messages(&self, conversation_id: &str) -> Subscription<Vec<Message>>;
}

/// The clinician's patient roster, owned by an external directory service.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn roster(&self, doctor_id: &str) -> Result<Vec<Patient>, StoreError>;

    async fn patient(&self, patient_id: &str) -> Result<Option<Patient>, StoreError>;

    fn watch_roster(&self, doctor_id: &str) -> Subscription<Vec<Patient>>;
}

/// Historical clinical records, owned by an external records service.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records for a patient, most-recent-first.
    async fn records(&self, patient_id: &str) -> Result<Vec<MedicalRecord>, StoreError>;

    fn watch_records(&self, patient_id: &str) -> Subscription<Vec<MedicalRecord>>;
}

/// Binary attachment storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the payload under `key` and returns a retrievable URL.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, BlobError>;
}

/// The currently authenticated actor.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: SenderRole,
}

/// Session identity, owned by the external auth collaborator.
pub trait Identity: Send + Sync {
    fn current(&self) -> Actor;
}
