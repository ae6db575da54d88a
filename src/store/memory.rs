//! In-memory reference implementation of the collaborator seams.
//!
//! Documents live in `DashMap` collections; realtime push is one `watch`
//! channel per query, re-sent with the full current view on every change.
//! Write timestamps are strictly monotonic per store instance, so message
//! order is well-defined even when two writers land in the same clock tick.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{BlobError, StoreError};
use crate::models::conversation::{Conversation, NewConversation};
use crate::models::message::{Message, MessageDraft, SenderRole};
use crate::models::patient::Patient;
use crate::models::record::MedicalRecord;

use super::{
    Actor, BlobStore, ConversationStore, Identity, PatientDirectory, RecordStore, Subscription,
    UnreadUpdate,
};

#[derive(Default)]
pub struct MemoryStore {
    conversations: DashMap<String, Conversation>,
    messages: DashMap<String, Vec<Message>>, // conversation id → log
    patients: DashMap<String, Patient>,
    records: DashMap<String, Vec<MedicalRecord>>, // patient id → records, newest first
    conversation_feeds: DashMap<String, watch::Sender<Vec<Conversation>>>, // per doctor
    message_feeds: DashMap<String, watch::Sender<Vec<Message>>>, // per conversation
    roster_feeds: DashMap<String, watch::Sender<Vec<Patient>>>,  // per doctor
    record_feeds: DashMap<String, watch::Sender<Vec<MedicalRecord>>>, // per patient
    clock: Mutex<Option<DateTime<Utc>>>, // last issued server timestamp
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server-assigned write time, strictly greater than any previously
    /// issued by this store.
    fn server_now(&self) -> DateTime<Utc> {
        let mut last = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }

    pub fn seed_patient(&self, doctor_id: &str, patient: Patient) {
        self.patients.insert(patient.id.clone(), patient);
        self.notify_roster(doctor_id);
    }

    pub fn seed_record(&self, record: MedicalRecord) {
        let patient_id = record.patient_id.clone();
        {
            let mut records = self.records.entry(patient_id.clone()).or_default();
            records.push(record);
            records.sort_by(|a, b| b.date.cmp(&a.date));
        }
        self.notify_records(&patient_id);
    }

    fn sorted_messages(&self, conversation_id: &str) -> Vec<Message> {
        let mut log = self
            .messages
            .get(conversation_id)
            .map(|l| l.value().clone())
            .unwrap_or_default();
        log.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        log
    }

    fn doctor_conversations(&self, doctor_id: &str) -> Vec<Conversation> {
        let mut list: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|entry| entry.doctor_id == doctor_id)
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        list
    }

    fn patient_records(&self, patient_id: &str) -> Vec<MedicalRecord> {
        self.records
            .get(patient_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    fn doctor_roster(&self) -> Vec<Patient> {
        let mut roster: Vec<Patient> = self.patients.iter().map(|p| p.value().clone()).collect();
        roster.sort_by(|a, b| a.name.cmp(&b.name));
        roster
    }

    fn notify_messages(&self, conversation_id: &str) {
        if let Some(feed) = self.message_feeds.get(conversation_id) {
            feed.send_replace(self.sorted_messages(conversation_id));
        }
    }

    fn notify_conversations(&self, doctor_id: &str) {
        if let Some(feed) = self.conversation_feeds.get(doctor_id) {
            feed.send_replace(self.doctor_conversations(doctor_id));
        }
    }

    fn notify_roster(&self, doctor_id: &str) {
        if let Some(feed) = self.roster_feeds.get(doctor_id) {
            feed.send_replace(self.doctor_roster());
        }
    }

    fn notify_records(&self, patient_id: &str) {
        if let Some(feed) = self.record_feeds.get(patient_id) {
            feed.send_replace(self.patient_records(patient_id));
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn conversations(&self, doctor_id: &str) -> Result<Vec<Conversation>, StoreError> {
        Ok(self.doctor_conversations(doctor_id))
    }

    async fn find_for_patient(
        &self,
        doctor_id: &str,
        patient_id: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        Ok(self
            .conversations
            .iter()
            .find(|c| c.doctor_id == doctor_id && c.patient_id == patient_id)
            .map(|c| c.value().clone()))
    }

    async fn create_conversation(
        &self,
        new: NewConversation,
    ) -> Result<Conversation, StoreError> {
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            doctor_id: new.doctor_id.clone(),
            patient_id: new.patient_id,
            patient_name: new.patient_name,
            condition: new.condition,
            status: new.status,
            last_message: new.initial_summary,
            updated_at: self.server_now(),
            unread_count: 0,
            avatar_color: new.avatar_color,
        };
        self.conversations
            .insert(conversation.id.clone(), conversation.clone());
        self.messages.entry(conversation.id.clone()).or_default();
        self.notify_conversations(&new.doctor_id);
        Ok(conversation)
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        draft: MessageDraft,
    ) -> Result<Message, StoreError> {
        if !self.conversations.contains_key(conversation_id) {
            return Err(StoreError::NotFound(format!(
                "conversation {conversation_id}"
            )));
        }
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender: draft.sender,
            sender_id: draft.sender_id,
            kind: draft.kind,
            text: draft.text,
            created_at: self.server_now(),
            file_url: draft.file_url,
            file_name: draft.file_name,
            duration: draft.duration,
            medication: draft.medication,
        };
        self.messages
            .entry(conversation_id.to_string())
            .or_default()
            .push(message.clone());
        self.notify_messages(conversation_id);
        Ok(message)
    }

    async fn message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<Option<Message>, StoreError> {
        Ok(self
            .messages
            .get(conversation_id)
            .and_then(|log| log.iter().find(|m| m.id == message_id).cloned()))
    }

    async fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<(), StoreError> {
        if let Some(mut log) = self.messages.get_mut(conversation_id) {
            log.retain(|m| m.id != message_id);
        }
        self.notify_messages(conversation_id);
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self.sorted_messages(conversation_id))
    }

    async fn touch_conversation(
        &self,
        conversation_id: &str,
        last_message: &str,
        unread: UnreadUpdate,
    ) -> Result<(), StoreError> {
        let doctor_id = {
            let mut conversation = self.conversations.get_mut(conversation_id).ok_or_else(
                || StoreError::NotFound(format!("conversation {conversation_id}")),
            )?;
            conversation.last_message = last_message.to_string();
            conversation.updated_at = self.server_now();
            match unread {
                UnreadUpdate::Increment => conversation.unread_count += 1,
                UnreadUpdate::Clear => conversation.unread_count = 0,
            }
            conversation.doctor_id.clone()
        };
        self.notify_conversations(&doctor_id);
        Ok(())
    }

    async fn mark_read(&self, conversation_id: &str) -> Result<(), StoreError> {
        let doctor_id = {
            let mut conversation = self.conversations.get_mut(conversation_id).ok_or_else(
                || StoreError::NotFound(format!("conversation {conversation_id}")),
            )?;
            conversation.unread_count = 0;
            conversation.doctor_id.clone()
        };
        self.notify_conversations(&doctor_id);
        Ok(())
    }

    fn watch_conversations(&self, doctor_id: &str) -> Subscription<Vec<Conversation>> {
        self.conversation_feeds
            .entry(doctor_id.to_string())
            .or_insert_with(|| watch::channel(self.doctor_conversations(doctor_id)).0)
            .subscribe()
    }

    fn watch_messages(&self, conversation_id: &str) -> Subscription<Vec<Message>> {
        self.message_feeds
            .entry(conversation_id.to_string())
            .or_insert_with(|| watch::channel(self.sorted_messages(conversation_id)).0)
            .subscribe()
    }
}

#[async_trait]
impl PatientDirectory for MemoryStore {
    async fn roster(&self, _doctor_id: &str) -> Result<Vec<Patient>, StoreError> {
        Ok(self.doctor_roster())
    }

    async fn patient(&self, patient_id: &str) -> Result<Option<Patient>, StoreError> {
        Ok(self.patients.get(patient_id).map(|p| p.value().clone()))
    }

    fn watch_roster(&self, doctor_id: &str) -> Subscription<Vec<Patient>> {
        self.roster_feeds
            .entry(doctor_id.to_string())
            .or_insert_with(|| watch::channel(self.doctor_roster()).0)
            .subscribe()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn records(&self, patient_id: &str) -> Result<Vec<MedicalRecord>, StoreError> {
        Ok(self.patient_records(patient_id))
    }

    fn watch_records(&self, patient_id: &str) -> Subscription<Vec<MedicalRecord>> {
        self.record_feeds
            .entry(patient_id.to_string())
            .or_insert_with(|| watch::channel(self.patient_records(patient_id)).0)
            .subscribe()
    }
}

/// Blob storage backed by a map; URLs use a `memory://` scheme.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, BlobError> {
        self.objects.insert(key.to_string(), bytes.to_vec());
        Ok(format!("memory://{key}"))
    }
}

/// Fixed session identity for tests and the demo binary.
pub struct StaticIdentity {
    actor: Actor,
}

impl StaticIdentity {
    pub fn doctor(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            actor: Actor {
                id: id.into(),
                name: name.into(),
                role: SenderRole::Doctor,
            },
        }
    }

    pub fn patient(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            actor: Actor {
                id: id.into(),
                name: name.into(),
                role: SenderRole::Patient,
            },
        }
    }
}

impl Identity for StaticIdentity {
    fn current(&self) -> Actor {
        self.actor.clone()
    }
}
