//! Presentation-facing service surface.
//!
//! One entry point over the collaborator seams: the conversation list with
//! unread counts, the open conversation's message stream, send and delete
//! operations, the attachment pipeline, and the derived clinical snapshot
//! for the open conversation's patient.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::instrument;

use crate::attachments::AttachmentPipeline;
use crate::directory::{self, DirectoryEntry};
use crate::error::CoreError;
use crate::lifecycle::LifecycleManager;
use crate::messaging::MessageLog;
use crate::models::conversation::ConversationKey;
use crate::models::message::{Message, MessageDraft, MessageKind, SenderRole};
use crate::models::patient::Patient;
use crate::models::record::MedicationEntry;
use crate::snapshot::{self, ClinicalSnapshot};
use crate::store::{
    Actor, BlobStore, ConversationStore, Identity, PatientDirectory, RecordStore, Subscription,
};

/// Text a vitals-request message carries to the patient.
pub const VITALS_REQUEST_TEXT: &str = "Please share your current vitals readings.";

pub struct ChatService {
    identity: Arc<dyn Identity>,
    store: Arc<dyn ConversationStore>,
    patients: Arc<dyn PatientDirectory>,
    records: Arc<dyn RecordStore>,
    lifecycle: LifecycleManager,
    log: MessageLog,
    attachments: AttachmentPipeline,
}

impl ChatService {
    pub fn new(
        identity: Arc<dyn Identity>,
        store: Arc<dyn ConversationStore>,
        patients: Arc<dyn PatientDirectory>,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let log = MessageLog::new(store.clone());
        Self {
            identity,
            lifecycle: LifecycleManager::new(store.clone(), patients.clone()),
            attachments: AttachmentPipeline::new(blobs, log.clone()),
            log,
            store,
            patients,
            records,
        }
    }

    fn actor(&self) -> Actor {
        self.identity.current()
    }

    // ===== Conversation directory =====

    /// One-shot unified list: persisted conversations plus placeholders for
    /// roster patients without one.
    pub async fn directory(&self) -> Result<Vec<DirectoryEntry>, CoreError> {
        let actor = self.actor();
        let conversations = self.store.conversations(&actor.id).await?;
        let roster = self.patients.roster(&actor.id).await?;
        Ok(directory::unified_directory(&conversations, &roster))
    }

    /// Directory entries whose patient name contains `term`,
    /// case-insensitively.
    pub async fn search_directory(&self, term: &str) -> Result<Vec<DirectoryEntry>, CoreError> {
        let entries = self.directory().await?;
        Ok(directory::search(&entries, term)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Live unified directory, recomputed as a whole whenever either input
    /// changes. The combiner task exits when the receiver is dropped.
    pub fn watch_directory(&self) -> Subscription<Vec<DirectoryEntry>> {
        let actor = self.actor();
        let mut conversations = self.store.watch_conversations(&actor.id);
        let mut roster = self.patients.watch_roster(&actor.id);

        let initial = directory::unified_directory(&*conversations.borrow(), &*roster.borrow());
        let (tx, rx) = watch::channel(initial);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = conversations.changed() => if changed.is_err() { break },
                    changed = roster.changed() => if changed.is_err() { break },
                    _ = tx.closed() => break,
                }
                let view =
                    directory::unified_directory(&*conversations.borrow(), &*roster.borrow());
                tx.send_replace(view);
            }
        });
        rx
    }

    // ===== Messaging =====

    /// Sends a text message, promoting the conversation on first contact.
    /// Returns the appended message; subsequent operations should address
    /// the persisted id it carries.
    #[instrument(skip(self, text, focused), fields(key = %key))]
    pub async fn send_message(
        &self,
        key: &ConversationKey,
        text: &str,
        focused: Option<&Patient>,
    ) -> Result<Message, CoreError> {
        let actor = self.actor();
        let conversation_id = self.resolve_target(&actor, key, focused, text).await?;
        let draft = MessageDraft::text(actor.role, actor.id, text);
        self.log.append(&conversation_id, draft).await
    }

    /// Clinician alert, e.g. a critical lab value notice.
    pub async fn send_alert(
        &self,
        key: &ConversationKey,
        text: &str,
        focused: Option<&Patient>,
    ) -> Result<Message, CoreError> {
        self.send_typed(key, focused, MessageKind::Alert, text.to_string(), None)
            .await
    }

    /// Asks the patient to share current vitals readings.
    pub async fn send_vitals_request(
        &self,
        key: &ConversationKey,
        focused: Option<&Patient>,
    ) -> Result<Message, CoreError> {
        self.send_typed(
            key,
            focused,
            MessageKind::VitalsRequest,
            VITALS_REQUEST_TEXT.to_string(),
            None,
        )
        .await
    }

    /// Sends a prescription message carrying the medication entry.
    pub async fn send_prescription(
        &self,
        key: &ConversationKey,
        medication: MedicationEntry,
        focused: Option<&Patient>,
    ) -> Result<Message, CoreError> {
        let text = format!("Prescribed {} {}", medication.name, medication.dosage);
        self.send_typed(key, focused, MessageKind::Prescription, text, Some(medication))
            .await
    }

    /// Uploads a file then appends the referencing message, promoting the
    /// conversation first when needed.
    #[instrument(skip(self, bytes, focused), fields(key = %key, file_name = %file_name))]
    pub async fn send_file(
        &self,
        key: &ConversationKey,
        file_name: &str,
        bytes: &[u8],
        focused: Option<&Patient>,
    ) -> Result<Message, CoreError> {
        let actor = self.actor();
        let conversation_id = self
            .resolve_target(&actor, key, focused, crate::attachments::FILE_SUMMARY)
            .await?;
        self.attachments
            .send_file(&actor, &conversation_id, file_name, bytes)
            .await
    }

    /// Uploads a voice capture then appends the referencing message.
    /// A zero-byte capture is discarded entirely: no promotion, no upload,
    /// no append.
    #[instrument(skip(self, bytes, focused), fields(key = %key))]
    pub async fn send_voice_note(
        &self,
        key: &ConversationKey,
        bytes: &[u8],
        duration_secs: u32,
        focused: Option<&Patient>,
    ) -> Result<Option<Message>, CoreError> {
        if bytes.is_empty() {
            return Ok(None);
        }
        let actor = self.actor();
        let conversation_id = self
            .resolve_target(&actor, key, focused, crate::attachments::VOICE_NOTE_SUMMARY)
            .await?;
        self.attachments
            .send_voice_note(&actor, &conversation_id, bytes, duration_secs)
            .await
    }

    /// Deletes a message the current actor authored; returns whether the
    /// message was removed. Non-owner deletes are refused, not errors.
    pub async fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<bool, CoreError> {
        self.log
            .delete(&self.actor(), conversation_id, message_id)
            .await
    }

    /// Live ascending message view for the open conversation. Ephemeral
    /// keys yield an empty view that never updates.
    pub fn open_conversation(&self, key: &ConversationKey) -> Subscription<Vec<Message>> {
        self.log.subscribe(key)
    }

    /// Zeroes the unread counter when the clinician opens a conversation.
    pub async fn mark_read(&self, conversation_id: &str) -> Result<(), CoreError> {
        self.store.mark_read(conversation_id).await?;
        Ok(())
    }

    // ===== Clinical snapshot =====

    /// Current clinical picture for a patient, derived on demand from the
    /// record set over the profile base layer.
    #[instrument(skip(self), fields(patient_id = %patient_id))]
    pub async fn snapshot_for(&self, patient_id: &str) -> Result<ClinicalSnapshot, CoreError> {
        let patient = self
            .patients
            .patient(patient_id)
            .await?
            .ok_or_else(|| CoreError::ResolutionFailure(patient_id.to_string()))?;
        let mut records = self.records.records(patient_id).await?;
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(snapshot::aggregate(&patient, &records))
    }

    /// Live snapshot for the open panel, recomputed whenever the record
    /// set changes. The combiner task exits when the receiver is dropped.
    pub async fn watch_snapshot(
        &self,
        patient_id: &str,
    ) -> Result<Subscription<ClinicalSnapshot>, CoreError> {
        let patient = self
            .patients
            .patient(patient_id)
            .await?
            .ok_or_else(|| CoreError::ResolutionFailure(patient_id.to_string()))?;
        let mut feed = self.records.watch_records(patient_id);

        let initial = recompute(&patient, &*feed.borrow());
        let (tx, rx) = watch::channel(initial);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = feed.changed() => if changed.is_err() { break },
                    _ = tx.closed() => break,
                }
                let view = recompute(&patient, &*feed.borrow());
                tx.send_replace(view);
            }
        });
        Ok(rx)
    }

    // ===== Internals =====

    async fn send_typed(
        &self,
        key: &ConversationKey,
        focused: Option<&Patient>,
        kind: MessageKind,
        text: String,
        medication: Option<MedicationEntry>,
    ) -> Result<Message, CoreError> {
        let actor = self.actor();
        if actor.role != SenderRole::Doctor {
            return Err(CoreError::PreconditionFailure(format!(
                "{kind:?} messages are clinician-only"
            )));
        }
        let mut draft = MessageDraft::typed(actor.role, actor.id.clone(), kind, text);
        draft.medication = medication;
        let summary = draft.summary();
        let conversation_id = self.resolve_target(&actor, key, focused, &summary).await?;
        self.log.append(&conversation_id, draft).await
    }

    /// Persisted ids pass through; ephemeral keys are promoted. Promotion
    /// resolves against the clinician's roster, so it is clinician-only.
    async fn resolve_target(
        &self,
        actor: &Actor,
        key: &ConversationKey,
        focused: Option<&Patient>,
        initial_summary: &str,
    ) -> Result<String, CoreError> {
        match (key, actor.role) {
            (ConversationKey::Persisted { id }, _) => Ok(id.clone()),
            (ConversationKey::Ephemeral { .. }, SenderRole::Doctor) => {
                self.lifecycle
                    .ensure_persisted(&actor.id, key, focused, initial_summary)
                    .await
            }
            (ConversationKey::Ephemeral { .. }, SenderRole::Patient) => {
                Err(CoreError::PreconditionFailure(
                    "patients cannot send to a conversation placeholder".to_string(),
                ))
            }
        }
    }
}

fn recompute(patient: &Patient, records: &[crate::models::record::MedicalRecord]) -> ClinicalSnapshot {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    snapshot::aggregate(patient, &sorted)
}
