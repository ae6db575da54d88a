//! Two-phase attachment sends: store the blob, then append the message.
//!
//! The two phases are not transactional. Phase-1 failure aborts the send
//! entirely; phase-2 failure after a stored blob leaves an orphan, which is
//! logged and surfaced as [`CoreError::PartialFailure`], never retried or
//! cleaned up here.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::messaging::MessageLog;
use crate::models::conversation::ConversationKey;
use crate::models::message::{Message, MessageDraft, MessageKind};
use crate::store::{Actor, BlobStore};

/// Key namespace attachments are stored under, per conversation.
pub const ATTACHMENT_NAMESPACE: &str = "chat_attachments";

/// Message text shown for generic file attachments.
pub const FILE_SUMMARY: &str = "Sent an attachment";

/// Message text shown for voice notes.
pub const VOICE_NOTE_SUMMARY: &str = "Voice note";

#[derive(Clone)]
pub struct AttachmentPipeline {
    blobs: Arc<dyn BlobStore>,
    log: MessageLog,
}

impl AttachmentPipeline {
    pub fn new(blobs: Arc<dyn BlobStore>, log: MessageLog) -> Self {
        Self { blobs, log }
    }

    /// Stores a generic file and appends the referencing `file` message.
    #[instrument(skip(self, sender, bytes), fields(conversation_id = %conversation_id, file_name = %file_name))]
    pub async fn send_file(
        &self,
        sender: &Actor,
        conversation_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Message, CoreError> {
        self.require_persisted(conversation_id)?;

        // Collision-resistant key: timestamp-prefixed original name.
        let key = format!(
            "{ATTACHMENT_NAMESPACE}/{conversation_id}/{}_{file_name}",
            Utc::now().timestamp_millis()
        );
        let url = self.blobs.put(&key, bytes).await?;

        let mut draft =
            MessageDraft::typed(sender.role, &sender.id, MessageKind::File, FILE_SUMMARY);
        draft.file_url = Some(url);
        draft.file_name = Some(file_name.to_string());
        self.append_or_orphan(conversation_id, draft, key).await
    }

    /// Stores a voice capture and appends the referencing `audio` message.
    /// A zero-byte capture is discarded before phase 1: no upload, no
    /// message.
    #[instrument(skip(self, sender, bytes), fields(conversation_id = %conversation_id))]
    pub async fn send_voice_note(
        &self,
        sender: &Actor,
        conversation_id: &str,
        bytes: &[u8],
        duration_secs: u32,
    ) -> Result<Option<Message>, CoreError> {
        if bytes.is_empty() {
            debug!("discarding zero-byte voice capture");
            return Ok(None);
        }
        self.require_persisted(conversation_id)?;

        let file_name = format!("voice_note_{}.webm", Uuid::new_v4());
        let key = format!("{ATTACHMENT_NAMESPACE}/{conversation_id}/{file_name}");
        let url = self.blobs.put(&key, bytes).await?;

        let mut draft =
            MessageDraft::typed(sender.role, &sender.id, MessageKind::Audio, VOICE_NOTE_SUMMARY);
        draft.file_url = Some(url);
        draft.file_name = Some(file_name);
        draft.duration = Some(duration_secs);
        self.append_or_orphan(conversation_id, draft, key)
            .await
            .map(Some)
    }

    fn require_persisted(&self, conversation_id: &str) -> Result<(), CoreError> {
        if ConversationKey::parse(conversation_id).is_ephemeral() {
            return Err(CoreError::PreconditionFailure(format!(
                "attachments require a persisted conversation, got {conversation_id}"
            )));
        }
        Ok(())
    }

    /// Phase 2. On failure the blob at `blob_key` has no referencing
    /// message; that outcome is logged and reported, nothing else.
    async fn append_or_orphan(
        &self,
        conversation_id: &str,
        draft: MessageDraft,
        blob_key: String,
    ) -> Result<Message, CoreError> {
        match self.log.append(conversation_id, draft).await {
            Ok(message) => Ok(message),
            Err(source) => {
                warn!(blob_key = %blob_key, error = %source, "orphaned attachment blob");
                Err(CoreError::PartialFailure {
                    blob_key,
                    source: Box::new(source),
                })
            }
        }
    }
}
