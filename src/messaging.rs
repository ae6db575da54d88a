//! Append-only, server-ordered message log operations.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::error::CoreError;
use crate::models::conversation::ConversationKey;
use crate::models::message::{Message, MessageDraft, SenderRole};
use crate::store::{Actor, ConversationStore, Subscription, UnreadUpdate};

#[derive(Clone)]
pub struct MessageLog {
    store: Arc<dyn ConversationStore>,
}

impl MessageLog {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Appends to a persisted conversation and refreshes its summary line.
    ///
    /// Patient-authored messages bump the clinician's unread counter;
    /// doctor-authored ones clear it.
    #[instrument(skip(self, draft), fields(conversation_id = %conversation_id, kind = ?draft.kind))]
    pub async fn append(
        &self,
        conversation_id: &str,
        draft: MessageDraft,
    ) -> Result<Message, CoreError> {
        if ConversationKey::parse(conversation_id).is_ephemeral() {
            return Err(CoreError::PreconditionFailure(format!(
                "cannot append to ephemeral conversation {conversation_id}"
            )));
        }

        let summary = draft.summary();
        let unread = match draft.sender {
            SenderRole::Patient => UnreadUpdate::Increment,
            SenderRole::Doctor => UnreadUpdate::Clear,
        };

        let message = self.store.append_message(conversation_id, draft).await?;
        self.store
            .touch_conversation(conversation_id, &summary, unread)
            .await?;
        Ok(message)
    }

    /// Deletes a message if, and only if, the caller authored it. A
    /// non-owner delete is refused without error and leaves the log intact.
    /// The conversation summary is intentionally not recomputed.
    #[instrument(skip(self, caller), fields(conversation_id = %conversation_id, message_id = %message_id))]
    pub async fn delete(
        &self,
        caller: &Actor,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<bool, CoreError> {
        let Some(message) = self.store.message(conversation_id, message_id).await? else {
            return Ok(false);
        };
        if message.sender != caller.role || message.sender_id != caller.id {
            warn!(caller = %caller.id, "refusing delete of a message the caller did not author");
            return Ok(false);
        }
        self.store.delete_message(conversation_id, message_id).await?;
        Ok(true)
    }

    /// Live ascending view of a conversation's log. An ephemeral key gets a
    /// valid subscription whose view is empty and never updates.
    pub fn subscribe(&self, key: &ConversationKey) -> Subscription<Vec<Message>> {
        self.store.watch_messages(&key.to_string())
    }
}
