//! One-way promotion of ephemeral conversations to persisted ones.
//!
//! Promotion happens on the first successful outbound send against an
//! ephemeral key and must survive rapid repeated sends without duplicating
//! the conversation: ephemeral keys are not globally reserved, so the
//! existence check runs under a per-patient lock.

use std::sync::Arc;

use dashmap::DashMap;
use rand::seq::SliceRandom;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::CoreError;
use crate::models::conversation::{
    ConversationKey, NewConversation, AVATAR_COLORS, DEFAULT_AVATAR_COLOR, DEFAULT_CONDITION,
};
use crate::models::patient::Patient;
use crate::store::{ConversationStore, PatientDirectory};

pub struct LifecycleManager {
    store: Arc<dyn ConversationStore>,
    patients: Arc<dyn PatientDirectory>,
    promotion_locks: DashMap<String, Arc<Mutex<()>>>, // per patient id
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn ConversationStore>, patients: Arc<dyn PatientDirectory>) -> Self {
        Self {
            store,
            patients,
            promotion_locks: DashMap::new(),
        }
    }

    /// Resolves a conversation key to a persisted conversation id, creating
    /// the conversation on first contact.
    ///
    /// `focused` is the externally supplied patient reference used when the
    /// target is not in the roster yet (e.g. a profile the clinician is
    /// currently viewing). Resolution failure aborts with no write.
    #[instrument(skip(self, focused, initial_summary), fields(doctor_id = %doctor_id, key = %key))]
    pub async fn ensure_persisted(
        &self,
        doctor_id: &str,
        key: &ConversationKey,
        focused: Option<&Patient>,
        initial_summary: &str,
    ) -> Result<String, CoreError> {
        let patient_id = match key {
            ConversationKey::Persisted { id } => return Ok(id.clone()),
            ConversationKey::Ephemeral { patient_id } => patient_id.clone(),
        };

        let lock = self
            .promotion_locks
            .entry(patient_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(existing) = self.store.find_for_patient(doctor_id, &patient_id).await? {
            debug!(conversation_id = %existing.id, "reusing persisted conversation");
            return Ok(existing.id);
        }

        let patient = match self.patients.patient(&patient_id).await? {
            Some(p) => p,
            None => match focused {
                Some(p) if p.id == patient_id => p.clone(),
                _ => return Err(CoreError::ResolutionFailure(patient_id)),
            },
        };

        let conversation = self
            .store
            .create_conversation(NewConversation {
                doctor_id: doctor_id.to_string(),
                patient_id: patient.id.clone(),
                patient_name: patient.name.clone(),
                condition: patient
                    .condition
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CONDITION.to_string()),
                status: if patient.is_active() { "online" } else { "offline" }.to_string(),
                initial_summary: initial_summary.to_string(),
                avatar_color: pick_avatar_color(),
            })
            .await?;

        info!(
            conversation_id = %conversation.id,
            patient_id = %patient.id,
            "conversation persisted on first contact"
        );
        Ok(conversation.id)
    }
}

fn pick_avatar_color() -> String {
    AVATAR_COLORS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DEFAULT_AVATAR_COLOR)
        .to_string()
}
