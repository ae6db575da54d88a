//! End-to-end conversation flows over the in-memory reference store.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;

use carelink::error::{BlobError, CoreError};
use carelink::models::record::{MedicalRecord, MedicationEntry, RecordVitals, VitalSigns};
use carelink::store::memory::{MemoryBlobStore, MemoryStore, StaticIdentity};
use carelink::store::{BlobStore, ConversationStore};
use carelink::{ChatService, ConversationKey, MessageKind, Patient};

fn patient(id: &str, name: &str) -> Patient {
    serde_json::from_value(serde_json::json!({ "id": id, "name": name })).unwrap()
}

fn doctor_service(store: &Arc<MemoryStore>, blobs: Arc<dyn BlobStore>) -> ChatService {
    ChatService::new(
        Arc::new(StaticIdentity::doctor("d-1", "Dr. Grey")),
        store.clone(),
        store.clone(),
        store.clone(),
        blobs,
    )
}

fn patient_service(store: &Arc<MemoryStore>, patient_id: &str) -> ChatService {
    ChatService::new(
        Arc::new(StaticIdentity::patient(patient_id, "Ana Flores")),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(MemoryBlobStore::new()),
    )
}

mock! {
    FlakyBlobs {}

    #[async_trait]
    impl BlobStore for FlakyBlobs {
        async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, BlobError>;
    }
}

#[tokio::test]
async fn rapid_sends_create_exactly_one_conversation() {
    let store = Arc::new(MemoryStore::new());
    store.seed_patient("d-1", patient("p-1", "Ana Flores"));
    let service = doctor_service(&store, Arc::new(MemoryBlobStore::new()));
    let key = ConversationKey::ephemeral("p-1");

    let (a, b) = tokio::join!(
        service.send_message(&key, "first", None),
        service.send_message(&key, "second", None),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.conversation_id, b.conversation_id);

    let conversations = store.conversations("d-1").await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].patient_id, "p-1");
}

#[tokio::test]
async fn directory_swaps_placeholder_for_persisted_entry_after_first_contact() {
    let store = Arc::new(MemoryStore::new());
    store.seed_patient("d-1", patient("p-1", "Ana Flores"));
    let service = doctor_service(&store, Arc::new(MemoryBlobStore::new()));

    let before = service.directory().await.unwrap();
    assert_eq!(before.len(), 1);
    assert!(before[0].is_ephemeral());
    assert_eq!(before[0].key(), "temp_p-1");

    service
        .send_message(&ConversationKey::ephemeral("p-1"), "hello", None)
        .await
        .unwrap();

    let after = service.directory().await.unwrap();
    assert_eq!(after.len(), 1);
    assert!(!after[0].is_ephemeral());
    assert_eq!(after[0].patient_id(), "p-1");
}

#[tokio::test]
async fn concurrent_senders_interleave_in_server_order() {
    let store = Arc::new(MemoryStore::new());
    store.seed_patient("d-1", patient("p-1", "Ana Flores"));
    let doctor = Arc::new(doctor_service(&store, Arc::new(MemoryBlobStore::new())));

    let opener = doctor
        .send_message(&ConversationKey::ephemeral("p-1"), "opening", None)
        .await
        .unwrap();
    let conversation_id = opener.conversation_id.clone();
    let patient_side = Arc::new(patient_service(&store, "p-1"));

    let doctor_task = {
        let doctor = doctor.clone();
        let key = ConversationKey::persisted(&conversation_id);
        tokio::spawn(async move {
            for i in 0..10 {
                doctor
                    .send_message(&key, &format!("doctor {i}"), None)
                    .await
                    .unwrap();
            }
        })
    };
    let patient_task = {
        let patient_side = patient_side.clone();
        let key = ConversationKey::persisted(&conversation_id);
        tokio::spawn(async move {
            for i in 0..10 {
                patient_side
                    .send_message(&key, &format!("patient {i}"), None)
                    .await
                    .unwrap();
            }
        })
    };
    doctor_task.await.unwrap();
    patient_task.await.unwrap();

    let feed = doctor.open_conversation(&ConversationKey::persisted(&conversation_id));
    let view = feed.borrow().clone();
    assert_eq!(view.len(), 21);
    assert!(view
        .windows(2)
        .all(|w| w[0].created_at < w[1].created_at));
}

#[tokio::test]
async fn delete_requires_authorship_and_keeps_summary() {
    let store = Arc::new(MemoryStore::new());
    store.seed_patient("d-1", patient("p-1", "Ana Flores"));
    let doctor = doctor_service(&store, Arc::new(MemoryBlobStore::new()));
    let patient_side = patient_service(&store, "p-1");

    let message = doctor
        .send_message(&ConversationKey::ephemeral("p-1"), "for your eyes", None)
        .await
        .unwrap();
    let conversation_id = message.conversation_id.clone();

    // Non-owner delete is a refusal, not an error.
    let removed = patient_side
        .delete_message(&conversation_id, &message.id)
        .await
        .unwrap();
    assert!(!removed);
    assert_eq!(store.messages(&conversation_id).await.unwrap().len(), 1);

    // The author may delete; the summary line is not recomputed.
    let removed = doctor
        .delete_message(&conversation_id, &message.id)
        .await
        .unwrap();
    assert!(removed);
    assert!(store.messages(&conversation_id).await.unwrap().is_empty());
    let conversations = store.conversations("d-1").await.unwrap();
    assert_eq!(conversations[0].last_message, "for your eyes");
}

#[tokio::test]
async fn zero_byte_voice_capture_is_discarded_entirely() {
    let store = Arc::new(MemoryStore::new());
    store.seed_patient("d-1", patient("p-1", "Ana Flores"));
    let blobs = Arc::new(MemoryBlobStore::new());
    let service = doctor_service(&store, blobs.clone());

    let sent = service
        .send_voice_note(&ConversationKey::ephemeral("p-1"), b"", 0, None)
        .await
        .unwrap();
    assert!(sent.is_none());
    assert_eq!(blobs.object_count(), 0);
    // Not even a promotion happened.
    assert!(store.conversations("d-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn voice_note_uploads_then_appends_audio_message() {
    let store = Arc::new(MemoryStore::new());
    store.seed_patient("d-1", patient("p-1", "Ana Flores"));
    let blobs = Arc::new(MemoryBlobStore::new());
    let service = doctor_service(&store, blobs.clone());

    let message = service
        .send_voice_note(&ConversationKey::ephemeral("p-1"), b"opus-data", 7, None)
        .await
        .unwrap()
        .expect("non-empty capture should send");
    assert_eq!(message.kind, MessageKind::Audio);
    assert_eq!(message.duration, Some(7));
    let url = message.file_url.expect("audio carries a url");
    assert!(url.starts_with("memory://chat_attachments/"));
    assert_eq!(blobs.object_count(), 1);

    let conversations = store.conversations("d-1").await.unwrap();
    assert_eq!(conversations[0].last_message, "[AUDIO]");
}

#[tokio::test]
async fn file_send_against_missing_conversation_orphans_the_blob() {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let service = doctor_service(&store, blobs.clone());

    let err = service
        .send_file(
            &ConversationKey::persisted("c-vanished"),
            "scan.pdf",
            b"%PDF",
            None,
        )
        .await
        .unwrap_err();

    match err {
        CoreError::PartialFailure { blob_key, .. } => {
            assert!(blobs.contains(&blob_key));
        }
        other => panic!("expected PartialFailure, got {other:?}"),
    }
    assert_eq!(blobs.object_count(), 1);
}

#[tokio::test]
async fn blob_failure_aborts_the_send_before_any_message() {
    let store = Arc::new(MemoryStore::new());
    store.seed_patient("d-1", patient("p-1", "Ana Flores"));
    let mut flaky = MockFlakyBlobs::new();
    flaky
        .expect_put()
        .returning(|_, _| Err(BlobError("disk full".into())));
    let service = doctor_service(&store, Arc::new(flaky));

    let opener = service
        .send_message(&ConversationKey::ephemeral("p-1"), "hi", None)
        .await
        .unwrap();
    let key = ConversationKey::persisted(&opener.conversation_id);

    let err = service
        .send_file(&key, "scan.pdf", b"%PDF", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::TransportFailure(_)));
    assert_eq!(
        store.messages(&opener.conversation_id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn ephemeral_subscription_stays_empty() {
    let store = Arc::new(MemoryStore::new());
    store.seed_patient("d-1", patient("p-1", "Ana Flores"));
    let service = doctor_service(&store, Arc::new(MemoryBlobStore::new()));

    let key = ConversationKey::ephemeral("p-1");
    let feed = service.open_conversation(&key);
    assert!(feed.borrow().is_empty());

    // Promotion mints a new persisted id; the placeholder feed stays empty.
    service.send_message(&key, "hello", None).await.unwrap();
    assert!(feed.borrow().is_empty());
}

#[tokio::test]
async fn typed_sends_update_summary_and_unread_flow() {
    let store = Arc::new(MemoryStore::new());
    store.seed_patient("d-1", patient("p-1", "Ana Flores"));
    let doctor = doctor_service(&store, Arc::new(MemoryBlobStore::new()));
    let patient_side = patient_service(&store, "p-1");

    let opener = doctor
        .send_alert(
            &ConversationKey::ephemeral("p-1"),
            "Critical potassium level",
            None,
        )
        .await
        .unwrap();
    let conversation_id = opener.conversation_id.clone();
    let key = ConversationKey::persisted(&conversation_id);

    let conversations = store.conversations("d-1").await.unwrap();
    assert_eq!(conversations[0].last_message, "[ALERT]");
    assert_eq!(conversations[0].unread_count, 0);

    patient_side
        .send_message(&key, "feeling dizzy", None)
        .await
        .unwrap();
    let conversations = store.conversations("d-1").await.unwrap();
    assert_eq!(conversations[0].unread_count, 1);
    assert_eq!(conversations[0].last_message, "feeling dizzy");

    doctor.mark_read(&conversation_id).await.unwrap();
    let conversations = store.conversations("d-1").await.unwrap();
    assert_eq!(conversations[0].unread_count, 0);

    let rx = doctor
        .send_prescription(
            &key,
            MedicationEntry::new("Amlodipine", "5mg", "Daily"),
            None,
        )
        .await
        .unwrap();
    assert_eq!(rx.kind, MessageKind::Prescription);
    assert_eq!(
        rx.medication.as_ref().map(|m| m.name.as_str()),
        Some("Amlodipine")
    );
    let conversations = store.conversations("d-1").await.unwrap();
    assert_eq!(conversations[0].last_message, "[PRESCRIPTION]");
}

#[tokio::test]
async fn unknown_patient_aborts_without_a_write() {
    let store = Arc::new(MemoryStore::new());
    let service = doctor_service(&store, Arc::new(MemoryBlobStore::new()));

    let err = service
        .send_message(&ConversationKey::ephemeral("p-ghost"), "anyone there?", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ResolutionFailure(_)));
    assert!(store.conversations("d-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn focused_patient_reference_resolves_outside_the_roster() {
    let store = Arc::new(MemoryStore::new());
    let service = doctor_service(&store, Arc::new(MemoryBlobStore::new()));

    let focused = patient("p-walkin", "Walk-in Patient");
    let message = service
        .send_message(
            &ConversationKey::ephemeral("p-walkin"),
            "welcome",
            Some(&focused),
        )
        .await
        .unwrap();

    let conversations = store.conversations("d-1").await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].patient_name, "Walk-in Patient");
    assert_eq!(message.text, "welcome");
}

#[tokio::test]
async fn live_directory_recomputes_on_both_inputs() {
    let store = Arc::new(MemoryStore::new());
    let service = doctor_service(&store, Arc::new(MemoryBlobStore::new()));

    let mut feed = service.watch_directory();
    assert!(feed.borrow().is_empty());

    store.seed_patient("d-1", patient("p-1", "Ana Flores"));
    feed.changed().await.unwrap();
    {
        let view = feed.borrow();
        assert_eq!(view.len(), 1);
        assert!(view[0].is_ephemeral());
    }

    service
        .send_message(&ConversationKey::ephemeral("p-1"), "hello", None)
        .await
        .unwrap();
    feed.changed().await.unwrap();
    let view = feed.borrow().clone();
    assert_eq!(view.len(), 1);
    assert!(!view[0].is_ephemeral());
}

#[tokio::test]
async fn snapshot_reads_records_most_recent_first() {
    let store = Arc::new(MemoryStore::new());
    store.seed_patient("d-1", patient("p-1", "Ana Flores"));
    store.seed_record(MedicalRecord {
        id: "r-new".into(),
        patient_id: "p-1".into(),
        date: chrono::NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        record_type: Some("vitals_log".into()),
        title: None,
        vitals: Some(RecordVitals::Structured(VitalSigns {
            bp: Some("130/85".into()),
            heart_rate: None,
            temperature: None,
            spo2: None,
        })),
        medications: vec![],
        description: None,
        summary: None,
    });
    store.seed_record(MedicalRecord {
        id: "r-old".into(),
        patient_id: "p-1".into(),
        date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        record_type: Some("consultation_note".into()),
        title: None,
        vitals: None,
        medications: vec![],
        description: Some("hr 60 bpm".into()),
        summary: None,
    });
    let service = doctor_service(&store, Arc::new(MemoryBlobStore::new()));

    let snapshot = service.snapshot_for("p-1").await.unwrap();
    assert_eq!(snapshot.bp, "130/85");
    assert_eq!(snapshot.heart_rate, "60");
    assert_eq!(snapshot.temperature, "--");
    assert_eq!(snapshot.spo2, "--");
}
