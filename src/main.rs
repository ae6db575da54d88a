//! Carelink demo binary.
//!
//! Drives the conversation core against the in-memory store: a seeded
//! roster and record set, a scripted clinician conversation, and the
//! derived clinical snapshot.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use carelink::models::record::{MedicalRecord, MedicationEntry, RecordVitals, VitalSigns};
use carelink::store::memory::{MemoryBlobStore, MemoryStore, StaticIdentity};
use carelink::{ChatService, ConversationKey, Patient};

#[derive(Parser)]
#[command(name = "carelink", about = "Clinician/patient conversation core demo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted conversation against the in-memory store
    Demo,
    /// Run the vitals heuristics over a piece of text
    ParseVitals { text: String },
    /// Derive the seeded demo patient's clinical snapshot
    Snapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let settings = carelink::config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log.filter.clone())),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::ParseVitals { text } => {
            let reading = carelink::extract::parse_vitals(&text);
            println!("{reading:#?}");
            return Ok(());
        }
        Commands::Demo => run_demo(&settings).await?,
        Commands::Snapshot => run_snapshot(&settings).await?,
    }
    Ok(())
}

fn build_service(settings: &carelink::config::Settings) -> (ChatService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let actor = settings.actor();
    let identity = Arc::new(match actor.role {
        carelink::SenderRole::Doctor => StaticIdentity::doctor(actor.id, actor.name),
        carelink::SenderRole::Patient => StaticIdentity::patient(actor.id, actor.name),
    });

    let service = ChatService::new(
        identity,
        store.clone(),
        store.clone(),
        store.clone(),
        blobs,
    );
    (service, store)
}

fn seed(store: &MemoryStore, doctor_id: &str) {
    let ana: Patient = serde_json::from_value(serde_json::json!({
        "id": "p-ana",
        "name": "Ana Flores",
        "condition": "Hypertension",
        "status": "Active",
        "allergies": "Penicillin, Latex",
        "medications": [
            { "name": "Lisinopril", "dosage": "10mg", "frequency": "Daily" }
        ]
    }))
    .expect("static seed patient");
    let ben: Patient = serde_json::from_value(serde_json::json!({
        "id": "p-ben",
        "name": "Ben Okafor",
        "status": "Active"
    }))
    .expect("static seed patient");
    store.seed_patient(doctor_id, ana);
    store.seed_patient(doctor_id, ben);

    store.seed_record(MedicalRecord {
        id: "r-device".into(),
        patient_id: "p-ana".into(),
        date: NaiveDate::from_ymd_opt(2024, 3, 2).expect("static date"),
        record_type: Some("vitals_log".into()),
        title: Some("Device vitals log".into()),
        vitals: Some(RecordVitals::Structured(VitalSigns {
            bp: Some("130/85".into()),
            heart_rate: None,
            temperature: None,
            spo2: None,
        })),
        medications: vec![MedicationEntry::new("Amlodipine", "5mg", "Daily")],
        description: None,
        summary: None,
    });
    store.seed_record(MedicalRecord {
        id: "r-legacy".into(),
        patient_id: "p-ana".into(),
        date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("static date"),
        record_type: Some("consultation_note".into()),
        title: Some("Telehealth session note".into()),
        vitals: None,
        medications: vec![],
        description: Some(
            "Headache resolved. hr 72 bpm, temp 98.6, spo2 97%.\n\n\
             Medications:\n• Lisinopril (10mg)\n• Aspirin (81mg)"
                .into(),
        ),
        summary: None,
    });
}

async fn run_demo(settings: &carelink::config::Settings) -> Result<()> {
    let (service, store) = build_service(settings);
    let doctor_id = settings.actor().id;
    seed(&store, &doctor_id);

    println!("== Directory ==");
    for entry in service.directory().await? {
        println!(
            "  [{}] {:<12} {} - {}",
            if entry.is_ephemeral() { "ephemeral" } else { "persisted" },
            entry.key(),
            entry.patient_name(),
            entry.last_message(),
        );
    }

    // First outbound send promotes the placeholder to a real conversation.
    let key = ConversationKey::ephemeral("p-ana");
    let first = service
        .send_message(&key, "Good morning Ana, how are you feeling today?", None)
        .await?;
    let conversation = ConversationKey::persisted(&first.conversation_id);
    info!(conversation_id = %first.conversation_id, "conversation started");

    service
        .send_vitals_request(&conversation, None)
        .await?;
    service
        .send_file(&conversation, "care_plan.pdf", b"%PDF-1.4 demo", None)
        .await?;
    service
        .send_prescription(
            &conversation,
            MedicationEntry::new("Amlodipine", "5mg", "Daily"),
            None,
        )
        .await?;

    println!("\n== Message log ==");
    let feed = service.open_conversation(&conversation);
    for message in feed.borrow().iter() {
        println!(
            "  {} {:>14} {}",
            message.created_at.format("%H:%M:%S%.3f"),
            format!("{:?}", message.kind),
            message.text,
        );
    }

    println!("\n== Directory after first contact ==");
    for entry in service.directory().await? {
        println!(
            "  [{}] {} - {}",
            if entry.is_ephemeral() { "ephemeral" } else { "persisted" },
            entry.patient_name(),
            entry.last_message(),
        );
    }
    Ok(())
}

async fn run_snapshot(settings: &carelink::config::Settings) -> Result<()> {
    let (service, store) = build_service(settings);
    seed(&store, &settings.actor().id);

    let snapshot = service.snapshot_for("p-ana").await?;
    println!("Clinical snapshot for Ana Flores");
    println!("  BP:          {}", snapshot.bp);
    println!("  Heart rate:  {}", snapshot.heart_rate);
    println!("  Temperature: {}", snapshot.temperature);
    println!("  SpO2:        {}", snapshot.spo2);
    println!(
        "  Last update: {}",
        snapshot
            .last_updated
            .map(|d| d.to_string())
            .unwrap_or_else(|| "--".into()),
    );
    println!("  Allergies:   {}", snapshot.allergies.join(", "));
    println!("  Medications:");
    for med in &snapshot.medications {
        println!("    - {} {} ({})", med.name, med.dosage, med.frequency);
    }
    Ok(())
}
