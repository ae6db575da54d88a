//! Point-in-time clinical snapshot derivation.
//!
//! The snapshot is a pure function of a patient profile and an ordered
//! record set: recomputed on demand, never persisted, never an error.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::extract::{parse_medications, parse_vitals, VitalsReading};
use crate::models::patient::Patient;
use crate::models::record::{MedicalRecord, MedicationEntry, VitalSigns};

/// Placeholder rendered for a vitals field no source could supply.
pub const UNKNOWN: &str = "--";

/// The derived current clinical picture for one patient.
#[derive(Debug, Clone, Serialize)]
pub struct ClinicalSnapshot {
    pub bp: String,
    pub heart_rate: String,
    pub temperature: String,
    pub spo2: String,
    /// Date of the most recent record that contributed a vitals field.
    pub last_updated: Option<NaiveDate>,
    pub allergies: Vec<String>,
    pub medications: Vec<MedicationEntry>,
}

/// Derives the snapshot from a profile and a record set.
///
/// `records` must be ordered most-recent-first; the first writer for each
/// vitals field wins. Within a single record, structured data beats
/// heuristic text data; across records, recency beats structure. Profile
/// vitals are only the base layer beneath whatever the scan produced.
pub fn aggregate(patient: &Patient, records: &[MedicalRecord]) -> ClinicalSnapshot {
    let mut vitals = VitalSigns::default();
    let mut last_updated = None;

    for record in records {
        if vitals.is_complete() {
            break;
        }
        let before = filled_fields(&vitals);

        if let Some(structured) = record.structured_vitals() {
            merge_structured(&mut vitals, structured);
        }
        if !vitals.is_complete() {
            let narrative = record.narrative();
            if !narrative.is_empty() {
                merge_reading(&mut vitals, &parse_vitals(&narrative));
            }
        }

        if last_updated.is_none() && filled_fields(&vitals) > before {
            last_updated = Some(record.date);
        }
    }

    if let Some(profile) = &patient.vitals {
        merge_structured(&mut vitals, profile);
    }

    ClinicalSnapshot {
        bp: vitals.bp.unwrap_or_else(|| UNKNOWN.to_string()),
        heart_rate: vitals.heart_rate.unwrap_or_else(|| UNKNOWN.to_string()),
        temperature: vitals.temperature.unwrap_or_else(|| UNKNOWN.to_string()),
        spo2: vitals.spo2.unwrap_or_else(|| UNKNOWN.to_string()),
        last_updated,
        allergies: patient.allergy_list(),
        medications: reconcile_medications(patient, records),
    }
}

/// Flattens medication entries across the record set in the given order
/// (structured list per record when present, legacy text otherwise), then
/// dedupes by name, first occurrence winning. The profile list sits at the
/// lowest precedence, after every record.
fn reconcile_medications(patient: &Patient, records: &[MedicalRecord]) -> Vec<MedicationEntry> {
    let mut flat: Vec<MedicationEntry> = Vec::new();
    for record in records {
        if !record.medications.is_empty() {
            flat.extend(record.medications.iter().cloned());
        } else {
            let narrative = record.narrative();
            if !narrative.is_empty() {
                flat.extend(parse_medications(&narrative));
            }
        }
    }
    flat.extend(patient.medications.iter().cloned());

    let mut seen = HashSet::new();
    flat.retain(|m| seen.insert(m.name.trim().to_lowercase()));
    flat
}

fn filled_fields(vitals: &VitalSigns) -> usize {
    [
        &vitals.bp,
        &vitals.heart_rate,
        &vitals.temperature,
        &vitals.spo2,
    ]
    .iter()
    .filter(|f| f.is_some())
    .count()
}

fn merge_structured(dst: &mut VitalSigns, src: &VitalSigns) {
    fill(&mut dst.bp, &src.bp);
    fill(&mut dst.heart_rate, &src.heart_rate);
    fill(&mut dst.temperature, &src.temperature);
    fill(&mut dst.spo2, &src.spo2);
}

fn merge_reading(dst: &mut VitalSigns, src: &VitalsReading) {
    fill(&mut dst.bp, &src.bp);
    fill(&mut dst.heart_rate, &src.heart_rate);
    fill(&mut dst.temperature, &src.temperature);
    fill(&mut dst.spo2, &src.spo2);
}

fn fill(dst: &mut Option<String>, src: &Option<String>) {
    if dst.is_none() {
        if let Some(value) = src {
            *dst = Some(value.clone());
        }
    }
}
