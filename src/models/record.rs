use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Dosage marker for medication lines parsed out of legacy note text.
pub const LEGACY_DOSAGE: &str = "As prescribed";
/// Frequency marker for medication lines parsed out of legacy note text.
pub const LEGACY_FREQUENCY: &str = "See notes";

/// Structured vitals object as written by device logs and finalized notes.
///
/// Field names are aliased to the keys older records were stored under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalSigns {
    #[serde(default)]
    pub bp: Option<String>,
    #[serde(default, alias = "heartRate")]
    pub heart_rate: Option<String>,
    #[serde(default, alias = "temp")]
    pub temperature: Option<String>,
    #[serde(default, alias = "spO2")]
    pub spo2: Option<String>,
}

impl VitalSigns {
    pub fn is_complete(&self) -> bool {
        self.bp.is_some()
            && self.heart_rate.is_some()
            && self.temperature.is_some()
            && self.spo2.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.bp.is_none()
            && self.heart_rate.is_none()
            && self.temperature.is_none()
            && self.spo2.is_none()
    }
}

/// One active-medication line. Shared by patient profiles, structured
/// records, and prescription messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub name: String,
    #[serde(default, alias = "dose")]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
}

impl MedicationEntry {
    pub fn new(
        name: impl Into<String>,
        dosage: impl Into<String>,
        frequency: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            dosage: dosage.into(),
            frequency: frequency.into(),
        }
    }
}

/// Records carry vitals either as a structured object or as free text;
/// legacy notes put readings straight into the narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordVitals {
    Structured(VitalSigns),
    Text(String),
}

/// A clinical record as owned by the external records collaborator.
/// Read-only to this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: String,
    pub patient_id: String,
    pub date: NaiveDate,
    /// e.g. "consultation_note", "prescription", "lab_report", "vitals_log"
    #[serde(default, rename = "type")]
    pub record_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub vitals: Option<RecordVitals>,
    #[serde(default)]
    pub medications: Vec<MedicationEntry>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl MedicalRecord {
    /// The structured vitals object, when this record has one.
    pub fn structured_vitals(&self) -> Option<&VitalSigns> {
        match &self.vitals {
            Some(RecordVitals::Structured(v)) => Some(v),
            _ => None,
        }
    }

    /// Everything free-text on this record that may embed readings or a
    /// medication list: a string vitals field, the description, the summary.
    pub fn narrative(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(RecordVitals::Text(t)) = &self.vitals {
            parts.push(t);
        }
        if let Some(d) = &self.description {
            parts.push(d);
        }
        if let Some(s) = &self.summary {
            parts.push(s);
        }
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_vitals_deserializes_both_shapes() {
        let structured: RecordVitals =
            serde_json::from_str(r#"{"bp":"120/80","heartRate":"72"}"#).unwrap();
        match structured {
            RecordVitals::Structured(v) => {
                assert_eq!(v.bp.as_deref(), Some("120/80"));
                assert_eq!(v.heart_rate.as_deref(), Some("72"));
                assert!(v.temperature.is_none());
            }
            RecordVitals::Text(_) => panic!("object should parse as structured vitals"),
        }

        let legacy: RecordVitals = serde_json::from_str(r#""BP 140/90, hr 88""#).unwrap();
        assert_eq!(legacy, RecordVitals::Text("BP 140/90, hr 88".to_string()));
    }

    #[test]
    fn narrative_joins_text_fields_only() {
        let record = MedicalRecord {
            id: "r1".into(),
            patient_id: "p1".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            record_type: Some("consultation_note".into()),
            title: None,
            vitals: Some(RecordVitals::Text("bp 120/80".into())),
            medications: vec![],
            description: Some("Patient stable.".into()),
            summary: None,
        };
        assert_eq!(record.narrative(), "bp 120/80\nPatient stable.");
        assert!(record.structured_vitals().is_none());
    }
}
