use serde::{Deserialize, Deserializer, Serialize};

use super::record::{MedicationEntry, VitalSigns};

/// A patient as owned by the external patient directory. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default = "default_status")]
    pub status: String, // coarse label, e.g. "Active", "Discharged"
    #[serde(default)]
    pub vitals: Option<VitalSigns>,
    #[serde(default, deserialize_with = "lenient_allergies")]
    pub allergies: Option<AllergiesField>,
    #[serde(default)]
    pub medications: Vec<MedicationEntry>,
}

fn default_status() -> String {
    "Active".to_string()
}

impl Patient {
    pub fn is_active(&self) -> bool {
        self.status == "Active"
    }

    /// Allergies normalized to trimmed, non-empty strings. Historical
    /// profiles carry either a comma-separated string or a list; any other
    /// shape yields an empty list rather than an error.
    pub fn allergy_list(&self) -> Vec<String> {
        match &self.allergies {
            Some(AllergiesField::Text(s)) => s
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            Some(AllergiesField::List(items)) => items
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Allergies appear in two historical shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllergiesField {
    Text(String),
    List(Vec<String>),
}

/// Accepts the two known shapes and degrades anything else to `None`
/// instead of failing the whole patient document.
fn lenient_allergies<'de, D>(deserializer: D) -> Result<Option<AllergiesField>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(AllergiesField::Text(s)),
        serde_json::Value::Array(items) => Some(AllergiesField::List(
            items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient_from(json: &str) -> Patient {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn allergies_from_comma_separated_string() {
        let p = patient_from(r#"{"id":"p1","name":"Ana","allergies":"Penicillin, Latex , "}"#);
        assert_eq!(p.allergy_list(), vec!["Penicillin", "Latex"]);
    }

    #[test]
    fn allergies_from_list() {
        let p = patient_from(r#"{"id":"p1","name":"Ana","allergies":["Aspirin","  Nuts "]}"#);
        assert_eq!(p.allergy_list(), vec!["Aspirin", "Nuts"]);
    }

    #[test]
    fn unexpected_allergy_shape_becomes_empty() {
        let p = patient_from(r#"{"id":"p1","name":"Ana","allergies":42}"#);
        assert!(p.allergy_list().is_empty());

        let p = patient_from(r#"{"id":"p1","name":"Ana"}"#);
        assert!(p.allergy_list().is_empty());
    }

    #[test]
    fn status_defaults_to_active() {
        let p = patient_from(r#"{"id":"p1","name":"Ana"}"#);
        assert!(p.is_active());
    }
}
