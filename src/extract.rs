//! Heuristic extraction of vitals and medication lines from free-form
//! clinical text.
//!
//! Each vitals field runs an ordered list of named rules: a label-anchored
//! pattern first, a unit-anchored fallback second. The first capture wins.
//! This is a best-effort layer, not a validated clinical parser: overlapping
//! matches (a date read as a blood pressure, an unrelated percentage read as
//! SpO2) are a known and accepted trade-off. The only sanity bound applied
//! is the SpO2 > 100 rejection.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::models::record::{MedicationEntry, LEGACY_DOSAGE, LEGACY_FREQUENCY};

/// Partial map of recognized vitals fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VitalsReading {
    pub bp: Option<String>,
    pub heart_rate: Option<String>,
    pub temperature: Option<String>,
    pub spo2: Option<String>,
}

impl VitalsReading {
    pub fn is_empty(&self) -> bool {
        self.bp.is_none()
            && self.heart_rate.is_none()
            && self.temperature.is_none()
            && self.spo2.is_none()
    }
}

/// One named extraction rule. Rules run in declaration order; the first
/// whose pattern matches supplies the field.
struct ExtractionRule {
    name: &'static str,
    pattern: Regex,
}

impl ExtractionRule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("invalid extraction pattern"),
        }
    }
}

static BP_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        ExtractionRule::new(
            "bp-labeled",
            r"(?:bp|blood pressure|b\.p|press|sys)[^0-9]*(\d{2,3}[/-]\d{2,3})",
        ),
        ExtractionRule::new("bp-unit", r"(\d{2,3}[/-]\d{2,3})\s*mmhg"),
        // Bare pair, bounded to plausible systolic/diastolic ranges so dates
        // and arbitrary digit pairs don't match.
        ExtractionRule::new("bp-bare-pair", r"\b((?:9\d|1\d{2})/(?:[4-9]\d|1\d{2}))\b"),
    ]
});

static HR_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        ExtractionRule::new("hr-labeled", r"(?:hr|heart rate|pulse|rate)[^0-9]*(\d{2,3})"),
        ExtractionRule::new("hr-unit", r"(\d{2,3})\s*bpm"),
    ]
});

static TEMP_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        ExtractionRule::new(
            "temp-labeled",
            r"(?:temp|temperature|t)[^0-9]*(\d{2,3}(?:\.\d+)?)",
        ),
        ExtractionRule::new("temp-unit", r"(\d{2,3}(?:\.\d+)?)\s*(?:°|deg)?\s*(?:f|c)\b"),
    ]
});

static SPO2_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        ExtractionRule::new("spo2-labeled", r"(?:spo2|o2|oxygen|sat)[^0-9]*(\d{2,3})"),
        ExtractionRule::new("spo2-unit", r"(\d{2,3})\s*%"),
    ]
});

/// Runs the per-field rule chains over a piece of free text.
pub fn parse_vitals(text: &str) -> VitalsReading {
    let lower = text.to_lowercase();
    let mut reading = VitalsReading {
        bp: first_capture(&BP_RULES, &lower),
        heart_rate: first_capture(&HR_RULES, &lower),
        temperature: first_capture(&TEMP_RULES, &lower),
        spo2: first_capture(&SPO2_RULES, &lower),
    };

    // A percentage above 100 is not an oxygen saturation.
    if let Some(sat) = &reading.spo2 {
        if sat.parse::<u32>().map(|v| v > 100).unwrap_or(true) {
            debug!(value = %sat, "discarding out-of-range spo2 match");
            reading.spo2 = None;
        }
    }
    reading
}

fn first_capture(rules: &[ExtractionRule], text: &str) -> Option<String> {
    rules.iter().find_map(|rule| {
        rule.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| {
                debug!(rule = rule.name, value = m.as_str(), "extraction rule hit");
                m.as_str().to_string()
            })
    })
}

/// Words that start legacy note section headers, never medication names.
const SECTION_STOPLIST: &[&str] = &["patient", "diagnosis", "plan", "history"];

/// `name (dosage)` with a name of letters/digits/space/slash/dot, at least
/// four characters.
static MED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9 /.]{3,}?)\s*(?:\(([^)]+)\))?\s*$")
        .expect("invalid medication line pattern")
});

/// Line-by-line parser for the legacy bulleted medication format.
///
/// A `Medications:` marker opens a section and a blank line closes it; lines
/// inside the section, or lines starting with a bullet anywhere in the text,
/// are read as `name (dosage)`. Dosage and frequency fall back to the legacy
/// markers when absent.
pub fn parse_medications(text: &str) -> Vec<MedicationEntry> {
    let mut meds = Vec::new();
    let mut in_section = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            in_section = false;
            continue;
        }
        let lower = line.to_lowercase();
        if lower.contains("medications:") {
            in_section = true;
            continue;
        }
        let bulleted = line.starts_with('•') || line.starts_with('-') || line.starts_with('*');
        if !in_section && !bulleted {
            continue;
        }

        let candidate = line.trim_start_matches(&['•', '-', '*'][..]).trim();
        let Some(caps) = MED_LINE.captures(candidate) else {
            continue;
        };
        let Some(name_match) = caps.get(1) else {
            continue;
        };
        let name = name_match.as_str().trim().to_string();
        let lower_name = name.to_lowercase();
        if SECTION_STOPLIST.iter().any(|w| lower_name.starts_with(w)) {
            continue;
        }

        let dosage = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| LEGACY_DOSAGE.to_string());
        meds.push(MedicationEntry::new(name, dosage, LEGACY_FREQUENCY));
    }
    meds
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("BP 120/80" => Some("120/80".to_string()); "labeled bp")]
    #[test_case("blood pressure was 135/85 today" => Some("135/85".to_string()); "labeled long form")]
    #[test_case("reading of 118/76 mmHg" => Some("118/76".to_string()); "unit anchored")]
    #[test_case("stable at 128/84 overnight" => Some("128/84".to_string()); "bare pair in range")]
    #[test_case("follow up on 12/03 next month" => None; "date-like pair rejected by range")]
    #[test_case("no readings recorded" => None; "absent")]
    fn bp_extraction(text: &str) -> Option<String> {
        parse_vitals(text).bp
    }

    #[test_case("HR 72" => Some("72".to_string()); "labeled hr")]
    #[test_case("pulse steady at 64" => Some("64".to_string()); "labeled pulse")]
    #[test_case("measured 88bpm after walking" => Some("88".to_string()); "unit anchored")]
    fn heart_rate_extraction(text: &str) -> Option<String> {
        parse_vitals(text).heart_rate
    }

    #[test_case("Temp 98.6" => Some("98.6".to_string()); "labeled with decimals")]
    #[test_case("fever of 101 F overnight" => Some("101".to_string()); "unit anchored")]
    fn temperature_extraction(text: &str) -> Option<String> {
        parse_vitals(text).temperature
    }

    #[test_case("SpO2 97" => Some("97".to_string()); "labeled")]
    #[test_case("sat dropped to 91" => Some("91".to_string()); "labeled sat")]
    #[test_case("oxygen 94%" => Some("94".to_string()); "labeled oxygen")]
    #[test_case("holding steady, 96% on room air" => Some("96".to_string()); "unit anchored")]
    #[test_case("spo2 150%" => None; "over 100 discarded")]
    fn spo2_extraction(text: &str) -> Option<String> {
        parse_vitals(text).spo2
    }

    #[test]
    fn mixed_line_extracts_each_field_independently() {
        let reading = parse_vitals("BP 120/80, pulse 72bpm, spo2 150%");
        assert_eq!(reading.bp.as_deref(), Some("120/80"));
        assert_eq!(reading.heart_rate.as_deref(), Some("72"));
        assert_eq!(reading.spo2, None);
        assert_eq!(reading.temperature, None);
    }

    #[test]
    fn empty_text_yields_empty_reading() {
        assert!(parse_vitals("").is_empty());
        assert!(parse_vitals("patient resting comfortably").is_empty());
    }

    #[test]
    fn medications_section_is_parsed_line_by_line() {
        let text = "Assessment stable.\n\nMedications:\nAmoxicillin (500mg)\nLisinopril\n\nPlan: rest.";
        let meds = parse_medications(text);
        assert_eq!(meds.len(), 2);
        assert_eq!(meds[0].name, "Amoxicillin");
        assert_eq!(meds[0].dosage, "500mg");
        assert_eq!(meds[1].name, "Lisinopril");
        assert_eq!(meds[1].dosage, LEGACY_DOSAGE);
        assert_eq!(meds[1].frequency, LEGACY_FREQUENCY);
    }

    #[test]
    fn bullets_are_recognized_outside_a_section() {
        let meds = parse_medications("Notes follow\n• Metformin (850mg)\n- Atorvastatin 20mg");
        assert_eq!(meds.len(), 2);
        assert_eq!(meds[0].name, "Metformin");
        assert_eq!(meds[1].name, "Atorvastatin 20mg");
    }

    #[test]
    fn blank_line_closes_the_section() {
        let meds = parse_medications("Medications:\nIbuprofen (200mg)\n\nParacetamol");
        assert_eq!(meds.len(), 1);
        assert_eq!(meds[0].name, "Ibuprofen");
    }

    #[test]
    fn section_header_words_are_stoplisted() {
        let meds = parse_medications(
            "Medications:\nPatient tolerates all\nDiagnosis pending\nPlan of care\nHistory noted\nWarfarin (2mg)",
        );
        assert_eq!(meds.len(), 1);
        assert_eq!(meds[0].name, "Warfarin");
    }

    #[test]
    fn short_names_are_rejected() {
        assert!(parse_medications("Medications:\nabc").is_empty());
    }
}
