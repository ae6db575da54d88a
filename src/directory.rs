//! Unified conversation directory: every persisted conversation plus an
//! ephemeral placeholder for each roster patient who has none yet.

use std::collections::HashSet;

use crate::models::conversation::{
    Conversation, ConversationKey, DEFAULT_AVATAR_COLOR, DEFAULT_CONDITION,
};
use crate::models::patient::Patient;

/// Summary line shown for a conversation that has not started yet.
pub const PLACEHOLDER_SUMMARY: &str = "Start a conversation...";

/// One addressable row in the clinician's conversation list.
///
/// Ephemeral entries are not persisted conversations for the same patient:
/// they carry no history and use the deterministic `temp_` key scheme.
#[derive(Debug, Clone)]
pub enum DirectoryEntry {
    Persisted(Conversation),
    Ephemeral(EphemeralEntry),
}

#[derive(Debug, Clone)]
pub struct EphemeralEntry {
    pub key: String,
    pub patient_id: String,
    pub patient_name: String,
    pub condition: String,
    pub status: String,
    pub avatar_color: String,
}

impl DirectoryEntry {
    /// The string the entry is addressed by: a store id or a `temp_` key.
    pub fn key(&self) -> &str {
        match self {
            DirectoryEntry::Persisted(c) => &c.id,
            DirectoryEntry::Ephemeral(e) => &e.key,
        }
    }

    pub fn patient_id(&self) -> &str {
        match self {
            DirectoryEntry::Persisted(c) => &c.patient_id,
            DirectoryEntry::Ephemeral(e) => &e.patient_id,
        }
    }

    pub fn patient_name(&self) -> &str {
        match self {
            DirectoryEntry::Persisted(c) => &c.patient_name,
            DirectoryEntry::Ephemeral(e) => &e.patient_name,
        }
    }

    pub fn last_message(&self) -> &str {
        match self {
            DirectoryEntry::Persisted(c) => &c.last_message,
            DirectoryEntry::Ephemeral(_) => PLACEHOLDER_SUMMARY,
        }
    }

    pub fn unread_count(&self) -> u32 {
        match self {
            DirectoryEntry::Persisted(c) => c.unread_count,
            DirectoryEntry::Ephemeral(_) => 0,
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, DirectoryEntry::Ephemeral(_))
    }
}

/// Pure projection of the two live inputs into one de-duplicated list:
/// persisted conversations first (newest activity first), then a
/// placeholder for every roster patient not covered by one.
pub fn unified_directory(conversations: &[Conversation], roster: &[Patient]) -> Vec<DirectoryEntry> {
    let mut sorted: Vec<Conversation> = conversations.to_vec();
    sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let covered: HashSet<String> = sorted.iter().map(|c| c.patient_id.clone()).collect();

    let mut entries: Vec<DirectoryEntry> = Vec::with_capacity(sorted.len() + roster.len());
    entries.extend(sorted.into_iter().map(DirectoryEntry::Persisted));

    for patient in roster {
        if covered.contains(&patient.id) {
            continue;
        }
        entries.push(DirectoryEntry::Ephemeral(EphemeralEntry {
            key: ConversationKey::ephemeral(&patient.id).to_string(),
            patient_id: patient.id.clone(),
            patient_name: patient.name.clone(),
            condition: patient
                .condition
                .clone()
                .unwrap_or_else(|| DEFAULT_CONDITION.to_string()),
            status: if patient.is_active() { "online" } else { "offline" }.to_string(),
            avatar_color: DEFAULT_AVATAR_COLOR.to_string(),
        }));
    }
    entries
}

/// Case-insensitive substring search over patient display names.
pub fn search<'a>(entries: &'a [DirectoryEntry], term: &str) -> Vec<&'a DirectoryEntry> {
    let needle = term.to_lowercase();
    entries
        .iter()
        .filter(|e| e.patient_name().to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn patient(id: &str, name: &str) -> Patient {
        serde_json::from_str(&format!(r#"{{"id":"{id}","name":"{name}"}}"#)).unwrap()
    }

    fn conversation(id: &str, patient_id: &str, name: &str, updated_secs: i64) -> Conversation {
        Conversation {
            id: id.to_string(),
            doctor_id: "d1".to_string(),
            patient_id: patient_id.to_string(),
            patient_name: name.to_string(),
            condition: DEFAULT_CONDITION.to_string(),
            status: "online".to_string(),
            last_message: "hello".to_string(),
            updated_at: Utc.timestamp_opt(updated_secs, 0).single().unwrap(),
            unread_count: 0,
            avatar_color: DEFAULT_AVATAR_COLOR.to_string(),
        }
    }

    #[test]
    fn roster_patients_without_conversations_get_one_ephemeral_entry() {
        let convs = vec![conversation("c1", "p1", "Ana Flores", 100)];
        let roster = vec![patient("p1", "Ana Flores"), patient("p2", "Ben Okafor")];

        let entries = unified_directory(&convs, &roster);
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].is_ephemeral());
        assert!(entries[1].is_ephemeral());
        assert_eq!(entries[1].key(), "temp_p2");
        assert_eq!(entries[1].last_message(), PLACEHOLDER_SUMMARY);
    }

    #[test]
    fn persisted_conversation_suppresses_the_ephemeral_entry() {
        let roster = vec![patient("p1", "Ana Flores")];

        let before = unified_directory(&[], &roster);
        assert_eq!(before.len(), 1);
        assert!(before[0].is_ephemeral());

        let convs = vec![conversation("c1", "p1", "Ana Flores", 100)];
        let after = unified_directory(&convs, &roster);
        assert_eq!(after.len(), 1);
        assert!(!after[0].is_ephemeral());
    }

    #[test]
    fn persisted_entries_sort_by_recency() {
        let convs = vec![
            conversation("c-old", "p1", "Ana Flores", 100),
            conversation("c-new", "p2", "Ben Okafor", 200),
        ];
        let entries = unified_directory(&convs, &[]);
        assert_eq!(entries[0].key(), "c-new");
        assert_eq!(entries[1].key(), "c-old");
    }

    #[test]
    fn search_matches_case_insensitive_substrings() {
        let roster = vec![patient("p1", "Ana Flores"), patient("p2", "Ben Okafor")];
        let entries = unified_directory(&[], &roster);

        let hits = search(&entries, "flor");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].patient_name(), "Ana Flores");
        assert_eq!(search(&entries, "OKAFOR").len(), 1);
        assert_eq!(search(&entries, "zzz").len(), 0);
        assert_eq!(search(&entries, "").len(), 2);
    }
}
