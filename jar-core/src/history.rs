use serde::{Deserialize, Serialize};

use crate::models::JarId;

pub const MAX_HISTORY: usize = 5;

/// Recently used jars, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JarHistory {
    entries: Vec<JarId>,
}

impl JarHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a history from stored entries, dropping duplicates and overflow.
    pub fn from_entries(entries: impl IntoIterator<Item = JarId>) -> Self {
        let mut history = JarHistory::new();
        for id in entries {
            if !history.entries.contains(&id) && history.entries.len() < MAX_HISTORY {
                history.entries.push(id);
            }
        }
        history
    }

    /// Moves `id` to the front, inserting it if needed.
    pub fn remember(&mut self, id: JarId) {
        self.entries.retain(|existing| existing != &id);
        self.entries.insert(0, id);
        self.entries.truncate(MAX_HISTORY);
    }

    /// Returns true if the id was present.
    pub fn forget(&mut self, id: &JarId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|existing| existing != id);
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[JarId] {
        &self.entries
    }

    pub fn contains(&self, id: &JarId) -> bool {
        self.entries.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jar(code: &str) -> JarId {
        JarId::parse(code).unwrap()
    }

    #[test]
    fn test_history_caps_at_five_most_recent_first() {
        let mut history = JarHistory::new();
        for code in ["A1", "B2", "C3", "D4", "E5", "F6", "G7"] {
            history.remember(jar(code));
        }

        let codes: Vec<&str> = history.entries().iter().map(JarId::as_str).collect();
        assert_eq!(codes, vec!["G7", "F6", "E5", "D4", "C3"]);
    }

    #[test]
    fn test_remembering_existing_id_moves_it_to_front() {
        let mut history = JarHistory::new();
        history.remember(jar("A1"));
        history.remember(jar("B2"));
        history.remember(jar("C3"));

        history.remember(jar("a1"));

        let codes: Vec<&str> = history.entries().iter().map(JarId::as_str).collect();
        assert_eq!(codes, vec!["A1", "C3", "B2"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_forget() {
        let mut history = JarHistory::new();
        history.remember(jar("A1"));
        history.remember(jar("B2"));

        assert!(history.forget(&jar("A1")));
        assert!(!history.forget(&jar("A1")));
        assert_eq!(history.entries(), &[jar("B2")]);
    }

    #[test]
    fn test_from_entries_repairs_stored_lists() {
        let stored = ["A", "B", "A", "C", "D", "E", "F", "G"].map(jar);
        let history = JarHistory::from_entries(stored);
        let codes: Vec<&str> = history.entries().iter().map(JarId::as_str).collect();
        assert_eq!(codes, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_history_serializes_as_plain_array() {
        let mut history = JarHistory::new();
        history.remember(jar("A1"));
        history.remember(jar("B2"));
        assert_eq!(serde_json::to_string(&history).unwrap(), r#"["B2","A1"]"#);
    }
}
