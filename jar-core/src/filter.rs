use std::collections::HashSet;

use crate::models::Memory;

/// Free-text search plus an optional single tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryFilter {
    pub query: String,
    pub tag: Option<String>,
}

impl MemoryFilter {
    pub fn new(query: impl Into<String>, tag: Option<String>) -> Self {
        Self {
            query: query.into(),
            tag,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.tag.is_none()
    }

    pub fn matches(&self, memory: &Memory) -> bool {
        if !self.query.is_empty() {
            let needle = self.query.to_lowercase();
            let hit = memory.title.to_lowercase().contains(&needle)
                || memory.text.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }

        match &self.tag {
            Some(tag) => memory.has_tag(tag),
            None => true,
        }
    }

    /// Memories passing the filter, in list order.
    pub fn apply(&self, memories: &[Memory]) -> Vec<Memory> {
        memories
            .iter()
            .filter(|memory| self.matches(memory))
            .cloned()
            .collect()
    }

    /// Selects `tag`, or clears the selection if it was already selected.
    pub fn toggle_tag(&mut self, tag: &str) {
        if self.tag.as_deref() == Some(tag) {
            self.tag = None;
        } else {
            self.tag = Some(tag.to_string());
        }
    }
}

/// Distinct tags across all memories, in first-seen order.
pub fn available_tags(memories: &[Memory]) -> Vec<String> {
    let mut seen = HashSet::new();
    memories
        .iter()
        .flat_map(|memory| memory.tags.iter())
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemoryDraft, MemoryId};

    fn memory(id: i64, title: &str, text: &str, tags: &[&str]) -> Memory {
        MemoryDraft::new(title, text)
            .with_tags(tags.iter().map(|t| t.to_string()).collect())
            .into_memory(MemoryId(id))
    }

    fn sample() -> Vec<Memory> {
        vec![
            memory(1, "Beach Day", "Sunburn and ice cream", &["summer", "family"]),
            memory(2, "First snow", "The dog loved it", &["winter"]),
            memory(3, "Concert", "Loud and BEAUTIFUL", &["music", "summer"]),
        ]
    }

    fn ids(memories: &[Memory]) -> Vec<i64> {
        memories.iter().map(|m| m.id.0).collect()
    }

    #[test]
    fn test_empty_filter_passes_everything() {
        let filter = MemoryFilter::default();
        assert!(filter.is_empty());
        assert_eq!(ids(&filter.apply(&sample())), vec![1, 2, 3]);
    }

    #[test]
    fn test_search_is_case_insensitive_over_title_and_text() {
        let memories = sample();
        assert_eq!(ids(&MemoryFilter::new("beach", None).apply(&memories)), vec![1]);
        assert_eq!(ids(&MemoryFilter::new("beautiful", None).apply(&memories)), vec![3]);
        assert_eq!(ids(&MemoryFilter::new("DOG", None).apply(&memories)), vec![2]);
        assert!(MemoryFilter::new("volcano", None).apply(&memories).is_empty());
    }

    #[test]
    fn test_tag_filter_requires_exact_match() {
        let memories = sample();
        let filter = MemoryFilter::new("", Some("summer".to_string()));
        assert_eq!(ids(&filter.apply(&memories)), vec![1, 3]);

        let filter = MemoryFilter::new("", Some("Summer".to_string()));
        assert!(filter.apply(&memories).is_empty());
    }

    #[test]
    fn test_search_and_tag_combine() {
        let memories = sample();
        let filter = MemoryFilter::new("concert", Some("summer".to_string()));
        let visible = filter.apply(&memories);
        assert_eq!(ids(&visible), vec![3]);

        for m in &visible {
            assert!(memories.contains(m));
            assert!(filter.matches(m));
        }
    }

    #[test]
    fn test_toggle_tag() {
        let mut filter = MemoryFilter::default();
        filter.toggle_tag("winter");
        assert_eq!(filter.tag.as_deref(), Some("winter"));
        filter.toggle_tag("summer");
        assert_eq!(filter.tag.as_deref(), Some("summer"));
        filter.toggle_tag("summer");
        assert_eq!(filter.tag, None);
    }

    #[test]
    fn test_available_tags_are_distinct() {
        let tags = available_tags(&sample());
        assert_eq!(tags, vec!["summer", "family", "winter", "music"]);
        assert!(available_tags(&[]).is_empty());
    }
}
