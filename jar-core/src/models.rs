use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::JarError;

const JAR_ID_LEN: usize = 6;
const JAR_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Identifier of a memory. Assigned by the backend, or locally in offline mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub i64);

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MemoryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(MemoryId)
    }
}

/// Short shareable code naming a jar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JarId(String);

impl JarId {
    /// Generates a fresh random code.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..JAR_ID_LEN)
            .map(|_| JAR_ID_ALPHABET[rng.gen_range(0..JAR_ID_ALPHABET.len())] as char)
            .collect();
        JarId(code)
    }

    /// Normalizes user input (trim + uppercase) into a jar id.
    pub fn parse(input: &str) -> Result<Self, JarError> {
        let code = input.trim().to_uppercase();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(JarError::InvalidJarId(input.to_string()));
        }
        Ok(JarId(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for JarId {
    type Error = JarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        JarId::parse(&value)
    }
}

impl From<JarId> for String {
    fn from(id: JarId) -> Self {
        id.0
    }
}

/// A memory that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryDraft {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
    pub date: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MemoryDraft {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            image: None,
            audio: None,
            date: today_label(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn validate(&self) -> Result<(), JarError> {
        validate_fields(&self.title, &self.text)
    }

    /// Turns the draft into a memory under the given id.
    pub fn into_memory(self, id: MemoryId) -> Memory {
        Memory {
            id,
            title: self.title,
            text: self.text,
            image: self.image,
            audio: self.audio,
            date: self.date,
            tags: self.tags,
            jar_id: None,
            created_at: None,
        }
    }
}

/// A journaled entry in the application's shape.
///
/// This is also the element shape of export files, so `jar_id` and
/// `created_at` are only written when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar_id: Option<JarId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Memory {
    pub fn validate(&self) -> Result<(), JarError> {
        validate_fields(&self.title, &self.text)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

pub(crate) fn validate_fields(title: &str, text: &str) -> Result<(), JarError> {
    if title.trim().is_empty() {
        return Err(JarError::Validation("title is required".to_string()));
    }
    if text.trim().is_empty() {
        return Err(JarError::Validation("text is required".to_string()));
    }
    Ok(())
}

/// Splits comma-separated tag input. Order and duplicates are kept.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Display string used as a memory's creation date, e.g. `10/19/2026`.
pub fn today_label() -> String {
    chrono::Local::now().format("%-m/%-d/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jar_id_parse_normalizes_input() {
        let id = JarId::parse("  ab12cd ").unwrap();
        assert_eq!(id.as_str(), "AB12CD");

        assert!(matches!(JarId::parse("   "), Err(JarError::InvalidJarId(_))));
        assert!(matches!(JarId::parse("AB-12"), Err(JarError::InvalidJarId(_))));
    }

    #[test]
    fn test_generated_jar_ids_are_six_alphanumerics() {
        for _ in 0..50 {
            let id = JarId::generate();
            assert_eq!(id.as_str().len(), 6);
            assert!(id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
            // Generated ids must survive their own parser
            assert_eq!(JarId::parse(id.as_str()).unwrap(), id);
        }
    }

    #[test]
    fn test_jar_id_deserialization_validates() {
        let id: JarId = serde_json::from_str("\"xyz789\"").unwrap();
        assert_eq!(id.as_str(), "XYZ789");
        assert!(serde_json::from_str::<JarId>("\"\"").is_err());
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            parse_tags(" trip, beach ,, Trip,beach"),
            vec!["trip", "beach", "Trip", "beach"]
        );
        assert!(parse_tags(" , ").is_empty());
    }

    #[test]
    fn test_validation_requires_title_and_text() {
        assert!(MemoryDraft::new("Title", "Body").validate().is_ok());
        assert!(matches!(
            MemoryDraft::new("  ", "Body").validate(),
            Err(JarError::Validation(_))
        ));
        assert!(matches!(
            MemoryDraft::new("Title", "").validate(),
            Err(JarError::Validation(_))
        ));
    }

    #[test]
    fn test_memory_accepts_minimal_json() {
        let memory: Memory =
            serde_json::from_str(r#"{"id":1,"title":"A","text":"B","tags":[],"date":"x"}"#)
                .unwrap();
        assert_eq!(memory.id, MemoryId(1));
        assert_eq!(memory.image, None);
        assert_eq!(memory.jar_id, None);

        let json = serde_json::to_value(&memory).unwrap();
        assert!(json.get("jar_id").is_none());
        assert!(json.get("created_at").is_none());
        assert_eq!(json["image"], serde_json::Value::Null);
    }

    #[test]
    fn test_today_label_shape() {
        let label = today_label();
        let parts: Vec<&str> = label.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 4);
    }
}
