//! Backup files: a JSON array of memories in the application's shape.

use chrono::NaiveDate;
use serde_json::Value;

use crate::errors::JarError;
use crate::models::Memory;
use crate::JarResult;

pub fn export_json(memories: &[Memory]) -> JarResult<String> {
    Ok(serde_json::to_string(memories)?)
}

pub fn backup_file_name(date: NaiveDate) -> String {
    format!("memory_jar_backup_{}.json", date.format("%Y-%m-%d"))
}

/// Parses a backup. Anything but a top-level array of memories is rejected.
pub fn import_json(text: &str) -> JarResult<Vec<Memory>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| JarError::ImportFormat(format!("not valid JSON: {}", e)))?;

    let Value::Array(items) = value else {
        return Err(JarError::ImportFormat(
            "expected a list of memories".to_string(),
        ));
    };

    let memories = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item)
                .map_err(|e| JarError::ImportFormat(format!("entry {}: {}", index, e)))
        })
        .collect::<JarResult<Vec<Memory>>>()?;

    tracing::debug!("ARCHIVE: parsed {} memories from backup", memories.len());
    Ok(memories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JarId, MemoryDraft, MemoryId};

    #[test]
    fn test_import_single_record() {
        let memories =
            import_json(r#"[{"id":1,"title":"A","text":"B","tags":[],"date":"x"}]"#).unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].id, MemoryId(1));
        assert_eq!(memories[0].title, "A");
        assert_eq!(memories[0].text, "B");
        assert_eq!(memories[0].date, "x");
    }

    #[test]
    fn test_import_rejects_non_array() {
        assert!(matches!(
            import_json(r#"{"not":"array"}"#),
            Err(JarError::ImportFormat(_))
        ));
        assert!(matches!(import_json("42"), Err(JarError::ImportFormat(_))));
        assert!(matches!(import_json("not json"), Err(JarError::ImportFormat(_))));
        assert!(matches!(
            import_json(r#"[{"title":"missing id"}]"#),
            Err(JarError::ImportFormat(_))
        ));
    }

    #[test]
    fn test_export_then_import_reconstructs_list() {
        let mut with_media = MemoryDraft::new("Trip", "Mountains")
            .with_tags(vec!["hike".into(), "hike".into()])
            .into_memory(MemoryId(2));
        with_media.image = Some("data:image/png;base64,AAAA".into());
        with_media.jar_id = Some(JarId::parse("ABC123").unwrap());

        let memories = vec![
            with_media,
            MemoryDraft::new("Quiet", "Rainy day").into_memory(MemoryId(1)),
        ];

        let json = export_json(&memories).unwrap();
        assert!(json.starts_with('['));
        assert_eq!(import_json(&json).unwrap(), memories);
    }

    #[test]
    fn test_backup_file_name_has_date_stamp() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(backup_file_name(date), "memory_jar_backup_2026-03-07.json");
    }
}
