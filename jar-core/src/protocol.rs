use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::JarError;
use crate::models::{validate_fields, JarId, Memory, MemoryDraft, MemoryId};

/// Mutable columns of a backend `memories` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFields {
    pub title: String,
    pub text: String,
    pub date: String,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Insert body: a row without server-assigned columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMemoryRow {
    #[serde(flatten)]
    pub fields: RowFields,
    pub jar_id: JarId,
}

/// A persisted backend row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRow {
    pub id: MemoryId,
    #[serde(flatten)]
    pub fields: RowFields,
    pub jar_id: JarId,
    pub created_at: DateTime<Utc>,
}

// Application <-> backend field mapping. `image` and `audio` are stored as
// `image_url` and `audio_url`; everything else keeps its name.

impl From<&MemoryDraft> for RowFields {
    fn from(draft: &MemoryDraft) -> Self {
        RowFields {
            title: draft.title.clone(),
            text: draft.text.clone(),
            date: draft.date.clone(),
            image_url: draft.image.clone(),
            audio_url: draft.audio.clone(),
            tags: draft.tags.clone(),
        }
    }
}

impl From<&Memory> for RowFields {
    fn from(memory: &Memory) -> Self {
        RowFields {
            title: memory.title.clone(),
            text: memory.text.clone(),
            date: memory.date.clone(),
            image_url: memory.image.clone(),
            audio_url: memory.audio.clone(),
            tags: memory.tags.clone(),
        }
    }
}

impl From<MemoryRow> for Memory {
    fn from(row: MemoryRow) -> Self {
        Memory {
            id: row.id,
            title: row.fields.title,
            text: row.fields.text,
            image: row.fields.image_url,
            audio: row.fields.audio_url,
            date: row.fields.date,
            tags: row.fields.tags,
            jar_id: Some(row.jar_id),
            created_at: Some(row.created_at),
        }
    }
}

impl RowFields {
    pub fn validate(&self) -> Result<(), JarError> {
        validate_fields(&self.title, &self.text)
    }
}

impl NewMemoryRow {
    pub fn from_draft(draft: &MemoryDraft, jar_id: &JarId) -> Self {
        NewMemoryRow {
            fields: RowFields::from(draft),
            jar_id: jar_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Messages sent by the server over a jar's push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    Subscribed { jar_id: JarId },
    Changed { jar_id: JarId, event: ChangeKind },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaUploaded {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// MIME type for a media file extension (lowercase, without the dot).
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "webm" => "audio/webm",
        "ogg" | "oga" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}
