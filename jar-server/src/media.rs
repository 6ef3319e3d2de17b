use crate::errors::{ApiError, ServerResult};
use std::path::PathBuf;
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 8;

/// Uploaded media kept as files under one directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Writes `bytes` under a fresh random name and returns that name.
    pub async fn save(&self, extension: &str, bytes: &[u8]) -> ServerResult<String> {
        let extension = normalize_extension(extension)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(self.root.join(&name), bytes).await?;
        tracing::info!(name = %name, bytes = bytes.len(), "Stored media");
        Ok(name)
    }

    /// Reads a stored file. `None` for unknown or unsafe names.
    pub async fn load(&self, name: &str) -> ServerResult<Option<Vec<u8>>> {
        if !is_stored_name(name) {
            return Ok(None);
        }
        match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn normalize_extension(extension: &str) -> ServerResult<String> {
    let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    if extension.is_empty()
        || extension.len() > MAX_EXTENSION_LEN
        || !extension.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ApiError::bad_request(format!("Invalid media extension: {:?}", extension)).into());
    }
    Ok(extension)
}

/// Only names this store generated: `<uuid>.<ext>`.
fn is_stored_name(name: &str) -> bool {
    match name.split_once('.') {
        Some((stem, ext)) => {
            Uuid::parse_str(stem).is_ok()
                && !ext.is_empty()
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Extension of a stored name, for picking the response content type.
pub fn extension_of(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}
