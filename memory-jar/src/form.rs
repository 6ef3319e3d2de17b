//! Input handling shared by the add and edit prompts.

use jar_client::{JarClient, MediaBlob};
use jar_core::JarResult;
use std::path::Path;

/// Resolves what an attachment field holds after the user answered its
/// prompt with `path`. A blank answer keeps `current`.
///
/// A file that cannot be read or uploaded is an error; the caller must not
/// save the memory with the previous reference in its place.
pub async fn resolve_attachment(
    client: &JarClient,
    path: &str,
    current: Option<String>,
) -> JarResult<Option<String>> {
    let path = path.trim();
    if path.is_empty() {
        return Ok(current);
    }

    let blob = MediaBlob::from_path(Path::new(path)).await?;
    let reference = client.attach_media(&blob).await?;
    tracing::debug!("Attached {} ({} bytes)", path, blob.bytes.len());
    Ok(Some(reference))
}
