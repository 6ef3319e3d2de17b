use crate::{errors::ApiError, media, AppState, ServerResult};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jar_core::{
    content_type_for, ChangeKind, JarId, MediaUploaded, MemoryId, MemoryRow, NewMemoryRow,
    RowFields,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct JarQuery {
    pub jar_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub ext: Option<String>,
}

pub(crate) fn parse_jar(raw: &str) -> Result<JarId, ApiError> {
    JarId::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

pub async fn list_memories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JarQuery>,
) -> ServerResult<Json<Vec<MemoryRow>>> {
    let jar_id = parse_jar(&query.jar_id)?;
    let rows = state.repository.list(&jar_id).await?;
    tracing::debug!(jar_id = %jar_id, count = rows.len(), "Listed memories");
    Ok(Json(rows))
}

pub async fn create_memory(
    State(state): State<Arc<AppState>>,
    Json(row): Json<NewMemoryRow>,
) -> ServerResult<(StatusCode, Json<MemoryRow>)> {
    row.fields
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let stored = state.repository.insert(row).await?;
    tracing::info!(id = %stored.id, jar_id = %stored.jar_id, "Created memory");
    state.notify(stored.jar_id.clone(), ChangeKind::Insert);

    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(fields): Json<RowFields>,
) -> ServerResult<Json<MemoryRow>> {
    fields
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let id = MemoryId(id);
    let stored = state
        .repository
        .update(id, fields)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Memory {} not found", id)))?;
    tracing::info!(id = %id, jar_id = %stored.jar_id, "Updated memory");
    state.notify(stored.jar_id.clone(), ChangeKind::Update);

    Ok(Json(stored))
}

pub async fn delete_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ServerResult<StatusCode> {
    let id = MemoryId(id);
    let jar_id = state
        .repository
        .delete(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Memory {} not found", id)))?;
    tracing::info!(id = %id, jar_id = %jar_id, "Deleted memory");
    state.notify(jar_id, ChangeKind::Delete);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MediaQuery>,
    body: Bytes,
) -> ServerResult<(StatusCode, Json<MediaUploaded>)> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Empty media upload").into());
    }

    let ext = query.ext.as_deref().unwrap_or("bin");
    let name = state.media.save(ext, &body).await?;
    let url = format!("{}/media/{}", state.public_url, name);

    Ok((StatusCode::CREATED, Json(MediaUploaded { url })))
}

pub async fn serve_media(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ServerResult<Response> {
    let bytes = state
        .media
        .load(&name)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Media {} not found", name)))?;
    let content_type = content_type_for(media::extension_of(&name));

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
