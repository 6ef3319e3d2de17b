pub mod api;
pub mod database;
pub mod errors;
pub mod media;
pub mod queries;
pub mod repository;
pub mod websocket;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use jar_core::{ChangeKind, JarId};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use database::PgRepository;
pub use errors::{ApiError, ServerError, ServerResult};
pub use media::MediaStore;
pub use repository::{InMemoryRepository, MemoryRepository};

const CHANGE_BUFFER: usize = 256;
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// A row in `jar_id` was inserted, updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub jar_id: JarId,
    pub kind: ChangeKind,
}

pub struct AppState {
    pub repository: Arc<dyn MemoryRepository>,
    pub media: MediaStore,
    pub changes: broadcast::Sender<ChangeNotice>,
    /// Base URL media links are built from, without a trailing slash.
    pub public_url: String,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn MemoryRepository>,
        media: MediaStore,
        public_url: impl Into<String>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            repository,
            media,
            changes,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn notify(&self, jar_id: JarId, kind: ChangeKind) {
        // No receivers just means nobody is watching this server
        let watchers = self.changes.send(ChangeNotice { jar_id, kind }).unwrap_or(0);
        tracing::debug!(%kind, watchers, "Broadcast change");
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Push channel
        .route("/ws", get(websocket::websocket_handler))
        // REST API
        .route(
            "/api/memories",
            get(api::list_memories).post(api::create_memory),
        )
        .route(
            "/api/memories/:id",
            put(api::update_memory).delete(api::delete_memory),
        )
        .route(
            "/api/media",
            post(api::upload_media).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/media/:name", get(api::serve_media))
        // Health check
        .route("/health", get(|| async { "OK" }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
