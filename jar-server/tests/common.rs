use jar_server::{router, AppState, InMemoryRepository, MediaStore};
use std::sync::Arc;
use std::time::Duration;

/// A server listening on a loopback port for the duration of a test.
pub struct TestServer {
    pub base_url: String,
    pub state: Arc<AppState>,
    _media_dir: tempfile::TempDir,
}

#[allow(dead_code)]
pub fn test_state(media_dir: &tempfile::TempDir, public_url: &str) -> Arc<AppState> {
    Arc::new(AppState::new(
        Arc::new(InMemoryRepository::new()),
        MediaStore::new(media_dir.path()),
        public_url,
    ))
}

#[allow(dead_code)]
pub async fn spawn_server() -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let media_dir = tempfile::tempdir().unwrap();
    let state = test_state(&media_dir, &base_url);
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url,
        state,
        _media_dir: media_dir,
    }
}

/// Polls `check` until it holds or five seconds pass.
#[allow(dead_code)]
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..250 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {}", what);
}
