use async_trait::async_trait;
use chrono::Utc;
use jar_client::{ChangeSignal, InMemoryStore, JarClient, MediaBlob, RemoteStore, Subscription};
use jar_core::{JarId, Memory, MemoryDraft, MemoryId, RemoteError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// Scriptable backend living in the test process.
///
/// Writes notify subscribers of the affected jar the way the real server
/// does. Fetches for a jar can be held open to simulate a slow network.
#[derive(Default)]
pub struct FakeRemote {
    rows: Mutex<Vec<Memory>>,
    next_id: AtomicI64,
    fetch_calls: Mutex<HashMap<JarId, usize>>,
    held: Mutex<HashMap<JarId, Arc<Semaphore>>>,
    subscribers: Mutex<Vec<(JarId, mpsc::Sender<ChangeSignal>)>>,
    open_at_subscribe: Mutex<Vec<usize>>,
    uploads: AtomicUsize,
    pub fail_fetch: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_subscribe: AtomicBool,
}

#[allow(dead_code)]
impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stores a row without notifying anyone, as if another device wrote it
    /// while the push message is still in flight.
    pub fn seed(&self, jar: &JarId, title: &str, tags: &[&str]) -> Memory {
        let id = MemoryId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut memory = MemoryDraft::new(title, format!("{} text", title))
            .with_tags(tags.iter().map(|t| t.to_string()).collect())
            .into_memory(id);
        memory.jar_id = Some(jar.clone());
        memory.created_at = Some(Utc::now());
        self.rows.lock().unwrap().push(memory.clone());
        memory
    }

    pub fn rows_in(&self, jar: &JarId) -> Vec<Memory> {
        let mut rows: Vec<Memory> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.jar_id.as_ref() == Some(jar))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.0.cmp(&a.id.0));
        rows
    }

    pub fn fetch_calls(&self, jar: &JarId) -> usize {
        self.fetch_calls.lock().unwrap().get(jar).copied().unwrap_or(0)
    }

    pub fn hold_fetches(&self, jar: &JarId) {
        self.held
            .lock()
            .unwrap()
            .insert(jar.clone(), Arc::new(Semaphore::new(0)));
    }

    pub fn release_fetches(&self, jar: &JarId) {
        if let Some(gate) = self.held.lock().unwrap().remove(jar) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Sends a change signal to every open subscription for `jar`.
    pub fn notify(&self, jar: &JarId) {
        for (subscribed, tx) in self.subscribers.lock().unwrap().iter() {
            if subscribed == jar {
                let _ = tx.try_send(ChangeSignal { jar_id: jar.clone() });
            }
        }
    }

    pub fn live_subscriptions(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    /// How many subscriptions were still open as each new one was made.
    pub fn open_at_subscribe(&self) -> Vec<usize> {
        self.open_at_subscribe.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    fn check_writes(&self) -> Result<(), RemoteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn fetch_all(&self, jar_id: &JarId) -> Result<Vec<Memory>, RemoteError> {
        *self
            .fetch_calls
            .lock()
            .unwrap()
            .entry(jar_id.clone())
            .or_default() += 1;

        let gate = self.held.lock().unwrap().get(jar_id).cloned();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 500,
                message: "database unavailable".into(),
            });
        }
        Ok(self.rows_in(jar_id))
    }

    async fn insert(&self, draft: &MemoryDraft, jar_id: &JarId) -> Result<Memory, RemoteError> {
        self.check_writes()?;
        let id = MemoryId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut memory = draft.clone().into_memory(id);
        memory.jar_id = Some(jar_id.clone());
        memory.created_at = Some(Utc::now());
        self.rows.lock().unwrap().push(memory.clone());
        self.notify(jar_id);
        Ok(memory)
    }

    async fn update(&self, memory: &Memory) -> Result<Memory, RemoteError> {
        self.check_writes()?;
        let saved = {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|m| m.id == memory.id)
                .ok_or(RemoteError::NotFound(memory.id))?;
            let mut saved = memory.clone();
            saved.jar_id = row.jar_id.clone();
            saved.created_at = row.created_at;
            *row = saved.clone();
            saved
        };
        if let Some(jar) = &saved.jar_id {
            self.notify(jar);
        }
        Ok(saved)
    }

    async fn delete(&self, id: MemoryId) -> Result<(), RemoteError> {
        self.check_writes()?;
        let removed = {
            let mut rows = self.rows.lock().unwrap();
            let position = rows.iter().position(|m| m.id == id);
            position.map(|p| rows.remove(p))
        };
        if let Some(jar) = removed.and_then(|m| m.jar_id) {
            self.notify(&jar);
        }
        Ok(())
    }

    async fn upload_media(&self, blob: &MediaBlob) -> Result<String, RemoteError> {
        self.check_writes()?;
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("https://media.test/{}.{}", n, blob.extension))
    }

    async fn subscribe(&self, jar_id: &JarId) -> Result<Subscription, RemoteError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(RemoteError::Subscribe("handshake refused".into()));
        }
        let open = self.live_subscriptions();
        self.open_at_subscribe.lock().unwrap().push(open);
        let (tx, rx) = mpsc::channel(16);
        self.subscribers.lock().unwrap().push((jar_id.clone(), tx));
        Ok(Subscription::new(jar_id.clone(), rx, None))
    }
}

#[allow(dead_code)]
pub fn jar(code: &str) -> JarId {
    JarId::parse(code).unwrap()
}

#[allow(dead_code)]
pub fn client_with(remote: Arc<FakeRemote>) -> (JarClient, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (JarClient::new(remote, store.clone()), store)
}

#[allow(dead_code)]
pub fn titles(memories: &[Memory]) -> Vec<String> {
    memories.iter().map(|m| m.title.clone()).collect()
}

/// Polls `check` until it holds or two seconds pass.
#[allow(dead_code)]
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}
