use crate::events::{EventDispatcher, JarEvent};
use crate::local_store::{JarStorage, LocalStore};
use crate::media::MediaBlob;
use crate::remote::RemoteStore;
use crate::websocket::{ReleaseHandle, Subscription};
use jar_core::{
    archive, available_tags, JarError, JarHistory, JarId, JarResult, Memory, MemoryDraft,
    MemoryFilter, MemoryId,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::task::JoinHandle;

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this memory?";

/// Which list the client is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JarMode {
    NoJar,
    Active(JarId),
    /// Local-only journal kept in the `memories` key.
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

/// Asks the user before a destructive call.
pub trait Confirmation: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirmation for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// An export ready to be written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    pub file_name: String,
    pub json: String,
}

/// Captured at the start of an async operation and compared before its
/// result is applied. Every mode change bumps the epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticket {
    epoch: u64,
    mode: JarMode,
}

struct State {
    mode: JarMode,
    epoch: u64,
    memories: Vec<Memory>,
    filter: MemoryFilter,
    visible: Vec<Memory>,
    tags: Vec<String>,
    history: JarHistory,
    push: Option<PushChannel>,
}

/// The refetch task for the active jar and the handle that closes its
/// subscription.
struct PushChannel {
    task: JoinHandle<()>,
    release: ReleaseHandle,
}

impl State {
    fn ticket(&self) -> Ticket {
        Ticket {
            epoch: self.epoch,
            mode: self.mode.clone(),
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.epoch == ticket.epoch
    }

    /// Moves to a new mode with an empty list, tearing down the push channel.
    fn switch_mode(&mut self, mode: JarMode) -> Ticket {
        self.stop_push();
        self.epoch += 1;
        self.mode = mode;
        self.replace(Vec::new());
        self.ticket()
    }

    /// Closes the subscription before returning. The task is aborted too,
    /// but may still be winding down afterwards.
    fn stop_push(&mut self) {
        if let Some(push) = self.push.take() {
            push.release.release();
            push.task.abort();
        }
    }

    fn replace(&mut self, memories: Vec<Memory>) {
        self.memories = memories;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.visible = self.filter.apply(&self.memories);
        self.tags = available_tags(&self.memories);
    }

    /// Puts a confirmed memory at the front, or replaces the copy a refetch
    /// already brought in.
    fn upsert_front(&mut self, memory: Memory) {
        match self.memories.iter_mut().find(|m| m.id == memory.id) {
            Some(existing) => *existing = memory,
            None => self.memories.insert(0, memory),
        }
        self.recompute();
    }

    fn replace_by_id(&mut self, memory: Memory) -> bool {
        let found = match self.memories.iter_mut().find(|m| m.id == memory.id) {
            Some(existing) => {
                *existing = memory;
                true
            }
            None => false,
        };
        self.recompute();
        found
    }

    fn remove_by_id(&mut self, id: MemoryId) -> bool {
        let before = self.memories.len();
        self.memories.retain(|m| m.id != id);
        self.recompute();
        self.memories.len() != before
    }

    /// One past the largest local id. An imported journal can already hold
    /// `i64::MAX`, in which case the smallest unused positive id is taken.
    fn next_local_id(&self) -> MemoryId {
        let max = self.memories.iter().map(|m| m.id.0).max().unwrap_or(0);
        if let Some(next) = max.max(0).checked_add(1) {
            return MemoryId(next);
        }

        let taken: HashSet<i64> = self.memories.iter().map(|m| m.id.0).collect();
        let free = (1..=i64::MAX)
            .find(|id| !taken.contains(id))
            .unwrap_or(i64::MAX);
        MemoryId(free)
    }
}

struct Inner {
    remote: Arc<dyn RemoteStore>,
    storage: JarStorage,
    events: Arc<EventDispatcher>,
    state: Mutex<State>,
    // Serializes mode switches and local writes so persisted keys follow
    // the order of in-memory transitions
    persist_lock: tokio::sync::Mutex<()>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.stop_push();
    }
}

/// Keeps the in-memory list of memories for the active jar consistent with
/// local edits, backend round-trips and push notifications.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct JarClient {
    inner: Arc<Inner>,
}

impl JarClient {
    pub fn new(remote: Arc<dyn RemoteStore>, store: Arc<dyn LocalStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                remote,
                storage: JarStorage::new(store),
                events: Arc::new(EventDispatcher::new()),
                state: Mutex::new(State {
                    mode: JarMode::NoJar,
                    epoch: 0,
                    memories: Vec::new(),
                    filter: MemoryFilter::default(),
                    visible: Vec::new(),
                    tags: Vec::new(),
                    history: JarHistory::new(),
                    push: None,
                }),
                persist_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn event_dispatcher(&self) -> Arc<EventDispatcher> {
        self.inner.events.clone()
    }

    /// Loads the jar history and re-enters the jar that was active last
    /// time, if any.
    pub async fn restore(&self) -> JarResult<Option<JarId>> {
        let history = self.inner.storage.history().await;
        self.inner.state().history = history;

        match self.inner.storage.active_jar().await {
            Some(jar_id) => {
                tracing::info!("CLIENT: restoring jar {}", jar_id);
                self.activate(jar_id.clone()).await?;
                Ok(Some(jar_id))
            }
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------------
    // Jar lifecycle
    // ---------------------------------------------------------------------

    /// Starts a brand new jar under a generated code.
    pub async fn create_jar(&self) -> JarResult<JarId> {
        let jar_id = JarId::generate();
        tracing::info!("CLIENT: creating jar {}", jar_id);
        self.activate(jar_id.clone()).await?;
        Ok(jar_id)
    }

    /// Joins an existing jar from user input.
    pub async fn join_jar(&self, input: &str) -> JarResult<JarId> {
        let jar_id = JarId::parse(input)?;
        self.activate(jar_id.clone()).await?;
        Ok(jar_id)
    }

    pub async fn rejoin_jar(&self, jar_id: &JarId) -> JarResult<()> {
        self.activate(jar_id.clone()).await
    }

    /// Removes a jar from the recent list. Its memories are untouched.
    pub async fn forget_jar(&self, jar_id: &JarId) -> bool {
        let _guard = self.inner.persist_lock.lock().await;
        let (removed, history) = {
            let mut state = self.inner.state();
            let removed = state.history.forget(jar_id);
            (removed, state.history.clone())
        };
        if removed {
            self.inner.storage.save_history(&history).await;
        }
        removed
    }

    pub fn history(&self) -> JarHistory {
        self.inner.state().history.clone()
    }

    /// Leaves the active jar. History and remote data stay.
    pub async fn logout(&self) {
        let previous = {
            let _guard = self.inner.persist_lock.lock().await;
            let previous = {
                let mut state = self.inner.state();
                let previous = match &state.mode {
                    JarMode::Active(jar_id) => Some(jar_id.clone()),
                    _ => None,
                };
                state.switch_mode(JarMode::NoJar);
                previous
            };
            self.inner.storage.clear_active_jar().await;
            previous
        };

        tracing::info!("CLIENT: left jar {:?}", previous);
        self.inner
            .events
            .emit(JarEvent::JarDeactivated { jar_id: previous });
    }

    /// Switches to the local-only journal.
    pub async fn open_offline(&self) {
        let (previous, count) = {
            let _guard = self.inner.persist_lock.lock().await;
            let memories = self.inner.storage.offline_memories().await;
            let count = memories.len();
            let previous = {
                let mut state = self.inner.state();
                let previous = match &state.mode {
                    JarMode::Active(jar_id) => Some(jar_id.clone()),
                    _ => None,
                };
                state.switch_mode(JarMode::Offline);
                state.replace(memories);
                previous
            };
            self.inner.storage.clear_active_jar().await;
            (previous, count)
        };

        tracing::info!("CLIENT: opened offline journal with {} memories", count);
        if previous.is_some() {
            self.inner
                .events
                .emit(JarEvent::JarDeactivated { jar_id: previous });
        }
        self.inner.events.emit(JarEvent::MemoriesReplaced { count });
    }

    async fn activate(&self, jar_id: JarId) -> JarResult<()> {
        let ticket = {
            let _guard = self.inner.persist_lock.lock().await;
            let (ticket, history) = {
                let mut state = self.inner.state();
                let ticket = state.switch_mode(JarMode::Active(jar_id.clone()));
                state.history.remember(jar_id.clone());
                (ticket, state.history.clone())
            };
            self.inner.storage.set_active_jar(&jar_id).await;
            self.inner.storage.save_history(&history).await;
            ticket
        };

        tracing::info!("CLIENT: jar {} is now active", jar_id);
        self.inner.events.emit(JarEvent::JarActivated {
            jar_id: jar_id.clone(),
        });

        self.start_push_channel(&jar_id, &ticket).await;
        self.fetch_into(&jar_id, &ticket).await
    }

    async fn start_push_channel(&self, jar_id: &JarId, ticket: &Ticket) {
        let subscription = match self.inner.remote.subscribe(jar_id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!("CLIENT: realtime connection error for jar {}: {}", jar_id, e);
                self.inner
                    .events
                    .emit_sync_error(format!("Realtime connection error: {}", e));
                return;
            }
        };

        let mut state = self.inner.state();
        if !state.is_current(ticket) {
            drop(state);
            tracing::debug!("CLIENT: dropping subscription for abandoned jar {}", jar_id);
            subscription.close();
            return;
        }

        state.stop_push();
        let inner = Arc::downgrade(&self.inner);
        let release = subscription.release_handle();
        let task = tokio::spawn(push_loop(inner, subscription, ticket.clone()));
        state.push = Some(PushChannel { task, release });
    }

    // ---------------------------------------------------------------------
    // Fetching
    // ---------------------------------------------------------------------

    /// Refetches the active jar, or reloads the offline journal.
    pub async fn refresh(&self) -> JarResult<()> {
        let ticket = self.inner.state().ticket();
        match &ticket.mode {
            JarMode::Active(jar_id) => self.fetch_into(jar_id, &ticket).await,
            JarMode::Offline => {
                let memories = self.inner.storage.offline_memories().await;
                self.apply_fetch(&ticket, memories);
                Ok(())
            }
            JarMode::NoJar => Err(JarError::NoActiveJar),
        }
    }

    async fn fetch_into(&self, jar_id: &JarId, ticket: &Ticket) -> JarResult<()> {
        match self.inner.remote.fetch_all(jar_id).await {
            Ok(memories) => {
                self.apply_fetch(ticket, memories);
                Ok(())
            }
            Err(e) => {
                if !self.is_current(ticket) {
                    tracing::debug!("CLIENT: ignoring failed fetch for abandoned jar {}", jar_id);
                    return Ok(());
                }
                tracing::error!("CLIENT: failed to load memories for jar {}: {}", jar_id, e);
                self.inner
                    .events
                    .emit_sync_error(format!("Failed to load memories: {}", e));
                Err(e.into())
            }
        }
    }

    fn apply_fetch(&self, ticket: &Ticket, memories: Vec<Memory>) {
        let count = memories.len();
        {
            let mut state = self.inner.state();
            if !state.is_current(ticket) {
                tracing::info!(
                    "CLIENT: discarding stale fetch of {} memories for {:?}",
                    count,
                    ticket.mode
                );
                return;
            }
            state.replace(memories);
        }
        tracing::debug!("CLIENT: list replaced with {} memories", count);
        self.inner.events.emit(JarEvent::MemoriesReplaced { count });
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.inner.state().is_current(ticket)
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    pub async fn create_memory(&self, draft: MemoryDraft) -> JarResult<Memory> {
        draft.validate()?;
        let ticket = self.inner.state().ticket();

        let created = match &ticket.mode {
            JarMode::Active(jar_id) => {
                let created = self.inner.remote.insert(&draft, jar_id).await.map_err(|e| {
                    tracing::error!("CLIENT: add memory failed: {}", e);
                    JarError::from(e)
                })?;

                let mut state = self.inner.state();
                if !state.is_current(&ticket) {
                    tracing::info!("CLIENT: memory {} saved to a jar that is no longer open", created.id);
                    return Ok(created);
                }
                state.upsert_front(created.clone());
                created
            }
            JarMode::Offline => {
                let _guard = self.inner.persist_lock.lock().await;
                let (created, snapshot) = {
                    let mut state = self.inner.state();
                    if !state.is_current(&ticket) {
                        return Err(JarError::NoActiveJar);
                    }
                    let created = draft.into_memory(state.next_local_id());
                    state.upsert_front(created.clone());
                    (created, state.memories.clone())
                };
                self.inner.storage.save_offline_memories(&snapshot).await;
                created
            }
            JarMode::NoJar => return Err(JarError::NoActiveJar),
        };

        tracing::info!("CLIENT: created memory {}", created.id);
        self.inner.events.emit(JarEvent::MemoryCreated {
            id: created.id,
            title: created.title.clone(),
        });
        Ok(created)
    }

    /// Saves a full replacement of an existing memory.
    pub async fn update_memory(&self, memory: Memory) -> JarResult<Memory> {
        memory.validate()?;
        let ticket = self.inner.state().ticket();

        let saved = match &ticket.mode {
            JarMode::Active(_) => {
                let saved = self.inner.remote.update(&memory).await.map_err(|e| {
                    tracing::error!("CLIENT: update of memory {} failed: {}", memory.id, e);
                    JarError::from(e)
                })?;

                let mut state = self.inner.state();
                if state.is_current(&ticket) {
                    state.replace_by_id(saved.clone());
                }
                saved
            }
            JarMode::Offline => {
                let _guard = self.inner.persist_lock.lock().await;
                let snapshot = {
                    let mut state = self.inner.state();
                    if !state.is_current(&ticket) {
                        return Err(JarError::NoActiveJar);
                    }
                    if !state.replace_by_id(memory.clone()) {
                        return Err(JarError::NotFound(memory.id));
                    }
                    state.memories.clone()
                };
                self.inner.storage.save_offline_memories(&snapshot).await;
                memory
            }
            JarMode::NoJar => return Err(JarError::NoActiveJar),
        };

        tracing::info!("CLIENT: updated memory {}", saved.id);
        self.inner.events.emit(JarEvent::MemoryUpdated {
            id: saved.id,
            title: saved.title.clone(),
        });
        Ok(saved)
    }

    /// Deletes a memory after the user confirms.
    pub async fn delete_memory(
        &self,
        id: MemoryId,
        confirmation: &dyn Confirmation,
    ) -> JarResult<DeleteOutcome> {
        let ticket = self.inner.state().ticket();
        if ticket.mode == JarMode::NoJar {
            return Err(JarError::NoActiveJar);
        }

        if !confirmation.confirm(DELETE_PROMPT) {
            tracing::debug!("CLIENT: delete of memory {} cancelled", id);
            return Ok(DeleteOutcome::Cancelled);
        }

        match &ticket.mode {
            JarMode::Active(_) => {
                self.inner.remote.delete(id).await.map_err(|e| {
                    tracing::error!("CLIENT: delete of memory {} failed: {}", id, e);
                    JarError::from(e)
                })?;

                let mut state = self.inner.state();
                if state.is_current(&ticket) {
                    state.remove_by_id(id);
                }
            }
            JarMode::Offline => {
                let _guard = self.inner.persist_lock.lock().await;
                let snapshot = {
                    let mut state = self.inner.state();
                    if !state.is_current(&ticket) {
                        return Err(JarError::NoActiveJar);
                    }
                    if !state.remove_by_id(id) {
                        return Err(JarError::NotFound(id));
                    }
                    state.memories.clone()
                };
                self.inner.storage.save_offline_memories(&snapshot).await;
            }
            JarMode::NoJar => return Err(JarError::NoActiveJar),
        }

        tracing::info!("CLIENT: deleted memory {}", id);
        self.inner.events.emit(JarEvent::MemoryDeleted { id });
        Ok(DeleteOutcome::Deleted)
    }

    /// Turns a blob into a reference a memory can carry: an uploaded URL in
    /// a jar, an embedded `data:` URL offline.
    pub async fn attach_media(&self, blob: &MediaBlob) -> JarResult<String> {
        let mode = self.mode();
        match mode {
            JarMode::Active(_) => Ok(self.inner.remote.upload_media(blob).await.map_err(|e| {
                tracing::error!("CLIENT: media upload failed: {}", e);
                JarError::from(e)
            })?),
            JarMode::Offline => Ok(blob.to_data_url()),
            JarMode::NoJar => Err(JarError::NoActiveJar),
        }
    }

    // ---------------------------------------------------------------------
    // Import / export
    // ---------------------------------------------------------------------

    /// Replaces the list with a backup. Nothing changes if the backup is
    /// malformed. In a jar the imported list lasts until the next refetch.
    pub async fn import(&self, text: &str) -> JarResult<usize> {
        let memories = archive::import_json(text)?;
        let count = memories.len();

        let _guard = self.inner.persist_lock.lock().await;
        let snapshot = {
            let mut state = self.inner.state();
            match state.mode {
                JarMode::NoJar => return Err(JarError::NoActiveJar),
                JarMode::Active(ref jar_id) => {
                    tracing::warn!(
                        "CLIENT: imported {} memories into jar {} locally only",
                        count,
                        jar_id
                    );
                    state.replace(memories);
                    None
                }
                JarMode::Offline => {
                    state.replace(memories);
                    Some(state.memories.clone())
                }
            }
        };
        if let Some(snapshot) = snapshot {
            self.inner.storage.save_offline_memories(&snapshot).await;
        }

        self.inner.events.emit(JarEvent::MemoriesReplaced { count });
        Ok(count)
    }

    pub fn export(&self) -> JarResult<Backup> {
        let memories = self.memories();
        Ok(Backup {
            file_name: archive::backup_file_name(chrono::Local::now().date_naive()),
            json: archive::export_json(&memories)?,
        })
    }

    // ---------------------------------------------------------------------
    // View state
    // ---------------------------------------------------------------------

    /// Sets the free-text search. Surrounding whitespace is dropped, so a
    /// blank query clears the search.
    pub fn set_search(&self, query: impl Into<String>) {
        let mut state = self.inner.state();
        state.filter.query = query.into().trim().to_string();
        state.recompute();
    }

    pub fn select_tag(&self, tag: Option<String>) {
        let mut state = self.inner.state();
        state.filter.tag = tag;
        state.recompute();
    }

    pub fn toggle_tag(&self, tag: &str) {
        let mut state = self.inner.state();
        state.filter.toggle_tag(tag);
        state.recompute();
    }

    pub fn clear_filters(&self) {
        let mut state = self.inner.state();
        state.filter = MemoryFilter::default();
        state.recompute();
    }

    pub fn filter(&self) -> MemoryFilter {
        self.inner.state().filter.clone()
    }

    /// The active list after search and tag filtering.
    pub fn visible_memories(&self) -> Vec<Memory> {
        self.inner.state().visible.clone()
    }

    pub fn available_tags(&self) -> Vec<String> {
        self.inner.state().tags.clone()
    }

    pub fn memories(&self) -> Vec<Memory> {
        self.inner.state().memories.clone()
    }

    pub fn memory(&self, id: MemoryId) -> Option<Memory> {
        self.inner
            .state()
            .memories
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    pub fn mode(&self) -> JarMode {
        self.inner.state().mode.clone()
    }

    pub fn active_jar(&self) -> Option<JarId> {
        match self.mode() {
            JarMode::Active(jar_id) => Some(jar_id),
            _ => None,
        }
    }

    /// True while a push channel task is attached to the active jar.
    pub fn is_subscribed(&self) -> bool {
        self.inner
            .state()
            .push
            .as_ref()
            .map_or(false, |push| !push.release.is_released() && !push.task.is_finished())
    }
}

/// Refetches the jar on every push signal until the subscription ends or
/// the jar is no longer active.
async fn push_loop(inner: Weak<Inner>, mut subscription: Subscription, ticket: Ticket) {
    while let Some(signal) = subscription.next().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let client = JarClient { inner };
        if !client.is_current(&ticket) {
            return;
        }

        tracing::info!("CLIENT: change received for jar {}", signal.jar_id);
        client.inner.events.emit(JarEvent::RemoteChange {
            jar_id: signal.jar_id.clone(),
        });

        // Errors are already reported as sync errors
        let _ = client.fetch_into(&signal.jar_id, &ticket).await;
    }

    if let Some(inner) = inner.upgrade() {
        let client = JarClient { inner };
        if client.is_current(&ticket) {
            tracing::warn!("CLIENT: push channel for jar {} closed", subscription.jar_id());
            client
                .inner
                .events
                .emit_sync_error("Realtime connection closed; use refresh to reload");
        }
    }
}
