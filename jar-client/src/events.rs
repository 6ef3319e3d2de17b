//! Event callbacks for the jar client
//!
//! Events can be generated from any task or thread, but callbacks only run
//! when the registering thread calls `process_events()`. A view layer calls
//! it once per loop iteration and re-renders from the client's state.

use jar_core::{JarError, JarId, JarResult, MemoryId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex};
use std::thread::{self, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    JarActivated,
    JarDeactivated,
    MemoriesReplaced,
    MemoryCreated,
    MemoryUpdated,
    MemoryDeleted,
    RemoteChange,
    SyncError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JarEvent {
    /// A jar became the active one (created, joined or rejoined)
    JarActivated { jar_id: JarId },
    /// The user left the jar
    JarDeactivated { jar_id: Option<JarId> },
    /// The whole list was replaced by a fetch, an import or the offline journal
    MemoriesReplaced { count: usize },
    MemoryCreated { id: MemoryId, title: String },
    MemoryUpdated { id: MemoryId, title: String },
    MemoryDeleted { id: MemoryId },
    /// The push channel reported a change for the active jar
    RemoteChange { jar_id: JarId },
    SyncError { message: String },
}

impl JarEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            JarEvent::JarActivated { .. } => EventType::JarActivated,
            JarEvent::JarDeactivated { .. } => EventType::JarDeactivated,
            JarEvent::MemoriesReplaced { .. } => EventType::MemoriesReplaced,
            JarEvent::MemoryCreated { .. } => EventType::MemoryCreated,
            JarEvent::MemoryUpdated { .. } => EventType::MemoryUpdated,
            JarEvent::MemoryDeleted { .. } => EventType::MemoryDeleted,
            JarEvent::RemoteChange { .. } => EventType::RemoteChange,
            JarEvent::SyncError { .. } => EventType::SyncError,
        }
    }
}

struct CallbackEntry {
    callback: Box<dyn Fn(&JarEvent) + Send>,
    event_filter: Option<EventType>,
}

pub struct EventDispatcher {
    callbacks: Mutex<Vec<CallbackEntry>>,
    event_queue: Mutex<mpsc::Receiver<JarEvent>>,
    event_sender: mpsc::Sender<JarEvent>,
    pending: AtomicUsize,
    listeners: AtomicUsize,
    callback_thread_id: Mutex<Option<ThreadId>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            callbacks: Mutex::new(Vec::new()),
            event_queue: Mutex::new(receiver),
            event_sender: sender,
            pending: AtomicUsize::new(0),
            listeners: AtomicUsize::new(0),
            callback_thread_id: Mutex::new(None),
        }
    }

    fn ensure_callback_thread(&self) -> JarResult<()> {
        let mut thread_id = self
            .callback_thread_id
            .lock()
            .map_err(|_| JarError::LockError("thread ID".into()))?;
        if thread_id.is_none() {
            *thread_id = Some(thread::current().id());
            tracing::info!(
                "Event callbacks will be processed on thread: {:?}",
                thread::current().id()
            );
        }
        Ok(())
    }

    pub fn register_callback<F>(&self, callback: F) -> JarResult<()>
    where
        F: Fn(&JarEvent) + Send + 'static,
    {
        self.register(Box::new(callback), None)
    }

    /// Register a callback that only receives events of one type
    pub fn register_callback_filtered<F>(&self, callback: F, event_filter: EventType) -> JarResult<()>
    where
        F: Fn(&JarEvent) + Send + 'static,
    {
        self.register(Box::new(callback), Some(event_filter))
    }

    fn register(
        &self,
        callback: Box<dyn Fn(&JarEvent) + Send>,
        event_filter: Option<EventType>,
    ) -> JarResult<()> {
        self.ensure_callback_thread()?;

        let mut callbacks = self
            .callbacks
            .lock()
            .map_err(|_| JarError::LockError("callbacks".into()))?;
        callbacks.push(CallbackEntry {
            callback,
            event_filter,
        });
        self.listeners.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Queues `event` for the next `process_events()`. Dropped when no
    /// callback is registered, since nothing would ever drain it.
    pub fn emit(&self, event: JarEvent) {
        if self.listeners.load(Ordering::SeqCst) == 0 {
            tracing::trace!("EVENTS: no listeners for {:?}", event.event_type());
            return;
        }
        tracing::debug!("EVENTS: queued {:?}", event.event_type());
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.event_sender.send(event).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::error!("Failed to queue event - receiver may have been dropped");
        }
    }

    pub fn emit_sync_error(&self, message: impl Into<String>) {
        self.emit(JarEvent::SyncError {
            message: message.into(),
        });
    }

    /// Runs callbacks for every queued event. Returns how many events were
    /// drained.
    pub fn process_events(&self) -> JarResult<usize> {
        {
            let thread_id = self
                .callback_thread_id
                .lock()
                .map_err(|_| JarError::LockError("thread ID".into()))?;
            if let Some(expected) = *thread_id {
                if expected != thread::current().id() {
                    return Err(JarError::LockError(
                        "process_events called from a thread that did not register callbacks"
                            .into(),
                    ));
                }
            }
        }

        let events: Vec<JarEvent> = {
            let queue = self
                .event_queue
                .lock()
                .map_err(|_| JarError::LockError("event queue".into()))?;
            queue.try_iter().collect()
        };
        self.pending.fetch_sub(events.len(), Ordering::SeqCst);

        let callbacks = self
            .callbacks
            .lock()
            .map_err(|_| JarError::LockError("callbacks".into()))?;

        for event in &events {
            let event_type = event.event_type();
            for entry in callbacks.iter() {
                if entry.event_filter.map_or(true, |filter| filter == event_type) {
                    (entry.callback)(event);
                }
            }
        }

        Ok(events.len())
    }

    /// Number of events waiting for `process_events()`
    pub fn pending_event_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
