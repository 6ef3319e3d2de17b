//! Memory Jar - shared journaling jars
//!
//! This crate provides a unified API over the jar client, server and core
//! types, plus the text rendering used by the `memory-jar` terminal app.
//!
//! # Example
//!
//! ```ignore
//! use memory_jar::{HttpRemote, JarClient, SqliteStore};
//!
//! let store = SqliteStore::open("sqlite:memory_jar.sqlite3?mode=rwc").await?;
//! let client = JarClient::new(Arc::new(HttpRemote::new(url)?), Arc::new(store));
//! client.join_jar("K3Q9ZD").await?;
//! ```

pub mod form;
pub mod view;

// Re-export client types
pub use jar_client::{
    Backup, ClientConfig, Confirmation, DeleteOutcome, EventType, HttpRemote, JarClient,
    JarEvent, JarMode, MediaBlob, SqliteStore,
};

// Re-export server types
pub use jar_server::AppState as Server;

// Re-export core types that external applications may need
pub use jar_core::{JarError, JarHistory, JarId, JarResult, Memory, MemoryDraft, MemoryId};
