use thiserror::Error;

use crate::models::MemoryId;

#[derive(Error, Debug)]
pub enum JarError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Invalid data format: {0}")]
    ImportFormat(String),

    #[error("Microphone unavailable: {0}")]
    MediaAccess(String),

    #[error("Invalid memory: {0}")]
    Validation(String),

    #[error("Invalid jar id: {0:?}")]
    InvalidJarId(String),

    #[error("No jar is active")]
    NoActiveJar,

    #[error("Memory not found: {0}")]
    NotFound(MemoryId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to acquire lock: {0}")]
    LockError(String),
}

impl From<serde_json::Error> for JarError {
    fn from(err: serde_json::Error) -> Self {
        JarError::Serialization(err.to_string())
    }
}

/// Failure of a call against the hosted backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Memory {0} does not exist on the backend")]
    NotFound(MemoryId),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Push channel error: {0}")]
    Subscribe(String),
}

impl JarError {
    /// True for failures the user should see as a blocking alert.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            JarError::Remote(_)
                | JarError::ImportFormat(_)
                | JarError::MediaAccess(_)
                | JarError::Validation(_)
                | JarError::InvalidJarId(_)
                | JarError::NoActiveJar
        )
    }
}
