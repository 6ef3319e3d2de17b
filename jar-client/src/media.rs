//! Media attachments and audio capture.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use jar_core::{content_type_for, JarError, JarResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub const RECORDING_CONTENT_TYPE: &str = "audio/webm";
pub const RECORDING_EXTENSION: &str = "webm";

/// Binary media waiting to be attached to a memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: String,
}

impl MediaBlob {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            extension: extension.into(),
        }
    }

    pub async fn from_path(path: &Path) -> JarResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "bin".to_string());
        let content_type = content_type_for(&extension).to_string();
        Ok(Self {
            bytes,
            content_type,
            extension,
        })
    }

    /// Embeds the blob as a `data:` URL for memories that are never uploaded.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, BASE64.encode(&self.bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An open microphone stream.
///
/// The source keeps sending encoded chunks until `stop` fires, then closes
/// the chunk channel.
pub struct AudioStream {
    pub chunks: mpsc::Receiver<Vec<u8>>,
    pub stop: oneshot::Sender<()>,
}

/// Something that can hand out microphone streams.
pub trait AudioSource: Send + Sync {
    /// Fails with `JarError::MediaAccess` when permission is denied or no
    /// device exists.
    fn open(&self) -> JarResult<AudioStream>;
}

struct ActiveRecording {
    stop: oneshot::Sender<()>,
    buffer: JoinHandle<Vec<u8>>,
}

/// Buffers one recording at a time.
pub struct Recorder {
    source: Arc<dyn AudioSource>,
    active: Option<ActiveRecording>,
}

impl Recorder {
    pub fn new(source: Arc<dyn AudioSource>) -> Self {
        Self {
            source,
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Acquires the microphone and starts buffering. Returns as soon as the
    /// stream is open.
    pub fn start(&mut self) -> JarResult<()> {
        if self.active.is_some() {
            tracing::debug!("RECORDER: already recording");
            return Ok(());
        }

        let AudioStream { mut chunks, stop } = self.source.open().map_err(|e| match e {
            JarError::MediaAccess(_) => e,
            other => JarError::MediaAccess(other.to_string()),
        })?;

        let buffer = tokio::spawn(async move {
            let mut data = Vec::new();
            while let Some(chunk) = chunks.recv().await {
                data.extend_from_slice(&chunk);
            }
            data
        });

        self.active = Some(ActiveRecording { stop, buffer });
        tracing::info!("RECORDER: recording started");
        Ok(())
    }

    /// Finalizes the buffered audio into one blob. `None` if nothing was
    /// recording.
    pub async fn stop(&mut self) -> JarResult<Option<MediaBlob>> {
        let Some(recording) = self.active.take() else {
            return Ok(None);
        };

        // The source may already have ended the stream on its own
        let _ = recording.stop.send(());

        let data = recording
            .buffer
            .await
            .map_err(|e| JarError::MediaAccess(format!("recording task failed: {}", e)))?;

        tracing::info!("RECORDER: recording stopped ({} bytes)", data.len());
        Ok(Some(MediaBlob::new(
            data,
            RECORDING_CONTENT_TYPE,
            RECORDING_EXTENSION,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Emits a fixed set of chunks and then waits for the stop signal.
    struct ScriptedMicrophone {
        chunks: Vec<Vec<u8>>,
        opened: AtomicUsize,
    }

    impl AudioSource for ScriptedMicrophone {
        fn open(&self) -> JarResult<AudioStream> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(16);
            let (stop_tx, stop_rx) = oneshot::channel();
            let chunks = self.chunks.clone();
            tokio::spawn(async move {
                for chunk in chunks {
                    if tx.send(chunk).await.is_err() {
                        return;
                    }
                }
                let _ = stop_rx.await;
            });
            Ok(AudioStream {
                chunks: rx,
                stop: stop_tx,
            })
        }
    }

    struct DeniedMicrophone;

    impl AudioSource for DeniedMicrophone {
        fn open(&self) -> JarResult<AudioStream> {
            Err(JarError::MediaAccess("permission denied".into()))
        }
    }

    #[tokio::test]
    async fn test_recorder_concatenates_chunks() {
        let mic = Arc::new(ScriptedMicrophone {
            chunks: vec![b"ab".to_vec(), b"cd".to_vec()],
            opened: AtomicUsize::new(0),
        });
        let mut recorder = Recorder::new(mic.clone());

        recorder.start().unwrap();
        assert!(recorder.is_recording());
        // Starting twice keeps the first stream
        recorder.start().unwrap();
        assert_eq!(mic.opened.load(Ordering::SeqCst), 1);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let blob = recorder.stop().await.unwrap().unwrap();
        assert_eq!(blob.bytes, b"abcd");
        assert_eq!(blob.content_type, "audio/webm");
        assert!(!recorder.is_recording());
    }

    #[tokio::test]
    async fn test_stop_without_recording_is_no_data() {
        let mut recorder = Recorder::new(Arc::new(DeniedMicrophone));
        assert_eq!(recorder.stop().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_denied_microphone_does_not_start() {
        let mut recorder = Recorder::new(Arc::new(DeniedMicrophone));
        assert!(matches!(recorder.start(), Err(JarError::MediaAccess(_))));
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_data_url() {
        let blob = MediaBlob::new(b"hi".to_vec(), "image/png", "png");
        assert_eq!(blob.to_data_url(), "data:image/png;base64,aGk=");
    }

    #[tokio::test]
    async fn test_from_path_infers_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.WEBM");
        std::fs::write(&path, b"123").unwrap();

        let blob = MediaBlob::from_path(&path).await.unwrap();
        assert_eq!(blob.extension, "webm");
        assert_eq!(blob.content_type, "audio/webm");
        assert_eq!(blob.bytes, b"123");
    }
}
