use backon::{ExponentialBuilder, Retryable};
use futures_util::StreamExt;
use jar_core::{JarId, PushMessage, RemoteError};
use reqwest::Url;
use std::future::poll_fn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::Poll;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type PushStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SIGNAL_BUFFER: usize = 16;

/// "Something changed in this jar". Carries no row data on purpose: the
/// consumer refetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSignal {
    pub jar_id: JarId,
}

struct Channel {
    jar_id: JarId,
    signals: Mutex<mpsc::Receiver<ChangeSignal>>,
    task: Mutex<Option<JoinHandle<()>>>,
    released: AtomicBool,
}

impl Channel {
    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.signals).close();
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        tracing::info!("PUSH: unsubscribed from jar {}", self.jar_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Live push subscription for one jar.
///
/// The underlying connection is released exactly once: by `close()`, by a
/// [`ReleaseHandle`], or on drop, whichever comes first.
pub struct Subscription {
    channel: Arc<Channel>,
}

/// Releases a subscription from outside the task consuming it. Takes
/// effect before `release()` returns.
#[derive(Clone)]
pub struct ReleaseHandle {
    channel: Arc<Channel>,
}

impl ReleaseHandle {
    pub fn release(&self) {
        self.channel.release();
    }

    pub fn is_released(&self) -> bool {
        self.channel.released.load(Ordering::SeqCst)
    }
}

impl Subscription {
    /// Wraps a signal channel. `task` is the background reader feeding it,
    /// if any; it is aborted on release.
    pub fn new(
        jar_id: JarId,
        signals: mpsc::Receiver<ChangeSignal>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            channel: Arc::new(Channel {
                jar_id,
                signals: Mutex::new(signals),
                task: Mutex::new(task),
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn jar_id(&self) -> &JarId {
        &self.channel.jar_id
    }

    pub fn release_handle(&self) -> ReleaseHandle {
        ReleaseHandle {
            channel: self.channel.clone(),
        }
    }

    /// Waits for the next change. Signals already queued behind it are
    /// folded into the same one. `None` once the channel is gone or
    /// released.
    pub async fn next(&mut self) -> Option<ChangeSignal> {
        let channel = &self.channel;
        let signal = poll_fn(|cx| {
            if channel.released.load(Ordering::SeqCst) {
                return Poll::Ready(None);
            }
            lock(&channel.signals).poll_recv(cx)
        })
        .await?;

        let mut folded = 0;
        {
            let mut signals = lock(&channel.signals);
            while signals.try_recv().is_ok() {
                folded += 1;
            }
        }
        if folded > 0 {
            tracing::debug!("PUSH: coalesced {} extra signals for {}", folded, channel.jar_id);
        }
        Some(signal)
    }

    pub fn close(self) {
        self.channel.release();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.channel.release();
    }
}

/// Connects the push channel at `url` and starts forwarding its change
/// notices for `jar_id`.
///
/// The first connection must succeed. After that, a dropped connection is
/// re-established with backoff and followed by one synthetic signal, since
/// changes may have been missed while disconnected.
pub async fn subscribe(url: Url, jar_id: JarId) -> Result<Subscription, RemoteError> {
    let (stream, _) = connect_async(url.as_str())
        .await
        .map_err(|e| RemoteError::Subscribe(e.to_string()))?;
    tracing::info!("PUSH: connected to {} for jar {}", url, jar_id);

    let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
    let task = tokio::spawn(run_channel(url, jar_id.clone(), stream, tx));

    Ok(Subscription::new(jar_id, rx, Some(task)))
}

async fn run_channel(url: Url, jar_id: JarId, mut stream: PushStream, tx: mpsc::Sender<ChangeSignal>) {
    loop {
        if !forward_signals(&mut stream, &jar_id, &tx).await {
            return;
        }

        tracing::warn!("PUSH: connection for jar {} dropped, reconnecting", jar_id);
        stream = match reconnect(&url).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("PUSH: giving up on jar {}: {}", jar_id, e);
                return;
            }
        };
        tracing::info!("PUSH: reconnected for jar {}", jar_id);

        if !offer(&tx, &jar_id) {
            return;
        }
    }
}

/// Pumps one connection. Returns false when the consumer has gone away,
/// true when the connection ended.
async fn forward_signals(stream: &mut PushStream, jar_id: &JarId, tx: &mpsc::Sender<ChangeSignal>) -> bool {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<PushMessage>(&text) {
                Ok(PushMessage::Changed { jar_id: changed, event }) if &changed == jar_id => {
                    tracing::debug!("PUSH: {} in jar {}", event, jar_id);
                    if !offer(tx, jar_id) {
                        return false;
                    }
                }
                Ok(PushMessage::Changed { jar_id: other, .. }) => {
                    tracing::debug!("PUSH: ignoring change for foreign jar {}", other);
                }
                Ok(PushMessage::Subscribed { jar_id }) => {
                    tracing::info!("PUSH: subscription to {} confirmed", jar_id);
                }
                Ok(PushMessage::Error { message }) => {
                    tracing::warn!("PUSH: server reported: {}", message);
                }
                Err(e) => {
                    tracing::warn!("PUSH: unreadable message: {}", e);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("PUSH: read error: {}", e);
                break;
            }
        }
    }
    !tx.is_closed()
}

fn offer(tx: &mpsc::Sender<ChangeSignal>, jar_id: &JarId) -> bool {
    match tx.try_send(ChangeSignal {
        jar_id: jar_id.clone(),
    }) {
        // A full buffer already guarantees a refetch
        Ok(()) | Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Closed(_)) => false,
    }
}

async fn reconnect(url: &Url) -> Result<PushStream, tokio_tungstenite::tungstenite::Error> {
    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(10))
        .with_max_times(8)
        .with_jitter();

    (|| async { connect_async(url.as_str()).await.map(|(stream, _)| stream) })
        .retry(backoff)
        .notify(|err, delay| {
            tracing::warn!("PUSH: reconnect failed ({}), retrying in {:?}", err, delay);
        })
        .await
}
