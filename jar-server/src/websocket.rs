use crate::{api::{parse_jar, JarQuery}, AppState, ChangeNotice, ServerResult};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{Sink, SinkExt, StreamExt};
use jar_core::{ChangeKind, JarId, PushMessage};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<JarQuery>,
    State(state): State<Arc<AppState>>,
) -> ServerResult<Response> {
    let jar_id = parse_jar(&query.jar_id)?;
    // Subscribe before the handshake completes so no write after it is missed
    let changes = state.changes.subscribe();
    Ok(ws.on_upgrade(move |socket| handle_websocket(socket, jar_id, changes)))
}

/// Forwards change notices for one jar to one connection until either side
/// goes away. Nothing the client sends is interpreted.
pub async fn handle_websocket(
    socket: WebSocket,
    jar_id: JarId,
    mut changes: broadcast::Receiver<ChangeNotice>,
) {
    let (mut sender, mut receiver) = socket.split();
    tracing::info!(jar_id = %jar_id, "Push channel opened");

    if send(&mut sender, &PushMessage::Subscribed { jar_id: jar_id.clone() })
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            change = changes.recv() => {
                let message = match change {
                    Ok(ChangeNotice { jar_id: changed, kind }) if changed == jar_id => {
                        PushMessage::Changed { jar_id: changed, event: kind }
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(jar_id = %jar_id, skipped, "Push channel lagged");
                        PushMessage::Changed { jar_id: jar_id.clone(), event: ChangeKind::Update }
                    }
                    Err(RecvError::Closed) => break,
                };
                if send(&mut sender, &message).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(jar_id = %jar_id, %e, "Push channel read error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(jar_id = %jar_id, "Push channel closed");
}

async fn send<S>(sender: &mut S, message: &PushMessage) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(%e, "Failed to encode push message");
            return Err(());
        }
    };
    sender.send(Message::Text(json)).await.map_err(|_| ())
}
