//! WebSocket feed of recent-sample snapshots.
//!
//! Each client gets its own observable-query subscription. The first message
//! is the snapshot at connect time; a new one follows every insert. The
//! subscription is torn down when the socket closes.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use tracklog_store::StoredSample;

use crate::state::AppState;

/// Message sent to WebSocket clients.
#[derive(Debug, Serialize)]
pub struct SnapshotMessage<'a> {
    /// Number of samples in this snapshot.
    pub count: usize,
    /// Samples, newest first.
    pub samples: &'a [StoredSample],
}

/// Create the WebSocket router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/ws", get(ws_handler))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    stream_snapshots(sender, receiver, state).await;
}

/// Push snapshots to `sender` until either side of the connection closes.
async fn stream_snapshots<S, R>(mut sender: S, mut receiver: R, state: Arc<AppState>)
where
    S: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
{
    // The subscription evaluates immediately, so the first snapshot doubles
    // as the connect-time state
    let mut subscription = state.query.subscribe();

    info!("WebSocket client connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(snapshot) = subscription.changed().await {
            let message = SnapshotMessage {
                count: snapshot.len(),
                samples: &snapshot,
            };
            let json = match serde_json::to_string(&message) {
                Ok(j) => j,
                Err(e) => {
                    warn!("Failed to serialize snapshot: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        // Dropping the subscription stops its query task
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(_)) => debug!("Received ping"),
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        },
        _ = &mut recv_task => {
            send_task.abort();
        },
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures::channel::mpsc;
    use tokio::time::timeout;

    use tracklog_core::{LogKeepAlive, PushProvider, SpeedSample};
    use tracklog_store::Store;

    use crate::config::Config;
    use crate::state::ProviderHandle;

    fn create_test_state() -> Arc<AppState> {
        AppState::new(
            Store::open_in_memory().unwrap(),
            ProviderHandle::Push(Arc::new(PushProvider::new(true))),
            Arc::new(LogKeepAlive),
            Config::default(),
        )
        .unwrap()
    }

    async fn next_snapshot(rx: &mut mpsc::UnboundedReceiver<Message>) -> serde_json::Value {
        let message = timeout(Duration::from_secs(5), rx.next())
            .await
            .unwrap()
            .unwrap();
        match message {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_feed_pushes_snapshots_until_close() {
        let state = create_test_state();
        let (out_tx, mut out_rx) = mpsc::unbounded::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded::<Result<Message, axum::Error>>();
        let feed = tokio::spawn(stream_snapshots(out_tx, in_rx, Arc::clone(&state)));

        // Connect-time snapshot
        let first = next_snapshot(&mut out_rx).await;
        assert_eq!(first["count"], 0);
        assert!(first["samples"].as_array().unwrap().is_empty());

        state
            .store
            .insert(SpeedSample::new(100, 1.0, 2.0, 3.0))
            .await
            .unwrap();
        let second = next_snapshot(&mut out_rx).await;
        assert_eq!(second["count"], 1);
        assert_eq!(second["samples"][0]["latitude"], 1.0);
        assert_eq!(second["samples"][0]["speed"], 3.0);

        in_tx.unbounded_send(Ok(Message::Close(None))).unwrap();
        timeout(Duration::from_secs(5), feed).await.unwrap().unwrap();

        for _ in 0..200 {
            if state.store.change_receivers() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("snapshot subscription still alive after close");
    }

    #[tokio::test]
    async fn test_feed_ends_when_client_goes_away() {
        let state = create_test_state();
        let (out_tx, mut out_rx) = mpsc::unbounded::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded::<Result<Message, axum::Error>>();
        let feed = tokio::spawn(stream_snapshots(out_tx, in_rx, Arc::clone(&state)));

        next_snapshot(&mut out_rx).await;
        drop(in_tx);
        drop(out_rx);

        timeout(Duration::from_secs(5), feed).await.unwrap().unwrap();
    }

    #[test]
    fn test_snapshot_message_serialization() {
        let samples = [StoredSample {
            id: 1,
            timestamp: 100,
            latitude: 1.0,
            longitude: 2.0,
            speed: 3.0,
        }];
        let message = SnapshotMessage {
            count: samples.len(),
            samples: &samples,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["samples"][0]["id"], 1);
        assert_eq!(json["samples"][0]["speed"], 3.0);
    }
}
