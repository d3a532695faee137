use crate::session::SessionFactory;
use crate::signaling::SignalingService;
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use beacon_core::SignalMessage;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const TRANSPORT_CAPACITY: usize = 64;

/// Builds the signaling router; mount it into any axum server.
pub fn router<F: SessionFactory>(service: SignalingService<F>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::<F>))
        .with_state(service)
}

pub async fn ws_handler<F: SessionFactory>(
    ws: WebSocketUpgrade,
    State(service): State<SignalingService<F>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, service))
}

async fn handle_socket<F: SessionFactory>(socket: WebSocket, service: SignalingService<F>) {
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<SignalMessage>(TRANSPORT_CAPACITY);
    let (msg_tx, msg_rx) = mpsc::channel::<SignalMessage>(TRANSPORT_CAPACITY);

    let id = match service.accept(out_tx.clone(), msg_rx).await {
        Ok(id) => id,
        Err(err) => {
            error!(%err, "failed to create peer session");
            let _ = sender.close().await;
            return;
        }
    };
    info!(connection = %id, "new websocket connection");

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            // The error kind terminates the connection.
            let terminal = matches!(msg, SignalMessage::Error { .. });
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(err) => error!(%err, "failed to serialize signal message"),
            }
            if terminal {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let mut recv_task = tokio::spawn({
        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(signal) => {
                            if msg_tx.send(signal).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(connection = %id, %err, "malformed signal message");
                            let _ = out_tx
                                .send(SignalMessage::Error {
                                    message: format!("malformed message: {err}"),
                                })
                                .await;
                            break;
                        }
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            // Dropping msg_tx lets the connection task tear down.
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    info!(connection = %id, "websocket disconnected");
}
