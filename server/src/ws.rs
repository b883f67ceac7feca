use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chapayev_shared::protocol::{ClientMsg, ServerMsg};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;

use crate::relay::RelayCommand;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub relay_tx: mpsc::Sender<RelayCommand>,
    pub max_message_bytes: usize,
    pub max_parse_errors: u32,
}

/// `GET /ws` plus permissive CORS for the browser client
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    let limit = app_state.max_message_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(|socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<ServerMsg>();

    // Register with the relay
    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .relay_tx
        .send(RelayCommand::Connect {
            outbox,
            response: resp_tx,
        })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Connect command");
        return;
    }
    let my_id = match resp_rx.await {
        Ok(id) => id,
        Err(_) => {
            tracing::error!("Relay dropped the connection request");
            return;
        }
    };

    tracing::info!("Connection {} opened", my_id);

    let mut parse_errors: u32 = 0;

    loop {
        tokio::select! {
            // Client -> Relay
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > app_state.max_message_bytes {
                            tracing::warn!("Connection {} sent {} bytes, closing", my_id, text.len());
                            let _ = sink.send(close(close_code::SIZE, "message too large")).await;
                            break;
                        }
                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(msg) => {
                                parse_errors = 0;
                                let cmd = RelayCommand::Message { id: my_id, msg };
                                if app_state.relay_tx.send(cmd).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                parse_errors += 1;
                                tracing::warn!("Connection {} sent malformed message: {}", my_id, e);
                                if parse_errors >= app_state.max_parse_errors {
                                    let _ = sink.send(close(close_code::POLICY, "too many malformed messages")).await;
                                    break;
                                }
                                let reply = ServerMsg::Error { text: format!("malformed message: {}", e) };
                                if let Ok(json) = serde_json::to_string(&reply) {
                                    if sink.send(Message::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!("Connection {} read error: {}", my_id, e);
                        break;
                    }
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Relay -> Client
            out = outbox_rx.recv() => {
                let Some(msg) = out else { break };
                if let Ok(json) = serde_json::to_string(&msg) {
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    let _ = app_state
        .relay_tx
        .send(RelayCommand::Disconnect { id: my_id })
        .await;
    tracing::info!("Connection {} closed", my_id);
}

fn close(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
