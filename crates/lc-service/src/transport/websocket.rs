//! WebSocket transport.
//!
//! Each upgraded socket is split in two:
//! - the write half becomes the sink of a `ConnectionActor`, which rooms
//!   feed without waiting
//! - the read half is drained here, one text frame at a time, into the
//!   `EventHub`
//!
//! Both halves share one cancellation token (a child of the controller's),
//! so a slow-consumer disconnect, a client close or a service shutdown all
//! stop the reader and the writer together. The connection is then removed
//! from its room.

use crate::actors::{ConnectionActor, ConnectionId, OutboundFrame};
use crate::routes::AppState;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::future::ready;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long the writer may take to flush its close frame after the reader
/// stops.
const WRITER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// `GET /ws` - upgrade to a live-class WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let max_frame_bytes = state.config.max_frame_bytes;
    ws.max_message_size(max_frame_bytes)
        .max_frame_size(max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

fn to_message(frame: OutboundFrame) -> Message {
    match frame {
        OutboundFrame::Text(text) => Message::Text(text.as_ref().to_owned()),
        OutboundFrame::Close { reason } => Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: reason.into(),
        })),
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let hub = &state.hub;
    let connection_id = ConnectionId::generate();

    let (sink, mut stream) = socket.split();
    let sink = sink.with(|frame: OutboundFrame| ready(Ok::<_, axum::Error>(to_message(frame))));

    let (connection, writer) = ConnectionActor::spawn(
        connection_id,
        sink,
        hub.controller().child_token(),
        Arc::clone(hub.metrics()),
    );
    hub.open_connection(connection.clone()).await;

    info!(
        target: "lc.transport",
        connection_id = %connection_id,
        "WebSocket connection opened"
    );

    let cancel_token = connection.cancel_token();
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                debug!(
                    target: "lc.transport",
                    connection_id = %connection_id,
                    "Connection cancelled, stopping reader"
                );
                break;
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        hub.handle_frame(connection_id, &text).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        hub.reject_binary(connection_id).await;
                    }
                    // Pongs are answered by the socket itself.
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(
                            target: "lc.transport",
                            connection_id = %connection_id,
                            "Client closed connection"
                        );
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(
                            target: "lc.transport",
                            connection_id = %connection_id,
                            error = %e,
                            "WebSocket read failed"
                        );
                        break;
                    }
                }
            }
        }
    }

    hub.close_connection(connection_id).await;
    connection.cancel();

    if tokio::time::timeout(WRITER_STOP_TIMEOUT, writer).await.is_err() {
        warn!(
            target: "lc.transport",
            connection_id = %connection_id,
            "Connection writer did not stop in time"
        );
    }

    info!(
        target: "lc.transport",
        connection_id = %connection_id,
        "WebSocket connection closed"
    );
}
