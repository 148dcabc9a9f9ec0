//! Owned client session.
//!
//! `connect` splits the socket between two tasks sharing a
//! `CancellationToken`:
//! - the writer drains an outbound queue fed by the emitters
//! - the reader decodes server frames and routes them into `ClientEvents`
//!
//! Either task ending (server close, socket error, `disconnect`, drop)
//! cancels the other.

use crate::error::ClientError;
use crate::events::{ClientEvents, EventRouter};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use lc_protocol::{
    ChatDraft, ClientEvent, JoinRoom, LeaveRoom, PeerSignal, RaiseHand, RoomId, SendMessage,
    ServerEvent, StreamIntent, UserId, UserProfile,
};
use serde_json::value::RawValue;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// =============================================================================
// Constants
// =============================================================================

/// Outbound frames queued ahead of the socket.
const OUTBOUND_CHANNEL_BUFFER: usize = 64;

/// How long `disconnect` waits for the close handshake.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// LiveClassClient
// =============================================================================

/// A connected live-class session.
///
/// Dropping the client cancels its tasks without a close handshake; call
/// [`disconnect`](Self::disconnect) for an orderly close.
#[derive(Debug)]
pub struct LiveClassClient {
    outbound: mpsc::Sender<Message>,
    cancel_token: CancellationToken,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl LiveClassClient {
    /// Open a session to the controller's WebSocket endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Connect` if the handshake fails.
    pub async fn connect(url: &str) -> Result<(Self, ClientEvents), ClientError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;

        info!(target: "lc.client", url = %url, "Connected");

        let (sink, stream) = socket.split();
        let (client, events) = Self::start(sink, stream);
        Ok((client, events))
    }

    fn start<Si, St>(sink: Si, stream: St) -> (Self, ClientEvents)
    where
        Si: Sink<Message, Error = tungstenite::Error> + Unpin + Send + 'static,
        St: Stream<Item = Result<Message, tungstenite::Error>> + Unpin + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_BUFFER);
        let (router, events) = EventRouter::channel();
        let cancel_token = CancellationToken::new();

        let writer = tokio::spawn(write_loop(sink, outbound_rx, cancel_token.clone()));
        let reader = tokio::spawn(read_loop(stream, router, cancel_token.clone()));

        (
            Self {
                outbound,
                cancel_token,
                reader: Some(reader),
                writer: Some(writer),
            },
            events,
        )
    }

    /// Whether the session is still open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.cancel_token.is_cancelled()
    }

    /// Close the session: send a close frame, then wait for both tasks.
    ///
    /// Idempotent. Event receivers yield `None` afterwards.
    pub async fn disconnect(&mut self) {
        if self.is_connected() {
            // A full queue means the writer is stuck; cancel instead.
            if self.outbound.try_send(Message::Close(None)).is_err() {
                self.cancel_token.cancel();
            }
        }

        let tasks = async {
            if let Some(writer) = self.writer.take() {
                let _ = writer.await;
            }
            if let Some(reader) = self.reader.take() {
                let _ = reader.await;
            }
        };

        if tokio::time::timeout(DISCONNECT_TIMEOUT, tasks).await.is_err() {
            warn!(target: "lc.client", "Close handshake timed out, cancelling");
        }
        self.cancel_token.cancel();

        info!(target: "lc.client", "Disconnected");
    }

    // -------------------------------------------------------------------------
    // Emitters
    // -------------------------------------------------------------------------

    /// `join-room`
    ///
    /// # Errors
    ///
    /// `ClientError::Disconnected` once the session is closed.
    pub async fn join_room(
        &self,
        room_id: impl Into<RoomId>,
        user: UserProfile,
    ) -> Result<(), ClientError> {
        self.emit(&ClientEvent::JoinRoom(JoinRoom {
            room_id: room_id.into(),
            user,
        }))
        .await
    }

    /// `leave-room`
    ///
    /// # Errors
    ///
    /// `ClientError::Disconnected` once the session is closed.
    pub async fn leave_room(
        &self,
        room_id: impl Into<RoomId>,
        user_id: impl Into<UserId>,
    ) -> Result<(), ClientError> {
        self.emit(&ClientEvent::LeaveRoom(LeaveRoom {
            room_id: room_id.into(),
            user_id: user_id.into(),
        }))
        .await
    }

    /// `send-message`
    ///
    /// # Errors
    ///
    /// `ClientError::Disconnected` once the session is closed.
    pub async fn send_message(
        &self,
        room_id: impl Into<RoomId>,
        message: ChatDraft,
    ) -> Result<(), ClientError> {
        self.emit(&ClientEvent::SendMessage(SendMessage {
            room_id: room_id.into(),
            message,
        }))
        .await
    }

    /// `raise-hand`
    ///
    /// # Errors
    ///
    /// `ClientError::Disconnected` once the session is closed.
    pub async fn raise_hand(
        &self,
        room_id: impl Into<RoomId>,
        user_id: impl Into<UserId>,
        raised: bool,
    ) -> Result<(), ClientError> {
        self.emit(&ClientEvent::RaiseHand(RaiseHand {
            room_id: room_id.into(),
            user_id: user_id.into(),
            raised,
        }))
        .await
    }

    /// `broadcast-ready`
    ///
    /// # Errors
    ///
    /// `ClientError::Disconnected` once the session is closed.
    pub async fn broadcast_ready(
        &self,
        room_id: impl Into<RoomId>,
        user_id: impl Into<UserId>,
    ) -> Result<(), ClientError> {
        self.emit(&ClientEvent::BroadcastReady(StreamIntent {
            room_id: room_id.into(),
            user_id: user_id.into(),
        }))
        .await
    }

    /// `request-stream`
    ///
    /// # Errors
    ///
    /// `ClientError::Disconnected` once the session is closed.
    pub async fn request_stream(
        &self,
        room_id: impl Into<RoomId>,
        user_id: impl Into<UserId>,
    ) -> Result<(), ClientError> {
        self.emit(&ClientEvent::RequestStream(StreamIntent {
            room_id: room_id.into(),
            user_id: user_id.into(),
        }))
        .await
    }

    /// `peer-signal`. `payload` is delivered to the recipient verbatim.
    ///
    /// # Errors
    ///
    /// `ClientError::Disconnected` once the session is closed.
    pub async fn peer_signal(
        &self,
        room_id: impl Into<RoomId>,
        from_user_id: impl Into<UserId>,
        to_user_id: impl Into<UserId>,
        payload: Box<RawValue>,
    ) -> Result<(), ClientError> {
        self.emit(&ClientEvent::PeerSignal(PeerSignal {
            room_id: room_id.into(),
            from_user_id: from_user_id.into(),
            to_user_id: to_user_id.into(),
            payload,
        }))
        .await
    }

    /// Queue a raw text frame, bypassing encoding.
    ///
    /// # Errors
    ///
    /// `ClientError::Disconnected` once the session is closed.
    pub async fn send_raw(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.queue(Message::Text(text.into())).await
    }

    async fn emit(&self, event: &ClientEvent) -> Result<(), ClientError> {
        let frame = event.to_frame()?;
        debug!(target: "lc.client", event = event.name(), "Emitting event");
        self.queue(Message::Text(frame)).await
    }

    async fn queue(&self, message: Message) -> Result<(), ClientError> {
        if self.cancel_token.is_cancelled() {
            return Err(ClientError::Disconnected);
        }
        self.outbound
            .send(message)
            .await
            .map_err(|_| ClientError::Disconnected)
    }
}

impl Drop for LiveClassClient {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

// =============================================================================
// Tasks
// =============================================================================

async fn write_loop<Si>(
    mut sink: Si,
    mut outbound: mpsc::Receiver<Message>,
    cancel_token: CancellationToken,
) where
    Si: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,

            message = outbound.recv() => {
                let Some(message) = message else { break };
                let closing = matches!(message, Message::Close(_));

                if let Err(e) = sink.send(message).await {
                    debug!(target: "lc.client", error = %e, "WebSocket write failed");
                    cancel_token.cancel();
                    break;
                }
                // The reader finishes the handshake.
                if closing {
                    return;
                }
            }
        }
    }

    let _ = sink.close().await;
}

async fn read_loop<St>(mut stream: St, router: EventRouter, cancel_token: CancellationToken)
where
    St: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,

            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => match ServerEvent::from_frame(&text) {
                    Ok(event) => router.route(event),
                    Err(e) => {
                        warn!(
                            target: "lc.client",
                            error = %e,
                            "Ignoring undecodable server frame"
                        );
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    debug!(target: "lc.client", "Server closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(target: "lc.client", error = %e, "WebSocket read failed");
                    break;
                }
            },
        }
    }

    cancel_token.cancel();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use futures_channel::mpsc as fmpsc;
    use lc_protocol::{ChatMessage, Role};

    /// A client wired to in-memory channels instead of a socket.
    struct Harness {
        client: LiveClassClient,
        events: ClientEvents,
        /// Frames the client wrote.
        written: fmpsc::UnboundedReceiver<Message>,
        /// Frames the "server" sends.
        incoming: fmpsc::UnboundedSender<Result<Message, tungstenite::Error>>,
    }

    fn harness() -> Harness {
        let (sink_tx, written) = fmpsc::unbounded::<Message>();
        let sink = sink_tx.sink_map_err(|_| tungstenite::Error::ConnectionClosed);
        let (incoming, stream) = fmpsc::unbounded();

        let (client, events) = LiveClassClient::start(sink, stream);
        Harness {
            client,
            events,
            written,
            incoming,
        }
    }

    fn text(message: Message) -> serde_json::Value {
        match message {
            Message::Text(t) => serde_json::from_str(&t).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_join_room_writes_envelope() {
        let mut h = harness();

        h.client
            .join_room("class-42", UserProfile::new("u-1", "Ada", Role::Instructor))
            .await
            .unwrap();

        let frame = text(h.written.next().await.unwrap());
        assert_eq!(frame["event"], "join-room");
        assert_eq!(frame["data"]["roomId"], "class-42");
        assert_eq!(frame["data"]["user"]["id"], "u-1");
        assert_eq!(frame["data"]["user"]["role"], "instructor");
    }

    #[tokio::test]
    async fn test_peer_signal_payload_is_verbatim() {
        let mut h = harness();
        let payload = RawValue::from_string(r#"{"sdp":"v=0","type":"offer"}"#.to_string()).unwrap();

        h.client
            .peer_signal("class-42", "u-1", "u-2", payload)
            .await
            .unwrap();

        let Message::Text(frame) = h.written.next().await.unwrap() else {
            panic!("expected text frame");
        };
        assert!(frame.contains(r#""payload":{"sdp":"v=0","type":"offer"}"#));
    }

    #[tokio::test]
    async fn test_server_events_are_routed() {
        let mut h = harness();

        let chat = ServerEvent::NewMessage(ChatMessage {
            id: 1,
            client_message_id: None,
            user_id: UserId::from("u-1"),
            user_name: "Ada".to_string(),
            user_avatar: None,
            content: "Hello".to_string(),
            timestamp: 0,
        });
        h.incoming
            .unbounded_send(Ok(Message::Text(chat.to_frame().unwrap())))
            .unwrap();

        let message = h.events.chat.recv().await.unwrap();
        assert_eq!(message.id, 1);
        assert_eq!(message.content, "Hello");
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_skipped() {
        let mut h = harness();

        h.incoming
            .unbounded_send(Ok(Message::Text("not json".to_string())))
            .unwrap();
        h.incoming
            .unbounded_send(Ok(Message::Text(
                r#"{"event":"student-request-stream","data":{"studentId":"s-1"}}"#.to_string(),
            )))
            .unwrap();

        let request = h.events.stream_requests.recv().await.unwrap();
        assert_eq!(request.student_id.as_str(), "s-1");
        assert!(h.client.is_connected());
    }

    #[tokio::test]
    async fn test_server_close_ends_session() {
        let mut h = harness();

        h.incoming.unbounded_send(Ok(Message::Close(None))).unwrap();

        assert!(h.events.roster.recv().await.is_none());
        assert!(!h.client.is_connected());
        assert!(matches!(
            h.client.raise_hand("class-42", "u-1", true).await,
            Err(ClientError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_sends_close() {
        let mut h = harness();
        let incoming = h.incoming.clone();

        let server = tokio::spawn(async move {
            let frame = h.written.next().await.unwrap();
            assert!(matches!(frame, Message::Close(_)));
            incoming.unbounded_send(Ok(Message::Close(None))).unwrap();
        });

        h.client.disconnect().await;
        server.await.unwrap();

        assert!(!h.client.is_connected());
        assert!(h.events.chat.recv().await.is_none());

        // Idempotent.
        h.client.disconnect().await;
    }

    #[tokio::test]
    async fn test_drop_cancels_tasks() {
        let h = harness();
        let Harness {
            client,
            mut events,
            incoming: _incoming,
            ..
        } = h;

        drop(client);

        assert!(events.roster.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = LiveClassClient::connect(&format!("ws://{addr}/ws")).await;
        assert!(matches!(result, Err(ClientError::Connect(_))));
    }
}
