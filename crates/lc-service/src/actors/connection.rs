//! `ConnectionActor` - per-WebSocket outbound writer.
//!
//! Each `ConnectionActor`:
//! - Owns the write half of exactly one client connection
//! - Receives pre-encoded frames from room actors and writes them in order
//! - Is cancelled when the client goes away, falls too far behind, or the
//!   service shuts down
//!
//! Room actors never await a connection. They call
//! [`ConnectionActorHandle::try_deliver`], which fails fast when the bounded
//! mailbox is full; the caller then cancels the connection so the client
//! reconnects and resynchronizes from a fresh roster.

use crate::errors::LcError;

use super::messages::{ConnectionId, ConnectionMessage};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use futures_util::{Sink, SinkExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Channel buffer size for the connection mailbox.
pub const CONNECTION_CHANNEL_BUFFER: usize = 200;

/// How long a close frame may take to write.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A frame handed to the underlying transport sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(Arc<str>),
    Close { reason: String },
}

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The mailbox is full: the client is not keeping up.
    MailboxFull,
    /// The actor has stopped.
    Closed,
}

/// Handle to a `ConnectionActor`.
#[derive(Clone, Debug)]
pub struct ConnectionActorHandle {
    sender: mpsc::Sender<ConnectionMessage>,
    cancel_token: CancellationToken,
    connection_id: ConnectionId,
}

impl ConnectionActorHandle {
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Queue a frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::MailboxFull` if the client is behind, or
    /// `DeliveryError::Closed` if the actor has stopped.
    pub fn try_deliver(&self, frame: Arc<str>) -> Result<(), DeliveryError> {
        self.sender
            .try_send(ConnectionMessage::Deliver { frame })
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryError::MailboxFull,
                TrySendError::Closed(_) => DeliveryError::Closed,
            })
    }

    /// Close the connection after frames already queued.
    pub async fn close(&self, reason: String) -> Result<(), LcError> {
        self.sender
            .send(ConnectionMessage::Close { reason })
            .await
            .map_err(|e| LcError::Internal(format!("channel send failed: {e}")))
    }

    /// Ping the actor to check liveness.
    pub async fn ping(&self) -> Result<(), LcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(ConnectionMessage::Ping { respond_to: tx })
            .await
            .map_err(|e| LcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| LcError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the connection actor (and the reader tied to its token).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// The actor's cancellation token, shared with the connection's reader.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

/// The `ConnectionActor` implementation.
pub struct ConnectionActor<S> {
    connection_id: ConnectionId,
    sink: S,
    receiver: mpsc::Receiver<ConnectionMessage>,
    /// Cancellation token (child of the controller's token).
    cancel_token: CancellationToken,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
    is_closing: bool,
}

impl<S> ConnectionActor<S>
where
    S: Sink<OutboundFrame> + Unpin + Send + 'static,
    S::Error: fmt::Display,
{
    /// Spawn a new connection actor writing to `sink`.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        connection_id: ConnectionId,
        sink: S,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (ConnectionActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(CONNECTION_CHANNEL_BUFFER);

        metrics.connection_opened();

        let actor = Self {
            connection_id,
            sink,
            receiver,
            cancel_token: cancel_token.clone(),
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Connection, connection_id.to_string()),
            is_closing: false,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = ConnectionActorHandle {
            sender,
            cancel_token,
            connection_id,
        };

        (handle, task_handle)
    }

    #[instrument(
        skip_all,
        name = "lc.actor.connection",
        fields(connection_id = %self.connection_id)
    )]
    async fn run(mut self) {
        debug!(
            target: "lc.actor.connection",
            connection_id = %self.connection_id,
            "ConnectionActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "lc.actor.connection",
                        connection_id = %self.connection_id,
                        "ConnectionActor received cancellation signal"
                    );
                    self.graceful_close("cancelled").await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_received(self.receiver.len());
                            let should_exit = self.handle_message(message).await;
                            self.metrics.record_message_processed();

                            if should_exit {
                                break;
                            }
                        }
                        None => {
                            debug!(
                                target: "lc.actor.connection",
                                connection_id = %self.connection_id,
                                "ConnectionActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        // The reader shares this token and stops with the writer.
        self.cancel_token.cancel();
        self.metrics.connection_closed();

        info!(
            target: "lc.actor.connection",
            connection_id = %self.connection_id,
            messages_processed = self.mailbox.messages_processed(),
            "ConnectionActor stopped"
        );
    }

    /// Handle a single message. Returns true if the actor should exit.
    async fn handle_message(&mut self, message: ConnectionMessage) -> bool {
        match message {
            ConnectionMessage::Deliver { frame } => !self.write(frame).await,

            ConnectionMessage::Close { reason } => {
                self.graceful_close(&reason).await;
                true
            }

            ConnectionMessage::Ping { respond_to } => {
                let _ = respond_to.send(());
                false
            }
        }
    }

    /// Write one frame. Returns false if the transport is gone.
    async fn write(&mut self, frame: Arc<str>) -> bool {
        if self.is_closing {
            return false;
        }

        let result = tokio::select! {
            result = self.sink.send(OutboundFrame::Text(frame)) => result,
            () = self.cancel_token.cancelled() => return false,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    target: "lc.actor.connection",
                    connection_id = %self.connection_id,
                    error = %e,
                    "Transport write failed"
                );
                false
            }
        }
    }

    async fn graceful_close(&mut self, reason: &str) {
        if self.is_closing {
            return;
        }
        self.is_closing = true;

        debug!(
            target: "lc.actor.connection",
            connection_id = %self.connection_id,
            reason = %reason,
            "Closing connection"
        );

        let close = self.sink.send(OutboundFrame::Close {
            reason: reason.to_string(),
        });
        match tokio::time::timeout(CLOSE_TIMEOUT, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(
                    target: "lc.actor.connection",
                    connection_id = %self.connection_id,
                    error = %e,
                    "Close frame not written"
                );
            }
            Err(_) => {
                warn!(
                    target: "lc.actor.connection",
                    connection_id = %self.connection_id,
                    "Close frame write timed out"
                );
            }
        }
    }
}
