//! `RoomActor` - per-room actor that owns one live class.
//!
//! Each `RoomActor`:
//! - Owns the roster, the chat sequence and the current broadcaster
//! - Fans events out to participants' `ConnectionActor`s without awaiting them
//! - Reclaims itself once it has been empty for the grace period
//!
//! The actor is split by concern:
//! - [`presence`] - join, leave, disconnect and roster snapshots
//! - [`relay`] - chat and hand raises, plus the shared fan-out helpers
//! - [`signaling`] - stream readiness, stream requests and peer payloads
//!
//! # Reclamation
//!
//! The room arms an empty-deadline when it is spawned and whenever its last
//! participant goes. A join disarms it. When the deadline passes with the
//! room still empty, the actor closes its mailbox, answers any queued
//! `Join` with `LcError::RoomClosed` and exits. Callers holding a stale
//! handle retry through the controller, which then creates a fresh room.

mod presence;
mod relay;
mod signaling;

use crate::errors::LcError;
use crate::observability;

use super::connection::ConnectionActorHandle;
use super::messages::{
    ConnectionId, JoinOutcome, ParticipantState, RoomMessage, RoomState,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use lc_protocol::{ChatDraft, RoomId, UserId, UserProfile};
use serde_json::value::RawValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Channel buffer size for the room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 500;

/// Per-room limits, taken from service configuration.
#[derive(Debug, Clone, Copy)]
pub struct RoomSettings {
    /// How long an empty room is kept before it is reclaimed.
    pub grace_period: Duration,
    /// Maximum participants in the room.
    pub max_participants: usize,
}

/// Handle to a `RoomActor`.
#[derive(Clone, Debug)]
pub struct RoomActorHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    room_id: RoomId,
}

impl RoomActorHandle {
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Add a participant on `connection`, or re-bind them if already present.
    pub async fn join(
        &self,
        connection: ConnectionActorHandle,
        profile: UserProfile,
    ) -> Result<JoinOutcome, LcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send(RoomMessage::Join {
            connection,
            profile,
            respond_to: tx,
        })
        .await?;

        rx.await.map_err(|_| LcError::RoomClosed)?
    }

    /// Explicit leave. Returns whether a participant was removed.
    pub async fn leave(&self, connection_id: ConnectionId, user_id: UserId) -> Result<bool, LcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send(RoomMessage::Leave {
            connection_id,
            user_id,
            respond_to: tx,
        })
        .await?;

        rx.await.map_err(|_| LcError::RoomClosed)
    }

    /// Notify the room that a connection has gone away.
    pub async fn connection_closed(&self, connection_id: ConnectionId) -> Result<(), LcError> {
        self.send(RoomMessage::ConnectionClosed { connection_id })
            .await
    }

    /// Relay a chat message. Returns the assigned sequence number, if any.
    pub async fn publish_chat(&self, draft: ChatDraft) -> Result<Option<u64>, LcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send(RoomMessage::PublishChat {
            draft,
            respond_to: tx,
        })
        .await?;

        rx.await.map_err(|_| LcError::RoomClosed)
    }

    pub async fn publish_hand_raise(&self, user_id: UserId, raised: bool) -> Result<(), LcError> {
        self.send(RoomMessage::PublishHandRaise { user_id, raised })
            .await
    }

    pub async fn announce_broadcast(&self, user_id: UserId) -> Result<(), LcError> {
        self.send(RoomMessage::AnnounceBroadcast { user_id }).await
    }

    pub async fn request_stream(&self, user_id: UserId) -> Result<(), LcError> {
        self.send(RoomMessage::RequestStream { user_id }).await
    }

    pub async fn relay_peer_payload(
        &self,
        from: UserId,
        to: UserId,
        payload: Box<RawValue>,
    ) -> Result<(), LcError> {
        self.send(RoomMessage::RelayPeerPayload { from, to, payload })
            .await
    }

    /// Close the room if it has no participants. Returns whether it closed.
    pub async fn close_if_empty(&self) -> Result<bool, LcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        if self
            .send(RoomMessage::CloseIfEmpty { respond_to: tx })
            .await
            .is_err()
        {
            // Already closed counts as closed.
            return Ok(true);
        }

        Ok(rx.await.unwrap_or(true))
    }

    pub async fn get_state(&self) -> Result<RoomState, LcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send(RoomMessage::GetState { respond_to: tx }).await?;

        rx.await.map_err(|_| LcError::RoomClosed)
    }

    /// Whether the room has stopped accepting messages.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn send(&self, message: RoomMessage) -> Result<(), LcError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| LcError::RoomClosed)
    }
}

/// Participant state within a room.
#[derive(Debug)]
struct Participant {
    profile: UserProfile,
    hand_raised: bool,
    /// Milliseconds since the Unix epoch.
    joined_at: i64,
    connection: ConnectionActorHandle,
}

impl Participant {
    fn user_id(&self) -> &UserId {
        &self.profile.id
    }

    fn connection_id(&self) -> ConnectionId {
        self.connection.connection_id()
    }

    fn to_state(&self) -> ParticipantState {
        ParticipantState {
            user_id: self.profile.id.clone(),
            name: self.profile.name.clone(),
            avatar: self.profile.avatar.clone(),
            role: self.profile.role,
            hand_raised: self.hand_raised,
            joined_at: self.joined_at,
            connection_id: self.connection_id(),
        }
    }
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    room_id: RoomId,
    receiver: mpsc::Receiver<RoomMessage>,
    /// Cancellation token (child of the controller's token).
    cancel_token: CancellationToken,
    /// Participants in join order, unique by user id.
    participants: Vec<Participant>,
    /// User who most recently announced a ready stream.
    broadcaster: Option<UserId>,
    /// Sequence number for the next chat message.
    next_message_id: u64,
    created_at: i64,
    /// When the room will be reclaimed if it stays empty.
    empty_deadline: Option<Instant>,
    settings: RoomSettings,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl RoomActor {
    /// Spawn a new room actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        room_id: RoomId,
        cancel_token: CancellationToken,
        settings: RoomSettings,
        metrics: Arc<ActorMetrics>,
    ) -> (RoomActorHandle, JoinHandle<()>) {
        let (actor, handle) = Self::new(room_id, cancel_token, settings, metrics);
        (handle, tokio::spawn(actor.run()))
    }

    fn new(
        room_id: RoomId,
        cancel_token: CancellationToken,
        settings: RoomSettings,
        metrics: Arc<ActorMetrics>,
    ) -> (Self, RoomActorHandle) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);

        let actor = Self {
            room_id: room_id.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            participants: Vec::new(),
            broadcaster: None,
            next_message_id: 1,
            created_at: chrono::Utc::now().timestamp_millis(),
            empty_deadline: Some(Instant::now() + settings.grace_period),
            settings,
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Room, room_id.as_str()),
        };

        let handle = RoomActorHandle {
            sender,
            cancel_token,
            room_id,
        };

        (actor, handle)
    }

    #[instrument(skip_all, name = "lc.actor.room", fields(room_id = %self.room_id))]
    async fn run(mut self) {
        info!(
            target: "lc.actor.room",
            room_id = %self.room_id,
            "RoomActor started"
        );

        loop {
            let deadline = self.empty_deadline;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "lc.actor.room",
                        room_id = %self.room_id,
                        participants = self.participants.len(),
                        "RoomActor received cancellation signal"
                    );
                    break;
                }

                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() =>
                {
                    if self.participants.is_empty() {
                        info!(
                            target: "lc.actor.room",
                            room_id = %self.room_id,
                            grace_period_ms = self.settings.grace_period.as_millis(),
                            "Room empty past grace period, reclaiming"
                        );
                        observability::record_room_reclaimed();
                        self.close().await;
                        break;
                    }
                    self.empty_deadline = None;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_received(self.receiver.len());
                            let closed = self.handle_message(message).await;
                            self.metrics.record_message_processed();

                            if closed {
                                break;
                            }
                        }
                        None => {
                            debug!(
                                target: "lc.actor.room",
                                room_id = %self.room_id,
                                "RoomActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "lc.actor.room",
            room_id = %self.room_id,
            participants = self.participants.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomActor stopped"
        );
    }

    /// Handle a single message. Returns true if the room closed.
    async fn handle_message(&mut self, message: RoomMessage) -> bool {
        match message {
            RoomMessage::Join {
                connection,
                profile,
                respond_to,
            } => {
                let result = self.handle_join(connection, profile);
                let _ = respond_to.send(result);
            }

            RoomMessage::Leave {
                connection_id,
                user_id,
                respond_to,
            } => {
                let removed = self.handle_leave(connection_id, &user_id);
                let _ = respond_to.send(removed);
            }

            RoomMessage::ConnectionClosed { connection_id } => {
                self.handle_connection_closed(connection_id);
            }

            RoomMessage::PublishChat { draft, respond_to } => {
                let id = self.handle_chat(draft);
                let _ = respond_to.send(id);
            }

            RoomMessage::PublishHandRaise { user_id, raised } => {
                self.handle_hand_raise(user_id, raised);
            }

            RoomMessage::AnnounceBroadcast { user_id } => {
                self.handle_announce(user_id);
            }

            RoomMessage::RequestStream { user_id } => {
                self.handle_stream_request(user_id);
            }

            RoomMessage::RelayPeerPayload { from, to, payload } => {
                self.handle_peer_payload(from, &to, payload);
            }

            RoomMessage::CloseIfEmpty { respond_to } => {
                if self.participants.is_empty() {
                    let _ = respond_to.send(true);
                    self.close().await;
                    return true;
                }
                let _ = respond_to.send(false);
            }

            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.get_state());
            }
        }

        false
    }

    fn get_state(&self) -> RoomState {
        RoomState {
            room_id: self.room_id.clone(),
            participants: self.participants.iter().map(Participant::to_state).collect(),
            broadcaster: self.broadcaster.clone(),
            next_message_id: self.next_message_id,
            created_at: self.created_at,
            mailbox_depth: self.receiver.len(),
        }
    }

    /// Stop accepting messages and settle whatever is already queued.
    ///
    /// Queued joins are refused with `RoomClosed` so the caller retries
    /// against a fresh room; everything else addressed to an empty room has
    /// no audience and is dropped.
    async fn close(&mut self) {
        self.receiver.close();

        while let Some(message) = self.receiver.recv().await {
            match message {
                RoomMessage::Join { respond_to, .. } => {
                    let _ = respond_to.send(Err(LcError::RoomClosed));
                }
                RoomMessage::Leave { respond_to, .. } => {
                    let _ = respond_to.send(false);
                }
                RoomMessage::PublishChat { respond_to, .. } => {
                    let _ = respond_to.send(None);
                }
                RoomMessage::CloseIfEmpty { respond_to } => {
                    let _ = respond_to.send(true);
                }
                RoomMessage::GetState { respond_to } => {
                    let _ = respond_to.send(self.get_state());
                }
                RoomMessage::ConnectionClosed { .. }
                | RoomMessage::PublishHandRaise { .. }
                | RoomMessage::AnnounceBroadcast { .. }
                | RoomMessage::RequestStream { .. }
                | RoomMessage::RelayPeerPayload { .. } => {}
            }
        }

        debug!(
            target: "lc.actor.room",
            room_id = %self.room_id,
            "Room closed"
        );
    }
}
