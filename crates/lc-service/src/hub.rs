//! Event hub: routes decoded client events to rooms.
//!
//! The hub sits between the transport and the actors. It owns the
//! connection registry, resolves rooms through the controller and answers
//! client-visible failures with an `event-rejected` frame sent only to the
//! originating connection. Everything else that cannot be delivered is
//! dropped and counted.

use crate::actors::{
    ActorMetrics, ActorType, ConnectionActorHandle, ConnectionId, DeliveryError, JoinOutcome,
    RoomActorHandle, RoomControllerActorHandle,
};
use crate::errors::LcError;
use crate::observability;
use crate::registry::ConnectionRegistry;

use lc_protocol::{
    ClientEvent, EventRejected, JoinRoom, LeaveRoom, ProtocolError, RoomId, ServerEvent,
    UserProfile,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Routes client events for every connection.
pub struct EventHub {
    controller: RoomControllerActorHandle,
    registry: ConnectionRegistry,
    metrics: Arc<ActorMetrics>,
}

impl EventHub {
    #[must_use]
    pub fn new(controller: RoomControllerActorHandle, metrics: Arc<ActorMetrics>) -> Self {
        Self {
            controller,
            registry: ConnectionRegistry::new(),
            metrics,
        }
    }

    #[must_use]
    pub fn controller(&self) -> &RoomControllerActorHandle {
        &self.controller
    }

    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<ActorMetrics> {
        &self.metrics
    }

    /// Register a connection whose outbound actor is running.
    pub async fn open_connection(&self, handle: ConnectionActorHandle) {
        self.registry.register(handle).await;
    }

    /// Decode one inbound text frame and act on it.
    pub async fn handle_frame(&self, connection_id: ConnectionId, text: &str) {
        let started = Instant::now();

        let event = match ClientEvent::from_frame(text) {
            Ok(event) => event,
            Err(e) => {
                let event = e.event().map(str::to_string);
                self.reject(connection_id, event, &LcError::from(e)).await;
                return;
            }
        };

        let name = event.name();
        observability::record_event_received(name);

        if let Err(e) = self.handle_event(connection_id, event).await {
            self.reject(connection_id, Some(name.to_string()), &e).await;
        }

        observability::record_event_latency(name, started.elapsed());
    }

    /// Refuse a binary frame: every event travels as text.
    pub async fn reject_binary(&self, connection_id: ConnectionId) {
        let error = LcError::Protocol(ProtocolError::MalformedFrame(
            "binary frames are not supported".to_string(),
        ));
        self.reject(connection_id, None, &error).await;
    }

    /// Act on a decoded client event.
    ///
    /// # Errors
    ///
    /// Returns the error to report back to the client, if any. Events with
    /// no reachable room are dropped and return `Ok`.
    pub async fn handle_event(
        &self,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), LcError> {
        match event {
            ClientEvent::JoinRoom(join) => self.join(connection_id, join).await.map(|_| ()),

            ClientEvent::LeaveRoom(leave) => self.leave(connection_id, leave).await,

            ClientEvent::SendMessage(send) => {
                if let Some(room) = self.room_for(connection_id, &send.room_id).await? {
                    room.publish_chat(send.message).await?;
                }
                Ok(())
            }

            ClientEvent::RaiseHand(hand) => {
                if let Some(room) = self.room_for(connection_id, &hand.room_id).await? {
                    room.publish_hand_raise(hand.user_id, hand.raised).await?;
                }
                Ok(())
            }

            ClientEvent::BroadcastReady(intent) => {
                if let Some(room) = self.room_for(connection_id, &intent.room_id).await? {
                    room.announce_broadcast(intent.user_id).await?;
                }
                Ok(())
            }

            ClientEvent::RequestStream(intent) => {
                if let Some(room) = self.room_for(connection_id, &intent.room_id).await? {
                    room.request_stream(intent.user_id).await?;
                }
                Ok(())
            }

            ClientEvent::PeerSignal(signal) => {
                if let Some(room) = self.room_for(connection_id, &signal.room_id).await? {
                    room.relay_peer_payload(signal.from_user_id, signal.to_user_id, signal.payload)
                        .await?;
                }
                Ok(())
            }
        }
    }

    /// Forget a connection and remove whoever it carried from its room.
    ///
    /// Safe to call more than once.
    pub async fn close_connection(&self, connection_id: ConnectionId) {
        let Some(gone) = self.registry.unregister(connection_id).await else {
            return;
        };

        if let Some(room) = &gone.room {
            if let Err(e) = room.connection_closed(connection_id).await {
                debug!(
                    target: "lc.hub",
                    connection_id = %connection_id,
                    room_id = %room.room_id(),
                    error = %e,
                    "Room already closed"
                );
            }
        }

        info!(
            target: "lc.hub",
            connection_id = %connection_id,
            user_id = gone.user_id.as_ref().map(lc_protocol::UserId::as_str),
            room_id = gone.room.as_ref().map(|r| r.room_id().as_str()),
            "Connection closed"
        );
    }

    async fn join(
        &self,
        connection_id: ConnectionId,
        join: JoinRoom,
    ) -> Result<JoinOutcome, LcError> {
        let connection = self
            .registry
            .handle_of(connection_id)
            .await
            .ok_or_else(|| LcError::Internal("join from unregistered connection".to_string()))?;

        let user_id = join.user.id.clone();
        let (room, outcome) = match self
            .join_once(&join.room_id, connection.clone(), join.user.clone())
            .await
        {
            // The room reclaimed itself between lookup and join.
            Err(LcError::RoomClosed) => {
                debug!(
                    target: "lc.hub",
                    connection_id = %connection_id,
                    room_id = %join.room_id,
                    "Room closed during join, retrying"
                );
                self.join_once(&join.room_id, connection, join.user).await?
            }
            result => result?,
        };

        // A connection is in at most one room. The old room is only left
        // once the new one has accepted, so a refused join changes nothing.
        if let Some(previous) = self.registry.current_room(connection_id).await {
            if previous.room_id() != &join.room_id {
                self.depart(connection_id, &previous).await;
            }
        }

        self.registry.bind_user(connection_id, user_id.clone()).await;
        self.registry.set_room(connection_id, room).await;

        debug!(
            target: "lc.hub",
            connection_id = %connection_id,
            room_id = %join.room_id,
            user_id = %user_id,
            rebound = outcome.rebound,
            participants = outcome.participant_count,
            "Joined room"
        );

        Ok(outcome)
    }

    async fn join_once(
        &self,
        room_id: &RoomId,
        connection: ConnectionActorHandle,
        profile: UserProfile,
    ) -> Result<(RoomActorHandle, JoinOutcome), LcError> {
        let room = self.controller.get_or_create_room(room_id.clone()).await?;
        let outcome = room.join(connection, profile).await?;
        Ok((room, outcome))
    }

    async fn leave(&self, connection_id: ConnectionId, leave: LeaveRoom) -> Result<(), LcError> {
        let Some(room) = self.room_for(connection_id, &leave.room_id).await? else {
            return Ok(());
        };

        // A stale leave keeps the registry as it is: the connection's
        // disconnect is then a no-op in the room.
        if room.leave(connection_id, leave.user_id).await? {
            self.registry.clear_room(connection_id, &leave.room_id).await;
        }
        Ok(())
    }

    /// Leave `room` on behalf of whoever `connection_id` carries there.
    async fn depart(&self, connection_id: ConnectionId, room: &RoomActorHandle) {
        if let Err(e) = room.connection_closed(connection_id).await {
            debug!(
                target: "lc.hub",
                connection_id = %connection_id,
                room_id = %room.room_id(),
                error = %e,
                "Previous room already closed"
            );
        }
        self.registry.clear_room(connection_id, room.room_id()).await;
    }

    /// Resolve the room an event is addressed to, without creating it.
    async fn room_for(
        &self,
        connection_id: ConnectionId,
        room_id: &RoomId,
    ) -> Result<Option<RoomActorHandle>, LcError> {
        if let Some(room) = self.registry.current_room(connection_id).await {
            if room.room_id() == room_id && !room.is_closed() {
                return Ok(Some(room));
            }
        }

        let room = self.controller.get_room(room_id.clone()).await?;
        if room.is_none() {
            debug!(
                target: "lc.hub",
                connection_id = %connection_id,
                room_id = %room_id,
                "No such room, dropping event"
            );
            observability::record_event_dropped("no_room");
        }
        Ok(room)
    }

    /// Tell the originating connection its event was refused.
    async fn reject(&self, connection_id: ConnectionId, event: Option<String>, error: &LcError) {
        if !error.is_client_visible() {
            debug!(
                target: "lc.hub",
                connection_id = %connection_id,
                event = event.as_deref(),
                error = %error,
                "Event dropped"
            );
            observability::record_event_dropped(error.reason_label());
            return;
        }

        warn!(
            target: "lc.hub",
            connection_id = %connection_id,
            event = event.as_deref(),
            error = %error,
            "Event rejected"
        );
        observability::record_event_rejected(error.reason_label());

        let Some(connection) = self.registry.handle_of(connection_id).await else {
            return;
        };

        let rejection = ServerEvent::EventRejected(EventRejected {
            event,
            code: error.error_code(),
            reason: error.client_message(),
        });
        let frame = match rejection.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    target: "lc.hub",
                    connection_id = %connection_id,
                    error = %e,
                    "Failed to encode rejection"
                );
                return;
            }
        };

        if let Err(DeliveryError::MailboxFull) = connection.try_deliver(Arc::from(frame)) {
            self.metrics.record_message_dropped(ActorType::Connection);
            connection.cancel();
        }
    }
}
