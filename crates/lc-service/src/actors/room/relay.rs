//! Chat and hand-raise relay, and the fan-out helpers every room event uses.

use super::{Participant, RoomActor};
use crate::actors::connection::DeliveryError;
use crate::actors::metrics::ActorType;
use crate::observability;

use lc_protocol::{ChatDraft, ChatMessage, HandRaised, ServerEvent, UserId};
use std::sync::Arc;
use tracing::{debug, error, warn};

impl RoomActor {
    /// Assign the next sequence number and send the message to every member,
    /// the author included.
    ///
    /// Returns `None` without consuming a sequence number when the room is
    /// empty: a message nobody can receive leaves no trace.
    pub(super) fn handle_chat(&mut self, draft: ChatDraft) -> Option<u64> {
        if self.participants.is_empty() {
            observability::record_event_dropped("no_audience");
            return None;
        }

        let id = self.next_message_id;
        self.next_message_id += 1;

        let author = self
            .participants
            .iter()
            .find(|p| *p.user_id() == draft.user_id);
        let (user_name, user_avatar) = match author {
            Some(p) => (p.profile.name.clone(), p.profile.avatar.clone()),
            None => (
                draft
                    .user_name
                    .unwrap_or_else(|| draft.user_id.to_string()),
                draft.user_avatar,
            ),
        };

        debug!(
            target: "lc.actor.room",
            room_id = %self.room_id,
            message_id = id,
            content_len = draft.content.len(),
            "Relaying chat message"
        );

        let message = ChatMessage {
            id,
            client_message_id: draft.id,
            user_id: draft.user_id,
            user_name,
            user_avatar,
            content: draft.content,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        self.broadcast(&ServerEvent::NewMessage(message), None);

        Some(id)
    }

    /// Record a member's hand state and tell the whole room.
    pub(super) fn handle_hand_raise(&mut self, user_id: UserId, raised: bool) {
        if self.participants.is_empty() {
            observability::record_event_dropped("no_audience");
            return;
        }

        if let Some(participant) = self
            .participants
            .iter_mut()
            .find(|p| *p.user_id() == user_id)
        {
            participant.hand_raised = raised;
        }

        debug!(
            target: "lc.actor.room",
            room_id = %self.room_id,
            user_id = %user_id,
            raised = raised,
            "Hand state changed"
        );

        self.broadcast(
            &ServerEvent::StudentRaisedHand(HandRaised { user_id, raised }),
            None,
        );
    }

    /// Encode `event` once and queue it for every member except `except`.
    pub(super) fn broadcast(&self, event: &ServerEvent, except: Option<&UserId>) {
        let Some(frame) = self.encode(event) else {
            return;
        };

        for participant in &self.participants {
            if Some(participant.user_id()) != except {
                self.deliver(participant, Arc::clone(&frame));
            }
        }
    }

    /// Encode `event` and queue it for one member.
    pub(super) fn send_to(&self, participant: &Participant, event: &ServerEvent) {
        if let Some(frame) = self.encode(event) {
            self.deliver(participant, frame);
        }
    }

    fn encode(&self, event: &ServerEvent) -> Option<Arc<str>> {
        match event.to_frame() {
            Ok(text) => Some(Arc::from(text)),
            Err(e) => {
                error!(
                    target: "lc.actor.room",
                    room_id = %self.room_id,
                    event = event.name(),
                    error = %e,
                    "Failed to encode server event"
                );
                observability::record_event_dropped("internal");
                None
            }
        }
    }

    /// Queue a frame without waiting.
    ///
    /// A participant whose mailbox is full is disconnected: its client will
    /// reconnect and receive a fresh roster, which is cheaper than stalling
    /// the whole room behind one slow reader.
    fn deliver(&self, participant: &Participant, frame: Arc<str>) {
        if participant.connection.is_cancelled() {
            return;
        }

        match participant.connection.try_deliver(frame) {
            Ok(()) => {}
            Err(DeliveryError::MailboxFull) => {
                self.metrics.record_message_dropped(ActorType::Connection);
                warn!(
                    target: "lc.actor.room",
                    room_id = %self.room_id,
                    user_id = %participant.user_id(),
                    connection_id = %participant.connection_id(),
                    "Connection mailbox full, disconnecting slow consumer"
                );
                participant.connection.cancel();
            }
            Err(DeliveryError::Closed) => {
                // The transport has gone; its ConnectionClosed is on the way.
                debug!(
                    target: "lc.actor.room",
                    room_id = %self.room_id,
                    connection_id = %participant.connection_id(),
                    "Connection already closed"
                );
            }
        }
    }
}
