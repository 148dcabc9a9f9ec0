//! Stream signaling: who is broadcasting, who wants the stream, and opaque
//! peer negotiation payloads between two members.
//!
//! Payloads are forwarded byte-for-byte and never inspected or logged.

use super::RoomActor;
use crate::observability;

use lc_protocol::{PeerSignalDelivery, ServerEvent, StreamReady, StreamRequest, UserId};
use serde_json::value::RawValue;
use tracing::debug;

impl RoomActor {
    /// Record `user_id` as the room's broadcaster and tell everyone else.
    ///
    /// The last announcement wins. Roles are not checked.
    pub(super) fn handle_announce(&mut self, user_id: UserId) {
        debug!(
            target: "lc.actor.room",
            room_id = %self.room_id,
            user_id = %user_id,
            "Broadcast ready"
        );

        self.broadcast(
            &ServerEvent::InstructorStreamReady(StreamReady {
                instructor_id: user_id.clone(),
            }),
            Some(&user_id),
        );
        self.broadcaster = Some(user_id);
    }

    /// Forward a stream request to the current broadcaster, if present.
    pub(super) fn handle_stream_request(&mut self, user_id: UserId) {
        let Some(target) = self
            .broadcaster
            .as_ref()
            .and_then(|b| self.participants.iter().find(|p| p.user_id() == b))
        else {
            debug!(
                target: "lc.actor.room",
                room_id = %self.room_id,
                user_id = %user_id,
                "Stream request with no broadcaster present, dropping"
            );
            observability::record_event_dropped("no_broadcaster");
            return;
        };

        self.send_to(
            target,
            &ServerEvent::StudentRequestStream(StreamRequest {
                student_id: user_id,
            }),
        );
    }

    /// Forward an opaque payload to `to`, if `to` is a member.
    pub(super) fn handle_peer_payload(&mut self, from: UserId, to: &UserId, payload: Box<RawValue>) {
        let Some(target) = self.participants.iter().find(|p| p.user_id() == to) else {
            debug!(
                target: "lc.actor.room",
                room_id = %self.room_id,
                from_user_id = %from,
                to_user_id = %to,
                "Peer payload recipient not in room, dropping"
            );
            observability::record_event_dropped("recipient_absent");
            return;
        };

        debug!(
            target: "lc.actor.room",
            room_id = %self.room_id,
            from_user_id = %from,
            to_user_id = %to,
            payload_len = payload.get().len(),
            "Relaying peer payload"
        );

        self.send_to(
            target,
            &ServerEvent::PeerSignal(PeerSignalDelivery {
                from_user_id: from,
                payload,
            }),
        );
    }
}
