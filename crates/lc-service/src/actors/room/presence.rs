//! Presence: who is in the room, on which connection.

use super::{Participant, RoomActor};
use crate::actors::connection::ConnectionActorHandle;
use crate::actors::messages::{ConnectionId, JoinOutcome};
use crate::errors::LcError;

use lc_protocol::{ParticipantView, RosterSnapshot, ServerEvent, UserId, UserProfile};
use tokio::time::Instant;
use tracing::{debug, info};

impl RoomActor {
    /// Add a participant, or re-bind an existing one to a new connection.
    ///
    /// A connection carries at most one participant: anyone else bound to
    /// the same connection is removed first. A re-join keeps the original
    /// join time and hand state but takes the new profile.
    pub(super) fn handle_join(
        &mut self,
        connection: ConnectionActorHandle,
        profile: UserProfile,
    ) -> Result<JoinOutcome, LcError> {
        let connection_id = connection.connection_id();
        let existing = self
            .participants
            .iter()
            .position(|p| *p.user_id() == profile.id);
        let displaced = self
            .participants
            .iter()
            .filter(|p| p.connection_id() == connection_id && *p.user_id() != profile.id)
            .count();

        if existing.is_none()
            && self.participants.len() - displaced >= self.settings.max_participants
        {
            info!(
                target: "lc.actor.room",
                room_id = %self.room_id,
                max_participants = self.settings.max_participants,
                "Join refused, room at capacity"
            );
            return Err(LcError::RoomCapacityExceeded(self.room_id.to_string()));
        }

        if displaced > 0 {
            self.participants
                .retain(|p| p.connection_id() != connection_id || *p.user_id() == profile.id);
            self.clear_absent_broadcaster();
        }

        let user_id = profile.id.clone();
        let position = self
            .participants
            .iter()
            .position(|p| *p.user_id() == user_id);
        let rebound = if let Some(participant) =
            position.and_then(|index| self.participants.get_mut(index))
        {
            participant.profile = profile;
            participant.connection = connection;
            true
        } else {
            self.participants.push(Participant {
                profile,
                hand_raised: false,
                joined_at: chrono::Utc::now().timestamp_millis(),
                connection,
            });
            false
        };

        self.empty_deadline = None;

        info!(
            target: "lc.actor.room",
            room_id = %self.room_id,
            user_id = %user_id,
            connection_id = %connection_id,
            rebound = rebound,
            total_participants = self.participants.len(),
            "Participant joined"
        );

        self.broadcast_roster();

        Ok(JoinOutcome {
            participant_count: self.participants.len(),
            rebound,
        })
    }

    /// Remove `user_id` if it is bound to `connection_id`.
    ///
    /// A leave from a connection the user no longer uses is ignored so a
    /// late message from an old tab cannot evict the live session.
    pub(super) fn handle_leave(&mut self, connection_id: ConnectionId, user_id: &UserId) -> bool {
        let Some(index) = self
            .participants
            .iter()
            .position(|p| p.user_id() == user_id)
        else {
            return false;
        };

        if self
            .participants
            .get(index)
            .is_some_and(|p| p.connection_id() != connection_id)
        {
            debug!(
                target: "lc.actor.room",
                room_id = %self.room_id,
                user_id = %user_id,
                "Ignoring leave from a superseded connection"
            );
            return false;
        }

        self.participants.remove(index);
        info!(
            target: "lc.actor.room",
            room_id = %self.room_id,
            user_id = %user_id,
            remaining_participants = self.participants.len(),
            "Participant left"
        );
        self.after_departure();
        true
    }

    /// Remove whoever is bound to a closed connection.
    pub(super) fn handle_connection_closed(&mut self, connection_id: ConnectionId) {
        let before = self.participants.len();
        self.participants
            .retain(|p| p.connection_id() != connection_id);

        if self.participants.len() == before {
            return;
        }

        info!(
            target: "lc.actor.room",
            room_id = %self.room_id,
            connection_id = %connection_id,
            remaining_participants = self.participants.len(),
            "Participant disconnected"
        );
        self.after_departure();
    }

    /// Roster snapshot in join order.
    pub(super) fn roster(&self) -> RosterSnapshot {
        RosterSnapshot {
            participants: self
                .participants
                .iter()
                .map(|p| ParticipantView {
                    user_id: p.profile.id.clone(),
                    name: p.profile.name.clone(),
                    avatar: p.profile.avatar.clone(),
                    role: p.profile.role,
                    hand_raised: p.hand_raised,
                    joined_at: p.joined_at,
                })
                .collect(),
        }
    }

    fn broadcast_roster(&self) {
        self.broadcast(&ServerEvent::ParticipantsUpdated(self.roster()), None);
    }

    fn after_departure(&mut self) {
        self.clear_absent_broadcaster();
        self.broadcast_roster();

        if self.participants.is_empty() {
            self.empty_deadline = Some(Instant::now() + self.settings.grace_period);
            debug!(
                target: "lc.actor.room",
                room_id = %self.room_id,
                grace_period_ms = self.settings.grace_period.as_millis(),
                "Room empty, grace period started"
            );
        }
    }

    /// A broadcaster who has left is no longer streaming.
    fn clear_absent_broadcaster(&mut self) {
        if self
            .broadcaster
            .as_ref()
            .is_some_and(|b| !self.is_member(b))
        {
            self.broadcaster = None;
        }
    }

    pub(super) fn is_member(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| p.user_id() == user_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::super::test_support::*;
    use super::super::RoomSettings;
    use crate::errors::LcError;
    use lc_protocol::{ServerEvent, UserId};
    use std::time::Duration;

    #[tokio::test]
    async fn test_join_broadcasts_roster_to_everyone() {
        let (room, _task) = spawn_room(settings());
        let mut teacher = TestConnection::open();
        let mut alice = TestConnection::open();

        room.join(teacher.handle.clone(), instructor("t-1"))
            .await
            .unwrap();
        assert_eq!(teacher.next_roster().await, vec!["t-1"]);

        let outcome = room.join(alice.handle.clone(), student("s-1")).await.unwrap();
        assert_eq!(outcome.participant_count, 2);
        assert!(!outcome.rebound);

        assert_eq!(teacher.next_roster().await, vec!["t-1", "s-1"]);
        assert_eq!(alice.next_roster().await, vec!["t-1", "s-1"]);
    }

    #[tokio::test]
    async fn test_roster_carries_profile_fields() {
        let (room, _task) = spawn_room(settings());
        let mut conn = TestConnection::open();

        room.join(
            conn.handle.clone(),
            instructor("t-1").with_avatar("/avatars/t-1.png"),
        )
        .await
        .unwrap();

        let ServerEvent::ParticipantsUpdated(roster) = conn.next_event().await else {
            panic!("expected roster");
        };
        let view = &roster.participants[0];
        assert_eq!(view.name, "Instructor t-1");
        assert_eq!(view.avatar.as_deref(), Some("/avatars/t-1.png"));
        assert_eq!(view.role, lc_protocol::Role::Instructor);
        assert!(!view.hand_raised);
        assert!(view.joined_at > 0);
    }

    #[tokio::test]
    async fn test_rejoin_on_new_connection_rebinds_in_place() {
        let (room, _task) = spawn_room(settings());
        let mut first = TestConnection::open();
        let mut other = TestConnection::open();
        let mut second = TestConnection::open();

        room.join(first.handle.clone(), student("s-1")).await.unwrap();
        room.join(other.handle.clone(), student("s-2")).await.unwrap();
        first.next_roster().await;
        first.next_roster().await;

        let before = room.get_state().await.unwrap();

        let outcome = room.join(second.handle.clone(), student("s-1")).await.unwrap();
        assert!(outcome.rebound);
        assert_eq!(outcome.participant_count, 2);
        assert_eq!(second.next_roster().await, vec!["s-1", "s-2"]);

        let after = room.get_state().await.unwrap();
        assert_eq!(after.participants[0].connection_id, second.id());
        assert_eq!(
            after.participants[0].joined_at,
            before.participants[0].joined_at
        );

        // The superseded connection no longer receives room events.
        other.next_roster().await;
        other.next_roster().await;
        first.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_stale_leave_is_ignored() {
        let (room, _task) = spawn_room(settings());
        let old = TestConnection::open();
        let new = TestConnection::open();

        room.join(old.handle.clone(), student("s-1")).await.unwrap();
        room.join(new.handle.clone(), student("s-1")).await.unwrap();

        assert!(!room.leave(old.id(), UserId::from("s-1")).await.unwrap());
        assert_eq!(room.get_state().await.unwrap().participants.len(), 1);

        assert!(room.leave(new.id(), UserId::from("s-1")).await.unwrap());
        assert!(room.get_state().await.unwrap().participants.is_empty());
    }

    #[tokio::test]
    async fn test_leave_of_unknown_user_is_noop() {
        let (room, _task) = spawn_room(settings());
        let conn = TestConnection::open();
        assert!(!room.leave(conn.id(), UserId::from("ghost")).await.unwrap());
    }

    #[tokio::test]
    async fn test_connection_switching_users_replaces_participant() {
        let (room, _task) = spawn_room(settings());
        let mut conn = TestConnection::open();

        room.join(conn.handle.clone(), student("s-1")).await.unwrap();
        room.join(conn.handle.clone(), student("s-2")).await.unwrap();

        assert_eq!(conn.next_roster().await, vec!["s-1"]);
        assert_eq!(conn.next_roster().await, vec!["s-2"]);
    }

    #[tokio::test]
    async fn test_disconnect_removes_participant_and_notifies() {
        let (room, _task) = spawn_room(settings());
        let mut teacher = TestConnection::open();
        let alice = TestConnection::open();

        room.join(teacher.handle.clone(), instructor("t-1"))
            .await
            .unwrap();
        room.join(alice.handle.clone(), student("s-1")).await.unwrap();
        teacher.next_roster().await;
        teacher.next_roster().await;

        room.connection_closed(alice.id()).await.unwrap();
        assert_eq!(teacher.next_roster().await, vec!["t-1"]);

        // A second close for the same connection changes nothing.
        room.connection_closed(alice.id()).await.unwrap();
        teacher.assert_quiet().await;
    }

    #[tokio::test]
    async fn test_capacity_refuses_new_users_only() {
        let (room, _task) = spawn_room(RoomSettings {
            grace_period: Duration::from_secs(10),
            max_participants: 2,
        });
        let a = TestConnection::open();
        let b = TestConnection::open();
        let c = TestConnection::open();
        let b2 = TestConnection::open();

        room.join(a.handle.clone(), student("a")).await.unwrap();
        room.join(b.handle.clone(), student("b")).await.unwrap();

        let result = room.join(c.handle.clone(), student("c")).await;
        assert!(matches!(result, Err(LcError::RoomCapacityExceeded(_))));

        // Re-binding an existing user is always allowed.
        assert!(room.join(b2.handle.clone(), student("b")).await.unwrap().rebound);
    }

    #[tokio::test]
    async fn test_departing_broadcaster_is_cleared() {
        let (room, _task) = spawn_room(settings());
        let teacher = TestConnection::open();

        room.join(teacher.handle.clone(), instructor("t-1"))
            .await
            .unwrap();
        room.announce_broadcast(UserId::from("t-1")).await.unwrap();
        assert_eq!(
            room.get_state().await.unwrap().broadcaster,
            Some(UserId::from("t-1"))
        );

        room.leave(teacher.id(), UserId::from("t-1")).await.unwrap();
        assert_eq!(room.get_state().await.unwrap().broadcaster, None);
    }
}
