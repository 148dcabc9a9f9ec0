//! Connection registry.
//!
//! Tracks every live connection, the user bound to it and the room it is
//! currently in. A connection is in at most one room.
//!
//! The registry is shared by all connection tasks behind a `RwLock`; no
//! lock is held across an await on anything other than the lock itself.

use crate::actors::{ConnectionActorHandle, ConnectionId, RoomActorHandle};

use lc_protocol::{RoomId, UserId};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

struct RegisteredConnection {
    handle: ConnectionActorHandle,
    user_id: Option<UserId>,
    room: Option<RoomActorHandle>,
    /// Milliseconds since the Unix epoch.
    connected_at: i64,
}

/// What a connection was bound to when it was unregistered.
#[derive(Debug)]
pub struct Unregistered {
    pub user_id: Option<UserId>,
    /// The room to notify, if the connection was in one.
    pub room: Option<RoomActorHandle>,
    pub connected_at: i64,
}

/// Registry of live connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, RegisteredConnection>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened connection.
    pub async fn register(&self, handle: ConnectionActorHandle) {
        let connection_id = handle.connection_id();
        let mut connections = self.connections.write().await;
        connections.insert(
            connection_id,
            RegisteredConnection {
                handle,
                user_id: None,
                room: None,
                connected_at: chrono::Utc::now().timestamp_millis(),
            },
        );

        debug!(
            target: "lc.registry",
            connection_id = %connection_id,
            total_connections = connections.len(),
            "Connection registered"
        );
    }

    /// Bind `user_id` to the connection. A later bind replaces the earlier.
    pub async fn bind_user(&self, connection_id: ConnectionId, user_id: UserId) {
        if let Some(entry) = self.connections.write().await.get_mut(&connection_id) {
            entry.user_id = Some(user_id);
        }
    }

    /// Record the room the connection is now in.
    ///
    /// Returns the room it was in before, if any.
    pub async fn set_room(
        &self,
        connection_id: ConnectionId,
        room: RoomActorHandle,
    ) -> Option<RoomActorHandle> {
        self.connections
            .write()
            .await
            .get_mut(&connection_id)
            .and_then(|entry| entry.room.replace(room))
    }

    /// Forget the connection's room if it is still `room_id`.
    ///
    /// Returns whether the room was cleared.
    pub async fn clear_room(&self, connection_id: ConnectionId, room_id: &RoomId) -> bool {
        let mut connections = self.connections.write().await;
        let Some(entry) = connections.get_mut(&connection_id) else {
            return false;
        };

        if entry
            .room
            .as_ref()
            .is_some_and(|room| room.room_id() == room_id)
        {
            entry.room = None;
            true
        } else {
            false
        }
    }

    /// The room the connection is currently in.
    pub async fn current_room(&self, connection_id: ConnectionId) -> Option<RoomActorHandle> {
        self.connections
            .read()
            .await
            .get(&connection_id)
            .and_then(|entry| entry.room.clone())
    }

    /// The user bound to the connection.
    pub async fn user_of(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.connections
            .read()
            .await
            .get(&connection_id)
            .and_then(|entry| entry.user_id.clone())
    }

    /// The outbound handle for the connection.
    pub async fn handle_of(&self, connection_id: ConnectionId) -> Option<ConnectionActorHandle> {
        self.connections
            .read()
            .await
            .get(&connection_id)
            .map(|entry| entry.handle.clone())
    }

    /// Remove the connection. Unregistering an unknown connection is a no-op.
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<Unregistered> {
        let mut connections = self.connections.write().await;
        let entry = connections.remove(&connection_id)?;

        debug!(
            target: "lc.registry",
            connection_id = %connection_id,
            total_connections = connections.len(),
            "Connection unregistered"
        );

        Some(Unregistered {
            user_id: entry.user_id,
            room: entry.room,
            connected_at: entry.connected_at,
        })
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
