//! `RoomControllerActor` - singleton supervisor for room actors.
//!
//! The `RoomControllerActor` is the top-level actor in the hierarchy:
//!
//! - Singleton per process
//! - Owns the room map: `get_or_create` runs inside its mailbox, so
//!   concurrent first joins for one room produce exactly one `RoomActor`
//! - Bounds the number of live rooms
//! - Owns the root `CancellationToken` for graceful shutdown
//! - Monitors child actor health (panic detection via `JoinHandle`)
//!
//! Rooms reclaim themselves once empty past the grace period. The controller
//! notices the finished task and forgets the room; a handle that closed
//! before the task was reaped is replaced on the next `get_or_create`.
//!
//! # Graceful Shutdown
//!
//! On SIGTERM, the controller:
//! 1. Sets `accepting_new = false`
//! 2. Cancels the root `CancellationToken` (propagates to all children)
//! 3. Waits for room actors to stop, bounded by the shutdown deadline

use crate::errors::LcError;
use crate::observability;

use super::messages::{ControllerMessage, ControllerStatus};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::room::{RoomActor, RoomActorHandle, RoomSettings};

use lc_protocol::RoomId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the controller mailbox.
const CONTROLLER_CHANNEL_BUFFER: usize = 1000;

/// How often finished rooms are swept when the mailbox is idle.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// How long a removed room may take to stop before we stop waiting.
const ROOM_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Shutdown deadline used when the root token is cancelled directly.
const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Handle to the `RoomControllerActor`.
///
/// This is the public interface for interacting with the controller.
/// All methods are async and return results via oneshot channels.
#[derive(Clone, Debug)]
pub struct RoomControllerActorHandle {
    sender: mpsc::Sender<ControllerMessage>,
    cancel_token: CancellationToken,
}

impl RoomControllerActorHandle {
    /// Create a new `RoomControllerActor` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately.
    ///
    /// # Arguments
    ///
    /// * `instance_id` - Instance ID, used in logs
    /// * `metrics` - Shared actor metrics
    /// * `settings` - Limits applied to every room
    /// * `max_rooms` - Bound on concurrently live rooms
    #[must_use]
    pub fn new(
        instance_id: String,
        metrics: Arc<ActorMetrics>,
        settings: RoomSettings,
        max_rooms: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(CONTROLLER_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RoomControllerActor::new(
            instance_id,
            receiver,
            cancel_token.clone(),
            metrics,
            settings,
            max_rooms,
        );

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Return the live room for `room_id`, creating it if absent.
    pub async fn get_or_create_room(&self, room_id: RoomId) -> Result<RoomActorHandle, LcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(ControllerMessage::GetOrCreateRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| LcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| LcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Return the live room for `room_id`, if there is one.
    pub async fn get_room(&self, room_id: RoomId) -> Result<Option<RoomActorHandle>, LcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(ControllerMessage::GetRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| LcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| LcError::Internal(format!("response receive failed: {e}")))
    }

    /// Close and forget the room if it has no participants.
    ///
    /// Immediate counterpart of a room's own grace-period reclamation: the
    /// room store's `removeIfEmpty` operation, for callers that want an
    /// empty room gone now rather than after the grace period. The service
    /// itself relies on the rooms' deadlines.
    ///
    /// Returns `true` if the room is gone afterwards.
    pub async fn remove_if_empty(&self, room_id: RoomId) -> Result<bool, LcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(ControllerMessage::RemoveIfEmpty {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| LcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| LcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get the current controller status.
    pub async fn get_status(&self) -> Result<ControllerStatus, LcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(ControllerMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| LcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| LcError::Internal(format!("response receive failed: {e}")))
    }

    /// Initiate graceful shutdown.
    ///
    /// Returns once the controller has stopped accepting rooms; the actor
    /// then waits up to `deadline` for its rooms to stop.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), LcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(ControllerMessage::Shutdown {
                deadline,
                respond_to: tx,
            })
            .await
            .map_err(|e| LcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| LcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for spawning child actors.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// Internal state for a managed room.
struct ManagedRoom {
    handle: RoomActorHandle,
    task_handle: JoinHandle<()>,
}

impl ManagedRoom {
    /// Whether the room still accepts messages.
    fn is_live(&self) -> bool {
        !self.handle.is_closed() && !self.task_handle.is_finished()
    }
}

/// The `RoomControllerActor` implementation.
pub struct RoomControllerActor {
    instance_id: String,
    receiver: mpsc::Receiver<ControllerMessage>,
    /// Cancellation token (root).
    cancel_token: CancellationToken,
    rooms: HashMap<RoomId, ManagedRoom>,
    /// Whether the controller is accepting new rooms.
    accepting_new: bool,
    shutdown_deadline: Duration,
    settings: RoomSettings,
    max_rooms: usize,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl RoomControllerActor {
    fn new(
        instance_id: String,
        receiver: mpsc::Receiver<ControllerMessage>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
        settings: RoomSettings,
        max_rooms: usize,
    ) -> Self {
        let mailbox = MailboxMonitor::new(ActorType::Controller, &instance_id);

        Self {
            instance_id,
            receiver,
            cancel_token,
            rooms: HashMap::new(),
            accepting_new: true,
            shutdown_deadline: DEFAULT_SHUTDOWN_DEADLINE,
            settings,
            max_rooms,
            metrics,
            mailbox,
        }
    }

    /// Run the actor message loop.
    #[instrument(
        skip_all,
        name = "lc.actor.controller",
        fields(instance_id = %self.instance_id)
    )]
    async fn run(mut self) {
        info!(
            target: "lc.actor.controller",
            instance_id = %self.instance_id,
            max_rooms = self.max_rooms,
            "RoomControllerActor started"
        );

        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            self.check_room_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "lc.actor.controller",
                        instance_id = %self.instance_id,
                        "RoomControllerActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                _ = sweep.tick() => {
                    observability::set_actor_mailbox_depth(
                        ActorType::Controller.as_str(),
                        self.receiver.len(),
                    );
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_received(self.receiver.len());
                            self.handle_message(message).await;
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "lc.actor.controller",
                                instance_id = %self.instance_id,
                                "RoomControllerActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "lc.actor.controller",
            instance_id = %self.instance_id,
            rooms_remaining = self.rooms.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomControllerActor stopped"
        );
    }

    async fn handle_message(&mut self, message: ControllerMessage) {
        match message {
            ControllerMessage::GetOrCreateRoom {
                room_id,
                respond_to,
            } => {
                let result = self.get_or_create_room(room_id);
                let _ = respond_to.send(result);
            }

            ControllerMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let room = self
                    .rooms
                    .get(&room_id)
                    .filter(|managed| managed.is_live())
                    .map(|managed| managed.handle.clone());
                let _ = respond_to.send(room);
            }

            ControllerMessage::RemoveIfEmpty {
                room_id,
                respond_to,
            } => {
                let result = self.remove_if_empty(&room_id).await;
                let _ = respond_to.send(result);
            }

            ControllerMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            ControllerMessage::Shutdown {
                deadline,
                respond_to,
            } => {
                let result = self.initiate_shutdown(deadline);
                let _ = respond_to.send(result);
            }
        }
    }

    fn get_or_create_room(&mut self, room_id: RoomId) -> Result<RoomActorHandle, LcError> {
        if !self.accepting_new {
            return Err(LcError::Draining);
        }

        if let Some(managed) = self.rooms.get(&room_id) {
            if managed.is_live() {
                return Ok(managed.handle.clone());
            }
        }

        // A room that reclaimed itself but has not been reaped yet.
        if let Some(stale) = self.rooms.remove(&room_id) {
            debug!(
                target: "lc.actor.controller",
                instance_id = %self.instance_id,
                room_id = %room_id,
                "Replacing closed room"
            );
            self.forget_room(&room_id, stale);
        }

        if self.rooms.len() >= self.max_rooms {
            warn!(
                target: "lc.actor.controller",
                instance_id = %self.instance_id,
                max_rooms = self.max_rooms,
                "Room limit reached, refusing new room"
            );
            return Err(LcError::ServiceCapacityExceeded);
        }

        let (handle, task_handle) = RoomActor::spawn(
            room_id.clone(),
            self.cancel_token.child_token(),
            self.settings,
            Arc::clone(&self.metrics),
        );

        self.rooms.insert(
            room_id.clone(),
            ManagedRoom {
                handle: handle.clone(),
                task_handle,
            },
        );
        self.metrics.room_created();

        info!(
            target: "lc.actor.controller",
            instance_id = %self.instance_id,
            room_id = %room_id,
            total_rooms = self.rooms.len(),
            "Room actor created"
        );

        Ok(handle)
    }

    /// Ask the room to close if empty; forget it if it did.
    async fn remove_if_empty(&mut self, room_id: &RoomId) -> Result<bool, LcError> {
        let Some(managed) = self.rooms.get(room_id) else {
            return Ok(true);
        };

        if !managed.handle.close_if_empty().await? {
            return Ok(false);
        }

        if let Some(managed) = self.rooms.remove(room_id) {
            self.forget_room(room_id, managed);
            info!(
                target: "lc.actor.controller",
                instance_id = %self.instance_id,
                room_id = %room_id,
                total_rooms = self.rooms.len(),
                "Empty room removed"
            );
        }

        Ok(true)
    }

    /// Stop tracking a room whose actor is stopping or stopped.
    ///
    /// Does not block the message loop: the task is awaited in the
    /// background.
    fn forget_room(&self, room_id: &RoomId, managed: ManagedRoom) {
        self.metrics.room_removed();

        let room_id = room_id.clone();
        let instance_id = self.instance_id.clone();
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            match tokio::time::timeout(ROOM_STOP_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "lc.actor.controller",
                        instance_id = %instance_id,
                        room_id = %room_id,
                        "Room actor task completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    if e.is_panic() {
                        metrics.record_panic(ActorType::Room);
                    }
                    warn!(
                        target: "lc.actor.controller",
                        instance_id = %instance_id,
                        room_id = %room_id,
                        error = ?e,
                        "Room actor task failed during removal"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "lc.actor.controller",
                        instance_id = %instance_id,
                        room_id = %room_id,
                        "Room actor task cleanup timed out"
                    );
                    managed.handle.cancel();
                }
            }
        });
    }

    fn get_status(&self) -> ControllerStatus {
        ControllerStatus {
            room_count: self.rooms.len(),
            connection_count: self.metrics.connection_count(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.receiver.len(),
        }
    }

    fn initiate_shutdown(&mut self, deadline: Duration) -> Result<(), LcError> {
        info!(
            target: "lc.actor.controller",
            instance_id = %self.instance_id,
            room_count = self.rooms.len(),
            deadline_ms = deadline.as_millis(),
            "Initiating graceful shutdown"
        );

        self.accepting_new = false;
        self.shutdown_deadline = deadline;

        // Propagates to every room and connection.
        self.cancel_token.cancel();

        Ok(())
    }

    async fn graceful_shutdown(&mut self) {
        info!(
            target: "lc.actor.controller",
            instance_id = %self.instance_id,
            room_count = self.rooms.len(),
            "Performing graceful shutdown"
        );

        self.accepting_new = false;

        for managed in self.rooms.values() {
            managed.handle.cancel();
        }

        let deadline = tokio::time::Instant::now() + self.shutdown_deadline;
        for (room_id, managed) in self.rooms.drain() {
            match tokio::time::timeout_at(deadline, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "lc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        "Room actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "lc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        error = ?e,
                        "Room actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "lc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        "Room actor shutdown timed out"
                    );
                }
            }
            self.metrics.room_removed();
        }

        info!(
            target: "lc.actor.controller",
            instance_id = %self.instance_id,
            "Graceful shutdown complete"
        );
    }

    /// Reap room actors whose task has finished.
    async fn check_room_health(&mut self) {
        let finished: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(room_id, _)| room_id.clone())
            .collect();

        for room_id in finished {
            let Some(managed) = self.rooms.remove(&room_id) else {
                continue;
            };

            match managed.task_handle.await {
                Ok(()) => {
                    debug!(
                        target: "lc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        "Room actor exited, forgetting room"
                    );
                }
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!(
                            target: "lc.actor.controller",
                            instance_id = %self.instance_id,
                            room_id = %room_id,
                            error = ?join_error,
                            "Room actor panicked"
                        );
                        self.metrics.record_panic(ActorType::Room);
                    }
                }
            }

            self.metrics.room_removed();
        }
    }
}
