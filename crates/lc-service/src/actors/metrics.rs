//! Actor bookkeeping: live counts, drops and mailbox depth.
//!
//! Every actor reports its backlog to [`MailboxMonitor::record_received`]
//! as it takes each message. A room or the controller backing
//! up past a few hundred queued messages means fan-out is outpacing the
//! actor; a connection backing up means its client is slow.
//!
//! Counters kept here back the `lc_` gauges in [`crate::observability`].

use crate::observability;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Actor kinds, used as the `actor_type` metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    Controller,
    Room,
    Connection,
}

impl ActorType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Controller => "controller",
            ActorType::Room => "room",
            ActorType::Connection => "connection",
        }
    }

    /// Depths above which the mailbox is elevated and critical.
    #[must_use]
    pub const fn limits(&self) -> MailboxLimits {
        match self {
            ActorType::Controller | ActorType::Room => MailboxLimits {
                elevated: 100,
                critical: 500,
            },
            ActorType::Connection => MailboxLimits {
                elevated: 50,
                critical: 200,
            },
        }
    }
}

/// Mailbox depth limits for one actor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxLimits {
    pub elevated: usize,
    pub critical: usize,
}

impl MailboxLimits {
    #[must_use]
    pub const fn level(&self, depth: usize) -> MailboxLevel {
        if depth > self.critical {
            MailboxLevel::Critical
        } else if depth > self.elevated {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Depth tracking for a single actor's mailbox.
///
/// Depth is the number of messages still queued behind the one being
/// handled, sampled from the receiver each time a message is taken.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    /// Room id, connection id or instance id.
    owner: String,
    depth: AtomicUsize,
    processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_type: ActorType, owner: impl Into<String>) -> Self {
        Self {
            actor_type,
            owner: owner.into(),
            depth: AtomicUsize::new(0),
            processed: AtomicU64::new(0),
        }
    }

    /// A message was taken from the mailbox with `queued` still waiting.
    pub fn record_received(&self, queued: usize) {
        let previous = self.depth.swap(queued, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);

        let limits = self.actor_type.limits();
        let was = limits.level(previous);
        match limits.level(queued) {
            MailboxLevel::Critical => warn!(
                target: "lc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                owner = %self.owner,
                depth = queued,
                "Mailbox backing up"
            ),
            // Log the crossing once, not every message above it.
            MailboxLevel::Warning if was == MailboxLevel::Normal => debug!(
                target: "lc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                owner = %self.owner,
                depth = queued,
                "Mailbox depth elevated"
            ),
            _ => {}
        }
    }

    /// Depth at the last sample.
    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn level(&self) -> MailboxLevel {
        self.actor_type.limits().level(self.current_depth())
    }
}

/// Process-wide actor counters, shared by the controller, every room and
/// the transport.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    rooms: AtomicUsize,
    connections: AtomicUsize,
    panics: AtomicU64,
    dropped: AtomicU64,
    processed: AtomicU64,
}

/// Step a live count up or down and return the new value.
fn adjust(count: &AtomicUsize, grow: bool) -> usize {
    if grow {
        count.fetch_add(1, Ordering::Relaxed) + 1
    } else {
        count.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }
}

impl ActorMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn room_created(&self) {
        observability::set_rooms_active(adjust(&self.rooms, true));
    }

    pub fn room_removed(&self) {
        observability::set_rooms_active(adjust(&self.rooms, false));
    }

    pub fn connection_opened(&self) {
        observability::set_connections_active(adjust(&self.connections, true));
    }

    pub fn connection_closed(&self) {
        observability::set_connections_active(adjust(&self.connections, false));
    }

    /// An actor task ended in a panic. Always a bug.
    pub fn record_panic(&self, actor_type: ActorType) {
        let total = self.panics.fetch_add(1, Ordering::Relaxed) + 1;
        observability::record_actor_panic(actor_type.as_str());
        error!(
            target: "lc.actor.panic",
            actor_type = actor_type.as_str(),
            total,
            "Actor task panicked"
        );
    }

    /// A frame was dropped because the target mailbox was full.
    pub fn record_message_dropped(&self, actor_type: ActorType) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        observability::record_message_dropped(actor_type.as_str());
    }

    pub fn record_message_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn panic_count(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
