//! Per-category delivery of server events.

use lc_protocol::{
    ChatMessage, EventRejected, HandRaised, PeerSignalDelivery, RosterSnapshot, ServerEvent,
    StreamReady, StreamRequest,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Buffer size of each event category channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Server events, one receiver per category.
///
/// Drain only what you need. A category nobody drains fills up and then
/// drops new events of that category; the others are unaffected. Every
/// receiver yields `None` once the session ends.
#[derive(Debug)]
pub struct ClientEvents {
    /// `participants-updated`
    pub roster: mpsc::Receiver<RosterSnapshot>,
    /// `new-message`
    pub chat: mpsc::Receiver<ChatMessage>,
    /// `student-raised-hand`
    pub hands: mpsc::Receiver<HandRaised>,
    /// `instructor-stream-ready`
    pub streams: mpsc::Receiver<StreamReady>,
    /// `student-request-stream`
    pub stream_requests: mpsc::Receiver<StreamRequest>,
    /// `peer-signal`
    pub signals: mpsc::Receiver<PeerSignalDelivery>,
    /// `event-rejected`
    pub rejections: mpsc::Receiver<EventRejected>,
}

/// Sending halves of [`ClientEvents`], owned by the reader task.
pub(crate) struct EventRouter {
    roster: mpsc::Sender<RosterSnapshot>,
    chat: mpsc::Sender<ChatMessage>,
    hands: mpsc::Sender<HandRaised>,
    streams: mpsc::Sender<StreamReady>,
    stream_requests: mpsc::Sender<StreamRequest>,
    signals: mpsc::Sender<PeerSignalDelivery>,
    rejections: mpsc::Sender<EventRejected>,
}

impl EventRouter {
    pub(crate) fn channel() -> (Self, ClientEvents) {
        let (roster_tx, roster) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (chat_tx, chat) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (hands_tx, hands) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (streams_tx, streams) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (requests_tx, stream_requests) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (signals_tx, signals) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (rejections_tx, rejections) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        (
            Self {
                roster: roster_tx,
                chat: chat_tx,
                hands: hands_tx,
                streams: streams_tx,
                stream_requests: requests_tx,
                signals: signals_tx,
                rejections: rejections_tx,
            },
            ClientEvents {
                roster,
                chat,
                hands,
                streams,
                stream_requests,
                signals,
                rejections,
            },
        )
    }

    /// Hand `event` to its category without waiting.
    pub(crate) fn route(&self, event: ServerEvent) {
        let name = event.name();
        let result = match event {
            ServerEvent::ParticipantsUpdated(e) => forward(&self.roster, e),
            ServerEvent::NewMessage(e) => forward(&self.chat, e),
            ServerEvent::StudentRaisedHand(e) => forward(&self.hands, e),
            ServerEvent::InstructorStreamReady(e) => forward(&self.streams, e),
            ServerEvent::StudentRequestStream(e) => forward(&self.stream_requests, e),
            ServerEvent::PeerSignal(e) => forward(&self.signals, e),
            ServerEvent::EventRejected(e) => forward(&self.rejections, e),
        };

        match result {
            Ok(()) => {}
            Err(Dropped::Full) => {
                warn!(target: "lc.client", event = name, "Event channel full, dropping event");
            }
            Err(Dropped::Closed) => {
                debug!(target: "lc.client", event = name, "Event receiver dropped, ignoring event");
            }
        }
    }
}

enum Dropped {
    Full,
    Closed,
}

fn forward<T>(tx: &mpsc::Sender<T>, event: T) -> Result<(), Dropped> {
    tx.try_send(event).map_err(|e| match e {
        TrySendError::Full(_) => Dropped::Full,
        TrySendError::Closed(_) => Dropped::Closed,
    })
}
