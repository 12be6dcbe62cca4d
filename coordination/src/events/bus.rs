//! Session event bus
//!
//! Fan-out over a Tokio broadcast channel. Slow subscribers lag and lose
//! the oldest events; the coordinator never blocks on a listener.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use super::types::SessionEvent;
use crate::room::RoomCode;

/// Channel capacity when none is configured
pub const DEFAULT_CAPACITY: usize = 256;

pub type SharedEventBus = Arc<EventBus>;

/// Broadcasts every room and round transition to interested listeners
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Buffer up to `capacity` events per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Send to every listener; returns how many got it (zero is fine)
    pub fn publish(&self, event: SessionEvent) -> usize {
        let kind = event.event_type();
        let room = event.room_code().map(|code| code.to_string());
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(event = kind, room = ?room, delivered, "Event published");
        delivered
    }

    /// Every event from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Only the events `filter` accepts
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver {
            rx: self.tx.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Selects events by room and by `event_type()` name. Empty criteria
/// accept everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub room_code: Option<RoomCode>,
    pub event_types: Vec<&'static str>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one room; events without a room are dropped
    pub fn room(mut self, code: RoomCode) -> Self {
        self.room_code = Some(code);
        self
    }

    pub fn types(mut self, event_types: &[&'static str]) -> Self {
        self.event_types.extend_from_slice(event_types);
        self
    }

    pub fn matches(&self, event: &SessionEvent) -> bool {
        let room_ok = match &self.room_code {
            Some(code) => event.room_code() == Some(code),
            None => true,
        };
        let type_ok =
            self.event_types.is_empty() || self.event_types.contains(&event.event_type());
        room_ok && type_ok
    }
}

/// Receiver that skips events its filter rejects
pub struct FilteredReceiver {
    rx: broadcast::Receiver<SessionEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    pub async fn recv(&mut self) -> Result<SessionEvent, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}
