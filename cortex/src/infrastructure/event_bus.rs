// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - Pub/Sub for Knowledge Events
//
// In-memory event streaming using tokio broadcast channels. Events are
// lost on restart and dropped for receivers that fall behind capacity.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::KnowledgeEvent;
use crate::domain::pattern::PatternId;

/// Event bus for publishing and subscribing to knowledge events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<KnowledgeEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: KnowledgeEvent) {
        debug!(event_type = event.event_type(), "Publishing knowledge event");

        // send() errors only when nobody is subscribed
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all knowledge events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to events about one pattern (as node or relation endpoint)
    pub fn subscribe_pattern(&self, pattern_id: PatternId) -> PatternEventReceiver {
        PatternEventReceiver {
            receiver: self.sender.subscribe(),
            pattern_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all knowledge events
pub struct EventReceiver {
    receiver: broadcast::Receiver<KnowledgeEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<KnowledgeEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<KnowledgeEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to a single pattern
pub struct PatternEventReceiver {
    receiver: broadcast::Receiver<KnowledgeEvent>,
    pattern_id: PatternId,
}

impl PatternEventReceiver {
    /// Receive the next event concerning the pattern, skipping all others
    pub async fn recv(&mut self) -> Result<KnowledgeEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.concerns(&self.pattern_id) {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn used(pattern_id: PatternId) -> KnowledgeEvent {
        KnowledgeEvent::PatternUsed {
            pattern_id,
            usage_count: 1,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let pattern_id = PatternId::new();

        event_bus.publish(used(pattern_id));

        match receiver.recv().await.unwrap() {
            KnowledgeEvent::PatternUsed { pattern_id: id, .. } => assert_eq!(id, pattern_id),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pattern_event_filtering() {
        let event_bus = EventBus::new(10);
        let pattern_id = PatternId::new();
        let mut receiver = event_bus.subscribe_pattern(pattern_id);

        event_bus.publish(used(PatternId::new()));
        event_bus.publish(KnowledgeEvent::BatchFlushed {
            operations: 3,
            timestamp: Utc::now(),
        });
        event_bus.publish(used(pattern_id));

        let received = receiver.recv().await.unwrap();
        assert!(received.concerns(&pattern_id));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(used(PatternId::new()));

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
        assert!(matches!(receiver1.try_recv(), Err(EventBusError::Empty)));
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let event_bus = EventBus::default();
        event_bus.publish(used(PatternId::new()));
        assert_eq!(event_bus.subscriber_count(), 0);
    }

    #[test]
    fn test_lagged_receiver_reports_dropped_events() {
        let event_bus = EventBus::new(2);
        let mut receiver = event_bus.subscribe();
        for _ in 0..5 {
            event_bus.publish(used(PatternId::new()));
        }
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Lagged(3))));
    }
}
