// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - Pub/Sub for Platform Events
//
// In-memory event streaming over tokio broadcast channels. Feeds the
// notification surface (WebSocket relays, CLI followers). Events are
// advisory: publishing never blocks and a lagging subscriber only loses
// its own backlog.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::events::PlatformEvent;

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<PlatformEvent>>,
}

impl EventBus {
    /// Capacity bounds how many events buffer before old ones drop.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: PlatformEvent) {
        // send() fails only when there are no subscribers, which is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<PlatformEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<PlatformEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<PlatformEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => EventBusError::Lagged(n),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{DocumentId, ProcessingStatus};

    #[tokio::test]
    async fn publish_subscribe_roundtrip() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        let document_id = DocumentId::new();
        bus.publish(PlatformEvent::DocumentStatusUpdate {
            document_id: document_id.clone(),
            status: ProcessingStatus::Completed,
            folder_id: None,
            user_id: None,
            filename: "a.md".to_string(),
        });

        match receiver.recv().await.unwrap() {
            PlatformEvent::DocumentStatusUpdate { document_id: id, status, .. } => {
                assert_eq!(id, document_id);
                assert_eq!(status, ProcessingStatus::Completed);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(10);
        bus.publish(PlatformEvent::tree_refresh());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let bus = EventBus::new(10);
        let mut r1 = bus.subscribe();
        let mut r2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(PlatformEvent::tree_refresh());
        assert!(matches!(r1.recv().await.unwrap(), PlatformEvent::FolderTreeRefresh { .. }));
        assert!(matches!(r2.recv().await.unwrap(), PlatformEvent::FolderTreeRefresh { .. }));
    }
}
