use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Per-room broadcast hub — the fire-and-forget channel-sync/notification
/// path. Booking creation and cancellation publish here after commit; a
/// send with no listeners (or a lagging listener) never affects the
/// committed transaction.
#[derive(Debug)]
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a room. Creates the channel if needed.
    pub fn subscribe(&self, room_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Publish an event. No-op if nobody is listening.
    pub fn send(&self, room_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&room_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop a room's channel.
    #[allow(dead_code)]
    pub fn remove(&self, room_id: &Ulid) {
        self.channels.remove(room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let room_id = Ulid::new();
        let mut rx = hub.subscribe(room_id);

        let event = Event::BookingCancelled {
            id: Ulid::new(),
            room_id,
            rate_plan_id: Ulid::new(),
            reason: Some("guest request".into()),
            at: 0,
        };
        hub.send(room_id, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let room_id = Ulid::new();
        // No subscriber — must not panic or block
        hub.send(
            room_id,
            &Event::BookingCompleted {
                id: Ulid::new(),
                room_id,
                rate_plan_id: Ulid::new(),
                at: 0,
            },
        );
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let hub = NotifyHub::new();
        let room_a = Ulid::new();
        let room_b = Ulid::new();
        let mut rx_a = hub.subscribe(room_a);

        hub.send(
            room_b,
            &Event::BookingCompleted {
                id: Ulid::new(),
                room_id: room_b,
                rate_plan_id: Ulid::new(),
                at: 0,
            },
        );

        assert!(rx_a.try_recv().is_err());
    }
}
