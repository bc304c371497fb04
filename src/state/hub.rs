use tokio::sync::broadcast;
use tracing::debug;

use crate::dto::sse::ServerEvent;

/// Broadcast hub fanning a room's events out to its subscribers.
///
/// Every event sent by one room goes through the same channel, so all
/// subscribers observe them in the order they were emitted.
pub struct RoomHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl RoomHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers.
    ///
    /// With nobody subscribed the event is dropped.
    pub fn broadcast(&self, event: ServerEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            debug!(event = ?event.event, "no subscriber for room event; dropped");
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_events_in_emission_order() {
        let hub = RoomHub::new(8);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        for name in ["a", "b", "c"] {
            hub.broadcast(ServerEvent::new(Some(name.to_string()), String::new()));
        }
        for receiver in [&mut first, &mut second] {
            let mut names = Vec::new();
            for _ in 0..3 {
                names.push(receiver.recv().await.unwrap().event.unwrap());
            }
            assert_eq!(names, vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn broadcasting_without_subscribers_is_harmless() {
        let hub = RoomHub::new(1);
        hub.broadcast(ServerEvent::new(None, "{}".into()));
        assert_eq!(hub.subscriber_count(), 0);
    }
}
