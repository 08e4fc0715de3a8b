use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::dto::sse::ServerEvent;

/// Registry of per-room broadcast channels.
///
/// Channels are created lazily by the first subscriber and removed when the
/// last [`RoomSubscription`] is dropped. Publishing to a channel nobody
/// listens to is a no-op.
pub struct RoomHub {
    channels: DashMap<String, broadcast::Sender<ServerEvent>>,
    capacity: usize,
}

impl RoomHub {
    /// Construct a hub whose channels buffer `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Channel name of a room.
    pub fn channel_name(code: &str) -> String {
        format!("room:{code}")
    }

    /// Fire-and-forget delivery to every current subscriber of `channel`.
    pub fn publish(&self, channel: &str, event: ServerEvent) {
        if let Some(sender) = self.channels.get(channel) {
            let _ = sender.send(event);
        }
    }

    /// Subscribe to `channel`, creating it when needed.
    pub fn subscribe(self: &Arc<Self>, channel: &str) -> RoomSubscription {
        let receiver = self
            .channels
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        RoomSubscription {
            hub: Arc::clone(self),
            channel: channel.to_owned(),
            receiver,
        }
    }

    /// Number of channels with at least one live subscription.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Owned handle on one room channel; dropping it unsubscribes.
pub struct RoomSubscription {
    hub: Arc<RoomHub>,
    channel: String,
    receiver: broadcast::Receiver<ServerEvent>,
}

impl RoomSubscription {
    /// Name of the subscribed channel.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next event on the channel.
    pub async fn recv(&mut self) -> Result<ServerEvent, RecvError> {
        self.receiver.recv().await
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        // our own receiver is still alive here, hence `<= 1`
        self.hub
            .channels
            .remove_if(&self.channel, |_, sender| sender.receiver_count() <= 1);
    }
}
