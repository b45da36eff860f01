use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use db::models::message::ChatMessage;
use log::{debug, warn};
use tokio::sync::broadcast::{self, error::RecvError};

/// Change pushed to subscribers of a topic.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    MessageInserted(ChatMessage),
}

/// Source of realtime change events, one stream per topic.
pub trait RealtimeFeed: Send + Sync {
    fn subscribe(&self, topic: &str) -> FeedSubscription;
}

type Release = Box<dyn FnOnce() + Send>;

/// Scoped handle on a topic.
///
/// `unsubscribe` is idempotent and runs on drop, so a handle can never leak
/// its slot in the feed.
pub struct FeedSubscription {
    topic: String,
    receiver: Option<broadcast::Receiver<FeedEvent>>,
    release: Option<Release>,
}

impl FeedSubscription {
    pub fn new(
        topic: &str,
        receiver: broadcast::Receiver<FeedEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        FeedSubscription {
            topic: topic.to_string(),
            receiver: Some(receiver),
            release: Some(Box::new(release)),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    /// Next event, or `None` once unsubscribed or the feed is gone.
    ///
    /// A slow subscriber that lagged behind skips the lost events and keeps going.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        loop {
            let receiver = self.receiver.as_mut()?;
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Subscriber of '{}' lagged, {} events skipped",
                        self.topic, skipped
                    );
                }
                Err(RecvError::Closed) => {
                    debug!("Feed of '{}' closed", self.topic);
                    self.unsubscribe();
                    return None;
                }
            }
        }
    }

    pub fn unsubscribe(&mut self) {
        self.receiver = None;
        if let Some(release) = self.release.take() {
            release();
            debug!("Unsubscribed from '{}'", self.topic);
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for FeedSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedSubscription")
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}

struct Topic {
    sender: broadcast::Sender<FeedEvent>,
    subscribers: usize,
}

/// In-process topic hub fed by the database relay.
#[derive(Clone)]
pub struct BroadcastFeed {
    topics: Arc<Mutex<HashMap<String, Topic>>>,
    capacity: usize,
}

impl BroadcastFeed {
    pub fn new(capacity: usize) -> Self {
        BroadcastFeed {
            topics: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<String, Topic>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers `event` to current subscribers and returns how many there were.
    pub fn publish(&self, topic: &str, event: FeedEvent) -> usize {
        let topics = self.topics();
        match topics.get(topic) {
            Some(entry) => entry.sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics().get(topic).map_or(0, |t| t.subscribers)
    }
}

impl Default for BroadcastFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RealtimeFeed for BroadcastFeed {
    fn subscribe(&self, topic: &str) -> FeedSubscription {
        let receiver = {
            let mut topics = self.topics();
            let entry = topics.entry(topic.to_string()).or_insert_with(|| Topic {
                sender: broadcast::channel(self.capacity).0,
                subscribers: 0,
            });
            entry.subscribers += 1;
            entry.sender.subscribe()
        };

        let topics = self.topics.clone();
        let name = topic.to_string();
        FeedSubscription::new(topic, receiver, move || {
            let mut topics = topics.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = topics.get_mut(&name) {
                entry.subscribers = entry.subscribers.saturating_sub(1);
                if entry.subscribers == 0 {
                    topics.remove(&name);
                }
            }
        })
    }
}
