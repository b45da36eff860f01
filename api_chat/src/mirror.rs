use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use db::models::message::ChatMessage;
use log::debug;
use uuid::Uuid;

use crate::feed::{FeedEvent, FeedSubscription, RealtimeFeed};

/// Messages a mirror keeps by default.
pub const DEFAULT_WINDOW: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    Disconnected,
    Subscribed,
}

/// A feed and the topic the community chat lives on.
#[derive(Clone)]
pub struct ChatChannel {
    feed: Arc<dyn RealtimeFeed>,
    topic: String,
}

impl ChatChannel {
    pub fn new(feed: Arc<dyn RealtimeFeed>, topic: impl Into<String>) -> Self {
        ChatChannel {
            feed,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn mirror(&self) -> ChatMirror {
        ChatMirror::new(self.feed.clone(), &self.topic)
    }
}

/// Local, append-only copy of the chat kept in sync by the realtime feed.
///
/// Messages appear in arrival order and at most once per id. Only the newest
/// `window` messages are kept; the oldest is evicted together with its id.
/// Events are ignored while disconnected. Dropping the mirror releases its
/// subscription.
pub struct ChatMirror {
    feed: Arc<dyn RealtimeFeed>,
    topic: String,
    subscription: Option<FeedSubscription>,
    messages: VecDeque<ChatMessage>,
    seen: HashSet<Uuid>,
    window: usize,
}

impl ChatMirror {
    pub fn new(feed: Arc<dyn RealtimeFeed>, topic: &str) -> Self {
        ChatMirror {
            feed,
            topic: topic.to_string(),
            subscription: None,
            messages: VecDeque::new(),
            seen: HashSet::new(),
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn state(&self) -> MirrorState {
        match &self.subscription {
            Some(sub) if sub.is_active() => MirrorState::Subscribed,
            _ => MirrorState::Disconnected,
        }
    }

    /// Opens the single subscription of this mirror. No-op when already subscribed.
    pub fn subscribe(&mut self) {
        if self.state() == MirrorState::Subscribed {
            return;
        }
        self.subscription = Some(self.feed.subscribe(&self.topic));
        debug!("Chat mirror subscribed to '{}'", self.topic);
    }

    /// Loads persisted history, oldest first. Ids already present are skipped.
    pub fn seed(&mut self, history: Vec<ChatMessage>) {
        for message in history {
            self.append(message);
        }
    }

    /// Merges one feed event. Returns whether the local list changed.
    pub fn apply(&mut self, event: FeedEvent) -> bool {
        if self.state() == MirrorState::Disconnected {
            return false;
        }
        match event {
            FeedEvent::MessageInserted(message) => self.append(message),
        }
    }

    fn append(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }
        self.messages.push_back(message);
        while self.messages.len() > self.window {
            if let Some(evicted) = self.messages.pop_front() {
                self.seen.remove(&evicted.id);
            }
        }
        true
    }

    /// Waits for the next message that is new to this mirror.
    ///
    /// Returns `None` when disconnected or once the feed goes away.
    pub async fn next_message(&mut self) -> Option<ChatMessage> {
        loop {
            let event = match self.subscription.as_mut()?.recv().await {
                Some(event) => event,
                None => {
                    self.teardown();
                    return None;
                }
            };
            if self.apply(event) {
                return self.messages.back().cloned();
            }
        }
    }

    pub fn messages(&self) -> &VecDeque<ChatMessage> {
        &self.messages
    }

    pub fn teardown(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
            debug!("Chat mirror of '{}' torn down", self.topic);
        }
    }
}

impl Drop for ChatMirror {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{feed::BroadcastFeed, testing::message};

    fn channel() -> (BroadcastFeed, ChatChannel) {
        let feed = BroadcastFeed::default();
        let channel = ChatChannel::new(Arc::new(feed.clone()), "community");
        (feed, channel)
    }

    #[test]
    fn events_are_deduplicated_by_id() {
        let (_, channel) = channel();
        let mut mirror = channel.mirror();
        let first = message("hola");
        let second = message("¿qué tal?");

        mirror.subscribe();
        mirror.seed(vec![first.clone()]);
        assert!(!mirror.apply(FeedEvent::MessageInserted(first.clone())));
        assert!(mirror.apply(FeedEvent::MessageInserted(second.clone())));
        assert!(!mirror.apply(FeedEvent::MessageInserted(second.clone())));

        let ids: Vec<_> = mirror.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn ignores_events_while_disconnected() {
        let (_, channel) = channel();
        let mut mirror = channel.mirror();
        assert_eq!(mirror.state(), MirrorState::Disconnected);
        assert!(!mirror.apply(FeedEvent::MessageInserted(message("early"))));

        mirror.subscribe();
        mirror.teardown();
        assert!(!mirror.apply(FeedEvent::MessageInserted(message("late"))));
        assert!(mirror.messages().is_empty());
    }

    #[test]
    fn one_subscription_per_mirror_released_on_drop() {
        let (feed, channel) = channel();
        let mut mirror = channel.mirror();
        mirror.subscribe();
        mirror.subscribe();
        assert_eq!(feed.subscriber_count("community"), 1);

        mirror.teardown();
        assert_eq!(feed.subscriber_count("community"), 0);

        mirror.subscribe();
        assert_eq!(mirror.state(), MirrorState::Subscribed);
        drop(mirror);
        assert_eq!(feed.subscriber_count("community"), 0);
    }

    #[tokio::test]
    async fn next_message_follows_the_feed() {
        let (feed, channel) = channel();
        let mut mirror = channel.mirror();
        mirror.subscribe();
        let seeded = message("seeded");
        mirror.seed(vec![seeded.clone()]);

        let fresh = message("fresh");
        feed.publish("community", FeedEvent::MessageInserted(seeded));
        feed.publish("community", FeedEvent::MessageInserted(fresh.clone()));

        let next = tokio::time::timeout(Duration::from_secs(1), mirror.next_message())
            .await
            .unwrap();
        assert_eq!(next, Some(fresh));
        assert_eq!(mirror.messages().len(), 2);
    }

    #[tokio::test]
    async fn next_message_without_subscription_is_none() {
        let (_, channel) = channel();
        let mut mirror = channel.mirror();
        assert_eq!(mirror.next_message().await, None);
    }

    #[test]
    fn keeps_only_the_newest_window() {
        let (_, channel) = channel();
        let mut mirror = channel.mirror().with_window(2);
        mirror.subscribe();
        let sent: Vec<_> = ["uno", "dos", "tres"].into_iter().map(message).collect();
        mirror.seed(sent.clone());

        let ids: Vec<_> = mirror.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![sent[1].id, sent[2].id]);
        assert_eq!(mirror.seen.len(), 2);
        assert!(!mirror.apply(FeedEvent::MessageInserted(sent[2].clone())));
    }
}
