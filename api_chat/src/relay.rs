use std::time::Duration;

use log::{debug, error, info, warn};
use sqlx::postgres::PgListener;

use crate::feed::{BroadcastFeed, FeedEvent};

/// Forwards one insert notification to the feed. Returns whether it was well-formed.
pub fn relay_payload(feed: &BroadcastFeed, topic: &str, payload: &str) -> bool {
    match db::message::parse_insert_payload(payload) {
        Ok(message) => {
            let id = message.id;
            let delivered = feed.publish(topic, FeedEvent::MessageInserted(message));
            debug!("Relayed message {} to {} subscribers", id, delivered);
            true
        }
        Err(e) => {
            warn!("Dropping malformed insert notification: {}", e);
            false
        }
    }
}

/// Pumps database insert notifications into `feed` until the listener gives up.
///
/// Runs as the single background task behind every chat mirror.
pub async fn run_relay(mut listener: PgListener, feed: BroadcastFeed, topic: String) {
    info!("Chat relay started on topic '{}'", topic);
    loop {
        match listener.recv().await {
            Ok(notification) => {
                relay_payload(&feed, &topic, notification.payload());
            }
            Err(e) => {
                // PgListener reconnects on its own; back off before asking again
                error!("Chat relay lost its listener: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::RealtimeFeed;

    #[tokio::test]
    async fn relays_trigger_payloads() {
        let feed = BroadcastFeed::default();
        let mut sub = feed.subscribe("community");
        let payload = r#"{
            "id": "0b8e2f4c-1a55-4c1e-9d0a-5f4b3c2a1e00",
            "user_id": "6f1c7a52-54a4-4e7b-8d0b-6c1f2d0f9a11",
            "display_name": "Ana Lima",
            "avatar_initials": "AL",
            "content": "Bom dia",
            "kind": "text",
            "voice_url": null,
            "created_at": "2025-03-01T10:00:00+00:00"
        }"#;

        assert!(relay_payload(&feed, "community", payload));
        let Some(FeedEvent::MessageInserted(message)) = sub.recv().await else {
            panic!("expected a relayed message");
        };
        assert_eq!(message.content, "Bom dia");
    }

    #[test]
    fn drops_garbage() {
        let feed = BroadcastFeed::default();
        assert!(!relay_payload(&feed, "community", "not json"));
    }
}
