use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::{AppError, Res},
    jwt::JwtClaims,
    storage::ObjectStorage,
};
use db::{
    dtos::message::MessageCreateRequest,
    models::message::{ChatMessage, MessageKind},
};
use log::{info, warn};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::voice::VoiceClip;

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const DEFAULT_HISTORY: i64 = 50;
const MAX_HISTORY: i64 = 200;
const VOICE_PLACEHOLDER: &str = "Voice message";

/// Persistent, append-only message log.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: MessageCreateRequest) -> Res<ChatMessage>;

    /// Latest `limit` messages, oldest first.
    async fn recent(&self, limit: i64) -> Res<Vec<ChatMessage>>;
}

#[derive(Clone)]
pub struct PgMessageStore {
    pool: Arc<PgPool>,
}

impl PgMessageStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        PgMessageStore { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert(&self, message: MessageCreateRequest) -> Res<ChatMessage> {
        db::message::insert_message(self.pool.as_ref(), message).await
    }

    async fn recent(&self, limit: i64) -> Res<Vec<ChatMessage>> {
        db::message::list_recent_messages(self.pool.as_ref(), limit).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub user_id: Uuid,
    pub display_name: String,
}

impl From<&JwtClaims> for Author {
    fn from(claims: &JwtClaims) -> Self {
        Author {
            user_id: claims.user_id(),
            display_name: claims.display_name(),
        }
    }
}

/// Up to two uppercase initials of a display name, `?` when there is nothing to take.
pub fn avatar_initials(display_name: &str) -> String {
    let initials: String = display_name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    if initials.is_empty() {
        "?".to_string()
    } else {
        initials
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceStage {
    Upload,
    Insert,
}

#[derive(Debug)]
pub enum VoiceSendOutcome {
    Sent(ChatMessage),
    /// Nothing was appended. The clip is handed back so the sender can retry.
    Aborted { stage: VoiceStage, clip: VoiceClip },
}

/// Writes and reads the community chat.
///
/// Sends never touch a local list: a sent message shows up for everyone,
/// the sender included, through the realtime feed.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn MessageStore>,
    storage: Arc<dyn ObjectStorage>,
    voice_bucket: String,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        storage: Arc<dyn ObjectStorage>,
        voice_bucket: impl Into<String>,
    ) -> Self {
        ChatService {
            store,
            storage,
            voice_bucket: voice_bucket.into(),
        }
    }

    pub async fn send_text(&self, author: &Author, content: &str) -> Res<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("Message is empty".to_string()));
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::BadRequest(format!(
                "Message exceeds {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        self.store
            .insert(MessageCreateRequest {
                user_id: author.user_id,
                display_name: author.display_name.clone(),
                avatar_initials: avatar_initials(&author.display_name),
                content: content.to_string(),
                kind: MessageKind::Text,
                voice_url: None,
            })
            .await
    }

    pub async fn history(&self, limit: Option<i64>) -> Res<Vec<ChatMessage>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY).clamp(1, MAX_HISTORY);
        self.store.recent(limit).await
    }

    /// Uploads the clip, then inserts a voice message pointing at it.
    ///
    /// Either step failing aborts the send without an error status.
    pub async fn send_voice(&self, author: &Author, clip: VoiceClip) -> VoiceSendOutcome {
        let key = format!(
            "{}/{}-{}.{}",
            author.user_id,
            clip.recorded_at.timestamp_millis(),
            Uuid::new_v4(),
            clip.extension()
        );

        if let Err(e) = self
            .storage
            .upload(&self.voice_bucket, &key, clip.bytes.clone(), &clip.content_type)
            .await
        {
            warn!("Voice upload of {} failed, send aborted: {}", author.user_id, e);
            return VoiceSendOutcome::Aborted {
                stage: VoiceStage::Upload,
                clip,
            };
        }

        let voice_url = self.storage.public_url(&self.voice_bucket, &key);
        let inserted = self
            .store
            .insert(MessageCreateRequest {
                user_id: author.user_id,
                display_name: author.display_name.clone(),
                avatar_initials: avatar_initials(&author.display_name),
                content: VOICE_PLACEHOLDER.to_string(),
                kind: MessageKind::Voice,
                voice_url: Some(voice_url),
            })
            .await;

        match inserted {
            Ok(message) => {
                info!("Voice message {} sent by {}", message.id, author.user_id);
                VoiceSendOutcome::Sent(message)
            }
            Err(e) => {
                // the uploaded object stays behind unreferenced
                warn!(
                    "Voice message of {} uploaded as {} but not saved, send aborted: {}",
                    author.user_id, key, e
                );
                VoiceSendOutcome::Aborted {
                    stage: VoiceStage::Insert,
                    clip,
                }
            }
        }
    }
}
