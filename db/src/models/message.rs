use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Voice,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Voice => "voice",
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "voice" => Ok(MessageKind::Voice),
            other => Err(format!("Unknown message kind '{}'", other)),
        }
    }
}

/// A community chat message. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_initials: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub kind: MessageKind,
    #[serde(default)]
    pub voice_url: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MessageRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_initials: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub kind: String,
    pub voice_url: Option<String>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = String;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(ChatMessage {
            id: row.id,
            user_id: row.user_id,
            display_name: row.display_name,
            avatar_initials: row.avatar_initials,
            content: row.content,
            created_at: row.created_at,
            kind: row.kind.parse()?,
            voice_url: row.voice_url,
        })
    }
}
