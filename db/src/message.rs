use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, PgPool, Postgres, postgres::PgListener};
use uuid::Uuid;

use crate::{
    dtos::message::MessageCreateRequest,
    models::message::{ChatMessage, MessageKind, MessageRow},
};

/// Channel the `messages` insert trigger notifies on.
pub const INSERT_CHANNEL: &str = "chat_messages";

pub async fn insert_message<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: MessageCreateRequest,
) -> Res<ChatMessage> {
    let row = sqlx::query_as::<_, MessageRow>(
        r#"
        INSERT INTO messages (user_id, display_name, avatar_initials, content, kind, voice_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.display_name)
    .bind(data.avatar_initials)
    .bind(data.content)
    .bind(data.kind.as_str())
    .bind(data.voice_url)
    .fetch_one(executor)
    .await?;

    ChatMessage::try_from(row).map_err(AppError::Internal)
}

/// Latest `limit` messages, oldest first.
pub async fn list_recent_messages<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    limit: i64,
) -> Res<Vec<ChatMessage>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT * FROM (
            SELECT * FROM messages ORDER BY created_at DESC LIMIT $1
        ) recent
        ORDER BY created_at ASC
        "#,
    )
    .bind(limit)
    .fetch_all(executor)
    .await?;

    rows.into_iter()
        .map(|row| ChatMessage::try_from(row).map_err(AppError::Internal))
        .collect()
}

pub async fn count_messages_since<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    kind: MessageKind,
    since: DateTime<Utc>,
) -> Res<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM messages WHERE user_id = $1 AND kind = $2 AND created_at >= $3",
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(since)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Opens a dedicated connection listening for message inserts.
pub async fn listen_inserts(pool: &PgPool) -> Res<PgListener> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(INSERT_CHANNEL).await?;
    Ok(listener)
}

/// Decodes the `row_to_json` payload sent by the insert trigger.
pub fn parse_insert_payload(payload: &str) -> Res<ChatMessage> {
    serde_json::from_str(payload).map_err(AppError::from)
}
