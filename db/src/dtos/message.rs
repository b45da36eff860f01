use uuid::Uuid;

use crate::models::message::MessageKind;

#[derive(Debug, Clone)]
pub struct MessageCreateRequest {
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_initials: String,
    pub content: String,
    pub kind: MessageKind,
    pub voice_url: Option<String>,
}
