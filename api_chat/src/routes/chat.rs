use actix_web::{
    HttpRequest, HttpResponse, Responder, get,
    http::header::{self, CacheControl, CacheDirective},
    post,
    web::{self, Bytes},
};
use common::{
    error::{AppError, Res},
    http::Success,
    jwt,
};
use futures::StreamExt;
use serde::Serialize;

use crate::{
    dtos::chat::{HistoryQuery, SendMessageRequest, VoiceSendResponse},
    mirror::ChatChannel,
    services::chat::{Author, ChatService, DEFAULT_HISTORY, VoiceSendOutcome},
    voice::VoiceRecording,
};

#[get("/messages")]
pub async fn get_messages(
    query: web::Query<HistoryQuery>,
    chat: web::Data<ChatService>,
) -> Res<impl Responder> {
    let messages = chat.history(query.limit).await?;
    Success::ok(messages)
}

/// Persists a text message. The new message reaches clients through the stream only.
#[post("/messages")]
pub async fn post_message(
    req: HttpRequest,
    body: web::Json<SendMessageRequest>,
    chat: web::Data<ChatService>,
) -> Res<impl Responder> {
    let claims = jwt::require_claims(&req)?;
    let message = chat
        .send_text(&Author::from(&claims), &body.content)
        .await?;
    Success::created(message)
}

/// Accepts a raw audio body (`Content-Type: audio/*`) and sends it as a voice message.
///
/// Other media types answer 400. A failed upload or insert answers
/// `200 {"sent": false, "retryable": true, "stage": ...}`.
#[post("/voice")]
pub async fn post_voice(
    req: HttpRequest,
    mut payload: web::Payload,
    chat: web::Data<ChatService>,
) -> Res<impl Responder> {
    let claims = jwt::require_claims(&req)?;
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("audio/webm");

    let mut recording = VoiceRecording::new(content_type)?;
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(e.to_string()))?;
        recording.push_chunk(&chunk)?;
    }
    let clip = recording.finish()?;

    match chat.send_voice(&Author::from(&claims), clip).await {
        VoiceSendOutcome::Sent(message) => Ok(HttpResponse::Created().json(VoiceSendResponse {
            sent: true,
            message: Some(message),
            retryable: false,
            stage: None,
        })),
        VoiceSendOutcome::Aborted { stage, .. } => Ok(HttpResponse::Ok().json(VoiceSendResponse {
            sent: false,
            message: None,
            retryable: true,
            stage: Some(stage),
        })),
    }
}

fn sse_frame<T: Serialize>(event: &str, data: &T) -> Result<Bytes, AppError> {
    let data = serde_json::to_string(data)?;
    Ok(Bytes::from(format!("event: {}\ndata: {}\n\n", event, data)))
}

/// Server-sent events: one `history` frame, then a `message` frame per new message.
///
/// Each connection owns one mirror; closing the connection drops it and
/// releases its feed subscription.
#[get("/stream")]
pub async fn get_stream(
    channel: web::Data<ChatChannel>,
    chat: web::Data<ChatService>,
) -> Res<impl Responder> {
    let mut mirror = channel.mirror();
    // subscribe before loading history so nothing falls in between
    mirror.subscribe();
    mirror.seed(chat.history(Some(DEFAULT_HISTORY)).await?);

    let frames = futures::stream::unfold((mirror, true), |(mut mirror, first)| async move {
        if first {
            let frame = sse_frame("history", mirror.messages());
            return Some((frame, (mirror, false)));
        }
        let message = mirror.next_message().await?;
        Some((sse_frame("message", &message), (mirror, false)))
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(CacheControl(vec![CacheDirective::NoCache]))
        .streaming(frames))
}
