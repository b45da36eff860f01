use actix_web::{HttpRequest, Responder, post, web};
use common::{
    error::{AppError, Res},
    http::Success,
};

use crate::{dtos::access::WebhookAck, services::webhook::BillingWebhook};

/// Receives billing provider events.
///
/// Not called by the app. The billing provider posts here; the signing secret
/// comes from `STRIPE_WEBHOOK_SECRET`. Invalid signatures are rejected with 400,
/// verified events are acknowledged once the billing table is updated. Subscription
/// events for a customer not linked yet answer 409 so the provider redelivers them.
#[post("/webhook")]
pub async fn post_webhook(
    payload: String,
    req: HttpRequest,
    webhook: web::Data<BillingWebhook>,
) -> Res<impl Responder> {
    let signature = match req.headers().get("stripe-signature") {
        Some(signature) => signature.to_str().unwrap_or(""),
        None => return Err(AppError::BadRequest("Stripe signature missing".to_string())),
    };

    let event = webhook.verify(&payload, signature)?;
    webhook.handle(event).await?;

    Success::ok(WebhookAck { received: true })
}
