use stripe::{Event, Webhook};

use crate::error::{AppError, Res};

/// Creates an event for the webhook based on the request payload and signature.
/// Requires a webhook secret key.
pub fn construct_event(payload: &str, signature: &str, webhook_secret: &str) -> Res<Event> {
    if webhook_secret.is_empty() {
        log::error!("Stripe webhook called but STRIPE_WEBHOOK_SECRET is not configured");
        return Err(AppError::Internal(
            "Webhook secret is not configured".to_string(),
        ));
    }

    match Webhook::construct_event(payload, signature, webhook_secret) {
        Ok(event) => Ok(event),
        Err(e) => {
            log::error!("Error constructing webhook event: {}", e);
            Err(AppError::from(e))
        }
    }
}
