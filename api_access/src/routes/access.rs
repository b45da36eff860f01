use actix_web::{HttpRequest, Responder, get, post, web};
use chrono::Utc;
use common::{
    env_config::UsageLimits,
    error::{AppError, Res},
    http::Success,
    jwt,
};
use entitlements::dtos::events::AttributionEvent;

use crate::{
    dtos::access::AttributionRequest,
    services::{
        reconcile::AccessResolver,
        usage::{self, present_usage},
        webhook::EntitlementEvents,
    },
    store::UsageCounter,
};

/// Reconciled access of the caller.
///
/// Missing or invalid tokens are treated as unauthenticated and yield
/// `{"has_active_subscription": false, "source": "none"}` without any upstream call.
#[get("/status")]
pub async fn get_status(req: HttpRequest, resolver: web::Data<AccessResolver>) -> Res<impl Responder> {
    let user_id = jwt::optional_claims(&req).map(|c| c.user_id());
    let status = resolver.resolve_access(user_id).await;
    Success::ok(status)
}

/// Today's metered usage of the caller against the free plan limits.
#[get("/usage")]
pub async fn get_usage(
    req: HttpRequest,
    resolver: web::Data<AccessResolver>,
    counter: web::Data<dyn UsageCounter>,
    limits: web::Data<UsageLimits>,
) -> Res<impl Responder> {
    let claims = jwt::require_claims(&req)?;
    let now = Utc::now();

    let status = resolver.resolve_access(Some(claims.user_id())).await;
    let counts = counter
        .counts_since(claims.user_id(), usage::start_of_day(now))
        .await?;

    Success::ok(present_usage(&status, counts, &limits, now))
}

/// Forwards a funnel event to the entitlement provider without waiting for it.
#[post("/events")]
pub async fn post_event(
    req: HttpRequest,
    body: web::Json<AttributionRequest>,
    events: web::Data<dyn EntitlementEvents>,
) -> Res<impl Responder> {
    let claims = jwt::require_claims(&req)?;
    let body = body.into_inner();
    if body.event.trim().is_empty() {
        return Err(AppError::BadRequest("Event name is required".to_string()));
    }

    let mut event = AttributionEvent::new(body.event.trim());
    event.properties = body.properties;

    let events = events.into_inner();
    let user_id = claims.user_id().to_string();
    tokio::spawn(async move {
        events.record_attribution(&user_id, &event).await;
    });

    Success::accepted(serde_json::json!({ "accepted": true }))
}
