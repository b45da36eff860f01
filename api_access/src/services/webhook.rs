use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::{AppError, Res},
    stripe::construct_event,
};
use db::dtos::subscription::SubscriptionStatusUpdate;
use entitlements::{
    EntitlementClient,
    dtos::events::{AttributionEvent, BillingChange},
};
use log::{debug, info, warn};
use stripe::{Event, EventObject, EventType};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::store::BillingLedger;

/// Billing events this service acts on, stripped of the provider's payload types.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    /// A checkout finished for a signed-in user; ties the billing customer to them.
    CheckoutCompleted { user_id: Uuid, customer_id: String },
    SubscriptionChanged {
        customer_id: String,
        status: String,
        current_period_end: i64,
    },
    Ignored(String),
}

pub fn classify_event(event: Event) -> BillingEvent {
    match (event.type_, event.data.object) {
        (EventType::CheckoutSessionCompleted, EventObject::CheckoutSession(session)) => {
            let user_id = session
                .client_reference_id
                .as_deref()
                .and_then(|id| Uuid::parse_str(id).ok());
            match (user_id, session.customer) {
                (Some(user_id), Some(customer)) => BillingEvent::CheckoutCompleted {
                    user_id,
                    customer_id: customer.id().to_string(),
                },
                _ => BillingEvent::Ignored(format!(
                    "checkout session {} without user reference or customer",
                    session.id
                )),
            }
        }
        (
            EventType::CustomerSubscriptionCreated
            | EventType::CustomerSubscriptionUpdated
            | EventType::CustomerSubscriptionDeleted,
            EventObject::Subscription(subscription),
        ) => BillingEvent::SubscriptionChanged {
            customer_id: subscription.customer.id().to_string(),
            status: subscription.status.as_str().to_string(),
            current_period_end: subscription.current_period_end,
        },
        (event_type, _) => BillingEvent::Ignored(event_type.to_string()),
    }
}

/// Best-effort writes to the entitlement provider.
#[async_trait]
pub trait EntitlementEvents: Send + Sync {
    async fn sync_billing_change(&self, user_id: &str, change: &BillingChange);

    async fn record_attribution(&self, user_id: &str, event: &AttributionEvent);
}

#[async_trait]
impl EntitlementEvents for EntitlementClient {
    async fn sync_billing_change(&self, user_id: &str, change: &BillingChange) {
        EntitlementClient::sync_billing_change(self, user_id, change).await
    }

    async fn record_attribution(&self, user_id: &str, event: &AttributionEvent) {
        EntitlementClient::record_attribution(self, user_id, event).await
    }
}

#[derive(Debug)]
pub enum WebhookOutcome {
    Linked,
    /// Row updated; `sync` is the detached push to the entitlement provider.
    Updated { sync: JoinHandle<()> },
    Ignored,
}

#[derive(Clone)]
pub struct BillingWebhook {
    secret: String,
    ledger: Arc<dyn BillingLedger>,
    sync: Arc<dyn EntitlementEvents>,
}

impl BillingWebhook {
    pub fn new(
        secret: impl Into<String>,
        ledger: Arc<dyn BillingLedger>,
        sync: Arc<dyn EntitlementEvents>,
    ) -> Self {
        BillingWebhook {
            secret: secret.into(),
            ledger,
            sync,
        }
    }

    /// Checks the signature header and reduces the payload to a [`BillingEvent`].
    pub fn verify(&self, payload: &str, signature: &str) -> Res<BillingEvent> {
        let event = construct_event(payload, signature, &self.secret)?;
        info!("Received billing event {} ({})", event.id, event.type_);
        Ok(classify_event(event))
    }

    /// Applies the event to the billing table.
    ///
    /// The provider sync never holds up the acknowledgement. A subscription event
    /// for a customer no checkout has linked yet is a `Conflict`, so the billing
    /// provider redelivers it after the checkout event lands.
    pub async fn handle(&self, event: BillingEvent) -> Res<WebhookOutcome> {
        match event {
            BillingEvent::CheckoutCompleted {
                user_id,
                customer_id,
            } => {
                self.ledger.link_customer(user_id, &customer_id).await?;
                info!("Linked billing customer {} to user {}", customer_id, user_id);
                Ok(WebhookOutcome::Linked)
            }
            BillingEvent::SubscriptionChanged {
                customer_id,
                status,
                current_period_end,
            } => {
                let update = SubscriptionStatusUpdate {
                    stripe_customer_id: customer_id.clone(),
                    subscription_status: status.clone(),
                    current_period_end,
                };
                let Some(row) = self.ledger.update_status(update).await? else {
                    warn!(
                        "Subscription event for unlinked billing customer {}, asking for redelivery",
                        customer_id
                    );
                    return Err(AppError::Conflict(format!(
                        "billing customer {} is not linked to a user yet",
                        customer_id
                    )));
                };
                info!(
                    "Billing status of user {} is now '{}'",
                    row.user_id, row.subscription_status
                );

                let sync = self.sync.clone();
                let user_id = row.user_id.to_string();
                let change =
                    BillingChange::web_billing(&status, current_period_end, Some(customer_id));
                let handle = tokio::spawn(async move {
                    sync.sync_billing_change(&user_id, &change).await;
                });
                Ok(WebhookOutcome::Updated { sync: handle })
            }
            BillingEvent::Ignored(what) => {
                debug!("Unhandled billing event: {}", what);
                Ok(WebhookOutcome::Ignored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use actix_web::{ResponseError, http::StatusCode};
    use chrono::Utc;
    use db::models::subscription::SubscriptionRow;
    use serde_json::{Value, json};

    use super::*;

    #[derive(Default)]
    struct FakeLedger {
        links: Mutex<Vec<(Uuid, String)>>,
        owner: Option<Uuid>,
        fail: bool,
    }

    #[async_trait]
    impl BillingLedger for FakeLedger {
        async fn link_customer(&self, user_id: Uuid, customer_id: &str) -> Res<()> {
            if self.fail {
                return Err(AppError::Internal("db down".to_string()));
            }
            self.links
                .lock()
                .unwrap()
                .push((user_id, customer_id.to_string()));
            Ok(())
        }

        async fn update_status(
            &self,
            update: SubscriptionStatusUpdate,
        ) -> Res<Option<SubscriptionRow>> {
            if self.fail {
                return Err(AppError::Internal("db down".to_string()));
            }
            Ok(self.owner.map(|user_id| SubscriptionRow {
                user_id,
                stripe_customer_id: Some(update.stripe_customer_id),
                subscription_status: update.subscription_status,
                current_period_end: update.current_period_end,
                updated_at: Utc::now(),
            }))
        }
    }

    /// Keyed like the `subscriptions` table: new rows start out `incomplete`.
    #[derive(Default)]
    struct TableLedger {
        rows: Mutex<HashMap<Uuid, (String, String, i64)>>,
    }

    impl TableLedger {
        fn status_of(&self, user_id: Uuid) -> Option<String> {
            self.rows
                .lock()
                .unwrap()
                .get(&user_id)
                .map(|(_, status, _)| status.clone())
        }
    }

    #[async_trait]
    impl BillingLedger for TableLedger {
        async fn link_customer(&self, user_id: Uuid, customer_id: &str) -> Res<()> {
            self.rows
                .lock()
                .unwrap()
                .entry(user_id)
                .and_modify(|row| row.0 = customer_id.to_string())
                .or_insert_with(|| (customer_id.to_string(), "incomplete".to_string(), 0));
            Ok(())
        }

        async fn update_status(
            &self,
            update: SubscriptionStatusUpdate,
        ) -> Res<Option<SubscriptionRow>> {
            let mut rows = self.rows.lock().unwrap();
            let owner = rows
                .iter_mut()
                .find(|(_, row)| row.0 == update.stripe_customer_id);
            Ok(owner.map(|(user_id, row)| {
                row.1 = update.subscription_status.clone();
                row.2 = update.current_period_end;
                SubscriptionRow {
                    user_id: *user_id,
                    stripe_customer_id: Some(update.stripe_customer_id),
                    subscription_status: update.subscription_status,
                    current_period_end: update.current_period_end,
                    updated_at: Utc::now(),
                }
            }))
        }
    }

    #[derive(Default)]
    struct RecordingSync {
        changes: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl EntitlementEvents for RecordingSync {
        async fn sync_billing_change(&self, user_id: &str, change: &BillingChange) {
            self.changes
                .lock()
                .unwrap()
                .push((user_id.to_string(), change.subscription_status.clone()));
        }

        async fn record_attribution(&self, _: &str, _: &AttributionEvent) {}
    }

    fn webhook(ledger: FakeLedger) -> (BillingWebhook, Arc<FakeLedger>, Arc<RecordingSync>) {
        let ledger = Arc::new(ledger);
        let sync = Arc::new(RecordingSync::default());
        (
            BillingWebhook::new("whsec_test", ledger.clone(), sync.clone()),
            ledger,
            sync,
        )
    }

    fn changed(status: &str) -> BillingEvent {
        BillingEvent::SubscriptionChanged {
            customer_id: "cus_123".to_string(),
            status: status.to_string(),
            current_period_end: 1766000000,
        }
    }

    #[tokio::test]
    async fn checkout_links_customer() {
        let (webhook, ledger, sync) = webhook(FakeLedger::default());
        let user_id = Uuid::new_v4();
        let outcome = webhook
            .handle(BillingEvent::CheckoutCompleted {
                user_id,
                customer_id: "cus_123".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Linked));
        assert_eq!(
            *ledger.links.lock().unwrap(),
            vec![(user_id, "cus_123".to_string())]
        );
        assert!(sync.changes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscription_change_is_synced_to_provider() {
        let owner = Uuid::new_v4();
        let (webhook, _, sync) = webhook(FakeLedger {
            owner: Some(owner),
            ..Default::default()
        });
        let outcome = webhook.handle(changed("canceled")).await.unwrap();
        let WebhookOutcome::Updated { sync: handle } = outcome else {
            panic!("expected an update, got {:?}", outcome);
        };
        handle.await.unwrap();
        assert_eq!(
            *sync.changes.lock().unwrap(),
            vec![(owner.to_string(), "canceled".to_string())]
        );
    }

    #[tokio::test]
    async fn unknown_customer_asks_for_redelivery() {
        let (webhook, _, sync) = webhook(FakeLedger::default());
        let err = webhook.handle(changed("active")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.error_response().status(), StatusCode::CONFLICT);
        assert!(sync.changes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscription_event_before_checkout_lands_on_redelivery() {
        let ledger = Arc::new(TableLedger::default());
        let sync = Arc::new(RecordingSync::default());
        let webhook = BillingWebhook::new("whsec_test", ledger.clone(), sync.clone());
        let user_id = Uuid::new_v4();

        assert!(webhook.handle(changed("active")).await.is_err());
        assert_eq!(ledger.status_of(user_id), None);

        let outcome = webhook
            .handle(BillingEvent::CheckoutCompleted {
                user_id,
                customer_id: "cus_123".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Linked));
        assert_eq!(ledger.status_of(user_id).as_deref(), Some("incomplete"));

        let WebhookOutcome::Updated { sync: handle } =
            webhook.handle(changed("active")).await.unwrap()
        else {
            panic!("redelivered event should update the linked row");
        };
        handle.await.unwrap();
        assert_eq!(ledger.status_of(user_id).as_deref(), Some("active"));
        assert_eq!(
            *sync.changes.lock().unwrap(),
            vec![(user_id.to_string(), "active".to_string())]
        );
    }

    #[tokio::test]
    async fn ledger_failures_propagate() {
        let (webhook, _, _) = webhook(FakeLedger {
            fail: true,
            owner: Some(Uuid::new_v4()),
            ..Default::default()
        });
        assert!(webhook.handle(changed("active")).await.is_err());
    }

    #[test]
    fn forged_payloads_are_rejected() {
        let (webhook, _, _) = webhook(FakeLedger::default());
        let res = webhook.verify(r#"{"id": "evt_1"}"#, "t=1,v1=deadbeef");
        assert!(matches!(res, Err(AppError::Webhook(_))));
    }

    #[tokio::test]
    async fn other_events_are_ignored() {
        let (webhook, _, _) = webhook(FakeLedger::default());
        let outcome = webhook
            .handle(BillingEvent::Ignored("invoice.paid".to_string()))
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored));
    }

    fn stripe_event(event_type: &str, object: Value) -> Event {
        serde_json::from_value(json!({
            "id": "evt_1NG8Du2eZvKYlo2CUI79vXWy",
            "object": "event",
            "api_version": "2023-10-16",
            "created": 1700000000,
            "livemode": false,
            "pending_webhooks": 1,
            "request": null,
            "type": event_type,
            "data": { "object": object }
        }))
        .unwrap()
    }

    fn checkout_session(client_reference_id: Value, customer: Value) -> Value {
        json!({
            "id": "cs_test_a1b2c3",
            "object": "checkout.session",
            "automatic_tax": { "enabled": false, "liability": null, "status": null },
            "client_reference_id": client_reference_id,
            "created": 1700000000,
            "custom_fields": [],
            "custom_text": {
                "after_submit": null,
                "shipping_address": null,
                "submit": null,
                "terms_of_service_acceptance": null
            },
            "customer": customer,
            "expires_at": 1700086400,
            "livemode": false,
            "mode": "subscription",
            "payment_method_types": ["card"],
            "payment_status": "paid",
            "shipping_options": [],
            "status": "complete",
            "subscription": "sub_1OxYz2eZvKYlo2C"
        })
    }

    fn subscription(status: &str) -> Value {
        json!({
            "id": "sub_1OxYz2eZvKYlo2C",
            "object": "subscription",
            "automatic_tax": { "enabled": false, "liability": null },
            "billing_cycle_anchor": 1700000000,
            "cancel_at_period_end": false,
            "created": 1700000000,
            "currency": "usd",
            "current_period_end": 1702592000,
            "current_period_start": 1700000000,
            "customer": "cus_PmQx7",
            "items": {
                "object": "list",
                "data": [],
                "has_more": false,
                "url": "/v1/subscription_items?subscription=sub_1OxYz2eZvKYlo2C"
            },
            "livemode": false,
            "metadata": {},
            "start_date": 1700000000,
            "status": status
        })
    }

    #[test]
    fn completed_checkout_names_user_and_customer() {
        let user_id = Uuid::new_v4();
        let event = stripe_event(
            "checkout.session.completed",
            checkout_session(json!(user_id.to_string()), json!("cus_PmQx7")),
        );
        assert_eq!(
            classify_event(event),
            BillingEvent::CheckoutCompleted {
                user_id,
                customer_id: "cus_PmQx7".to_string(),
            }
        );
    }

    #[test]
    fn checkout_without_user_or_customer_is_ignored() {
        let event = stripe_event(
            "checkout.session.completed",
            checkout_session(json!("not-a-user-id"), json!("cus_PmQx7")),
        );
        assert!(matches!(classify_event(event), BillingEvent::Ignored(_)));

        let event = stripe_event(
            "checkout.session.completed",
            checkout_session(json!(Uuid::new_v4().to_string()), Value::Null),
        );
        assert!(matches!(classify_event(event), BillingEvent::Ignored(_)));
    }

    #[test]
    fn subscription_events_carry_customer_status_and_period_end() {
        for (event_type, status) in [
            ("customer.subscription.updated", "past_due"),
            ("customer.subscription.deleted", "canceled"),
        ] {
            let event = stripe_event(event_type, subscription(status));
            assert_eq!(
                classify_event(event),
                BillingEvent::SubscriptionChanged {
                    customer_id: "cus_PmQx7".to_string(),
                    status: status.to_string(),
                    current_period_end: 1702592000,
                }
            );
        }
    }

    #[test]
    fn unrelated_events_fall_through() {
        let event = stripe_event("customer.subscription.trial_will_end", subscription("trialing"));
        assert_eq!(
            classify_event(event),
            BillingEvent::Ignored("customer.subscription.trial_will_end".to_string())
        );
    }
}
