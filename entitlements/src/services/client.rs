use async_trait::async_trait;
use chrono::Utc;
use common::{
    env_config::EntitlementConfig,
    error::{AppError, Res},
};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use url::Url;

use crate::{
    dtos::{
        events::{AttributionEvent, BillingChange},
        subscriber::SubscriberResponse,
    },
    models::subscriber::Subscriber,
    source::EntitlementSource,
};

/// Stateless client of the entitlement provider REST API.
///
/// Constructed from injected configuration; a missing API key disables the
/// integration instead of failing.
#[derive(Clone)]
pub struct EntitlementClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl EntitlementClient {
    pub fn new(config: &EntitlementConfig) -> Res<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        if config.api_key.is_none() {
            warn!("ENTITLEMENTS_API_KEY is not set, entitlement lookups are disabled");
        }
        Ok(EntitlementClient {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, segments: &[&str]) -> Res<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            AppError::Internal(format!(
                "Invalid entitlement base URL {}: {}",
                self.base_url, e
            ))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                AppError::Internal(format!(
                    "Entitlement base URL {} cannot take a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Fetches the subscriber snapshot.
    ///
    /// A 404 maps to `None`; any other non-success status is an error for the caller.
    pub async fn get_subscriber(&self, user_id: &str) -> Res<Option<Subscriber>> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(
                "Entitlement provider is not configured, subscriber {} treated as absent",
                user_id
            );
            return Ok(None);
        };

        let url = self.endpoint(&["subscribers", user_id])?;
        debug!("Fetching subscriber {} from {}", user_id, url);

        let response = self.client.get(url).bearer_auth(api_key).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Subscriber {} not found at entitlement provider", user_id);
                Ok(None)
            }
            status if status.is_success() => {
                let body = response.json::<SubscriberResponse>().await?;
                let subscriber = body
                    .into_subscriber(user_id, Utc::now())
                    .map_err(AppError::Upstream)?;
                Ok(Some(subscriber))
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(AppError::Upstream(format!(
                    "Entitlement provider returned {} for {}: {}",
                    status, user_id, message
                )))
            }
        }
    }

    /// Logs an attribution event. Best-effort: failures are only logged.
    pub async fn record_attribution(&self, user_id: &str, event: &AttributionEvent) {
        match self
            .post_json(&["subscribers", user_id, "attribution"], event)
            .await
        {
            Ok(true) => debug!("Recorded '{}' for {}", event.event, user_id),
            Ok(false) => {}
            Err(e) => warn!(
                "Failed to record attribution event '{}' for {}: {}",
                event.event, user_id, e
            ),
        }
    }

    /// Mirrors a local billing change into the provider. Best-effort: failures are only logged.
    pub async fn sync_billing_change(&self, user_id: &str, change: &BillingChange) {
        match self.post_json(&["subscribers", user_id], change).await {
            Ok(true) => info!(
                "Synced billing status '{}' of {} to entitlement provider",
                change.subscription_status, user_id
            ),
            Ok(false) => {}
            Err(e) => warn!("Failed to sync billing change of {}: {}", user_id, e),
        }
    }

    /// Returns `Ok(false)` when the integration is disabled and nothing was sent.
    async fn post_json<T: Serialize>(&self, segments: &[&str], body: &T) -> Res<bool> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(
                "Entitlement provider is not configured, skipping POST /{}",
                segments.join("/")
            );
            return Ok(false);
        };

        let url = self.endpoint(segments)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("{}: {}", status, message)));
        }
        Ok(true)
    }
}

#[async_trait]
impl EntitlementSource for EntitlementClient {
    async fn get_subscriber(&self, user_id: &str) -> Res<Option<Subscriber>> {
        EntitlementClient::get_subscriber(self, user_id).await
    }
}
