use async_trait::async_trait;
use common::error::Res;

use crate::models::subscriber::Subscriber;

/// Read side of the entitlement provider, as seen by access reconciliation.
#[async_trait]
pub trait EntitlementSource: Send + Sync {
    /// `Ok(None)` when the provider does not know the user or the integration is disabled.
    async fn get_subscriber(&self, user_id: &str) -> Res<Option<Subscriber>>;
}
