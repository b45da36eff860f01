use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::Res;
use db::{
    dtos::subscription::SubscriptionStatusUpdate,
    models::{message::MessageKind, subscription::SubscriptionRow},
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::status::LocalSubscriptionRecord, services::usage::UsageCounts};

/// Read side of the local billing table.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn subscription_for(&self, user_id: Uuid) -> Res<Option<LocalSubscriptionRecord>>;
}

/// Write side of the local billing table, used by the billing webhook only.
#[async_trait]
pub trait BillingLedger: Send + Sync {
    async fn link_customer(&self, user_id: Uuid, customer_id: &str) -> Res<()>;

    /// Returns the updated row, `None` when no user owns the customer.
    async fn update_status(&self, update: SubscriptionStatusUpdate)
    -> Res<Option<SubscriptionRow>>;
}

/// Counts the metered actions of a user.
#[async_trait]
pub trait UsageCounter: Send + Sync {
    async fn counts_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Res<UsageCounts>;
}

#[derive(Clone)]
pub struct PgBillingStore {
    pool: Arc<PgPool>,
}

impl PgBillingStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        PgBillingStore { pool }
    }
}

#[async_trait]
impl BillingStore for PgBillingStore {
    async fn subscription_for(&self, user_id: Uuid) -> Res<Option<LocalSubscriptionRecord>> {
        let row = db::subscription::get_subscription_by_user_id(self.pool.as_ref(), user_id).await?;
        Ok(row.map(LocalSubscriptionRecord::from))
    }
}

#[async_trait]
impl BillingLedger for PgBillingStore {
    async fn link_customer(&self, user_id: Uuid, customer_id: &str) -> Res<()> {
        db::subscription::link_customer(self.pool.as_ref(), user_id, customer_id).await?;
        Ok(())
    }

    async fn update_status(
        &self,
        update: SubscriptionStatusUpdate,
    ) -> Res<Option<SubscriptionRow>> {
        db::subscription::update_status_by_customer(self.pool.as_ref(), update).await
    }
}

#[async_trait]
impl UsageCounter for PgBillingStore {
    async fn counts_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Res<UsageCounts> {
        let pool = self.pool.as_ref();
        let messages =
            db::message::count_messages_since(pool, user_id, MessageKind::Text, since).await?;
        let voice_messages =
            db::message::count_messages_since(pool, user_id, MessageKind::Voice, since).await?;
        Ok(UsageCounts {
            messages: u32::try_from(messages).unwrap_or(u32::MAX),
            voice_messages: u32::try_from(voice_messages).unwrap_or(u32::MAX),
        })
    }
}
