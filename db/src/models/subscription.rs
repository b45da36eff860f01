use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Row of the `subscriptions` table, one per user.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SubscriptionRow {
    pub user_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub subscription_status: String,
    /// Epoch seconds.
    pub current_period_end: i64,
    pub updated_at: DateTime<Utc>,
}
