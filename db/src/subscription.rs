use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{dtos::subscription::SubscriptionStatusUpdate, models::subscription::SubscriptionRow};

pub async fn get_subscription_by_user_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<SubscriptionRow>> {
    sqlx::query_as::<_, SubscriptionRow>("SELECT * FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

/// Associates a billing customer with a user, creating the row if needed.
pub async fn link_customer<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    stripe_customer_id: &str,
) -> Res<SubscriptionRow> {
    sqlx::query_as::<_, SubscriptionRow>(
        r#"
        INSERT INTO subscriptions (user_id, stripe_customer_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE
            SET stripe_customer_id = EXCLUDED.stripe_customer_id,
                updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(stripe_customer_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Updates status and period end of the row owned by the given customer.
/// Returns `None` when no user is linked to that customer yet.
pub async fn update_status_by_customer<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: SubscriptionStatusUpdate,
) -> Res<Option<SubscriptionRow>> {
    sqlx::query_as::<_, SubscriptionRow>(
        r#"
        UPDATE subscriptions
        SET subscription_status = $1,
            current_period_end = $2,
            updated_at = NOW()
        WHERE stripe_customer_id = $3
        RETURNING *
        "#,
    )
    .bind(data.subscription_status)
    .bind(data.current_period_end)
    .bind(data.stripe_customer_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}
