pub struct SubscriptionStatusUpdate {
    pub stripe_customer_id: String,
    pub subscription_status: String,
    pub current_period_end: i64,
}
