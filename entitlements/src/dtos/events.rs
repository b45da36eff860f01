use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Attribution event logged against a subscriber (`POST /subscribers/{id}/attribution`).
#[derive(Debug, Clone, Serialize)]
pub struct AttributionEvent {
    pub event: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
}

impl AttributionEvent {
    pub fn new(event: &str) -> Self {
        AttributionEvent {
            event: event.to_string(),
            occurred_at: Utc::now(),
            properties: HashMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

/// Local billing change pushed to the provider (`POST /subscribers/{id}`).
#[derive(Debug, Clone, Serialize)]
pub struct BillingChange {
    pub subscription_status: String,
    /// Epoch seconds.
    pub current_period_end: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_customer_id: Option<String>,
    pub source: &'static str,
}

impl BillingChange {
    pub fn web_billing(status: &str, current_period_end: i64, customer_id: Option<String>) -> Self {
        BillingChange {
            subscription_status: status.to_string(),
            current_period_end,
            billing_customer_id: customer_id,
            source: "web_billing",
        }
    }
}
