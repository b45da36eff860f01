use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Normal,
    Trial,
    Promotional,
}

impl PeriodType {
    /// Maps the provider's period names; introductory pricing counts as promotional.
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "trial" => PeriodType::Trial,
            "intro" | "promotional" | "prepaid" => PeriodType::Promotional,
            _ => PeriodType::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Store {
    AppStore,
    PlayStore,
    WebBilling,
    Promotional,
}

impl Store {
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "app_store" | "mac_app_store" => Store::AppStore,
            "play_store" => Store::PlayStore,
            "promotional" => Store::Promotional,
            // stripe, rc_billing, paddle, ...
            _ => Store::WebBilling,
        }
    }
}

/// A named grant of access. Snapshot of a single fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entitlement {
    pub entitlement_name: String,
    pub product_id: String,
    pub is_active: bool,
    pub will_renew: bool,
    pub first_purchase_at: DateTime<Utc>,
    pub last_purchase_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub period_type: PeriodType,
    pub store: Store,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscriber {
    pub user_id: String,
    pub entitlements: HashMap<String, Entitlement>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub management_url: Option<String>,
}

impl Subscriber {
    pub fn entitlement(&self, name: &str) -> Option<&Entitlement> {
        self.entitlements.get(name)
    }

    pub fn active_entitlement(&self, name: &str) -> Option<&Entitlement> {
        self.entitlement(name).filter(|e| e.is_active)
    }
}
