use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Funnel event reported by the client, e.g. `paywall_viewed`.
#[derive(Debug, Deserialize)]
pub struct AttributionRequest {
    pub event: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}
