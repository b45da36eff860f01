use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use serde::Deserialize;

use crate::models::subscriber::{Entitlement, PeriodType, Store, Subscriber};

/// Body of `GET /subscribers/{id}`.
#[derive(Debug, Deserialize)]
pub struct SubscriberResponse {
    pub subscriber: SubscriberBody,
}

#[derive(Debug, Deserialize)]
pub struct SubscriberBody {
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
    pub management_url: Option<String>,
    #[serde(default)]
    pub entitlements: HashMap<String, EntitlementBody>,
    #[serde(default)]
    pub subscriptions: HashMap<String, SubscriptionBody>,
}

#[derive(Debug, Deserialize)]
pub struct EntitlementBody {
    #[serde(default)]
    pub product_identifier: String,
    pub purchase_date: Option<String>,
    pub original_purchase_date: Option<String>,
    pub expires_date: Option<String>,
    pub is_active: Option<bool>,
    pub will_renew: Option<bool>,
    pub period_type: Option<String>,
    pub store: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionBody {
    pub period_type: Option<String>,
    pub store: Option<String>,
    pub purchase_date: Option<String>,
    pub original_purchase_date: Option<String>,
    pub unsubscribe_detected_at: Option<String>,
    pub billing_issues_detected_at: Option<String>,
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("Invalid timestamp '{}'", value))
}

fn parse_optional(value: Option<&String>) -> Result<Option<DateTime<Utc>>, String> {
    value.map(|v| parse_timestamp(v)).transpose()
}

impl SubscriberResponse {
    /// Converts the wire shape into the domain snapshot.
    ///
    /// `now` decides activity of entitlements that carry no explicit `is_active` flag.
    /// An entitlement that does not parse is logged and left out; only a broken
    /// subscriber header fails the whole snapshot.
    pub fn into_subscriber(self, user_id: &str, now: DateTime<Utc>) -> Result<Subscriber, String> {
        let body = self.subscriber;

        let first_seen_at = parse_optional(body.first_seen.as_ref())?
            .ok_or_else(|| "Subscriber is missing first_seen".to_string())?;
        let last_seen_at = parse_optional(body.last_seen.as_ref())?.unwrap_or(first_seen_at);

        let mut entitlements = HashMap::with_capacity(body.entitlements.len());
        for (name, raw) in body.entitlements {
            let subscription = body.subscriptions.get(&raw.product_identifier);
            match raw.into_entitlement(&name, subscription, first_seen_at, now) {
                Ok(entitlement) => {
                    entitlements.insert(name, entitlement);
                }
                Err(e) => warn!(
                    "Skipping entitlement '{}' of subscriber {}: {}",
                    name, user_id, e
                ),
            }
        }

        Ok(Subscriber {
            user_id: user_id.to_string(),
            entitlements,
            first_seen_at,
            last_seen_at,
            management_url: body.management_url,
        })
    }
}

impl EntitlementBody {
    fn into_entitlement(
        self,
        name: &str,
        subscription: Option<&SubscriptionBody>,
        first_seen_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Entitlement, String> {
        let expires_at = parse_optional(self.expires_date.as_ref())?;

        // lifetime grants carry no expiry
        let is_active = self
            .is_active
            .unwrap_or_else(|| expires_at.is_none_or(|exp| exp > now));

        let will_renew = self.will_renew.unwrap_or_else(|| match subscription {
            Some(sub) => {
                sub.unsubscribe_detected_at.is_none()
                    && sub.billing_issues_detected_at.is_none()
                    && expires_at.is_some()
            }
            None => false,
        });

        let last_purchase_at = parse_optional(
            self.purchase_date
                .as_ref()
                .or(subscription.and_then(|s| s.purchase_date.as_ref())),
        )?
        .unwrap_or(first_seen_at);
        let first_purchase_at = parse_optional(
            self.original_purchase_date
                .as_ref()
                .or(subscription.and_then(|s| s.original_purchase_date.as_ref())),
        )?
        .unwrap_or(last_purchase_at);

        let period_type = self
            .period_type
            .as_deref()
            .or(subscription.and_then(|s| s.period_type.as_deref()))
            .map(PeriodType::from_wire)
            .unwrap_or(PeriodType::Normal);
        let store = self
            .store
            .as_deref()
            .or(subscription.and_then(|s| s.store.as_deref()))
            .map(Store::from_wire)
            .unwrap_or(Store::WebBilling);

        Ok(Entitlement {
            entitlement_name: name.to_string(),
            product_id: self.product_identifier,
            is_active,
            will_renew,
            first_purchase_at,
            last_purchase_at,
            expires_at,
            period_type,
            store,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        parse_timestamp("2025-06-01T00:00:00Z").unwrap()
    }

    fn parse(body: &str) -> Subscriber {
        serde_json::from_str::<SubscriberResponse>(body)
            .unwrap()
            .into_subscriber("user-1", now())
            .unwrap()
    }

    #[test]
    fn explicit_flags_win() {
        let subscriber = parse(
            r#"{"subscriber": {
                "first_seen": "2024-01-05T10:00:00Z",
                "entitlements": {"premium": {"is_active": true, "expires_date": "2025-12-01"}}
            }}"#,
        );
        let premium = subscriber.active_entitlement("premium").unwrap();
        assert_eq!(
            premium.expires_at,
            Some(parse_timestamp("2025-12-01T00:00:00Z").unwrap())
        );
        assert_eq!(subscriber.last_seen_at, subscriber.first_seen_at);
    }

    #[test]
    fn activity_and_renewal_derived_from_subscription_entry() {
        let subscriber = parse(
            r#"{"subscriber": {
                "first_seen": "2024-01-05T10:00:00Z",
                "last_seen": "2025-05-30T08:00:00Z",
                "management_url": "https://apps.apple.com/account/subscriptions",
                "entitlements": {
                    "premium": {
                        "product_identifier": "lingua_monthly",
                        "purchase_date": "2025-05-10T00:00:00Z",
                        "expires_date": "2025-06-10T00:00:00Z"
                    },
                    "tutor_pack": {
                        "product_identifier": "tutor_pack",
                        "purchase_date": "2025-01-01T00:00:00Z",
                        "expires_date": "2025-02-01T00:00:00Z"
                    }
                },
                "subscriptions": {
                    "lingua_monthly": {
                        "period_type": "trial",
                        "store": "app_store",
                        "original_purchase_date": "2025-04-10T00:00:00Z",
                        "unsubscribe_detected_at": null,
                        "billing_issues_detected_at": null
                    }
                }
            }}"#,
        );

        let premium = subscriber.entitlement("premium").unwrap();
        assert!(premium.is_active);
        assert!(premium.will_renew);
        assert_eq!(premium.period_type, PeriodType::Trial);
        assert_eq!(premium.store, Store::AppStore);
        assert_eq!(
            premium.first_purchase_at,
            parse_timestamp("2025-04-10T00:00:00Z").unwrap()
        );

        let expired = subscriber.entitlement("tutor_pack").unwrap();
        assert!(!expired.is_active);
        assert!(subscriber.active_entitlement("tutor_pack").is_none());
    }

    #[test]
    fn lifetime_grant_is_active() {
        let subscriber = parse(
            r#"{"subscriber": {
                "first_seen": "2024-01-05T10:00:00Z",
                "entitlements": {"premium": {"product_identifier": "lifetime", "store": "promotional"}}
            }}"#,
        );
        let premium = subscriber.active_entitlement("premium").unwrap();
        assert_eq!(premium.store, Store::Promotional);
        assert!(!premium.will_renew);
    }

    #[test]
    fn malformed_dates_are_errors() {
        let res = serde_json::from_str::<SubscriberResponse>(
            r#"{"subscriber": {"first_seen": "yesterday"}}"#,
        )
        .unwrap()
        .into_subscriber("user-1", now());
        assert!(res.is_err());
    }

    #[test]
    fn malformed_entitlement_does_not_hide_the_others() {
        let subscriber = parse(
            r#"{"subscriber": {
                "first_seen": "2024-01-05T10:00:00Z",
                "entitlements": {
                    "premium": {"is_active": true, "expires_date": "2025-12-01T00:00:00Z"},
                    "tutor_pack": {"product_identifier": "tutor_pack", "expires_date": "not-a-date"}
                }
            }}"#,
        );
        assert!(subscriber.active_entitlement("premium").is_some());
        assert!(subscriber.entitlement("tutor_pack").is_none());
    }
}
