use chrono::{DateTime, Utc};
use db::models::subscription::SubscriptionRow;
use entitlements::models::subscriber::Entitlement;
use serde::Serialize;
use uuid::Uuid;

/// Status column of the local billing table.
///
/// Only `Active` and `Trialing` grant access; anything the billing provider
/// may add later (`past_due`, `unpaid`, ...) lands in `Other` and is inactive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingStatus {
    Active,
    Trialing,
    Canceled,
    Other(String),
}

impl BillingStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => BillingStatus::Active,
            "trialing" => BillingStatus::Trialing,
            "canceled" | "cancelled" => BillingStatus::Canceled,
            _ => BillingStatus::Other(value.to_string()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, BillingStatus::Active | BillingStatus::Trialing)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalSubscriptionRecord {
    pub user_id: Uuid,
    pub subscription_status: BillingStatus,
    /// Epoch seconds.
    pub current_period_end: i64,
}

impl LocalSubscriptionRecord {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.current_period_end, 0)
    }
}

impl From<SubscriptionRow> for LocalSubscriptionRecord {
    fn from(row: SubscriptionRow) -> Self {
        LocalSubscriptionRecord {
            user_id: row.user_id,
            subscription_status: BillingStatus::parse(&row.subscription_status),
            current_period_end: row.current_period_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessSource {
    PrimaryBilling,
    FallbackEntitlement,
    None,
}

/// The single access decision handed to callers. Recomputed on every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledStatus {
    pub has_active_subscription: bool,
    pub source: AccessSource,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ReconciledStatus {
    pub fn inactive() -> Self {
        ReconciledStatus {
            has_active_subscription: false,
            source: AccessSource::None,
            expires_at: None,
        }
    }

    pub fn primary(expires_at: Option<DateTime<Utc>>) -> Self {
        ReconciledStatus {
            has_active_subscription: true,
            source: AccessSource::PrimaryBilling,
            expires_at,
        }
    }

    pub fn fallback(expires_at: Option<DateTime<Utc>>) -> Self {
        ReconciledStatus {
            has_active_subscription: true,
            source: AccessSource::FallbackEntitlement,
            expires_at,
        }
    }
}

/// What a single upstream source told the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome<T> {
    Found(T),
    /// Confirmed absence: no row, unknown subscriber or entitlement.
    Absent,
    /// The source failed or timed out and was treated as absent.
    Degraded(String),
    /// Not consulted because an earlier source decided.
    Skipped,
}

impl<T> SourceOutcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SourceOutcome::Degraded(_))
    }
}

/// Decision plus the outcome of each source, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessReport {
    pub status: ReconciledStatus,
    pub primary: SourceOutcome<LocalSubscriptionRecord>,
    pub fallback: SourceOutcome<Entitlement>,
}

impl AccessReport {
    pub fn unauthenticated() -> Self {
        AccessReport {
            status: ReconciledStatus::inactive(),
            primary: SourceOutcome::Skipped,
            fallback: SourceOutcome::Skipped,
        }
    }

    /// True when the answer may under-report access because a source was unavailable.
    pub fn is_degraded(&self) -> bool {
        self.primary.is_degraded() || self.fallback.is_degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_and_trialing_grant_access() {
        assert!(BillingStatus::parse("active").is_active());
        assert!(BillingStatus::parse("Trialing").is_active());
        assert!(!BillingStatus::parse("canceled").is_active());
        assert_eq!(
            BillingStatus::parse("past_due"),
            BillingStatus::Other("past_due".to_string())
        );
        assert!(!BillingStatus::parse("past_due").is_active());
    }

    #[test]
    fn source_serializes_snake_case() {
        let json = serde_json::to_value(ReconciledStatus::primary(None)).unwrap();
        assert_eq!(json["source"], "primary_billing");
        assert_eq!(json["has_active_subscription"], true);
        let json = serde_json::to_value(ReconciledStatus::inactive()).unwrap();
        assert_eq!(json["source"], "none");
    }
}
