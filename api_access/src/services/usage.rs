use chrono::{DateTime, Duration, NaiveTime, Utc};
use common::env_config::UsageLimits;
use serde::Serialize;

use crate::models::status::ReconciledStatus;

/// Messages a user sent since the start of the current UTC day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounts {
    pub messages: u32,
    pub voice_messages: u32,
}

/// One metered feature. `limit` and `remaining` are absent when unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureUsage {
    pub used: u32,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub at_limit: bool,
}

impl FeatureUsage {
    fn metered(used: u32, limit: u32) -> Self {
        FeatureUsage {
            used,
            limit: Some(limit),
            remaining: Some(limit.saturating_sub(used)),
            at_limit: used >= limit,
        }
    }

    fn unlimited(used: u32) -> Self {
        FeatureUsage {
            used,
            limit: None,
            remaining: None,
            at_limit: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Premium,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub plan: Plan,
    pub messages: FeatureUsage,
    pub voice_messages: FeatureUsage,
    pub resets_at: DateTime<Utc>,
}

/// Renders counts against the free limits. Enforces nothing.
pub fn present_usage(
    status: &ReconciledStatus,
    counts: UsageCounts,
    limits: &UsageLimits,
    now: DateTime<Utc>,
) -> UsageSummary {
    let resets_at = next_midnight(now);
    if status.has_active_subscription {
        return UsageSummary {
            plan: Plan::Premium,
            messages: FeatureUsage::unlimited(counts.messages),
            voice_messages: FeatureUsage::unlimited(counts.voice_messages),
            resets_at,
        };
    }

    UsageSummary {
        plan: Plan::Free,
        messages: FeatureUsage::metered(counts.messages, limits.free_daily_messages),
        voice_messages: FeatureUsage::metered(
            counts.voice_messages,
            limits.free_daily_voice_messages,
        ),
        resets_at,
    }
}

pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(now) + Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn free_plan_is_metered() {
        let summary = present_usage(
            &ReconciledStatus::inactive(),
            UsageCounts {
                messages: 7,
                voice_messages: 3,
            },
            &UsageLimits::default(),
            at("2025-06-01T15:30:00Z"),
        );
        assert_eq!(summary.plan, Plan::Free);
        assert_eq!(
            summary.messages,
            FeatureUsage {
                used: 7,
                limit: Some(20),
                remaining: Some(13),
                at_limit: false,
            }
        );
        assert!(summary.voice_messages.at_limit);
        assert_eq!(summary.voice_messages.remaining, Some(0));
        assert_eq!(summary.resets_at, at("2025-06-02T00:00:00Z"));
    }

    #[test]
    fn overshoot_never_goes_negative() {
        let summary = present_usage(
            &ReconciledStatus::inactive(),
            UsageCounts {
                messages: 25,
                voice_messages: 0,
            },
            &UsageLimits::default(),
            at("2025-06-01T00:00:00Z"),
        );
        assert_eq!(summary.messages.remaining, Some(0));
        assert!(summary.messages.at_limit);
    }

    #[test]
    fn premium_is_unlimited() {
        let summary = present_usage(
            &ReconciledStatus::fallback(None),
            UsageCounts {
                messages: 500,
                voice_messages: 40,
            },
            &UsageLimits::default(),
            at("2025-06-01T23:59:59Z"),
        );
        assert_eq!(summary.plan, Plan::Premium);
        assert_eq!(summary.messages.limit, None);
        assert!(!summary.voice_messages.at_limit);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["plan"], "premium");
        assert!(json["messages"]["limit"].is_null());
    }

    #[test]
    fn day_boundaries_are_utc() {
        assert_eq!(
            start_of_day(at("2025-06-01T23:59:59+02:00")),
            at("2025-06-01T00:00:00Z")
        );
        assert_eq!(
            next_midnight(at("2025-12-31T10:00:00Z")),
            at("2026-01-01T00:00:00Z")
        );
    }
}
