//! Access reconciliation.
//!
//! Two independent sources know whether a user paid: the local billing table
//! (written by our own billing webhook) and the third-party entitlement
//! provider (which mirrors store purchases and may lag). The decision is a
//! priority fallback, never a vote:
//!
//! 1. an `active`/`trialing` billing row wins outright and the provider is not asked;
//! 2. otherwise an active entitlement at the provider grants access;
//! 3. otherwise there is no access.
//!
//! Upstream failures, timeouts and panics are absorbed here and reported as
//! [`SourceOutcome::Degraded`]; callers only ever see a [`ReconciledStatus`].

use std::{future::Future, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use common::error::Res;
use entitlements::EntitlementSource;
use futures::FutureExt;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::{
    models::status::{AccessReport, ReconciledStatus, SourceOutcome},
    store::BillingStore,
};

pub struct AccessResolver {
    billing: Arc<dyn BillingStore>,
    entitlements: Arc<dyn EntitlementSource>,
    entitlement_id: String,
    upstream_timeout: Duration,
}

impl AccessResolver {
    pub fn new(
        billing: Arc<dyn BillingStore>,
        entitlements: Arc<dyn EntitlementSource>,
        entitlement_id: impl Into<String>,
        upstream_timeout: Duration,
    ) -> Self {
        AccessResolver {
            billing,
            entitlements,
            entitlement_id: entitlement_id.into(),
            upstream_timeout,
        }
    }

    /// Decides whether `user_id` has active access. Never fails.
    ///
    /// `None` means the caller is not authenticated; no upstream call is made.
    pub async fn resolve_access(&self, user_id: Option<Uuid>) -> ReconciledStatus {
        self.resolve_access_report(user_id).await.status
    }

    pub async fn resolve_access_report(&self, user_id: Option<Uuid>) -> AccessReport {
        let Some(user_id) = user_id else {
            debug!("Access check without user context");
            return AccessReport::unauthenticated();
        };

        let primary = self
            .bounded("billing store", self.billing.subscription_for(user_id))
            .await;

        if let SourceOutcome::Found(record) = &primary {
            if record.subscription_status.is_active() {
                debug!(
                    "User {} has access through billing ({:?})",
                    user_id, record.subscription_status
                );
                return AccessReport {
                    status: ReconciledStatus::primary(record.expires_at()),
                    primary,
                    fallback: SourceOutcome::Skipped,
                };
            }
        }

        let subscriber_id = user_id.to_string();
        let fallback = match self
            .bounded(
                "entitlement provider",
                self.entitlements.get_subscriber(&subscriber_id),
            )
            .await
        {
            SourceOutcome::Found(subscriber) => {
                match subscriber.entitlement(&self.entitlement_id).cloned() {
                    Some(entitlement) => SourceOutcome::Found(entitlement),
                    None => SourceOutcome::Absent,
                }
            }
            SourceOutcome::Absent => SourceOutcome::Absent,
            SourceOutcome::Degraded(reason) => SourceOutcome::Degraded(reason),
            SourceOutcome::Skipped => SourceOutcome::Skipped,
        };

        let status = match &fallback {
            SourceOutcome::Found(entitlement) if entitlement.is_active => {
                info!(
                    "User {} has access through entitlement '{}' ({})",
                    user_id, self.entitlement_id, entitlement.product_id
                );
                ReconciledStatus::fallback(entitlement.expires_at)
            }
            _ => ReconciledStatus::inactive(),
        };

        let report = AccessReport {
            status,
            primary,
            fallback,
        };
        if report.is_degraded() && !report.status.has_active_subscription {
            warn!(
                "Access for {} resolved as inactive while a source was unavailable",
                user_id
            );
        }
        report
    }

    /// Runs one upstream lookup under the timeout, folding every failure into `Degraded`.
    async fn bounded<T, F>(&self, source: &str, lookup: F) -> SourceOutcome<T>
    where
        F: Future<Output = Res<Option<T>>>,
    {
        let guarded = AssertUnwindSafe(lookup).catch_unwind();
        match tokio::time::timeout(self.upstream_timeout, guarded).await {
            Ok(Ok(Ok(Some(value)))) => SourceOutcome::Found(value),
            Ok(Ok(Ok(None))) => SourceOutcome::Absent,
            Ok(Ok(Err(e))) => {
                warn!("{} unavailable, treating as absent: {}", source, e);
                SourceOutcome::Degraded(e.to_string())
            }
            Ok(Err(_)) => {
                warn!("{} lookup panicked, treating as absent", source);
                SourceOutcome::Degraded(format!("{} lookup panicked", source))
            }
            Err(_) => {
                warn!(
                    "{} did not answer within {:?}, treating as absent",
                    source, self.upstream_timeout
                );
                SourceOutcome::Degraded(format!(
                    "{} timed out after {:?}",
                    source, self.upstream_timeout
                ))
            }
        }
    }
}
