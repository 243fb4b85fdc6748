//! Subscription upload and delta feed.
//!
//! Uploads are validated, canonicalised and appended to the reporting
//! device's log in one batch. Delta reads first pull the device level with its
//! sync group, then fold the log window `(since, now]` into add/remove lists.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::info;

use crate::domain::ports::{
    ApplySubscriptionChangesRequest, ApplySubscriptionChangesResponse, DeviceRepository,
    PodcastRepository, SanitizingRuleRepository, SubscriptionActionRepository,
    SubscriptionChangesRequest, SubscriptionCommand, SubscriptionQuery,
};
use crate::domain::service_support::{map_device_error, map_subscription_log_error};
use crate::domain::{
    CanonicalUrl, Error, NewSubscriptionAction, PodcastService, RetryPolicy,
    SubscriptionActionKind, SubscriptionChanges, SyncService, UrlKind, UrlRewrite, UrlSanitizer,
    fold_window,
};

/// Subscription service implementing the subscription driving ports.
#[derive(Clone)]
pub struct SubscriptionService<S, D, P, R> {
    log: Arc<S>,
    devices: Arc<D>,
    podcasts: PodcastService<P, R>,
    sync: SyncService<S, D>,
    clock: Arc<dyn Clock>,
}

impl<S, D, P, R> SubscriptionService<S, D, P, R> {
    /// Create a new service with the given repositories.
    pub fn new(
        log: Arc<S>,
        devices: Arc<D>,
        podcasts: PodcastService<P, R>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        let sync = SyncService::new(log.clone(), devices.clone(), clock.clone(), retry);
        Self {
            log,
            devices,
            podcasts,
            sync,
            clock,
        }
    }
}

impl<S, D, P, R> SubscriptionService<S, D, P, R>
where
    S: SubscriptionActionRepository,
    D: DeviceRepository,
    P: PodcastRepository,
    R: SanitizingRuleRepository,
{
    fn reject_overlap(request: &ApplySubscriptionChangesRequest) -> Result<(), Error> {
        let removed: HashSet<&str> = request.remove.iter().map(String::as_str).collect();
        let overlap: BTreeSet<&str> = request
            .add
            .iter()
            .map(String::as_str)
            .filter(|url| removed.contains(url))
            .collect();
        if overlap.is_empty() {
            return Ok(());
        }
        Err(
            Error::invalid_request("the same URL cannot be added and removed in one request")
                .with_details(json!({ "code": "add_remove_overlap", "urls": overlap })),
        )
    }

    fn canonicalise(
        sanitizer: &UrlSanitizer,
        urls: &[String],
        rewrites: &mut Vec<UrlRewrite>,
    ) -> BTreeSet<CanonicalUrl> {
        urls.iter()
            .filter_map(|raw| sanitizer.sanitize_tracked(raw, UrlKind::Podcast, rewrites))
            .collect()
    }
}

#[async_trait]
impl<S, D, P, R> SubscriptionCommand for SubscriptionService<S, D, P, R>
where
    S: SubscriptionActionRepository,
    D: DeviceRepository,
    P: PodcastRepository,
    R: SanitizingRuleRepository,
{
    async fn apply_changes(
        &self,
        request: ApplySubscriptionChangesRequest,
    ) -> Result<ApplySubscriptionChangesResponse, Error> {
        Self::reject_overlap(&request)?;

        let sanitizer = self.podcasts.sanitizer().await?;
        let mut update_urls = Vec::new();
        let add = Self::canonicalise(&sanitizer, &request.add, &mut update_urls);
        let mut remove = Self::canonicalise(&sanitizer, &request.remove, &mut update_urls);
        // Two spellings of one feed may land on both sides; the add wins.
        remove.retain(|url| !add.contains(url));

        let device = self
            .devices
            .ensure(&request.user_id, &request.device)
            .await
            .map_err(map_device_error)?;
        let timestamp = self.clock.utc();

        let changes = add
            .iter()
            .map(|url| (url, SubscriptionActionKind::Subscribe))
            .chain(
                remove
                    .iter()
                    .map(|url| (url, SubscriptionActionKind::Unsubscribe)),
            );
        let mut actions = Vec::with_capacity(add.len() + remove.len());
        for (url, kind) in changes {
            let podcast = self.podcasts.resolve(url).await?;
            actions.push(NewSubscriptionAction {
                device: device.id,
                podcast: podcast.id,
                kind,
                timestamp,
            });
        }

        if !actions.is_empty() {
            let outcome = self
                .log
                .append(&actions)
                .await
                .map_err(map_subscription_log_error)?;
            info!(
                device = %device.uid,
                inserted = outcome.inserted,
                absorbed = outcome.absorbed,
                "recorded subscription changes"
            );
        }

        Ok(ApplySubscriptionChangesResponse {
            timestamp,
            update_urls,
        })
    }
}

#[async_trait]
impl<S, D, P, R> SubscriptionQuery for SubscriptionService<S, D, P, R>
where
    S: SubscriptionActionRepository,
    D: DeviceRepository,
    P: PodcastRepository,
    R: SanitizingRuleRepository,
{
    async fn changes(
        &self,
        request: SubscriptionChangesRequest,
    ) -> Result<SubscriptionChanges, Error> {
        let device = self
            .devices
            .find(&request.user_id, &request.device)
            .await
            .map_err(map_device_error)?
            .ok_or_else(|| Error::not_found(format!("device {} not found", request.device)))?;

        if device.is_grouped() {
            self.sync.catch_up(&device).await?;
        }

        let until = self.clock.utc();
        let window = self
            .log
            .list_window(&device.id, request.since, until)
            .await
            .map_err(map_subscription_log_error)?;
        Ok(fold_window(window, until))
    }
}

#[cfg(test)]
#[path = "subscription_service_tests.rs"]
mod tests;
