//! Driving port for uploading subscription changes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{DeviceUid, Error, UrlRewrite, UserId};

/// Subscription changes reported by one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySubscriptionChangesRequest {
    /// Authenticated owner.
    pub user_id: UserId,
    /// Reporting device; created on first use.
    pub device: DeviceUid,
    /// Feed URLs the device subscribed to, as sent.
    pub add: Vec<String>,
    /// Feed URLs the device unsubscribed from, as sent.
    pub remove: Vec<String>,
}

/// Result of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySubscriptionChangesResponse {
    /// Time the changes were recorded at; the client's next `since`.
    pub timestamp: DateTime<Utc>,
    /// URLs the server rewrote while canonicalising.
    pub update_urls: Vec<UrlRewrite>,
}

/// Domain use-case port for recording subscription changes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionCommand: Send + Sync {
    /// Validate, canonicalise and append the reported changes.
    async fn apply_changes(
        &self,
        request: ApplySubscriptionChangesRequest,
    ) -> Result<ApplySubscriptionChangesResponse, Error>;
}

/// Fixture command that accepts everything without rewriting.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSubscriptionCommand;

#[async_trait]
impl SubscriptionCommand for FixtureSubscriptionCommand {
    async fn apply_changes(
        &self,
        _request: ApplySubscriptionChangesRequest,
    ) -> Result<ApplySubscriptionChangesResponse, Error> {
        Ok(ApplySubscriptionChangesResponse {
            timestamp: Utc::now(),
            update_urls: Vec::new(),
        })
    }
}
