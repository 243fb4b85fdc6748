//! Driving port for the subscription delta feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{DeviceUid, Error, SubscriptionChanges, UserId};

/// Delta query for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChangesRequest {
    /// Authenticated owner.
    pub user_id: UserId,
    /// Device being caught up; must already exist.
    pub device: DeviceUid,
    /// Exclusive lower bound, normally the previous response's watermark.
    pub since: DateTime<Utc>,
}

/// Domain use-case port for reading subscription changes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionQuery: Send + Sync {
    /// Catch the device up with its group, then report what changed since
    /// `since`.
    async fn changes(&self, request: SubscriptionChangesRequest)
    -> Result<SubscriptionChanges, Error>;
}

/// Fixture query that never reports changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSubscriptionQuery;

#[async_trait]
impl SubscriptionQuery for FixtureSubscriptionQuery {
    async fn changes(
        &self,
        _request: SubscriptionChangesRequest,
    ) -> Result<SubscriptionChanges, Error> {
        Ok(SubscriptionChanges {
            add: Vec::new(),
            remove: Vec::new(),
            until: Utc::now(),
        })
    }
}
