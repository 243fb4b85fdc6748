//! Port for the append-only subscription action log.
//!
//! Adapters only ever insert rows. Appends are all-or-nothing per call, and a
//! row colliding with an existing `(device, podcast, timestamp)` entry is
//! absorbed and counted in [`AppendOutcome::absorbed`] instead of failing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AppendOutcome, DeviceId, NewSubscriptionAction, PodcastId, SubscriptionAction,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by subscription log adapters.
    pub enum SubscriptionActionRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "subscription log connection failed: {message}",
        /// Query or insert failed during execution.
        Query { message: String } =>
            "subscription log query failed: {message}",
    }
}

/// Read and append access to the subscription log.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionActionRepository: Send + Sync {
    /// Every entry recorded for `device`, optionally restricted to one
    /// podcast. Order is unspecified.
    async fn list_for_device(
        &self,
        device: &DeviceId,
        podcast: Option<PodcastId>,
    ) -> Result<Vec<SubscriptionAction>, SubscriptionActionRepositoryError>;

    /// Entries for `device` with `since < timestamp <= until`.
    async fn list_window(
        &self,
        device: &DeviceId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionAction>, SubscriptionActionRepositoryError>;

    /// Append `actions` atomically.
    async fn append(
        &self,
        actions: &[NewSubscriptionAction],
    ) -> Result<AppendOutcome, SubscriptionActionRepositoryError>;
}

/// Fixture log that is always empty and accepts every append.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSubscriptionActionRepository;

#[async_trait]
impl SubscriptionActionRepository for FixtureSubscriptionActionRepository {
    async fn list_for_device(
        &self,
        _device: &DeviceId,
        _podcast: Option<PodcastId>,
    ) -> Result<Vec<SubscriptionAction>, SubscriptionActionRepositoryError> {
        Ok(Vec::new())
    }

    async fn list_window(
        &self,
        _device: &DeviceId,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionAction>, SubscriptionActionRepositoryError> {
        Ok(Vec::new())
    }

    async fn append(
        &self,
        actions: &[NewSubscriptionAction],
    ) -> Result<AppendOutcome, SubscriptionActionRepositoryError> {
        Ok(AppendOutcome {
            inserted: actions.len(),
            absorbed: 0,
        })
    }
}
