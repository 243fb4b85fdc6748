//! Port for the per-user episode action journal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AppendOutcome, DeviceUid, EpisodeAction, PodcastId, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by episode journal adapters.
    pub enum EpisodeActionRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "episode journal connection failed: {message}",
        /// Query or insert failed during execution.
        Query { message: String } =>
            "episode journal query failed: {message}",
    }
}

/// Optional restrictions applied when reading the journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeActionFilter {
    /// Only actions on episodes of this podcast.
    pub podcast: Option<PodcastId>,
    /// Only actions reported by this device.
    pub device: Option<DeviceUid>,
    /// Only actions with `timestamp > since`.
    pub since: Option<DateTime<Utc>>,
}

/// Read and append access to the episode journal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EpisodeActionRepository: Send + Sync {
    /// Journal entries of `user` matching `filter`, oldest first.
    async fn list(
        &self,
        user: &UserId,
        filter: &EpisodeActionFilter,
    ) -> Result<Vec<EpisodeAction>, EpisodeActionRepositoryError>;

    /// Append `actions` atomically. Exact duplicates of stored entries are
    /// absorbed. Devices named by the actions must already exist.
    async fn append(
        &self,
        user: &UserId,
        actions: &[EpisodeAction],
    ) -> Result<AppendOutcome, EpisodeActionRepositoryError>;
}

/// Fixture journal that is always empty and accepts every append.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureEpisodeActionRepository;

#[async_trait]
impl EpisodeActionRepository for FixtureEpisodeActionRepository {
    async fn list(
        &self,
        _user: &UserId,
        _filter: &EpisodeActionFilter,
    ) -> Result<Vec<EpisodeAction>, EpisodeActionRepositoryError> {
        Ok(Vec::new())
    }

    async fn append(
        &self,
        _user: &UserId,
        actions: &[EpisodeAction],
    ) -> Result<AppendOutcome, EpisodeActionRepositoryError> {
        Ok(AppendOutcome {
            inserted: actions.len(),
            absorbed: 0,
        })
    }
}
