//! Driving port for reading the episode journal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{DeviceUid, EpisodeAction, Error, UserId};

/// Journal query with optional filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeActionsRequest {
    /// Authenticated owner.
    pub user_id: UserId,
    /// Only this podcast (raw URL, canonicalised by the service).
    pub podcast: Option<String>,
    /// Only this device; must exist.
    pub device: Option<DeviceUid>,
    /// Only actions after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Keep only the newest action per episode.
    pub aggregated: bool,
}

/// Journal entries plus the watermark for the next query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeActionsResponse {
    /// Matching actions, oldest first.
    pub actions: Vec<EpisodeAction>,
    /// Time of the query.
    pub timestamp: DateTime<Utc>,
}

/// Domain use-case port for reading episode actions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EpisodeActionQuery: Send + Sync {
    /// List the user's episode actions.
    async fn list(&self, request: EpisodeActionsRequest) -> Result<EpisodeActionsResponse, Error>;
}

/// Fixture query with an empty journal.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureEpisodeActionQuery;

#[async_trait]
impl EpisodeActionQuery for FixtureEpisodeActionQuery {
    async fn list(&self, _request: EpisodeActionsRequest) -> Result<EpisodeActionsResponse, Error> {
        Ok(EpisodeActionsResponse {
            actions: Vec::new(),
            timestamp: Utc::now(),
        })
    }
}
