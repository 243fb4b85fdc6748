//! Driving port for uploading episode actions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{EpisodeActionSubmission, Error, UrlRewrite, UserId};

/// A batch of episode actions from one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEpisodeActionsRequest {
    /// Authenticated owner.
    pub user_id: UserId,
    /// Actions as submitted.
    pub actions: Vec<EpisodeActionSubmission>,
}

/// Result of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEpisodeActionsResponse {
    /// Time the upload was processed.
    pub timestamp: DateTime<Utc>,
    /// URLs the server rewrote while canonicalising.
    pub update_urls: Vec<UrlRewrite>,
}

/// Domain use-case port for recording episode actions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EpisodeActionCommand: Send + Sync {
    /// Validate the whole batch, then merge it into the user's journal.
    async fn upload(
        &self,
        request: UploadEpisodeActionsRequest,
    ) -> Result<UploadEpisodeActionsResponse, Error>;
}

/// Fixture command that accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureEpisodeActionCommand;

#[async_trait]
impl EpisodeActionCommand for FixtureEpisodeActionCommand {
    async fn upload(
        &self,
        _request: UploadEpisodeActionsRequest,
    ) -> Result<UploadEpisodeActionsResponse, Error> {
        Ok(UploadEpisodeActionsResponse {
            timestamp: Utc::now(),
            update_urls: Vec::new(),
        })
    }
}
