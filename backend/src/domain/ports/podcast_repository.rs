//! Port resolving canonical URLs to podcast records.

use async_trait::async_trait;

use crate::domain::{CanonicalUrl, Podcast, PodcastId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by podcast repository adapters.
    pub enum PodcastRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "podcast repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "podcast repository query failed: {message}",
        /// Another writer created the same URL first.
        DuplicateKey { url: String } =>
            "podcast {url} already exists",
    }
}

/// Rows removed by [`PodcastRepository::delete_with_dependents`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PodcastDeletion {
    /// Episode journal entries removed.
    pub episode_actions: usize,
    /// Subscription log entries removed.
    pub subscription_actions: usize,
    /// Whether the podcast row itself existed.
    pub podcast_removed: bool,
}

/// Podcast identity storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PodcastRepository: Send + Sync {
    /// Look a podcast up by canonical URL.
    async fn find_by_url(&self, url: &CanonicalUrl)
    -> Result<Option<Podcast>, PodcastRepositoryError>;

    /// Insert a podcast, failing with
    /// [`PodcastRepositoryError::DuplicateKey`] if the URL is already taken.
    async fn create(&self, url: &CanonicalUrl) -> Result<Podcast, PodcastRepositoryError>;

    /// Delete a podcast and everything referencing it in one transaction:
    /// episode actions first, then subscription actions, then the podcast.
    async fn delete_with_dependents(
        &self,
        podcast: &PodcastId,
    ) -> Result<PodcastDeletion, PodcastRepositoryError>;
}

/// Fixture repository that mints a fresh podcast for every URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePodcastRepository;

#[async_trait]
impl PodcastRepository for FixturePodcastRepository {
    async fn find_by_url(
        &self,
        _url: &CanonicalUrl,
    ) -> Result<Option<Podcast>, PodcastRepositoryError> {
        Ok(None)
    }

    async fn create(&self, url: &CanonicalUrl) -> Result<Podcast, PodcastRepositoryError> {
        Ok(Podcast {
            id: PodcastId::random(),
            url: url.clone(),
        })
    }

    async fn delete_with_dependents(
        &self,
        _podcast: &PodcastId,
    ) -> Result<PodcastDeletion, PodcastRepositoryError> {
        Ok(PodcastDeletion::default())
    }
}
