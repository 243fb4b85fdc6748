//! Podcast identity service.
//!
//! Resolves canonical URLs to podcast records, creating them on first use,
//! and performs the cascading delete that keeps both logs free of dangling
//! references.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::ports::{
    PodcastDeletion, PodcastRepository, PodcastRepositoryError, SanitizingRuleRepository,
};
use crate::domain::service_support::{map_podcast_error, map_rule_error};
use crate::domain::{
    Attempt, CanonicalUrl, Error, Podcast, RetryPolicy, UrlSanitizer, retry_on_conflict,
};

/// Podcast lookup, creation and deletion.
pub struct PodcastService<P, R> {
    podcasts: Arc<P>,
    rules: Arc<R>,
    retry: RetryPolicy,
}

// Manual impl: the repositories sit behind `Arc` and need not be `Clone`.
impl<P, R> Clone for PodcastService<P, R> {
    fn clone(&self) -> Self {
        Self {
            podcasts: Arc::clone(&self.podcasts),
            rules: Arc::clone(&self.rules),
            retry: self.retry,
        }
    }
}

impl<P, R> PodcastService<P, R> {
    /// Create a new service with the given repositories.
    pub const fn new(podcasts: Arc<P>, rules: Arc<R>, retry: RetryPolicy) -> Self {
        Self {
            podcasts,
            rules,
            retry,
        }
    }
}

impl<P, R> PodcastService<P, R>
where
    P: PodcastRepository,
    R: SanitizingRuleRepository,
{
    /// Sanitizer compiled from the currently stored rules.
    pub async fn sanitizer(&self) -> Result<UrlSanitizer, Error> {
        let rules = self.rules.list_rules().await.map_err(map_rule_error)?;
        Ok(UrlSanitizer::new(rules))
    }

    /// Existing podcast for `url`, if any.
    pub async fn find(&self, url: &CanonicalUrl) -> Result<Option<Podcast>, Error> {
        self.podcasts
            .find_by_url(url)
            .await
            .map_err(map_podcast_error)
    }

    /// Podcast for `url`, created when missing.
    ///
    /// A concurrent insert of the same URL is resolved by re-reading.
    pub async fn resolve(&self, url: &CanonicalUrl) -> Result<Podcast, Error> {
        let podcasts = &self.podcasts;
        retry_on_conflict(self.retry, "resolve podcast", |_| async move {
            if let Some(existing) = podcasts
                .find_by_url(url)
                .await
                .map_err(map_podcast_error)?
            {
                return Ok(Attempt::Complete(existing));
            }
            match podcasts.create(url).await {
                Ok(created) => {
                    debug!(podcast = %created.id, %url, "created podcast");
                    Ok(Attempt::Complete(created))
                }
                Err(PodcastRepositoryError::DuplicateKey { url: taken }) => Ok(Attempt::Conflict(
                    format!("podcast {taken} created concurrently"),
                )),
                Err(error) => Err(map_podcast_error(error)),
            }
        })
        .await
    }

    /// Delete the podcast at `url` with every log entry referencing it.
    pub async fn delete_podcast(&self, url: &CanonicalUrl) -> Result<PodcastDeletion, Error> {
        let Some(podcast) = self.find(url).await? else {
            return Err(Error::not_found(format!("podcast {url} not found")));
        };
        let deletion = self
            .podcasts
            .delete_with_dependents(&podcast.id)
            .await
            .map_err(map_podcast_error)?;
        info!(
            podcast = %podcast.id,
            episode_actions = deletion.episode_actions,
            subscription_actions = deletion.subscription_actions,
            "deleted podcast"
        );
        Ok(deletion)
    }
}

#[cfg(test)]
#[path = "podcast_service_tests.rs"]
mod tests;
