//! Episode action journal service.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::info;

use crate::domain::ports::{
    DeviceRepository, EpisodeActionCommand, EpisodeActionFilter, EpisodeActionQuery,
    EpisodeActionRepository, EpisodeActionsRequest, EpisodeActionsResponse, PodcastRepository,
    SanitizingRuleRepository, UploadEpisodeActionsRequest, UploadEpisodeActionsResponse,
};
use crate::domain::service_support::{map_device_error, map_episode_journal_error};
use crate::domain::{
    CanonicalUrl, EpisodeAction, EpisodeRef, Error, Podcast, PodcastService, UrlKind,
    ValidatedSubmission, latest_per_episode, merge_episode_actions,
};

/// Episode action service implementing the episode driving ports.
#[derive(Clone)]
pub struct EpisodeActionService<E, D, P, R> {
    journal: Arc<E>,
    devices: Arc<D>,
    podcasts: PodcastService<P, R>,
    clock: Arc<dyn Clock>,
}

impl<E, D, P, R> EpisodeActionService<E, D, P, R> {
    /// Create a new service with the given repositories.
    pub const fn new(
        journal: Arc<E>,
        devices: Arc<D>,
        podcasts: PodcastService<P, R>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            journal,
            devices,
            podcasts,
            clock,
        }
    }
}

/// A validated submission whose URLs survived canonicalisation.
struct Accepted {
    submission: ValidatedSubmission,
    podcast: CanonicalUrl,
    episode: CanonicalUrl,
}

impl<E, D, P, R> EpisodeActionService<E, D, P, R>
where
    E: EpisodeActionRepository,
    D: DeviceRepository,
    P: PodcastRepository,
    R: SanitizingRuleRepository,
{
    async fn resolve_podcasts(
        &self,
        accepted: &[Accepted],
    ) -> Result<BTreeMap<CanonicalUrl, Podcast>, Error> {
        let urls: BTreeSet<&CanonicalUrl> = accepted.iter().map(|entry| &entry.podcast).collect();
        let mut resolved = BTreeMap::new();
        for url in urls {
            let podcast = self.podcasts.resolve(url).await?;
            resolved.insert(url.clone(), podcast);
        }
        Ok(resolved)
    }
}

#[async_trait]
impl<E, D, P, R> EpisodeActionCommand for EpisodeActionService<E, D, P, R>
where
    E: EpisodeActionRepository,
    D: DeviceRepository,
    P: PodcastRepository,
    R: SanitizingRuleRepository,
{
    async fn upload(
        &self,
        request: UploadEpisodeActionsRequest,
    ) -> Result<UploadEpisodeActionsResponse, Error> {
        let timestamp = self.clock.utc();
        let mut validated = Vec::with_capacity(request.actions.len());
        for (index, submission) in request.actions.into_iter().enumerate() {
            let checked = submission.validate(timestamp).map_err(|err| {
                Error::invalid_request(format!("episode action {index} is invalid: {err}"))
                    .with_details(json!({ "code": "invalid_episode_action", "index": index }))
            })?;
            validated.push(checked);
        }

        let sanitizer = self.podcasts.sanitizer().await?;
        let mut update_urls = Vec::new();
        let mut accepted = Vec::with_capacity(validated.len());
        for submission in validated {
            let podcast =
                sanitizer.sanitize_tracked(&submission.podcast, UrlKind::Podcast, &mut update_urls);
            let episode =
                sanitizer.sanitize_tracked(&submission.episode, UrlKind::Episode, &mut update_urls);
            if let (Some(podcast), Some(episode)) = (podcast, episode) {
                accepted.push(Accepted {
                    submission,
                    podcast,
                    episode,
                });
            }
        }

        let devices: BTreeSet<_> = accepted
            .iter()
            .filter_map(|entry| entry.submission.device.as_ref())
            .collect();
        for uid in devices {
            self.devices
                .ensure(&request.user_id, uid)
                .await
                .map_err(map_device_error)?;
        }

        let podcasts = self.resolve_podcasts(&accepted).await?;
        let mut actions = Vec::with_capacity(accepted.len());
        for entry in accepted {
            let Some(podcast) = podcasts.get(&entry.podcast) else {
                return Err(Error::internal(format!(
                    "podcast {} was not resolved",
                    entry.podcast
                )));
            };
            actions.push(EpisodeAction {
                episode: EpisodeRef {
                    podcast: podcast.clone(),
                    url: entry.episode,
                },
                device: entry.submission.device,
                kind: entry.submission.kind,
                timestamp: entry.submission.timestamp,
                playback: entry.submission.playback,
            });
        }

        let actions = merge_episode_actions(Vec::new(), actions);
        if !actions.is_empty() {
            let outcome = self
                .journal
                .append(&request.user_id, &actions)
                .await
                .map_err(map_episode_journal_error)?;
            info!(
                user = %request.user_id,
                inserted = outcome.inserted,
                absorbed = outcome.absorbed,
                "recorded episode actions"
            );
        }

        Ok(UploadEpisodeActionsResponse {
            timestamp,
            update_urls,
        })
    }
}

#[async_trait]
impl<E, D, P, R> EpisodeActionQuery for EpisodeActionService<E, D, P, R>
where
    E: EpisodeActionRepository,
    D: DeviceRepository,
    P: PodcastRepository,
    R: SanitizingRuleRepository,
{
    async fn list(&self, request: EpisodeActionsRequest) -> Result<EpisodeActionsResponse, Error> {
        let timestamp = self.clock.utc();
        let empty = EpisodeActionsResponse {
            actions: Vec::new(),
            timestamp,
        };

        if let Some(uid) = &request.device {
            let known = self
                .devices
                .find(&request.user_id, uid)
                .await
                .map_err(map_device_error)?;
            if known.is_none() {
                return Err(Error::not_found(format!("device {uid} not found")));
            }
        }

        let podcast = match &request.podcast {
            Some(raw) => {
                let sanitizer = self.podcasts.sanitizer().await?;
                let Some(url) = sanitizer.sanitize(raw, UrlKind::Podcast) else {
                    return Ok(empty);
                };
                let Some(podcast) = self.podcasts.find(&url).await? else {
                    return Ok(empty);
                };
                Some(podcast.id)
            }
            None => None,
        };

        let filter = EpisodeActionFilter {
            podcast,
            device: request.device,
            since: request.since,
        };
        let stored = self
            .journal
            .list(&request.user_id, &filter)
            .await
            .map_err(map_episode_journal_error)?;
        let merged = merge_episode_actions(Vec::new(), stored);
        let actions = if request.aggregated {
            latest_per_episode(merged)
        } else {
            merged
        };
        Ok(EpisodeActionsResponse { actions, timestamp })
    }
}

#[cfg(test)]
#[path = "episode_action_service_tests.rs"]
mod tests;
