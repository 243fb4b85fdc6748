//! PostgreSQL-backed podcast identity storage and cascade deletion.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use tracing::info;
use uuid::Uuid;

use crate::domain::ports::{PodcastDeletion, PodcastRepository, PodcastRepositoryError};
use crate::domain::{CanonicalUrl, EmptyUrlError, Podcast, PodcastId};

use super::diesel_error_mapping::{self, is_unique_violation};
use super::models::{NewPodcastRow, PodcastRow};
use super::pool::{DbPool, PoolError};
use super::schema::{episode_actions, podcasts, subscription_actions};

/// Diesel-backed implementation of the podcast repository port.
#[derive(Clone)]
pub struct DieselPodcastRepository {
    pool: DbPool,
}

impl DieselPodcastRepository {
    /// Create a new repository with the given connection pool.
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> PodcastRepositoryError {
    diesel_error_mapping::map_pool_error(error, PodcastRepositoryError::connection)
}

fn map_diesel_error(error: &DieselError) -> PodcastRepositoryError {
    diesel_error_mapping::map_diesel_error(
        error,
        PodcastRepositoryError::query,
        PodcastRepositoryError::connection,
    )
}

pub(super) fn row_to_podcast(row: PodcastRow) -> Result<Podcast, EmptyUrlError> {
    Ok(Podcast {
        id: PodcastId::from_uuid(row.id),
        url: CanonicalUrl::new(row.url)?,
    })
}

fn to_podcast(row: PodcastRow) -> Result<Podcast, PodcastRepositoryError> {
    row_to_podcast(row).map_err(|err| PodcastRepositoryError::query(err.to_string()))
}

#[async_trait]
impl PodcastRepository for DieselPodcastRepository {
    async fn find_by_url(
        &self,
        url: &CanonicalUrl,
    ) -> Result<Option<Podcast>, PodcastRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = podcasts::table
            .filter(podcasts::url.eq(url.as_str()))
            .select(PodcastRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(&err))?;
        row.map(to_podcast).transpose()
    }

    async fn create(&self, url: &CanonicalUrl) -> Result<Podcast, PodcastRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = diesel::insert_into(podcasts::table)
            .values(NewPodcastRow {
                id: Uuid::new_v4(),
                url: url.as_str(),
            })
            .returning(PodcastRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    PodcastRepositoryError::duplicate_key(url.as_str())
                } else {
                    map_diesel_error(&err)
                }
            })?;
        to_podcast(row)
    }

    async fn delete_with_dependents(
        &self,
        podcast: &PodcastId,
    ) -> Result<PodcastDeletion, PodcastRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = *podcast.as_uuid();
        let deletion = conn
            .transaction(|conn| {
                async move {
                    let episodes = diesel::delete(
                        episode_actions::table.filter(episode_actions::podcast_id.eq(id)),
                    )
                    .execute(conn)
                    .await?;
                    let subscriptions = diesel::delete(
                        subscription_actions::table.filter(subscription_actions::podcast_id.eq(id)),
                    )
                    .execute(conn)
                    .await?;
                    let removed = diesel::delete(podcasts::table.find(id))
                        .execute(conn)
                        .await?;
                    Ok::<_, DieselError>(PodcastDeletion {
                        episode_actions: episodes,
                        subscription_actions: subscriptions,
                        podcast_removed: removed > 0,
                    })
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_diesel_error(&err))?;
        info!(
            podcast = %podcast,
            episode_actions = deletion.episode_actions,
            subscription_actions = deletion.subscription_actions,
            "deleted podcast and its log entries"
        );
        Ok(deletion)
    }
}
