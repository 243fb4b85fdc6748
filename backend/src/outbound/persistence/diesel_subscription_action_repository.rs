//! PostgreSQL-backed subscription log.
//!
//! The `bigserial` primary key doubles as the log's sequence id, so entries
//! appended in one call keep their submission order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};

use crate::domain::ports::{SubscriptionActionRepository, SubscriptionActionRepositoryError};
use crate::domain::{
    AppendOutcome, DeviceId, NewSubscriptionAction, PodcastId, SubscriptionAction,
    SubscriptionActionKind,
};

use super::diesel_error_mapping;
use super::diesel_podcast_repository::row_to_podcast;
use super::models::{NewSubscriptionActionRow, PodcastRow, SubscriptionActionRow};
use super::pool::{DbPool, PoolError};
use super::schema::{podcasts, subscription_actions};

/// Diesel-backed implementation of the subscription log port.
#[derive(Clone)]
pub struct DieselSubscriptionActionRepository {
    pool: DbPool,
}

impl DieselSubscriptionActionRepository {
    /// Create a new repository with the given connection pool.
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> SubscriptionActionRepositoryError {
    diesel_error_mapping::map_pool_error(error, SubscriptionActionRepositoryError::connection)
}

fn map_diesel_error(error: &DieselError) -> SubscriptionActionRepositoryError {
    diesel_error_mapping::map_diesel_error(
        error,
        SubscriptionActionRepositoryError::query,
        SubscriptionActionRepositoryError::connection,
    )
}

type JoinedRow = (SubscriptionActionRow, PodcastRow);

fn row_to_action(
    (row, podcast): JoinedRow,
) -> Result<SubscriptionAction, SubscriptionActionRepositoryError> {
    let kind = row
        .action
        .parse::<SubscriptionActionKind>()
        .map_err(|err| SubscriptionActionRepositoryError::query(err.to_string()))?;
    let podcast = row_to_podcast(podcast)
        .map_err(|err| SubscriptionActionRepositoryError::query(err.to_string()))?;
    Ok(SubscriptionAction {
        device: DeviceId::from_uuid(row.device_id),
        podcast,
        kind,
        timestamp: row.action_at,
        sequence_id: row.id,
    })
}

#[async_trait]
impl SubscriptionActionRepository for DieselSubscriptionActionRepository {
    async fn list_for_device(
        &self,
        device: &DeviceId,
        podcast: Option<PodcastId>,
    ) -> Result<Vec<SubscriptionAction>, SubscriptionActionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = subscription_actions::table
            .inner_join(podcasts::table)
            .filter(subscription_actions::device_id.eq(*device.as_uuid()))
            .select((SubscriptionActionRow::as_select(), PodcastRow::as_select()))
            .into_boxed();
        if let Some(podcast) = podcast {
            query = query.filter(subscription_actions::podcast_id.eq(*podcast.as_uuid()));
        }
        let rows: Vec<JoinedRow> = query
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err))?;
        rows.into_iter().map(row_to_action).collect()
    }

    async fn list_window(
        &self,
        device: &DeviceId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionAction>, SubscriptionActionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<JoinedRow> = subscription_actions::table
            .inner_join(podcasts::table)
            .filter(subscription_actions::device_id.eq(*device.as_uuid()))
            .filter(subscription_actions::action_at.gt(since))
            .filter(subscription_actions::action_at.le(until))
            .order(subscription_actions::id.asc())
            .select((SubscriptionActionRow::as_select(), PodcastRow::as_select()))
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err))?;
        rows.into_iter().map(row_to_action).collect()
    }

    async fn append(
        &self,
        actions: &[NewSubscriptionAction],
    ) -> Result<AppendOutcome, SubscriptionActionRepositoryError> {
        if actions.is_empty() {
            return Ok(AppendOutcome::default());
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let inserted = conn
            .transaction(|conn| {
                async move {
                    let mut inserted = 0;
                    for action in actions {
                        inserted += diesel::insert_into(subscription_actions::table)
                            .values(NewSubscriptionActionRow {
                                device_id: *action.device.as_uuid(),
                                podcast_id: *action.podcast.as_uuid(),
                                action: action.kind.as_str(),
                                action_at: action.timestamp,
                            })
                            .on_conflict((
                                subscription_actions::device_id,
                                subscription_actions::podcast_id,
                                subscription_actions::action_at,
                            ))
                            .do_nothing()
                            .execute(conn)
                            .await?;
                    }
                    Ok::<_, DieselError>(inserted)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_diesel_error(&err))?;
        Ok(AppendOutcome {
            inserted,
            absorbed: actions.len().saturating_sub(inserted),
        })
    }
}
