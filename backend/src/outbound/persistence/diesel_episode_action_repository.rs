//! PostgreSQL-backed episode action journal.
//!
//! Rows are unique over every field (`NULLS NOT DISTINCT`), so replaying an
//! upload is absorbed by `ON CONFLICT DO NOTHING`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{
    EpisodeActionFilter, EpisodeActionRepository, EpisodeActionRepositoryError,
};
use crate::domain::{
    AppendOutcome, CanonicalUrl, DeviceUid, EpisodeAction, EpisodeActionKind, EpisodeRef,
    Playback, UserId,
};

use super::diesel_device_repository::ensure_user;
use super::diesel_error_mapping;
use super::diesel_podcast_repository::row_to_podcast;
use super::models::{EpisodeActionRow, NewEpisodeActionRow, PodcastRow};
use super::pool::{DbPool, PoolError};
use super::schema::{devices, episode_actions, podcasts};

/// Diesel-backed implementation of the episode journal port.
#[derive(Clone)]
pub struct DieselEpisodeActionRepository {
    pool: DbPool,
}

impl DieselEpisodeActionRepository {
    /// Create a new repository with the given connection pool.
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> EpisodeActionRepositoryError {
    diesel_error_mapping::map_pool_error(error, EpisodeActionRepositoryError::connection)
}

fn map_diesel_error(error: &DieselError) -> EpisodeActionRepositoryError {
    diesel_error_mapping::map_diesel_error(
        error,
        EpisodeActionRepositoryError::query,
        EpisodeActionRepositoryError::connection,
    )
}

/// Failure inside the append transaction.
enum AppendFailure {
    Database(DieselError),
    UnknownDevice(DeviceUid),
    Value(String),
}

impl From<DieselError> for AppendFailure {
    fn from(error: DieselError) -> Self {
        Self::Database(error)
    }
}

fn to_column(value: Option<u32>, field: &str) -> Result<Option<i32>, String> {
    value
        .map(i32::try_from)
        .transpose()
        .map_err(|_| format!("{field} does not fit the journal column"))
}

fn from_column(
    value: Option<i32>,
    field: &str,
) -> Result<Option<u32>, EpisodeActionRepositoryError> {
    value
        .map(u32::try_from)
        .transpose()
        .map_err(|_| EpisodeActionRepositoryError::query(format!("stored {field} is negative")))
}

type JoinedRow = (EpisodeActionRow, PodcastRow, Option<String>);

fn row_to_action(
    (row, podcast, device): JoinedRow,
) -> Result<EpisodeAction, EpisodeActionRepositoryError> {
    let invalid =
        |err: &dyn std::fmt::Display| EpisodeActionRepositoryError::query(err.to_string());
    let podcast = row_to_podcast(podcast).map_err(|err| invalid(&err))?;
    let url = CanonicalUrl::new(row.episode_url).map_err(|err| invalid(&err))?;
    let device = device
        .map(DeviceUid::new)
        .transpose()
        .map_err(|err| invalid(&err))?;
    Ok(EpisodeAction {
        episode: EpisodeRef { podcast, url },
        device,
        kind: row
            .action
            .parse::<EpisodeActionKind>()
            .map_err(|err| invalid(&err))?,
        timestamp: row.action_at,
        playback: Playback {
            started: from_column(row.started, "started")?,
            position: from_column(row.position, "position")?,
            total: from_column(row.total, "total")?,
        },
    })
}

/// Resolve the device ids named by `actions`; every device must exist.
async fn resolve_devices(
    conn: &mut AsyncPgConnection,
    user: &UserId,
    actions: &[EpisodeAction],
) -> Result<BTreeMap<DeviceUid, Uuid>, AppendFailure> {
    let mut resolved = BTreeMap::new();
    for uid in actions.iter().filter_map(|action| action.device.as_ref()) {
        if resolved.contains_key(uid) {
            continue;
        }
        let id: Option<Uuid> = devices::table
            .filter(devices::user_id.eq(user.as_uuid()))
            .filter(devices::uid.eq(uid.as_str()))
            .select(devices::id)
            .first(conn)
            .await
            .optional()?;
        let id = id.ok_or_else(|| AppendFailure::UnknownDevice(uid.clone()))?;
        resolved.insert(uid.clone(), id);
    }
    Ok(resolved)
}

async fn insert_actions(
    conn: &mut AsyncPgConnection,
    user: &UserId,
    actions: &[EpisodeAction],
) -> Result<usize, AppendFailure> {
    ensure_user(conn, user).await?;
    let device_ids = resolve_devices(conn, user, actions).await?;
    let mut inserted = 0;
    for action in actions {
        let row = NewEpisodeActionRow {
            user_id: *user.as_uuid(),
            podcast_id: *action.episode.podcast.id.as_uuid(),
            episode_url: action.episode.url.as_str(),
            device_id: action
                .device
                .as_ref()
                .and_then(|uid| device_ids.get(uid).copied()),
            action: action.kind.as_str(),
            action_at: action.timestamp,
            started: to_column(action.playback.started, "started")
                .map_err(AppendFailure::Value)?,
            position: to_column(action.playback.position, "position")
                .map_err(AppendFailure::Value)?,
            total: to_column(action.playback.total, "total").map_err(AppendFailure::Value)?,
        };
        inserted += diesel::insert_into(episode_actions::table)
            .values(&row)
            .on_conflict_do_nothing()
            .execute(conn)
            .await?;
    }
    Ok(inserted)
}

#[async_trait]
impl EpisodeActionRepository for DieselEpisodeActionRepository {
    async fn list(
        &self,
        user: &UserId,
        filter: &EpisodeActionFilter,
    ) -> Result<Vec<EpisodeAction>, EpisodeActionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = episode_actions::table
            .inner_join(podcasts::table)
            .left_join(devices::table)
            .filter(episode_actions::user_id.eq(*user.as_uuid()))
            .order((episode_actions::action_at.asc(), episode_actions::id.asc()))
            .select((
                EpisodeActionRow::as_select(),
                PodcastRow::as_select(),
                devices::uid.nullable(),
            ))
            .into_boxed();
        if let Some(podcast) = filter.podcast {
            query = query.filter(episode_actions::podcast_id.eq(*podcast.as_uuid()));
        }
        if let Some(device) = &filter.device {
            query = query.filter(devices::uid.nullable().eq(device.as_str()));
        }
        if let Some(since) = filter.since {
            query = query.filter(episode_actions::action_at.gt(since));
        }
        let rows: Vec<JoinedRow> = query
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err))?;
        rows.into_iter().map(row_to_action).collect()
    }

    async fn append(
        &self,
        user: &UserId,
        actions: &[EpisodeAction],
    ) -> Result<AppendOutcome, EpisodeActionRepositoryError> {
        if actions.is_empty() {
            return Ok(AppendOutcome::default());
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let inserted = conn
            .transaction(|conn| {
                async move { insert_actions(conn, user, actions).await }.scope_boxed()
            })
            .await
            .map_err(|failure| match failure {
                AppendFailure::Database(err) => map_diesel_error(&err),
                AppendFailure::UnknownDevice(uid) => {
                    EpisodeActionRepositoryError::query(format!("device {uid} does not exist"))
                }
                AppendFailure::Value(message) => EpisodeActionRepositoryError::query(message),
            })?;
        Ok(AppendOutcome {
            inserted,
            absorbed: actions.len().saturating_sub(inserted),
        })
    }
}
