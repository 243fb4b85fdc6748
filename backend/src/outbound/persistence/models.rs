//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{
    devices, episode_actions, podcasts, subscription_actions, sync_groups, url_sanitizing_rules,
    users,
};

/// Insertable struct for registering a user on first write.
#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow {
    pub id: Uuid,
}

// ---------------------------------------------------------------------------
// Podcasts
// ---------------------------------------------------------------------------

/// Row struct for reading from the podcasts table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = podcasts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PodcastRow {
    pub id: Uuid,
    pub url: String,
}

/// Insertable struct for creating podcast records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = podcasts)]
pub(crate) struct NewPodcastRow<'a> {
    pub id: Uuid,
    pub url: &'a str,
}

// ---------------------------------------------------------------------------
// Devices and sync groups
// ---------------------------------------------------------------------------

/// Row struct for reading from the devices table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = devices)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DeviceRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub uid: String,
    pub caption: String,
    pub device_type: String,
    pub sync_group_id: Option<Uuid>,
}

/// Insertable struct for lazily created devices.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = devices)]
pub(crate) struct NewDeviceRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub uid: &'a str,
    pub caption: &'a str,
    pub device_type: &'a str,
}

/// Changeset for device metadata; `None` fields are left untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = devices)]
pub(crate) struct DeviceMetadataUpdate<'a> {
    pub caption: Option<&'a str>,
    pub device_type: Option<&'a str>,
}

/// Insertable struct for sync groups.
#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = sync_groups)]
pub(crate) struct NewSyncGroupRow {
    pub id: Uuid,
    pub user_id: Uuid,
}

// ---------------------------------------------------------------------------
// Subscription log
// ---------------------------------------------------------------------------

/// Row struct for reading from the subscription_actions table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = subscription_actions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SubscriptionActionRow {
    pub id: i64,
    pub device_id: Uuid,
    pub action: String,
    pub action_at: DateTime<Utc>,
}

/// Insertable struct for appending subscription log entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscription_actions)]
pub(crate) struct NewSubscriptionActionRow<'a> {
    pub device_id: Uuid,
    pub podcast_id: Uuid,
    pub action: &'a str,
    pub action_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Episode journal
// ---------------------------------------------------------------------------

/// Row struct for reading from the episode_actions table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = episode_actions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct EpisodeActionRow {
    pub episode_url: String,
    pub action: String,
    pub action_at: DateTime<Utc>,
    pub started: Option<i32>,
    pub position: Option<i32>,
    pub total: Option<i32>,
}

/// Insertable struct for appending journal entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = episode_actions)]
pub(crate) struct NewEpisodeActionRow<'a> {
    pub user_id: Uuid,
    pub podcast_id: Uuid,
    pub episode_url: &'a str,
    pub device_id: Option<Uuid>,
    pub action: &'a str,
    pub action_at: DateTime<Utc>,
    pub started: Option<i32>,
    pub position: Option<i32>,
    pub total: Option<i32>,
}

// ---------------------------------------------------------------------------
// Sanitizing rules
// ---------------------------------------------------------------------------

/// Row struct for reading from the url_sanitizing_rules table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = url_sanitizing_rules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SanitizingRuleRow {
    pub priority: i32,
    pub search: String,
    pub replacement: String,
    pub use_podcast: bool,
    pub use_episode: bool,
}
