//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate them
//! with `diesel print-schema` when a migration changes a table.

diesel::table! {
    /// Users known to the service.
    ///
    /// Identities are issued by the external auth provider; a row is created
    /// the first time a user writes anything.
    users (id) {
        /// Primary key: the authenticated user's UUID.
        id -> Uuid,
        /// Record creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Podcasts identified by their canonical feed URL.
    podcasts (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Canonical feed URL (unique).
        url -> Text,
        /// Record creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Sync groups; a persisted group always has at least two member devices.
    sync_groups (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Owner of every member device.
        user_id -> Uuid,
        /// Record creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Client devices, unique per `(user_id, uid)`.
    devices (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Owning user.
        user_id -> Uuid,
        /// Client-chosen identifier, unique per user.
        uid -> Varchar,
        /// Display name.
        caption -> Text,
        /// Hardware kind (`desktop`, `laptop`, `mobile`, `server`, `tablet`, `other`).
        device_type -> Varchar,
        /// Group membership; `NULL` while ungrouped.
        sync_group_id -> Nullable<Uuid>,
        /// Record creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only subscription log.
    ///
    /// `id` doubles as the insertion sequence used to break timestamp ties.
    /// `(device_id, podcast_id, action_at)` is unique.
    subscription_actions (id) {
        /// Primary key and insertion sequence.
        id -> Int8,
        /// Device the entry is recorded against.
        device_id -> Uuid,
        /// Target podcast.
        podcast_id -> Uuid,
        /// `subscribe` or `unsubscribe`.
        action -> Varchar,
        /// When the action happened.
        action_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only episode action journal, unique over every field.
    episode_actions (id) {
        /// Primary key and insertion sequence.
        id -> Int8,
        /// Owning user.
        user_id -> Uuid,
        /// Podcast the episode belongs to.
        podcast_id -> Uuid,
        /// Canonical episode media URL.
        episode_url -> Text,
        /// Reporting device, if any.
        device_id -> Nullable<Uuid>,
        /// `download`, `play`, `delete`, `new` or `flattr`.
        action -> Varchar,
        /// When the action happened, in whole seconds.
        action_at -> Timestamptz,
        /// Playback start in seconds.
        started -> Nullable<Int4>,
        /// Playback position in seconds.
        position -> Nullable<Int4>,
        /// Episode length in seconds.
        total -> Nullable<Int4>,
    }
}

diesel::table! {
    /// Regex rewrite rules applied while canonicalising URLs.
    url_sanitizing_rules (id) {
        /// Primary key.
        id -> Int4,
        /// Lower values run first.
        priority -> Int4,
        /// Regular expression searched for anywhere in the URL.
        search -> Text,
        /// Replacement text.
        replacement -> Text,
        /// Apply to podcast URLs.
        use_podcast -> Bool,
        /// Apply to episode URLs.
        use_episode -> Bool,
    }
}

diesel::joinable!(devices -> users (user_id));
diesel::joinable!(devices -> sync_groups (sync_group_id));
diesel::joinable!(subscription_actions -> devices (device_id));
diesel::joinable!(subscription_actions -> podcasts (podcast_id));
diesel::joinable!(episode_actions -> devices (device_id));
diesel::joinable!(episode_actions -> podcasts (podcast_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    podcasts,
    sync_groups,
    devices,
    subscription_actions,
    episode_actions,
    url_sanitizing_rules,
);
