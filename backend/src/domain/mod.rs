//! Domain primitives, pure reconciliation algorithms and services.
//!
//! Purpose: hold everything that decides *what* the subscription state of a
//! device is, independent of HTTP and storage. The action logs are the only
//! source of truth; projections, delta feeds and sync catch-ups are pure
//! functions over loaded log entries, orchestrated by the services below.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - Identity types: UserId, Device, DeviceUid, Podcast, CanonicalUrl.
//! - Log types: SubscriptionAction, LogOrder, EpisodeAction.
//! - Algorithms: latest_actions, fold_window, plan_sync_with, plan_unsync,
//!   adoption_candidates, net_changes, merge_episode_actions.
//! - Services implementing the driving ports in [`ports`].

pub mod ports;

mod device;
mod device_service;
mod episode_action;
mod episode_action_service;
mod error;
mod podcast;
mod podcast_service;
mod projection;
mod retry;
mod sanitizing;
mod service_support;
mod subscription;
mod subscription_service;
mod sync_diff;
mod sync_group;
mod sync_service;
mod trace_id;
mod user;

pub use self::device::{
    DEFAULT_DEVICE_CAPTION, DEVICE_UID_MAX, Device, DeviceCaption, DeviceId, DeviceType,
    DeviceUid, DeviceValidationError, SyncGroupId,
};
pub use self::device_service::DeviceService;
pub use self::episode_action::{
    EpisodeAction, EpisodeActionKind, EpisodeActionSubmission, EpisodeActionValidationError,
    EpisodeRef, Playback, ValidatedSubmission, latest_per_episode, merge_episode_actions,
    parse_timestamp,
};
pub use self::episode_action_service::EpisodeActionService;
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::podcast::{CanonicalUrl, EmptyUrlError, Podcast, PodcastId};
pub use self::podcast_service::PodcastService;
pub use self::projection::{
    Projection, fold_window, latest_action, latest_actions, subscribed_count,
};
pub use self::retry::{Attempt, DEFAULT_MAX_ATTEMPTS, RetryPolicy, retry_on_conflict};
pub use self::sanitizing::{SanitizingRule, UrlKind, UrlRewrite, UrlSanitizer};
pub use self::subscription::{
    AppendOutcome, LogOrder, NewSubscriptionAction, SubscriptionAction, SubscriptionActionKind,
    SubscriptionChanges, UnknownSubscriptionAction,
};
pub use self::subscription_service::SubscriptionService;
pub use self::sync_diff::{Candidates, adoption_candidates, catch_up_timestamp, net_changes};
pub use self::sync_group::{
    ExpectedGroup, ExpectedMembership, MIN_GROUP_SIZE, MembershipPlan, MembershipStep, SyncGroup,
    SyncGroupError, SyncTarget, plan_sync_with, plan_unsync,
};
pub use self::sync_service::SyncService;
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::user::{UserId, UserValidationError};
