//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports (`*Repository`) are implemented by the persistence adapter;
//! driving ports (`*Command`, `*Query`) are implemented by the domain services
//! and consumed by the HTTP adapter.

mod macros;
pub(crate) use macros::define_port_error;

mod device_command;
mod device_query;
mod device_repository;
mod episode_action_command;
mod episode_action_query;
mod episode_action_repository;
mod podcast_repository;
mod sanitizing_rule_repository;
mod subscription_action_repository;
mod subscription_command;
mod subscription_query;
mod sync_command;
mod sync_query;

#[cfg(test)]
pub use device_command::MockDeviceCommand;
pub use device_command::{DeviceCommand, FixtureDeviceCommand, UpdateDeviceRequest};
#[cfg(test)]
pub use device_query::MockDeviceQuery;
pub use device_query::{DeviceQuery, DeviceSummary, FixtureDeviceQuery};
#[cfg(test)]
pub use device_repository::MockDeviceRepository;
pub use device_repository::{
    DeviceRepository, DeviceRepositoryError, DeviceUpdate, FixtureDeviceRepository,
};
#[cfg(test)]
pub use episode_action_command::MockEpisodeActionCommand;
pub use episode_action_command::{
    EpisodeActionCommand, FixtureEpisodeActionCommand, UploadEpisodeActionsRequest,
    UploadEpisodeActionsResponse,
};
#[cfg(test)]
pub use episode_action_query::MockEpisodeActionQuery;
pub use episode_action_query::{
    EpisodeActionQuery, EpisodeActionsRequest, EpisodeActionsResponse, FixtureEpisodeActionQuery,
};
#[cfg(test)]
pub use episode_action_repository::MockEpisodeActionRepository;
pub use episode_action_repository::{
    EpisodeActionFilter, EpisodeActionRepository, EpisodeActionRepositoryError,
    FixtureEpisodeActionRepository,
};
#[cfg(test)]
pub use podcast_repository::MockPodcastRepository;
pub use podcast_repository::{
    FixturePodcastRepository, PodcastDeletion, PodcastRepository, PodcastRepositoryError,
};
#[cfg(test)]
pub use sanitizing_rule_repository::MockSanitizingRuleRepository;
pub use sanitizing_rule_repository::{
    FixtureSanitizingRuleRepository, SanitizingRuleRepository, SanitizingRuleRepositoryError,
};
#[cfg(test)]
pub use subscription_action_repository::MockSubscriptionActionRepository;
pub use subscription_action_repository::{
    FixtureSubscriptionActionRepository, SubscriptionActionRepository,
    SubscriptionActionRepositoryError,
};
#[cfg(test)]
pub use subscription_command::MockSubscriptionCommand;
pub use subscription_command::{
    ApplySubscriptionChangesRequest, ApplySubscriptionChangesResponse,
    FixtureSubscriptionCommand, SubscriptionCommand,
};
#[cfg(test)]
pub use subscription_query::MockSubscriptionQuery;
pub use subscription_query::{
    FixtureSubscriptionQuery, SubscriptionChangesRequest, SubscriptionQuery,
};
#[cfg(test)]
pub use sync_command::MockSyncCommand;
pub use sync_command::{FixtureSyncCommand, SyncCommand, UpdateSyncRequest};
#[cfg(test)]
pub use sync_query::MockSyncQuery;
pub use sync_query::{FixtureSyncQuery, SyncQuery, SyncStatus};
