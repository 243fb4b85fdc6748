//! Repository error mapping shared by the domain services.

use crate::domain::Error;
use crate::domain::ports::{
    DeviceRepositoryError, EpisodeActionRepositoryError, PodcastRepositoryError,
    SanitizingRuleRepositoryError, SubscriptionActionRepositoryError,
};

pub(crate) fn map_subscription_log_error(error: SubscriptionActionRepositoryError) -> Error {
    match error {
        SubscriptionActionRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("subscription log unavailable: {message}"))
        }
        SubscriptionActionRepositoryError::Query { message } => {
            Error::internal(format!("subscription log error: {message}"))
        }
    }
}

pub(crate) fn map_episode_journal_error(error: EpisodeActionRepositoryError) -> Error {
    match error {
        EpisodeActionRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("episode journal unavailable: {message}"))
        }
        EpisodeActionRepositoryError::Query { message } => {
            Error::internal(format!("episode journal error: {message}"))
        }
    }
}

pub(crate) fn map_device_error(error: DeviceRepositoryError) -> Error {
    match error {
        DeviceRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("device repository unavailable: {message}"))
        }
        DeviceRepositoryError::Query { message } => {
            Error::internal(format!("device repository error: {message}"))
        }
        DeviceRepositoryError::StaleMembership { device } => {
            Error::conflict(format!("membership of device {device} changed concurrently"))
        }
    }
}

pub(crate) fn map_podcast_error(error: PodcastRepositoryError) -> Error {
    match error {
        PodcastRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("podcast repository unavailable: {message}"))
        }
        PodcastRepositoryError::Query { message } => {
            Error::internal(format!("podcast repository error: {message}"))
        }
        PodcastRepositoryError::DuplicateKey { url } => {
            Error::conflict(format!("podcast {url} was created concurrently"))
        }
    }
}

pub(crate) fn map_rule_error(error: SanitizingRuleRepositoryError) -> Error {
    match error {
        SanitizingRuleRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("sanitizing rules unavailable: {message}"))
        }
        SanitizingRuleRepositoryError::Query { message } => {
            Error::internal(format!("sanitizing rules error: {message}"))
        }
    }
}
