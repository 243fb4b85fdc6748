//! Driving port for listing a user's devices.

use async_trait::async_trait;

use crate::domain::{Device, Error, UserId};

/// A device together with how many podcasts it is subscribed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    /// The device record.
    pub device: Device,
    /// Podcasts whose projected state is subscribed.
    pub subscriptions: usize,
}

/// Domain use-case port for device listings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceQuery: Send + Sync {
    /// Every device of the user, ordered by uid.
    async fn list_devices(&self, user_id: &UserId) -> Result<Vec<DeviceSummary>, Error>;
}

/// Fixture query for a user without devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDeviceQuery;

#[async_trait]
impl DeviceQuery for FixtureDeviceQuery {
    async fn list_devices(&self, _user_id: &UserId) -> Result<Vec<DeviceSummary>, Error> {
        Ok(Vec::new())
    }
}
