//! Driving port for reading synchronisation state.

use async_trait::async_trait;

use crate::domain::{DeviceUid, Error, SyncTarget, UserId};

/// Which devices are grouped together and which stand alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// One uid list per group, each sorted.
    pub synchronized: Vec<Vec<DeviceUid>>,
    /// Ungrouped devices, sorted.
    pub not_synchronized: Vec<DeviceUid>,
}

/// Domain use-case port for synchronisation state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncQuery: Send + Sync {
    /// Current grouping of the user's devices.
    async fn sync_status(&self, user_id: &UserId) -> Result<SyncStatus, Error>;

    /// Groups and ungrouped devices that `device` could sync with.
    async fn sync_targets(
        &self,
        user_id: &UserId,
        device: &DeviceUid,
    ) -> Result<Vec<SyncTarget>, Error>;
}

/// Fixture query for a user without devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSyncQuery;

#[async_trait]
impl SyncQuery for FixtureSyncQuery {
    async fn sync_status(&self, _user_id: &UserId) -> Result<SyncStatus, Error> {
        Ok(SyncStatus::default())
    }

    async fn sync_targets(
        &self,
        _user_id: &UserId,
        _device: &DeviceUid,
    ) -> Result<Vec<SyncTarget>, Error> {
        Ok(Vec::new())
    }
}
