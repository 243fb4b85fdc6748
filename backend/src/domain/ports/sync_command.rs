//! Driving port for changing which devices are synchronised.

use async_trait::async_trait;

use crate::domain::{DeviceUid, Error, UserId};

use super::SyncStatus;

/// Grouping changes requested by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSyncRequest {
    /// Authenticated owner.
    pub user_id: UserId,
    /// Each list names at least two devices; the first is synced with the
    /// others.
    pub synchronize: Vec<Vec<DeviceUid>>,
    /// Devices to remove from their groups.
    pub stop_synchronize: Vec<DeviceUid>,
}

/// Domain use-case port for grouping devices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncCommand: Send + Sync {
    /// Apply the requested changes and return the resulting status.
    async fn update_sync(&self, request: UpdateSyncRequest) -> Result<SyncStatus, Error>;
}

/// Fixture command that reports an empty status.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSyncCommand;

#[async_trait]
impl SyncCommand for FixtureSyncCommand {
    async fn update_sync(&self, _request: UpdateSyncRequest) -> Result<SyncStatus, Error> {
        Ok(SyncStatus::default())
    }
}
