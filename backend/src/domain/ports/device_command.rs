//! Driving port for editing device metadata.

use async_trait::async_trait;

use crate::domain::{Device, DeviceUid, Error, UserId};

/// Requested metadata changes, as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDeviceRequest {
    /// Authenticated owner.
    pub user_id: UserId,
    /// Device to create or update.
    pub device: DeviceUid,
    /// New caption; blank captions are rejected.
    pub caption: Option<String>,
    /// New device type name.
    pub device_type: Option<String>,
}

/// Domain use-case port for device metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceCommand: Send + Sync {
    /// Create the device if needed and apply the requested metadata.
    async fn update_device(&self, request: UpdateDeviceRequest) -> Result<Device, Error>;
}

/// Fixture command echoing a default device.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDeviceCommand;

#[async_trait]
impl DeviceCommand for FixtureDeviceCommand {
    async fn update_device(&self, request: UpdateDeviceRequest) -> Result<Device, Error> {
        Ok(Device::new_default(request.user_id, request.device))
    }
}
