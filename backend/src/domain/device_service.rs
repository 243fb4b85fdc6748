//! Device metadata service.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::{
    DeviceCommand, DeviceQuery, DeviceRepository, DeviceSummary, DeviceUpdate,
    SubscriptionActionRepository, UpdateDeviceRequest,
};
use crate::domain::service_support::{map_device_error, map_subscription_log_error};
use crate::domain::{
    Device, DeviceCaption, DeviceType, Error, UserId, latest_actions, subscribed_count,
};

/// Device service implementing the device driving ports.
#[derive(Clone)]
pub struct DeviceService<D, S> {
    devices: Arc<D>,
    log: Arc<S>,
}

impl<D, S> DeviceService<D, S> {
    /// Create a new service with the given repositories.
    pub const fn new(devices: Arc<D>, log: Arc<S>) -> Self {
        Self { devices, log }
    }

    fn parse_update(request: &UpdateDeviceRequest) -> Result<DeviceUpdate, Error> {
        let caption = request
            .caption
            .as_deref()
            .map(DeviceCaption::new)
            .transpose()
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let device_type = request
            .device_type
            .as_deref()
            .map(str::parse::<DeviceType>)
            .transpose()
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        Ok(DeviceUpdate {
            caption,
            device_type,
        })
    }
}

#[async_trait]
impl<D, S> DeviceCommand for DeviceService<D, S>
where
    D: DeviceRepository,
    S: SubscriptionActionRepository,
{
    async fn update_device(&self, request: UpdateDeviceRequest) -> Result<Device, Error> {
        let update = Self::parse_update(&request)?;
        let device = self
            .devices
            .update(&request.user_id, &request.device, &update)
            .await
            .map_err(map_device_error)?;
        info!(device = %device.uid, "updated device");
        Ok(device)
    }
}

#[async_trait]
impl<D, S> DeviceQuery for DeviceService<D, S>
where
    D: DeviceRepository,
    S: SubscriptionActionRepository,
{
    async fn list_devices(&self, user_id: &UserId) -> Result<Vec<DeviceSummary>, Error> {
        let devices = self.devices.list(user_id).await.map_err(map_device_error)?;
        let mut summaries = Vec::with_capacity(devices.len());
        for device in devices {
            let actions = self
                .log
                .list_for_device(&device.id, None)
                .await
                .map_err(map_subscription_log_error)?;
            let subscriptions = subscribed_count(&latest_actions(actions));
            summaries.push(DeviceSummary {
                device,
                subscriptions,
            });
        }
        Ok(summaries)
    }
}
