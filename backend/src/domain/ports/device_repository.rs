//! Port for device records and their group membership.
//!
//! Membership is only ever changed through [`DeviceRepository::apply_membership`],
//! which must lock the rows named by the plan's preconditions, verify them and
//! apply every step in one transaction.

use async_trait::async_trait;

use crate::domain::{
    Device, DeviceCaption, DeviceType, DeviceUid, MembershipPlan, SyncGroupId, UserId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by device repository adapters.
    pub enum DeviceRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "device repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "device repository query failed: {message}",
        /// A plan precondition no longer holds.
        StaleMembership { device: String } =>
            "membership of device {device} changed concurrently",
    }
}

/// Metadata changes for a device; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceUpdate {
    /// New display name.
    pub caption: Option<DeviceCaption>,
    /// New hardware kind.
    pub device_type: Option<DeviceType>,
}

/// Storage for devices and sync-group membership.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Look a device up by its user-scoped uid.
    async fn find(
        &self,
        user: &UserId,
        uid: &DeviceUid,
    ) -> Result<Option<Device>, DeviceRepositoryError>;

    /// Return the device, creating it with default metadata when absent.
    async fn ensure(&self, user: &UserId, uid: &DeviceUid) -> Result<Device, DeviceRepositoryError>;

    /// Create or update a device's metadata.
    async fn update(
        &self,
        user: &UserId,
        uid: &DeviceUid,
        update: &DeviceUpdate,
    ) -> Result<Device, DeviceRepositoryError>;

    /// Every device of `user`, ordered by uid.
    async fn list(&self, user: &UserId) -> Result<Vec<Device>, DeviceRepositoryError>;

    /// Current members of `group`, ordered by uid.
    async fn group_members(&self, group: &SyncGroupId)
    -> Result<Vec<Device>, DeviceRepositoryError>;

    /// Apply a membership plan atomically, failing with
    /// [`DeviceRepositoryError::StaleMembership`] when a precondition broke.
    async fn apply_membership(
        &self,
        user: &UserId,
        plan: &MembershipPlan,
    ) -> Result<(), DeviceRepositoryError>;
}

/// Fixture repository that knows no devices and creates defaults on demand.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDeviceRepository;

#[async_trait]
impl DeviceRepository for FixtureDeviceRepository {
    async fn find(
        &self,
        _user: &UserId,
        _uid: &DeviceUid,
    ) -> Result<Option<Device>, DeviceRepositoryError> {
        Ok(None)
    }

    async fn ensure(&self, user: &UserId, uid: &DeviceUid) -> Result<Device, DeviceRepositoryError> {
        Ok(Device::new_default(user.clone(), uid.clone()))
    }

    async fn update(
        &self,
        user: &UserId,
        uid: &DeviceUid,
        update: &DeviceUpdate,
    ) -> Result<Device, DeviceRepositoryError> {
        let mut device = Device::new_default(user.clone(), uid.clone());
        if let Some(caption) = &update.caption {
            device.caption = caption.clone();
        }
        if let Some(device_type) = update.device_type {
            device.device_type = device_type;
        }
        Ok(device)
    }

    async fn list(&self, _user: &UserId) -> Result<Vec<Device>, DeviceRepositoryError> {
        Ok(Vec::new())
    }

    async fn group_members(
        &self,
        _group: &SyncGroupId,
    ) -> Result<Vec<Device>, DeviceRepositoryError> {
        Ok(Vec::new())
    }

    async fn apply_membership(
        &self,
        _user: &UserId,
        _plan: &MembershipPlan,
    ) -> Result<(), DeviceRepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[tokio::test]
    async fn fixture_update_applies_requested_metadata() {
        let repo = FixtureDeviceRepository;
        let update = DeviceUpdate {
            caption: Some(DeviceCaption::new("Kitchen tablet").expect("caption")),
            device_type: Some(DeviceType::Tablet),
        };

        let device = repo
            .update(
                &UserId::random(),
                &DeviceUid::new("kitchen").expect("uid"),
                &update,
            )
            .await
            .expect("fixture update succeeds");

        assert_eq!(device.caption.as_str(), "Kitchen tablet");
        assert_eq!(device.device_type, DeviceType::Tablet);
    }

    #[rstest]
    fn stale_membership_error_names_the_device() {
        let error = DeviceRepositoryError::stale_membership("phone");
        assert_eq!(
            error.to_string(),
            "membership of device phone changed concurrently"
        );
    }
}
