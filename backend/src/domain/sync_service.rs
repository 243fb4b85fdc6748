//! Sync group orchestration.
//!
//! Wraps the pure grouping state machine and diff engine with storage:
//! membership plans are applied under optimistic checks and retried when a
//! concurrent change invalidates them, and grouped devices are caught up by
//! appending synthetic log entries adopted from their peers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::info;

use crate::domain::ports::{
    DeviceRepository, DeviceRepositoryError, SubscriptionActionRepository, SyncCommand, SyncQuery,
    SyncStatus, UpdateSyncRequest,
};
use crate::domain::service_support::{map_device_error, map_subscription_log_error};
use crate::domain::{
    AppendOutcome, Attempt, Device, DeviceId, DeviceUid, Error, MembershipPlan,
    NewSubscriptionAction, Projection, RetryPolicy, SyncGroup, SyncGroupError, SyncGroupId,
    SyncTarget, UserId, adoption_candidates, catch_up_timestamp, latest_actions, net_changes,
    plan_sync_with, plan_unsync, retry_on_conflict,
};

/// Sync group service implementing the sync driving ports.
#[derive(Clone)]
pub struct SyncService<S, D> {
    log: Arc<S>,
    devices: Arc<D>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl<S, D> SyncService<S, D> {
    /// Create a new service with the given repositories.
    pub const fn new(
        log: Arc<S>,
        devices: Arc<D>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            log,
            devices,
            clock,
            retry,
        }
    }
}

fn map_group_error(error: SyncGroupError) -> Error {
    let code = match error {
        SyncGroupError::CrossUser => "cross_user",
        SyncGroupError::CannotMergeGroups { .. } => "cannot_merge_groups",
        SyncGroupError::NotGrouped(_) => "not_grouped",
        SyncGroupError::SelfSync(_) => "self_sync",
    };
    Error::invalid_state(error.to_string()).with_details(json!({ "code": code }))
}

impl<S, D> SyncService<S, D>
where
    S: SubscriptionActionRepository,
    D: DeviceRepository,
{
    async fn reload(&self, device: &Device) -> Result<Device, Error> {
        self.require_device(&device.user_id, &device.uid).await
    }

    async fn require_device(&self, user: &UserId, uid: &DeviceUid) -> Result<Device, Error> {
        self.devices
            .find(user, uid)
            .await
            .map_err(map_device_error)?
            .ok_or_else(|| Error::not_found(format!("device {uid} not found")))
    }

    async fn member_ids(&self, group: Option<SyncGroupId>) -> Result<Vec<DeviceId>, Error> {
        let Some(group) = group else {
            return Ok(Vec::new());
        };
        let members = self
            .devices
            .group_members(&group)
            .await
            .map_err(map_device_error)?;
        Ok(members.into_iter().map(|member| member.id).collect())
    }

    async fn reload_target(&self, target: &SyncTarget) -> Result<SyncTarget, Error> {
        match target {
            SyncTarget::Device(other) => Ok(SyncTarget::Device(self.reload(other).await?)),
            SyncTarget::Group(group) => {
                let members = self.member_ids(Some(group.id)).await?;
                if members.is_empty() {
                    return Err(Error::not_found(format!(
                        "sync group {} no longer exists",
                        group.id
                    )));
                }
                Ok(SyncTarget::Group(SyncGroup {
                    id: group.id,
                    user_id: group.user_id.clone(),
                    members,
                }))
            }
        }
    }

    async fn commit(
        &self,
        user: &UserId,
        plan: MembershipPlan,
    ) -> Result<Attempt<MembershipPlan>, Error> {
        if plan.is_noop() {
            return Ok(Attempt::Complete(plan));
        }
        match self.devices.apply_membership(user, &plan).await {
            Ok(()) => Ok(Attempt::Complete(plan)),
            Err(DeviceRepositoryError::StaleMembership { device }) => Ok(Attempt::Conflict(
                format!("membership of device {device} changed concurrently"),
            )),
            Err(error) => Err(map_device_error(error)),
        }
    }

    async fn try_sync_with(
        &self,
        device: &Device,
        target: &SyncTarget,
    ) -> Result<Attempt<MembershipPlan>, Error> {
        let current = self.reload(device).await?;
        let target = self.reload_target(target).await?;
        let members = self.member_ids(current.sync_group).await?;
        let plan = plan_sync_with(&current, &members, &target).map_err(map_group_error)?;
        self.commit(&current.user_id, plan).await
    }

    async fn try_unsync(&self, device: &Device) -> Result<Attempt<MembershipPlan>, Error> {
        let current = self.reload(device).await?;
        let members = self.member_ids(current.sync_group).await?;
        let plan = plan_unsync(&current, &members).map_err(map_group_error)?;
        self.commit(&current.user_id, plan).await
    }

    async fn projection(&self, device: &DeviceId) -> Result<Projection, Error> {
        let actions = self
            .log
            .list_for_device(device, None)
            .await
            .map_err(map_subscription_log_error)?;
        Ok(latest_actions(actions))
    }

    /// Place `device` in a group with `target` and catch up the group.
    ///
    /// Both sides are re-read on every attempt, so callers may pass stale
    /// snapshots.
    pub async fn sync_with(&self, device: &Device, target: &SyncTarget) -> Result<(), Error> {
        let plan = retry_on_conflict(self.retry, "sync devices", |_| {
            self.try_sync_with(device, target)
        })
        .await?;
        if !plan.is_noop() {
            info!(device = %device.uid, groups = ?plan.affected_groups, "devices synchronised");
        }
        self.catch_up_groups(&plan.affected_groups).await
    }

    /// Remove `device` from its group, dissolving a group left with one
    /// member.
    pub async fn unsync(&self, device: &Device) -> Result<(), Error> {
        let plan =
            retry_on_conflict(self.retry, "unsync device", |_| self.try_unsync(device)).await?;
        info!(device = %device.uid, "device left its sync group");
        self.catch_up_groups(&plan.affected_groups).await
    }

    /// Log entries `device` needs to converge with its group peers.
    ///
    /// Entries are stamped with the current time so they fall inside the
    /// device's next delta window, or just after the device's own latest
    /// entry for the podcast when that is not older than now.
    pub async fn sync_actions(&self, device: &Device) -> Result<Vec<NewSubscriptionAction>, Error> {
        let Some(group) = device.sync_group else {
            return Ok(Vec::new());
        };
        let own = self.projection(&device.id).await?;
        let mut peers = Vec::new();
        for peer in self.member_ids(Some(group)).await? {
            if peer != device.id {
                peers.push(self.projection(&peer).await?);
            }
        }

        let candidates = adoption_candidates(&own, &peers);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let fresh = self.projection(&device.id).await?;
        let now = self.clock.utc();
        Ok(net_changes(candidates, &fresh)
            .into_iter()
            .map(|adopted| NewSubscriptionAction {
                device: device.id,
                podcast: adopted.podcast_id(),
                kind: adopted.kind,
                timestamp: catch_up_timestamp(&fresh, adopted.podcast_id(), now),
            })
            .collect())
    }

    /// Append the catch-up entries for `device`.
    pub async fn catch_up(&self, device: &Device) -> Result<AppendOutcome, Error> {
        let actions = self.sync_actions(device).await?;
        if actions.is_empty() {
            return Ok(AppendOutcome::default());
        }
        let outcome = self
            .log
            .append(&actions)
            .await
            .map_err(map_subscription_log_error)?;
        info!(
            device = %device.uid,
            inserted = outcome.inserted,
            absorbed = outcome.absorbed,
            "caught device up with its sync group"
        );
        Ok(outcome)
    }

    async fn catch_up_groups(&self, groups: &[SyncGroupId]) -> Result<(), Error> {
        for group in groups {
            let members = self
                .devices
                .group_members(group)
                .await
                .map_err(map_device_error)?;
            for member in &members {
                self.catch_up(member).await?;
            }
        }
        Ok(())
    }

    fn validate_update(request: &UpdateSyncRequest) -> Result<(), Error> {
        if let Some(list) = request.synchronize.iter().find(|list| list.len() < 2) {
            return Err(Error::invalid_request(
                "each synchronize list must name at least two devices",
            )
            .with_details(json!({ "code": "sync_list_too_short", "devices": list })));
        }
        let overlap: Vec<&DeviceUid> = request
            .stop_synchronize
            .iter()
            .filter(|uid| request.synchronize.iter().flatten().any(|other| other == *uid))
            .collect();
        if !overlap.is_empty() {
            return Err(Error::invalid_request(
                "devices cannot be synchronised and unsynchronised at once",
            )
            .with_details(json!({ "code": "sync_stop_overlap", "devices": overlap })));
        }
        Ok(())
    }
}

#[async_trait]
impl<S, D> SyncCommand for SyncService<S, D>
where
    S: SubscriptionActionRepository,
    D: DeviceRepository,
{
    async fn update_sync(&self, request: UpdateSyncRequest) -> Result<SyncStatus, Error> {
        Self::validate_update(&request)?;
        for list in &request.synchronize {
            let mut uids = list.iter();
            let Some(first) = uids.next() else {
                continue;
            };
            let first = self.require_device(&request.user_id, first).await?;
            for uid in uids {
                let other = self.require_device(&request.user_id, uid).await?;
                self.sync_with(&first, &SyncTarget::Device(other)).await?;
            }
        }
        for uid in &request.stop_synchronize {
            let device = self.require_device(&request.user_id, uid).await?;
            self.unsync(&device).await?;
        }
        self.sync_status(&request.user_id).await
    }
}

#[async_trait]
impl<S, D> SyncQuery for SyncService<S, D>
where
    S: SubscriptionActionRepository,
    D: DeviceRepository,
{
    async fn sync_status(&self, user_id: &UserId) -> Result<SyncStatus, Error> {
        let devices = self.devices.list(user_id).await.map_err(map_device_error)?;
        let mut groups: BTreeMap<SyncGroupId, Vec<DeviceUid>> = BTreeMap::new();
        let mut status = SyncStatus::default();
        for device in devices {
            match device.sync_group {
                Some(group) => groups.entry(group).or_default().push(device.uid),
                None => status.not_synchronized.push(device.uid),
            }
        }
        status.synchronized = groups
            .into_values()
            .map(|mut uids| {
                uids.sort();
                uids
            })
            .collect();
        status.synchronized.sort();
        status.not_synchronized.sort();
        Ok(status)
    }

    async fn sync_targets(
        &self,
        user_id: &UserId,
        device: &DeviceUid,
    ) -> Result<Vec<SyncTarget>, Error> {
        let device = self.require_device(user_id, device).await?;
        let devices = self.devices.list(user_id).await.map_err(map_device_error)?;
        let mut groups: BTreeMap<SyncGroupId, Vec<DeviceId>> = BTreeMap::new();
        let mut targets = Vec::new();
        for other in devices {
            match other.sync_group {
                Some(group) if Some(group) == device.sync_group => {}
                Some(group) => groups.entry(group).or_default().push(other.id),
                None if other.id == device.id => {}
                None => targets.push(SyncTarget::Device(other)),
            }
        }
        targets.extend(groups.into_iter().map(|(id, members)| {
            SyncTarget::Group(SyncGroup {
                id,
                user_id: user_id.clone(),
                members,
            })
        }));
        Ok(targets)
    }
}

#[cfg(test)]
#[path = "sync_service_tests.rs"]
mod tests;
