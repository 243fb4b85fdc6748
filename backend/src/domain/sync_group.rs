//! Device grouping state machine.
//!
//! A device is either ungrouped or a member of exactly one [`SyncGroup`], and
//! a persisted group always has at least two members. The planners in this
//! module are pure: they inspect current membership and return a
//! [`MembershipPlan`] that the device repository applies atomically, after
//! checking that the membership it was planned against is still current.
//! Plans that rely on a group's full member set record it, so a device that
//! joined concurrently makes the plan stale instead of orphaning a member.

use super::{Device, DeviceId, SyncGroupId, UserId};

/// Smallest membership a persisted group may have.
pub const MIN_GROUP_SIZE: usize = 2;

/// Errors reported by the grouping state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncGroupError {
    /// The target belongs to another user.
    #[error("devices of different users cannot be synchronised")]
    CrossUser,
    /// Both devices already belong to different groups.
    #[error("device {device} and {target} are already in different sync groups")]
    CannotMergeGroups {
        /// Device asking to sync.
        device: DeviceId,
        /// Target device.
        target: DeviceId,
    },
    /// The device is not in any group.
    #[error("device {0} is not synchronised")]
    NotGrouped(DeviceId),
    /// A device was asked to sync with itself.
    #[error("device {0} cannot be synchronised with itself")]
    SelfSync(DeviceId),
}

/// An existing group together with its current members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncGroup {
    /// Group identifier.
    pub id: SyncGroupId,
    /// Owner of every member device.
    pub user_id: UserId,
    /// Current members.
    pub members: Vec<DeviceId>,
}

/// What a device is asked to sync with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    /// Another device, grouped or not.
    Device(Device),
    /// An existing group.
    Group(SyncGroup),
}

/// One primitive membership mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStep {
    /// Create an empty group.
    CreateGroup(SyncGroupId),
    /// Place a device in a group.
    Assign {
        /// Device to move.
        device: DeviceId,
        /// Destination group.
        group: SyncGroupId,
    },
    /// Make a device ungrouped.
    Detach(DeviceId),
    /// Delete a group that no longer has members.
    DeleteGroup(SyncGroupId),
}

/// Membership a device is expected to have when the plan is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedMembership {
    /// Device whose row is locked and checked.
    pub device: DeviceId,
    /// Group the device must still be in (or `None` for ungrouped).
    pub group: Option<SyncGroupId>,
}

/// Complete member set a group is expected to have when the plan is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedGroup {
    /// Group whose row is locked before its members are re-read.
    pub group: SyncGroupId,
    /// Sorted member ids.
    pub members: Vec<DeviceId>,
}

impl ExpectedGroup {
    fn new(group: SyncGroupId, members: &[DeviceId]) -> Self {
        let mut members = members.to_vec();
        members.sort_unstable();
        members.dedup();
        Self { group, members }
    }

    /// Whether `actual` is exactly the expected member set, in any order.
    #[must_use]
    pub fn matches(&self, actual: &[DeviceId]) -> bool {
        let mut actual = actual.to_vec();
        actual.sort_unstable();
        actual.dedup();
        actual == self.members
    }
}

/// An ordered list of steps guarded by the membership it was planned from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipPlan {
    /// Preconditions checked under lock before any step runs.
    pub expected: Vec<ExpectedMembership>,
    /// Member sets checked under the group row lock before any step runs.
    pub expected_groups: Vec<ExpectedGroup>,
    /// Mutations applied in order.
    pub steps: Vec<MembershipStep>,
    /// Groups whose members need a catch-up once the plan commits.
    pub affected_groups: Vec<SyncGroupId>,
}

impl MembershipPlan {
    /// Whether the plan changes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    fn expect(&mut self, device: DeviceId, group: Option<SyncGroupId>) {
        if !self.expected.iter().any(|entry| entry.device == device) {
            self.expected.push(ExpectedMembership { device, group });
        }
    }

    fn expect_members(&mut self, group: SyncGroupId, members: &[DeviceId]) {
        if !self.expected_groups.iter().any(|entry| entry.group == group) {
            self.expected_groups.push(ExpectedGroup::new(group, members));
        }
    }

    /// Existing groups the plan reads or writes, sorted for stable lock order.
    #[must_use]
    pub fn locked_groups(&self) -> Vec<SyncGroupId> {
        let created: Vec<SyncGroupId> = self
            .steps
            .iter()
            .filter_map(|step| match step {
                MembershipStep::CreateGroup(group) => Some(*group),
                _ => None,
            })
            .collect();
        let mut groups: Vec<SyncGroupId> = self
            .expected_groups
            .iter()
            .map(|entry| entry.group)
            .chain(self.expected.iter().filter_map(|entry| entry.group))
            .chain(self.steps.iter().filter_map(|step| match *step {
                MembershipStep::Assign { group, .. } | MembershipStep::DeleteGroup(group) => {
                    Some(group)
                }
                MembershipStep::CreateGroup(_) | MembershipStep::Detach(_) => None,
            }))
            .filter(|group| !created.contains(group))
            .collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    fn touch(&mut self, group: SyncGroupId) {
        if !self.affected_groups.contains(&group) {
            self.affected_groups.push(group);
        }
    }
}

/// Plan `device` joining `target`.
///
/// `current_members` lists the members of the group `device` is in now and is
/// ignored while it is ungrouped. Joining a group while grouped elsewhere
/// leaves the old group first, which may dissolve it.
///
/// Device targets are handled symmetrically: whichever side is ungrouped joins
/// the other side's group.
pub fn plan_sync_with(
    device: &Device,
    current_members: &[DeviceId],
    target: &SyncTarget,
) -> Result<MembershipPlan, SyncGroupError> {
    match target {
        SyncTarget::Device(other) => plan_device_target(device, other),
        SyncTarget::Group(group) => plan_group_target(device, current_members, group),
    }
}

fn plan_device_target(device: &Device, other: &Device) -> Result<MembershipPlan, SyncGroupError> {
    if device.user_id != other.user_id {
        return Err(SyncGroupError::CrossUser);
    }
    if device.id == other.id {
        return Err(SyncGroupError::SelfSync(device.id));
    }

    let mut plan = MembershipPlan::default();
    plan.expect(device.id, device.sync_group);
    plan.expect(other.id, other.sync_group);

    match (device.sync_group, other.sync_group) {
        (Some(mine), Some(theirs)) if mine == theirs => return Ok(MembershipPlan::default()),
        (Some(_), Some(_)) => {
            return Err(SyncGroupError::CannotMergeGroups {
                device: device.id,
                target: other.id,
            });
        }
        (Some(group), None) => {
            plan.steps.push(MembershipStep::Assign {
                device: other.id,
                group,
            });
            plan.touch(group);
        }
        (None, Some(group)) => {
            plan.steps.push(MembershipStep::Assign {
                device: device.id,
                group,
            });
            plan.touch(group);
        }
        (None, None) => {
            let group = SyncGroupId::random();
            plan.steps.extend([
                MembershipStep::CreateGroup(group),
                MembershipStep::Assign {
                    device: device.id,
                    group,
                },
                MembershipStep::Assign {
                    device: other.id,
                    group,
                },
            ]);
            plan.touch(group);
        }
    }
    Ok(plan)
}

fn plan_group_target(
    device: &Device,
    current_members: &[DeviceId],
    group: &SyncGroup,
) -> Result<MembershipPlan, SyncGroupError> {
    if device.user_id != group.user_id {
        return Err(SyncGroupError::CrossUser);
    }
    if device.sync_group == Some(group.id) {
        return Ok(MembershipPlan::default());
    }

    let mut plan = match device.sync_group {
        Some(_) => plan_unsync(device, current_members)?,
        None => {
            let mut plan = MembershipPlan::default();
            plan.expect(device.id, None);
            plan
        }
    };
    for member in &group.members {
        plan.expect(*member, Some(group.id));
    }
    plan.expect_members(group.id, &group.members);
    plan.steps.push(MembershipStep::Assign {
        device: device.id,
        group: group.id,
    });
    plan.touch(group.id);
    Ok(plan)
}

/// Plan removing `device` from its group.
///
/// `current_members` lists every member of the device's group, including the
/// device itself. When fewer than [`MIN_GROUP_SIZE`] members would remain the
/// rest are ungrouped too and the group is deleted.
pub fn plan_unsync(
    device: &Device,
    current_members: &[DeviceId],
) -> Result<MembershipPlan, SyncGroupError> {
    let group = device
        .sync_group
        .ok_or(SyncGroupError::NotGrouped(device.id))?;

    let mut plan = MembershipPlan::default();
    plan.expect(device.id, Some(group));
    plan.steps.push(MembershipStep::Detach(device.id));

    let remaining: Vec<DeviceId> = current_members
        .iter()
        .copied()
        .filter(|member| *member != device.id)
        .collect();
    for member in &remaining {
        plan.expect(*member, Some(group));
    }
    plan.expect_members(group, current_members);

    if remaining.len() < MIN_GROUP_SIZE {
        plan.steps
            .extend(remaining.iter().copied().map(MembershipStep::Detach));
        plan.steps.push(MembershipStep::DeleteGroup(group));
    } else {
        plan.touch(group);
    }
    Ok(plan)
}
