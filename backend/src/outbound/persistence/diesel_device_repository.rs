//! PostgreSQL-backed `DeviceRepository` implementation using Diesel ORM.
//!
//! Membership plans are applied inside one transaction. It first locks the
//! existing `sync_groups` rows the plan touches, in id order, and re-reads the
//! full member set of every group the plan was built from. Then it locks the
//! device rows named by the plan's preconditions (`SELECT ... FOR UPDATE`).
//! Assigning a device to a group takes a key-share lock on the group row
//! through the foreign key, so holding the group lock serialises every
//! membership change of that group. A precondition that no longer holds
//! aborts the transaction with `StaleMembership`, leaving the caller to
//! re-plan.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{DeviceRepository, DeviceRepositoryError, DeviceUpdate};
use crate::domain::{
    DEFAULT_DEVICE_CAPTION, Device, DeviceCaption, DeviceId, DeviceType, DeviceUid,
    MembershipPlan, MembershipStep, SyncGroupId, UserId,
};

use super::diesel_error_mapping;
use super::models::{DeviceMetadataUpdate, DeviceRow, NewDeviceRow, NewSyncGroupRow, NewUserRow};
use super::pool::{DbPool, PoolError};
use super::schema::{devices, sync_groups, users};

/// Diesel-backed implementation of the device repository port.
#[derive(Clone)]
pub struct DieselDeviceRepository {
    pool: DbPool,
}

impl DieselDeviceRepository {
    /// Create a new repository with the given connection pool.
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> DeviceRepositoryError {
    diesel_error_mapping::map_pool_error(error, DeviceRepositoryError::connection)
}

fn map_diesel_error(error: &DieselError) -> DeviceRepositoryError {
    diesel_error_mapping::map_diesel_error(
        error,
        DeviceRepositoryError::query,
        DeviceRepositoryError::connection,
    )
}

/// Failure inside the membership transaction.
enum MembershipFailure {
    Database(DieselError),
    Stale(DeviceId),
    StaleGroup(SyncGroupId),
}

impl From<DieselError> for MembershipFailure {
    fn from(error: DieselError) -> Self {
        Self::Database(error)
    }
}

fn row_to_device(row: DeviceRow) -> Result<Device, DeviceRepositoryError> {
    let DeviceRow {
        id,
        user_id,
        uid,
        caption,
        device_type,
        sync_group_id,
    } = row;
    let invalid = |err: &dyn std::fmt::Display| {
        DeviceRepositoryError::query(format!("stored device {id} is invalid: {err}"))
    };
    Ok(Device {
        id: DeviceId::from_uuid(id),
        user_id: UserId::from_uuid(user_id),
        uid: DeviceUid::new(uid).map_err(|err| invalid(&err))?,
        caption: DeviceCaption::new(caption).map_err(|err| invalid(&err))?,
        device_type: device_type
            .parse::<DeviceType>()
            .map_err(|err| invalid(&err))?,
        sync_group: sync_group_id.map(SyncGroupId::from_uuid),
    })
}

/// Register `user` if this is its first write.
pub(super) async fn ensure_user(
    conn: &mut AsyncPgConnection,
    user: &UserId,
) -> Result<(), DieselError> {
    diesel::insert_into(users::table)
        .values(NewUserRow {
            id: *user.as_uuid(),
        })
        .on_conflict_do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}

async fn find_row(
    conn: &mut AsyncPgConnection,
    user: &UserId,
    uid: &DeviceUid,
) -> Result<Option<DeviceRow>, DieselError> {
    devices::table
        .filter(devices::user_id.eq(user.as_uuid()))
        .filter(devices::uid.eq(uid.as_str()))
        .select(DeviceRow::as_select())
        .first(conn)
        .await
        .optional()
}

/// Insert the device with default metadata unless it exists, then read it.
async fn ensure_row(
    conn: &mut AsyncPgConnection,
    user: &UserId,
    uid: &DeviceUid,
) -> Result<DeviceRow, DieselError> {
    ensure_user(conn, user).await?;
    diesel::insert_into(devices::table)
        .values(NewDeviceRow {
            id: Uuid::new_v4(),
            user_id: *user.as_uuid(),
            uid: uid.as_str(),
            caption: DEFAULT_DEVICE_CAPTION,
            device_type: DeviceType::default().as_str(),
        })
        .on_conflict((devices::user_id, devices::uid))
        .do_nothing()
        .execute(conn)
        .await?;
    find_row(conn, user, uid).await?.ok_or(DieselError::NotFound)
}

/// Lock the plan's existing groups and compare their full member sets.
async fn lock_groups(
    conn: &mut AsyncPgConnection,
    user: &UserId,
    plan: &MembershipPlan,
) -> Result<(), MembershipFailure> {
    let ids: Vec<Uuid> = plan
        .locked_groups()
        .iter()
        .map(|group| *group.as_uuid())
        .collect();
    if ids.is_empty() {
        return Ok(());
    }
    let _locked: Vec<Uuid> = sync_groups::table
        .filter(sync_groups::user_id.eq(user.as_uuid()))
        .filter(sync_groups::id.eq_any(&ids))
        .order(sync_groups::id.asc())
        .select(sync_groups::id)
        .for_update()
        .load(conn)
        .await?;

    for expected in &plan.expected_groups {
        let members: Vec<DeviceId> = devices::table
            .filter(devices::sync_group_id.eq(expected.group.as_uuid()))
            .select(devices::id)
            .load::<Uuid>(conn)
            .await?
            .into_iter()
            .map(DeviceId::from_uuid)
            .collect();
        if !expected.matches(&members) {
            return Err(MembershipFailure::StaleGroup(expected.group));
        }
    }
    Ok(())
}

async fn lock_expected(
    conn: &mut AsyncPgConnection,
    user: &UserId,
    plan: &MembershipPlan,
) -> Result<(), MembershipFailure> {
    let ids: Vec<Uuid> = plan
        .expected
        .iter()
        .map(|entry| *entry.device.as_uuid())
        .collect();
    let locked: Vec<(Uuid, Option<Uuid>)> = devices::table
        .filter(devices::user_id.eq(user.as_uuid()))
        .filter(devices::id.eq_any(&ids))
        .select((devices::id, devices::sync_group_id))
        .for_update()
        .load(conn)
        .await?;

    for expected in &plan.expected {
        let current = locked
            .iter()
            .find(|(id, _)| id == expected.device.as_uuid())
            .map(|(_, group)| group.map(SyncGroupId::from_uuid));
        if current != Some(expected.group) {
            return Err(MembershipFailure::Stale(expected.device));
        }
    }
    Ok(())
}

async fn apply_step(
    conn: &mut AsyncPgConnection,
    user: &UserId,
    step: MembershipStep,
) -> Result<(), DieselError> {
    match step {
        MembershipStep::CreateGroup(group) => {
            diesel::insert_into(sync_groups::table)
                .values(NewSyncGroupRow {
                    id: *group.as_uuid(),
                    user_id: *user.as_uuid(),
                })
                .execute(conn)
                .await?;
        }
        MembershipStep::Assign { device, group } => {
            diesel::update(devices::table.find(device.as_uuid()))
                .set(devices::sync_group_id.eq(Some(*group.as_uuid())))
                .execute(conn)
                .await?;
        }
        MembershipStep::Detach(device) => {
            diesel::update(devices::table.find(device.as_uuid()))
                .set(devices::sync_group_id.eq(None::<Uuid>))
                .execute(conn)
                .await?;
        }
        MembershipStep::DeleteGroup(group) => {
            diesel::delete(sync_groups::table.find(group.as_uuid()))
                .execute(conn)
                .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl DeviceRepository for DieselDeviceRepository {
    async fn find(
        &self,
        user: &UserId,
        uid: &DeviceUid,
    ) -> Result<Option<Device>, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = find_row(&mut conn, user, uid)
            .await
            .map_err(|err| map_diesel_error(&err))?;
        row.map(row_to_device).transpose()
    }

    async fn ensure(
        &self,
        user: &UserId,
        uid: &DeviceUid,
    ) -> Result<Device, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = conn
            .transaction(|conn| async move { ensure_row(conn, user, uid).await }.scope_boxed())
            .await
            .map_err(|err| map_diesel_error(&err))?;
        row_to_device(row)
    }

    async fn update(
        &self,
        user: &UserId,
        uid: &DeviceUid,
        update: &DeviceUpdate,
    ) -> Result<Device, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let changes = DeviceMetadataUpdate {
            caption: update.caption.as_ref().map(DeviceCaption::as_str),
            device_type: update.device_type.map(DeviceType::as_str),
        };
        let row = conn
            .transaction(|conn| {
                async move {
                    let row = ensure_row(conn, user, uid).await?;
                    if changes.caption.is_none() && changes.device_type.is_none() {
                        return Ok(row);
                    }
                    diesel::update(devices::table.find(row.id))
                        .set(&changes)
                        .returning(DeviceRow::as_returning())
                        .get_result(conn)
                        .await
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_diesel_error(&err))?;
        row_to_device(row)
    }

    async fn list(&self, user: &UserId) -> Result<Vec<Device>, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<DeviceRow> = devices::table
            .filter(devices::user_id.eq(user.as_uuid()))
            .order(devices::uid.asc())
            .select(DeviceRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err))?;
        rows.into_iter().map(row_to_device).collect()
    }

    async fn group_members(
        &self,
        group: &SyncGroupId,
    ) -> Result<Vec<Device>, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<DeviceRow> = devices::table
            .filter(devices::sync_group_id.eq(group.as_uuid()))
            .order(devices::uid.asc())
            .select(DeviceRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err))?;
        rows.into_iter().map(row_to_device).collect()
    }

    async fn apply_membership(
        &self,
        user: &UserId,
        plan: &MembershipPlan,
    ) -> Result<(), DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let result = conn
            .transaction::<_, MembershipFailure, _>(|conn| {
                async move {
                    lock_groups(conn, user, plan).await?;
                    lock_expected(conn, user, plan).await?;
                    for step in &plan.steps {
                        apply_step(conn, user, *step).await?;
                    }
                    Ok(())
                }
                .scope_boxed()
            })
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(MembershipFailure::Stale(device)) => {
                Err(DeviceRepositoryError::stale_membership(device.to_string()))
            }
            Err(MembershipFailure::StaleGroup(group)) => Err(
                DeviceRepositoryError::stale_membership(group.to_string()),
            ),
            Err(MembershipFailure::Database(err)) => Err(map_diesel_error(&err)),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for row conversion.
    use rstest::rstest;

    use super::*;

    fn row(uid: &str, device_type: &str) -> DeviceRow {
        DeviceRow {
            id: Uuid::nil(),
            user_id: Uuid::from_u128(1),
            uid: uid.to_owned(),
            caption: "Pocket".to_owned(),
            device_type: device_type.to_owned(),
            sync_group_id: Some(Uuid::from_u128(7)),
        }
    }

    #[rstest]
    fn valid_rows_become_devices() {
        let device = row_to_device(row("phone", "mobile")).expect("device");

        assert_eq!(device.uid.as_str(), "phone");
        assert_eq!(device.device_type, DeviceType::Mobile);
        assert_eq!(
            device.sync_group,
            Some(SyncGroupId::from_uuid(Uuid::from_u128(7)))
        );
    }

    #[rstest]
    #[case(row("bad uid", "mobile"))]
    #[case(row("phone", "toaster"))]
    fn corrupt_rows_are_query_errors(#[case] row: DeviceRow) {
        let error = row_to_device(row).expect_err("corrupt row");

        assert!(matches!(error, DeviceRepositoryError::Query { .. }));
    }
}
