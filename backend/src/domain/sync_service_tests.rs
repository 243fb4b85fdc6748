//! Tests for the sync group service.

use std::sync::Arc;

use super::*;
use crate::domain::ports::{
    DeviceRepository, FixtureSubscriptionActionRepository, MockDeviceRepository,
    PodcastRepository,
};
use crate::domain::{ErrorCode, Podcast, SubscriptionActionKind};
use crate::test_support::fixtures::{at, other_user, uid, url, user};
use crate::test_support::{InMemoryStore, MutableClock};

struct Harness {
    store: Arc<InMemoryStore>,
    clock: Arc<MutableClock>,
    service: SyncService<InMemoryStore, InMemoryStore>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(MutableClock::new(at(1_000)));
    let service = SyncService::new(
        store.clone(),
        store.clone(),
        clock.clone(),
        RetryPolicy::default(),
    );
    Harness {
        store,
        clock,
        service,
    }
}

impl Harness {
    async fn device(&self, name: &str) -> Device {
        self.store.ensure(&user(), &uid(name)).await.expect("device")
    }

    async fn current(&self, device: &Device) -> Device {
        self.store
            .find(&device.user_id, &device.uid)
            .await
            .expect("lookup")
            .expect("device exists")
    }

    async fn podcast(&self, feed: &str) -> Podcast {
        let feed = url(feed);
        match self.store.find_by_url(&feed).await.expect("lookup") {
            Some(podcast) => podcast,
            None => self.store.create(&feed).await.expect("created"),
        }
    }

    async fn act(&self, device: &Device, feed: &str, kind: SubscriptionActionKind, second: i64) {
        let podcast = self.podcast(feed).await;
        self.store.record(NewSubscriptionAction {
            device: device.id,
            podcast: podcast.id,
            kind,
            timestamp: at(second),
        });
    }

    async fn subscribed(&self, device: &Device) -> Vec<String> {
        let actions = self
            .store
            .list_for_device(&device.id, None)
            .await
            .expect("log");
        let mut urls = latest_actions(actions)
            .into_values()
            .filter(|action| action.kind == SubscriptionActionKind::Subscribe)
            .map(|action| action.url().to_string())
            .collect::<Vec<_>>();
        urls.sort();
        urls
    }
}

#[tokio::test]
async fn syncing_two_ungrouped_devices_merges_their_subscriptions() {
    let h = harness();
    let phone = h.device("phone").await;
    let laptop = h.device("laptop").await;
    h.act(&phone, "https://a.example/feed", SubscriptionActionKind::Subscribe, 1)
        .await;
    h.act(&laptop, "https://b.example/feed", SubscriptionActionKind::Subscribe, 2)
        .await;

    h.service
        .sync_with(&phone, &SyncTarget::Device(laptop.clone()))
        .await
        .expect("synced");

    let expected = vec![
        "https://a.example/feed".to_owned(),
        "https://b.example/feed".to_owned(),
    ];
    assert_eq!(h.subscribed(&phone).await, expected);
    assert_eq!(h.subscribed(&laptop).await, expected);
    assert_eq!(h.store.group_count(), 1);
}

#[tokio::test]
async fn ungrouped_target_joins_the_callers_group() {
    let h = harness();
    let phone = h.device("phone").await;
    let laptop = h.device("laptop").await;
    let tablet = h.device("tablet").await;
    h.service
        .sync_with(&phone, &SyncTarget::Device(laptop.clone()))
        .await
        .expect("pair");

    h.service
        .sync_with(&phone, &SyncTarget::Device(tablet.clone()))
        .await
        .expect("tablet joins");

    let group = h.current(&phone).await.sync_group;
    assert!(group.is_some());
    assert_eq!(h.current(&tablet).await.sync_group, group);
    assert_eq!(h.current(&laptop).await.sync_group, group);
}

#[tokio::test]
async fn ungrouped_caller_joins_the_targets_group() {
    let h = harness();
    let phone = h.device("phone").await;
    let laptop = h.device("laptop").await;
    let tablet = h.device("tablet").await;
    h.service
        .sync_with(&phone, &SyncTarget::Device(laptop.clone()))
        .await
        .expect("pair");

    h.service
        .sync_with(&tablet, &SyncTarget::Device(phone.clone()))
        .await
        .expect("tablet joins");

    assert_eq!(
        h.current(&tablet).await.sync_group,
        h.current(&phone).await.sync_group
    );
    assert_eq!(h.store.group_count(), 1);
}

#[tokio::test]
async fn syncing_across_two_groups_is_an_invalid_state() {
    let h = harness();
    let a = h.device("a").await;
    let b = h.device("b").await;
    let c = h.device("c").await;
    let d = h.device("d").await;
    h.service
        .sync_with(&a, &SyncTarget::Device(b))
        .await
        .expect("first pair");
    h.service
        .sync_with(&c, &SyncTarget::Device(d))
        .await
        .expect("second pair");

    let error = h
        .service
        .sync_with(&a, &SyncTarget::Device(c))
        .await
        .expect_err("groups cannot merge");

    assert_eq!(error.code(), ErrorCode::InvalidState);
    assert_eq!(
        error.details().and_then(|details| details.get("code")),
        Some(&json!("cannot_merge_groups"))
    );
}

#[tokio::test]
async fn syncing_with_another_users_device_is_rejected() {
    let h = harness();
    let mine = h.device("phone").await;
    let theirs = h
        .store
        .ensure(&other_user(), &uid("phone"))
        .await
        .expect("device");

    let error = h
        .service
        .sync_with(&mine, &SyncTarget::Device(theirs))
        .await
        .expect_err("cross user");

    assert_eq!(error.code(), ErrorCode::InvalidState);
    assert!(h.current(&mine).await.sync_group.is_none());
}

#[tokio::test]
async fn unsync_dissolves_a_pair() {
    let h = harness();
    let phone = h.device("phone").await;
    let laptop = h.device("laptop").await;
    h.service
        .sync_with(&phone, &SyncTarget::Device(laptop.clone()))
        .await
        .expect("pair");

    h.service.unsync(&phone).await.expect("unsynced");

    assert!(h.current(&phone).await.sync_group.is_none());
    assert!(h.current(&laptop).await.sync_group.is_none());
    assert_eq!(h.store.group_count(), 0);
}

#[tokio::test]
async fn dissolving_plan_is_stale_once_another_device_joins_the_group() {
    let h = harness();
    let phone = h.device("phone").await;
    let laptop = h.device("laptop").await;
    let tablet = h.device("tablet").await;
    h.service
        .sync_with(&phone, &SyncTarget::Device(laptop.clone()))
        .await
        .expect("pair");
    let phone = h.current(&phone).await;
    let group = phone.sync_group.expect("grouped");
    let members: Vec<DeviceId> = h
        .store
        .group_members(&group)
        .await
        .expect("members")
        .into_iter()
        .map(|member| member.id)
        .collect();
    let dissolve = plan_unsync(&phone, &members).expect("plan");

    h.service
        .sync_with(&laptop, &SyncTarget::Device(tablet.clone()))
        .await
        .expect("tablet joins");
    let result = h.store.apply_membership(&user(), &dissolve).await;

    assert!(matches!(
        result,
        Err(DeviceRepositoryError::StaleMembership { .. })
    ));
    assert_eq!(h.current(&tablet).await.sync_group, Some(group));

    h.service.unsync(&phone).await.expect("re-planned unsync");
    assert!(h.current(&phone).await.sync_group.is_none());
    assert_eq!(h.current(&laptop).await.sync_group, Some(group));
    assert_eq!(h.current(&tablet).await.sync_group, Some(group));
}

#[tokio::test]
async fn unsync_of_ungrouped_device_is_an_invalid_state() {
    let h = harness();
    let phone = h.device("phone").await;

    let error = h.service.unsync(&phone).await.expect_err("not grouped");

    assert_eq!(error.code(), ErrorCode::InvalidState);
}

#[tokio::test]
async fn stale_membership_is_retried() {
    let h = harness();
    let phone = h.device("phone").await;
    let laptop = h.device("laptop").await;
    h.store.race_next_membership_changes(2);

    h.service
        .sync_with(&phone, &SyncTarget::Device(laptop))
        .await
        .expect("third attempt wins");

    assert!(h.current(&phone).await.is_grouped());
}

#[tokio::test]
async fn persistent_membership_races_surface_as_conflict() {
    let h = harness();
    let phone = h.device("phone").await;
    let laptop = h.device("laptop").await;
    h.store.race_next_membership_changes(3);

    let error = h
        .service
        .sync_with(&phone, &SyncTarget::Device(laptop))
        .await
        .expect_err("retries exhausted");

    assert_eq!(error.code(), ErrorCode::Conflict);
}

#[tokio::test]
async fn catch_up_never_invents_unsubscribes() {
    let h = harness();
    let phone = h.device("phone").await;
    let laptop = h.device("laptop").await;
    h.act(&phone, "https://a.example/feed", SubscriptionActionKind::Subscribe, 5)
        .await;
    h.service
        .sync_with(&phone, &SyncTarget::Device(laptop.clone()))
        .await
        .expect("synced");

    let log = h.store.subscription_log();
    assert!(
        log.iter()
            .all(|action| action.kind == SubscriptionActionKind::Subscribe)
    );
    assert_eq!(h.subscribed(&laptop).await, vec!["https://a.example/feed"]);
}

#[tokio::test]
async fn newer_peer_unsubscribe_is_adopted_on_catch_up() {
    let h = harness();
    let phone = h.device("phone").await;
    let laptop = h.device("laptop").await;
    h.act(&phone, "https://a.example/feed", SubscriptionActionKind::Subscribe, 1)
        .await;
    h.service
        .sync_with(&phone, &SyncTarget::Device(laptop.clone()))
        .await
        .expect("synced");
    h.clock.advance_seconds(60);
    h.act(&laptop, "https://a.example/feed", SubscriptionActionKind::Unsubscribe, 2_000)
        .await;

    let current = h.current(&phone).await;
    let outcome = h.service.catch_up(&current).await.expect("caught up");

    assert_eq!(outcome.inserted, 1);
    assert!(h.subscribed(&phone).await.is_empty());
}

#[tokio::test]
async fn catch_up_at_the_instant_of_the_devices_own_entry_is_not_absorbed() {
    let h = harness();
    let phone = h.device("phone").await;
    let laptop = h.device("laptop").await;
    h.service
        .sync_with(&phone, &SyncTarget::Device(laptop.clone()))
        .await
        .expect("pair");
    h.act(&phone, "https://a.example/feed", SubscriptionActionKind::Subscribe, 1_000)
        .await;
    h.act(&laptop, "https://a.example/feed", SubscriptionActionKind::Unsubscribe, 1_000)
        .await;

    let phone = h.current(&phone).await;
    let outcome = h.service.catch_up(&phone).await.expect("caught up");

    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.absorbed, 0);
    assert!(h.subscribed(&phone).await.is_empty());
}

#[tokio::test]
async fn catch_up_of_converged_device_appends_nothing() {
    let h = harness();
    let phone = h.device("phone").await;
    let laptop = h.device("laptop").await;
    h.act(&phone, "https://a.example/feed", SubscriptionActionKind::Subscribe, 1)
        .await;
    h.service
        .sync_with(&phone, &SyncTarget::Device(laptop.clone()))
        .await
        .expect("synced");
    let before = h.store.subscription_log().len();

    let current = h.current(&laptop).await;
    let outcome = h.service.catch_up(&current).await.expect("caught up");

    assert_eq!(outcome, AppendOutcome::default());
    assert_eq!(h.store.subscription_log().len(), before);
}

#[tokio::test]
async fn update_sync_rejects_single_device_lists() {
    let h = harness();
    h.device("phone").await;

    let error = h
        .service
        .update_sync(UpdateSyncRequest {
            user_id: user(),
            synchronize: vec![vec![uid("phone")]],
            stop_synchronize: Vec::new(),
        })
        .await
        .expect_err("too short");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn update_sync_rejects_devices_in_both_lists() {
    let h = harness();

    let error = h
        .service
        .update_sync(UpdateSyncRequest {
            user_id: user(),
            synchronize: vec![vec![uid("phone"), uid("laptop")]],
            stop_synchronize: vec![uid("laptop")],
        })
        .await
        .expect_err("overlap");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn update_sync_names_unknown_devices_as_not_found() {
    let h = harness();
    h.device("phone").await;

    let error = h
        .service
        .update_sync(UpdateSyncRequest {
            user_id: user(),
            synchronize: vec![vec![uid("phone"), uid("ghost")]],
            stop_synchronize: Vec::new(),
        })
        .await
        .expect_err("unknown device");

    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn update_sync_groups_every_listed_device_and_reports_status() {
    let h = harness();
    for name in ["phone", "laptop", "tablet", "tv"] {
        h.device(name).await;
    }

    let status = h
        .service
        .update_sync(UpdateSyncRequest {
            user_id: user(),
            synchronize: vec![vec![uid("phone"), uid("laptop"), uid("tablet")]],
            stop_synchronize: Vec::new(),
        })
        .await
        .expect("updated");

    assert_eq!(
        status,
        SyncStatus {
            synchronized: vec![vec![uid("laptop"), uid("phone"), uid("tablet")]],
            not_synchronized: vec![uid("tv")],
        }
    );
}

#[tokio::test]
async fn sync_targets_lists_other_groups_and_loose_devices() {
    let h = harness();
    let a = h.device("a").await;
    let b = h.device("b").await;
    let c = h.device("c").await;
    let d = h.device("d").await;
    let e = h.device("e").await;
    h.service
        .sync_with(&a, &SyncTarget::Device(b))
        .await
        .expect("first pair");
    h.service
        .sync_with(&c, &SyncTarget::Device(d.clone()))
        .await
        .expect("second pair");

    let targets = h
        .service
        .sync_targets(&user(), &uid("a"))
        .await
        .expect("targets");

    assert_eq!(targets.len(), 2);
    assert!(targets.contains(&SyncTarget::Device(e)));
    assert!(targets.iter().any(|target| matches!(
        target,
        SyncTarget::Group(group) if group.members.contains(&c.id) && group.members.contains(&d.id)
    )));
}

#[tokio::test]
async fn device_repository_outage_is_service_unavailable() {
    let mut devices = MockDeviceRepository::new();
    devices
        .expect_list()
        .times(1)
        .return_once(|_| Err(DeviceRepositoryError::connection("refused")));
    let service = SyncService::new(
        Arc::new(FixtureSubscriptionActionRepository),
        Arc::new(devices),
        Arc::new(MutableClock::new(at(0))),
        RetryPolicy::default(),
    );

    let error = service.sync_status(&user()).await.expect_err("outage");

    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
}
