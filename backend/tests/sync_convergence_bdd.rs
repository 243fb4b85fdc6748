//! Behaviour-driven tests for subscription convergence in sync groups.
//!
//! Scenarios drive the subscription and sync services over the in-memory
//! store with a controllable clock, so every step lands on a distinct second.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use podsync::domain::ports::{
    ApplySubscriptionChangesRequest, SubscriptionChangesRequest, SubscriptionCommand,
    SubscriptionQuery, SyncCommand, SyncQuery, UpdateSyncRequest,
};
use podsync::domain::{
    PodcastService, RetryPolicy, SubscriptionChanges, SubscriptionService, SyncService,
};
use podsync::test_support::fixtures::{at, uid, url, user};
use podsync::test_support::{InMemoryStore, MutableClock};
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, scenario, then, when};
use tokio::runtime::Runtime;

type Subscriptions =
    SubscriptionService<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;
type SyncGroups = SyncService<InMemoryStore, InMemoryStore>;

// -----------------------------------------------------------------------------
// Test World
// -----------------------------------------------------------------------------

/// Services sharing one store, wrapped so the bundle can live in a `Slot`.
#[derive(Clone)]
struct Harness {
    runtime: Arc<Runtime>,
    clock: Arc<MutableClock>,
    subscriptions: Arc<Subscriptions>,
    sync: Arc<SyncGroups>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(MutableClock::new(at(100)));
        let retry = RetryPolicy::default();
        let podcasts = PodcastService::new(store.clone(), store.clone(), retry);
        Self {
            runtime: Arc::new(Runtime::new().expect("create runtime")),
            clock: clock.clone(),
            subscriptions: Arc::new(SubscriptionService::new(
                store.clone(),
                store.clone(),
                podcasts,
                clock.clone(),
                retry,
            )),
            sync: Arc::new(SyncService::new(store.clone(), store, clock, retry)),
        }
    }

    /// Move time forward so each step gets its own timestamp.
    fn tick(&self) {
        self.clock.advance_seconds(10);
    }

    fn upload(&self, device: &str, add: &[&str], remove: &[&str]) {
        self.tick();
        let request = ApplySubscriptionChangesRequest {
            user_id: user(),
            device: uid(device),
            add: add.iter().map(|value| (*value).to_owned()).collect(),
            remove: remove.iter().map(|value| (*value).to_owned()).collect(),
        };
        self.runtime
            .block_on(self.subscriptions.apply_changes(request))
            .expect("upload accepted");
    }
}

#[derive(Default, ScenarioState)]
struct SyncWorld {
    harness: Slot<Harness>,
    watermarks: Slot<BTreeMap<String, DateTime<Utc>>>,
    changes: Slot<BTreeMap<String, SubscriptionChanges>>,
}

impl SyncWorld {
    fn harness(&self) -> Harness {
        self.harness.get().expect("store initialised")
    }

    fn fetch(&self, device: &str) {
        let harness = self.harness();
        harness.tick();
        let mut watermarks = self.watermarks.get().unwrap_or_default();
        let since = watermarks.get(device).copied().unwrap_or_else(|| at(0));
        let changes = harness
            .runtime
            .block_on(harness.subscriptions.changes(SubscriptionChangesRequest {
                user_id: user(),
                device: uid(device),
                since,
            }))
            .expect("changes served");
        watermarks.insert(device.to_owned(), changes.until);
        self.watermarks.set(watermarks);
        let mut all = self.changes.get().unwrap_or_default();
        all.insert(device.to_owned(), changes);
        self.changes.set(all);
    }

    fn changes_for(&self, device: &str) -> SubscriptionChanges {
        self.changes
            .get()
            .and_then(|all| all.get(device).cloned())
            .unwrap_or_else(|| panic!("no changes fetched for {device}"))
    }

    fn update_sync(&self, synchronize: Vec<Vec<&str>>, stop: Vec<&str>) {
        let harness = self.harness();
        harness.tick();
        let request = UpdateSyncRequest {
            user_id: user(),
            synchronize: synchronize
                .into_iter()
                .map(|list| list.into_iter().map(uid).collect())
                .collect(),
            stop_synchronize: stop.into_iter().map(uid).collect(),
        };
        harness
            .runtime
            .block_on(harness.sync.update_sync(request))
            .expect("sync updated");
    }
}

#[fixture]
fn world() -> SyncWorld {
    SyncWorld::default()
}

// -----------------------------------------------------------------------------
// Given Steps
// -----------------------------------------------------------------------------

#[given("a fresh subscription store")]
fn a_fresh_subscription_store(world: &SyncWorld) {
    world.harness.set(Harness::new());
}

#[given("device {device} is registered")]
fn device_is_registered(world: &SyncWorld, device: String) {
    world.harness().upload(&device, &[], &[]);
}

#[given("device {device} subscribes to {feed}")]
fn device_subscribes(world: &SyncWorld, device: String, feed: String) {
    world.harness().upload(&device, &[&feed], &[]);
}

#[given("devices {first} and {second} are synchronised")]
fn devices_are_synchronised(world: &SyncWorld, first: String, second: String) {
    world.update_sync(vec![vec![&first, &second]], Vec::new());
}

#[given("device {device} has fetched its changes")]
fn device_has_fetched_changes(world: &SyncWorld, device: String) {
    world.fetch(&device);
}

// -----------------------------------------------------------------------------
// When Steps
// -----------------------------------------------------------------------------

#[when("device {device} fetches its changes")]
fn device_fetches_changes(world: &SyncWorld, device: String) {
    world.fetch(&device);
}

#[when("device {device} adds {feed}")]
fn device_adds(world: &SyncWorld, device: String, feed: String) {
    world.harness().upload(&device, &[&feed], &[]);
}

#[when("device {device} unsubscribes from {feed}")]
fn device_unsubscribes(world: &SyncWorld, device: String, feed: String) {
    world.harness().upload(&device, &[], &[&feed]);
}

#[when("device {device} stops synchronising")]
fn device_stops_synchronising(world: &SyncWorld, device: String) {
    world.update_sync(Vec::new(), vec![&device]);
}

// -----------------------------------------------------------------------------
// Then Steps
// -----------------------------------------------------------------------------

#[then("the changes for {device} add {feed}")]
fn the_changes_add(world: &SyncWorld, device: String, feed: String) {
    let changes = world.changes_for(&device);
    assert!(
        changes.add.contains(&url(&feed)),
        "expected {feed} in additions for {device}, got {:?}",
        changes.add
    );
}

#[then("the changes for {device} remove {feed}")]
fn the_changes_remove(world: &SyncWorld, device: String, feed: String) {
    let changes = world.changes_for(&device);
    assert!(
        changes.remove.contains(&url(&feed)),
        "expected {feed} in removals for {device}, got {:?}",
        changes.remove
    );
    assert!(!changes.add.contains(&url(&feed)));
}

#[then("the changes for {device} are empty")]
fn the_changes_are_empty(world: &SyncWorld, device: String) {
    let changes = world.changes_for(&device);
    assert!(changes.add.is_empty(), "unexpected additions {:?}", changes.add);
    assert!(changes.remove.is_empty(), "unexpected removals {:?}", changes.remove);
}

#[then("device {device} is not synchronised")]
fn device_is_not_synchronised(world: &SyncWorld, device: String) {
    let harness = world.harness();
    let status = harness
        .runtime
        .block_on(harness.sync.sync_status(&user()))
        .expect("status");
    assert!(status.not_synchronized.contains(&uid(&device)));
    assert!(status.synchronized.is_empty());
}

// -----------------------------------------------------------------------------
// Scenario Bindings
// -----------------------------------------------------------------------------

#[scenario(
    path = "tests/features/sync_convergence.feature",
    name = "Grouped devices adopt each other's subscriptions"
)]
fn grouped_devices_adopt_each_others_subscriptions(world: SyncWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/sync_convergence.feature",
    name = "Unsubscribing on one device reaches its peers"
)]
fn unsubscribing_reaches_peers(world: SyncWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/sync_convergence.feature",
    name = "Devices that stop synchronising no longer converge"
)]
fn stopped_devices_no_longer_converge(world: SyncWorld) {
    let _ = world;
}
