//! Tests for the subscription service.

use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::domain::ports::{DeviceRepository, SyncCommand, UpdateSyncRequest};
use crate::domain::{Device, ErrorCode, Podcast, SanitizingRule};
use crate::test_support::fixtures::{at, uid, url, user};
use crate::test_support::{InMemoryStore, MutableClock};

type Service = SubscriptionService<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;

struct Harness {
    store: Arc<InMemoryStore>,
    clock: Arc<MutableClock>,
    service: Service,
}

fn harness_with(store: InMemoryStore) -> Harness {
    let store = Arc::new(store);
    let clock = Arc::new(MutableClock::new(at(100)));
    let podcasts = PodcastService::new(store.clone(), store.clone(), RetryPolicy::default());
    let service = SubscriptionService::new(
        store.clone(),
        store.clone(),
        podcasts,
        clock.clone(),
        RetryPolicy::default(),
    );
    Harness {
        store,
        clock,
        service,
    }
}

fn harness() -> Harness {
    harness_with(InMemoryStore::new())
}

fn upload(device: &str, add: &[&str], remove: &[&str]) -> ApplySubscriptionChangesRequest {
    ApplySubscriptionChangesRequest {
        user_id: user(),
        device: uid(device),
        add: add.iter().map(|url| (*url).to_owned()).collect(),
        remove: remove.iter().map(|url| (*url).to_owned()).collect(),
    }
}

fn delta(device: &str, since: i64) -> SubscriptionChangesRequest {
    SubscriptionChangesRequest {
        user_id: user(),
        device: uid(device),
        since: at(since),
    }
}

#[tokio::test]
async fn uploaded_subscriptions_appear_in_the_delta() {
    let h = harness();

    let response = h
        .service
        .apply_changes(upload("phone", &["https://a.example/feed"], &[]))
        .await
        .expect("applied");
    h.clock.advance_seconds(5);
    let changes = h.service.changes(delta("phone", 0)).await.expect("delta");

    assert_eq!(response.timestamp, at(100));
    assert!(response.update_urls.is_empty());
    assert_eq!(changes.add, vec![url("https://a.example/feed")]);
    assert!(changes.remove.is_empty());
    assert_eq!(changes.until, at(105));
}

#[tokio::test]
async fn delta_excludes_entries_at_the_since_watermark() {
    let h = harness();
    let response = h
        .service
        .apply_changes(upload("phone", &["https://a.example/feed"], &[]))
        .await
        .expect("applied");

    let changes = h
        .service
        .changes(SubscriptionChangesRequest {
            user_id: user(),
            device: uid("phone"),
            since: response.timestamp,
        })
        .await
        .expect("delta");

    assert!(changes.add.is_empty());
    assert!(changes.remove.is_empty());
}

#[tokio::test]
async fn window_reads_are_stable_while_the_log_grows() {
    let store = InMemoryStore::new();
    let phone = store.ensure(&user(), &uid("phone")).await.expect("phone");
    let laptop = store.ensure(&user(), &uid("laptop")).await.expect("laptop");
    let news = store.create(&url("https://news.example/feed")).await.expect("news");
    let jazz = store.create(&url("https://jazz.example/feed")).await.expect("jazz");
    let entry = |device: &Device, podcast: &Podcast, kind, second| NewSubscriptionAction {
        device: device.id,
        podcast: podcast.id,
        kind,
        timestamp: at(second),
    };
    store.record(entry(&phone, &news, SubscriptionActionKind::Subscribe, 10));
    store.record(entry(&phone, &jazz, SubscriptionActionKind::Subscribe, 20));
    let (since, until) = (at(0), at(30));

    let first = fold_window(
        store.list_window(&phone.id, since, until).await.expect("window"),
        until,
    );
    store.record(entry(&laptop, &news, SubscriptionActionKind::Unsubscribe, 25));
    store.record(entry(&phone, &jazz, SubscriptionActionKind::Unsubscribe, 31));
    let second = fold_window(
        store.list_window(&phone.id, since, until).await.expect("window"),
        until,
    );

    assert_eq!(first, second);
    assert_eq!(
        second.add,
        vec![url("https://jazz.example/feed"), url("https://news.example/feed")]
    );
    assert!(second.remove.is_empty());
}

#[tokio::test]
async fn later_unsubscribe_wins_in_the_delta() {
    let h = harness();
    h.service
        .apply_changes(upload("phone", &["https://a.example/feed"], &[]))
        .await
        .expect("subscribed");
    h.clock.advance_seconds(1);
    h.service
        .apply_changes(upload("phone", &[], &["https://a.example/feed"]))
        .await
        .expect("unsubscribed");

    let changes = h.service.changes(delta("phone", 0)).await.expect("delta");

    assert!(changes.add.is_empty());
    assert_eq!(changes.remove, vec![url("https://a.example/feed")]);
}

#[tokio::test]
async fn overlapping_add_and_remove_is_rejected_before_writing() {
    let h = harness();

    let error = h
        .service
        .apply_changes(upload(
            "phone",
            &["https://a.example/feed"],
            &["https://a.example/feed"],
        ))
        .await
        .expect_err("overlap");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
    assert!(h.store.subscription_log().is_empty());
    assert!(
        h.store
            .find(&user(), &uid("phone"))
            .await
            .expect("lookup")
            .is_none()
    );
}

#[tokio::test]
async fn add_wins_when_both_sides_canonicalise_to_one_url() {
    let h = harness();

    let response = h
        .service
        .apply_changes(upload(
            "phone",
            &["https://Example.com/feed#top"],
            &["https://example.com/feed"],
        ))
        .await
        .expect("applied");

    let kinds: Vec<_> = h
        .store
        .subscription_log()
        .into_iter()
        .map(|action| action.kind)
        .collect();
    assert_eq!(kinds, vec![SubscriptionActionKind::Subscribe]);
    assert_eq!(
        response.update_urls,
        vec![UrlRewrite {
            original: "https://Example.com/feed#top".to_owned(),
            canonical: "https://example.com/feed".to_owned(),
        }]
    );
}

#[rstest]
#[case("not a url")]
#[case("   ")]
#[tokio::test]
async fn urls_without_canonical_form_are_dropped_and_reported(#[case] raw: &str) {
    let h = harness();

    let response = h
        .service
        .apply_changes(upload("phone", &[raw], &[]))
        .await
        .expect("applied");

    assert!(h.store.subscription_log().is_empty());
    assert_eq!(
        response.update_urls,
        vec![UrlRewrite {
            original: raw.to_owned(),
            canonical: String::new(),
        }]
    );
}

#[tokio::test]
async fn configured_rules_rewrite_feed_urls() {
    let h = harness_with(InMemoryStore::with_rules(vec![SanitizingRule {
        priority: 1,
        search: r"^http://".to_owned(),
        replace: "https://".to_owned(),
        use_podcast: true,
        use_episode: false,
    }]));

    h.service
        .apply_changes(upload("phone", &["http://a.example/feed"], &[]))
        .await
        .expect("applied");

    assert_eq!(
        h.store.podcasts().first().map(|podcast| podcast.url.clone()),
        Some(url("https://a.example/feed"))
    );
}

#[tokio::test]
async fn repeated_upload_at_the_same_instant_is_absorbed() {
    let h = harness();
    let request = upload("phone", &["https://a.example/feed"], &[]);

    h.service
        .apply_changes(request.clone())
        .await
        .expect("first");
    h.service.apply_changes(request).await.expect("replayed");

    assert_eq!(h.store.subscription_log().len(), 1);
}

#[tokio::test]
async fn delta_for_unknown_device_is_not_found() {
    let h = harness();

    let error = h
        .service
        .changes(delta("ghost", 0))
        .await
        .expect_err("unknown device");

    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn grouped_device_pulls_peer_subscriptions_into_its_delta() {
    let h = harness();
    h.service
        .apply_changes(upload("phone", &["https://a.example/feed"], &[]))
        .await
        .expect("phone");
    h.service
        .apply_changes(upload("laptop", &[], &[]))
        .await
        .expect("laptop");
    let sync = SyncService::new(
        h.store.clone(),
        h.store.clone(),
        h.clock.clone(),
        RetryPolicy::default(),
    );
    sync.update_sync(UpdateSyncRequest {
        user_id: user(),
        synchronize: vec![vec![uid("phone"), uid("laptop")]],
        stop_synchronize: Vec::new(),
    })
    .await
    .expect("grouped");
    h.clock.advance_seconds(10);
    h.service
        .apply_changes(upload("phone", &["https://b.example/feed"], &[]))
        .await
        .expect("second feed");

    let changes = h.service.changes(delta("laptop", 0)).await.expect("delta");

    assert_eq!(
        changes.add,
        vec![url("https://a.example/feed"), url("https://b.example/feed")]
    );
}
