//! Tests for the podcast service.

use std::sync::Arc;

use super::*;
use crate::domain::ports::{
    FixtureSanitizingRuleRepository, MockPodcastRepository, SubscriptionActionRepository,
};
use crate::domain::{DeviceId, ErrorCode, NewSubscriptionAction, SubscriptionActionKind};
use crate::test_support::InMemoryStore;
use crate::test_support::fixtures::{at, url};

fn in_memory_service(store: &Arc<InMemoryStore>) -> PodcastService<InMemoryStore, InMemoryStore> {
    PodcastService::new(store.clone(), store.clone(), RetryPolicy::default())
}

#[tokio::test]
async fn resolve_creates_missing_podcast_once() {
    let store = Arc::new(InMemoryStore::new());
    let service = in_memory_service(&store);
    let feed = url("https://example.com/feed");

    let first = service.resolve(&feed).await.expect("created");
    let second = service.resolve(&feed).await.expect("found");

    assert_eq!(first, second);
    assert_eq!(store.podcasts().len(), 1);
}

#[tokio::test]
async fn resolve_rereads_after_losing_insert_race() {
    let store = Arc::new(InMemoryStore::new());
    store.race_next_podcast_creates(1);
    let service = in_memory_service(&store);
    let feed = url("https://example.com/raced");

    let podcast = service.resolve(&feed).await.expect("resolved on retry");

    assert_eq!(podcast.url, feed);
    assert_eq!(store.podcasts(), vec![podcast]);
}

#[tokio::test]
async fn resolve_reports_conflict_when_every_attempt_collides() {
    let mut repo = MockPodcastRepository::new();
    repo.expect_find_by_url().times(2).returning(|_| Ok(None));
    repo.expect_create()
        .times(2)
        .returning(|url| Err(PodcastRepositoryError::duplicate_key(url.as_str())));
    let service = PodcastService::new(
        Arc::new(repo),
        Arc::new(FixtureSanitizingRuleRepository),
        RetryPolicy::new(2),
    );

    let error = service
        .resolve(&url("https://example.com/feed"))
        .await
        .expect_err("retries exhausted");

    assert_eq!(error.code(), ErrorCode::Conflict);
}

#[tokio::test]
async fn resolve_maps_connection_failures_to_service_unavailable() {
    let mut repo = MockPodcastRepository::new();
    repo.expect_find_by_url()
        .times(1)
        .return_once(|_| Err(PodcastRepositoryError::connection("refused")));
    let service = PodcastService::new(
        Arc::new(repo),
        Arc::new(FixtureSanitizingRuleRepository),
        RetryPolicy::default(),
    );

    let error = service
        .resolve(&url("https://example.com/feed"))
        .await
        .expect_err("unavailable");

    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
}

#[tokio::test]
async fn delete_removes_log_entries_before_the_podcast() {
    let store = Arc::new(InMemoryStore::new());
    let service = in_memory_service(&store);
    let feed = url("https://example.com/feed");
    let podcast = service.resolve(&feed).await.expect("created");
    store
        .append(&[NewSubscriptionAction {
            device: DeviceId::random(),
            podcast: podcast.id,
            kind: SubscriptionActionKind::Subscribe,
            timestamp: at(0),
        }])
        .await
        .expect("appended");

    let deletion = service.delete_podcast(&feed).await.expect("deleted");

    assert_eq!(deletion.subscription_actions, 1);
    assert!(deletion.podcast_removed);
    assert!(store.subscription_log().is_empty());
    assert!(store.podcasts().is_empty());
}

#[tokio::test]
async fn delete_of_unknown_podcast_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let service = in_memory_service(&store);

    let error = service
        .delete_podcast(&url("https://example.com/missing"))
        .await
        .expect_err("not found");

    assert_eq!(error.code(), ErrorCode::NotFound);
}
