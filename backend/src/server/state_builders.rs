//! Builders wiring domain services onto repository adapters.

use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock};

use podsync::domain::ports::{
    DeviceRepository, EpisodeActionRepository, PodcastRepository, SanitizingRuleRepository,
    SubscriptionActionRepository,
};
use podsync::domain::{
    DeviceService, EpisodeActionService, PodcastService, RetryPolicy, SubscriptionService,
    SyncService,
};
use podsync::inbound::http::state::HttpState;
use podsync::outbound::persistence::{
    DbPool, DieselDeviceRepository, DieselEpisodeActionRepository, DieselPodcastRepository,
    DieselSanitizingRuleRepository, DieselSubscriptionActionRepository,
};

use super::ServerConfig;

/// Repositories every service draws from.
pub(super) struct Repositories<S, D, E, P, R> {
    pub log: Arc<S>,
    pub devices: Arc<D>,
    pub journal: Arc<E>,
    pub podcasts: Arc<P>,
    pub rules: Arc<R>,
}

impl
    Repositories<
        DieselSubscriptionActionRepository,
        DieselDeviceRepository,
        DieselEpisodeActionRepository,
        DieselPodcastRepository,
        DieselSanitizingRuleRepository,
    >
{
    fn diesel(pool: &DbPool) -> Self {
        Self {
            log: Arc::new(DieselSubscriptionActionRepository::new(pool.clone())),
            devices: Arc::new(DieselDeviceRepository::new(pool.clone())),
            journal: Arc::new(DieselEpisodeActionRepository::new(pool.clone())),
            podcasts: Arc::new(DieselPodcastRepository::new(pool.clone())),
            rules: Arc::new(DieselSanitizingRuleRepository::new(pool.clone())),
        }
    }
}

/// Build every service over `repos` and expose them as HTTP ports.
pub(super) fn services_state<S, D, E, P, R>(
    repos: Repositories<S, D, E, P, R>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
) -> HttpState
where
    S: SubscriptionActionRepository + 'static,
    D: DeviceRepository + 'static,
    E: EpisodeActionRepository + 'static,
    P: PodcastRepository + 'static,
    R: SanitizingRuleRepository + 'static,
{
    let Repositories {
        log,
        devices,
        journal,
        podcasts,
        rules,
    } = repos;
    let podcasts = PodcastService::new(podcasts, rules, retry);
    HttpState::from_services(
        Arc::new(SubscriptionService::new(
            log.clone(),
            devices.clone(),
            podcasts.clone(),
            clock.clone(),
            retry,
        )),
        Arc::new(EpisodeActionService::new(
            journal,
            devices.clone(),
            podcasts,
            clock.clone(),
        )),
        Arc::new(DeviceService::new(devices.clone(), log.clone())),
        Arc::new(SyncService::new(log, devices, clock, retry)),
    )
}

/// HTTP state for `config`: Diesel-backed services when a pool is
/// configured, fixture ports otherwise.
pub(super) fn build_http_state(config: &ServerConfig) -> web::Data<HttpState> {
    let state = match &config.db_pool {
        Some(pool) => services_state(
            Repositories::diesel(pool),
            Arc::new(DefaultClock),
            config.retry,
        ),
        None => HttpState::fixtures(),
    };
    web::Data::new(state)
}

#[cfg(test)]
mod tests {
    //! Wiring checks against the in-memory store.

    use podsync::domain::ports::{
        ApplySubscriptionChangesRequest, SubscriptionChangesRequest, UpdateDeviceRequest,
        UpdateSyncRequest,
    };
    use podsync::test_support::fixtures::{at, uid, url, user};
    use podsync::test_support::{InMemoryStore, MutableClock};
    use rstest::rstest;

    use super::*;

    fn in_memory_state() -> (HttpState, Arc<MutableClock>) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(MutableClock::new(at(100)));
        let state = services_state(
            Repositories {
                log: store.clone(),
                devices: store.clone(),
                journal: store.clone(),
                podcasts: store.clone(),
                rules: store,
            },
            clock.clone(),
            RetryPolicy::default(),
        );
        (state, clock)
    }

    #[rstest]
    #[tokio::test]
    async fn all_ports_share_one_store() {
        let (state, clock) = in_memory_state();
        state
            .subscriptions
            .apply_changes(ApplySubscriptionChangesRequest {
                user_id: user(),
                device: uid("phone"),
                add: vec!["https://a.example/feed".to_owned()],
                remove: Vec::new(),
            })
            .await
            .expect("applied");
        state
            .devices
            .update_device(UpdateDeviceRequest {
                user_id: user(),
                device: uid("laptop"),
                caption: None,
                device_type: None,
            })
            .await
            .expect("laptop");
        state
            .sync
            .update_sync(UpdateSyncRequest {
                user_id: user(),
                synchronize: vec![vec![uid("phone"), uid("laptop")]],
                stop_synchronize: Vec::new(),
            })
            .await
            .expect("grouped");
        clock.advance_seconds(1);

        let changes = state
            .subscriptions_query
            .changes(SubscriptionChangesRequest {
                user_id: user(),
                device: uid("laptop"),
                since: at(0),
            })
            .await
            .expect("delta");
        let devices = state.devices_query.list_devices(&user()).await.expect("listed");

        assert_eq!(changes.add, vec![url("https://a.example/feed")]);
        assert!(devices.iter().all(|summary| summary.subscriptions == 1));
    }
}
