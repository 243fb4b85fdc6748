//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{
    DeviceCommand, DeviceQuery, EpisodeActionCommand, EpisodeActionQuery,
    FixtureDeviceCommand, FixtureDeviceQuery, FixtureEpisodeActionCommand,
    FixtureEpisodeActionQuery, FixtureSubscriptionCommand, FixtureSubscriptionQuery,
    FixtureSyncCommand, FixtureSyncQuery, SubscriptionCommand, SubscriptionQuery, SyncCommand,
    SyncQuery,
};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub subscriptions: Arc<dyn SubscriptionCommand>,
    pub subscriptions_query: Arc<dyn SubscriptionQuery>,
    pub episodes: Arc<dyn EpisodeActionCommand>,
    pub episodes_query: Arc<dyn EpisodeActionQuery>,
    pub devices: Arc<dyn DeviceCommand>,
    pub devices_query: Arc<dyn DeviceQuery>,
    pub sync: Arc<dyn SyncCommand>,
    pub sync_query: Arc<dyn SyncQuery>,
}

impl HttpState {
    /// State backed entirely by fixture ports.
    ///
    /// Used when no database is configured and as the base for handler tests,
    /// which replace individual ports with mocks.
    ///
    /// # Examples
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use podsync::domain::ports::FixtureSyncQuery;
    /// use podsync::inbound::http::state::HttpState;
    ///
    /// let state = HttpState {
    ///     sync_query: Arc::new(FixtureSyncQuery),
    ///     ..HttpState::fixtures()
    /// };
    /// let _sync = state.sync_query.clone();
    /// ```
    #[must_use]
    pub fn fixtures() -> Self {
        Self {
            subscriptions: Arc::new(FixtureSubscriptionCommand),
            subscriptions_query: Arc::new(FixtureSubscriptionQuery),
            episodes: Arc::new(FixtureEpisodeActionCommand),
            episodes_query: Arc::new(FixtureEpisodeActionQuery),
            devices: Arc::new(FixtureDeviceCommand),
            devices_query: Arc::new(FixtureDeviceQuery),
            sync: Arc::new(FixtureSyncCommand),
            sync_query: Arc::new(FixtureSyncQuery),
        }
    }

    /// Build state from one service implementing every port.
    ///
    /// Lets the in-memory wiring share a single store across all handlers.
    #[must_use]
    pub fn from_services<S, E, D, Y>(
        subscriptions: Arc<S>,
        episodes: Arc<E>,
        devices: Arc<D>,
        sync: Arc<Y>,
    ) -> Self
    where
        S: SubscriptionCommand + SubscriptionQuery + 'static,
        E: EpisodeActionCommand + EpisodeActionQuery + 'static,
        D: DeviceCommand + DeviceQuery + 'static,
        Y: SyncCommand + SyncQuery + 'static,
    {
        Self {
            subscriptions: subscriptions.clone(),
            subscriptions_query: subscriptions,
            episodes: episodes.clone(),
            episodes_query: episodes,
            devices: devices.clone(),
            devices_query: devices,
            sync: sync.clone(),
            sync_query: sync,
        }
    }
}
