//! Server entry-point: loads settings, prepares storage and serves `/api/2`.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

mod server;

use std::io;

use actix_web::cookie::SameSite;
use actix_web::web;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use podsync::inbound::http::health::HealthState;
use podsync::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};

use server::{ServerConfig, ServerSettings, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = ServerSettings::load()
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    let key = settings.session_key().map_err(io::Error::other)?;
    let bind_addr = settings.bind_addr().map_err(io::Error::other)?;

    let mut config = ServerConfig::new(key, settings.cookie_secure, SameSite::Lax, bind_addr)
        .with_retry(settings.retry_policy());

    match settings.database_url.as_deref() {
        Some(database_url) => {
            let applied = run_pending_migrations(database_url)
                .await
                .map_err(|error| io::Error::other(format!("apply migrations: {error}")))?;
            info!(applied, "database migrations complete");
            let pool = DbPool::new(PoolConfig::new(database_url))
                .await
                .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
            config = config.with_db_pool(pool);
        }
        None => warn!("no database configured; serving fixture data"),
    }

    let health_state = web::Data::new(HealthState::new());
    info!(%bind_addr, "starting podsync");
    create_server(health_state, config)?.await
}
