//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Each repository implements one driven port from [`crate::domain::ports`]
//! on top of a shared `bb8` pool of `diesel-async` connections. Row structs
//! (`models.rs`) and table definitions (`schema.rs`) stay private to this
//! module; adapters translate rows into validated domain types and map every
//! database failure onto the port's error enum.
//!
//! Log tables are append-only here: the only statement that deletes log rows
//! is the explicit cascade in [`DieselPodcastRepository`].
//!
//! ```no_run
//! # async fn connect() -> Result<(), Box<dyn std::error::Error>> {
//! use podsync::outbound::persistence::{DbPool, DieselDeviceRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/podsync")).await?;
//! let devices = DieselDeviceRepository::new(pool);
//! # let _ = devices;
//! # Ok(())
//! # }
//! ```

mod diesel_device_repository;
mod diesel_episode_action_repository;
mod diesel_error_mapping;
mod diesel_podcast_repository;
mod diesel_sanitizing_rule_repository;
mod diesel_subscription_action_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_device_repository::DieselDeviceRepository;
pub use diesel_episode_action_repository::DieselEpisodeActionRepository;
pub use diesel_podcast_repository::DieselPodcastRepository;
pub use diesel_sanitizing_rule_repository::DieselSanitizingRuleRepository;
pub use diesel_subscription_action_repository::DieselSubscriptionActionRepository;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
