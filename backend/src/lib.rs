//! Podcast subscription and episode action synchronisation service.
//!
//! The [`domain`] module holds the reconciliation logic (last-write-wins
//! projection, delta feed, sync groups and the episode journal) behind ports;
//! [`inbound`] and [`outbound`] adapt it to HTTP and PostgreSQL.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::Trace;
