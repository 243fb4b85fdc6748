//! HTTP inbound adapter exposing the `/api/2` sync endpoints.

pub mod devices;
pub mod episodes;
pub mod error;
pub mod health;
pub mod schemas;
pub mod session;
pub mod state;
pub mod subscriptions;
pub mod sync_devices;
#[cfg(test)]
pub mod test_utils;
pub mod validation;

pub use error::ApiResult;
