//! Test utilities for the backend crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`) via
//! the `test-support` feature.

mod clock;
mod in_memory;

pub use clock::MutableClock;
pub use in_memory::InMemoryStore;

pub mod fixtures {
    //! Builders for the values most tests need.

    use chrono::{DateTime, TimeZone, Utc};

    use crate::domain::{CanonicalUrl, DeviceUid, UserId};

    /// Stable user for single-account scenarios.
    pub fn user() -> UserId {
        UserId::new("11111111-1111-1111-1111-111111111111").unwrap_or_else(|err| {
            panic!("fixture user id: {err}");
        })
    }

    /// Second account used for cross-user checks.
    pub fn other_user() -> UserId {
        UserId::new("22222222-2222-2222-2222-222222222222").unwrap_or_else(|err| {
            panic!("fixture user id: {err}");
        })
    }

    /// Device uid from a literal.
    pub fn uid(value: &str) -> DeviceUid {
        DeviceUid::new(value).unwrap_or_else(|err| panic!("fixture device uid {value}: {err}"))
    }

    /// Canonical URL from a literal.
    pub fn url(value: &str) -> CanonicalUrl {
        CanonicalUrl::new(value).unwrap_or_else(|err| panic!("fixture url {value}: {err}"))
    }

    /// Whole seconds after a fixed epoch, keeping test timelines readable.
    pub fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0)
            .single()
            .unwrap_or_else(|| panic!("fixture timestamp {seconds}"))
    }
}
