//! Podcast identity.
//!
//! A podcast is identified by its canonical feed URL, the output of the
//! sanitizing pipeline in [`crate::domain::sanitizing`]. The surrogate id is
//! what log entries reference.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Surrogate key of a stored podcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodcastId(Uuid);

impl PodcastId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap a UUID read from storage.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PodcastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A URL that has passed the sanitizing pipeline and is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalUrl(String);

/// Returned when a canonical URL would be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("canonical URL must not be empty")]
pub struct EmptyUrlError;

impl CanonicalUrl {
    /// Wrap an already sanitized URL.
    ///
    /// Only the sanitizer and storage adapters should call this; everything
    /// else obtains canonical URLs from [`crate::domain::UrlSanitizer`].
    pub fn new(url: impl Into<String>) -> Result<Self, EmptyUrlError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(EmptyUrlError);
        }
        Ok(Self(url))
    }

    /// Borrow the URL text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CanonicalUrl {
    type Error = EmptyUrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CanonicalUrl> for String {
    fn from(value: CanonicalUrl) -> Self {
        value.0
    }
}

/// A podcast record resolved from its canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Podcast {
    /// Storage identifier.
    pub id: PodcastId,
    /// Canonical feed URL.
    pub url: CanonicalUrl,
}
