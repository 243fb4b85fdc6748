//! Subscription action log records.
//!
//! The log is append-only: every subscribe or unsubscribe a device reports
//! becomes one immutable [`SubscriptionAction`]. Current state is never stored
//! as a source of truth; it is projected from the log by
//! [`crate::domain::projection`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CanonicalUrl, DeviceId, Podcast, PodcastId};

/// Direction of a subscription change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionActionKind {
    /// The device subscribed to the podcast.
    Subscribe,
    /// The device unsubscribed from the podcast.
    Unsubscribe,
}

impl SubscriptionActionKind {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

impl fmt::Display for SubscriptionActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored action kind is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown subscription action {0}")]
pub struct UnknownSubscriptionAction(pub String);

impl FromStr for SubscriptionActionKind {
    type Err = UnknownSubscriptionAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscribe" => Ok(Self::Subscribe),
            "unsubscribe" => Ok(Self::Unsubscribe),
            other => Err(UnknownSubscriptionAction(other.to_owned())),
        }
    }
}

/// Position of an entry in a device's log.
///
/// Client clocks are neither unique nor monotonic, so the insertion sequence
/// breaks timestamp ties. Field order matters: the derived `Ord` compares the
/// timestamp first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogOrder {
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// Store-assigned, strictly increasing insertion counter.
    pub sequence_id: i64,
}

/// One committed entry of the subscription log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionAction {
    /// Device that reported (or was caught up with) the change.
    pub device: DeviceId,
    /// Podcast the change applies to.
    pub podcast: Podcast,
    /// Subscribe or unsubscribe.
    pub kind: SubscriptionActionKind,
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// Store-assigned insertion counter.
    pub sequence_id: i64,
}

impl SubscriptionAction {
    /// Last-write-wins ordering key.
    #[must_use]
    pub const fn order(&self) -> LogOrder {
        LogOrder {
            timestamp: self.timestamp,
            sequence_id: self.sequence_id,
        }
    }

    /// Identifier of the podcast this action targets.
    #[must_use]
    pub const fn podcast_id(&self) -> PodcastId {
        self.podcast.id
    }

    /// Canonical URL of the podcast this action targets.
    #[must_use]
    pub const fn url(&self) -> &CanonicalUrl {
        &self.podcast.url
    }
}

/// An action waiting to be appended; the store assigns the sequence id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewSubscriptionAction {
    /// Device the entry is recorded against.
    pub device: DeviceId,
    /// Target podcast.
    pub podcast: PodcastId,
    /// Subscribe or unsubscribe.
    pub kind: SubscriptionActionKind,
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
}

/// Result of appending a batch of log entries.
///
/// `absorbed` counts entries that collided with an existing
/// `(device, podcast, timestamp)` record. Those are treated as already
/// applied, so a retried request reports success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Entries newly written.
    pub inserted: usize,
    /// Entries that were already present.
    pub absorbed: usize,
}

/// Answer to a delta query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChanges {
    /// Podcasts whose last in-window action is a subscribe.
    pub add: Vec<CanonicalUrl>,
    /// Podcasts whose last in-window action is an unsubscribe.
    pub remove: Vec<CanonicalUrl>,
    /// Watermark to present as `since` on the next call.
    pub until: DateTime<Utc>,
}
