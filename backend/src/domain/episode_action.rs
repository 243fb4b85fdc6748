//! Episode action journal.
//!
//! Unlike subscriptions, episode actions are not resolved last-write-wins:
//! every distinct download, play or delete is kept. Merging two contributions
//! unions them, drops exact duplicates and orders the result by timestamp.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::{CanonicalUrl, DeviceUid, DeviceValidationError, Podcast};

/// What a client did with an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeActionKind {
    /// Media was downloaded.
    Download,
    /// Playback progressed.
    Play,
    /// Local media was deleted.
    Delete,
    /// The episode was marked new.
    New,
    /// The episode was flattr'd.
    Flattr,
}

impl EpisodeActionKind {
    /// Wire and storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Play => "play",
            Self::Delete => "delete",
            Self::New => "new",
            Self::Flattr => "flattr",
        }
    }
}

impl fmt::Display for EpisodeActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EpisodeActionKind {
    type Err = EpisodeActionValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download" => Ok(Self::Download),
            "play" => Ok(Self::Play),
            "delete" => Ok(Self::Delete),
            "new" => Ok(Self::New),
            "flattr" => Ok(Self::Flattr),
            other => Err(EpisodeActionValidationError::UnknownAction(other.to_owned())),
        }
    }
}

/// Validation failures for submitted episode actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EpisodeActionValidationError {
    /// The action name is not one of the known kinds.
    #[error("unknown episode action {0}")]
    UnknownAction(String),
    /// Playback fields were supplied for an action other than `play`.
    #[error("{field} is only valid for play actions, not {action}")]
    PlaybackWithoutPlay {
        /// Offending field name.
        field: &'static str,
        /// Kind the field was attached to.
        action: EpisodeActionKind,
    },
    /// A playback field was negative or out of range.
    #[error("{field} must be a non-negative number of seconds")]
    InvalidPlaybackValue {
        /// Offending field name.
        field: &'static str,
    },
    /// The timestamp did not parse.
    #[error("invalid timestamp {0}")]
    InvalidTimestamp(String),
    /// The device uid was malformed.
    #[error(transparent)]
    Device(#[from] DeviceValidationError),
}

/// An episode, identified by its podcast and canonical media URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeRef {
    /// Podcast the episode belongs to.
    pub podcast: Podcast,
    /// Canonical episode URL.
    pub url: CanonicalUrl,
}

/// Playback progress in seconds; only meaningful for `play` actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Playback {
    /// Where playback started.
    pub started: Option<u32>,
    /// Where playback stopped.
    pub position: Option<u32>,
    /// Episode length.
    pub total: Option<u32>,
}

impl Playback {
    /// Whether no playback field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.started.is_none() && self.position.is_none() && self.total.is_none()
    }

    fn first_field(&self) -> Option<&'static str> {
        if self.position.is_some() {
            Some("position")
        } else if self.started.is_some() {
            Some("started")
        } else if self.total.is_some() {
            Some("total")
        } else {
            None
        }
    }
}

/// One entry of a user's episode journal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EpisodeAction {
    /// Episode acted on.
    pub episode: EpisodeRef,
    /// Reporting device, when the client named one.
    pub device: Option<DeviceUid>,
    /// What happened.
    pub kind: EpisodeActionKind,
    /// When it happened, truncated to whole seconds.
    pub timestamp: DateTime<Utc>,
    /// Playback progress for `play` actions.
    pub playback: Playback,
}

/// An episode action as submitted by a client, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeActionSubmission {
    /// Podcast feed URL as sent.
    pub podcast: String,
    /// Episode media URL as sent.
    pub episode: String,
    /// Reporting device uid.
    pub device: Option<String>,
    /// Action name.
    pub action: String,
    /// ISO-8601 timestamp; defaults to the upload time.
    pub timestamp: Option<String>,
    /// Playback start in seconds.
    pub started: Option<i64>,
    /// Playback position in seconds.
    pub position: Option<i64>,
    /// Episode length in seconds.
    pub total: Option<i64>,
}

/// A submission whose fields have been validated, with URLs still raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    /// Podcast feed URL as sent.
    pub podcast: String,
    /// Episode media URL as sent.
    pub episode: String,
    /// Reporting device uid.
    pub device: Option<DeviceUid>,
    /// Parsed action kind.
    pub kind: EpisodeActionKind,
    /// Parsed timestamp.
    pub timestamp: DateTime<Utc>,
    /// Playback progress.
    pub playback: Playback,
}

impl EpisodeActionSubmission {
    /// Validate every field except the URLs, which the sanitizer handles.
    ///
    /// `now` is used when the client omitted the timestamp.
    pub fn validate(
        self,
        now: DateTime<Utc>,
    ) -> Result<ValidatedSubmission, EpisodeActionValidationError> {
        let kind: EpisodeActionKind = self.action.parse()?;
        let playback = Playback {
            started: seconds("started", self.started)?,
            position: seconds("position", self.position)?,
            total: seconds("total", self.total)?,
        };
        if kind != EpisodeActionKind::Play {
            if let Some(field) = playback.first_field() {
                return Err(EpisodeActionValidationError::PlaybackWithoutPlay {
                    field,
                    action: kind,
                });
            }
        }
        let timestamp = match self.timestamp.as_deref() {
            Some(raw) => parse_timestamp(raw)?,
            None => now.trunc_subsecs(0),
        };
        let device = self.device.map(DeviceUid::new).transpose()?;

        Ok(ValidatedSubmission {
            podcast: self.podcast,
            episode: self.episode,
            device,
            kind,
            timestamp,
            playback,
        })
    }
}

fn seconds(
    field: &'static str,
    value: Option<i64>,
) -> Result<Option<u32>, EpisodeActionValidationError> {
    value
        .map(|raw| {
            u32::try_from(raw).map_err(|_| EpisodeActionValidationError::InvalidPlaybackValue { field })
        })
        .transpose()
}

/// Parse a client timestamp.
///
/// Accepts RFC 3339 and naive `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC).
/// Sub-second precision is discarded.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EpisodeActionValidationError> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|value| value.and_utc())
        })
        .map_err(|_| EpisodeActionValidationError::InvalidTimestamp(raw.to_owned()))?;
    Ok(parsed.trunc_subsecs(0))
}

/// Union `existing` and `incoming`, dropping exact duplicates.
///
/// The result is ordered by timestamp; actions with equal timestamps keep
/// their first-seen order. Merging the same input twice changes nothing.
///
/// # Examples
/// ```
/// use podsync::domain::merge_episode_actions;
///
/// assert!(merge_episode_actions(Vec::new(), Vec::new()).is_empty());
/// ```
#[must_use]
pub fn merge_episode_actions(
    existing: Vec<EpisodeAction>,
    incoming: Vec<EpisodeAction>,
) -> Vec<EpisodeAction> {
    let mut seen = HashSet::new();
    let mut merged: Vec<EpisodeAction> = existing
        .into_iter()
        .chain(incoming)
        .filter(|action| seen.insert(action.clone()))
        .collect();
    merged.sort_by_key(|action| action.timestamp);
    merged
}

/// Keep only the newest action per episode, ordered by timestamp.
#[must_use]
pub fn latest_per_episode(actions: Vec<EpisodeAction>) -> Vec<EpisodeAction> {
    let mut latest: BTreeMap<EpisodeRef, EpisodeAction> = BTreeMap::new();
    for action in actions {
        match latest.get(&action.episode) {
            Some(current) if current.timestamp > action.timestamp => {}
            _ => {
                latest.insert(action.episode.clone(), action);
            }
        }
    }
    let mut result: Vec<_> = latest.into_values().collect();
    result.sort_by_key(|action| action.timestamp);
    result
}
