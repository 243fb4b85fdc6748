//! Catch-up computation for grouped devices.
//!
//! Given the projection of a device and of each of its group peers, the
//! engine selects the peer actions the device must adopt to agree with the
//! group. The computation runs in two stages so the caller can re-read the
//! device's projection between them:
//!
//! 1. [`adoption_candidates`] picks, per podcast, the newest peer action that
//!    would change the device's state.
//! 2. [`net_changes`] drops candidates that a fresh projection of the device
//!    already agrees with.
//!
//! [`catch_up_timestamp`] then stamps each adopted entry so that it sorts
//! after everything the device already logged for the podcast.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};

use super::{PodcastId, Projection, SubscriptionAction, SubscriptionActionKind};

/// Peer actions the device should adopt, keyed by podcast.
pub type Candidates = BTreeMap<PodcastId, SubscriptionAction>;

/// Collect the newest adoptable peer action per podcast.
///
/// A podcast the device has never acted on only adopts a peer's subscribe;
/// telling a device to unsubscribe from something it never followed would be
/// a state change nobody asked for. A podcast the device has acted on adopts
/// a peer action only when it is strictly newer and points the other way.
#[must_use]
pub fn adoption_candidates(own: &Projection, peers: &[Projection]) -> Candidates {
    let mut candidates = Candidates::new();
    for peer in peers {
        for (podcast, theirs) in peer {
            let adopt = match own.get(podcast) {
                None => theirs.kind == SubscriptionActionKind::Subscribe,
                Some(mine) => theirs.order() > mine.order() && theirs.kind != mine.kind,
            };
            if !adopt {
                continue;
            }
            match candidates.get(podcast) {
                Some(existing) if existing.order() >= theirs.order() => {}
                _ => {
                    candidates.insert(*podcast, theirs.clone());
                }
            }
        }
    }
    candidates
}

/// Keep only candidates that change `fresh` (the device's current projection).
///
/// A candidate whose kind matches what the device already holds for the
/// podcast is dropped, so the result contains net changes only. An unsubscribe
/// for a podcast absent from `fresh` is dropped as well.
#[must_use]
pub fn net_changes(candidates: Candidates, fresh: &Projection) -> Vec<SubscriptionAction> {
    candidates
        .into_values()
        .filter(|candidate| match fresh.get(&candidate.podcast_id()) {
            Some(current) => current.kind != candidate.kind,
            None => candidate.kind == SubscriptionActionKind::Subscribe,
        })
        .collect()
}

/// Timestamp for a catch-up entry of `podcast` recorded at `now`.
///
/// Normally `now`. When the device already has an entry for the podcast at or
/// after `now`, the entry is placed one microsecond later so it neither
/// collides with the `(device, podcast, timestamp)` key nor loses to it.
#[must_use]
pub fn catch_up_timestamp(
    fresh: &Projection,
    podcast: PodcastId,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match fresh.get(&podcast) {
        Some(current) if current.timestamp >= now => {
            current.timestamp + TimeDelta::microseconds(1)
        }
        _ => now,
    }
}
