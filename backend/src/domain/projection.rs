//! Pure projections over the subscription log.
//!
//! Every function here is a fold over already-loaded log entries, so the
//! results are reproducible from the log alone and can be tested against plain
//! data.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{PodcastId, SubscriptionAction, SubscriptionActionKind, SubscriptionChanges};

/// Current state of one device: the winning action per podcast.
///
/// A podcast with no entry has never been acted on by the device, which is
/// distinct from being explicitly unsubscribed.
pub type Projection = BTreeMap<PodcastId, SubscriptionAction>;

/// Last-write-wins winner among `actions`.
///
/// The greatest `(timestamp, sequence_id)` wins. `None` when the slice holds
/// no actions.
///
/// # Examples
/// ```
/// use podsync::domain::latest_action;
///
/// assert!(latest_action(&[]).is_none());
/// ```
#[must_use]
pub fn latest_action(actions: &[SubscriptionAction]) -> Option<&SubscriptionAction> {
    actions.iter().max_by_key(|action| action.order())
}

/// Project a device's log into one winning action per podcast.
#[must_use]
pub fn latest_actions<I>(actions: I) -> Projection
where
    I: IntoIterator<Item = SubscriptionAction>,
{
    let mut projection = Projection::new();
    for action in actions {
        match projection.get(&action.podcast_id()) {
            Some(current) if current.order() >= action.order() => {}
            _ => {
                projection.insert(action.podcast_id(), action);
            }
        }
    }
    projection
}

/// Number of podcasts a projection reports as subscribed.
#[must_use]
pub fn subscribed_count(projection: &Projection) -> usize {
    projection
        .values()
        .filter(|action| action.kind == SubscriptionActionKind::Subscribe)
        .count()
}

/// Fold the entries of a delta window into add and remove lists.
///
/// Entries are replayed in ascending log order so later entries overwrite
/// earlier ones for the same podcast. Both lists are sorted by URL so the
/// same window always yields the same answer.
#[must_use]
pub fn fold_window(
    mut window: Vec<SubscriptionAction>,
    until: DateTime<Utc>,
) -> SubscriptionChanges {
    window.sort_by_key(SubscriptionAction::order);
    let mut last_seen: BTreeMap<PodcastId, SubscriptionAction> = BTreeMap::new();
    for action in window {
        last_seen.insert(action.podcast_id(), action);
    }

    let (mut add, mut remove) = (Vec::new(), Vec::new());
    for action in last_seen.into_values() {
        match action.kind {
            SubscriptionActionKind::Subscribe => add.push(action.podcast.url),
            SubscriptionActionKind::Unsubscribe => remove.push(action.podcast.url),
        }
    }
    add.sort();
    remove.sort();

    SubscriptionChanges { add, remove, until }
}
