//! In-memory implementation of every driven port.
//!
//! One [`InMemoryStore`] plays the role of the whole database so services can
//! be wired against it exactly as they are against PostgreSQL. Races can be
//! injected with [`InMemoryStore::race_next_podcast_creates`] and
//! [`InMemoryStore::race_next_membership_changes`].

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{
    DeviceRepository, DeviceRepositoryError, DeviceUpdate, EpisodeActionFilter,
    EpisodeActionRepository, EpisodeActionRepositoryError, PodcastDeletion, PodcastRepository,
    PodcastRepositoryError, SanitizingRuleRepository, SanitizingRuleRepositoryError,
    SubscriptionActionRepository, SubscriptionActionRepositoryError,
};
use crate::domain::{
    AppendOutcome, CanonicalUrl, Device, DeviceId, DeviceUid, EpisodeAction, MembershipPlan,
    MembershipStep, NewSubscriptionAction, Podcast, PodcastId, SanitizingRule,
    SubscriptionAction, SyncGroupId, UserId,
};

#[derive(Default)]
struct State {
    next_sequence: i64,
    podcasts: Vec<Podcast>,
    subscription_log: Vec<SubscriptionAction>,
    devices: Vec<Device>,
    groups: BTreeSet<SyncGroupId>,
    episode_journal: HashMap<UserId, Vec<EpisodeAction>>,
    rules: Vec<SanitizingRule>,
    podcast_races: u32,
    membership_races: u32,
}

impl State {
    fn podcast(&self, id: PodcastId) -> Option<&Podcast> {
        self.podcasts.iter().find(|podcast| podcast.id == id)
    }

    fn device_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.devices.iter_mut().find(|device| device.id == id)
    }

    fn find_device(&self, user: &UserId, uid: &DeviceUid) -> Option<&Device> {
        self.devices
            .iter()
            .find(|device| &device.user_id == user && &device.uid == uid)
    }
}

/// Shared in-memory database.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with URL rewrite rules.
    pub fn with_rules(rules: Vec<SanitizingRule>) -> Self {
        let store = Self::default();
        store.lock().rules = rules;
        store
    }

    /// Make the next `count` podcast inserts lose a race: another writer's
    /// row appears and the insert reports a duplicate key.
    pub fn race_next_podcast_creates(&self, count: u32) {
        self.lock().podcast_races = count;
    }

    /// Make the next `count` membership changes fail their precondition check.
    pub fn race_next_membership_changes(&self, count: u32) {
        self.lock().membership_races = count;
    }

    /// Snapshot of the whole subscription log, in insertion order.
    pub fn subscription_log(&self) -> Vec<SubscriptionAction> {
        self.lock().subscription_log.clone()
    }

    /// Snapshot of every stored podcast.
    pub fn podcasts(&self) -> Vec<Podcast> {
        self.lock().podcasts.clone()
    }

    /// Number of sync groups currently stored.
    pub fn group_count(&self) -> usize {
        self.lock().groups.len()
    }

    /// Append a log entry with an explicit timestamp, bypassing services.
    pub fn record(&self, action: NewSubscriptionAction) -> SubscriptionAction {
        let mut state = self.lock();
        state.next_sequence += 1;
        let Some(podcast) = state.podcast(action.podcast).cloned() else {
            panic!("podcast {} must exist before recording", action.podcast);
        };
        let stored = SubscriptionAction {
            device: action.device,
            podcast,
            kind: action.kind,
            timestamp: action.timestamp,
            sequence_id: state.next_sequence,
        };
        state.subscription_log.push(stored.clone());
        stored
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("in-memory store mutex poisoned"),
        }
    }
}

#[async_trait]
impl SubscriptionActionRepository for InMemoryStore {
    async fn list_for_device(
        &self,
        device: &DeviceId,
        podcast: Option<PodcastId>,
    ) -> Result<Vec<SubscriptionAction>, SubscriptionActionRepositoryError> {
        Ok(self
            .lock()
            .subscription_log
            .iter()
            .filter(|action| &action.device == device)
            .filter(|action| podcast.is_none_or(|id| action.podcast_id() == id))
            .cloned()
            .collect())
    }

    async fn list_window(
        &self,
        device: &DeviceId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionAction>, SubscriptionActionRepositoryError> {
        Ok(self
            .lock()
            .subscription_log
            .iter()
            .filter(|action| {
                &action.device == device && action.timestamp > since && action.timestamp <= until
            })
            .cloned()
            .collect())
    }

    async fn append(
        &self,
        actions: &[NewSubscriptionAction],
    ) -> Result<AppendOutcome, SubscriptionActionRepositoryError> {
        let mut state = self.lock();
        let podcasts = actions
            .iter()
            .map(|action| {
                state.podcast(action.podcast).cloned().ok_or_else(|| {
                    SubscriptionActionRepositoryError::query(format!(
                        "unknown podcast {}",
                        action.podcast
                    ))
                })
            })
            .collect::<Result<Vec<Podcast>, _>>()?;
        let mut outcome = AppendOutcome::default();
        for (action, podcast) in actions.iter().zip(podcasts) {
            let duplicate = state.subscription_log.iter().any(|existing| {
                existing.device == action.device
                    && existing.podcast_id() == action.podcast
                    && existing.timestamp == action.timestamp
            });
            if duplicate {
                outcome.absorbed += 1;
                continue;
            }
            state.next_sequence += 1;
            let sequence_id = state.next_sequence;
            state.subscription_log.push(SubscriptionAction {
                device: action.device,
                podcast,
                kind: action.kind,
                timestamp: action.timestamp,
                sequence_id,
            });
            outcome.inserted += 1;
        }
        Ok(outcome)
    }
}

#[async_trait]
impl PodcastRepository for InMemoryStore {
    async fn find_by_url(
        &self,
        url: &CanonicalUrl,
    ) -> Result<Option<Podcast>, PodcastRepositoryError> {
        Ok(self
            .lock()
            .podcasts
            .iter()
            .find(|podcast| &podcast.url == url)
            .cloned())
    }

    async fn create(&self, url: &CanonicalUrl) -> Result<Podcast, PodcastRepositoryError> {
        let mut state = self.lock();
        let taken = state.podcasts.iter().any(|podcast| &podcast.url == url);
        if state.podcast_races > 0 && !taken {
            state.podcast_races -= 1;
            state.podcasts.push(Podcast {
                id: PodcastId::random(),
                url: url.clone(),
            });
            return Err(PodcastRepositoryError::duplicate_key(url.as_str()));
        }
        if taken {
            return Err(PodcastRepositoryError::duplicate_key(url.as_str()));
        }
        let podcast = Podcast {
            id: PodcastId::random(),
            url: url.clone(),
        };
        state.podcasts.push(podcast.clone());
        Ok(podcast)
    }

    async fn delete_with_dependents(
        &self,
        podcast: &PodcastId,
    ) -> Result<PodcastDeletion, PodcastRepositoryError> {
        let mut state = self.lock();
        let mut deletion = PodcastDeletion::default();
        for journal in state.episode_journal.values_mut() {
            let before = journal.len();
            journal.retain(|action| &action.episode.podcast.id != podcast);
            deletion.episode_actions += before - journal.len();
        }
        let before = state.subscription_log.len();
        state
            .subscription_log
            .retain(|action| &action.podcast_id() != podcast);
        deletion.subscription_actions = before - state.subscription_log.len();
        let before = state.podcasts.len();
        state.podcasts.retain(|existing| &existing.id != podcast);
        deletion.podcast_removed = state.podcasts.len() < before;
        Ok(deletion)
    }
}

#[async_trait]
impl DeviceRepository for InMemoryStore {
    async fn find(
        &self,
        user: &UserId,
        uid: &DeviceUid,
    ) -> Result<Option<Device>, DeviceRepositoryError> {
        Ok(self.lock().find_device(user, uid).cloned())
    }

    async fn ensure(&self, user: &UserId, uid: &DeviceUid) -> Result<Device, DeviceRepositoryError> {
        let mut state = self.lock();
        if let Some(device) = state.find_device(user, uid) {
            return Ok(device.clone());
        }
        let device = Device::new_default(user.clone(), uid.clone());
        state.devices.push(device.clone());
        Ok(device)
    }

    async fn update(
        &self,
        user: &UserId,
        uid: &DeviceUid,
        update: &DeviceUpdate,
    ) -> Result<Device, DeviceRepositoryError> {
        let mut state = self.lock();
        if state.find_device(user, uid).is_none() {
            state
                .devices
                .push(Device::new_default(user.clone(), uid.clone()));
        }
        let Some(device) = state
            .devices
            .iter_mut()
            .find(|device| &device.user_id == user && &device.uid == uid)
        else {
            return Err(DeviceRepositoryError::query(format!("device {uid} vanished")));
        };
        if let Some(caption) = &update.caption {
            device.caption = caption.clone();
        }
        if let Some(device_type) = update.device_type {
            device.device_type = device_type;
        }
        Ok(device.clone())
    }

    async fn list(&self, user: &UserId) -> Result<Vec<Device>, DeviceRepositoryError> {
        let mut devices: Vec<Device> = self
            .lock()
            .devices
            .iter()
            .filter(|device| &device.user_id == user)
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.uid.cmp(&b.uid));
        Ok(devices)
    }

    async fn group_members(
        &self,
        group: &SyncGroupId,
    ) -> Result<Vec<Device>, DeviceRepositoryError> {
        let mut members: Vec<Device> = self
            .lock()
            .devices
            .iter()
            .filter(|device| device.sync_group.as_ref() == Some(group))
            .cloned()
            .collect();
        members.sort_by(|a, b| a.uid.cmp(&b.uid));
        Ok(members)
    }

    async fn apply_membership(
        &self,
        _user: &UserId,
        plan: &MembershipPlan,
    ) -> Result<(), DeviceRepositoryError> {
        let mut state = self.lock();
        if state.membership_races > 0 {
            state.membership_races -= 1;
            let device = plan
                .expected
                .first()
                .map_or_else(String::new, |expected| expected.device.to_string());
            return Err(DeviceRepositoryError::stale_membership(device));
        }
        for expected in &plan.expected {
            let current = state
                .devices
                .iter()
                .find(|device| device.id == expected.device)
                .map(|device| device.sync_group);
            if current != Some(expected.group) {
                return Err(DeviceRepositoryError::stale_membership(
                    expected.device.to_string(),
                ));
            }
        }
        for expected in &plan.expected_groups {
            let members: Vec<DeviceId> = state
                .devices
                .iter()
                .filter(|device| device.sync_group == Some(expected.group))
                .map(|device| device.id)
                .collect();
            if !expected.matches(&members) {
                return Err(DeviceRepositoryError::stale_membership(
                    expected.group.to_string(),
                ));
            }
        }
        for step in &plan.steps {
            match *step {
                MembershipStep::CreateGroup(group) => {
                    state.groups.insert(group);
                }
                MembershipStep::Assign { device, group } => {
                    if let Some(device) = state.device_mut(device) {
                        device.sync_group = Some(group);
                    }
                }
                MembershipStep::Detach(device) => {
                    if let Some(device) = state.device_mut(device) {
                        device.sync_group = None;
                    }
                }
                MembershipStep::DeleteGroup(group) => {
                    state.groups.remove(&group);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EpisodeActionRepository for InMemoryStore {
    async fn list(
        &self,
        user: &UserId,
        filter: &EpisodeActionFilter,
    ) -> Result<Vec<EpisodeAction>, EpisodeActionRepositoryError> {
        let state = self.lock();
        let mut actions: Vec<EpisodeAction> = state
            .episode_journal
            .get(user)
            .map(|journal| {
                journal
                    .iter()
                    .filter(|action| {
                        filter
                            .podcast
                            .is_none_or(|podcast| action.episode.podcast.id == podcast)
                    })
                    .filter(|action| {
                        filter
                            .device
                            .as_ref()
                            .is_none_or(|device| action.device.as_ref() == Some(device))
                    })
                    .filter(|action| filter.since.is_none_or(|since| action.timestamp > since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        actions.sort_by_key(|action| action.timestamp);
        Ok(actions)
    }

    async fn append(
        &self,
        user: &UserId,
        actions: &[EpisodeAction],
    ) -> Result<AppendOutcome, EpisodeActionRepositoryError> {
        let mut state = self.lock();
        for action in actions {
            if let Some(uid) = &action.device {
                if state.find_device(user, uid).is_none() {
                    return Err(EpisodeActionRepositoryError::query(format!(
                        "unknown device {uid}"
                    )));
                }
            }
        }
        let journal = state.episode_journal.entry(user.clone()).or_default();
        let mut outcome = AppendOutcome::default();
        for action in actions {
            if journal.contains(action) {
                outcome.absorbed += 1;
            } else {
                journal.push(action.clone());
                outcome.inserted += 1;
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl SanitizingRuleRepository for InMemoryStore {
    async fn list_rules(&self) -> Result<Vec<SanitizingRule>, SanitizingRuleRepositoryError> {
        Ok(self.lock().rules.clone())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for the in-memory store.
    use super::*;
    use crate::domain::SubscriptionActionKind;
    use crate::test_support::fixtures::{at, uid, url, user};

    #[tokio::test]
    async fn batch_with_an_unknown_podcast_writes_nothing() {
        let store = InMemoryStore::new();
        let phone = store.ensure(&user(), &uid("phone")).await.expect("phone");
        let known = store
            .create(&url("https://a.example/feed"))
            .await
            .expect("podcast");
        let entry = |podcast: PodcastId| NewSubscriptionAction {
            device: phone.id,
            podcast,
            kind: SubscriptionActionKind::Subscribe,
            timestamp: at(5),
        };

        let result = SubscriptionActionRepository::append(
            &store,
            &[entry(known.id), entry(PodcastId::random())],
        )
        .await;

        assert!(matches!(
            result,
            Err(SubscriptionActionRepositoryError::Query { .. })
        ));
        assert!(store.subscription_log().is_empty());
    }
}
