//! Per-participant subscriptions for remote video tiles

use super::source::{QualityHint, SourceId, VideoSource};
use super::subscription::{FrameSubscription, SubscribeError};
use crate::display::FrameSink;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Keeps one `FrameSubscription` per remote participant.
///
/// Entries live until `remove` or `clear`, removing one unsubscribes it.
pub struct RemoteVideoRegistry {
    source: Arc<dyn VideoSource>,
    entries: Mutex<HashMap<String, FrameSubscription>>,
}

impl RemoteVideoRegistry {
    pub fn new(source: Arc<dyn VideoSource>) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, FrameSubscription>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the subscription for `participant`, creating it bound to
    /// `sink` on first use.
    ///
    /// An existing entry is returned as is, even when `sink` differs.
    pub fn get_or_create(&self, participant: &str, sink: &Arc<FrameSink>) -> FrameSubscription {
        let mut entries = self.entries();
        if let Some(existing) = entries.get(participant) {
            return existing.clone();
        }

        log::debug!("Registry: new subscription for participant {participant}");
        let subscription = FrameSubscription::new(Arc::clone(&self.source), sink);
        entries.insert(participant.to_string(), subscription.clone());
        subscription
    }

    /// Looks up or creates the participant's subscription and binds it.
    pub fn subscribe(
        &self,
        participant: &str,
        sink: &Arc<FrameSink>,
        quality: QualityHint,
    ) -> Result<FrameSubscription, SubscribeError> {
        let subscription = self.get_or_create(participant, sink);
        subscription.subscribe_to(SourceId::participant(participant), quality)?;
        Ok(subscription)
    }

    pub fn get(&self, participant: &str) -> Option<FrameSubscription> {
        self.entries().get(participant).cloned()
    }

    /// Unsubscribes and forgets a participant, returns whether it was known.
    pub fn remove(&self, participant: &str) -> bool {
        let removed = self.entries().remove(participant);
        match removed {
            Some(subscription) => {
                subscription.unsubscribe();
                log::debug!("Registry: removed participant {participant}");
                true
            }
            None => false,
        }
    }

    /// Unsubscribes every participant.
    pub fn clear(&self) {
        let drained: Vec<_> = self.entries().drain().collect();
        for (_, subscription) in drained {
            subscription.unsubscribe();
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn contains(&self, participant: &str) -> bool {
        self.entries().contains_key(participant)
    }

    /// Known participants, sorted.
    pub fn participants(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Drop for RemoteVideoRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}
