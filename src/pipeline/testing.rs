//! In-process fake source for subscription tests.
//!
//! Frames and status changes are delivered synchronously on the calling
//! thread, so a test decides exactly when a callback races with
//! `unsubscribe`.

use super::source::{
    DelegateId, Delegates, QualityHint, RawDataStatus, SourceError, SourceId, VideoSource,
};
use crate::decoder::RawData;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct ManualSource {
    registrations: Mutex<HashMap<DelegateId, (SourceId, QualityHint, Delegates)>>,
    unavailable: Mutex<HashSet<SourceId>>,
    rejecting: Mutex<HashMap<SourceId, String>>,
    off_on_subscribe: Mutex<HashSet<SourceId>>,
    unsubscribe_calls: AtomicUsize,
}

impl ManualSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark_unavailable(&self, id: SourceId) {
        self.unavailable.lock().unwrap().insert(id);
    }

    pub(crate) fn reject(&self, id: SourceId, reason: &str) {
        self.rejecting.lock().unwrap().insert(id, reason.to_string());
    }

    /// Reports raw data off from inside `subscribe`, before it returns.
    pub(crate) fn switch_off_on_subscribe(&self, id: SourceId) {
        self.off_on_subscribe.lock().unwrap().insert(id);
    }

    pub(crate) fn accept(&self, id: &SourceId) {
        self.rejecting.lock().unwrap().remove(id);
        self.unavailable.lock().unwrap().remove(id);
        self.off_on_subscribe.lock().unwrap().remove(id);
    }

    /// Registered delegates for a source.
    pub(crate) fn delegates(&self, id: &SourceId) -> Vec<Delegates> {
        self.registrations
            .lock()
            .unwrap()
            .values()
            .filter(|(source, _, _)| source == id)
            .map(|(_, _, delegates)| delegates.clone())
            .collect()
    }

    pub(crate) fn quality(&self, id: &SourceId) -> Option<QualityHint> {
        self.registrations
            .lock()
            .unwrap()
            .values()
            .find(|(source, _, _)| source == id)
            .map(|(_, quality, _)| *quality)
    }

    pub(crate) fn active(&self, id: &SourceId) -> usize {
        self.delegates(id).len()
    }

    pub(crate) fn total_active(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    pub(crate) fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    /// Delivers a frame to every registered delegate of `id`, returns how many.
    pub(crate) fn deliver(&self, id: &SourceId, data: RawData<'_>) -> usize {
        let targets = self.delegates(id);
        for delegates in &targets {
            delegates.frames.on_frame(data);
        }
        targets.len()
    }

    pub(crate) fn send_status(&self, id: &SourceId, status: RawDataStatus) {
        for delegates in self.delegates(id) {
            delegates.status.on_status(status);
        }
    }
}

impl VideoSource for ManualSource {
    fn subscribe(
        &self,
        id: &SourceId,
        quality: QualityHint,
        delegates: Delegates,
    ) -> Result<(), SourceError> {
        if self.unavailable.lock().unwrap().contains(id) {
            return Err(SourceError::Unavailable(id.clone()));
        }
        if let Some(reason) = self.rejecting.lock().unwrap().get(id) {
            return Err(SourceError::Rejected {
                id: id.clone(),
                reason: reason.clone(),
            });
        }
        let status = delegates.status.clone();
        self.registrations
            .lock()
            .unwrap()
            .insert(delegates.id, (id.clone(), quality, delegates));

        let switch_off = self.off_on_subscribe.lock().unwrap().contains(id);
        if switch_off {
            status.on_status(RawDataStatus::Off);
        }
        Ok(())
    }

    fn unsubscribe(&self, _id: &SourceId, delegate: DelegateId) -> Result<(), SourceError> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.registrations
            .lock()
            .unwrap()
            .remove(&delegate)
            .map(|_| ())
            .ok_or(SourceError::UnknownDelegate(delegate))
    }
}

/// A tightly packed frame with uniform planes.
pub(crate) fn uniform_frame(width: u32, height: u32, y: u8, u: u8, v: u8) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let c_len = w.div_ceil(2) * h.div_ceil(2);
    let mut buf = vec![y; w * h];
    buf.extend(std::iter::repeat_n(u, c_len));
    buf.extend(std::iter::repeat_n(v, c_len));
    buf
}
