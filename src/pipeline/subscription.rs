//! Binding between a video source and a frame sink
//!
//! A `FrameSubscription` subscribes one source identity at a time, converts
//! every frame the source delivers and publishes it into its sink. The same
//! state machine serves the local preview and remote participants, they only
//! differ in the `SourceId` they bind to.
//!
//! # Races with in-flight frames
//!
//! Each binding owns a delegate with a gate (`RwLock<bool>`). Frames are
//! converted without holding any lock, then published while holding the gate
//! for reading. `unsubscribe` closes the gate for writing before it returns,
//! so once it has returned no frame of the old binding can reach the sink.

use super::health::SubscriptionHealth;
use super::source::{
    DelegateId, Delegates, FrameDelegate, QualityHint, RawDataStatus, SourceError, SourceId,
    StatusDelegate, VideoSource,
};
use super::state::SubscriptionState;
use crate::decoder::{self, RawData};
use crate::display::FrameSink;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Instant;
use thiserror::Error;

/// Published frames between two progress log lines.
const LOG_EVERY_FRAMES: u64 = 30;

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("the target surface has been torn down")]
    SinkGone,
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Subscription handle, cheap to clone.
///
/// The source is unsubscribed when the last handle is dropped.
#[derive(Clone)]
pub struct FrameSubscription {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn VideoSource>,
    sink: Weak<FrameSink>,
    health: Arc<SubscriptionHealth>,
    /// Serializes subscribe and unsubscribe requests
    ops: Mutex<()>,
    slot: Mutex<Slot>,
}

struct Slot {
    state: SubscriptionState,
    binding: Option<Binding>,
}

struct Binding {
    id: SourceId,
    quality: QualityHint,
    delegate: Arc<RawDataDelegate>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FrameSubscription {
    /// Creates an unsubscribed instance publishing into `sink`.
    ///
    /// Only a weak reference to the sink is kept, the display surface stays
    /// its owner.
    pub fn new(source: Arc<dyn VideoSource>, sink: &Arc<FrameSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                sink: Arc::downgrade(sink),
                health: Arc::new(SubscriptionHealth::new()),
                ops: Mutex::new(()),
                slot: Mutex::new(Slot {
                    state: SubscriptionState::Unsubscribed,
                    binding: None,
                }),
            }),
        }
    }

    /// Subscribes to `id`, unsubscribing from the current source first.
    ///
    /// On failure the state becomes `SubscriptionFailed`, which delivers no
    /// frames; the call may be retried.
    pub fn subscribe_to(&self, id: SourceId, quality: QualityHint) -> Result<(), SubscribeError> {
        let _ops = lock(&self.inner.ops);

        self.inner.release();

        if self.inner.sink.strong_count() == 0 {
            log::warn!("Subscription: cannot subscribe to {id}, the target surface is gone");
            lock(&self.inner.slot).state = SubscriptionState::SubscriptionFailed;
            return Err(SubscribeError::SinkGone);
        }

        let delegate = Arc::new(RawDataDelegate {
            id: DelegateId::next(),
            source_id: id.clone(),
            gate: RwLock::new(true),
            sink: self.inner.sink.clone(),
            owner: Arc::downgrade(&self.inner),
            health: Arc::clone(&self.inner.health),
        });

        lock(&self.inner.slot).binding = Some(Binding {
            id: id.clone(),
            quality,
            delegate: Arc::clone(&delegate),
        });

        match self
            .inner
            .source
            .subscribe(&id, quality, delegate.delegates())
        {
            Ok(()) => {
                let mut slot = lock(&self.inner.slot);
                let still_bound = slot
                    .binding
                    .as_ref()
                    .is_some_and(|b| b.delegate.id == delegate.id);
                if still_bound && delegate.is_open() {
                    slot.state = SubscriptionState::Subscribed {
                        since: Instant::now(),
                    };
                    log::info!(
                        "Subscription: subscribed to {id} at {quality} (delegate {})",
                        delegate.id
                    );
                    return Ok(());
                }

                // raw data went off before the source returned
                let leftover = if still_bound { slot.binding.take() } else { None };
                slot.state = SubscriptionState::SubscriptionFailed;
                drop(slot);

                delegate.close();
                if let Some(binding) = leftover {
                    if let Err(err) = self.inner.source.unsubscribe(&binding.id, delegate.id) {
                        log::warn!("Subscription: failed to unsubscribe from {id}: {err}");
                    }
                }
                log::warn!("Subscription: {id} went off while subscribing");
                Err(SourceError::Unavailable(id).into())
            }
            Err(err) => {
                delegate.close();
                let mut slot = lock(&self.inner.slot);
                slot.binding = None;
                slot.state = SubscriptionState::SubscriptionFailed;
                log::warn!("Subscription: failed to subscribe to {id} at {quality}: {err}");
                Err(err.into())
            }
        }
    }

    /// Stops frame delivery from the current source, if any.
    ///
    /// Idempotent. Once this returns no further frame of the released binding
    /// is published.
    pub fn unsubscribe(&self) {
        let _ops = lock(&self.inner.ops);
        self.inner.release();
    }

    pub fn state(&self) -> SubscriptionState {
        lock(&self.inner.slot).state
    }

    pub fn is_subscribed(&self) -> bool {
        self.state().is_subscribed()
    }

    /// The bound source, if subscribed.
    pub fn source_id(&self) -> Option<SourceId> {
        let slot = lock(&self.inner.slot);
        slot.binding
            .as_ref()
            .filter(|_| slot.state.is_subscribed())
            .map(|b| b.id.clone())
    }

    /// The quality requested from the bound source, if subscribed.
    pub fn quality(&self) -> Option<QualityHint> {
        let slot = lock(&self.inner.slot);
        slot.binding
            .as_ref()
            .filter(|_| slot.state.is_subscribed())
            .map(|b| b.quality)
    }

    pub fn health(&self) -> Arc<SubscriptionHealth> {
        Arc::clone(&self.inner.health)
    }
}

impl std::fmt::Debug for FrameSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = lock(&self.inner.slot);
        f.debug_struct("FrameSubscription")
            .field("state", &slot.state)
            .field("source", &slot.binding.as_ref().map(|b| &b.id))
            .finish()
    }
}

impl Inner {
    /// Closes the current binding and unsubscribes it from the source.
    fn release(&self) {
        let binding = {
            let mut slot = lock(&self.slot);
            slot.state = SubscriptionState::Unsubscribed;
            slot.binding.take()
        };

        if let Some(binding) = binding {
            // waits for an in-flight publish of this binding to finish
            binding.delegate.close();
            match self.source.unsubscribe(&binding.id, binding.delegate.id) {
                Ok(()) => log::info!("Subscription: unsubscribed from {}", binding.id),
                Err(err) => log::warn!(
                    "Subscription: failed to unsubscribe from {}: {err}",
                    binding.id
                ),
            }
        }
    }

    /// Drops the binding owned by `delegate` after the source switched off.
    ///
    /// A newer binding is left untouched.
    fn detach(&self, delegate: DelegateId) {
        let binding = {
            let mut slot = lock(&self.slot);
            match &slot.binding {
                Some(b) if b.delegate.id == delegate => {
                    slot.state = SubscriptionState::Unsubscribed;
                    slot.binding.take()
                }
                _ => None,
            }
        };

        if let Some(binding) = binding {
            if let Err(err) = self.source.unsubscribe(&binding.id, delegate) {
                log::warn!(
                    "Subscription: failed to unsubscribe from {} after raw data off: {err}",
                    binding.id
                );
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.release();
    }
}

/// Callback target registered with the source for one binding.
struct RawDataDelegate {
    id: DelegateId,
    source_id: SourceId,
    gate: RwLock<bool>,
    sink: Weak<FrameSink>,
    owner: Weak<Inner>,
    health: Arc<SubscriptionHealth>,
}

impl RawDataDelegate {
    fn delegates(self: &Arc<Self>) -> Delegates {
        Delegates {
            id: self.id,
            frames: Arc::clone(self) as Arc<dyn FrameDelegate>,
            status: Arc::clone(self) as Arc<dyn StatusDelegate>,
        }
    }

    fn is_open(&self) -> bool {
        *self.gate.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        *self.gate.write().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

impl FrameDelegate for RawDataDelegate {
    fn on_frame(&self, data: RawData<'_>) {
        self.health.record_received(data.byte_len());

        if !self.is_open() {
            self.health.record_stale();
            return;
        }

        let frame = match data.validate() {
            Ok(frame) => frame,
            Err(err) => {
                if self.health.record_malformed() == 1 {
                    log::warn!("Subscription: dropping malformed frame from {}: {err}", self.source_id);
                } else {
                    log::debug!("Subscription: dropping malformed frame from {}: {err}", self.source_id);
                }
                return;
            }
        };

        let Some(sink) = self.sink.upgrade() else {
            self.health.record_stale();
            return;
        };

        let image = Arc::new(decoder::convert(&frame));

        let gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if !*gate {
            self.health.record_stale();
            return;
        }
        sink.publish(image);
        drop(gate);

        let published = self.health.record_published();
        if published % LOG_EVERY_FRAMES == 0 {
            log::debug!(
                "Subscription: published frame {published} ({}x{}) from {}",
                frame.width(),
                frame.height(),
                self.source_id
            );
        }
    }
}

impl StatusDelegate for RawDataDelegate {
    fn on_status(&self, status: RawDataStatus) {
        match status {
            RawDataStatus::On => {
                log::info!("Subscription: raw data on for {}", self.source_id);
            }
            RawDataStatus::Off => {
                log::info!(
                    "Subscription: raw data off for {}, cleaning up subscription",
                    self.source_id
                );
                self.close();
                if let Some(owner) = self.owner.upgrade() {
                    owner.detach(self.id);
                }
            }
        }
    }
}
