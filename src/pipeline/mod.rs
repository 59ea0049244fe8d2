//! Subscription side of the live video pipeline
//!
//! Sources push raw YUV420 frames into per-binding delegates. A
//! `FrameSubscription` converts them and publishes into one `FrameSink`:
//! - `source`: source identities, quality hints and the `VideoSource` seam
//! - `subscription`: the subscribe/unsubscribe state machine
//! - `registry`: one subscription per remote participant
//! - `state` and `health`: lifecycle state and frame counters

pub mod health;
pub mod registry;
pub mod source;
pub mod state;
pub mod subscription;

#[cfg(test)]
pub(crate) mod testing;

pub use health::{HealthSummary, SubscriptionHealth};
pub use registry::RemoteVideoRegistry;
pub use source::{
    DelegateId, Delegates, FrameDelegate, QualityHint, RawDataStatus, SourceError, SourceId,
    StatusDelegate, VideoSource,
};
pub use state::SubscriptionState;
pub use subscription::{FrameSubscription, SubscribeError};
