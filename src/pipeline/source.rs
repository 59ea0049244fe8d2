//! Boundary to the external media source
//!
//! The source is injected into every subscription instead of being reached
//! through a process-wide handle, which lets tests drive it with a fake.
//! Callbacks are split into two narrow capabilities: `FrameDelegate` for raw
//! frames and `StatusDelegate` for on/off transitions.

use crate::decoder::RawData;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Identity of a video stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    /// The local camera, shown in the self-view.
    LocalPreview,
    /// A remote participant's video stream.
    Participant(String),
}

impl SourceId {
    pub fn participant(id: impl Into<String>) -> Self {
        SourceId::Participant(id.into())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, SourceId::LocalPreview)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::LocalPreview => write!(f, "local preview"),
            SourceId::Participant(id) => write!(f, "participant '{id}'"),
        }
    }
}

/// Resolution requested from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QualityHint {
    #[default]
    #[serde(rename = "90p")]
    P90,
    #[serde(rename = "180p")]
    P180,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl QualityHint {
    pub const ALL: [QualityHint; 5] = [
        QualityHint::P90,
        QualityHint::P180,
        QualityHint::P360,
        QualityHint::P720,
        QualityHint::P1080,
    ];

    /// Nominal frame height in pixels.
    pub fn height(self) -> u32 {
        match self {
            QualityHint::P90 => 90,
            QualityHint::P180 => 180,
            QualityHint::P360 => 360,
            QualityHint::P720 => 720,
            QualityHint::P1080 => 1080,
        }
    }

    /// Nominal 16:9 frame width, rounded up to an even number of pixels.
    pub fn width(self) -> u32 {
        (self.height() * 16).div_ceil(9).next_multiple_of(2)
    }
}

impl fmt::Display for QualityHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}P", self.height())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown quality '{0}', expected one of 90p, 180p, 360p, 720p, 1080p")]
pub struct ParseQualityError(String);

impl FromStr for QualityHint {
    type Err = ParseQualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let digits = lower.strip_suffix('p').unwrap_or(&lower);
        QualityHint::ALL
            .into_iter()
            .find(|q| q.height().to_string() == digits)
            .ok_or_else(|| ParseQualityError(s.to_string()))
    }
}

/// Raw data status reported by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDataStatus {
    On,
    Off,
}

/// Receives raw frames, on whatever thread the source delivers them.
pub trait FrameDelegate: Send + Sync {
    fn on_frame(&self, data: RawData<'_>);
}

/// Receives raw data status transitions.
pub trait StatusDelegate: Send + Sync {
    fn on_status(&self, status: RawDataStatus);
}

/// Registration key of one set of delegates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelegateId(u64);

impl DelegateId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        DelegateId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DelegateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callback targets handed to the source on subscribe.
#[derive(Clone)]
pub struct Delegates {
    pub id: DelegateId,
    pub frames: Arc<dyn FrameDelegate>,
    pub status: Arc<dyn StatusDelegate>,
}

impl fmt::Debug for Delegates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegates").field("id", &self.id).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("{0} is not available")]
    Unavailable(SourceId),
    #[error("{id} rejected the subscription: {reason}")]
    Rejected { id: SourceId, reason: String },
    #[error("no subscription registered for delegate {0}")]
    UnknownDelegate(DelegateId),
}

/// The external media source.
///
/// Implementations deliver frames and status changes to the registered
/// delegates from their own threads until `unsubscribe` is called for that
/// delegate.
pub trait VideoSource: Send + Sync {
    fn subscribe(
        &self,
        id: &SourceId,
        quality: QualityHint,
        delegates: Delegates,
    ) -> Result<(), SourceError>;

    fn unsubscribe(&self, id: &SourceId, delegate: DelegateId) -> Result<(), SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quality() {
        assert_eq!("720p".parse::<QualityHint>(), Ok(QualityHint::P720));
        assert_eq!("1080P".parse::<QualityHint>(), Ok(QualityHint::P1080));
        assert_eq!(" 90 ".parse::<QualityHint>(), Ok(QualityHint::P90));
        assert!("480p".parse::<QualityHint>().is_err());
    }

    #[test]
    fn test_quality_geometry() {
        assert_eq!(QualityHint::default(), QualityHint::P90);
        assert_eq!((QualityHint::P90.width(), QualityHint::P90.height()), (160, 90));
        assert_eq!(QualityHint::P360.width(), 640);
        assert_eq!(QualityHint::P1080.width(), 1920);
        assert_eq!(QualityHint::P720.to_string(), "720P");
    }

    #[test]
    fn test_quality_serde_names() {
        assert_eq!(serde_json::to_string(&QualityHint::P180).unwrap(), "\"180p\"");
        let q: QualityHint = serde_json::from_str("\"360p\"").unwrap();
        assert_eq!(q, QualityHint::P360);
    }

    #[test]
    fn test_source_id_display() {
        assert_eq!(SourceId::LocalPreview.to_string(), "local preview");
        assert_eq!(SourceId::participant("ana").to_string(), "participant 'ana'");
        assert!(SourceId::LocalPreview.is_local());
    }

    #[test]
    fn test_delegate_ids_are_unique() {
        let a = DelegateId::next();
        let b = DelegateId::next();
        assert_ne!(a, b);
    }
}
