//! Test-pattern video source
//!
//! Stands in for a media SDK: every subscription gets its own feed thread
//! that renders scrolling colour bars into a reusable I420 buffer and hands
//! it to the registered delegates at a fixed rate.

use super::sos::SignalOfStop;
use crate::decoder::{Plane, RawData};
use crate::pipeline::{
    DelegateId, Delegates, QualityHint, RawDataStatus, SourceError, SourceId, StatusDelegate,
    VideoSource,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Row alignment of the generated planes, like a hardware decoder's output.
const STRIDE_ALIGN: usize = 32;

/// BT.601 video range colour bars: white, yellow, cyan, green, magenta, red, blue, black.
const BARS: [(u8, u8, u8); 8] = [
    (235, 128, 128),
    (210, 16, 146),
    (170, 166, 16),
    (145, 54, 34),
    (106, 202, 222),
    (81, 90, 240),
    (41, 240, 110),
    (16, 128, 128),
];

struct Feed {
    source: SourceId,
    sos: SignalOfStop,
    status: Arc<dyn StatusDelegate>,
}

pub struct SyntheticSource {
    preview_size: (u32, u32),
    frame_interval: Duration,
    participants: Mutex<HashSet<String>>,
    feeds: Mutex<HashMap<DelegateId, Feed>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyntheticSource {
    /// The local preview is delivered at `preview_size`, participants at the
    /// size of the requested quality.
    pub fn new(preview_size: (u32, u32), fps: u32) -> Self {
        Self {
            preview_size,
            frame_interval: Duration::from_secs(1) / fps.max(1),
            participants: Mutex::new(HashSet::new()),
            feeds: Mutex::new(HashMap::new()),
        }
    }

    /// Makes a participant available for subscription.
    pub fn add_participant(&self, name: &str) {
        if lock(&self.participants).insert(name.to_string()) {
            log::info!("SyntheticSource: participant '{name}' joined");
        }
    }

    /// Removes a participant; its feeds stop and report raw data off.
    pub fn remove_participant(&self, name: &str) {
        if !lock(&self.participants).remove(name) {
            return;
        }
        log::info!("SyntheticSource: participant '{name}' left");

        let target = SourceId::participant(name);
        let stopped: Vec<_> = lock(&self.feeds)
            .iter()
            .filter(|(_, feed)| feed.source == target)
            .map(|(id, feed)| {
                feed.sos.cancel();
                (*id, Arc::clone(&feed.status))
            })
            .collect();

        // the delegates unsubscribe from within on_status, so no lock is held here
        for (_, status) in &stopped {
            status.on_status(RawDataStatus::Off);
        }

        let mut feeds = lock(&self.feeds);
        for (id, _) in stopped {
            feeds.remove(&id);
        }
    }

    pub fn has_participant(&self, name: &str) -> bool {
        lock(&self.participants).contains(name)
    }

    /// Number of running feeds.
    pub fn active_feeds(&self) -> usize {
        lock(&self.feeds).len()
    }

    fn frame_size(&self, id: &SourceId, quality: QualityHint) -> (u32, u32) {
        match id {
            SourceId::LocalPreview => self.preview_size,
            SourceId::Participant(_) => (quality.width(), quality.height()),
        }
    }
}

impl VideoSource for SyntheticSource {
    fn subscribe(
        &self,
        id: &SourceId,
        quality: QualityHint,
        delegates: Delegates,
    ) -> Result<(), SourceError> {
        if let SourceId::Participant(name) = id {
            if !self.has_participant(name) {
                return Err(SourceError::Unavailable(id.clone()));
            }
        }

        let (width, height) = self.frame_size(id, quality);
        let sos = SignalOfStop::new();
        let delegate_id = delegates.id;
        let status = Arc::clone(&delegates.status);

        let feed = {
            let id = id.clone();
            let sos = sos.clone();
            let interval = self.frame_interval;
            move || run_feed(id, width, height, interval, delegates, sos)
        };
        thread::Builder::new()
            .name(format!("feed-{delegate_id}"))
            .spawn(feed)
            .map_err(|e| SourceError::Rejected {
                id: id.clone(),
                reason: format!("cannot start feed thread: {e}"),
            })?;

        log::debug!("SyntheticSource: started {width}x{height} feed {delegate_id} for {id}");
        lock(&self.feeds).insert(
            delegate_id,
            Feed {
                source: id.clone(),
                sos,
                status,
            },
        );
        Ok(())
    }

    fn unsubscribe(&self, id: &SourceId, delegate: DelegateId) -> Result<(), SourceError> {
        let feed = lock(&self.feeds)
            .remove(&delegate)
            .ok_or(SourceError::UnknownDelegate(delegate))?;

        // not joined: the feed may be blocked on the subscriber that is calling us
        feed.sos.cancel();
        log::debug!("SyntheticSource: stopped feed {delegate} for {id}");
        Ok(())
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        for feed in lock(&self.feeds).values() {
            feed.sos.cancel();
        }
    }
}

fn run_feed(
    id: SourceId,
    width: u32,
    height: u32,
    interval: Duration,
    delegates: Delegates,
    sos: SignalOfStop,
) {
    delegates.status.on_status(RawDataStatus::On);

    let mut bars = ColorBars::new(width, height);
    let mut frame_index = 0u64;
    while !sos.cancelled() {
        bars.render(frame_index);
        delegates.frames.on_frame(bars.raw_data());
        frame_index += 1;

        if sos.wait_timeout(interval) {
            break;
        }
    }

    log::debug!("SyntheticSource: feed for {id} exited after {frame_index} frames");
}

/// Colour bar index for luma column `x` of a `width` wide frame, scrolled by `offset`.
fn bar_at(width: usize, x: usize, offset: usize) -> usize {
    ((x + offset) % width) * BARS.len() / width
}

/// Scrolling colour bars in a padded I420 buffer.
struct ColorBars {
    width: u32,
    height: u32,
    y_stride: usize,
    c_stride: usize,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

impl ColorBars {
    fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        let y_stride = w.next_multiple_of(STRIDE_ALIGN);
        let c_stride = w.div_ceil(2).next_multiple_of(STRIDE_ALIGN / 2);
        Self {
            width,
            height,
            y_stride,
            c_stride,
            y: vec![16; y_stride * h],
            u: vec![128; c_stride * h.div_ceil(2)],
            v: vec![128; c_stride * h.div_ceil(2)],
        }
    }

    fn render(&mut self, frame_index: u64) {
        let (w, h) = (self.width as usize, self.height as usize);
        let offset = (frame_index as usize * 2) % w;

        for row in 0..h {
            let start = row * self.y_stride;
            for (x, px) in self.y[start..start + w].iter_mut().enumerate() {
                *px = BARS[bar_at(w, x, offset)].0;
            }
        }

        for row in 0..h.div_ceil(2) {
            let start = row * self.c_stride;
            for cx in 0..w.div_ceil(2) {
                let (_, u, v) = BARS[bar_at(w, cx * 2, offset)];
                self.u[start + cx] = u;
                self.v[start + cx] = v;
            }
        }
    }

    fn raw_data(&self) -> RawData<'_> {
        RawData {
            y: Plane::new(&self.y, self.y_stride),
            u: Plane::new(&self.u, self.c_stride),
            v: Plane::new(&self.v, self.c_stride),
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::FrameSink;
    use crate::pipeline::{FrameSubscription, SubscribeError, SubscriptionState};
    use std::time::Instant;

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_color_bars_convert_to_expected_colors() {
        let mut bars = ColorBars::new(64, 4);
        bars.render(0);
        let frame = bars.raw_data().validate().unwrap();
        let image = crate::decoder::convert(&frame);

        assert_eq!(image.rgb_at(0, 0), [255, 255, 255]);
        assert_eq!(image.rgb_at(63, 3), [0, 0, 0]);
        assert_eq!(bars.y_stride, 64);
        assert_eq!(bars.c_stride, 32);
    }

    #[test]
    fn test_color_bars_padded_and_odd() {
        let mut bars = ColorBars::new(33, 5);
        bars.render(7);
        assert_eq!(bars.y_stride, 64);
        assert_eq!(bars.c_stride, 32);
        assert!(bars.raw_data().validate().is_ok());
    }

    #[test]
    fn test_preview_feed_publishes() {
        let source = Arc::new(SyntheticSource::new((32, 18), 200));
        let sink = Arc::new(FrameSink::new());
        let subscription = FrameSubscription::new(source.clone(), &sink);

        subscription
            .subscribe_to(SourceId::LocalPreview, QualityHint::P360)
            .unwrap();
        assert!(wait_for(|| sink.has_frame()));
        assert_eq!(sink.current_image().unwrap().size(), (32, 18));
        assert_eq!(source.active_feeds(), 1);

        subscription.unsubscribe();
        assert_eq!(source.active_feeds(), 0);
    }

    #[test]
    fn test_participant_feed_uses_quality_size() {
        let source = Arc::new(SyntheticSource::new((32, 18), 200));
        source.add_participant("ana");
        let sink = Arc::new(FrameSink::new());
        let subscription = FrameSubscription::new(source.clone(), &sink);

        subscription
            .subscribe_to(SourceId::participant("ana"), QualityHint::P90)
            .unwrap();
        assert!(wait_for(|| sink.has_frame()));
        assert_eq!(sink.current_image().unwrap().size(), (160, 90));
    }

    #[test]
    fn test_unknown_participant_is_unavailable() {
        let source = Arc::new(SyntheticSource::new((32, 18), 30));
        let sink = Arc::new(FrameSink::new());
        let subscription = FrameSubscription::new(source.clone(), &sink);

        let err = subscription
            .subscribe_to(SourceId::participant("nobody"), QualityHint::P90)
            .unwrap_err();
        assert!(matches!(
            err,
            SubscribeError::Source(SourceError::Unavailable(_))
        ));
        assert_eq!(source.active_feeds(), 0);
    }

    #[test]
    fn test_participant_leaving_turns_raw_data_off() {
        let source = Arc::new(SyntheticSource::new((32, 18), 200));
        source.add_participant("ana");
        let sink = Arc::new(FrameSink::new());
        let subscription = FrameSubscription::new(source.clone(), &sink);
        subscription
            .subscribe_to(SourceId::participant("ana"), QualityHint::P90)
            .unwrap();

        source.remove_participant("ana");
        assert_eq!(subscription.state(), SubscriptionState::Unsubscribed);
        assert_eq!(source.active_feeds(), 0);
        assert!(!source.has_participant("ana"));
    }

    #[test]
    fn test_unsubscribe_unknown_delegate() {
        let source = SyntheticSource::new((32, 18), 30);
        let err = source
            .unsubscribe(&SourceId::LocalPreview, DelegateId::next())
            .unwrap_err();
        assert!(matches!(err, SourceError::UnknownDelegate(_)));
    }
}
