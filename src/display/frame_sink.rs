//! Latest-value cell for decoded video frames
//!
//! The sink holds at most one image. Every publish replaces the previous one,
//! nothing is queued and the producer never waits for the renderer.
//!
//! # Synchronization
//!
//! The slot is a `Mutex<Option<Arc<DecodedImage>>>`. The lock is only held to
//! swap or clone the `Arc`, never while converting pixels or drawing. Images
//! are immutable, so a reader always observes a complete frame.
//!
//! Each publish bumps a generation counter and forwards it through a
//! `tokio::sync::watch` channel. The UI loop consumes that channel as its
//! redraw request; the delivering thread never paints.

use crate::decoder::DecodedImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

type Slot = Option<Arc<DecodedImage>>;

#[derive(Debug)]
pub struct FrameSink {
    slot: Mutex<Slot>,
    generation: AtomicU64,
    redraw: watch::Sender<u64>,
}

impl FrameSink {
    pub fn new() -> Self {
        let (redraw, _) = watch::channel(0);
        Self {
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
            redraw,
        }
    }

    /// Replace the held image and request a redraw.
    pub fn publish(&self, image: Arc<DecodedImage>) {
        let previous = self.lock_slot().replace(image);
        // the old frame may be the last reference, free it outside the lock
        drop(previous);
        self.request_redraw();
    }

    /// The most recently published image, or `None` before the first publish.
    pub fn current_image(&self) -> Option<Arc<DecodedImage>> {
        self.lock_slot().clone()
    }

    /// Whether an image is currently held.
    pub fn has_frame(&self) -> bool {
        self.lock_slot().is_some()
    }

    /// Drop the held image so the surface shows its placeholder again.
    pub fn clear(&self) {
        let previous = self.lock_slot().take();
        if previous.is_some() {
            drop(previous);
            self.request_redraw();
        }
    }

    /// Number of publishes and clears since creation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Redraw requests, carrying the generation that triggered them.
    pub fn redraw_requests(&self) -> watch::Receiver<u64> {
        self.redraw.subscribe()
    }

    fn request_redraw(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        // concurrent publishers may race here, the receiver only ever moves forward
        self.redraw.send_if_modified(|current| {
            if generation > *current {
                *current = generation;
                true
            } else {
                false
            }
        });
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FrameSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn solid(width: u32, height: u32, value: u8) -> Arc<DecodedImage> {
        let mut pixels = vec![value; (width * height * 4) as usize];
        pixels.iter_mut().skip(3).step_by(4).for_each(|a| *a = 255);
        Arc::new(DecodedImage::from_rgba(width, height, pixels))
    }

    #[test]
    fn test_fresh_sink_is_empty() {
        let sink = FrameSink::new();
        assert!(sink.current_image().is_none());
        assert!(!sink.has_frame());
        assert_eq!(sink.generation(), 0);
    }

    #[test]
    fn test_latest_wins() {
        let sink = FrameSink::new();
        let first = solid(2, 2, 10);
        let second = solid(4, 4, 20);

        sink.publish(first.clone());
        sink.publish(second.clone());

        let current = sink.current_image().unwrap();
        assert!(Arc::ptr_eq(&current, &second));
        assert!(!Arc::ptr_eq(&current, &first));
        assert_eq!(sink.generation(), 2);
    }

    #[test]
    fn test_previous_frame_is_released() {
        let sink = FrameSink::new();
        let first = solid(2, 2, 10);
        sink.publish(first.clone());
        assert_eq!(Arc::strong_count(&first), 2);

        sink.publish(solid(2, 2, 20));
        assert_eq!(Arc::strong_count(&first), 1);
    }

    #[test]
    fn test_clear_returns_to_placeholder() {
        let sink = FrameSink::new();
        sink.publish(solid(2, 2, 10));
        sink.clear();
        assert!(sink.current_image().is_none());
        assert_eq!(sink.generation(), 2);

        // clearing an empty sink is not a change
        sink.clear();
        assert_eq!(sink.generation(), 2);
    }

    #[test]
    fn test_publish_requests_redraw() {
        let sink = FrameSink::new();
        let mut redraw = sink.redraw_requests();
        assert!(!redraw.has_changed().unwrap());

        sink.publish(solid(2, 2, 10));
        sink.publish(solid(2, 2, 20));

        assert!(redraw.has_changed().unwrap());
        assert_eq!(*redraw.borrow_and_update(), 2);
        assert!(!redraw.has_changed().unwrap());
    }

    #[test]
    fn test_concurrent_publish_and_read() {
        let sink = Arc::new(FrameSink::new());

        let writers: Vec<_> = (0..2)
            .map(|w| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..500u32 {
                        sink.publish(solid(8, 8, ((i + w * 7) % 255) as u8));
                    }
                })
            })
            .collect();

        let reader = {
            let sink = Arc::clone(&sink);
            thread::spawn(move || {
                for _ in 0..2000 {
                    if let Some(image) = sink.current_image() {
                        // no partial writes are ever visible
                        let rgba = image.as_rgba();
                        let first = rgba[0];
                        for px in rgba.chunks_exact(4) {
                            assert_eq!(&px[..3], &[first, first, first]);
                        }
                    }
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(sink.generation(), 1000);
        assert_eq!(*sink.redraw_requests().borrow(), 1000);
    }
}
