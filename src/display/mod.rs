//! Display side of the video pipeline
//!
//! A `FrameSink` is the single shared slot between a frame-delivery thread
//! and the UI thread; a `VideoSurface` owns one and turns its latest image
//! into a letterboxed render plan.

pub mod frame_sink;
pub mod surface;

pub use frame_sink::FrameSink;
pub use surface::{fit_rect, Rect, RenderPlan, Rgb, SurfaceContent, VideoSurface};
