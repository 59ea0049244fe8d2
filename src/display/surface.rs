//! Render step of a display surface
//!
//! On every redraw the surface fills its bounds with the background colour,
//! reads the latest image from its sink and, when there is one, places it
//! scaled by `min(W / w, H / h)` and centred. Without an image it shows the
//! placeholder text.

use super::FrameSink;
use crate::decoder::DecodedImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

/// Integer rectangle relative to the surface origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Fits an image of size `image` inside `bounds`, preserving aspect ratio.
///
/// Scaled sizes are truncated to whole pixels and centred with integer
/// offsets. Zero-sized images or bounds give an empty rectangle.
pub fn fit_rect(image: (u32, u32), bounds: (u32, u32)) -> Rect {
    let (iw, ih) = image;
    let (bw, bh) = bounds;
    if iw == 0 || ih == 0 || bw == 0 || bh == 0 {
        return Rect::default();
    }

    // scale = min(bw / iw, bh / ih), evaluated in integers so the limiting
    // axis always lands exactly on the bounds
    let (iw64, ih64, bw64, bh64) = (iw as u64, ih as u64, bw as u64, bh as u64);
    let (width, height) = if bw64 * ih64 <= bh64 * iw64 {
        (bw, (ih64 * bw64 / iw64) as u32)
    } else {
        ((iw64 * bh64 / ih64) as u32, bh)
    };

    Rect {
        x: (bw - width) / 2,
        y: (bh - height) / 2,
        width,
        height,
    }
}

/// What to draw on top of the background.
#[derive(Debug, Clone)]
pub enum SurfaceContent<'a> {
    /// No frame has been published yet.
    Placeholder(&'a str),
    /// The latest frame, drawn into `rect`.
    Video {
        image: Arc<DecodedImage>,
        rect: Rect,
    },
}

/// Result of one render step.
#[derive(Debug, Clone)]
pub struct RenderPlan<'a> {
    pub background: Rgb,
    pub content: SurfaceContent<'a>,
}

/// A bounded display area showing the latest frame of its sink.
///
/// The surface is the only owner of its `FrameSink`; subscriptions publishing
/// into it keep weak references.
#[derive(Debug)]
pub struct VideoSurface {
    label: String,
    sink: Arc<FrameSink>,
    redraw: watch::Receiver<u64>,
    background: Rgb,
    placeholder: String,
}

impl VideoSurface {
    pub fn new(label: impl Into<String>, background: Rgb, placeholder: impl Into<String>) -> Self {
        let sink = Arc::new(FrameSink::new());
        let redraw = sink.redraw_requests();
        Self {
            label: label.into(),
            sink,
            redraw,
            background,
            placeholder: placeholder.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// The sink frames should be published into.
    pub fn sink(&self) -> &Arc<FrameSink> {
        &self.sink
    }

    /// Returns `true` once per pending redraw request.
    pub fn take_redraw(&mut self) -> bool {
        match self.redraw.has_changed() {
            Ok(true) => {
                self.redraw.borrow_and_update();
                true
            }
            _ => false,
        }
    }

    /// Render step for a surface of `bounds` pixels.
    pub fn render(&self, bounds: (u32, u32)) -> RenderPlan<'_> {
        self.render_frame(self.sink.current_image(), bounds)
    }

    /// Render step for a frame already taken from the sink.
    ///
    /// Lets a host that uploads frames to the GPU lay out exactly the image
    /// it uploaded, even when a newer one has been published since.
    pub fn render_frame(
        &self,
        frame: Option<Arc<DecodedImage>>,
        bounds: (u32, u32),
    ) -> RenderPlan<'_> {
        let content = match frame {
            Some(image) => {
                let rect = fit_rect(image.size(), bounds);
                SurfaceContent::Video { image, rect }
            }
            None => SurfaceContent::Placeholder(&self.placeholder),
        };

        RenderPlan {
            background: self.background,
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32) -> Arc<DecodedImage> {
        Arc::new(DecodedImage::from_rgba(
            width,
            height,
            vec![255u8; (width * height * 4) as usize],
        ))
    }

    #[test]
    fn test_fit_landscape_into_square() {
        let rect = fit_rect((640, 480), (300, 300));
        assert_eq!(
            rect,
            Rect {
                x: 0,
                y: 37,
                width: 300,
                height: 225
            }
        );
    }

    #[test]
    fn test_fit_portrait_into_square() {
        let rect = fit_rect((480, 640), (300, 300));
        assert_eq!(
            rect,
            Rect {
                x: 37,
                y: 0,
                width: 225,
                height: 300
            }
        );
    }

    #[test]
    fn test_fit_upscales_small_image() {
        let rect = fit_rect((160, 90), (640, 480));
        assert_eq!(rect.width, 640);
        assert_eq!(rect.height, 360);
        assert_eq!((rect.x, rect.y), (0, 60));
    }

    #[test]
    fn test_fit_preserves_aspect_and_bounds() {
        for &(image, bounds) in &[
            ((1920, 1080), (333, 777)),
            ((3, 3), (100, 41)),
            ((160, 90), (1, 1)),
            ((7, 1000), (500, 500)),
        ] {
            let rect = fit_rect(image, bounds);
            assert!(rect.x + rect.width <= bounds.0);
            assert!(rect.y + rect.height <= bounds.1);
            // one axis touches the bounds
            assert!(rect.width == bounds.0 || rect.height == bounds.1, "{image:?} in {bounds:?}");
        }
    }

    #[test]
    fn test_fit_zero_sizes() {
        assert!(fit_rect((640, 480), (0, 300)).is_empty());
        assert!(fit_rect((0, 480), (300, 300)).is_empty());
    }

    #[test]
    fn test_render_placeholder_without_frame() {
        let surface = VideoSurface::new("self", Rgb::BLACK, "Waiting for video...");
        let plan = surface.render((320, 240));
        assert_eq!(plan.background, Rgb::BLACK);
        assert!(matches!(plan.content, SurfaceContent::Placeholder("Waiting for video...")));
    }

    #[test]
    fn test_render_latest_frame() {
        let surface = VideoSurface::new("remote", Rgb::BLACK, "Waiting for video...");
        surface.sink().publish(image(640, 480));

        match surface.render((300, 300)).content {
            SurfaceContent::Video { image, rect } => {
                assert_eq!(image.size(), (640, 480));
                assert_eq!(rect, fit_rect((640, 480), (300, 300)));
            }
            SurfaceContent::Placeholder(_) => panic!("expected a frame"),
        }
    }

    #[test]
    fn test_render_frame_ignores_newer_publish() {
        let surface = VideoSurface::new("remote", Rgb::BLACK, "Waiting for video...");
        let shown = image(640, 480);
        surface.sink().publish(image(100, 400));

        let plan = surface.render_frame(Some(Arc::clone(&shown)), (300, 300));
        match plan.content {
            SurfaceContent::Video { image, rect } => {
                assert!(Arc::ptr_eq(&image, &shown));
                assert_eq!(rect, Rect { x: 0, y: 37, width: 300, height: 225 });
            }
            other => panic!("expected video, got {other:?}"),
        }

        let plan = surface.render_frame(None, (300, 300));
        assert!(matches!(plan.content, SurfaceContent::Placeholder("Waiting for video...")));
    }

    #[test]
    fn test_take_redraw_once_per_request() {
        let mut surface = VideoSurface::new("self", Rgb::BLACK, "");
        assert!(!surface.take_redraw());

        surface.sink().publish(image(2, 2));
        surface.sink().publish(image(2, 2));
        assert!(surface.take_redraw());
        assert!(!surface.take_redraw());
    }
}
