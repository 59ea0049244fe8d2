use crate::decoder::DecodedImage;
use crate::display::{Rgb, SurfaceContent, VideoSurface};
use crate::gui::app::Message;
use iced::alignment;
use iced::futures::stream::{self, BoxStream, Stream, StreamExt};
use iced::widget::image::{Handle, Image};
use iced::widget::{container, responsive, Column, Container, Text};
use iced::{Color, ContentFit, Element, Length, Padding};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::watch;

/// Redraw requests of the tiles on screen.
///
/// Identified by `epoch` only, so iced keeps the running stream until the
/// set of tiles changes.
pub struct RedrawFeed {
    epoch: u64,
    receivers: Vec<watch::Receiver<u64>>,
}

impl RedrawFeed {
    pub fn new<'a>(epoch: u64, tiles: impl IntoIterator<Item = &'a VideoTile>) -> Self {
        Self {
            epoch,
            receivers: tiles
                .into_iter()
                .map(|tile| tile.surface().sink().redraw_requests())
                .collect(),
        }
    }
}

impl Hash for RedrawFeed {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
    }
}

fn changes(receiver: watch::Receiver<u64>) -> BoxStream<'static, ()> {
    stream::unfold(receiver, |mut receiver| async move {
        receiver.changed().await.ok()?;
        Some(((), receiver))
    })
    .boxed()
}

/// One `Message::Redraw` per publish or clear on any of the feed's sinks.
pub fn redraw_stream(feed: &RedrawFeed) -> impl Stream<Item = Message> + use<> {
    stream::select_all(feed.receivers.iter().cloned().map(changes)).map(|()| Message::Redraw)
}

fn to_color(rgb: Rgb) -> Color {
    Color::from_rgb8(rgb.0, rgb.1, rgb.2)
}

/// Readable text colour on top of `background`.
fn text_color(background: Rgb) -> Color {
    let luma = (background.0 as u32 * 299 + background.1 as u32 * 587 + background.2 as u32 * 114) / 1000;
    if luma > 128 {
        Color::BLACK
    } else {
        Color::WHITE
    }
}

/// A labelled tile showing one `VideoSurface`.
pub struct VideoTile {
    surface: VideoSurface,
    /// Texture handle of the image shown last, reused until a new frame lands
    cached: Option<(Arc<DecodedImage>, Handle)>,
    redraws: u64,
}

impl VideoTile {
    pub fn new(label: impl Into<String>, background: Rgb, placeholder: impl Into<String>) -> Self {
        Self {
            surface: VideoSurface::new(label, background, placeholder),
            cached: None,
            redraws: 0,
        }
    }

    pub fn surface(&self) -> &VideoSurface {
        &self.surface
    }

    pub fn label(&self) -> &str {
        self.surface.label()
    }

    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    /// Picks up a pending redraw request, returns whether there was one.
    pub fn refresh(&mut self) -> bool {
        if !self.surface.take_redraw() {
            return false;
        }

        self.redraws += 1;
        let current = self.surface.sink().current_image();
        let unchanged = match (&self.cached, &current) {
            (Some((cached, _)), Some(image)) => Arc::ptr_eq(cached, image),
            _ => false,
        };
        if !unchanged {
            self.cached = current.map(|image| {
                let handle = Handle::from_rgba(image.width(), image.height(), image.pixels());
                (image, handle)
            });
        }
        true
    }

    /// The frame and texture handle the view draws, set only by `refresh`.
    pub fn shown_frame(&self) -> Option<&(Arc<DecodedImage>, Handle)> {
        self.cached.as_ref()
    }

    pub fn view(&self) -> Element<'_, Message> {
        let surface = responsive(move |size| {
            let bounds = (size.width.max(0.0) as u32, size.height.max(0.0) as u32);
            let frame = self.shown_frame();
            let plan = self
                .surface
                .render_frame(frame.map(|(image, _)| Arc::clone(image)), bounds);
            let background = plan.background;

            let content: Element<'_, Message> = match (plan.content, frame) {
                (SurfaceContent::Video { rect, .. }, Some((_, handle))) => {
                    let frame = Image::new(handle.clone())
                        .width(rect.width as f32)
                        .height(rect.height as f32)
                        .content_fit(ContentFit::Fill);

                    Container::new(frame)
                        .padding(Padding {
                            top: rect.y as f32,
                            left: rect.x as f32,
                            ..Padding::ZERO
                        })
                        .width(Length::Fill)
                        .height(Length::Fill)
                        .into()
                }
                _ => Container::new(
                    Text::new(self.surface.placeholder()).color(text_color(background)),
                )
                .width(Length::Fill)
                .height(Length::Fill)
                .align_x(alignment::Horizontal::Center)
                .align_y(alignment::Vertical::Center)
                .into(),
            };

            Container::new(content)
                .width(Length::Fill)
                .height(Length::Fill)
                .style(move |_theme| container::Style {
                    background: Some(to_color(background).into()),
                    ..Default::default()
                })
                .into()
        });

        Column::new()
            .spacing(4)
            .push(Text::new(self.label()).size(14))
            .push(surface)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}
