use crate::config::{app_name, version, ViewerConfig};
use crate::gui::video::{redraw_stream, RedrawFeed, VideoTile};
use crate::pipeline::{FrameSubscription, RemoteVideoRegistry, SourceId};
use crate::workers::SyntheticSource;
use iced::alignment;
use iced::widget::{Button, Column, Row, Text};
use iced::{Element, Length, Subscription, Task};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Message {
    Redraw,
    TogglePreview,
    AddParticipant,
    RemoveParticipant(String),
}

pub struct ViewerApp {
    config: ViewerConfig,
    source: Arc<SyntheticSource>,
    preview: VideoTile,
    preview_subscription: FrameSubscription,
    registry: RemoteVideoRegistry,
    remotes: Vec<VideoTile>,
    next_guest: u32,
    /// Bumped whenever tiles come or go, restarts the redraw feed
    tiles_epoch: u64,
    status: String,
}

impl ViewerApp {
    pub fn new(config: ViewerConfig) -> Self {
        let source = Arc::new(SyntheticSource::new(
            (config.frame_width, config.frame_height),
            config.fps,
        ));
        let preview = VideoTile::new("Self view", config.background, &config.placeholder_text);
        let preview_subscription = FrameSubscription::new(source.clone(), preview.surface().sink());
        let registry = RemoteVideoRegistry::new(source.clone());

        let mut app = ViewerApp {
            config,
            source,
            preview,
            preview_subscription,
            registry,
            remotes: Vec::new(),
            next_guest: 1,
            tiles_epoch: 0,
            status: String::new(),
        };

        if app.config.preview_enabled {
            app.start_preview();
        }
        for _ in 0..app.config.participants {
            app.add_participant();
        }
        app.update_status();
        app
    }

    pub fn title(&self) -> String {
        format!("{} {}", app_name(), version())
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Redraw => {
                let mut redrawn = self.preview.refresh() as usize;
                for tile in &mut self.remotes {
                    redrawn += tile.refresh() as usize;
                }
                if redrawn > 0 {
                    self.update_status();
                }
            }
            Message::TogglePreview => {
                if self.preview_subscription.is_subscribed() {
                    self.preview_subscription.unsubscribe();
                    self.preview.surface().sink().clear();
                } else {
                    self.start_preview();
                }
                self.update_status();
            }
            Message::AddParticipant => {
                self.add_participant();
                self.update_status();
            }
            Message::RemoveParticipant(name) => {
                // the source reports raw data off, which unsubscribes the tile
                self.source.remove_participant(&name);
                self.registry.remove(&name);
                self.remotes.retain(|tile| tile.label() != name);
                self.tiles_epoch += 1;
                self.update_status();
            }
        }

        Task::none()
    }

    pub fn view(&self) -> Element<'_, Message> {
        let preview_label = if self.preview_subscription.is_subscribed() {
            "Stop preview"
        } else {
            "Start preview"
        };

        let mut toolbar = Row::new()
            .spacing(10)
            .align_y(alignment::Vertical::Center)
            .push(Button::new(Text::new(preview_label)).on_press(Message::TogglePreview))
            .push(Button::new(Text::new("Add participant")).on_press(Message::AddParticipant));
        for tile in &self.remotes {
            toolbar = toolbar.push(
                Button::new(Text::new(format!("Remove {}", tile.label())))
                    .on_press(Message::RemoveParticipant(tile.label().to_string())),
            );
        }

        let tiles = self
            .remotes
            .iter()
            .fold(Row::new().spacing(8).push(self.preview.view()), |row, tile| {
                row.push(tile.view())
            })
            .width(Length::Fill)
            .height(Length::Fill);

        Column::new()
            .padding(10)
            .spacing(10)
            .push(toolbar)
            .push(tiles)
            .push(Text::new(self.status.as_str()).size(12))
            .into()
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let tiles = std::iter::once(&self.preview).chain(&self.remotes);
        Subscription::run_with(RedrawFeed::new(self.tiles_epoch, tiles), redraw_stream)
    }

    fn start_preview(&mut self) {
        if let Err(e) = self
            .preview_subscription
            .subscribe_to(SourceId::LocalPreview, self.config.quality)
        {
            log::error!("Failed to start the local preview: {e}");
        }
    }

    fn add_participant(&mut self) {
        let name = format!("guest-{}", self.next_guest);
        self.next_guest += 1;
        self.source.add_participant(&name);

        let tile = VideoTile::new(name.as_str(), self.config.background, &self.config.placeholder_text);
        if let Err(e) = self
            .registry
            .subscribe(&name, tile.surface().sink(), self.config.quality)
        {
            log::error!("Failed to subscribe to {name}: {e}");
        }
        self.remotes.push(tile);
        self.tiles_epoch += 1;
    }

    fn update_status(&mut self) {
        let preview = self.preview_subscription.health().summary();
        self.status = format!(
            "Preview {} ({preview}) | {} remote participant(s) | {} redraws",
            self.preview_subscription.state(),
            self.registry.len(),
            self.preview.redraws()
                + self.remotes.iter().map(VideoTile::redraws).sum::<u64>()
        );
    }
}
