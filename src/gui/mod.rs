use crate::config::ViewerConfig;
use anyhow::anyhow;
use iced::Size;

mod app;
mod video;

use self::app::ViewerApp;

pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    let window_size = Size::new(config.window_width, config.window_height);

    iced::application(
        move || ViewerApp::new(config.clone()),
        ViewerApp::update,
        ViewerApp::view,
    )
    .title(ViewerApp::title)
    .subscription(ViewerApp::subscription)
    .window_size(window_size)
    .antialiasing(false)
    .run()
    .map_err(|e| anyhow!("Failed to initialize GUI: {e}"))
}
