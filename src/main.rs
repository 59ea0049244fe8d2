use clap::{value_parser, Arg, ArgAction, Command};
use peerview::config::{app_name, version, ViewerConfig};
use peerview::gui;
use peerview::pipeline::QualityHint;
use std::path::PathBuf;
use std::{panic, process};

fn main() {
    tracing_subscriber::fmt::init();

    let matches = Command::new(app_name())
        .version(version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file.")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("quality")
                .short('q')
                .long("quality")
                .value_name("QUALITY")
                .help("Video quality requested from remote participants (90p, 180p, 360p, 720p, 1080p).")
                .value_parser(value_parser!(QualityHint)),
        )
        .arg(
            Arg::new("participants")
                .short('p')
                .long("participants")
                .value_name("COUNT")
                .help("Number of synthetic remote participants.")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_name("FPS")
                .help("Frame rate of the synthetic feeds.")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("no-preview")
                .long("no-preview")
                .help("Start with the local preview turned off.")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => match ViewerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{e:#}");
                process::exit(2);
            }
        },
        None => ViewerConfig::default(),
    };

    if let Some(quality) = matches.get_one::<QualityHint>("quality") {
        config.quality = *quality;
    }
    if let Some(participants) = matches.get_one::<u32>("participants") {
        config.participants = *participants;
    }
    if let Some(fps) = matches.get_one::<u32>("fps") {
        config.fps = *fps;
    }
    if matches.get_flag("no-preview") {
        config.preview_enabled = false;
    }
    if let Err(e) = config.validate() {
        log::error!("Invalid configuration: {e:#}");
        process::exit(2);
    }

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // invoke the default handler and exit the process
        orig_hook(panic_info);
        process::exit(105);
    }));

    log::info!("Starting {} {}", app_name(), version());
    if let Err(e) = gui::run(config) {
        log::error!("{e:#}");
        process::exit(1);
    }
}
