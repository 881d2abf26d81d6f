mod config;
mod cover;
mod error;
mod layout;
mod overlay;
mod spotify;
mod track;
mod worker;

use std::sync::Arc;

use anyhow::Context;
use eframe::egui::ViewportBuilder;

use crate::{
    config::Config,
    cover::{CoverLoader, CoverSource, HttpCoverSource},
    overlay::{OverlayApp, Workers},
    spotify::SpotifySession,
    track::TrackFetcher,
    worker::PollWorker,
};

fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let (config, path) = Config::load()?;
    log::info!("loaded config from {}", path.display());

    let session =
        SpotifySession::connect(&config.spotify).context("Failed to authenticate with Spotify")?;

    let covers: Option<Arc<dyn CoverSource + Send + Sync>> = if config.overlay.show_cover {
        let source = HttpCoverSource::new(config.overlay.request_timeout())?;
        Some(Arc::new(source))
    } else {
        None
    };
    let start_workers = Box::new(move || Workers {
        poll: PollWorker::spawn(TrackFetcher::new(session)),
        covers: covers.map(CoverLoader::new),
    });

    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title("Select Position")
            .with_inner_size([220.0, 300.0])
            .with_resizable(false)
            .with_transparent(true),
        ..Default::default()
    };
    let settings = config.overlay.clone();

    eframe::run_native(
        "Now Playing",
        native_options,
        Box::new(
            |_cc| -> std::result::Result<
                Box<dyn eframe::App>,
                Box<dyn std::error::Error + Send + Sync>,
            > { Ok(Box::new(OverlayApp::new(settings, start_workers))) },
        ),
    )
    .map_err(|e| anyhow::anyhow!("event loop terminated abnormally: {e}"))
}
