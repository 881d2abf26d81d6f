use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration failures. All of these are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration file found (searched: {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("missing required config field `{0}`")]
    MissingField(&'static str),
}

/// Playback-status fetch failures. The `Display` text is what the overlay shows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("No internet connection")]
    Network(String),

    #[error("Spotify request timed out")]
    Timeout,

    /// The background poller is gone; nothing will refresh the overlay again.
    #[error("Overlay updates stopped")]
    WorkerStopped,
}

impl FetchError {
    pub fn network(err: &anyhow::Error) -> Self {
        FetchError::Network(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoverError {
    #[error("cover download failed: {0}")]
    Download(String),

    #[error("cover decode failed: {0}")]
    Decode(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
