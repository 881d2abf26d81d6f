use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::ConfigError;

const DEFAULT_TOKEN_CACHE: &str = "login.json";
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub spotify: SpotifyConfig,
    pub overlay: OverlayConfig,
}

impl Config {
    /// Loads the first config file found next to the working directory or the executable.
    pub fn load() -> Result<(Self, PathBuf), ConfigError> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = env::current_dir() {
            candidates.extend(candidate_paths(&current_dir));
        }

        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.extend(candidate_paths(dir));
            }
        }

        Self::load_first(&candidates)
    }

    pub fn load_first(candidates: &[PathBuf]) -> Result<(Self, PathBuf), ConfigError> {
        for path in candidates {
            if path.exists() {
                let config = Self::load_from(path)?;
                return Ok((config, path.clone()));
            }
        }

        Err(ConfigError::NotFound {
            searched: candidates.to_vec(),
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json_str(&data)
        } else {
            Self::from_toml_str(&data)
        };

        parsed.map_err(|err| match err {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml_str(data: &str) -> Result<Self, ConfigError> {
        let doc: ConfigDocument = toml::from_str(data).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        doc.try_into()
    }

    /// Parses the flat `config.json` layout: `client_id`, `client_secret`, `redirect_uri`.
    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let section: SpotifySection = serde_json::from_str(data).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        ConfigDocument {
            spotify: Some(section),
            overlay: OverlaySection::default(),
        }
        .try_into()
    }
}

fn candidate_paths(dir: &Path) -> [PathBuf; 3] {
    [
        dir.join("config.toml"),
        dir.join("config").join("config.toml"),
        dir.join("config.json"),
    ]
}

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_cache: PathBuf,
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub show_cover: bool,
    pub track_font_size: f32,
    pub progress_font_size: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            show_cover: true,
            track_font_size: 20.0,
            progress_font_size: 16.0,
        }
    }
}

impl OverlayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.clamp(500, 30_000))
    }

    pub fn track_font_size(&self) -> f32 {
        self.track_font_size.clamp(8.0, 72.0)
    }

    pub fn progress_font_size(&self) -> f32 {
        self.progress_font_size.clamp(8.0, 72.0)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    spotify: Option<SpotifySection>,
    #[serde(default)]
    overlay: OverlaySection,
}

impl TryFrom<ConfigDocument> for Config {
    type Error = ConfigError;

    fn try_from(value: ConfigDocument) -> Result<Self, Self::Error> {
        let spotify = value
            .spotify
            .ok_or(ConfigError::MissingField("spotify"))?;
        let defaults = OverlayConfig::default();

        Ok(Config {
            spotify: SpotifyConfig {
                client_id: required(spotify.client_id, "client_id")?,
                client_secret: required(spotify.client_secret, "client_secret")?,
                redirect_uri: required(spotify.redirect_uri, "redirect_uri")?,
                token_cache: spotify
                    .token_cache
                    .filter(|path| !path.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_CACHE)),
            },
            overlay: OverlayConfig {
                poll_interval_ms: value
                    .overlay
                    .poll_interval_ms
                    .unwrap_or(defaults.poll_interval_ms),
                request_timeout_ms: value
                    .overlay
                    .request_timeout_ms
                    .unwrap_or(defaults.request_timeout_ms),
                show_cover: value.overlay.show_cover.unwrap_or(defaults.show_cover),
                track_font_size: value
                    .overlay
                    .track_font_size
                    .unwrap_or(defaults.track_font_size),
                progress_font_size: value
                    .overlay
                    .progress_font_size
                    .unwrap_or(defaults.progress_font_size),
            },
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingField(field))
}

#[derive(Debug, Default, Deserialize)]
struct SpotifySection {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    token_cache: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySection {
    poll_interval_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    show_cover: Option<bool>,
    track_font_size: Option<f32>,
    progress_font_size: Option<f32>,
}
