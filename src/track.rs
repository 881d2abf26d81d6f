use crate::error::FetchError;

/// Raw playback state as reported by the streaming service, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackStatus {
    pub is_playing: bool,
    pub progress_ms: Option<i64>,
    pub item: Option<PlaybackItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackItem {
    pub name: String,
    pub artists: Vec<String>,
    pub duration_ms: i64,
    pub image_urls: Vec<String>,
}

/// Anything that can answer "what is playing right now".
pub trait PlaybackSource {
    fn current_playback(&self) -> anyhow::Result<Option<PlaybackStatus>>;
}

/// Normalized result of one poll. Recreated every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub track_name: String,
    pub artist_name: String,
    pub progress_ms: u64,
    pub duration_ms: u64,
    pub cover_url: Option<String>,
}

impl PlaybackSnapshot {
    pub fn progress_text(&self) -> String {
        format!(
            "{} / {}",
            format_duration(self.progress_ms),
            format_duration(self.duration_ms)
        )
    }
}

pub type FetchResult = Result<Option<PlaybackSnapshot>, FetchError>;

/// Formats milliseconds as `M:SS`, truncating partial seconds. Minutes are not wrapped into hours.
pub fn format_duration(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let minutes = total_seconds / 60;
    let secs = total_seconds % 60;
    format!("{minutes}:{secs:02}")
}

pub struct TrackFetcher<S> {
    source: S,
}

impl<S: PlaybackSource> TrackFetcher<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Issues exactly one playback query. Source faults never escape as anything but `FetchError`.
    pub fn fetch(&self) -> FetchResult {
        let status = match self.source.current_playback() {
            Ok(status) => status,
            Err(err) => {
                log::warn!("playback query failed: {err:#}");
                return Err(FetchError::network(&err));
            }
        };

        Ok(status.and_then(normalize))
    }
}

fn normalize(status: PlaybackStatus) -> Option<PlaybackSnapshot> {
    if !status.is_playing {
        return None;
    }
    let item = status.item?;

    let PlaybackItem {
        name,
        artists,
        duration_ms,
        image_urls,
    } = item;

    Some(PlaybackSnapshot {
        track_name: name,
        artist_name: artists.into_iter().next().unwrap_or_default(),
        progress_ms: clamp_ms(status.progress_ms.unwrap_or(0)),
        duration_ms: clamp_ms(duration_ms),
        cover_url: image_urls.into_iter().find(|url| !url.is_empty()),
    })
}

fn clamp_ms(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
