use anyhow::Context;
use rspotify::{
    model::{AdditionalType, CurrentPlaybackContext, PlayableItem},
    prelude::*,
    scopes, AuthCodeSpotify, Config as ClientConfig, Credentials, OAuth,
};

use crate::{
    config::SpotifyConfig,
    track::{PlaybackItem, PlaybackSource, PlaybackStatus},
};

/// Authenticated Spotify client. Built once at startup and handed to the poll worker.
pub struct SpotifySession {
    client: AuthCodeSpotify,
}

impl SpotifySession {
    /// Loads the cached token (refreshing it when expired) or runs the
    /// interactive authorization flow, then writes the cache back.
    pub fn connect(config: &SpotifyConfig) -> anyhow::Result<Self> {
        let credentials = Credentials::new(&config.client_id, &config.client_secret);
        let oauth = OAuth {
            redirect_uri: config.redirect_uri.clone(),
            scopes: scopes!("user-read-playback-state"),
            ..Default::default()
        };
        let client_config = ClientConfig {
            token_cached: true,
            token_refreshing: true,
            cache_path: config.token_cache.clone(),
            ..Default::default()
        };

        let client = AuthCodeSpotify::with_config(credentials, oauth, client_config);
        let url = client
            .get_authorize_url(false)
            .context("Failed to build Spotify authorization URL")?;
        client.prompt_for_token(&url).with_context(|| {
            format!(
                "Spotify authorization failed (token cache: {})",
                config.token_cache.display()
            )
        })?;

        log::info!("Spotify session ready");
        Ok(Self { client })
    }
}

impl PlaybackSource for SpotifySession {
    fn current_playback(&self) -> anyhow::Result<Option<PlaybackStatus>> {
        let additional_types = [AdditionalType::Track, AdditionalType::Episode];
        let context = self
            .client
            .current_playback(None, Some(&additional_types))
            .context("Spotify playback query failed")?;
        Ok(context.map(playback_status))
    }
}

fn playback_status(context: CurrentPlaybackContext) -> PlaybackStatus {
    PlaybackStatus {
        is_playing: context.is_playing,
        progress_ms: context.progress.map(|progress| progress.num_milliseconds()),
        item: context.item.map(playback_item),
    }
}

fn playback_item(item: PlayableItem) -> PlaybackItem {
    match item {
        PlayableItem::Track(track) => PlaybackItem {
            name: track.name,
            artists: track.artists.into_iter().map(|artist| artist.name).collect(),
            duration_ms: track.duration.num_milliseconds(),
            image_urls: track.album.images.into_iter().map(|image| image.url).collect(),
        },
        PlayableItem::Episode(episode) => PlaybackItem {
            name: episode.name,
            artists: vec![episode.show.publisher],
            duration_ms: episode.duration.num_milliseconds(),
            image_urls: episode.images.into_iter().map(|image| image.url).collect(),
        },
    }
}
