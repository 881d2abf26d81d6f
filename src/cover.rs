use std::{
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::Context;
use eframe::egui::ColorImage;
use image::{imageops::FilterType, RgbaImage};

use crate::error::CoverError;

pub const COVER_SIDE: u32 = 70;
pub const COVER_CORNER_RADIUS: f32 = 10.0;

/// Fetches raw image bytes for a cover URL.
pub trait CoverSource {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

pub struct HttpCoverSource {
    client: reqwest::blocking::Client,
}

impl HttpCoverSource {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl CoverSource for HttpCoverSource {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let bytes = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .with_context(|| format!("GET {url}"))?;
        Ok(bytes.to_vec())
    }
}

/// Downloads and prepares a cover. Errors are reported, never panicked on.
pub fn fetch_cover(source: &dyn CoverSource, url: &str) -> Result<ColorImage, CoverError> {
    let bytes = source
        .fetch(url)
        .map_err(|e| CoverError::Download(format!("{e:#}")))?;
    load_cover(&bytes)
}

pub struct CoverMessage {
    pub url: String,
    pub result: Result<Arc<ColorImage>, CoverError>,
}

/// Downloads covers off the poll thread, one thread per URL. Only the most
/// recent request is listened to.
pub struct CoverLoader {
    source: Arc<dyn CoverSource + Send + Sync>,
    rx: Option<Receiver<CoverMessage>>,
    inflight: Option<String>,
}

impl CoverLoader {
    pub fn new(source: Arc<dyn CoverSource + Send + Sync>) -> Self {
        Self {
            source,
            rx: None,
            inflight: None,
        }
    }

    /// Starts a download unless the same URL is already on its way.
    pub fn request(&mut self, url: &str) {
        if self.inflight.as_deref() == Some(url) {
            return;
        }

        let (tx, rx) = mpsc::channel();
        self.rx = Some(rx);
        self.inflight = Some(url.to_owned());

        let source = Arc::clone(&self.source);
        let url = url.to_owned();
        thread::spawn(move || {
            let result = fetch_cover(&*source, &url).map(Arc::new);
            let _ = tx.send(CoverMessage { url, result });
        });
    }

    pub fn try_recv(&mut self) -> Option<CoverMessage> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(message) => {
                self.finish();
                Some(message)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::warn!("cover download thread exited without a result");
                self.finish();
                None
            }
        }
    }

    fn finish(&mut self) {
        self.rx = None;
        self.inflight = None;
    }
}

pub fn load_cover(bytes: &[u8]) -> Result<ColorImage, CoverError> {
    let image = image::load_from_memory(bytes).map_err(|e| CoverError::Decode(e.to_string()))?;
    let mut image =
        image::imageops::resize(&image.to_rgba8(), COVER_SIDE, COVER_SIDE, FilterType::Triangle);
    round_corners(&mut image, COVER_CORNER_RADIUS);

    let size = [image.width() as usize, image.height() as usize];
    let pixels = image.into_raw();
    Ok(ColorImage::from_rgba_unmultiplied(size, &pixels))
}

/// Clips the image to a rounded rectangle by scaling alpha, with a one-pixel soft edge.
pub fn round_corners(image: &mut RgbaImage, radius: f32) {
    let width = image.width() as f32;
    let height = image.height() as f32;
    let radius = radius.clamp(0.0, width.min(height) / 2.0);
    if radius <= 0.0 {
        return;
    }

    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let px = x as f32 + 0.5;
        let py = y as f32 + 0.5;

        let cx = px.clamp(radius, width - radius);
        let cy = py.clamp(radius, height - radius);
        let dx = px - cx;
        let dy = py - cy;
        if dx == 0.0 && dy == 0.0 {
            continue;
        }

        let distance = (dx * dx + dy * dy).sqrt();
        let coverage = (radius - distance + 0.5).clamp(0.0, 1.0);
        pixel[3] = (pixel[3] as f32 * coverage).round() as u8;
    }
}
