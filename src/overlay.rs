use std::{
    sync::{mpsc::TryRecvError, Arc},
    time::{Duration, Instant},
};

use eframe::egui::{
    self, Align2, Color32, ColorImage, CornerRadius, FontId, Galley, TextureHandle,
    TextureOptions, ViewportCommand, WindowLevel,
};

use crate::{
    config::OverlayConfig,
    cover::{CoverLoader, COVER_SIDE},
    error::FetchError,
    layout::{
        required_size, AnchorPosition, Extent, Placement, WindowGeometry, ANCHOR_CHOICES,
        COVER_SLOT_WIDTH, OVERLAY_HEIGHT, TEXT_PADDING,
    },
    track::FetchResult,
    worker::{PollResponse, PollWorker},
};

pub const NO_TRACK_TEXT: &str = "No track currently playing";
pub const NO_COVER_TEXT: &str = "No Cover";

const LINE_GAP: f32 = 4.0;
const INFLIGHT_REPAINT: Duration = Duration::from_millis(30);

/// Text shown for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayLines {
    pub track: String,
    pub progress: String,
}

impl DisplayLines {
    pub fn from_result(result: &FetchResult) -> Self {
        match result {
            Ok(Some(snapshot)) => Self {
                track: snapshot.track_name.clone(),
                progress: snapshot.progress_text(),
            },
            Ok(None) => Self {
                track: NO_TRACK_TEXT.to_string(),
                progress: String::new(),
            },
            Err(err) => Self::error(err),
        }
    }

    fn error(err: &FetchError) -> Self {
        Self {
            track: err.to_string(),
            progress: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverSlot {
    Empty,
    /// Space is reserved while the download runs.
    Loading { url: String },
    Placeholder,
    Image { url: String },
}

impl CoverSlot {
    fn is_present(&self) -> bool {
        !matches!(self, CoverSlot::Empty)
    }
}

/// Background services the overlay drives once an anchor is chosen.
pub struct Workers {
    pub poll: PollWorker,
    /// `None` when covers are turned off.
    pub covers: Option<CoverLoader>,
}

/// Displaying-stage controller: owns the poll cadence, the rendered state and the window geometry.
pub struct Overlay {
    anchor: AnchorPosition,
    settings: OverlayConfig,
    worker: PollWorker,
    covers: Option<CoverLoader>,
    geometry: WindowGeometry,
    lines: DisplayLines,
    cover: CoverSlot,
    /// Last finished download; `None` image means it failed.
    finished_cover: Option<(String, Option<Arc<ColorImage>>)>,
    cover_texture: Option<(String, TextureHandle)>,
    next_request_id: u64,
    inflight: Option<(u64, Instant)>,
    last_tick: Option<Instant>,
    last_track: Option<(String, String)>,
    worker_lost: bool,
}

impl Overlay {
    pub fn new(anchor: AnchorPosition, settings: OverlayConfig, workers: Workers) -> Self {
        Self {
            anchor,
            settings,
            worker: workers.poll,
            covers: workers.covers,
            geometry: WindowGeometry::default(),
            lines: DisplayLines::default(),
            cover: CoverSlot::Empty,
            finished_cover: None,
            cover_texture: None,
            next_request_id: 1,
            inflight: None,
            last_tick: None,
            last_track: None,
            worker_lost: false,
        }
    }

    pub fn update(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        self.drain_responses();
        self.drain_covers();
        self.check_timeout(now);
        self.maybe_request(now);

        let screen = ctx
            .input(|i| i.viewport().monitor_size)
            .map(|size| Extent::new(size.x.round() as i32, size.y.round() as i32));

        let (track, progress) = self.measure(ctx);
        if let Some(placement) = self.fit_window(&track, &progress, screen) {
            ctx.send_viewport_cmd(ViewportCommand::InnerSize(egui::vec2(
                placement.size.width as f32,
                placement.size.height as f32,
            )));
            if let Some(position) = placement.position {
                ctx.send_viewport_cmd(ViewportCommand::OuterPosition(egui::pos2(
                    position.x as f32,
                    position.y as f32,
                )));
            }
        }

        self.render(ctx, track, progress);
        ctx.request_repaint_after(self.repaint_delay(now));
    }

    fn drain_responses(&mut self) {
        loop {
            match self.worker.try_recv() {
                Ok(response) => self.accept_response(response),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.mark_worker_lost();
                    break;
                }
            }
        }
    }

    /// Applies the answer to the in-flight request; anything else is stale.
    fn accept_response(&mut self, response: PollResponse) {
        if self.inflight.map(|(id, _)| id) == Some(response.request_id) {
            self.inflight = None;
            self.apply_response(response);
        } else {
            log::debug!("dropping stale poll response #{}", response.request_id);
        }
    }

    fn apply_response(&mut self, response: PollResponse) {
        self.lines = DisplayLines::from_result(&response.result);
        self.note_track_change(&response.result);

        let Ok(Some(snapshot)) = &response.result else {
            self.clear_cover();
            return;
        };
        let Some(loader) = self.covers.as_mut() else {
            self.clear_cover();
            return;
        };
        let Some(url) = snapshot.cover_url.clone() else {
            self.cover = CoverSlot::Placeholder;
            return;
        };

        self.cover = match &self.finished_cover {
            Some((done, Some(_))) if *done == url => CoverSlot::Image { url },
            Some((done, None)) if *done == url => CoverSlot::Placeholder,
            _ => {
                loader.request(&url);
                CoverSlot::Loading { url }
            }
        };
    }

    fn drain_covers(&mut self) {
        let Some(loader) = self.covers.as_mut() else {
            return;
        };
        while let Some(message) = loader.try_recv() {
            let image = match message.result {
                Ok(image) => Some(image),
                Err(err) => {
                    log::warn!("{err} ({})", message.url);
                    None
                }
            };
            if matches!(&self.cover, CoverSlot::Loading { url } if *url == message.url) {
                self.cover = match image {
                    Some(_) => CoverSlot::Image {
                        url: message.url.clone(),
                    },
                    None => CoverSlot::Placeholder,
                };
            }
            self.finished_cover = Some((message.url, image));
        }
    }

    fn note_track_change(&mut self, result: &FetchResult) {
        let current = match result {
            Ok(Some(snapshot)) => Some((snapshot.track_name.clone(), snapshot.artist_name.clone())),
            Ok(None) => None,
            Err(_) => return,
        };
        if current != self.last_track {
            if let Some((track, artist)) = &current {
                log::info!("now playing: {track} by {artist}");
            }
            self.last_track = current;
        }
    }

    fn apply_error(&mut self, err: &FetchError) {
        self.lines = DisplayLines::error(err);
        self.clear_cover();
    }

    fn clear_cover(&mut self) {
        self.cover = CoverSlot::Empty;
    }

    /// Only the playback query is timed; cover downloads finish on their own.
    fn check_timeout(&mut self, now: Instant) {
        let Some((id, sent_at)) = self.inflight else {
            return;
        };
        if now.duration_since(sent_at) > self.settings.request_timeout() {
            log::warn!("poll #{id} exceeded {:?}", self.settings.request_timeout());
            self.inflight = None;
            self.apply_error(&FetchError::Timeout);
        }
    }

    fn maybe_request(&mut self, now: Instant) {
        if self.inflight.is_some() || self.worker_lost {
            return;
        }
        if let Some(last) = self.last_tick {
            if now.duration_since(last) < self.settings.poll_interval() {
                return;
            }
        }

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.last_tick = Some(now);

        if self.worker.request(request_id) {
            self.inflight = Some((request_id, now));
        } else {
            self.mark_worker_lost();
        }
    }

    fn mark_worker_lost(&mut self) {
        if !self.worker_lost {
            log::error!("poll worker exited; overlay will no longer update");
            self.worker_lost = true;
            self.inflight = None;
            self.apply_error(&FetchError::WorkerStopped);
        }
    }

    fn repaint_delay(&self, now: Instant) -> Duration {
        if self.inflight.is_some() || matches!(self.cover, CoverSlot::Loading { .. }) {
            return INFLIGHT_REPAINT;
        }
        let interval = self.settings.poll_interval();
        self.last_tick
            .map(|last| interval.saturating_sub(now.duration_since(last)))
            .unwrap_or(Duration::ZERO)
    }

    fn measure(&self, ctx: &egui::Context) -> (Arc<Galley>, Arc<Galley>) {
        ctx.fonts(|fonts| {
            (
                fonts.layout_no_wrap(
                    self.lines.track.clone(),
                    FontId::proportional(self.settings.track_font_size()),
                    Color32::WHITE,
                ),
                fonts.layout_no_wrap(
                    self.lines.progress.clone(),
                    FontId::proportional(self.settings.progress_font_size()),
                    Color32::WHITE,
                ),
            )
        })
    }

    /// Resizes to the measured content. Anchoring waits until the monitor size is known.
    fn fit_window(
        &mut self,
        track: &Galley,
        progress: &Galley,
        screen: Option<Extent>,
    ) -> Option<Placement> {
        let required = required_size(
            track.size().x,
            progress.size().x,
            self.cover.is_present(),
        );
        self.geometry.reconcile(required, self.anchor, screen)
    }

    fn render(&mut self, ctx: &egui::Context, track: Arc<Galley>, progress: Arc<Galley>) {
        self.sync_cover_texture(ctx);

        let mut panel_frame = egui::Frame::central_panel(&ctx.style());
        panel_frame.fill = Color32::TRANSPARENT;
        panel_frame.inner_margin = egui::Margin::ZERO;

        egui::CentralPanel::default()
            .frame(panel_frame)
            .show(ctx, |ui| {
                let origin = ui.max_rect().min;
                let painter = ui.painter();
                let left = (TEXT_PADDING / 2) as f32;
                let height = OVERLAY_HEIGHT as f32;

                let mut text_x = left;
                if self.cover.is_present() {
                    let side = COVER_SIDE as f32;
                    let rect = egui::Rect::from_min_size(
                        origin + egui::vec2(left, (height - side) / 2.0),
                        egui::vec2(side, side),
                    );
                    let rounding = CornerRadius::same(10);
                    match (&self.cover, &self.cover_texture) {
                        (CoverSlot::Image { .. }, Some((_, texture))) => {
                            egui::Image::new((texture.id(), rect.size()))
                                .corner_radius(rounding)
                                .paint_at(ui, rect);
                        }
                        (CoverSlot::Placeholder, _) => {
                            painter.rect_filled(rect, rounding, Color32::from_black_alpha(120));
                            painter.text(
                                rect.center(),
                                Align2::CENTER_CENTER,
                                NO_COVER_TEXT,
                                FontId::proportional(12.0),
                                Color32::WHITE,
                            );
                        }
                        _ => {
                            painter.rect_filled(rect, rounding, Color32::from_black_alpha(120));
                        }
                    }
                    text_x += COVER_SLOT_WIDTH as f32;
                }

                let text_height = track.size().y + LINE_GAP + progress.size().y;
                let top = ((height - text_height) / 2.0).max(0.0);
                let track_pos = origin + egui::vec2(text_x, top);
                let progress_pos = track_pos + egui::vec2(0.0, track.size().y + LINE_GAP);
                painter.galley(track_pos, track, Color32::WHITE);
                painter.galley(progress_pos, progress, Color32::WHITE);
            });
    }

    fn sync_cover_texture(&mut self, ctx: &egui::Context) {
        let CoverSlot::Image { url } = &self.cover else {
            self.cover_texture = None;
            return;
        };
        if self
            .cover_texture
            .as_ref()
            .is_some_and(|(loaded, _)| loaded == url)
        {
            return;
        }
        if let Some((done, Some(image))) = &self.finished_cover {
            if done == url {
                let texture =
                    ctx.load_texture("overlay.cover", (**image).clone(), TextureOptions::LINEAR);
                self.cover_texture = Some((url.clone(), texture));
            }
        }
    }
}

type WorkerFactory = Box<dyn FnOnce() -> Workers>;

enum Stage {
    Selecting,
    Displaying(Box<Overlay>),
}

/// Root eframe app: anchor picker first, then the overlay in the same native window.
pub struct OverlayApp {
    settings: OverlayConfig,
    start_workers: Option<WorkerFactory>,
    stage: Stage,
}

impl OverlayApp {
    pub fn new(settings: OverlayConfig, start_workers: WorkerFactory) -> Self {
        Self {
            settings,
            start_workers: Some(start_workers),
            stage: Stage::Selecting,
        }
    }

    fn render_picker(&self, ctx: &egui::Context) -> Option<AnchorPosition> {
        let mut chosen = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.spacing_mut().item_spacing.y = 6.0;
            ui.label("Select the position for the overlay:");
            for (label, anchor) in ANCHOR_CHOICES {
                let button = egui::Button::new(label);
                if ui.add_sized([ui.available_width(), 24.0], button).clicked() {
                    chosen = Some(anchor);
                }
            }
        });
        chosen
    }

    fn begin_display(&mut self, ctx: &egui::Context, anchor: AnchorPosition) {
        let Some(start_workers) = self.start_workers.take() else {
            log::error!("overlay already started");
            return;
        };
        log::info!(
            "anchor selected: ({}, {})",
            anchor.x.fraction(),
            anchor.y.fraction()
        );

        ctx.send_viewport_cmd(ViewportCommand::Title("Now Playing".into()));
        ctx.send_viewport_cmd(ViewportCommand::Decorations(false));
        ctx.send_viewport_cmd(ViewportCommand::WindowLevel(WindowLevel::AlwaysOnTop));
        ctx.send_viewport_cmd(ViewportCommand::MousePassthrough(true));

        let overlay = Overlay::new(anchor, self.settings.clone(), start_workers());
        self.stage = Stage::Displaying(Box::new(overlay));
        ctx.request_repaint();
    }
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Stage::Displaying(overlay) = &mut self.stage {
            overlay.update(ctx);
            return;
        }

        if ctx.input(|i| i.viewport().close_requested()) {
            log::info!("anchor picker dismissed; no overlay shown");
        }
        if let Some(anchor) = self.render_picker(ctx) {
            self.begin_display(ctx, anchor);
        }
    }

    fn clear_color(&self, visuals: &egui::Visuals) -> [f32; 4] {
        match self.stage {
            Stage::Selecting => visuals.panel_fill.to_normalized_gamma_f32(),
            Stage::Displaying(_) => [0.0; 4],
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cover::CoverSource,
        layout::Point,
        track::{PlaybackItem, PlaybackSnapshot, PlaybackSource, PlaybackStatus, TrackFetcher},
    };
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::{
        cell::Cell,
        io::Cursor,
        rc::Rc,
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    const COVER_URL: &str = "https://i.scdn.co/image/a";

    struct Fixed(Option<PlaybackStatus>);

    impl PlaybackSource for Fixed {
        fn current_playback(&self) -> anyhow::Result<Option<PlaybackStatus>> {
            Ok(self.0.clone())
        }
    }

    struct SlowCovers {
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl CoverSource for SlowCovers {
        fn fetch(&self, _url: &str) -> anyhow::Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            let image = RgbaImage::from_pixel(8, 8, Rgba([10, 200, 30, 255]));
            let mut out = Vec::new();
            image.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
            Ok(out)
        }
    }

    fn slow_covers(delay: Duration) -> (CoverLoader, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = SlowCovers {
            delay,
            calls: Arc::clone(&calls),
        };
        (CoverLoader::new(Arc::new(source)), calls)
    }

    fn playing_status() -> PlaybackStatus {
        PlaybackStatus {
            is_playing: true,
            progress_ms: Some(65_000),
            item: Some(PlaybackItem {
                name: "Song A".into(),
                artists: vec!["Artist".into()],
                duration_ms: 200_000,
                image_urls: vec![COVER_URL.into()],
            }),
        }
    }

    fn workers(status: Option<PlaybackStatus>, covers: Option<CoverLoader>) -> Workers {
        Workers {
            poll: PollWorker::spawn(TrackFetcher::new(Fixed(status))),
            covers,
        }
    }

    fn overlay(anchor: AnchorPosition, covers: Option<CoverLoader>) -> Overlay {
        Overlay::new(anchor, OverlayConfig::default(), workers(None, covers))
    }

    fn snapshot() -> PlaybackSnapshot {
        PlaybackSnapshot {
            track_name: "Song A".into(),
            artist_name: "Artist".into(),
            progress_ms: 65_000,
            duration_ms: 200_000,
            cover_url: Some(COVER_URL.into()),
        }
    }

    fn response(request_id: u64, result: FetchResult) -> PollResponse {
        PollResponse { request_id, result }
    }

    fn top_left() -> AnchorPosition {
        ANCHOR_CHOICES[0].1
    }

    #[test]
    fn empty_state_lines() {
        let lines = DisplayLines::from_result(&Ok(None));
        assert_eq!(lines.track, "No track currently playing");
        assert_eq!(lines.progress, "");
    }

    #[test]
    fn playing_state_lines() {
        let lines = DisplayLines::from_result(&Ok(Some(snapshot())));
        assert_eq!(lines.track, "Song A");
        assert_eq!(lines.progress, "1:05 / 3:20");
    }

    #[test]
    fn error_replaces_track_line_and_clears_cover() {
        let (covers, calls) = slow_covers(Duration::ZERO);
        let mut overlay = overlay(top_left(), Some(covers));
        let image = Arc::new(ColorImage::new([1, 1], vec![Color32::RED]));
        overlay.finished_cover = Some((COVER_URL.into(), Some(image)));

        overlay.apply_response(response(1, Ok(Some(snapshot()))));
        assert_eq!(
            overlay.cover,
            CoverSlot::Image {
                url: COVER_URL.into()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let err = FetchError::Network("connection refused".into());
        overlay.apply_response(response(2, Err(err.clone())));
        assert_eq!(overlay.lines.track, err.to_string());
        assert_eq!(overlay.lines.progress, "");
        assert_eq!(overlay.cover, CoverSlot::Empty);
    }

    #[test]
    fn cover_slot_depends_on_url_and_settings() {
        let (covers, _) = slow_covers(Duration::ZERO);
        let mut overlay = overlay(top_left(), Some(covers));
        let no_url = PlaybackSnapshot {
            cover_url: None,
            ..snapshot()
        };
        overlay.apply_response(response(1, Ok(Some(no_url))));
        assert_eq!(overlay.cover, CoverSlot::Placeholder);

        let mut overlay = self::overlay(top_left(), None);
        overlay.apply_response(response(1, Ok(Some(snapshot()))));
        assert_eq!(overlay.cover, CoverSlot::Empty);

        overlay.apply_response(response(2, Ok(None)));
        assert_eq!(overlay.cover, CoverSlot::Empty);
        assert_eq!(overlay.lines.track, NO_TRACK_TEXT);
    }

    #[test]
    fn failed_cover_is_not_downloaded_again() {
        let (covers, calls) = slow_covers(Duration::ZERO);
        let mut overlay = overlay(top_left(), Some(covers));
        overlay.finished_cover = Some((COVER_URL.into(), None));

        overlay.apply_response(response(1, Ok(Some(snapshot()))));
        assert_eq!(overlay.cover, CoverSlot::Placeholder);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn slow_cover_does_not_hold_back_track_line() {
        let settings = OverlayConfig {
            poll_interval_ms: 100,
            request_timeout_ms: 500,
            ..OverlayConfig::default()
        };
        let (covers, calls) = slow_covers(Duration::from_millis(1500));
        let mut overlay = Overlay::new(
            top_left(),
            settings,
            workers(Some(playing_status()), Some(covers)),
        );

        let mut track_while_loading = None;
        let deadline = Instant::now() + Duration::from_secs(10);
        while !matches!(overlay.cover, CoverSlot::Image { .. }) {
            assert!(Instant::now() < deadline, "cover never arrived");
            let now = Instant::now();
            overlay.drain_responses();
            overlay.drain_covers();
            overlay.check_timeout(now);
            overlay.maybe_request(now);

            assert_ne!(overlay.lines.track, "Spotify request timed out");
            if matches!(overlay.cover, CoverSlot::Loading { .. }) && track_while_loading.is_none() {
                track_while_loading = Some(overlay.lines.clone());
            }
            thread::sleep(Duration::from_millis(10));
        }

        let lines = track_while_loading.expect("track shown before cover");
        assert_eq!(lines.track, "Song A");
        assert_eq!(lines.progress, "1:05 / 3:20");
        assert_eq!(
            overlay.cover,
            CoverSlot::Image {
                url: COVER_URL.into()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_responses_are_ignored() {
        let mut overlay = overlay(top_left(), None);
        overlay.inflight = Some((2, Instant::now()));

        overlay.accept_response(response(1, Ok(Some(snapshot()))));
        assert_eq!(overlay.lines, DisplayLines::default());
        assert_eq!(overlay.inflight.map(|(id, _)| id), Some(2));

        overlay.accept_response(response(2, Ok(Some(snapshot()))));
        assert_eq!(overlay.lines.track, "Song A");
        assert!(overlay.inflight.is_none());

        overlay.accept_response(response(3, Ok(None)));
        assert_eq!(overlay.lines.track, "Song A");
    }

    #[test]
    fn overdue_request_becomes_timeout_label() {
        let mut overlay = overlay(top_left(), None);
        overlay.cover = CoverSlot::Placeholder;
        overlay.inflight = Some((1, Instant::now()));

        overlay.check_timeout(Instant::now() + Duration::from_secs(10));
        assert!(overlay.inflight.is_none());
        assert_eq!(overlay.lines.track, "Spotify request timed out");
        assert_eq!(overlay.cover, CoverSlot::Empty);
    }

    #[test]
    fn lost_worker_has_its_own_label() {
        let mut overlay = overlay(top_left(), None);
        overlay.inflight = Some((1, Instant::now()));

        overlay.mark_worker_lost();
        assert_eq!(overlay.lines.track, "Overlay updates stopped");
        assert_ne!(overlay.lines.track, "No internet connection");
        assert!(overlay.inflight.is_none());

        overlay.maybe_request(Instant::now() + Duration::from_secs(5));
        assert!(overlay.inflight.is_none());
    }

    #[test]
    fn ticks_follow_poll_interval() {
        let mut overlay = overlay(top_left(), None);
        let start = Instant::now();
        overlay.maybe_request(start);
        assert_eq!(overlay.inflight.map(|(id, _)| id), Some(1));

        overlay.inflight = None;
        overlay.maybe_request(start + Duration::from_millis(200));
        assert!(overlay.inflight.is_none());

        overlay.maybe_request(start + Duration::from_millis(500));
        assert_eq!(overlay.inflight.map(|(id, _)| id), Some(2));
    }

    #[test]
    fn measured_text_drives_size_and_anchor() {
        let ctx = egui::Context::default();
        let top_right = ANCHOR_CHOICES[1].1;
        let mut overlay = overlay(top_right, None);
        let screen = Some(Extent::new(1920, 1080));

        let mut placements = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            overlay.lines = DisplayLines::from_result(&Ok(Some(snapshot())));
            let (track, progress) = overlay.measure(ctx);
            let expected = required_size(track.size().x, progress.size().x, false);
            let placement = overlay.fit_window(&track, &progress, screen).unwrap();
            assert_eq!(placement.size, expected);
            placements.push(placement);

            overlay.lines.track = "Song A (Extended Club Mix, Remastered 2024)".into();
            let (track, progress) = overlay.measure(ctx);
            placements.push(overlay.fit_window(&track, &progress, screen).unwrap());
            assert!(overlay.fit_window(&track, &progress, screen).is_none());
        });

        let [first, second] = placements[..] else {
            panic!("expected two placements");
        };
        assert!(second.size.width > first.size.width);
        assert_eq!(second.size.height, OVERLAY_HEIGHT);
        assert_eq!(
            first.position,
            Some(Point {
                x: 1920 - first.size.width,
                y: 0
            })
        );
        assert_eq!(
            second.position,
            Some(Point {
                x: 1920 - second.size.width,
                y: 0
            })
        );
    }

    #[test]
    fn window_is_resized_before_monitor_size_is_known() {
        let ctx = egui::Context::default();
        let mut overlay = overlay(ANCHOR_CHOICES[5].1, None);
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            overlay.lines = DisplayLines::from_result(&Ok(Some(snapshot())));
            let (track, progress) = overlay.measure(ctx);
            let expected = required_size(track.size().x, progress.size().x, false);

            let resized = overlay.fit_window(&track, &progress, None).unwrap();
            assert_eq!(resized.size, expected);
            assert_eq!(resized.position, None);
            assert!(overlay.fit_window(&track, &progress, None).is_none());

            let placed = overlay
                .fit_window(&track, &progress, Some(Extent::new(1920, 1080)))
                .unwrap();
            assert_eq!(
                placed.position,
                Some(Point {
                    x: 1920 - expected.width,
                    y: 1080 - OVERLAY_HEIGHT
                })
            );
        });
    }

    fn counting_app(started: Rc<Cell<u32>>) -> OverlayApp {
        OverlayApp::new(
            OverlayConfig::default(),
            Box::new(move || {
                started.set(started.get() + 1);
                workers(None, None)
            }),
        )
    }

    #[test]
    fn picker_idles_until_an_anchor_is_chosen() {
        let started = Rc::new(Cell::new(0));
        let app = counting_app(Rc::clone(&started));
        let visuals = egui::Visuals::dark();

        assert!(matches!(app.stage, Stage::Selecting));
        assert_eq!(eframe::App::clear_color(&app, &visuals)[3], 1.0);

        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            assert!(app.render_picker(ctx).is_none());
        });
        assert!(matches!(app.stage, Stage::Selecting));
        assert_eq!(started.get(), 0);
    }

    #[test]
    fn choosing_anchor_starts_overlay_once() {
        let started = Rc::new(Cell::new(0));
        let mut app = counting_app(Rc::clone(&started));
        let top_right = ANCHOR_CHOICES[1].1;
        let ctx = egui::Context::default();

        let output = ctx.run(egui::RawInput::default(), |ctx| {
            app.begin_display(ctx, top_right);
        });
        assert_eq!(started.get(), 1);
        assert!(app.start_workers.is_none());
        assert!(matches!(&app.stage, Stage::Displaying(overlay) if overlay.anchor == top_right));
        assert_eq!(
            eframe::App::clear_color(&app, &egui::Visuals::dark()),
            [0.0; 4]
        );

        let commands = &output.viewport_output[&egui::ViewportId::ROOT].commands;
        assert!(commands
            .iter()
            .any(|c| matches!(c, ViewportCommand::Decorations(false))));
        assert!(commands
            .iter()
            .any(|c| matches!(c, ViewportCommand::MousePassthrough(true))));
        assert!(commands.iter().any(|c| matches!(
            c,
            ViewportCommand::WindowLevel(WindowLevel::AlwaysOnTop)
        )));

        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            app.begin_display(ctx, ANCHOR_CHOICES[4].1);
        });
        assert_eq!(started.get(), 1);
        assert!(matches!(&app.stage, Stage::Displaying(overlay) if overlay.anchor == top_right));
    }
}
