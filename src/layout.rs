/// Placement along one screen axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisAnchor {
    Start,
    Center,
    End,
}

impl AxisAnchor {
    /// Normalized coordinate: 0, 0.5 or 1.
    pub fn fraction(self) -> f32 {
        match self {
            AxisAnchor::Start => 0.0,
            AxisAnchor::Center => 0.5,
            AxisAnchor::End => 1.0,
        }
    }

    pub fn offset(self, screen_extent: i32, window_extent: i32) -> i32 {
        match self {
            AxisAnchor::Start => 0,
            AxisAnchor::End => screen_extent - window_extent,
            AxisAnchor::Center => (screen_extent - window_extent).div_euclid(2),
        }
    }
}

/// Screen point the overlay is pinned to. Chosen once in the picker, never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorPosition {
    pub x: AxisAnchor,
    pub y: AxisAnchor,
}

impl AnchorPosition {
    pub const fn new(x: AxisAnchor, y: AxisAnchor) -> Self {
        Self { x, y }
    }

    pub fn place(self, screen: Extent, window: Extent) -> Point {
        Point {
            x: self.x.offset(screen.width, window.width),
            y: self.y.offset(screen.height, window.height),
        }
    }
}

/// The seven choices offered by the picker, in display order.
pub const ANCHOR_CHOICES: [(&str, AnchorPosition); 7] = [
    ("Top Left", AnchorPosition::new(AxisAnchor::Start, AxisAnchor::Start)),
    ("Top Right", AnchorPosition::new(AxisAnchor::End, AxisAnchor::Start)),
    ("Top Center", AnchorPosition::new(AxisAnchor::Center, AxisAnchor::Start)),
    ("Center", AnchorPosition::new(AxisAnchor::Center, AxisAnchor::Center)),
    ("Bottom Left", AnchorPosition::new(AxisAnchor::Start, AxisAnchor::End)),
    ("Bottom Right", AnchorPosition::new(AxisAnchor::End, AxisAnchor::End)),
    ("Bottom Center", AnchorPosition::new(AxisAnchor::Center, AxisAnchor::End)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub width: i32,
    pub height: i32,
}

impl Extent {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

pub const OVERLAY_HEIGHT: i32 = 100;
pub const TEXT_PADDING: i32 = 20;
/// Width reserved for the cover image plus the gap to the text column.
pub const COVER_SLOT_WIDTH: i32 = 80;

/// Tight-fitting overlay size for the measured text widths.
pub fn required_size(track_width: f32, progress_width: f32, cover_slot: bool) -> Extent {
    let text_width = track_width.max(progress_width).max(0.0).ceil() as i32;
    let mut width = text_width + TEXT_PADDING;
    if cover_slot {
        width += COVER_SLOT_WIDTH;
    }
    Extent::new(width, OVERLAY_HEIGHT)
}

/// What the window should be told after a reconcile. `position` is `None`
/// while the monitor size is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub size: Extent,
    pub position: Option<Point>,
}

/// Last size and position pushed to the window. Derived every tick, never persisted.
#[derive(Debug, Clone, Default)]
pub struct WindowGeometry {
    size: Option<Extent>,
    screen: Option<Extent>,
    /// Size the current position was computed for.
    placed_size: Option<Extent>,
}

impl WindowGeometry {
    /// Returns a new placement when the size or screen changed. The size is
    /// applied right away; the position is re-derived once a screen is known,
    /// and again after every resize since non-top-left anchors depend on it.
    pub fn reconcile(
        &mut self,
        required: Extent,
        anchor: AnchorPosition,
        screen: Option<Extent>,
    ) -> Option<Placement> {
        let resize = self.size != Some(required);
        let reposition = screen.filter(|screen| {
            self.screen != Some(*screen) || self.placed_size != Some(required)
        });
        if !resize && reposition.is_none() {
            return None;
        }

        self.size = Some(required);
        let position = reposition.map(|screen| {
            self.screen = Some(screen);
            self.placed_size = Some(required);
            anchor.place(screen, required)
        });

        Some(Placement {
            size: required,
            position,
        })
    }
}

#[cfg(test)]
impl WindowGeometry {
    pub fn size(&self) -> Option<Extent> {
        self.size
    }
}
