//! Screen-space geometry and HUD layout
//!
//! Coordinates follow the macOS screen convention: origin at the bottom-left
//! of the primary display, `y` growing upward.

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

use super::{FONT_SIZE, HORIZONTAL_MARGIN, ICON_SIZE, ICON_SPACING, MIN_PANEL_WIDTH};

/// Average advance of one text column at the HUD font size
const COLUMN_ADVANCE: f64 = FONT_SIZE * 0.55;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn mid_x(&self) -> f64 {
        self.origin.x + self.size.width / 2.0
    }

    pub fn mid_y(&self) -> f64 {
        self.origin.y + self.size.height / 2.0
    }

    /// Half-open containment: the top and right edges are outside.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.origin.x
            && point.x < self.origin.x + self.size.width
            && point.y >= self.origin.y
            && point.y < self.origin.y + self.size.height
    }
}

/// A physical display the HUD can appear on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub frame: Rect,
    /// Frame minus menu bar and dock
    pub visible_frame: Rect,
    /// Holds the current keyboard focus
    pub has_focus: bool,
}

/// Pick the screen to show the HUD on: the focused screen, then the one
/// under the pointer, then the first one listed.
pub fn choose_screen(screens: &[Screen], pointer: Option<Point>) -> Option<&Screen> {
    screens
        .iter()
        .find(|s| s.has_focus)
        .or_else(|| pointer.and_then(|p| screens.iter().find(|s| s.frame.contains(p))))
        .or_else(|| screens.first())
}

/// Estimated rendered width of `text` at the HUD font size
pub fn text_width(text: &str) -> f64 {
    text.width() as f64 * COLUMN_ADVANCE
}

/// Panel width for a source name, with or without an icon
pub fn panel_width(name: &str, has_icon: bool) -> f64 {
    let icon = if has_icon { ICON_SIZE + ICON_SPACING } else { 0.0 };
    let width = text_width(name) + icon + HORIZONTAL_MARGIN * 2.0 + 20.0;
    width.max(MIN_PANEL_WIDTH)
}

/// Origin that centers a panel of `size` on the screen's visible frame
pub fn centered_origin(screen: &Screen, size: Size) -> Point {
    let visible = screen.visible_frame;
    Point::new(
        visible.mid_x() - size.width / 2.0,
        visible.mid_y() - size.height / 2.0,
    )
}
