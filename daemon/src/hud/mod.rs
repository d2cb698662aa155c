//! HUD display lifecycle
//!
//! One shared panel announces the active input source. The controller owns
//! its timing and visibility; drawing happens in whichever renderer
//! subscribes to the surface commands.

mod controller;
mod geometry;
mod platform;
mod runtime;
mod screens;
#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

pub use controller::{HudController, HudPhase};
pub use platform::{Appearance, HudPlatform, HudRequest, HudTick, IconRef, Preferences};
pub use runtime::{SurfaceCommand, TokioHudPlatform};
pub use screens::SystemScreens;

pub const FADE_IN_DURATION: Duration = Duration::from_millis(250);
pub const FADE_OUT_DURATION: Duration = Duration::from_millis(500);
pub const DEFAULT_DISPLAY_DURATION: Duration = Duration::from_secs(2);
pub const MIN_DISPLAY_DURATION: Duration = Duration::from_millis(300);
pub const MAX_DISPLAY_DURATION: Duration = Duration::from_secs(5);

/// Distance the panel rises while fading out
pub const SLIDE_UP_DISTANCE: f64 = 30.0;

pub const PANEL_HEIGHT: f64 = 90.0;
pub const MIN_PANEL_WIDTH: f64 = 200.0;
pub const HORIZONTAL_MARGIN: f64 = 30.0;
pub const FONT_SIZE: f64 = 24.0;
pub const ICON_SIZE: f64 = 48.0;
pub const ICON_SPACING: f64 = 12.0;

pub const DEFAULT_BACKGROUND: f64 = 0.05;
pub const DEFAULT_ALPHA: f64 = 0.75;
