//! Capabilities the HUD controller drives
//!
//! The controller owns timing and visibility only. Drawing, display
//! enumeration, timers and preference lookups are supplied through these
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::geometry::{Point, Rect, Screen};
use super::{DEFAULT_ALPHA, DEFAULT_BACKGROUND, FADE_IN_DURATION, FADE_OUT_DURATION};

/// Handle for a scheduled one-shot timer
pub type TimerId = u64;

/// Opaque reference to an input source icon (a file URL on macOS)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IconRef(pub String);

/// One request to show the HUD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HudRequest {
    pub display_name: String,
    pub icon: Option<IconRef>,
}

impl HudRequest {
    pub fn new(display_name: impl Into<String>, icon: Option<IconRef>) -> Self {
        Self {
            display_name: display_name.into(),
            icon,
        }
    }
}

/// Background colour and opacity of the panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            red: DEFAULT_BACKGROUND,
            green: DEFAULT_BACKGROUND,
            blue: DEFAULT_BACKGROUND,
            alpha: DEFAULT_ALPHA,
        }
    }
}

/// Everything a renderer needs to draw the panel body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HudContent {
    pub name: String,
    pub icon: Option<IconRef>,
    pub appearance: Appearance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    EaseIn,
    EaseOut,
}

/// A time-bounded opacity (and optionally position) animation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub opacity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Point>,
    pub duration_ms: u64,
    pub easing: Easing,
}

impl Transition {
    pub fn fade_in() -> Self {
        Self {
            opacity: 1.0,
            origin: None,
            duration_ms: FADE_IN_DURATION.as_millis() as u64,
            easing: Easing::EaseIn,
        }
    }

    /// Fade to transparent while sliding to `origin`
    pub fn fade_out(origin: Point) -> Self {
        Self {
            opacity: 0.0,
            origin: Some(origin),
            duration_ms: FADE_OUT_DURATION.as_millis() as u64,
            easing: Easing::EaseOut,
        }
    }
}

/// Completion delivered back to the controller. Each carries the generation
/// that was current when it was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HudTick {
    FadeInDone { generation: u64 },
    HoldElapsed { generation: u64 },
    FadeOutDone { generation: u64 },
}

impl HudTick {
    pub fn generation(&self) -> u64 {
        match self {
            HudTick::FadeInDone { generation }
            | HudTick::HoldElapsed { generation }
            | HudTick::FadeOutDone { generation } => *generation,
        }
    }
}

/// The borderless, click-through, always-on-top panel
pub trait Surface {
    fn set_content(&mut self, content: &HudContent);
    fn set_frame(&mut self, frame: Rect);
    /// Stop any running animation immediately, leaving no partial state
    fn stop_transitions(&mut self);
    fn set_opacity(&mut self, opacity: f64);
    fn order_front(&mut self);
    fn order_out(&mut self);
    fn animate(&mut self, transition: &Transition);
}

/// Window-server and timer services
pub trait HudPlatform {
    type Surface: Surface;

    fn create_surface(&mut self) -> Self::Surface;
    fn screens(&self) -> Vec<Screen>;
    fn pointer_location(&self) -> Option<Point>;
    /// Deliver `tick` back to the controller after `delay`
    fn schedule(&mut self, delay: Duration, tick: HudTick) -> TimerId;
    /// Cancel a timer. Unknown or already fired timers are ignored.
    fn cancel(&mut self, timer: TimerId);
}

/// User preferences read by the controller
pub trait Preferences {
    fn appearance(&self, source: &str) -> Appearance;
    /// Raw configured hold duration in seconds; may be out of range
    fn hold_duration_secs(&self) -> f64;
}
