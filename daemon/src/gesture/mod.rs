//! Gesture recognition
//!
//! Turns raw modifier transitions into two gestures:
//! - SwitchInputSource: the switch key pressed and released on its own
//! - ShowHud: Fn double-tapped within a short interval

mod detector;

pub use detector::{Gesture, GestureDetector};
