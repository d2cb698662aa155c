//! Global keyboard event listening
//!
//! Uses macOS CGEventTap to observe modifier key transitions and key-down
//! activity, and maps raw key codes to logical keys.

mod keys;
mod listener;

pub use keys::{KeyMap, KeyTransition, LogicalKey, ModifierKeyEvent, SwitchKey};
#[cfg(test)]
pub use keys::{flags, ModifierSet};
pub use listener::{HotkeyEvent, HotkeyListener, TapStatus};
