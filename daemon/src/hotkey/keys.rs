//! Key identity and modifier flag decoding
//!
//! Raw platform key codes are mapped to logical keys through a [`KeyMap`]
//! table, so left/right variants of the same modifier never compare equal.
//! Modifier flags are decoded from the raw event flag word into a
//! [`ModifierSet`].

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Modifier flag masks as reported in the macOS event flag word
pub mod flags {
    /// Shift key modifier flag
    pub const SHIFT: u64 = 0x0002_0000;
    /// Control key modifier flag
    pub const CONTROL: u64 = 0x0004_0000;
    /// Option/Alt key modifier flag
    pub const OPTION: u64 = 0x0008_0000;
    /// Command key modifier flag
    pub const COMMAND: u64 = 0x0010_0000;
    /// Fn key modifier flag
    pub const SECONDARY_FN: u64 = 0x0080_0000;

    /// Device-dependent bits telling the left and right keys apart
    pub const DEVICE_LEFT_COMMAND: u64 = 0x0000_0008;
    pub const DEVICE_RIGHT_COMMAND: u64 = 0x0000_0010;
    pub const DEVICE_LEFT_OPTION: u64 = 0x0000_0020;
    pub const DEVICE_RIGHT_OPTION: u64 = 0x0000_0040;
}

/// A key as the gesture detector understands it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalKey {
    RightCommand,
    LeftCommand,
    RightOption,
    LeftOption,
    Fn,
    /// Any code not present in the key map
    Other(u16),
}

impl LogicalKey {
    /// Derive the press direction of this key from the flag word carried by
    /// its flags-changed event. Returns `None` for keys that are not tracked
    /// modifiers.
    ///
    /// Left and right variants share one family flag, so the per-side device
    /// bit decides. A flag word with no side bits for the family falls back
    /// to the family flag alone.
    pub fn transition(&self, bits: u64) -> Option<KeyTransition> {
        let (family, side, both_sides) = match self {
            LogicalKey::RightCommand => (
                flags::COMMAND,
                flags::DEVICE_RIGHT_COMMAND,
                flags::DEVICE_LEFT_COMMAND | flags::DEVICE_RIGHT_COMMAND,
            ),
            LogicalKey::LeftCommand => (
                flags::COMMAND,
                flags::DEVICE_LEFT_COMMAND,
                flags::DEVICE_LEFT_COMMAND | flags::DEVICE_RIGHT_COMMAND,
            ),
            LogicalKey::RightOption => (
                flags::OPTION,
                flags::DEVICE_RIGHT_OPTION,
                flags::DEVICE_LEFT_OPTION | flags::DEVICE_RIGHT_OPTION,
            ),
            LogicalKey::LeftOption => (
                flags::OPTION,
                flags::DEVICE_LEFT_OPTION,
                flags::DEVICE_LEFT_OPTION | flags::DEVICE_RIGHT_OPTION,
            ),
            LogicalKey::Fn => (flags::SECONDARY_FN, 0, 0),
            LogicalKey::Other(_) => return None,
        };

        let held = if bits & family == 0 {
            false
        } else if bits & both_sides == 0 {
            true
        } else {
            bits & side != 0
        };

        Some(if held {
            KeyTransition::Down
        } else {
            KeyTransition::Up
        })
    }
}

/// Table from raw key code to logical key identity.
///
/// Defaults are the macOS virtual key codes; the table can be overridden in
/// the settings file for other keyboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyMap {
    pub right_command: u16,
    pub left_command: u16,
    pub right_option: u16,
    pub left_option: u16,
    #[serde(rename = "fn")]
    pub function: u16,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            right_command: 54,
            left_command: 55,
            right_option: 61,
            left_option: 58,
            function: 63,
        }
    }
}

impl KeyMap {
    /// Resolve a raw key code. First matching entry wins.
    pub fn resolve(&self, code: u16) -> LogicalKey {
        if code == self.right_command {
            LogicalKey::RightCommand
        } else if code == self.left_command {
            LogicalKey::LeftCommand
        } else if code == self.right_option {
            LogicalKey::RightOption
        } else if code == self.left_option {
            LogicalKey::LeftOption
        } else if code == self.function {
            LogicalKey::Fn
        } else {
            LogicalKey::Other(code)
        }
    }
}

/// Which modifier key switches the input source on a solo press
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchKey {
    #[default]
    RightCommand,
    RightOption,
}

impl SwitchKey {
    pub fn logical_key(self) -> LogicalKey {
        match self {
            SwitchKey::RightCommand => LogicalKey::RightCommand,
            SwitchKey::RightOption => LogicalKey::RightOption,
        }
    }
}

impl std::fmt::Display for SwitchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwitchKey::RightCommand => write!(f, "Right Command"),
            SwitchKey::RightOption => write!(f, "Right Option"),
        }
    }
}

/// Press direction of a modifier key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Down,
    Up,
}

/// Tracks which modifier keys are held on a given event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierSet {
    pub shift: bool,
    pub control: bool,
    pub option: bool,
    pub command: bool,
    pub function: bool,
}

impl ModifierSet {
    /// Decode a raw event flag word
    pub fn from_bits(bits: u64) -> Self {
        Self {
            shift: bits & flags::SHIFT != 0,
            control: bits & flags::CONTROL != 0,
            option: bits & flags::OPTION != 0,
            command: bits & flags::COMMAND != 0,
            function: bits & flags::SECONDARY_FN != 0,
        }
    }

    /// True when none of shift, control, option or command is held.
    /// Fn does not count.
    pub fn is_clear(&self) -> bool {
        !self.shift && !self.control && !self.option && !self.command
    }
}

/// A single modifier key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierKeyEvent {
    pub key: LogicalKey,
    pub transition: KeyTransition,
    /// Modifiers held at the moment of the event
    pub modifiers: ModifierSet,
    pub timestamp: Instant,
}

impl ModifierKeyEvent {
    /// Build an event from a raw flags-changed report. Returns `None` when the
    /// code does not belong to a tracked modifier.
    pub fn from_raw(key_map: &KeyMap, code: u16, bits: u64, timestamp: Instant) -> Option<Self> {
        let key = key_map.resolve(code);
        let transition = key.transition(bits)?;
        let modifiers = ModifierSet::from_bits(bits);
        Some(Self {
            key,
            transition,
            modifiers,
            timestamp,
        })
    }
}
