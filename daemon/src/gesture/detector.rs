//! Gesture detection state machine
//!
//! Classifies modifier key transitions and key-down activity into two
//! gestures: a solo press-and-release of the configured switch key, and a
//! double-tap of Fn.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hotkey::{KeyTransition, LogicalKey, ModifierKeyEvent, SwitchKey};

/// Maximum gap between two Fn presses that still counts as a double-tap
pub const FN_DOUBLE_STRIKE_INTERVAL: Duration = Duration::from_millis(350);

/// Semantic gestures recognised from raw key events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    /// Switch key pressed and released on its own
    SwitchInputSource,
    /// Fn pressed twice in quick succession
    ShowHud,
}

impl std::fmt::Display for Gesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gesture::SwitchInputSource => write!(f, "SWITCH_INPUT_SOURCE"),
            Gesture::ShowHud => write!(f, "SHOW_HUD"),
        }
    }
}

/// The gesture detector
#[derive(Debug)]
pub struct GestureDetector {
    /// Key that starts a solo-press gesture
    switch_key: SwitchKey,
    /// Key captured at Down, matched against the next Up
    tracking: Option<LogicalKey>,
    /// Set by any key-down while tracking
    intervening_key_pressed: bool,
    /// Time of the last unpaired Fn press
    last_fn_down: Option<Instant>,
}

impl GestureDetector {
    pub fn new(switch_key: SwitchKey) -> Self {
        Self {
            switch_key,
            tracking: None,
            intervening_key_pressed: false,
            last_fn_down: None,
        }
    }

    pub fn switch_key(&self) -> SwitchKey {
        self.switch_key
    }

    /// Change the switch key. A press already in flight still completes
    /// against the key captured when it went down.
    pub fn set_switch_key(&mut self, key: SwitchKey) {
        if key != self.switch_key {
            debug!(from = %self.switch_key, to = %key, "switch key changed");
            self.switch_key = key;
        }
    }

    /// Key currently being tracked for a solo press, if any
    pub fn tracking(&self) -> Option<LogicalKey> {
        self.tracking
    }

    /// Record a key-down from the regular key stream (any key, including
    /// auto-repeat)
    pub fn note_key_down(&mut self) {
        self.intervening_key_pressed = true;
    }

    /// Feed one modifier transition, returning the gesture it completes
    pub fn handle_modifier_event(&mut self, event: &ModifierKeyEvent) -> Option<Gesture> {
        let gesture = match event.key {
            LogicalKey::Fn => self.handle_fn(event),
            key => self.handle_solo_press(key, event),
        };

        if let Some(gesture) = gesture {
            debug!(%gesture, key = ?event.key, "gesture detected");
        }
        gesture
    }

    fn handle_fn(&mut self, event: &ModifierKeyEvent) -> Option<Gesture> {
        // Only the down edge matters
        if event.transition != KeyTransition::Down {
            return None;
        }

        if let Some(last) = self.last_fn_down {
            if event.timestamp.saturating_duration_since(last) <= FN_DOUBLE_STRIKE_INTERVAL {
                self.last_fn_down = None;
                return Some(Gesture::ShowHud);
            }
        }

        self.last_fn_down = Some(event.timestamp);
        None
    }

    fn handle_solo_press(&mut self, key: LogicalKey, event: &ModifierKeyEvent) -> Option<Gesture> {
        match event.transition {
            KeyTransition::Down => {
                if key == self.switch_key.logical_key() {
                    self.tracking = Some(key);
                    self.intervening_key_pressed = false;
                }
                None
            }
            KeyTransition::Up => {
                if self.tracking != Some(key) {
                    return None;
                }

                let solo = !self.intervening_key_pressed && event.modifiers.is_clear();
                self.tracking = None;
                self.intervening_key_pressed = false;

                solo.then_some(Gesture::SwitchInputSource)
            }
        }
    }
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new(SwitchKey::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::ModifierSet;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    fn event(key: LogicalKey, transition: KeyTransition, timestamp: Instant) -> ModifierKeyEvent {
        let mut modifiers = ModifierSet::default();
        if transition == KeyTransition::Down {
            match key {
                LogicalKey::RightCommand | LogicalKey::LeftCommand => modifiers.command = true,
                LogicalKey::RightOption | LogicalKey::LeftOption => modifiers.option = true,
                LogicalKey::Fn => modifiers.function = true,
                LogicalKey::Other(_) => {}
            }
        }
        ModifierKeyEvent {
            key,
            transition,
            modifiers,
            timestamp,
        }
    }

    fn down(key: LogicalKey, timestamp: Instant) -> ModifierKeyEvent {
        event(key, KeyTransition::Down, timestamp)
    }

    fn up(key: LogicalKey, timestamp: Instant) -> ModifierKeyEvent {
        event(key, KeyTransition::Up, timestamp)
    }

    #[test]
    fn test_solo_press_switches() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        assert_eq!(detector.handle_modifier_event(&down(LogicalKey::RightCommand, t0)), None);
        assert_eq!(detector.tracking(), Some(LogicalKey::RightCommand));
        assert_eq!(
            detector.handle_modifier_event(&up(LogicalKey::RightCommand, at(t0, 100))),
            Some(Gesture::SwitchInputSource)
        );
        assert_eq!(detector.tracking(), None);
    }

    #[test]
    fn test_repeated_solo_presses_each_switch() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        let mut switches = 0;
        for i in 0..5 {
            let base = at(t0, i * 300);
            detector.handle_modifier_event(&down(LogicalKey::RightCommand, base));
            if detector.handle_modifier_event(&up(LogicalKey::RightCommand, at(base, 80)))
                == Some(Gesture::SwitchInputSource)
            {
                switches += 1;
            }
        }
        assert_eq!(switches, 5);
    }

    #[test]
    fn test_intervening_key_cancels() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        detector.handle_modifier_event(&down(LogicalKey::RightCommand, t0));
        detector.note_key_down();
        assert_eq!(detector.handle_modifier_event(&up(LogicalKey::RightCommand, at(t0, 100))), None);

        // State is reset: the next clean press works again
        detector.handle_modifier_event(&down(LogicalKey::RightCommand, at(t0, 200)));
        assert_eq!(
            detector.handle_modifier_event(&up(LogicalKey::RightCommand, at(t0, 300))),
            Some(Gesture::SwitchInputSource)
        );
    }

    #[test]
    fn test_key_down_before_press_is_forgotten() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        detector.note_key_down();
        detector.handle_modifier_event(&down(LogicalKey::RightCommand, t0));
        assert_eq!(
            detector.handle_modifier_event(&up(LogicalKey::RightCommand, at(t0, 100))),
            Some(Gesture::SwitchInputSource)
        );
    }

    #[test]
    fn test_held_modifier_at_release_cancels() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        detector.handle_modifier_event(&down(LogicalKey::RightCommand, t0));
        let mut release = up(LogicalKey::RightCommand, at(t0, 100));
        release.modifiers.shift = true;
        assert_eq!(detector.handle_modifier_event(&release), None);
        assert_eq!(detector.tracking(), None);
    }

    #[test]
    fn test_left_command_still_held_cancels() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        detector.handle_modifier_event(&down(LogicalKey::RightCommand, t0));
        let mut release = up(LogicalKey::RightCommand, at(t0, 100));
        release.modifiers.command = true;
        assert_eq!(detector.handle_modifier_event(&release), None);
    }

    #[test]
    fn test_overlapping_command_keys_from_raw_flags() {
        use crate::hotkey::{flags, KeyMap};

        let map = KeyMap::default();
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();
        let mut feed = |code: u16, bits: u64, ms: u64| {
            let event = ModifierKeyEvent::from_raw(&map, code, bits, at(t0, ms)).unwrap();
            detector.handle_modifier_event(&event)
        };

        let right = flags::COMMAND | flags::DEVICE_RIGHT_COMMAND;
        let both = right | flags::DEVICE_LEFT_COMMAND;
        let left = flags::COMMAND | flags::DEVICE_LEFT_COMMAND;

        assert_eq!(feed(54, right, 0), None);
        assert_eq!(feed(55, both, 50), None);
        // Right released with left still down
        assert_eq!(feed(54, left, 100), None);
        assert_eq!(feed(55, 0, 150), None);
        drop(feed);

        assert_eq!(detector.tracking(), None);
    }

    #[test]
    fn test_left_variant_is_not_the_target() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        detector.handle_modifier_event(&down(LogicalKey::LeftCommand, t0));
        assert_eq!(detector.tracking(), None);
        assert_eq!(detector.handle_modifier_event(&up(LogicalKey::LeftCommand, at(t0, 100))), None);
    }

    #[test]
    fn test_up_of_other_key_is_ignored() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        detector.handle_modifier_event(&down(LogicalKey::RightCommand, t0));
        assert_eq!(detector.handle_modifier_event(&up(LogicalKey::LeftOption, at(t0, 50))), None);
        assert_eq!(detector.tracking(), Some(LogicalKey::RightCommand));
        assert_eq!(
            detector.handle_modifier_event(&up(LogicalKey::RightCommand, at(t0, 100))),
            Some(Gesture::SwitchInputSource)
        );
    }

    #[test]
    fn test_secondary_switch_key() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::new(SwitchKey::RightOption);

        detector.handle_modifier_event(&down(LogicalKey::RightCommand, t0));
        assert_eq!(detector.handle_modifier_event(&up(LogicalKey::RightCommand, at(t0, 50))), None);

        detector.handle_modifier_event(&down(LogicalKey::RightOption, at(t0, 100)));
        assert_eq!(
            detector.handle_modifier_event(&up(LogicalKey::RightOption, at(t0, 150))),
            Some(Gesture::SwitchInputSource)
        );
    }

    #[test]
    fn test_reconfigure_mid_press_keeps_captured_key() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::new(SwitchKey::RightCommand);

        detector.handle_modifier_event(&down(LogicalKey::RightCommand, t0));
        detector.set_switch_key(SwitchKey::RightOption);
        assert_eq!(
            detector.handle_modifier_event(&up(LogicalKey::RightCommand, at(t0, 100))),
            Some(Gesture::SwitchInputSource)
        );

        // New configuration applies to the next press
        detector.handle_modifier_event(&down(LogicalKey::RightCommand, at(t0, 200)));
        assert_eq!(detector.tracking(), None);
    }

    #[test]
    fn test_fn_double_tap() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        assert_eq!(detector.handle_modifier_event(&down(LogicalKey::Fn, t0)), None);
        assert_eq!(
            detector.handle_modifier_event(&down(LogicalKey::Fn, at(t0, 200))),
            Some(Gesture::ShowHud)
        );
        // Third tap pairs with nothing
        assert_eq!(detector.handle_modifier_event(&down(LogicalKey::Fn, at(t0, 400))), None);
        // ...but pairs with a fourth one
        assert_eq!(
            detector.handle_modifier_event(&down(LogicalKey::Fn, at(t0, 600))),
            Some(Gesture::ShowHud)
        );
    }

    #[test]
    fn test_fn_up_edges_are_ignored() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        assert_eq!(detector.handle_modifier_event(&down(LogicalKey::Fn, t0)), None);
        assert_eq!(detector.handle_modifier_event(&up(LogicalKey::Fn, at(t0, 50))), None);
        assert_eq!(
            detector.handle_modifier_event(&down(LogicalKey::Fn, at(t0, 120))),
            Some(Gesture::ShowHud)
        );
    }

    #[test]
    fn test_fn_interval_boundary() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        detector.handle_modifier_event(&down(LogicalKey::Fn, t0));
        assert_eq!(
            detector.handle_modifier_event(&down(LogicalKey::Fn, at(t0, 350))),
            Some(Gesture::ShowHud)
        );

        detector.handle_modifier_event(&down(LogicalKey::Fn, at(t0, 1000)));
        // Too slow: this press becomes the new first tap
        assert_eq!(detector.handle_modifier_event(&down(LogicalKey::Fn, at(t0, 1351))), None);
        assert_eq!(
            detector.handle_modifier_event(&down(LogicalKey::Fn, at(t0, 1500))),
            Some(Gesture::ShowHud)
        );
    }

    #[test]
    fn test_fn_does_not_disturb_solo_tracking() {
        let t0 = Instant::now();
        let mut detector = GestureDetector::default();

        detector.handle_modifier_event(&down(LogicalKey::RightCommand, t0));
        detector.handle_modifier_event(&down(LogicalKey::Fn, at(t0, 10)));
        assert_eq!(detector.tracking(), Some(LogicalKey::RightCommand));
    }
}
