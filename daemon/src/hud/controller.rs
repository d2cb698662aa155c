//! HUD lifecycle controller
//!
//! Drives one long-lived surface through
//! `Hidden -> FadingIn -> Visible -> FadingOut -> Hidden`.
//!
//! Every `display()` starts a new generation. Timer and animation
//! completions carry the generation they were scheduled under, and anything
//! stamped with an older generation is dropped. This keeps a superseded
//! fade-out from hiding a freshly shown HUD, and keeps a superseded fade-in
//! from scheduling a second hold timer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::geometry::{centered_origin, choose_screen, panel_width, Point, Rect, Size};
use super::platform::{
    HudContent, HudPlatform, HudRequest, HudTick, Preferences, Surface, TimerId, Transition,
};
use super::{
    DEFAULT_DISPLAY_DURATION, FADE_IN_DURATION, FADE_OUT_DURATION, MAX_DISPLAY_DURATION,
    MIN_DISPLAY_DURATION, PANEL_HEIGHT, SLIDE_UP_DISTANCE,
};

/// Visibility phase of the HUD
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HudPhase {
    #[default]
    Hidden,
    FadingIn,
    Visible,
    FadingOut,
}

impl std::fmt::Display for HudPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HudPhase::Hidden => write!(f, "Hidden"),
            HudPhase::FadingIn => write!(f, "FadingIn"),
            HudPhase::Visible => write!(f, "Visible"),
            HudPhase::FadingOut => write!(f, "FadingOut"),
        }
    }
}

/// Mutable state of the shared surface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HudSession {
    pub generation: u64,
    pub pending_fade_out: Option<TimerId>,
    /// Resting origin; fade-out slides away from it and hide returns to it
    pub base_position: Point,
    pub frame: Rect,
    pub opacity: f64,
    pub phase: HudPhase,
}

/// Resolve the configured hold duration, falling back to the default for
/// non-positive, non-finite or out-of-range values.
pub fn resolve_hold_duration(secs: f64) -> Duration {
    let range = MIN_DISPLAY_DURATION.as_secs_f64()..=MAX_DISPLAY_DURATION.as_secs_f64();
    if secs.is_finite() && range.contains(&secs) {
        Duration::from_secs_f64(secs)
    } else {
        DEFAULT_DISPLAY_DURATION
    }
}

/// The HUD lifecycle controller
pub struct HudController<P: HudPlatform, R: Preferences> {
    platform: P,
    preferences: R,
    /// Created on first display and reused afterwards
    surface: Option<P::Surface>,
    session: HudSession,
}

impl<P: HudPlatform, R: Preferences> HudController<P, R> {
    pub fn new(platform: P, preferences: R) -> Self {
        Self {
            platform,
            preferences,
            surface: None,
            session: HudSession::default(),
        }
    }

    pub fn session(&self) -> &HudSession {
        &self.session
    }

    pub fn phase(&self) -> HudPhase {
        self.session.phase
    }

    pub fn preferences(&self) -> &R {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut R {
        &mut self.preferences
    }

    #[cfg(test)]
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Show `request`, superseding whatever cycle is in progress
    pub fn display(&mut self, request: HudRequest) {
        let screens = self.platform.screens();
        let pointer = self.platform.pointer_location();
        let Some(screen) = choose_screen(&screens, pointer).copied() else {
            warn!(name = %request.display_name, "no screen available, skipping HUD");
            return;
        };

        if let Some(timer) = self.session.pending_fade_out.take() {
            self.platform.cancel(timer);
        }

        self.session.generation = self.session.generation.wrapping_add(1);
        let generation = self.session.generation;

        let size = Size::new(
            panel_width(&request.display_name, request.icon.is_some()),
            PANEL_HEIGHT,
        );
        let origin = centered_origin(&screen, size);
        let frame = Rect::new(origin, size);

        let content = HudContent {
            appearance: self.preferences.appearance(&request.display_name),
            name: request.display_name,
            icon: request.icon,
        };

        let platform = &mut self.platform;
        let surface = self.surface.get_or_insert_with(|| {
            debug!("creating HUD surface");
            platform.create_surface()
        });

        surface.set_content(&content);
        surface.set_frame(frame);
        surface.stop_transitions();
        surface.set_opacity(0.0);
        surface.order_front();
        surface.animate(&Transition::fade_in());

        self.session.base_position = origin;
        self.session.frame = frame;
        self.session.opacity = 0.0;
        self.enter(HudPhase::FadingIn);

        debug!(generation, name = %content.name, width = size.width, "HUD displayed");

        self.platform
            .schedule(FADE_IN_DURATION, HudTick::FadeInDone { generation });
    }

    /// Deliver a timer or animation completion
    pub fn handle_tick(&mut self, tick: HudTick) {
        if tick.generation() != self.session.generation {
            debug!(?tick, current = self.session.generation, "dropping stale HUD tick");
            return;
        }

        match tick {
            HudTick::FadeInDone { generation } => {
                self.session.opacity = 1.0;
                self.enter(HudPhase::Visible);

                // Read at scheduling time so changes apply to the next cycle
                let hold = resolve_hold_duration(self.preferences.hold_duration_secs());
                let timer = self
                    .platform
                    .schedule(hold, HudTick::HoldElapsed { generation });
                self.session.pending_fade_out = Some(timer);
            }
            HudTick::HoldElapsed { generation } => {
                self.session.pending_fade_out = None;
                let Some(surface) = self.surface.as_mut() else {
                    return;
                };

                let target = self.session.base_position.offset(0.0, SLIDE_UP_DISTANCE);
                surface.animate(&Transition::fade_out(target));
                self.session.opacity = 0.0;
                self.enter(HudPhase::FadingOut);

                self.platform
                    .schedule(FADE_OUT_DURATION, HudTick::FadeOutDone { generation });
            }
            HudTick::FadeOutDone { .. } => {
                let Some(surface) = self.surface.as_mut() else {
                    return;
                };

                surface.order_out();
                surface.set_frame(Rect::new(self.session.base_position, self.session.frame.size));
                self.session.opacity = 0.0;
                self.enter(HudPhase::Hidden);
            }
        }
    }

    fn enter(&mut self, phase: HudPhase) {
        if self.session.phase != phase {
            debug!(
                from = %self.session.phase,
                to = %phase,
                generation = self.session.generation,
                "HUD phase"
            );
            self.session.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hud::testing::{FakePlatform, StaticPreferences, SurfaceCall};
    use crate::hud::IconRef;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn controller() -> HudController<FakePlatform, StaticPreferences> {
        HudController::new(FakePlatform::new(), StaticPreferences::default())
    }

    fn icon(name: &str) -> Option<IconRef> {
        Some(IconRef(format!("file:///icons/{name}.tiff")))
    }

    #[test]
    fn test_full_cycle() {
        let mut hud = controller();
        hud.display(HudRequest::new("ABC", None));
        assert_eq!(hud.phase(), HudPhase::FadingIn);

        FakePlatform::run_until(&mut hud, ms(250));
        assert_eq!(hud.phase(), HudPhase::Visible);
        assert_eq!(hud.session().opacity, 1.0);

        FakePlatform::run_until(&mut hud, ms(2250));
        assert_eq!(hud.phase(), HudPhase::FadingOut);
        assert_eq!(hud.session().opacity, 0.0);

        FakePlatform::run_until(&mut hud, ms(2750));
        assert_eq!(hud.phase(), HudPhase::Hidden);

        let log = hud.platform_mut().log();
        assert_eq!(log.count(|c| matches!(c, SurfaceCall::OrderOut)), 1);
        assert_eq!(log.times_of(|c| matches!(c, SurfaceCall::OrderOut)), vec![ms(2750)]);
    }

    #[test]
    fn test_display_sequence_resets_surface() {
        let mut hud = controller();
        hud.display(HudRequest::new("ABC", None));

        let calls = hud.platform_mut().log().calls();
        assert!(matches!(calls[0], SurfaceCall::Content(ref name, None) if name == "ABC"));
        assert!(matches!(calls[1], SurfaceCall::Frame(_)));
        assert_eq!(calls[2], SurfaceCall::StopTransitions);
        assert_eq!(calls[3], SurfaceCall::Opacity(0.0));
        assert_eq!(calls[4], SurfaceCall::OrderFront);
        assert_eq!(calls[5], SurfaceCall::Animate(Transition::fade_in()));
    }

    #[test]
    fn test_surface_created_once() {
        let mut hud = controller();
        hud.display(HudRequest::new("ABC", None));
        FakePlatform::run_until(&mut hud, ms(5000));
        hud.display(HudRequest::new("Pinyin - Simplified", None));
        assert_eq!(hud.platform_mut().surfaces_created(), 1);
    }

    #[test]
    fn test_rapid_redisplay_shows_latest_and_hides_once() {
        let mut hud = controller();
        hud.display(HudRequest::new("Pinyin - Simplified", icon("pinyin")));
        FakePlatform::run_until(&mut hud, ms(50));
        hud.display(HudRequest::new("ABC", icon("abc")));

        FakePlatform::run_until(&mut hud, ms(10_000));

        let log = hud.platform_mut().log();
        let last_content = log
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                SurfaceCall::Content(name, icon) => Some((name, icon)),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(last_content, ("ABC".to_string(), icon("abc")));

        // 50ms + 250ms fade-in + 2000ms hold + 500ms fade-out
        assert_eq!(log.times_of(|c| matches!(c, SurfaceCall::OrderOut)), vec![ms(2800)]);
        assert_eq!(
            log.count(|c| matches!(c, SurfaceCall::Animate(t) if t.opacity == 0.0)),
            1
        );
        assert_eq!(hud.phase(), HudPhase::Hidden);
    }

    #[test]
    fn test_redisplay_during_hold_cancels_timer() {
        let mut hud = controller();
        hud.display(HudRequest::new("ABC", None));
        FakePlatform::run_until(&mut hud, ms(1000));
        let pending = hud.session().pending_fade_out.unwrap();

        hud.display(HudRequest::new("ABC", None));
        assert!(hud.platform_mut().was_cancelled(pending));
        assert_eq!(hud.session().pending_fade_out, None);

        FakePlatform::run_until(&mut hud, ms(10_000));
        let log = hud.platform_mut().log();
        assert_eq!(log.times_of(|c| matches!(c, SurfaceCall::OrderOut)), vec![ms(3750)]);
    }

    #[test]
    fn test_stale_fade_out_completion_is_ignored() {
        let mut hud = controller();
        hud.display(HudRequest::new("ABC", None));
        FakePlatform::run_until(&mut hud, ms(2400));
        assert_eq!(hud.phase(), HudPhase::FadingOut);
        let stale = hud.session().generation;

        hud.display(HudRequest::new("Pinyin - Simplified", None));
        let before = hud.platform_mut().log().calls().len();

        hud.handle_tick(HudTick::FadeOutDone { generation: stale });
        assert_eq!(hud.phase(), HudPhase::FadingIn);
        assert_eq!(hud.platform_mut().log().calls().len(), before);
    }

    #[test]
    fn test_stale_fade_in_does_not_schedule_hold() {
        let mut hud = controller();
        hud.display(HudRequest::new("ABC", None));
        let stale = hud.session().generation;
        hud.display(HudRequest::new("ABC", None));

        let timers = hud.platform_mut().scheduled_count();
        hud.handle_tick(HudTick::FadeInDone { generation: stale });
        assert_eq!(hud.platform_mut().scheduled_count(), timers);
        assert_eq!(hud.session().pending_fade_out, None);
    }

    #[test]
    fn test_redisplay_mid_fade_out_returns_to_base() {
        let mut hud = controller();
        hud.display(HudRequest::new("ABC", None));
        FakePlatform::run_until(&mut hud, ms(2500));
        let base = hud.session().base_position;

        hud.display(HudRequest::new("ABC", None));
        let log = hud.platform_mut().log();
        let frame = log
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                SurfaceCall::Frame(f) => Some(f),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(frame.origin, base);
    }

    #[test]
    fn test_fade_out_slides_up_and_resets() {
        let mut hud = controller();
        hud.display(HudRequest::new("ABC", None));
        let base = hud.session().base_position;
        FakePlatform::run_until(&mut hud, ms(5000));

        let calls = hud.platform_mut().log().calls();
        let slide = calls
            .iter()
            .find_map(|c| match c {
                SurfaceCall::Animate(t) if t.opacity == 0.0 => t.origin,
                _ => None,
            })
            .unwrap();
        assert_eq!(slide, base.offset(0.0, SLIDE_UP_DISTANCE));

        let n = calls.len();
        assert_eq!(calls[n - 2], SurfaceCall::OrderOut);
        assert!(matches!(calls[n - 1], SurfaceCall::Frame(f) if f.origin == base));
    }

    #[test]
    fn test_hold_duration_read_per_cycle() {
        let mut hud = controller();
        hud.preferences_mut().hold_secs = 1.0;
        hud.display(HudRequest::new("ABC", None));
        // Changing the preference mid-fade-in applies to this cycle's hold,
        // since the hold is read when the fade-in completes
        hud.preferences_mut().hold_secs = 0.5;
        FakePlatform::run_until(&mut hud, ms(10_000));

        let log = hud.platform_mut().log();
        assert_eq!(log.times_of(|c| matches!(c, SurfaceCall::OrderOut)), vec![ms(1250)]);
    }

    #[test]
    fn test_no_screens_is_noop() {
        let mut hud = HudController::new(FakePlatform::without_screens(), StaticPreferences::default());
        hud.display(HudRequest::new("ABC", None));
        assert_eq!(hud.phase(), HudPhase::Hidden);
        assert_eq!(hud.session().generation, 0);
        assert_eq!(hud.platform_mut().surfaces_created(), 0);
    }

    #[test]
    fn test_resolve_hold_duration() {
        for raw in [-1.0, 0.0, 0.05, 10.0, f64::NAN, f64::INFINITY] {
            let resolved = resolve_hold_duration(raw);
            assert!(resolved >= MIN_DISPLAY_DURATION && resolved <= MAX_DISPLAY_DURATION);
        }
        assert_eq!(resolve_hold_duration(-1.0), DEFAULT_DISPLAY_DURATION);
        assert_eq!(resolve_hold_duration(0.0), DEFAULT_DISPLAY_DURATION);
        assert_eq!(resolve_hold_duration(1.5), Duration::from_millis(1500));
        assert_eq!(resolve_hold_duration(5.0), MAX_DISPLAY_DURATION);
    }

    #[test]
    fn test_appearance_passed_to_surface() {
        let mut hud = controller();
        hud.preferences_mut().alpha = 0.4;
        hud.display(HudRequest::new("ABC", None));
        let contents = hud.platform_mut().log().contents();
        assert_eq!(contents[0].appearance.alpha, 0.4);
    }
}
