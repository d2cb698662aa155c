//! Virtual-clock platform for exercising the HUD controller in tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::controller::HudController;
use super::geometry::{Point, Rect, Screen, Size};
use super::platform::{
    Appearance, HudContent, HudPlatform, HudTick, IconRef, Preferences, Surface, TimerId,
    Transition,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Content(String, Option<IconRef>),
    Frame(Rect),
    StopTransitions,
    Opacity(f64),
    OrderFront,
    OrderOut,
    Animate(Transition),
}

#[derive(Default)]
struct LogInner {
    calls: Vec<(Duration, SurfaceCall)>,
    contents: Vec<HudContent>,
}

/// Shared record of every call made on the fake surface
#[derive(Clone, Default)]
pub struct SurfaceLog {
    inner: Rc<RefCell<LogInner>>,
}

impl SurfaceLog {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.inner.borrow().calls.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn contents(&self) -> Vec<HudContent> {
        self.inner.borrow().contents.clone()
    }

    pub fn times_of(&self, pred: impl Fn(&SurfaceCall) -> bool) -> Vec<Duration> {
        self.inner
            .borrow()
            .calls
            .iter()
            .filter(|(_, c)| pred(c))
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&SurfaceCall) -> bool) -> usize {
        self.times_of(pred).len()
    }

    fn push(&self, at: Duration, call: SurfaceCall) {
        self.inner.borrow_mut().calls.push((at, call));
    }
}

pub struct FakeSurface {
    clock: Rc<Cell<Duration>>,
    log: SurfaceLog,
}

impl FakeSurface {
    fn record(&self, call: SurfaceCall) {
        self.log.push(self.clock.get(), call);
    }
}

impl Surface for FakeSurface {
    fn set_content(&mut self, content: &HudContent) {
        self.log.inner.borrow_mut().contents.push(content.clone());
        self.record(SurfaceCall::Content(content.name.clone(), content.icon.clone()));
    }

    fn set_frame(&mut self, frame: Rect) {
        self.record(SurfaceCall::Frame(frame));
    }

    fn stop_transitions(&mut self) {
        self.record(SurfaceCall::StopTransitions);
    }

    fn set_opacity(&mut self, opacity: f64) {
        self.record(SurfaceCall::Opacity(opacity));
    }

    fn order_front(&mut self) {
        self.record(SurfaceCall::OrderFront);
    }

    fn order_out(&mut self) {
        self.record(SurfaceCall::OrderOut);
    }

    fn animate(&mut self, transition: &Transition) {
        self.record(SurfaceCall::Animate(*transition));
    }
}

/// Platform whose timers only fire when the test advances the clock
pub struct FakePlatform {
    clock: Rc<Cell<Duration>>,
    log: SurfaceLog,
    screens: Vec<Screen>,
    timers: Vec<(Duration, TimerId, HudTick)>,
    cancelled: Vec<TimerId>,
    next_timer: TimerId,
    scheduled: usize,
    surfaces_created: usize,
}

impl FakePlatform {
    /// One focused 1440x900 screen
    pub fn new() -> Self {
        let frame = Rect::new(Point::new(0.0, 0.0), Size::new(1440.0, 900.0));
        Self::with_screens(vec![Screen {
            frame,
            visible_frame: frame,
            has_focus: true,
        }])
    }

    pub fn without_screens() -> Self {
        Self::with_screens(Vec::new())
    }

    pub fn with_screens(screens: Vec<Screen>) -> Self {
        Self {
            clock: Rc::new(Cell::new(Duration::ZERO)),
            log: SurfaceLog::default(),
            screens,
            timers: Vec::new(),
            cancelled: Vec::new(),
            next_timer: 1,
            scheduled: 0,
            surfaces_created: 0,
        }
    }

    pub fn log(&self) -> SurfaceLog {
        self.log.clone()
    }

    pub fn was_cancelled(&self, timer: TimerId) -> bool {
        self.cancelled.contains(&timer)
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled
    }

    pub fn surfaces_created(&self) -> usize {
        self.surfaces_created
    }

    /// Remove the earliest timer due at or before `until`, advancing the
    /// clock to its deadline
    pub fn pop_due(&mut self, until: Duration) -> Option<HudTick> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, (at, _, _))| *at <= until)
            .min_by_key(|(_, (at, id, _))| (*at, *id))
            .map(|(i, _)| i)?;
        let (at, _, tick) = self.timers.remove(index);
        self.clock.set(at);
        Some(tick)
    }

    /// Advance virtual time to `until`, delivering due ticks in order
    pub fn run_until<R: Preferences>(hud: &mut HudController<FakePlatform, R>, until: Duration) {
        while let Some(tick) = hud.platform_mut().pop_due(until) {
            hud.handle_tick(tick);
        }
        hud.platform_mut().clock.set(until);
    }
}

impl HudPlatform for FakePlatform {
    type Surface = FakeSurface;

    fn create_surface(&mut self) -> FakeSurface {
        self.surfaces_created += 1;
        FakeSurface {
            clock: Rc::clone(&self.clock),
            log: self.log.clone(),
        }
    }

    fn screens(&self) -> Vec<Screen> {
        self.screens.clone()
    }

    fn pointer_location(&self) -> Option<Point> {
        None
    }

    fn schedule(&mut self, delay: Duration, tick: HudTick) -> TimerId {
        let id = self.next_timer;
        self.next_timer += 1;
        self.scheduled += 1;
        self.timers.push((self.clock.get() + delay, id, tick));
        id
    }

    fn cancel(&mut self, timer: TimerId) {
        self.timers.retain(|(_, id, _)| *id != timer);
        self.cancelled.push(timer);
    }
}

/// Fixed preferences
pub struct StaticPreferences {
    pub hold_secs: f64,
    pub alpha: f64,
}

impl Default for StaticPreferences {
    fn default() -> Self {
        Self {
            hold_secs: 2.0,
            alpha: Appearance::default().alpha,
        }
    }
}

impl Preferences for StaticPreferences {
    fn appearance(&self, _source: &str) -> Appearance {
        Appearance {
            alpha: self.alpha,
            ..Appearance::default()
        }
    }

    fn hold_duration_secs(&self) -> f64 {
        self.hold_secs
    }
}
