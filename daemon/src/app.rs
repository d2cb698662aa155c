//! The app loop
//!
//! Consumes every [`AppEvent`] in arrival order. Key activity goes through
//! the gesture detector, recognised gestures switch the input source or show
//! the HUD, source notifications re-show the HUD, and IPC control requests
//! are answered here so they never race the handlers above.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::events::{AppEvent, DaemonEvent};
use crate::gesture::{Gesture, GestureDetector};
use crate::hotkey::{HotkeyEvent, TapStatus};
use crate::hud::{
    HudController, HudPlatform, HudRequest, MAX_DISPLAY_DURATION, MIN_DISPLAY_DURATION,
};
use crate::input_source::{select_next, InputSourceProvider, SourceNotification, SourceTracker};
use crate::ipc::{DaemonStatus, Request, Response};
use crate::settings::{SettingsError, SettingsStore};

pub struct App<P: HudPlatform, S: InputSourceProvider> {
    detector: GestureDetector,
    hud: HudController<P, SettingsStore>,
    sources: S,
    tracker: SourceTracker,
    event_tx: broadcast::Sender<DaemonEvent>,
    tap: TapStatus,
}

impl<P: HudPlatform, S: InputSourceProvider> App<P, S> {
    pub fn new(
        hud: HudController<P, SettingsStore>,
        sources: S,
        event_tx: broadcast::Sender<DaemonEvent>,
        tap: TapStatus,
    ) -> Self {
        let switch_key = hud.preferences().settings().switch_key;
        Self {
            detector: GestureDetector::new(switch_key),
            hud,
            sources,
            tracker: SourceTracker::default(),
            event_tx,
            tap,
        }
    }

    /// Record the enabled sources and remember the current one
    pub fn start(&mut self) {
        self.record_selectable();
        let current = self.sources.current().map(|s| s.name);
        info!(
            current = current.as_deref().unwrap_or("<unknown>"),
            switch_key = %self.detector.switch_key(),
            "app started"
        );
        self.tracker = SourceTracker::new(current);
    }

    /// Process events until every sender is gone
    pub async fn run(&mut self, mut app_rx: mpsc::Receiver<AppEvent>) {
        info!("app loop started");

        while let Some(event) = app_rx.recv().await {
            self.handle(event);
        }

        info!("app loop stopped");
    }

    pub fn handle(&mut self, event: AppEvent) {
        match event {
            AppEvent::Hotkey(HotkeyEvent::Modifier(event)) => {
                if let Some(gesture) = self.detector.handle_modifier_event(&event) {
                    self.perform(gesture);
                }
            }
            AppEvent::Hotkey(HotkeyEvent::KeyDown) => self.detector.note_key_down(),
            AppEvent::Hotkey(HotkeyEvent::TapDisabled) => {
                warn!("key event tap was disabled by the system, events may have been missed");
            }
            AppEvent::InputSource(SourceNotification::SelectedChanged) => self.on_source_changed(),
            AppEvent::InputSource(SourceNotification::EnabledChanged) => self.record_selectable(),
            AppEvent::Hud(tick) => self.hud.handle_tick(tick),
            AppEvent::Control { request, reply } => {
                let response = self.on_control(request);
                if reply.send(response).is_err() {
                    debug!("IPC client went away before the reply");
                }
            }
        }
    }

    fn perform(&mut self, gesture: Gesture) {
        info!(%gesture, "gesture detected");
        let _ = self.event_tx.send(DaemonEvent::GestureDetected { gesture });

        match gesture {
            // The HUD follows from the selection-changed notification
            Gesture::SwitchInputSource => match select_next(&self.sources) {
                Ok(source) => debug!(name = %source.name, "input source selected"),
                Err(e) => warn!(error = %e, "failed to switch input source"),
            },
            Gesture::ShowHud => self.show_current_source(),
        }
    }

    fn show_current_source(&mut self) {
        let Some(source) = self.sources.current() else {
            debug!("current input source unknown, skipping HUD");
            return;
        };
        self.remember(&source.name);
        self.hud.display(HudRequest::new(source.name, source.icon));
    }

    fn on_source_changed(&mut self) {
        let Some(source) = self.sources.current() else {
            debug!("selection changed but current source is unknown");
            return;
        };
        if !self.tracker.observe(Some(&source.name)) {
            debug!(name = %source.name, "input source unchanged");
            return;
        }

        info!(name = %source.name, "input source changed");
        self.remember(&source.name);
        let _ = self.event_tx.send(DaemonEvent::InputSourceChanged {
            name: source.name.clone(),
        });
        self.hud.display(HudRequest::new(source.name, source.icon));
    }

    fn record_selectable(&mut self) {
        for source in self.sources.selectable() {
            self.remember(&source.name);
        }
    }

    fn remember(&mut self, name: &str) {
        match self.hud.preferences_mut().record_input_source(name) {
            Ok(true) => debug!(name, "new input source recorded"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "failed to save settings"),
        }
    }

    fn on_control(&mut self, request: Request) -> Response {
        debug!(?request, "control request");

        match request {
            Request::Ping => Response::Pong,
            Request::Subscribe => Response::Subscribed,
            Request::GetStatus => Response::Status(self.status()),
            Request::GetSettings => Response::Settings(self.hud.preferences().settings().clone()),
            Request::SetSwitchKey { key } => {
                let result = self.hud.preferences_mut().set_switch_key(key);
                if result.is_ok() {
                    self.detector.set_switch_key(key);
                }
                saved(result)
            }
            Request::SetDisplayDuration { seconds } => {
                let min = MIN_DISPLAY_DURATION.as_secs_f64();
                let max = MAX_DISPLAY_DURATION.as_secs_f64();
                if !seconds.is_finite() || !(min..=max).contains(&seconds) {
                    return Response::error(
                        "invalid_duration",
                        format!("display duration must be between {min} and {max} seconds"),
                    );
                }
                saved(self.hud.preferences_mut().set_display_duration(seconds))
            }
            Request::SetSourceColor {
                name,
                red,
                green,
                blue,
            } => saved(self.hud.preferences_mut().set_color(&name, red, green, blue)),
            Request::SetSourceAlpha { name, alpha } => {
                saved(self.hud.preferences_mut().set_alpha(&name, alpha))
            }
            Request::ShowHud => {
                self.show_current_source();
                Response::Done
            }
        }
    }

    fn status(&self) -> DaemonStatus {
        DaemonStatus {
            switch_key: self.detector.switch_key(),
            hud_phase: self.hud.phase(),
            hud_generation: self.hud.session().generation,
            current_input_source: self.sources.current().map(|s| s.name),
            hotkey_listener: self.tap.is_active(),
            ..DaemonStatus::default()
        }
    }
}

fn saved(result: Result<(), SettingsError>) -> Response {
    match result {
        Ok(()) => Response::Done,
        Err(e) => {
            warn!(error = %e, "failed to save settings");
            Response::error("settings_write", e.to_string())
        }
    }
}
