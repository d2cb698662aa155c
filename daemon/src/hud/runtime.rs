//! Tokio-backed HUD platform
//!
//! Timers are tokio tasks that post their tick back into the app event
//! channel, so completions are handled on the same consumer as every other
//! event. Surface operations are published as [`SurfaceCommand`]s for the
//! renderer that subscribes over IPC.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::events::{AppEvent, DaemonEvent};

use super::geometry::{Point, Rect, Screen};
use super::platform::{HudContent, HudPlatform, HudTick, Surface, TimerId, Transition};
use super::screens::ScreenSource;

/// Draw command sent to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SurfaceCommand {
    Content { content: HudContent },
    Frame { frame: Rect },
    StopTransitions,
    Opacity { value: f64 },
    OrderFront,
    OrderOut,
    Animate { transition: Transition },
}

/// Surface that forwards every operation to subscribed renderers
pub struct RemoteSurface {
    event_tx: broadcast::Sender<DaemonEvent>,
}

impl RemoteSurface {
    pub fn new(event_tx: broadcast::Sender<DaemonEvent>) -> Self {
        Self { event_tx }
    }

    fn send(&self, command: SurfaceCommand) {
        trace!(?command, "surface command");
        // No renderer attached is fine
        let _ = self.event_tx.send(DaemonEvent::Surface { command });
    }
}

impl Surface for RemoteSurface {
    fn set_content(&mut self, content: &HudContent) {
        self.send(SurfaceCommand::Content {
            content: content.clone(),
        });
    }

    fn set_frame(&mut self, frame: Rect) {
        self.send(SurfaceCommand::Frame { frame });
    }

    fn stop_transitions(&mut self) {
        self.send(SurfaceCommand::StopTransitions);
    }

    fn set_opacity(&mut self, opacity: f64) {
        self.send(SurfaceCommand::Opacity { value: opacity });
    }

    fn order_front(&mut self) {
        self.send(SurfaceCommand::OrderFront);
    }

    fn order_out(&mut self) {
        self.send(SurfaceCommand::OrderOut);
    }

    fn animate(&mut self, transition: &Transition) {
        self.send(SurfaceCommand::Animate {
            transition: *transition,
        });
    }
}

/// HUD platform running on the tokio runtime
pub struct TokioHudPlatform<S: ScreenSource> {
    app_tx: mpsc::Sender<AppEvent>,
    event_tx: broadcast::Sender<DaemonEvent>,
    screens: S,
    timers: HashMap<TimerId, JoinHandle<()>>,
    next_timer: TimerId,
}

impl<S: ScreenSource> TokioHudPlatform<S> {
    pub fn new(
        app_tx: mpsc::Sender<AppEvent>,
        event_tx: broadcast::Sender<DaemonEvent>,
        screens: S,
    ) -> Self {
        Self {
            app_tx,
            event_tx,
            screens,
            timers: HashMap::new(),
            next_timer: 1,
        }
    }

    /// Number of timers that have not fired or been cancelled
    pub fn active_timers(&self) -> usize {
        self.timers.values().filter(|h| !h.is_finished()).count()
    }
}

impl<S: ScreenSource> HudPlatform for TokioHudPlatform<S> {
    type Surface = RemoteSurface;

    fn create_surface(&mut self) -> RemoteSurface {
        RemoteSurface::new(self.event_tx.clone())
    }

    fn screens(&self) -> Vec<Screen> {
        self.screens.screens()
    }

    fn pointer_location(&self) -> Option<Point> {
        self.screens.pointer_location()
    }

    fn schedule(&mut self, delay: Duration, tick: HudTick) -> TimerId {
        self.timers.retain(|_, handle| !handle.is_finished());

        let id = self.next_timer;
        self.next_timer += 1;

        let app_tx = self.app_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if app_tx.send(AppEvent::Hud(tick)).await.is_err() {
                debug!(?tick, "app loop gone, dropping HUD tick");
            }
        });
        self.timers.insert(id, handle);
        id
    }

    fn cancel(&mut self, timer: TimerId) {
        if let Some(handle) = self.timers.remove(&timer) {
            handle.abort();
        }
    }
}
