//! Event types flowing through the daemon
//!
//! [`AppEvent`] is everything the single app loop consumes. [`DaemonEvent`]
//! is what the app publishes to subscribed IPC clients.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::gesture::Gesture;
use crate::hotkey::HotkeyEvent;
use crate::hud::{HudTick, SurfaceCommand};
use crate::input_source::SourceNotification;
use crate::ipc::{Request, Response};

/// Input to the app loop. All producers funnel through one channel so
/// handlers never run concurrently.
#[derive(Debug)]
pub enum AppEvent {
    /// Key activity from the listener
    Hotkey(HotkeyEvent),
    /// Input source notification from the system
    InputSource(SourceNotification),
    /// HUD timer or animation completion
    Hud(HudTick),
    /// IPC request to be answered from inside the loop
    Control {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
}

/// Events published to subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonEvent {
    /// A gesture was recognised
    GestureDetected { gesture: Gesture },

    /// The selected input source changed
    InputSourceChanged { name: String },

    /// Draw command for the HUD renderer
    Surface { command: SurfaceCommand },
}

impl std::fmt::Display for DaemonEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonEvent::GestureDetected { gesture } => write!(f, "GESTURE_DETECTED ({})", gesture),
            DaemonEvent::InputSourceChanged { name } => {
                write!(f, "INPUT_SOURCE_CHANGED ({})", name)
            }
            DaemonEvent::Surface { .. } => write!(f, "SURFACE"),
        }
    }
}
