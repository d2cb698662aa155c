//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::DaemonEvent;
use crate::hotkey::SwitchKey;
use crate::hud::HudPhase;
use crate::settings::Settings;

/// Requests from clients to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Request the persisted settings
    GetSettings,

    /// Choose the solo-press switch key
    SetSwitchKey { key: SwitchKey },

    /// Set how long the HUD stays visible, in seconds
    SetDisplayDuration { seconds: f64 },

    /// Set the HUD background colour for one input source
    SetSourceColor {
        name: String,
        red: f64,
        green: f64,
        blue: f64,
    },

    /// Set the HUD opacity for one input source
    SetSourceAlpha { name: String, alpha: f64 },

    /// Show the HUD for the current input source
    ShowHud,

    /// Subscribe to pushed events (gestures, source changes, draw commands)
    Subscribe,
}

/// Responses from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Current settings
    Settings(Settings),

    /// Request applied
    Done,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push message from daemon to subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: DaemonEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Configured switch key
    pub switch_key: SwitchKey,

    /// Current HUD phase
    pub hud_phase: HudPhase,

    /// Current HUD generation
    pub hud_generation: u64,

    /// Name of the selected input source, if known
    pub current_input_source: Option<String>,

    /// Whether the global key listener is running
    pub hotkey_listener: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            switch_key: SwitchKey::default(),
            hud_phase: HudPhase::default(),
            hud_generation: 0,
            current_input_source: None,
            hotkey_listener: false,
            uptime_secs: 0,
        }
    }
}
