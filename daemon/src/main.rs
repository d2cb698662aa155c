//! inputswitch-daemon: input source switcher with an on-screen indicator
//!
//! This daemon runs as a LaunchAgent and provides:
//! - Solo-press switching of keyboard input sources via CGEventTap
//! - Fn double-tap to show the current source
//! - A HUD announcing the active source, drawn by a subscribed renderer
//! - IPC server for settings and status

mod app;
mod config;
mod events;
mod gesture;
mod hotkey;
mod hud;
mod input_source;
mod ipc;
mod lifecycle;
mod settings;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::config::Config;
use crate::events::{AppEvent, DaemonEvent};
use crate::hotkey::HotkeyListener;
use crate::hud::{HudController, SystemScreens, TokioHudPlatform};
use crate::input_source::SystemInputSources;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::settings::SettingsStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "inputswitch-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.settings_path, "configuration loaded");

    let settings = SettingsStore::load(&config.settings_path);

    let shutdown = ShutdownSignal::new();

    // Every producer (key listener, timers, IPC) feeds the app loop
    let (app_tx, app_rx) = mpsc::channel::<AppEvent>(128);
    // App loop and HUD surface -> subscribed IPC clients
    let (event_tx, _event_rx) = broadcast::channel::<DaemonEvent>(256);

    let hotkey_listener = HotkeyListener::new(app_tx.clone(), settings.settings().key_codes);

    // Start the hotkey listener (runs on dedicated thread)
    match hotkey_listener.start() {
        Ok(()) => info!("hotkey listener started"),
        Err(e) => {
            error!(error = %e, "failed to start hotkey listener");
            warn!("continuing without gestures");
        }
    }

    let platform = TokioHudPlatform::new(app_tx.clone(), event_tx.clone(), SystemScreens);
    let hud = HudController::new(platform, settings);
    let mut app = App::new(
        hud,
        SystemInputSources::default(),
        event_tx.clone(),
        hotkey_listener.tap_status(),
    );
    app.start();

    let server = Server::new(&config.socket_path, app_tx, event_tx)?;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        _ = app.run(app_rx) => {
            info!("app loop exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        result = shutdown.wait() => match result {
            Ok(signal) => info!(signal, "shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for shutdown signals"),
        }
    }

    info!("shutting down...");

    hotkey_listener.stop();
    server.shutdown().await;

    info!("inputswitch-daemon stopped");

    Ok(())
}
