//! Global key listener using macOS CGEventTap
//!
//! Monitors flags-changed and key-down events system-wide, plus the input
//! source notifications. Runs on a dedicated thread with its own CFRunLoop
//! and forwards everything, in arrival order, into the app event channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{error, info};

use super::keys::{KeyMap, ModifierKeyEvent};
use crate::events::AppEvent;

/// Events sent from the key listener to the app loop
#[derive(Debug, Clone)]
pub enum HotkeyEvent {
    /// A tracked modifier went down or up
    Modifier(ModifierKeyEvent),
    /// Any regular key went down (including auto-repeat)
    KeyDown,
    /// Event tap was disabled by macOS and has been re-enabled
    TapDisabled,
}

/// Whether the event tap is currently installed. Cloned handles share state.
#[derive(Debug, Clone, Default)]
pub struct TapStatus(Arc<AtomicBool>);

impl TapStatus {
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn set(&self, active: bool) {
        self.0.store(active, Ordering::SeqCst);
    }
}

/// Global listener for modifier transitions and key activity
pub struct HotkeyListener {
    app_tx: mpsc::Sender<AppEvent>,
    key_map: KeyMap,
    running: Arc<AtomicBool>,
    tap: TapStatus,
}

impl HotkeyListener {
    pub fn new(app_tx: mpsc::Sender<AppEvent>, key_map: KeyMap) -> Self {
        Self {
            app_tx,
            key_map,
            running: Arc::new(AtomicBool::new(false)),
            tap: TapStatus::default(),
        }
    }

    /// Handle reporting whether key events are being received
    pub fn tap_status(&self) -> TapStatus {
        self.tap.clone()
    }

    /// Start the listener
    ///
    /// Spawns a dedicated thread that runs a CFRunLoop to receive CGEventTap
    /// callbacks. The listener runs until `stop()` is called or the program
    /// exits.
    pub fn start(&self) -> Result<(), HotkeyError> {
        if !cfg!(target_os = "macos") {
            return Err(HotkeyError::Unsupported);
        }

        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let app_tx = self.app_tx.clone();
        let key_map = self.key_map;
        let running = Arc::clone(&self.running);
        let tap = self.tap.clone();

        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                if let Err(e) = run_event_loop(app_tx, key_map, running.clone(), tap.clone()) {
                    error!(?e, "hotkey listener error");
                }

                tap.set(false);
                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HotkeyError::ThreadSpawn(e.to_string())
            })?;

        Ok(())
    }

    /// Stop the listener. The run loop notices within one polling interval.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the key listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("global key monitoring is only supported on macOS")]
    Unsupported,
}

#[cfg(target_os = "macos")]
fn run_event_loop(
    app_tx: mpsc::Sender<AppEvent>,
    key_map: KeyMap,
    running: Arc<AtomicBool>,
    tap_status: TapStatus,
) -> Result<(), HotkeyError> {
    use std::time::{Duration, Instant};

    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
        CGEventTapProxy, CGEventType, EventField,
    };
    use tracing::{debug, warn};

    use crate::input_source::{SourceNotification, SourceObserver};

    enum TapMessage {
        FlagsChanged { code: u16, bits: u64, at: Instant },
        KeyDown,
        Disabled,
        Source(SourceNotification),
    }

    let (callback_tx, callback_rx) = std::sync::mpsc::channel::<TapMessage>();

    // Registered first: source notifications need no Accessibility
    // permission and arrive on this thread's run loop
    let source_tx = callback_tx.clone();
    let _observer = SourceObserver::register(move |notification| {
        let _ = source_tx.send(TapMessage::Source(notification));
    });

    // CGEventTap callback - must be fast and non-blocking
    let tap_tx = callback_tx.clone();
    let callback = move |_proxy: CGEventTapProxy, event_type: CGEventType, event: &CGEvent| -> Option<CGEvent> {
        let message = match event_type {
            CGEventType::FlagsChanged => Some(TapMessage::FlagsChanged {
                code: event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16,
                bits: event.get_flags().bits(),
                at: Instant::now(),
            }),
            CGEventType::KeyDown => Some(TapMessage::KeyDown),
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                Some(TapMessage::Disabled)
            }
            _ => None,
        };
        if let Some(message) = message {
            let _ = tap_tx.send(message);
        }
        Some(event.clone())
    };

    let run_loop = CFRunLoop::get_current();

    // Without Accessibility permission the tap cannot be created; keep the
    // run loop going so source notifications still flow
    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::FlagsChanged, CGEventType::KeyDown],
        callback,
    ) {
        Ok(tap) => Some(tap),
        Err(()) => {
            error!("failed to create event tap - is Accessibility permission granted?");
            None
        }
    };

    let _run_loop_source = tap.as_ref().and_then(|tap| match tap.mach_port.create_runloop_source(0) {
        Ok(source) => {
            unsafe {
                run_loop.add_source(&source, kCFRunLoopCommonModes);
            }
            tap.enable();
            tap_status.set(true);
            info!("event tap created and enabled");
            Some(source)
        }
        Err(()) => {
            error!("failed to create run loop source for event tap");
            None
        }
    });

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, Duration::from_millis(100), true);
        }

        while let Ok(message) = callback_rx.try_recv() {
            let event = match message {
                TapMessage::FlagsChanged { code, bits, at } => {
                    match ModifierKeyEvent::from_raw(&key_map, code, bits, at) {
                        Some(event) => {
                            debug!(key = ?event.key, transition = ?event.transition, "modifier transition");
                            AppEvent::Hotkey(HotkeyEvent::Modifier(event))
                        }
                        None => continue,
                    }
                }
                TapMessage::KeyDown => AppEvent::Hotkey(HotkeyEvent::KeyDown),
                TapMessage::Disabled => {
                    warn!("event tap disabled, re-enabling");
                    if let Some(tap) = &tap {
                        tap.enable();
                    }
                    AppEvent::Hotkey(HotkeyEvent::TapDisabled)
                }
                TapMessage::Source(notification) => AppEvent::InputSource(notification),
            };

            if app_tx.blocking_send(event).is_err() {
                warn!("app event channel closed, stopping listener");
                return Ok(());
            }
        }
    }

    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run_event_loop(
    _app_tx: mpsc::Sender<AppEvent>,
    _key_map: KeyMap,
    _running: Arc<AtomicBool>,
    _tap_status: TapStatus,
) -> Result<(), HotkeyError> {
    Err(HotkeyError::Unsupported)
}
