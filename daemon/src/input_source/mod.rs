//! Keyboard input sources
//!
//! Provides the query/select capability behind the switch gesture and the
//! change notifications that trigger the HUD.

#[cfg(target_os = "macos")]
mod macos;
mod provider;

#[cfg(test)]
pub(crate) use provider::fake;
pub use provider::{select_next, InputSourceProvider, SourceTracker};

#[cfg(target_os = "macos")]
pub use macos::{SourceObserver, TisInputSources as SystemInputSources};
#[cfg(not(target_os = "macos"))]
pub use provider::NoInputSources as SystemInputSources;

/// System notification about input sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceNotification {
    /// The selected keyboard source changed
    SelectedChanged,
    /// The list of enabled sources changed
    EnabledChanged,
}
