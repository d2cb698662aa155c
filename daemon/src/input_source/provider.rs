//! Input source queries and selection

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hud::IconRef;

/// A selectable keyboard input source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    /// Stable identifier, e.g. `com.apple.keylayout.ABC`
    pub id: String,
    /// Localized display name
    pub name: String,
    pub icon: Option<IconRef>,
}

/// Errors from the platform input source APIs
#[derive(Debug, thiserror::Error)]
pub enum InputSourceError {
    #[error("no selectable keyboard input sources")]
    NoSources,

    #[error("failed to select input source {id} (status {status})")]
    SelectFailed { id: String, status: i32 },

    #[error("input source {0} is not selectable")]
    UnknownSource(String),

    #[error("input source APIs are not available on this platform")]
    Unsupported,
}

/// Query and select keyboard input sources
pub trait InputSourceProvider {
    /// The active source; `None` when the platform cannot report it
    fn current(&self) -> Option<InputSource>;
    /// Enabled, selectable keyboard sources in system order
    fn selectable(&self) -> Vec<InputSource>;
    fn select(&self, id: &str) -> Result<(), InputSourceError>;
}

/// The source after `current_id`, wrapping to the first. Falls back to the
/// first source when `current_id` is unknown.
pub fn next_source<'a>(sources: &'a [InputSource], current_id: Option<&str>) -> Option<&'a InputSource> {
    let position = current_id.and_then(|id| sources.iter().position(|s| s.id == id));
    match position {
        Some(i) => sources.get(i + 1).or_else(|| sources.first()),
        None => sources.first(),
    }
}

/// Advance to the next selectable source
pub fn select_next<P: InputSourceProvider + ?Sized>(provider: &P) -> Result<InputSource, InputSourceError> {
    let sources = provider.selectable();
    let current = provider.current();
    let next = next_source(&sources, current.as_ref().map(|s| s.id.as_str()))
        .ok_or(InputSourceError::NoSources)?;

    debug!(
        from = current.as_ref().map(|s| s.name.as_str()).unwrap_or("<unknown>"),
        to = %next.name,
        "selecting next input source"
    );
    provider.select(&next.id)?;
    Ok(next.clone())
}

/// Suppresses repeated change notifications for the same source name
#[derive(Debug, Default)]
pub struct SourceTracker {
    current_name: Option<String>,
}

impl SourceTracker {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            current_name: initial,
        }
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    /// Record the name reported after a change notification. Returns true
    /// when it differs from the last one seen. A missing name is ignored.
    pub fn observe(&mut self, name: Option<&str>) -> bool {
        match name {
            Some(name) if self.current_name.as_deref() != Some(name) => {
                self.current_name = Some(name.to_string());
                true
            }
            _ => false,
        }
    }
}

/// Provider for platforms without input source APIs
#[derive(Debug, Default)]
pub struct NoInputSources;

impl InputSourceProvider for NoInputSources {
    fn current(&self) -> Option<InputSource> {
        None
    }

    fn selectable(&self) -> Vec<InputSource> {
        Vec::new()
    }

    fn select(&self, _id: &str) -> Result<(), InputSourceError> {
        Err(InputSourceError::Unsupported)
    }
}
