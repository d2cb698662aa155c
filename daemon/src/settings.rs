//! Persisted user preferences
//!
//! Stored as JSON in the data directory. A missing file yields defaults; a
//! corrupt one is logged and replaced by defaults on the next save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::hotkey::{KeyMap, SwitchKey};
use crate::hud::{Appearance, Preferences, DEFAULT_DISPLAY_DURATION};

/// Lowest opacity a source may be given
pub const MIN_SOURCE_ALPHA: f64 = 0.1;

/// Per-source colour override. Unset components use the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceColor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub switch_key: SwitchKey,
    /// Seconds the HUD stays fully visible
    pub hud_display_duration: f64,
    pub input_source_colors: BTreeMap<String, SourceColor>,
    /// Every source name seen so far, in discovery order
    pub known_input_sources: Vec<String>,
    pub key_codes: KeyMap,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            switch_key: SwitchKey::default(),
            hud_display_duration: DEFAULT_DISPLAY_DURATION.as_secs_f64(),
            input_source_colors: BTreeMap::new(),
            known_input_sources: Vec::new(),
            key_codes: KeyMap::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Settings plus the file they persist to
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    settings: Settings,
}

impl SettingsStore {
    /// Load from `path`, falling back to defaults
    pub fn load(path: &Path) -> Self {
        let settings = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(?path, error = %e, "settings file is invalid, using defaults");
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "no settings file, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(?path, error = %e, "failed to read settings, using defaults");
                Settings::default()
            }
        };

        Self {
            path: Some(path.to_owned()),
            settings,
        }
    }

    /// Settings that are never written to disk
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let text = serde_json::to_string_pretty(&self.settings)?;
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, text)
        };
        write().map_err(|source| SettingsError::Write {
            path: path.clone(),
            source,
        })?;

        debug!(?path, "settings saved");
        Ok(())
    }

    /// Apply a change and persist it. A failed save rolls the change back.
    fn update(&mut self, apply: impl FnOnce(&mut Settings)) -> Result<(), SettingsError> {
        let previous = self.settings.clone();
        apply(&mut self.settings);
        if let Err(e) = self.save() {
            self.settings = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn set_switch_key(&mut self, key: SwitchKey) -> Result<(), SettingsError> {
        self.update(|settings| settings.switch_key = key)
    }

    pub fn set_display_duration(&mut self, seconds: f64) -> Result<(), SettingsError> {
        self.update(|settings| settings.hud_display_duration = seconds)
    }

    /// Remember a source name. Returns whether it was new.
    pub fn record_input_source(&mut self, name: &str) -> Result<bool, SettingsError> {
        if self.settings.known_input_sources.iter().any(|n| n == name) {
            return Ok(false);
        }
        self.update(|settings| settings.known_input_sources.push(name.to_string()))?;
        Ok(true)
    }

    pub fn set_color(&mut self, name: &str, red: f64, green: f64, blue: f64) -> Result<(), SettingsError> {
        self.update(|settings| {
            let entry = entry(settings, name);
            entry.r = Some(red.clamp(0.0, 1.0));
            entry.g = Some(green.clamp(0.0, 1.0));
            entry.b = Some(blue.clamp(0.0, 1.0));
        })
    }

    /// Set the panel opacity for a source, clamped to `[0.1, 1.0]`
    pub fn set_alpha(&mut self, name: &str, alpha: f64) -> Result<(), SettingsError> {
        self.update(|settings| entry(settings, name).a = Some(alpha.clamp(MIN_SOURCE_ALPHA, 1.0)))
    }
}

/// Existing colour entry, or a new one filled with the defaults
fn entry<'a>(settings: &'a mut Settings, name: &str) -> &'a mut SourceColor {
    settings
        .input_source_colors
        .entry(name.to_string())
        .or_insert_with(|| {
            let defaults = Appearance::default();
            SourceColor {
                r: Some(defaults.red),
                g: Some(defaults.green),
                b: Some(defaults.blue),
                a: Some(defaults.alpha),
            }
        })
}

impl Preferences for SettingsStore {
    fn appearance(&self, source: &str) -> Appearance {
        let defaults = Appearance::default();
        match self.settings.input_source_colors.get(source) {
            Some(color) => Appearance {
                red: color.r.unwrap_or(defaults.red),
                green: color.g.unwrap_or(defaults.green),
                blue: color.b.unwrap_or(defaults.blue),
                alpha: color.a.unwrap_or(defaults.alpha),
            },
            None => defaults,
        }
    }

    fn hold_duration_secs(&self) -> f64 {
        self.settings.hud_display_duration
    }
}
