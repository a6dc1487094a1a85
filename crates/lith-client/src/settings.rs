//! Persistent connection settings, stored as JSON in the platform config
//! directory.

use std::path::{Path, PathBuf};

use lith_proto::constants::DEFAULT_RELAY_PORT;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

const SETTINGS_FILE: &str = "settings.json";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Could not determine configuration directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub encrypted: bool,
    pub passphrase: String,
    /// Links at least this long are shown in summarised form.
    pub shorten_long_urls_threshold: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_RELAY_PORT,
            encrypted: true,
            passphrase: String::new(),
            shorten_long_urls_threshold: 50,
        }
    }
}

impl Settings {
    /// Assign one setting from text, by its JSON name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "host" => self.host = value.to_string(),
            "port" => self.port = value.parse().map_err(|_| invalid())?,
            "encrypted" => self.encrypted = value.parse().map_err(|_| invalid())?,
            "passphrase" => self.passphrase = value.to_string(),
            "shortenLongUrlsThreshold" => {
                self.shorten_long_urls_threshold = value.parse().map_err(|_| invalid())?
            }
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

/// Settings bound to the file they were read from.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        let dirs = directories::ProjectDirs::from("org", "lith", "lith")
            .ok_or(SettingsError::NoConfigDir)?;
        Ok(dirs.config_dir().join(SETTINGS_FILE))
    }

    pub fn open_default() -> Result<Self, SettingsError> {
        Self::open(Self::default_path()?)
    }

    /// Read settings from `path`; a missing file yields the defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let settings = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            serde_json::from_str(&json)?
        } else {
            debug!(path = %path.display(), "No settings file, using defaults");
            Settings::default()
        };
        Ok(Self { path, settings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Modify the settings and write them back if anything changed.
    pub fn update(&mut self, edit: impl FnOnce(&mut Settings)) -> Result<bool, SettingsError> {
        let mut next = self.settings.clone();
        edit(&mut next);
        if next == self.settings {
            return Ok(false);
        }
        self.settings = next;
        self.save()?;
        Ok(true)
    }

    /// [`Settings::set`] followed by a save when the value changed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool, SettingsError> {
        let mut next = self.settings.clone();
        next.set(key, value)?;
        self.update(|settings| *settings = next)
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&self.path, json)?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}
