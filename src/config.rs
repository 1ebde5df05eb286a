// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in the platform config directory:
//! - Linux: ~/.config/livecast/config.json
//! - macOS: ~/Library/Application Support/livecast/config.json
//! - Windows: %APPDATA%\livecast\config.json

use crate::backends::capture::{ConstraintCascade, ConstraintTier, cascade};
use crate::constants::{self, capture, directory, session, timing};
use crate::errors::AppResult;
use crate::session::Enablement;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture video when a session starts
    pub start_with_video: bool,
    /// Capture audio when a session starts
    pub start_with_audio: bool,
    /// Settle delay before reacquiring video after it is turned back on
    pub toggle_debounce_ms: u64,
    /// Settle delay before the automatic reacquire
    pub recovery_settle_ms: u64,
    /// Video narrower or shorter than this triggers automatic recovery
    pub min_video_dimension: u32,
    /// Post the system greetings when going live
    pub greet_on_go_live: bool,
    /// Streamer display name
    pub operator: String,
    /// Default number of streams listed from the directory
    pub directory_limit: usize,
    /// Constraint tiers, tried by ascending priority
    pub cascade: Vec<ConstraintTier>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_with_video: true,
            start_with_audio: true,
            toggle_debounce_ms: timing::TOGGLE_DEBOUNCE.as_millis() as u64,
            recovery_settle_ms: timing::RECOVERY_SETTLE.as_millis() as u64,
            min_video_dimension: capture::MIN_VIDEO_DIMENSION,
            greet_on_go_live: true,
            operator: session::DEFAULT_OPERATOR.to_string(),
            directory_limit: directory::DEFAULT_LIST_LIMIT,
            cascade: cascade::standard_tiers(),
        }
    }
}

impl Config {
    /// Path of the config file, if the platform has a config directory
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(constants::APP_ID).join(constants::CONFIG_FILE_NAME))
    }

    /// Load the user config, falling back to defaults on any problem
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            warn!("Could not determine config path, using defaults");
            return Self::default();
        };

        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write as pretty JSON, creating the parent directory if needed
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn intent(&self) -> Enablement {
        Enablement {
            video: self.start_with_video,
            audio: self.start_with_audio,
        }
    }

    pub fn toggle_debounce(&self) -> Duration {
        Duration::from_millis(self.toggle_debounce_ms)
    }

    pub fn recovery_settle(&self) -> Duration {
        Duration::from_millis(self.recovery_settle_ms)
    }

    /// Effective cascade; an empty tier list falls back to the standard one
    pub fn cascade(&self) -> ConstraintCascade {
        if self.cascade.is_empty() {
            warn!("Configured cascade is empty, using the standard tiers");
            return ConstraintCascade::standard();
        }
        ConstraintCascade::new(self.cascade.clone())
    }
}
