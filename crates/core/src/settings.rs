use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::cpu_usage::CpuUsage;
use crate::pipeline::vision_pipeline::PipelineConfig;
use crate::pointer::dwell_click::DwellSettings;
use crate::pointer::pointer_control::PointerSettings;
use crate::shared::constants::{
    DEFAULT_TIME_WITHOUT_DETECTION_MS, SETTINGS_DIR_NAME, SETTINGS_FILE_NAME,
};
use crate::shared::orientation::{Flip, Rotation};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// User preferences persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub track_face: bool,
    pub cpu_usage: CpuUsage,
    pub rotation: Rotation,
    pub flip: Flip,
    pub time_without_detection_ms: u64,
    pub model_path: Option<PathBuf>,
    pub pointer: PointerSettings,
    pub dwell: DwellSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            track_face: true,
            cpu_usage: CpuUsage::default(),
            rotation: Rotation::default(),
            flip: Flip::default(),
            time_without_detection_ms: DEFAULT_TIME_WITHOUT_DETECTION_MS,
            model_path: None,
            pointer: PointerSettings::default(),
            dwell: DwellSettings::default(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    /// Loads from the user config directory, falling back to defaults on
    /// any error.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(SettingsError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::default()
            }
            Err(e) => {
                log::warn!("Ignoring settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn time_without_detection(&self) -> Duration {
        Duration::from_millis(self.time_without_detection_ms)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            track_face: self.track_face,
            cpu_usage: self.cpu_usage,
            time_without_detection: self.time_without_detection(),
        }
    }
}
