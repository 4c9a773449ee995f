use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::SETTINGS_DIR_NAME;

/// File name of the bundled face classifier model.
pub const DEFAULT_MODEL_NAME: &str = "blazeface.onnx";

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("model {name} not found ({} location(s) searched)", .searched.len())]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("failed to load model {path}: {message}")]
    Session { path: PathBuf, message: String },
}

/// Locate the classifier model on disk.
///
/// Resolution order:
/// 1. Explicit path (settings or command line), used as-is. A missing
///    explicit path is an error; the other locations are not tried.
/// 2. User model directory (platform-specific)
/// 3. Bundled directory next to the host, if any
pub fn resolve(
    explicit: Option<&Path>,
    name: &str,
    bundled_dir: Option<&Path>,
) -> Result<PathBuf, ModelLoadError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(ModelLoadError::NotFound {
            name: path.display().to_string(),
            searched: vec![path.to_path_buf()],
        });
    }

    let mut searched = Vec::new();

    if let Some(dir) = model_dir() {
        let path = dir.join(name);
        if path.is_file() {
            return Ok(path);
        }
        searched.push(path);
    }

    if let Some(dir) = bundled_dir {
        let path = dir.join(name);
        if path.is_file() {
            return Ok(path);
        }
        searched.push(path);
    }

    for path in &searched {
        log::debug!("Model not at {}", path.display());
    }
    Err(ModelLoadError::NotFound {
        name: name.to_string(),
        searched,
    })
}

/// Platform-specific model directory.
///
/// - macOS: `~/Library/Application Support/HeadTrack/models/`
/// - Linux: `$XDG_DATA_HOME/HeadTrack/models/` or `~/.local/share/HeadTrack/models/`
/// - Windows: `%APPDATA%/HeadTrack/models/`
pub fn model_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(SETTINGS_DIR_NAME).join("models"))
}
