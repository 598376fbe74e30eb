use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::model::config::EngineConfig;
use crate::model::container::BoardData;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "boardflow.toml";

/// Error type for config and board file I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    ConfigParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not parse board {path}: {source}")]
    BoardParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not serialize board: {0}")]
    BoardSerializeError(#[from] serde_json::Error),
}

/// Read the engine config. An explicit path must exist; without one,
/// `boardflow.toml` in `dir` is used if present, else the defaults.
pub fn read_config(explicit: Option<&Path>, dir: &Path) -> Result<EngineConfig, ConfigError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let candidate = dir.join(CONFIG_FILE);
            if !candidate.exists() {
                return Ok(EngineConfig::default());
            }
            candidate
        }
    };
    let text = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::ConfigParseError { path, source: e })
}

/// Load a board image (`{"columns": [...], "tasks": [...]}`) from a JSON file
pub fn read_board(path: &Path) -> Result<BoardData, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| ConfigError::BoardParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write a board image back, pretty-printed, replacing the file atomically
pub fn write_board(path: &Path, board: &BoardData) -> Result<(), ConfigError> {
    let mut json = serde_json::to_string_pretty(board)?;
    json.push('\n');
    atomic_write(path, json.as_bytes()).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write `content` to `path` atomically using a temp file + rename.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
