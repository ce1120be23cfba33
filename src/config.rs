// src/config.rs

//! Configuration and registry loading utilities.
//!
//! This module provides convenience functions for loading the config
//! file and the board registry from a storage directory.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{BoardRegistry, Config};

/// Path of the config file inside a storage directory.
pub fn config_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join("config.toml")
}

/// Path of the board registry inside a storage directory.
pub fn registry_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join("boards.json")
}

/// Load configuration from the storage directory, falling back to
/// defaults when the file is absent or unreadable.
pub fn load_config(storage_dir: &Path) -> Config {
    Config::load_or_default(config_path(storage_dir))
}

/// Load and validate the board registry.
pub fn load_registry(storage_dir: &Path) -> Result<BoardRegistry> {
    let path = registry_path(storage_dir);
    if !path.exists() {
        return Err(AppError::config(format!(
            "Board registry not found at {}",
            path.display()
        )));
    }
    BoardRegistry::load(&path)
}

/// Load and validate both config and registry.
pub fn load_all(storage_dir: &Path) -> Result<(Config, BoardRegistry)> {
    let config = load_config(storage_dir);
    config.validate()?;
    let registry = load_registry(storage_dir)?;
    Ok((config, registry))
}
