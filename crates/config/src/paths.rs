//! Configuration file discovery

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{ConfigError, Result};

/// Default profile document name
pub const CONFIG_FILE_NAME: &str = ".agent-engine.yml";

/// Find `file_name` in the working directory, then in the home directory
pub fn find_config_file(file_name: &str) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let home = dirs::home_dir();
    find_config_file_in(file_name, &cwd, home.as_deref())
}

/// Discovery against explicit search roots
pub fn find_config_file_in(file_name: &str, cwd: &Path, home: Option<&Path>) -> Result<PathBuf> {
    let candidates = std::iter::once(cwd).chain(home);
    for dir in candidates {
        let path = dir.join(file_name);
        debug!("◆ Looking for configuration at {:?}", path);
        if path.is_file() {
            return Ok(path);
        }
    }
    Err(ConfigError::NotDiscovered(file_name.to_string()))
}

/// Use `explicit` when given, otherwise discover the default file
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(ConfigError::FileNotFound(path.to_path_buf())),
        None => find_config_file(CONFIG_FILE_NAME),
    }
}
