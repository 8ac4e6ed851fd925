pub mod types;

use crate::error::{ConfigError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub use types::{AUTO_NAMESPACE, CacheConfig, ClusterConfig, Config, DiscoveryConfig};

const CONFIG_FILE_NAME: &str = ".mimir-discovery.toml";

/// Get the global config file path (~/.mimir-discovery.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Get the local config file path (./.mimir-discovery.toml)
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Load configuration.
///
/// An explicit path must exist and parse. Without one, the local file in
/// `search_dir` is tried first, then the global file, then defaults.
pub fn load_config(explicit: Option<&Path>, search_dir: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    if let Some(dir) = search_dir {
        let local = local_config_path(dir);
        if local.exists() {
            log::debug!("Loading config from {}", local.display());
            return read_config(&local);
        }
    }

    if let Some(global) = global_config_path()
        && global.exists()
    {
        log::debug!("Loading config from {}", global.display());
        return read_config(&global);
    }

    log::debug!("No config file found, using defaults");
    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    Ok(config)
}
