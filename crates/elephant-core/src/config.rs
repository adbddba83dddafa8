//! TOML configuration loading.
//!
//! The global `elephant.toml` and the per-provider `<provider>.toml` both
//! come from the config directories returned by
//! [`paths::config_dirs`](crate::paths::config_dirs), first hit wins.
//! A provider must keep working when its file is absent or broken, so
//! [`load_provider`] falls back to defaults and only logs.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

use crate::paths;

/// Errors while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Global daemon configuration from `elephant.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ElephantConfig {
    /// Provider names the registry skips at startup.
    pub ignored_providers: Vec<String>,
}

/// Settings every provider config embeds via `#[serde(flatten)]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommonConfig {
    pub icon: String,
    pub name_pretty: String,
    /// Items scoring below this are not emitted (unless the query is
    /// empty).
    pub min_score: i32,
    pub hide_from_providerlist: bool,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            icon: String::new(),
            name_pretty: String::new(),
            min_score: 10,
            hide_from_providerlist: false,
        }
    }
}

/// Load the global configuration, defaulting when no file exists.
#[must_use]
pub fn load_global() -> ElephantConfig {
    match load_file("elephant") {
        Ok(Some(config)) => config,
        Ok(None) => ElephantConfig::default(),
        Err(err) => {
            warn!(error = %err, "broken elephant.toml, using defaults");
            ElephantConfig::default()
        }
    }
}

/// Load a provider's configuration, defaulting when the file is absent
/// or broken.
#[must_use]
pub fn load_provider<T>(provider: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match load_file(provider) {
        Ok(Some(config)) => config,
        Ok(None) => {
            info!(provider, "no config file, using defaults");
            T::default()
        }
        Err(err) => {
            warn!(provider, error = %err, "broken config, using defaults");
            T::default()
        }
    }
}

/// The path of `<provider>.toml` in the first config dir containing it.
#[must_use]
pub fn provider_config_path(provider: &str) -> Option<PathBuf> {
    let file = format!("{provider}.toml");

    paths::config_dirs()
        .into_iter()
        .map(|dir| dir.join(&file))
        .find(|path| path.is_file())
}

fn load_file<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: DeserializeOwned,
{
    let Some(path) = provider_config_path(name) else {
        return Ok(None);
    };

    parse_file(&path).map(Some)
}

/// Parse one TOML file into `T`.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed.
pub fn parse_file<T>(path: &Path) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct CalcConfig {
        #[serde(flatten)]
        common: CommonConfig,
        placeholder: String,
    }

    #[test]
    fn parse_file_reads_flattened_common_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calc.toml");
        std::fs::write(&path, "min_score = 30\nplaceholder = \"thinking...\"\n").unwrap();

        let config: CalcConfig = parse_file(&path).unwrap();
        assert_eq!(config.common.min_score, 30);
        assert_eq!(config.placeholder, "thinking...");
        assert!(!config.common.hide_from_providerlist);
    }

    #[test]
    fn parse_file_reports_broken_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        assert!(matches!(
            parse_file::<ElephantConfig>(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
