use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "pantry.toml";
pub const DB_FILE: &str = "pantry.sqlite";
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Optional `pantry.toml` in the pantry home. Relative paths are resolved
/// against the home directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub db_path: Option<PathBuf>,
    pub dataset_path: Option<PathBuf>,
    pub lock_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub home: PathBuf,
    pub db_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub dataset_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub dataset_path: Option<PathBuf>,
    pub lock_timeout: Duration,
    pub log_level: Option<LevelFilter>,
    pub config_path: Option<PathBuf>,
}

impl Settings {
    pub fn for_home(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            db_path: home.join(DB_FILE),
            dataset_path: None,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            log_level: None,
            config_path: None,
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        crate::locks::registry_lock_path(&self.home)
    }

    /// Command-line values beat the config file, which beats the defaults.
    pub fn resolve(overrides: &Overrides) -> Result<Self, ConfigError> {
        let home = overrides.home.clone();
        let (file, config_path) = match &overrides.config_path {
            Some(path) => (FileConfig::load(path)?, Some(path.clone())),
            None => {
                let implicit = home.join(CONFIG_FILE);
                if implicit.exists() {
                    (FileConfig::load(&implicit)?, Some(implicit))
                } else {
                    (FileConfig::default(), None)
                }
            }
        };

        let mut settings = Self::for_home(&home);
        settings.config_path = config_path;
        if let Some(path) = file.db_path {
            settings.db_path = home.join(path);
        }
        if let Some(path) = file.dataset_path {
            settings.dataset_path = Some(home.join(path));
        }
        if let Some(ms) = file.lock_timeout_ms {
            settings.lock_timeout = Duration::from_millis(ms);
        }
        if let Some(level) = file.log_level.as_deref() {
            settings.log_level = Some(parse_level(level)?);
        }

        if let Some(path) = &overrides.db_path {
            settings.db_path = path.clone();
        }
        if let Some(path) = &overrides.dataset_path {
            settings.dataset_path = Some(path.clone());
        }
        Ok(settings)
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        Self::from_toml(&raw).map_err(|err| match err {
            ConfigError::Toml { error, .. } => ConfigError::Toml {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|error| ConfigError::Toml {
            path: PathBuf::from("<inline>"),
            error,
        })
    }
}

pub fn parse_level(raw: &str) -> Result<LevelFilter, ConfigError> {
    LevelFilter::from_str(raw.trim()).map_err(|_| ConfigError::InvalidLogLevel(raw.to_string()))
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: PathBuf,
        error: toml::de::Error,
    },
    InvalidLogLevel(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "unable to read config {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, error } => {
                write!(f, "invalid config {}: {}", path.display(), error)
            }
            ConfigError::InvalidLogLevel(value) => write!(
                f,
                "invalid log_level '{}', expected off, error, warn, info, debug or trace",
                value
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { error, .. } => Some(error),
            ConfigError::InvalidLogLevel(_) => None,
        }
    }
}
