//! Configuration for RRAID.
//!
//! Settings are layered with figment: built-in defaults, then the config file
//! (TOML or YAML, picked by extension), then `RRAID_*` environment variables,
//! then command-line overrides. A loaded `AppConfig` is an immutable snapshot;
//! changes produce a new value which is persisted through [`ConfigProvider::save`].

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "rraid.toml";
const ENV_PREFIX: &str = "RRAID_";

const DEFAULT_MINIMUM_AGE_HOURS: f64 = 12.0;
const DEFAULT_RUN_INTERVAL_MINUTES: f64 = 10.0;
const DEFAULT_CONSOLE_CLEAR_INTERVAL_HOURS: f64 = 6.0;
const MIN_RUN_INTERVAL_MINUTES: f64 = 1.0;

/// Every key a complete config file carries. Missing ones are filled in and persisted.
const KNOWN_KEYS: [&str; 8] = [
    "source_paths",
    "destination_path",
    "minimum_age_hours",
    "run_interval_minutes",
    "console_clear_interval_hours",
    "notification_target",
    "notification_channel",
    "cross_device_copy",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannelType {
    #[default]
    Discord,
    Slack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directories drained each cycle, in priority order.
    pub source_paths: Vec<PathBuf>,
    pub destination_path: PathBuf,
    pub minimum_age_hours: f64,
    pub run_interval_minutes: f64,
    /// 0 disables console clearing.
    pub console_clear_interval_hours: f64,
    /// Webhook URL. Absent disables notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_target: Option<String>,
    pub notification_channel: NotificationChannelType,
    /// Fall back to copy + remove when a rename crosses filesystems.
    pub cross_device_copy: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_paths: Vec::new(),
            destination_path: PathBuf::new(),
            minimum_age_hours: DEFAULT_MINIMUM_AGE_HOURS,
            run_interval_minutes: DEFAULT_RUN_INTERVAL_MINUTES,
            console_clear_interval_hours: DEFAULT_CONSOLE_CLEAR_INTERVAL_HOURS,
            notification_target: None,
            notification_channel: NotificationChannelType::default(),
            cross_device_copy: true,
        }
    }
}

impl AppConfig {
    /// Clamp numeric fields into their valid ranges and drop a blank notification target.
    ///
    /// Positive infinity falls back to the default.
    pub fn normalized(mut self) -> Self {
        self.minimum_age_hours =
            clamp_finite(self.minimum_age_hours, 0.0, DEFAULT_MINIMUM_AGE_HOURS);
        self.run_interval_minutes = clamp_finite(
            self.run_interval_minutes,
            MIN_RUN_INTERVAL_MINUTES,
            DEFAULT_RUN_INTERVAL_MINUTES,
        );
        self.console_clear_interval_hours = clamp_finite(
            self.console_clear_interval_hours,
            0.0,
            DEFAULT_CONSOLE_CLEAR_INTERVAL_HOURS,
        );
        if self
            .notification_target
            .as_deref()
            .is_some_and(|t| t.trim().is_empty())
        {
            self.notification_target = None;
        }
        self
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notification_target.is_some()
    }

    /// True when a source slot or the destination is still blank.
    pub fn has_missing_paths(&self) -> bool {
        self.source_paths.is_empty()
            || self.source_paths.iter().any(|p| p.as_os_str().is_empty())
            || self.destination_path.as_os_str().is_empty()
    }
}

fn clamp_finite(value: f64, floor: f64, fallback: f64) -> f64 {
    if value == f64::INFINITY {
        fallback
    } else if value >= floor {
        value
    } else {
        // NaN lands here too
        floor
    }
}

/// Values supplied on the command line. `None` fields leave the lower layers untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_age_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_interval_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console_clear_interval_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_channel: Option<NotificationChannelType>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] Box<figment::Error>),
    #[error("failed to serialize configuration: {0}")]
    Serialize(String),
    #[error("failed to write configuration file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of configuration snapshots, re-read before every cycle.
pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<AppConfig, ConfigError>;
    fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Yaml,
}

impl FileFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
                Self::Yaml
            }
            _ => Self::Toml,
        }
    }
}

/// Config file on disk, layered with environment variables and CLI overrides.
pub struct FileConfigProvider {
    path: PathBuf,
    format: FileFormat,
    overrides: ConfigOverrides,
    use_env: bool,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            format: FileFormat::for_path(&path),
            path,
            overrides: ConfigOverrides::default(),
            use_env: true,
        }
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Ignore `RRAID_*` variables. Used by tests so the host environment can't leak in.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_layer(&self) -> Figment {
        match self.format {
            FileFormat::Toml => Figment::from(Toml::file(&self.path)),
            FileFormat::Yaml => Figment::from(Yaml::file(&self.path)),
        }
    }

    fn layered(&self, file: Figment) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(file);
        if self.use_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX));
        }
        figment.merge(Serialized::defaults(&self.overrides))
    }

    /// Defaults plus the file alone, without the env and override layers.
    fn stored(&self) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(self.file_layer())
            .extract()
            .map_err(Box::new)?;
        Ok(config.normalized())
    }

    /// Persist the fields that differ between `before` and `after` on top of
    /// what the file holds, so env and command-line values never reach disk.
    pub fn save_changes(&self, before: &AppConfig, after: &AppConfig) -> Result<(), ConfigError> {
        let mut stored = self.stored()?;

        if after.source_paths != before.source_paths {
            stored.source_paths = after.source_paths.clone();
        }
        if after.destination_path != before.destination_path {
            stored.destination_path = after.destination_path.clone();
        }
        if after.minimum_age_hours != before.minimum_age_hours {
            stored.minimum_age_hours = after.minimum_age_hours;
        }
        if after.run_interval_minutes != before.run_interval_minutes {
            stored.run_interval_minutes = after.run_interval_minutes;
        }
        if after.console_clear_interval_hours != before.console_clear_interval_hours {
            stored.console_clear_interval_hours = after.console_clear_interval_hours;
        }
        if after.notification_target != before.notification_target {
            stored.notification_target = after.notification_target.clone();
        }
        if after.notification_channel != before.notification_channel {
            stored.notification_channel = after.notification_channel;
        }
        if after.cross_device_copy != before.cross_device_copy {
            stored.cross_device_copy = after.cross_device_copy;
        }

        self.save(&stored)
    }

    fn extract(&self, file: Figment) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = self.layered(file).extract().map_err(Box::new)?;
        Ok(config.normalized())
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "Config file not found, creating one with defaults");
            self.save(&AppConfig::default())?;
            return self.extract(Figment::new());
        }

        let file = self.file_layer();

        // A malformed file must error out, not look like one with missing keys and get reset.
        file.extract::<figment::value::Dict>().map_err(Box::new)?;

        if !file.contains("source_paths") || !file.contains("destination_path") {
            warn!(
                path = %self.path.display(),
                "Config file is missing source_paths or destination_path, resetting to defaults"
            );
            self.save(&AppConfig::default())?;
            return self.extract(Figment::new());
        }

        let missing: Vec<&str> = KNOWN_KEYS
            .iter()
            .copied()
            .filter(|key| *key != "notification_target" && !file.contains(key))
            .collect();

        if missing.is_empty() {
            return self.extract(file);
        }

        info!(keys = ?missing, "Filling in missing config keys with defaults");
        self.save(&self.stored()?)?;
        self.extract(file)
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let content = match self.format {
            FileFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            FileFormat::Yaml => {
                serde_yaml::to_string(config).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
        };

        std::fs::write(&self.path, content).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Warn about configured paths that are not directories. Never fatal.
pub fn validate_paths(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    for (i, path) in config.source_paths.iter().enumerate() {
        if !path.is_dir() {
            warnings.push(format!(
                "Source {} ({}) does not exist or is not a directory",
                i + 1,
                path.display()
            ));
        }
    }

    if !config.destination_path.is_dir() {
        warnings.push(format!(
            "Destination ({}) does not exist or is not a directory",
            config.destination_path.display()
        ));
    }

    warnings
}
