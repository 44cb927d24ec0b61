//! Tree Configuration
//!
//! TOML settings for position spacing, tree walks, batch behavior and logging.
//! Every field has a default, so an empty file (or no file) is valid.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::SelectionPolicy;
use crate::domain::{DeleteStrategy, PositionAllocator, MIN_POSITION_GAP, POSITION_GAP};
use crate::reorder::DEFAULT_MAX_DEPTH;

/// Upper bound for `tree.recent_window_hours` (one hundred years)
pub const MAX_RECENT_WINDOW_HOURS: i64 = 24 * 365 * 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(transparent)]
    Logger(#[from] rolling_logger::LoggerError),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub positions: PositionConfig,
    pub tree: TreeSettings,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    pub gap: f64,
    pub min_gap: f64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            gap: POSITION_GAP,
            min_gap: MIN_POSITION_GAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeSettings {
    /// Bound on ancestor walks
    pub max_depth: usize,
    /// Items updated within this many hours count as recent
    pub recent_window_hours: i64,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            recent_window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub delete_strategy: DeleteStrategy,
    pub selection_policy: SelectionPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log directory; file logging is skipped when unset
    pub dir: Option<PathBuf>,
    pub app_name: String,
    pub level: String,
    pub max_file_bytes: u64,
    pub max_files: usize,
    pub buffer_lines: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let logger = rolling_logger::LoggerConfig::default();
        Self {
            dir: None,
            app_name: "PromptTree".to_string(),
            level: "info".to_string(),
            max_file_bytes: logger.max_file_bytes,
            max_files: logger.max_files,
            buffer_lines: logger.buffer_lines,
        }
    }
}

impl LoggingConfig {
    pub fn logger_config(&self) -> Result<rolling_logger::LoggerConfig, ConfigError> {
        let level = self
            .level
            .parse::<rolling_logger::Level>()
            .map_err(|e| ConfigError::Invalid {
                field: "logging.level",
                reason: e.to_string(),
            })?;
        Ok(rolling_logger::LoggerConfig {
            max_file_bytes: self.max_file_bytes,
            max_files: self.max_files,
            buffer_lines: self.buffer_lines,
            level,
        })
    }
}

impl TreeConfig {
    /// Read and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TreeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let PositionConfig { gap, min_gap } = self.positions;
        if !(gap.is_finite() && gap > 0.0) {
            return Err(ConfigError::Invalid {
                field: "positions.gap",
                reason: format!("must be positive, got {}", gap),
            });
        }
        if !(min_gap > 0.0 && min_gap < gap) {
            return Err(ConfigError::Invalid {
                field: "positions.min_gap",
                reason: format!("must be between 0 and {}, got {}", gap, min_gap),
            });
        }
        if self.tree.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "tree.max_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        let hours = self.tree.recent_window_hours;
        if !(0..=MAX_RECENT_WINDOW_HOURS).contains(&hours) {
            return Err(ConfigError::Invalid {
                field: "tree.recent_window_hours",
                reason: format!(
                    "must be between 0 and {}, got {}",
                    MAX_RECENT_WINDOW_HOURS, hours
                ),
            });
        }
        if self.logging.max_files == 0 {
            return Err(ConfigError::Invalid {
                field: "logging.max_files",
                reason: "must be at least 1".to_string(),
            });
        }
        self.logging.logger_config()?;
        Ok(())
    }

    pub fn allocator(&self) -> PositionAllocator {
        PositionAllocator::new(self.positions.gap, self.positions.min_gap)
    }

    /// Recency window, saturating for values that skipped `validate`
    pub fn recent_window(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.tree.recent_window_hours)
            .unwrap_or(chrono::Duration::MAX)
    }
}
