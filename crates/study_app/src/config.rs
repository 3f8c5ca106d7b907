use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use study_core::PollPolicy;
use study_engine::{AuthPolicy, ClientSettings};
use study_logging::LogDestination;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "study.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub target: LogTarget,
    pub file: PathBuf,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            target: LogTarget::Terminal,
            file: PathBuf::from("study.log"),
            level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        let policy = PollPolicy::default();
        Self {
            base_delay_ms: millis(policy.base_delay),
            multiplier: policy.multiplier,
            max_delay_ms: millis(policy.max_delay),
            max_attempts: policy.max_attempts,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Settings read from `study.ron`; command-line flags override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub store_path: PathBuf,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Refuse to send requests when no token is configured.
    pub require_sign_in: bool,
    pub poll: PollConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            api_url: client.base_url,
            token: None,
            store_path: PathBuf::from(".study_store.ron"),
            connect_timeout_secs: client.connect_timeout.as_secs(),
            request_timeout_secs: client.request_timeout.as_secs(),
            require_sign_in: false,
            poll: PollConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config at `path`. A missing file yields defaults unless the
    /// caller named the file explicitly.
    pub fn load(path: &Path, explicit: bool) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_url is empty".to_string()));
        }
        if !self.poll.multiplier.is_finite() || self.poll.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "poll.multiplier must be at least 1.0, got {}",
                self.poll.multiplier
            )));
        }
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "poll.max_attempts must be positive".to_string(),
            ));
        }
        if self.poll.base_delay_ms > self.poll.max_delay_ms {
            return Err(ConfigError::Invalid(
                "poll.base_delay_ms exceeds poll.max_delay_ms".to_string(),
            ));
        }
        self.log_level().map(|_| ())
    }

    pub fn log_level(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(self.log.level.trim())
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.log.level)))
    }

    pub fn log_destination(&self) -> LogDestination {
        match self.log.target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File(self.log.file.clone()),
            LogTarget::Both => LogDestination::Both(self.log.file.clone()),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            base_delay: Duration::from_millis(self.poll.base_delay_ms),
            multiplier: self.poll.multiplier,
            max_delay: Duration::from_millis(self.poll.max_delay_ms),
            max_attempts: self.poll.max_attempts,
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.api_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            auth_policy: if self.require_sign_in {
                AuthPolicy::Block
            } else {
                AuthPolicy::SendAnonymous
            },
        }
    }
}
