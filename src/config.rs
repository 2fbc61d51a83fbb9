//! Tracker configuration.
//!
//! Load order (later wins):
//! 1. Compiled defaults
//! 2. `--config <path>`, or `./project-a.toml` when present
//! 3. Command line flags and `PROJECT_A_*` environment variables
//!
//! ```toml
//! [remote]
//! base_url = "http://127.0.0.1:8080"
//! timeout_secs = 10
//!
//! [shell]
//! bind = "127.0.0.1:3030"
//!
//! [defaults]
//! user_id = "1"
//! module = "Module 1"
//! activity_type = "study"
//!
//! [clock]
//! tick_millis = 1000
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{ActivityType, SessionDraft};

pub const LOCAL_CONFIG_FILE: &str = "project-a.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TrackerConfig {
    pub remote: RemoteConfig,
    pub shell: ShellConfig,
    pub defaults: DraftDefaults,
    pub clock: ClockConfig,
}

/// Where the session service lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub bind: SocketAddr,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3030)),
        }
    }
}

/// Sticky draft fields seeded at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftDefaults {
    pub user_id: String,
    pub module: String,
    pub activity_type: ActivityType,
}

impl Default for DraftDefaults {
    fn default() -> Self {
        let draft = SessionDraft::default();
        Self {
            user_id: draft.user_id,
            module: draft.module,
            activity_type: draft.activity_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub tick_millis: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { tick_millis: 1000 }
    }
}

impl TrackerConfig {
    /// Load from an explicit file, or the local override if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let local = PathBuf::from(LOCAL_CONFIG_FILE);
                local.exists().then_some(local)
            }
        };

        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("remote.base_url is empty".to_string()));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "remote.timeout_secs must be positive".to_string(),
            ));
        }
        if self.clock.tick_millis == 0 {
            return Err(ConfigError::Invalid(
                "clock.tick_millis must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.clock.tick_millis)
    }

    /// Blank draft carrying the configured defaults.
    pub fn initial_draft(&self) -> SessionDraft {
        SessionDraft {
            user_id: self.defaults.user_id.clone(),
            module: self.defaults.module.clone(),
            activity_type: self.defaults.activity_type,
            ..SessionDraft::default()
        }
    }
}
