//! Application-level configuration loading, including poll and chat limits.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVE_POLL_BACK_CONFIG_PATH";

const DEFAULT_MAX_OPTIONS: usize = 12;
const DEFAULT_MAX_DURATION_SECS: u32 = 3_600;
const DEFAULT_CHAT_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    max_options: usize,
    max_duration_secs: u32,
    chat_history_limit: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        max_options = app_config.max_options,
                        max_duration_secs = app_config.max_duration_secs,
                        "loaded poll limits from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Maximum number of options a poll may carry.
    pub fn max_options(&self) -> usize {
        self.max_options
    }

    /// Maximum accepted poll duration in seconds.
    pub fn max_duration_secs(&self) -> u32 {
        self.max_duration_secs
    }

    /// Number of chat messages retained for replay to late joiners.
    pub fn chat_history_limit(&self) -> usize {
        self.chat_history_limit
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_options: DEFAULT_MAX_OPTIONS,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            chat_history_limit: DEFAULT_CHAT_HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    max_options: Option<usize>,
    max_duration_secs: Option<u32>,
    chat_history_limit: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            max_options: value.max_options.unwrap_or(DEFAULT_MAX_OPTIONS),
            max_duration_secs: value.max_duration_secs.unwrap_or(DEFAULT_MAX_DURATION_SECS),
            chat_history_limit: value
                .chat_history_limit
                .unwrap_or(DEFAULT_CHAT_HISTORY_LIMIT),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
