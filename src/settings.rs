//! Runtime configuration.
//!
//! Values come from the process environment (a `.env` file is loaded by the
//! binary before this runs) and may be overridden by command-line flags.

use crate::contexts::DEFAULT_EXCLUDED_DIRS;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_SERVICE_URL: &str = "REFACTOR_STUDIO_SERVICE_URL";
pub const ENV_TIMEOUT_SECS: &str = "REFACTOR_STUDIO_TIMEOUT_SECS";
pub const ENV_WORKSPACE: &str = "REFACTOR_STUDIO_WORKSPACE";
pub const ENV_SCRATCH_DIR: &str = "REFACTOR_STUDIO_SCRATCH_DIR";
pub const ENV_FENCE_LANGUAGE: &str = "REFACTOR_STUDIO_FENCE_LANGUAGE";
pub const ENV_SNAPSHOT_STARTER: &str = "REFACTOR_STUDIO_SNAPSHOT_STARTER";
pub const ENV_EXCLUDED_DIRS: &str = "REFACTOR_STUDIO_EXCLUDED_DIRS";

const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";
/// Generation can take many minutes on a local model.
const DEFAULT_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_FENCE_LANGUAGE: &str = "java";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{key} must be {expected}, got '{value}'")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root URL of the exercise backend
    pub service_url: String,
    /// Ceiling for each generate or review call
    pub request_timeout: Duration,
    /// Folder opened in the editor; the project root is searched from here
    pub workspace_root: PathBuf,
    /// Where extracted reference solutions are written for display
    pub scratch_dir: PathBuf,
    /// Fence tag marking code in model output
    pub fence_language: String,
    /// Whether main files are also copied under `starter/`
    pub snapshot_starter: bool,
    /// Directory names the project search never enters
    pub excluded_dirs: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            workspace_root: PathBuf::from("."),
            scratch_dir: std::env::temp_dir().join("refactor-studio"),
            fence_language: DEFAULT_FENCE_LANGUAGE.to_string(),
            snapshot_starter: true,
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; unset or blank keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(url) = get(ENV_SERVICE_URL) {
            settings.service_url = url.trim().to_string();
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(SettingsError::InvalidValue {
                    key: ENV_TIMEOUT_SECS,
                    value: raw.clone(),
                    expected: "a positive number of seconds",
                })?;
            settings.request_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = get(ENV_WORKSPACE) {
            settings.workspace_root = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_SCRATCH_DIR) {
            settings.scratch_dir = PathBuf::from(dir);
        }
        if let Some(language) = get(ENV_FENCE_LANGUAGE) {
            settings.fence_language = language.trim().to_string();
        }
        if let Some(raw) = get(ENV_SNAPSHOT_STARTER) {
            settings.snapshot_starter = parse_flag(&raw).ok_or(SettingsError::InvalidValue {
                key: ENV_SNAPSHOT_STARTER,
                value: raw.clone(),
                expected: "true or false",
            })?;
        }
        if let Some(raw) = get(ENV_EXCLUDED_DIRS) {
            settings.excluded_dirs = raw
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(settings)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
