use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ROLES_FILE: &str = "roles.yml";
pub const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 5_000;

// privcheck configuration sourced from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivcheckConfig {
    pub roles_file: PathBuf,
    pub privileges_file: Option<PathBuf>,
    pub resolve_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct PrivcheckConfigOverride {
    roles_file: Option<String>,
    privileges_file: Option<String>,
    resolve_timeout_ms: Option<u64>,
}

impl Default for PrivcheckConfig {
    fn default() -> Self {
        Self {
            roles_file: PathBuf::from(DEFAULT_ROLES_FILE),
            privileges_file: None,
            resolve_timeout: Duration::from_millis(DEFAULT_RESOLVE_TIMEOUT_MS),
        }
    }
}

impl PrivcheckConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(value) = std::env::var("WARDEN_ROLES_FILE")
            && !value.trim().is_empty()
        {
            config.roles_file = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("WARDEN_PRIVILEGES_FILE")
            && !value.trim().is_empty()
        {
            config.privileges_file = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var("WARDEN_RESOLVE_TIMEOUT_MS") {
            let millis: u64 = value
                .trim()
                .parse()
                .with_context(|| "parse WARDEN_RESOLVE_TIMEOUT_MS")?;
            config.apply_timeout_ms(millis);
        }
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("WARDEN_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read WARDEN_CONFIG: {path}"))?;
            let override_cfg: PrivcheckConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse privcheck config yaml")?;
            if let Some(value) = override_cfg.roles_file {
                config.roles_file = PathBuf::from(value);
            }
            if let Some(value) = override_cfg.privileges_file {
                config.privileges_file = Some(PathBuf::from(value));
            }
            if let Some(value) = override_cfg.resolve_timeout_ms {
                config.apply_timeout_ms(value);
            }
        }
        Ok(config)
    }

    // Zero means "unset" and keeps the current value.
    fn apply_timeout_ms(&mut self, millis: u64) {
        if millis > 0 {
            self.resolve_timeout = Duration::from_millis(millis);
        }
    }
}
