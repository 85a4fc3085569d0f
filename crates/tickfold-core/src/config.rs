//! Tickfold configuration system.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TickfoldError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { retry: RetryConfig::default() }
    }
}

impl SchedulerConfig {
    /// Load config from a TOML file, falling back to defaults if absent.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TickfoldError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| TickfoldError::Config(format!("Failed to parse config: {e}")))?;
        config.retry.validate()?;
        Ok(config)
    }
}

/// Bounds for the relocation-retry protocol.
///
/// Defaults are deliberately conservative: single-digit attempts, backoff
/// capped at a few ticks. All three knobs are configurable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Re-submission attempts allowed after the initial one is rejected.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff before the first re-resolution, in ticks.
    #[serde(default = "default_initial_backoff_ticks")]
    pub initial_backoff_ticks: u64,
    /// Ceiling for the doubling backoff, in ticks.
    #[serde(default = "default_max_backoff_ticks")]
    pub max_backoff_ticks: u64,
}

fn default_max_attempts() -> u32 { 5 }
fn default_initial_backoff_ticks() -> u64 { 1 }
fn default_max_backoff_ticks() -> u64 { 8 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ticks: default_initial_backoff_ticks(),
            max_backoff_ticks: default_max_backoff_ticks(),
        }
    }
}

impl RetryConfig {
    /// Reject configurations that would busy-spin or never retry backoff.
    pub fn validate(&self) -> Result<()> {
        if self.initial_backoff_ticks == 0 {
            return Err(TickfoldError::Config(
                "retry.initial_backoff_ticks must be >= 1".into(),
            ));
        }
        if self.max_backoff_ticks < self.initial_backoff_ticks {
            return Err(TickfoldError::Config(
                "retry.max_backoff_ticks must be >= retry.initial_backoff_ticks".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.initial_backoff_ticks, 1);
        assert_eq!(cfg.retry.max_backoff_ticks, 8);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: SchedulerConfig = toml::from_str("[retry]\nmax_attempts = 3\n").unwrap();
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.max_backoff_ticks, 8);
    }

    #[test]
    fn test_validate_rejects_zero_backoff() {
        let retry = RetryConfig { initial_backoff_ticks: 0, ..RetryConfig::default() };
        assert!(retry.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let cfg = SchedulerConfig::load(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(cfg.retry.max_attempts, 5);
    }
}
