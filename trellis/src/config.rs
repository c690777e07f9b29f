//! Process-wide configuration, read once at startup from `trellis.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trace::Severity;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "trellis.toml";

/// Environment variable holding the process-wide default attempt budget.
pub const RETRY_ENV: &str = "TRELLIS_RETRY";

/// Upper bound on any attempt budget.
pub const MAX_ATTEMPT_BUDGET: u32 = 100;

/// Configuration (TOML). Missing fields take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrellisConfig {
    /// Default attempt budget when neither `--retry` nor `TRELLIS_RETRY` is set.
    pub retry: u32,

    pub log: LogConfig,
}

/// How the trace is presented on stderr.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Lowest severity shown when `RUST_LOG` is unset.
    pub verbosity: Severity,
    pub timestamps: bool,
    /// Colour by severity; ignored when stderr is not a terminal.
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            verbosity: Severity::Info,
            timestamps: false,
            color: true,
        }
    }
}

impl TrellisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.retry > MAX_ATTEMPT_BUDGET {
            return Err(anyhow!(
                "retry must be <= {MAX_ATTEMPT_BUDGET} (got {})",
                self.retry
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TrellisConfig::default()`.
pub fn load_config(path: &Path) -> Result<TrellisConfig> {
    if !path.exists() {
        return Ok(TrellisConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TrellisConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BudgetError {
    #[error("TRELLIS_RETRY={value:?} is not a non-negative integer")]
    InvalidEnv { value: String },
    #[error("attempt budget {budget} exceeds the maximum of {max}")]
    TooLarge { budget: u32, max: u32 },
}

/// Resolve the attempt budget: explicit override, then the environment
/// value, then the configured default.
pub fn resolve_attempt_budget(
    override_budget: Option<u32>,
    env_value: Option<&str>,
    cfg: &TrellisConfig,
) -> Result<u32, BudgetError> {
    let env_budget = match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => Some(raw.parse::<u32>().map_err(|_| BudgetError::InvalidEnv {
            value: raw.to_string(),
        })?),
        None => None,
    };
    let budget = override_budget.or(env_budget).unwrap_or(cfg.retry);
    if budget > MAX_ATTEMPT_BUDGET {
        return Err(BudgetError::TooLarge {
            budget,
            max: MAX_ATTEMPT_BUDGET,
        });
    }
    Ok(budget)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, TrellisConfig::default());
        assert_eq!(cfg.retry, 0);
        assert!(cfg.log.color);
    }

    #[test]
    fn load_partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("trellis.toml");
        fs::write(&path, "retry = 2\n\n[log]\nverbosity = \"debug\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.retry, 2);
        assert_eq!(cfg.log.verbosity, Severity::Debug);
        assert!(!cfg.log.timestamps);
    }

    #[test]
    fn load_rejects_oversized_retry() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("trellis.toml");
        fs::write(&path, "retry = 1000\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("retry must be <= 100"));
    }

    #[test]
    fn budget_prefers_override_then_env_then_config() {
        let cfg = TrellisConfig {
            retry: 1,
            ..TrellisConfig::default()
        };
        assert_eq!(resolve_attempt_budget(Some(5), Some("3"), &cfg), Ok(5));
        assert_eq!(resolve_attempt_budget(None, Some("3"), &cfg), Ok(3));
        assert_eq!(resolve_attempt_budget(None, Some("  "), &cfg), Ok(1));
        assert_eq!(resolve_attempt_budget(None, None, &cfg), Ok(1));
    }

    #[test]
    fn budget_rejects_bad_env_and_oversized_values() {
        let cfg = TrellisConfig::default();
        assert_eq!(
            resolve_attempt_budget(None, Some("many"), &cfg),
            Err(BudgetError::InvalidEnv {
                value: "many".to_string()
            })
        );
        assert!(matches!(
            resolve_attempt_budget(Some(101), None, &cfg),
            Err(BudgetError::TooLarge { budget: 101, .. })
        ));
    }
}
