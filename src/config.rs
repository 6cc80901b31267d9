use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use validator::Validate;

use crate::forecast::{BootstrapSettings, StrategyKind};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub forecast: ForecastConfig,
    pub data: DataConfig,
    #[validate(nested)]
    pub grid: GridConfig,
    #[validate(nested)]
    pub handoff: HandoffConfig,
    #[serde(default)]
    #[validate(nested)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForecastConfig {
    pub strategy: StrategyKind,
    #[validate(range(min = 3))]
    pub previous_days: usize,
    /// Fixed seed for reproducible runs; unset draws fresh entropy
    #[serde(default)]
    pub seed: Option<u64>,
    /// Confidence level of the robust optimization (1.0 = stochastic)
    #[validate(range(min = 0.0, max = 1.0))]
    pub robustness: f64,
    /// Day whose data is used; defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub measurement_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GridConfig {
    #[validate(length(min = 1))]
    pub network: String,
    pub topology_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HandoffConfig {
    pub output_dir: PathBuf,
    #[validate(length(min = 1))]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[validate(range(min = 1))]
    pub timeout_seconds: u64,
    #[validate(range(min = 1))]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BootstrapConfig {
    /// Quantile backend program; the bootstrap strategy is unavailable without it
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Upper bound for one backend call
    #[serde(default = "default_bootstrap_timeout")]
    #[validate(range(min = 1))]
    pub timeout_seconds: u64,
    #[serde(flatten)]
    pub settings: BootstrapSettings,
}

fn default_bootstrap_timeout() -> u64 {
    60
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            timeout_seconds: default_bootstrap_timeout(),
            settings: BootstrapSettings::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("DAYAHEAD__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Self = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
        [forecast]
        strategy = "NoClustering"
        previous_days = 10
        robustness = 0.8

        [data]
        measurement_dir = "data/measurements"

        [grid]
        network = "feeder"
        topology_dir = "data/topology"

        [handoff]
        output_dir = ".cache/outputs"
        program = "optimizer"
        timeout_seconds = 600
        max_attempts = 2
    "#;

    fn load(extra: &str) -> Result<Config> {
        Config::from_figment(Figment::new().merge(Toml::string(BASE)).merge(Toml::string(extra)))
    }

    #[test]
    fn test_defaults() {
        let cfg = load("").unwrap();
        assert_eq!(cfg.forecast.strategy, StrategyKind::NoClustering);
        assert_eq!(cfg.forecast.seed, None);
        assert_eq!(cfg.bootstrap.settings, BootstrapSettings::default());
        assert!(cfg.bootstrap.program.is_none());
    }

    #[test]
    fn test_too_few_days_rejected() {
        assert!(load("[forecast]\nprevious_days = 2").is_err());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        assert!(load("[forecast]\nstrategy = \"Prophet\"").is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(load("[handoff]\ntimeout_seconds = 0").is_err());
    }

    #[test]
    fn test_bootstrap_overrides() {
        let cfg = load("[bootstrap]\nprogram = \"lqr\"\nn_boot = 25").unwrap();
        assert_eq!(cfg.bootstrap.program.as_deref(), Some("lqr"));
        assert_eq!(cfg.bootstrap.settings.n_boot, 25);
        assert_eq!(cfg.bootstrap.settings.active_factor, 0.1);
        assert_eq!(cfg.bootstrap.timeout_seconds, 60);
    }

    #[test]
    fn test_zero_bootstrap_timeout_rejected() {
        assert!(load("[bootstrap]\ntimeout_seconds = 0").is_err());
        let cfg = load("[bootstrap]\ntimeout_seconds = 5").unwrap();
        assert_eq!(cfg.bootstrap.timeout_seconds, 5);
    }
}
