pub mod env;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Error;
use crate::twin::TwinConfig;

/// Complete mfg-twin configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub twin: TwinSettings,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
    /// Twins created by the binary on startup
    #[serde(default)]
    pub twins: Vec<TwinConfig>,
}

/// Simulation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Spacing of generated sensor samples (seconds)
    #[serde(default = "default_sample_interval")]
    pub sample_interval: f64,
}

fn default_sample_interval() -> f64 {
    0.1
}

impl SimulationSettings {
    /// `sample_interval` must be a positive number of seconds
    pub fn validate(&self) -> crate::Result<()> {
        if !self.sample_interval.is_finite() || self.sample_interval <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_interval must be positive, got {}",
                self.sample_interval
            )));
        }
        Ok(())
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            sample_interval: default_sample_interval(),
        }
    }
}

/// Digital twin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwinSettings {
    /// History length that triggers a trim to half
    #[serde(default = "default_max_history_points")]
    pub max_history_points: usize,
    /// Simulated seconds between random events
    #[serde(default = "default_random_event_interval")]
    pub random_event_interval: f64,
    /// Bounded wait for a twin task to exit on stop (milliseconds)
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    /// Capacity of each twin's control channel
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

fn default_max_history_points() -> usize {
    10_000
}

fn default_random_event_interval() -> f64 {
    300.0
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}

fn default_command_buffer() -> usize {
    32
}

impl TwinSettings {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> crate::Result<()> {
        // Trimming keeps half the bound, which must leave at least one point
        if self.max_history_points < 2 {
            return Err(Error::InvalidConfig(format!(
                "max_history_points must be at least 2, got {}",
                self.max_history_points
            )));
        }
        if !self.random_event_interval.is_finite() || self.random_event_interval <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "random_event_interval must be positive, got {}",
                self.random_event_interval
            )));
        }
        Ok(())
    }
}

impl Default for TwinSettings {
    fn default() -> Self {
        Self {
            max_history_points: default_max_history_points(),
            random_event_interval: default_random_event_interval(),
            stop_timeout_ms: default_stop_timeout_ms(),
            command_buffer: default_command_buffer(),
        }
    }
}

/// Process optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Simulated seconds per candidate evaluation
    #[serde(default = "default_evaluation_duration")]
    pub evaluation_duration: f64,
    /// Multiplier applied to hard constraint violations
    #[serde(default = "default_hard_constraint_penalty")]
    pub hard_constraint_penalty: f64,
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    #[serde(default = "default_elitism_count")]
    pub elitism_count: usize,
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    #[serde(default = "default_bayesian_init_points")]
    pub bayesian_init_points: usize,
    /// Exploration weight of the upper-confidence-bound acquisition
    #[serde(default = "default_bayesian_kappa")]
    pub bayesian_kappa: f64,
    /// Random candidates scored by the acquisition per iteration
    #[serde(default = "default_bayesian_candidates")]
    pub bayesian_candidates: usize,
    #[serde(default = "default_confidence_score")]
    pub confidence_score: f64,
    /// Allow the Gaussian-process surrogate (needs the `bayesian` feature)
    #[serde(default = "default_enable_bayesian")]
    pub enable_bayesian: bool,
}

fn default_evaluation_duration() -> f64 {
    60.0
}

fn default_hard_constraint_penalty() -> f64 {
    1000.0
}

fn default_population_size() -> usize {
    20
}

fn default_elitism_count() -> usize {
    2
}

fn default_tournament_size() -> usize {
    3
}

fn default_mutation_rate() -> f64 {
    0.1
}

fn default_bayesian_init_points() -> usize {
    5
}

fn default_bayesian_kappa() -> f64 {
    2.576
}

fn default_bayesian_candidates() -> usize {
    1000
}

fn default_confidence_score() -> f64 {
    0.85
}

fn default_enable_bayesian() -> bool {
    true
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            evaluation_duration: default_evaluation_duration(),
            hard_constraint_penalty: default_hard_constraint_penalty(),
            population_size: default_population_size(),
            elitism_count: default_elitism_count(),
            tournament_size: default_tournament_size(),
            mutation_rate: default_mutation_rate(),
            bayesian_init_points: default_bayesian_init_points(),
            bayesian_kappa: default_bayesian_kappa(),
            bayesian_candidates: default_bayesian_candidates(),
            confidence_score: default_confidence_score(),
            enable_bayesian: default_enable_bayesian(),
        }
    }
}

/// Status reporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// How often the binary logs twin status (seconds)
    #[serde(default = "default_report_interval")]
    pub report_interval_seconds: u64,
}

fn default_report_interval() -> u64 {
    30
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            report_interval_seconds: default_report_interval(),
        }
    }
}

impl AppConfig {
    /// Reject settings the engine and twins cannot run with
    pub fn validate(&self) -> Result<()> {
        self.simulation.validate().context("Invalid [simulation] settings")?;
        self.twin.validate().context("Invalid [twin] settings")?;
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.simulation.sample_interval, 0.1);
        assert_eq!(config.twin.max_history_points, 10_000);
        assert_eq!(config.twin.random_event_interval, 300.0);
        assert_eq!(config.twin.stop_timeout(), Duration::from_secs(5));
        assert_eq!(config.optimizer.evaluation_duration, 60.0);
        assert_eq!(config.optimizer.population_size, 20);
        assert_eq!(config.optimizer.confidence_score, 0.85);
        assert!(config.twins.is_empty());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [simulation]
            sample_interval = 0.5

            [twin]
            max_history_points = 200
            random_event_interval = 60.0
            stop_timeout_ms = 250

            [optimizer]
            evaluation_duration = 10.0
            population_size = 8
            enable_bayesian = false

            [monitor]
            report_interval_seconds = 5

            [[twins]]
            name = "press-1"
            process_type = "injection_molding"
            parameters = { temperature = 225.0, pressure = 110.0 }
            update_frequency = 2.0
        "#;

        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.simulation.sample_interval, 0.5);
        assert_eq!(config.twin.max_history_points, 200);
        assert_eq!(config.twin.stop_timeout_ms, 250);
        assert_eq!(config.optimizer.population_size, 8);
        assert!(!config.optimizer.enable_bayesian);
        assert_eq!(config.monitor.report_interval_seconds, 5);

        assert_eq!(config.twins.len(), 1);
        let twin = &config.twins[0];
        assert_eq!(twin.name, "press-1");
        assert_eq!(twin.parameters["pressure"], 110.0);
        assert_eq!(twin.update_frequency, 2.0);
        assert_eq!(twin.speed_factor, 1.0); // Default
        assert!(twin.include_random_events); // Default
    }

    #[test]
    fn test_partial_config() {
        // Missing sections use defaults
        let toml = r#"
            [optimizer]
            mutation_rate = 0.2
        "#;

        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.optimizer.mutation_rate, 0.2);
        assert_eq!(config.optimizer.elitism_count, 2); // Default
        assert_eq!(config.twin.command_buffer, 32); // Default
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[twin]\nmax_history_points = 42").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.twin.max_history_points, 42);
    }

    #[test]
    fn test_load_config_rejects_bad_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[simulation]\nsample_interval = 0.0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("[simulation]"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[twin]\nmax_history_points = 1").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_settings_validation() {
        assert!(AppConfig::default().validate().is_ok());
        for interval in [0.0, -0.1, f64::NAN] {
            let settings = SimulationSettings {
                sample_interval: interval,
            };
            assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
        }
        let settings = TwinSettings {
            max_history_points: 0,
            ..TwinSettings::default()
        };
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/mfg-twin.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
