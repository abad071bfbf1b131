use crate::error::{Error, Result};
use crate::simulation::ParameterMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Lifecycle state of a digital twin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwinStatus {
    Initializing,
    Running,
    Paused,
    Error,
    Terminated,
}

impl TwinStatus {
    /// No further advancement is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, TwinStatus::Error | TwinStatus::Terminated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TwinStatus::Initializing => "initializing",
            TwinStatus::Running => "running",
            TwinStatus::Paused => "paused",
            TwinStatus::Error => "error",
            TwinStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for TwinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for creating a digital twin
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TwinConfig {
    pub name: String,
    pub process_type: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Initial operating point
    #[serde(default)]
    pub parameters: ParameterMap,
    /// Simulation steps per simulated second (Hz)
    #[serde(default = "default_update_frequency")]
    pub update_frequency: f64,
    /// 2.0 runs twice as fast as real time
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,
    #[serde(default = "default_include_random_events")]
    pub include_random_events: bool,
    /// Seeds every step and random event, for reproducible twins
    #[serde(default)]
    pub random_seed: Option<u64>,
}

fn default_update_frequency() -> f64 {
    1.0
}

fn default_speed_factor() -> f64 {
    1.0
}

fn default_include_random_events() -> bool {
    true
}

impl TwinConfig {
    pub fn new(name: impl Into<String>, process_type: impl Into<String>, parameters: ParameterMap) -> Self {
        Self {
            name: name.into(),
            process_type: process_type.into(),
            description: None,
            parameters,
            update_frequency: default_update_frequency(),
            speed_factor: default_speed_factor(),
            include_random_events: default_include_random_events(),
            random_seed: None,
        }
    }

    /// Simulated seconds per step
    pub fn time_step(&self) -> f64 {
        1.0 / self.update_frequency
    }

    /// Wall-clock time budgeted for one step
    pub fn real_step(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.time_step() / self.speed_factor).map_err(|e| {
            Error::InvalidConfig(format!(
                "update_frequency {} with speed_factor {} gives no usable step: {}",
                self.update_frequency, self.speed_factor, e
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.update_frequency.is_finite() || self.update_frequency <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "update_frequency must be positive, got {}",
                self.update_frequency
            )));
        }
        if !self.speed_factor.is_finite() || self.speed_factor <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "speed_factor must be positive, got {}",
                self.speed_factor
            )));
        }
        self.real_step()?;
        Ok(())
    }
}

/// Point-in-time view of a twin
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TwinStatusSnapshot {
    pub id: String,
    pub name: String,
    pub process_type: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: TwinStatus,
    /// Simulated seconds since start
    pub current_time: f64,
    pub uptime: f64,
    pub current_parameters: ParameterMap,
    pub current_metrics: ParameterMap,
    pub last_updated: DateTime<Utc>,
    /// Cause of the transition to `error`
    pub last_error: Option<String>,
}

/// Registry listing entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TwinSummary {
    pub id: String,
    pub name: String,
    pub process_type: String,
    pub status: TwinStatus,
    pub created_at: DateTime<Utc>,
}

/// Disruption categories injected into a running twin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisruptionKind {
    MachineFailure,
    MaterialDeviation,
    PowerFluctuation,
    QualityAlert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// What a disruption did to the twin
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisruptionEffect {
    ParameterDeviation {
        parameter: String,
        deviation: f64,
        /// Simulated time the original value comes back
        restore_at: f64,
    },
    QualityImpact(f64),
    EnergyImpact(f64),
    DefectImpact(f64),
    /// Nothing to perturb (e.g. machine failure on a twin without parameters)
    None,
}

/// Entry in a twin's event log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TwinEvent {
    /// Simulated time (seconds)
    pub timestamp: f64,
    #[serde(flatten)]
    pub kind: TwinEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TwinEventKind {
    ParameterChange {
        parameters: ParameterMap,
    },
    RandomEvent {
        event_type: DisruptionKind,
        severity: Severity,
        effect: DisruptionEffect,
    },
    ParameterRestoration {
        parameter: String,
        value: f64,
        related_event_type: DisruptionKind,
    },
}

/// Time-series slice returned by `get_data`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TwinData {
    pub twin_id: String,
    pub process_type: String,
    pub start_time: f64,
    pub end_time: f64,
    pub timestamps: Vec<f64>,
    pub parameters: BTreeMap<String, Vec<f64>>,
    pub sensor_readings: BTreeMap<String, Vec<f64>>,
    /// Quality sub-metrics plus energy rate, throughput and defect rate
    pub quality_metrics: BTreeMap<String, Vec<f64>>,
    pub events: Vec<TwinEvent>,
}

/// What-if request against a twin's current operating point
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    /// Overrides applied on top of the twin's current parameters
    #[serde(default)]
    pub parameter_changes: ParameterMap,
    /// Simulated seconds to run
    pub duration: f64,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_id: String,
    pub twin_id: String,
    pub name: String,
    /// Simulated window the scenario covered
    pub start_time: f64,
    pub end_time: f64,
    pub parameter_changes: ParameterMap,
    pub baseline_metrics: ParameterMap,
    pub scenario_metrics: ParameterMap,
    /// Percent change of each scenario metric against the baseline
    pub impact_analysis: ParameterMap,
    pub timestamps: Vec<f64>,
    pub time_series_data: BTreeMap<String, Vec<f64>>,
    pub execution_time: f64,
}
