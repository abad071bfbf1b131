use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named numeric values (parameters, metrics) in deterministic order
pub type ParameterMap = BTreeMap<String, f64>;

/// Tunable input of a manufacturing process
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessParameter {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub min_value: f64,
    pub max_value: f64,
    pub default_value: f64,
    /// Output variable -> sensitivity to this parameter
    #[serde(default)]
    pub impact_factors: BTreeMap<String, f64>,
}

impl ProcessParameter {
    pub fn new(
        name: &str,
        description: &str,
        unit: &str,
        (min_value, max_value): (f64, f64),
        default_value: f64,
        impact_factors: &[(&str, f64)],
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            unit: unit.to_string(),
            min_value,
            max_value,
            default_value,
            impact_factors: impact_factors
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    /// Midpoint of the allowed range
    pub fn midpoint(&self) -> f64 {
        (self.min_value + self.max_value) / 2.0
    }
}

/// Input of a single simulation run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub process_type: String,

    /// Simulated duration (seconds)
    pub duration: f64,

    pub parameters: ParameterMap,

    /// Fixed seed makes the run reproducible
    #[serde(default)]
    pub random_seed: Option<u64>,

    #[serde(default = "default_include_sensor_noise")]
    pub include_sensor_noise: bool,

    /// Offset of the first timestamp (seconds); lets consecutive runs continue a process cycle
    #[serde(default)]
    pub start_time: f64,
}

fn default_include_sensor_noise() -> bool {
    true
}

impl SimulationConfig {
    pub fn new(process_type: impl Into<String>, duration: f64, parameters: ParameterMap) -> Self {
        Self {
            process_type: process_type.into(),
            duration,
            parameters,
            random_seed: None,
            include_sensor_noise: default_include_sensor_noise(),
            start_time: 0.0,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_sensor_noise(mut self, include: bool) -> Self {
        self.include_sensor_noise = include;
        self
    }
}

/// Output of a simulation run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub id: String,
    pub process_type: String,
    pub duration: f64,
    pub parameters: ParameterMap,
    pub timestamps: Vec<f64>,
    /// Sensor name -> readings aligned to `timestamps`
    pub sensor_readings: BTreeMap<String, Vec<f64>>,
    pub quality_metrics: ParameterMap,
    pub energy_consumption: f64,
    /// Parts per hour
    pub throughput: f64,
    pub defect_rate: f64,
    /// Wall-clock seconds spent simulating
    pub execution_time: f64,
}

impl SimulationResult {
    pub fn quality_score(&self) -> f64 {
        self.quality_metrics
            .get("quality_score")
            .copied()
            .unwrap_or(DEFAULT_QUALITY_SCORE)
    }

    /// Last reading of every sensor
    pub fn latest_readings(&self) -> ParameterMap {
        self.sensor_readings
            .iter()
            .filter_map(|(name, values)| values.last().map(|v| (name.clone(), *v)))
            .collect()
    }
}

/// Assumed quality when a model does not report `quality_score`
pub const DEFAULT_QUALITY_SCORE: f64 = 0.8;
