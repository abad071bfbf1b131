use crate::error::Error;
use crate::simulation::ParameterMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Constraint on a parameter or an output metric
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConstraint {
    /// Parameter or output variable name
    pub parameter: String,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub equals_value: Option<f64>,
    /// Penalty weight of a soft constraint
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_is_hard")]
    pub is_hard_constraint: bool,
}

fn default_weight() -> f64 {
    1.0
}

fn default_is_hard() -> bool {
    true
}

impl OptimizationConstraint {
    /// Hard constraint `min <= parameter <= max`; either side may be open
    pub fn range(parameter: impl Into<String>, min_value: Option<f64>, max_value: Option<f64>) -> Self {
        Self {
            parameter: parameter.into(),
            min_value,
            max_value,
            equals_value: None,
            weight: default_weight(),
            is_hard_constraint: true,
        }
    }

    pub fn soft(mut self, weight: f64) -> Self {
        self.is_hard_constraint = false;
        self.weight = weight;
        self
    }
}

/// Search settings of a single optimization run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub algorithm: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Accepted for compatibility; the strategies run their full budget
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Seeds every evaluation and the strategy's own randomness
    #[serde(default)]
    pub random_seed: Option<u64>,
}

fn default_max_iterations() -> usize {
    100
}

fn default_tolerance() -> f64 {
    0.001
}

impl OptimizationConfig {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            random_seed: None,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub process_type: String,
    /// Metric to optimize; `x` also matches the quality sub-metric `quality_x`
    pub target_variable: String,
    #[serde(default = "default_maximize")]
    pub maximize: bool,
    pub parameters_to_optimize: Vec<String>,
    #[serde(default)]
    pub fixed_parameters: ParameterMap,
    #[serde(default)]
    pub constraints: Vec<OptimizationConstraint>,
    pub config: OptimizationConfig,
}

fn default_maximize() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizedParameter {
    pub name: String,
    pub value: f64,
    pub original_value: f64,
    pub unit: String,
    /// `None` when the original value is zero
    pub improvement_percent: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub optimization_id: String,
    pub process_type: String,
    pub target_variable: String,
    /// Strategy that actually ran
    pub algorithm: String,
    pub initial_value: f64,
    pub optimized_value: f64,
    pub improvement_percent: f64,
    /// Optimized parameters, in request order
    pub parameters: Vec<OptimizedParameter>,
    /// Full operating point at the optimum, fixed parameters included
    pub best_parameters: ParameterMap,
    /// Quality sub-metric -> change against the initial point
    pub expected_quality_impact: ParameterMap,
    /// Percent energy saved (positive is better)
    pub expected_energy_impact: f64,
    pub expected_throughput_impact: f64,
    pub confidence_score: f64,
    /// Simulations run by the search, excluding the initial and final evaluation
    pub evaluations: usize,
    pub execution_time: f64,
}

/// Parameter search strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterAlgorithm {
    BayesianOptimization,
    GeneticAlgorithm,
    GridSearch,
}

impl ParameterAlgorithm {
    pub const ALL: [ParameterAlgorithm; 3] = [
        ParameterAlgorithm::BayesianOptimization,
        ParameterAlgorithm::GeneticAlgorithm,
        ParameterAlgorithm::GridSearch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParameterAlgorithm::BayesianOptimization => "bayesian_optimization",
            ParameterAlgorithm::GeneticAlgorithm => "genetic_algorithm",
            ParameterAlgorithm::GridSearch => "grid_search",
        }
    }
}

impl FromStr for ParameterAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| Error::UnsupportedAlgorithm(s.to_string()))
    }
}

impl fmt::Display for ParameterAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Production schedule strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleAlgorithm {
    ReinforcementLearning,
    ConstraintSatisfaction,
    Heuristic,
}

impl ScheduleAlgorithm {
    pub const ALL: [ScheduleAlgorithm; 3] = [
        ScheduleAlgorithm::ReinforcementLearning,
        ScheduleAlgorithm::ConstraintSatisfaction,
        ScheduleAlgorithm::Heuristic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleAlgorithm::ReinforcementLearning => "reinforcement_learning",
            ScheduleAlgorithm::ConstraintSatisfaction => "constraint_satisfaction",
            ScheduleAlgorithm::Heuristic => "heuristic",
        }
    }
}

impl FromStr for ScheduleAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| Error::UnsupportedAlgorithm(s.to_string()))
    }
}

/// A job to place on one of the machines
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleJob {
    pub job_id: String,
    pub duration_minutes: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub process_id: String,
    pub algorithm: String,
    pub machine_count: usize,
    pub jobs: Vec<ScheduleJob>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobAssignment {
    pub job_id: String,
    /// 1-based
    pub machine_id: usize,
    pub start_minute: f64,
    pub end_minute: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineUtilization {
    pub machine_id: usize,
    /// Busy time over makespan, in [0, 1]
    pub utilization: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub optimization_id: String,
    pub process_id: String,
    pub algorithm: String,
    /// Makespan of the submission-order round-robin baseline (minutes)
    pub original_makespan: f64,
    pub optimized_makespan: f64,
    pub improvement_percent: f64,
    pub jobs: Vec<JobAssignment>,
    pub machines: Vec<MachineUtilization>,
}
