use super::constraints::{check_constraints, ConstraintReport};
use super::types::OptimizationConstraint;
use crate::error::{Error, Result};
use crate::simulation::{ParameterMap, SimulationConfig, SimulationEngine};
use std::cell::Cell;

/// Search range of one free parameter
#[derive(Clone, Debug, PartialEq)]
pub struct Bound {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl Bound {
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Point at fraction `u` of the range
    pub fn lerp(&self, u: f64) -> f64 {
        self.min + u * self.span()
    }

    /// Fraction of the range at `value` (0 for a degenerate range)
    pub fn normalize(&self, value: f64) -> f64 {
        if self.span() > 0.0 {
            (value - self.min) / self.span()
        } else {
            0.0
        }
    }
}

/// One simulated candidate
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Full operating point
    pub parameters: ParameterMap,
    /// `quality_<name>` for every quality metric plus energy, throughput, defect rate
    pub metrics: ParameterMap,
    /// Raw value of the target metric
    pub target: f64,
    pub constraints: ConstraintReport,
    /// Penalized objective; higher is always better
    pub score: f64,
}

impl Evaluation {
    pub fn is_feasible(&self) -> bool {
        self.constraints.is_feasible()
    }
}

/// Settings shared by every evaluation of one optimization run
#[derive(Clone, Debug)]
pub struct ObjectiveSpec<'a> {
    pub process_type: &'a str,
    pub target_variable: &'a str,
    pub maximize: bool,
    pub constraints: &'a [OptimizationConstraint],
    /// Simulated seconds per evaluation
    pub duration: f64,
    pub hard_penalty: f64,
    pub seed: Option<u64>,
}

/// Black-box objective over the simulation engine.
///
/// Candidates are given as free-parameter maps and overlaid on the initial
/// operating point before simulating.
pub struct Objective<'a> {
    engine: &'a SimulationEngine,
    spec: ObjectiveSpec<'a>,
    base: ParameterMap,
    /// Metric key the target variable resolved to
    target_key: String,
    evaluations: Cell<usize>,
}

impl<'a> Objective<'a> {
    /// Evaluate the initial point and resolve the target variable against its metrics
    pub fn new(
        engine: &'a SimulationEngine,
        spec: ObjectiveSpec<'a>,
        base: ParameterMap,
    ) -> Result<(Self, Evaluation)> {
        let metrics = simulate_metrics(engine, &spec, &base)?;
        let target_key = resolve_target(&metrics, spec.target_variable)?;

        let objective = Self {
            engine,
            spec,
            base,
            target_key,
            evaluations: Cell::new(0),
        };
        let initial = objective.score(objective.base.clone(), metrics);
        Ok((objective, initial))
    }

    pub fn maximize(&self) -> bool {
        self.spec.maximize
    }

    pub fn target_key(&self) -> &str {
        &self.target_key
    }

    /// Full operating point for a free-parameter assignment
    pub fn full_parameters(&self, free: &ParameterMap) -> ParameterMap {
        let mut parameters = self.base.clone();
        parameters.extend(free.iter().map(|(k, v)| (k.clone(), *v)));
        parameters
    }

    /// Simulate a candidate; counts towards `evaluations`
    pub fn evaluate(&self, free: &ParameterMap) -> Result<Evaluation> {
        let parameters = self.full_parameters(free);
        let metrics = simulate_metrics(self.engine, &self.spec, &parameters)?;
        self.evaluations.set(self.evaluations.get() + 1);
        Ok(self.score(parameters, metrics))
    }

    /// Simulations run through `evaluate`
    pub fn evaluations(&self) -> usize {
        self.evaluations.get()
    }

    fn score(&self, parameters: ParameterMap, metrics: ParameterMap) -> Evaluation {
        let target = metrics.get(&self.target_key).copied().unwrap_or_default();
        let constraints = check_constraints(self.spec.constraints, &metrics, &parameters);
        let penalty = constraints.penalty(self.spec.hard_penalty);
        let score = if self.spec.maximize {
            target - penalty
        } else {
            -(target + penalty)
        };
        Evaluation {
            parameters,
            metrics,
            target,
            constraints,
            score,
        }
    }
}

fn simulate_metrics(
    engine: &SimulationEngine,
    spec: &ObjectiveSpec<'_>,
    parameters: &ParameterMap,
) -> Result<ParameterMap> {
    let config = SimulationConfig::new(spec.process_type, spec.duration, parameters.clone())
        .with_seed(spec.seed);
    let result = engine.run_simulation(&config)?;

    let mut metrics: ParameterMap = result
        .quality_metrics
        .iter()
        .map(|(name, value)| (format!("quality_{}", name), *value))
        .collect();
    metrics.insert("energy_consumption".to_string(), result.energy_consumption);
    metrics.insert("throughput".to_string(), result.throughput);
    metrics.insert("defect_rate".to_string(), result.defect_rate);
    Ok(metrics)
}

/// The target itself, else its quality sub-metric
fn resolve_target(metrics: &ParameterMap, target: &str) -> Result<String> {
    if metrics.contains_key(target) {
        return Ok(target.to_string());
    }
    let prefixed = format!("quality_{}", target);
    if metrics.contains_key(&prefixed) {
        return Ok(prefixed);
    }
    Err(Error::InvalidParameter(format!(
        "target variable '{}' not found in simulation results",
        target
    )))
}
