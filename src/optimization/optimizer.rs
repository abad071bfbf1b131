use super::genetic::GeneticAlgorithm;
use super::grid::GridSearch;
use super::objective::{Bound, Evaluation, Objective, ObjectiveSpec};
use super::schedule;
use super::strategy::SearchStrategy;
use super::types::{
    OptimizationRequest, OptimizationResult, OptimizedParameter, ParameterAlgorithm,
    ScheduleAlgorithm, ScheduleRequest, ScheduleResult,
};
use crate::config::OptimizerSettings;
use crate::error::{Error, Result};
use crate::simulation::{default_parameters, ParameterMap, ProcessParameter, SimulationEngine};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Targets tried by `multi_objective_optimization` after the request's own
const SECONDARY_TARGETS: [&str; 4] = [
    "quality_score",
    "energy_consumption",
    "throughput",
    "defect_rate",
];

/// Targets where lower is better
const MINIMIZED_TARGETS: [&str; 2] = ["energy_consumption", "defect_rate"];

pub const DEFAULT_NUM_SOLUTIONS: usize = 5;

/// Searches process parameters and production schedules using the
/// simulation engine as a black-box objective
pub struct ProcessOptimizer {
    engine: Arc<SimulationEngine>,
    settings: OptimizerSettings,
    bayesian_available: bool,
}

impl ProcessOptimizer {
    pub fn new(engine: Arc<SimulationEngine>, settings: OptimizerSettings) -> Self {
        let bayesian_available = cfg!(feature = "bayesian") && settings.enable_bayesian;
        if !bayesian_available {
            warn!("Bayesian optimization unavailable, requests for it will run grid search");
        }
        Self {
            engine,
            settings,
            bayesian_available,
        }
    }

    pub fn engine(&self) -> &Arc<SimulationEngine> {
        &self.engine
    }

    pub fn bayesian_available(&self) -> bool {
        self.bayesian_available
    }

    /// Find the free-parameter values that best serve the request's target
    pub fn optimize_parameters(&self, request: &OptimizationRequest) -> Result<OptimizationResult> {
        let started = Instant::now();

        let catalogue = self.engine.get_parameters(&request.process_type)?;
        let free = select_parameters(&catalogue, &request.parameters_to_optimize)?;
        let algorithm: ParameterAlgorithm = request.config.algorithm.parse()?;

        let bounds: Vec<Bound> = free
            .iter()
            .map(|p| Bound::new(p.name.clone(), p.min_value, p.max_value))
            .collect();
        let mut base = default_parameters(&catalogue);
        base.extend(request.fixed_parameters.iter().map(|(k, v)| (k.clone(), *v)));

        let spec = ObjectiveSpec {
            process_type: &request.process_type,
            target_variable: &request.target_variable,
            maximize: request.maximize,
            constraints: &request.constraints,
            duration: self.settings.evaluation_duration,
            hard_penalty: self.settings.hard_constraint_penalty,
            seed: request.config.random_seed,
        };
        let (objective, initial) = Objective::new(&self.engine, spec, base)?;

        let mut rng = match request.config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let strategy = self.strategy(algorithm);
        info!(
            process_type = %request.process_type,
            target = %request.target_variable,
            algorithm = strategy.name(),
            dimensions = bounds.len(),
            max_iterations = request.config.max_iterations,
            "Optimization started"
        );

        let winner = strategy.search(&objective, &bounds, request.config.max_iterations, &mut rng)?;
        let evaluations = objective.evaluations();
        let best = objective.evaluate(&winner)?;

        let parameters = free
            .iter()
            .map(|p| {
                let original_value = initial.parameters.get(&p.name).copied().unwrap_or(p.default_value);
                let value = best.parameters.get(&p.name).copied().unwrap_or(original_value);
                OptimizedParameter {
                    name: p.name.clone(),
                    value,
                    original_value,
                    unit: p.unit.clone(),
                    improvement_percent: (original_value != 0.0)
                        .then(|| (value - original_value) / original_value.abs() * 100.0),
                }
            })
            .collect();

        let result = OptimizationResult {
            optimization_id: Uuid::now_v7().to_string(),
            process_type: request.process_type.clone(),
            target_variable: request.target_variable.clone(),
            algorithm: strategy.name().to_string(),
            initial_value: initial.target,
            optimized_value: best.target,
            improvement_percent: improvement(initial.target, best.target, request.maximize),
            parameters,
            expected_quality_impact: quality_impact(&initial, &best),
            expected_energy_impact: improvement(
                metric(&initial, "energy_consumption"),
                metric(&best, "energy_consumption"),
                false,
            ),
            expected_throughput_impact: relative_change(
                metric(&initial, "throughput"),
                metric(&best, "throughput"),
            ),
            confidence_score: self.settings.confidence_score,
            best_parameters: best.parameters,
            evaluations,
            execution_time: started.elapsed().as_secs_f64(),
        };

        info!(
            optimization_id = %result.optimization_id,
            algorithm = %result.algorithm,
            initial_value = result.initial_value,
            optimized_value = result.optimized_value,
            improvement_percent = result.improvement_percent,
            evaluations,
            "Optimization finished"
        );
        Ok(result)
    }

    /// Algorithm names accepted for `parameter` or `schedule` optimization
    pub fn list_algorithms(&self, kind: &str) -> Result<Vec<String>> {
        match kind {
            "parameter" => Ok(ParameterAlgorithm::ALL.iter().map(|a| a.as_str().to_string()).collect()),
            "schedule" => Ok(ScheduleAlgorithm::ALL.iter().map(|a| a.as_str().to_string()).collect()),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Optimize the request's target and then a fixed list of other targets,
    /// one at a time.
    ///
    /// This is not a Pareto search: each solution is a single-objective run.
    /// Failed runs are logged and left out.
    pub fn multi_objective_optimization(
        &self,
        request: &OptimizationRequest,
        num_solutions: usize,
    ) -> Vec<OptimizationResult> {
        let mut targets = vec![request.target_variable.as_str()];
        targets.extend(
            SECONDARY_TARGETS
                .iter()
                .copied()
                .filter(|t| *t != request.target_variable),
        );

        targets
            .into_iter()
            .take(num_solutions)
            .filter_map(|target| {
                let mut single = request.clone();
                single.target_variable = target.to_string();
                single.maximize = !MINIMIZED_TARGETS.contains(&target);
                match self.optimize_parameters(&single) {
                    Ok(result) => Some(result),
                    Err(e) => {
                        warn!(target, error = %e, "Skipping objective that failed to optimize");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn optimize_schedule(&self, request: &ScheduleRequest) -> Result<ScheduleResult> {
        schedule::optimize_schedule(request)
    }

    fn strategy(&self, algorithm: ParameterAlgorithm) -> Box<dyn SearchStrategy> {
        match algorithm {
            ParameterAlgorithm::GridSearch => Box::new(GridSearch),
            ParameterAlgorithm::GeneticAlgorithm => Box::new(GeneticAlgorithm::from(&self.settings)),
            ParameterAlgorithm::BayesianOptimization => self.bayesian().unwrap_or_else(|| {
                warn!("Bayesian optimization unavailable, falling back to grid search");
                Box::new(GridSearch)
            }),
        }
    }

    #[cfg(feature = "bayesian")]
    fn bayesian(&self) -> Option<Box<dyn SearchStrategy>> {
        use super::bayesian::BayesianOptimization;

        if !self.bayesian_available {
            return None;
        }
        Some(Box::new(BayesianOptimization::from(&self.settings)))
    }

    #[cfg(not(feature = "bayesian"))]
    fn bayesian(&self) -> Option<Box<dyn SearchStrategy>> {
        None
    }
}

/// Catalogue entries for the requested names, de-duplicated in request order
fn select_parameters(catalogue: &[ProcessParameter], names: &[String]) -> Result<Vec<ProcessParameter>> {
    let mut seen = BTreeSet::new();
    let mut selected = Vec::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            continue;
        }
        let parameter = catalogue
            .iter()
            .find(|p| &p.name == name)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown parameter '{}'", name)))?;
        selected.push(parameter.clone());
    }
    Ok(selected)
}

fn metric(evaluation: &Evaluation, name: &str) -> f64 {
    evaluation.metrics.get(name).copied().unwrap_or_default()
}

/// `(to - from) / from` in percent; 0 when `from` is 0
fn relative_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        0.0
    } else {
        (to - from) / from * 100.0
    }
}

fn improvement(initial: f64, best: f64, maximize: bool) -> f64 {
    if initial == 0.0 {
        return 0.0;
    }
    let gain = if maximize { best - initial } else { initial - best };
    gain / initial.abs() * 100.0
}

/// Change of every quality sub-metric other than the overall score
fn quality_impact(initial: &Evaluation, best: &Evaluation) -> ParameterMap {
    best.metrics
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix("quality_")?;
            if name == "quality_score" {
                return None;
            }
            let before = initial.metrics.get(key).copied().unwrap_or_default();
            Some((name.to_string(), value - before))
        })
        .collect()
}
