// Integration tests for parameter and schedule optimization

use mfg_twin::config::OptimizerSettings;
use mfg_twin::optimization::{
    OptimizationConfig, OptimizationConstraint, OptimizationRequest, ProcessOptimizer,
    ScheduleJob, ScheduleRequest,
};
use mfg_twin::simulation::{ParameterMap, SimulationEngine};
use mfg_twin::Error;
use std::sync::Arc;

fn optimizer() -> ProcessOptimizer {
    let settings = OptimizerSettings {
        evaluation_duration: 20.0,
        ..OptimizerSettings::default()
    };
    ProcessOptimizer::new(Arc::new(SimulationEngine::default()), settings)
}

fn quality_request(parameters: &[&str], max_iterations: usize) -> OptimizationRequest {
    OptimizationRequest {
        process_type: "injection_molding".to_string(),
        target_variable: "quality_score".to_string(),
        maximize: true,
        parameters_to_optimize: parameters.iter().map(|p| p.to_string()).collect(),
        fixed_parameters: ParameterMap::new(),
        constraints: Vec::new(),
        config: OptimizationConfig::new("grid_search")
            .with_max_iterations(max_iterations)
            .with_seed(42),
    }
}

#[test]
fn test_grid_search_improves_quality() {
    let result = optimizer()
        .optimize_parameters(&quality_request(&["temperature", "pressure"], 25))
        .unwrap();

    assert_eq!(result.evaluations, 25);
    assert_eq!(result.parameters.len(), 2);
    let temperature = result.best_parameters["temperature"];
    let pressure = result.best_parameters["pressure"];
    assert!((150.0..=350.0).contains(&temperature));
    assert!((50.0..=200.0).contains(&pressure));
    assert!(result.optimized_value >= result.initial_value);
    assert!(result.improvement_percent >= 0.0);
    assert_eq!(result.confidence_score, 0.85);
    assert!(!result.optimization_id.is_empty());
}

#[test]
fn test_zero_free_parameters() {
    let mut request = quality_request(&[], 100);
    request.fixed_parameters = [("cooling_time".to_string(), 15.0)].into_iter().collect();

    let result = optimizer().optimize_parameters(&request).unwrap();
    assert!(result.parameters.is_empty());
    assert_eq!(result.evaluations, 1);
    assert_eq!(result.best_parameters["cooling_time"], 15.0);
    assert_eq!(result.optimized_value, result.initial_value);
}

#[test]
fn test_soft_constraint_only_shifts_score() {
    let mut request = quality_request(&["mold_temperature"], 5);
    request.constraints = vec![OptimizationConstraint::range("mold_temperature", Some(200.0), None).soft(0.001)];

    // Unsatisfiable soft constraints never make the run fail
    let result = optimizer().optimize_parameters(&request).unwrap();
    assert!((20.0..=120.0).contains(&result.best_parameters["mold_temperature"]));
}

#[test]
fn test_stub_process_type_optimizes() {
    let request = OptimizationRequest {
        process_type: "cnc_machining".to_string(),
        target_variable: "throughput".to_string(),
        maximize: true,
        parameters_to_optimize: vec!["spindle_speed".to_string()],
        fixed_parameters: ParameterMap::new(),
        constraints: Vec::new(),
        config: OptimizationConfig::new("genetic_algorithm")
            .with_max_iterations(2)
            .with_seed(1),
    };
    let result = optimizer().optimize_parameters(&request).unwrap();
    assert_eq!(result.algorithm, "genetic_algorithm");
    assert_eq!(result.optimized_value, 100.0);
    assert_eq!(result.expected_throughput_impact, 0.0);
}

#[test]
fn test_unknown_process_type() {
    let mut request = quality_request(&["temperature"], 4);
    request.process_type = "welding".to_string();
    assert!(matches!(
        optimizer().optimize_parameters(&request),
        Err(Error::UnknownProcessType(_))
    ));
}

#[test]
fn test_schedule_optimization() {
    let jobs = [120.0, 30.0, 90.0, 60.0, 45.0, 15.0]
        .iter()
        .enumerate()
        .map(|(i, &d)| ScheduleJob {
            job_id: format!("order-{}", i + 1),
            duration_minutes: d,
        })
        .collect();
    let request = ScheduleRequest {
        process_id: "line-7".to_string(),
        algorithm: "constraint_satisfaction".to_string(),
        machine_count: 3,
        jobs,
    };

    let result = optimizer().optimize_schedule(&request).unwrap();
    assert_eq!(result.jobs.len(), 6);
    assert!(result.optimized_makespan <= result.original_makespan);
    assert!(result.optimized_makespan >= 120.0);
    assert!(result
        .machines
        .iter()
        .all(|m| (0.0..=1.0).contains(&m.utilization)));
}
