// Parameter and schedule optimization over the simulation engine

#[cfg(feature = "bayesian")]
mod bayesian;
mod constraints;
mod genetic;
mod grid;
mod objective;
mod optimizer;
mod schedule;
mod strategy;
mod types;

#[cfg(feature = "bayesian")]
pub use bayesian::BayesianOptimization;
pub use constraints::{check_constraints, ConstraintReport, EQUALITY_TOLERANCE};
pub use genetic::GeneticAlgorithm;
pub use grid::{points_per_dimension, GridSearch};
pub use objective::{Bound, Evaluation, Objective, ObjectiveSpec};
pub use optimizer::{ProcessOptimizer, DEFAULT_NUM_SOLUTIONS};
pub use schedule::optimize_schedule;
pub use strategy::SearchStrategy;
pub use types::{
    JobAssignment, MachineUtilization, OptimizationConfig, OptimizationConstraint,
    OptimizationRequest, OptimizationResult, OptimizedParameter, ParameterAlgorithm,
    ScheduleAlgorithm, ScheduleJob, ScheduleRequest, ScheduleResult,
};
