// Process models and the simulation engine

mod engine;
pub mod models;
mod types;

pub use engine::{default_parameters, defect_rate, SimulationEngine};
pub use models::{ModelInput, ModelOutput, ProcessModel};
pub use types::{
    ParameterMap, ProcessParameter, SimulationConfig, SimulationResult, DEFAULT_QUALITY_SCORE,
};
