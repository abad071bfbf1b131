//! Process models: one implementation per manufacturing process type.
//!
//! A model maps a parameter vector and a time window to synthetic sensor
//! readings and quality metrics. Models are stateless; all randomness comes
//! from the generator handed in by the engine, so a seeded generator makes
//! the output reproducible.

mod injection_molding;
mod sinusoidal;

pub use injection_molding::InjectionMoldingModel;
pub use sinusoidal::{SensorWave, SinusoidalModel};

use crate::error::Result;
use crate::simulation::types::{ParameterMap, ProcessParameter};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Time window and operating point handed to a model
#[derive(Debug, Clone, Copy)]
pub struct ModelInput<'a> {
    pub parameters: &'a ParameterMap,
    pub duration: f64,
    pub start_time: f64,
    pub sample_interval: f64,
    pub include_sensor_noise: bool,
}

impl ModelInput<'_> {
    /// Evenly spaced sample times covering `[start_time, start_time + duration]`
    pub fn timestamps(&self) -> Vec<f64> {
        let n = ((self.duration / self.sample_interval).floor() as usize).max(1);
        linspace(self.start_time, self.start_time + self.duration, n)
    }

    /// Parameter value, or the model's default when absent
    pub fn param(&self, name: &str, default: f64) -> f64 {
        self.parameters.get(name).copied().unwrap_or(default)
    }
}

/// Raw model output before the engine adds derived metrics
#[derive(Debug, Clone, Default)]
pub struct ModelOutput {
    pub timestamps: Vec<f64>,
    pub sensor_readings: BTreeMap<String, Vec<f64>>,
    pub quality_metrics: ParameterMap,
}

/// Simulated physics of one process type
pub trait ProcessModel: Send + Sync {
    /// Process type this model is registered under (e.g. "injection_molding")
    fn name(&self) -> &str;

    /// Parameter catalogue, in display order
    fn parameters(&self) -> Vec<ProcessParameter>;

    fn simulate(&self, input: &ModelInput<'_>, rng: &mut StdRng) -> Result<ModelOutput>;

    /// Energy estimate used when the model has no `power` sensor
    fn estimate_energy(&self, parameters: &ParameterMap, duration: f64) -> f64;

    /// Parts per hour at the given operating point
    fn throughput(&self, parameters: &ParameterMap) -> f64;
}

/// All models shipped with the engine
pub fn builtin_models() -> Vec<Arc<dyn ProcessModel>> {
    vec![
        Arc::new(InjectionMoldingModel),
        Arc::new(SinusoidalModel::cnc_machining()),
        Arc::new(SinusoidalModel::assembly_line()),
        Arc::new(SinusoidalModel::chemical_process()),
        Arc::new(SinusoidalModel::packaging_line()),
    ]
}

pub(crate) fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Zero-mean gaussian sample with standard deviation `sigma`
pub(crate) fn gaussian(rng: &mut StdRng, sigma: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    sigma * z
}
