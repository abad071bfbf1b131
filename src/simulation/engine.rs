use crate::config::SimulationSettings;
use crate::error::{Error, Result};
use crate::simulation::models::{builtin_models, ModelInput, ModelOutput, ProcessModel};
use crate::simulation::types::{ParameterMap, ProcessParameter, SimulationConfig, SimulationResult};
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Runs process models and derives aggregate metrics from their output
pub struct SimulationEngine {
    /// Process type -> model
    models: DashMap<String, Arc<dyn ProcessModel>>,
    settings: SimulationSettings,
}

impl SimulationEngine {
    /// Create engine with no registered process types
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            models: DashMap::new(),
            settings,
        }
    }

    /// Create engine with every built-in process type registered
    pub fn with_builtin_models(settings: SimulationSettings) -> Self {
        let engine = Self::new(settings);
        for model in builtin_models() {
            engine.register(model);
        }
        engine
    }

    /// Register a model under its process type name, replacing any previous one
    pub fn register(&self, model: Arc<dyn ProcessModel>) {
        let name = model.name().to_string();
        if self.models.insert(name.clone(), model).is_some() {
            info!(process_type = %name, "Replaced process model");
        } else {
            debug!(process_type = %name, "Registered process model");
        }
    }

    /// Registered process types, sorted
    pub fn get_process_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.models.iter().map(|m| m.key().clone()).collect();
        types.sort();
        types
    }

    pub fn has_process_type(&self, process_type: &str) -> bool {
        self.models.contains_key(process_type)
    }

    /// Parameter catalogue of a process type
    pub fn get_parameters(&self, process_type: &str) -> Result<Vec<ProcessParameter>> {
        Ok(self.model(process_type)?.parameters())
    }

    /// Run a simulation.
    ///
    /// With `random_seed` set the output is bit-identical across calls with
    /// the same config; otherwise each call draws fresh entropy.
    pub fn run_simulation(&self, config: &SimulationConfig) -> Result<SimulationResult> {
        let started = Instant::now();

        let model = self.model(&config.process_type)?;
        self.settings.validate()?;

        if !config.duration.is_finite() || config.duration <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "duration must be a positive number of seconds, got {}",
                config.duration
            )));
        }
        if !config.start_time.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "start_time must be finite, got {}",
                config.start_time
            )));
        }

        let mut rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let input = ModelInput {
            parameters: &config.parameters,
            duration: config.duration,
            start_time: config.start_time,
            sample_interval: self.settings.sample_interval,
            include_sensor_noise: config.include_sensor_noise,
        };
        let output = model.simulate(&input, &mut rng)?;
        check_output(model.name(), &output)?;

        let energy_consumption = energy_consumption(model.as_ref(), config, &output);
        let throughput = model.throughput(&config.parameters);
        let quality_score = output
            .quality_metrics
            .get("quality_score")
            .copied()
            .unwrap_or(crate::simulation::types::DEFAULT_QUALITY_SCORE);
        let defect_rate = defect_rate(quality_score);

        for (label, value) in [
            ("energy_consumption", energy_consumption),
            ("throughput", throughput),
            ("defect_rate", defect_rate),
        ] {
            if !value.is_finite() {
                return Err(Error::SimulationFailure(format!(
                    "{} produced non-finite {}",
                    model.name(),
                    label
                )));
            }
        }

        Ok(SimulationResult {
            id: Uuid::now_v7().to_string(),
            process_type: config.process_type.clone(),
            duration: config.duration,
            parameters: config.parameters.clone(),
            timestamps: output.timestamps,
            sensor_readings: output.sensor_readings,
            quality_metrics: output.quality_metrics,
            energy_consumption,
            throughput,
            defect_rate,
            execution_time: started.elapsed().as_secs_f64(),
        })
    }

    fn model(&self, process_type: &str) -> Result<Arc<dyn ProcessModel>> {
        self.models
            .get(process_type)
            .map(|m| Arc::clone(m.value()))
            .ok_or_else(|| Error::UnknownProcessType(process_type.to_string()))
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::with_builtin_models(SimulationSettings::default())
    }
}

/// Integrate the `power` channel over the run, else ask the model for an estimate
fn energy_consumption(model: &dyn ProcessModel, config: &SimulationConfig, output: &ModelOutput) -> f64 {
    match output.sensor_readings.get("power") {
        Some(power) if !power.is_empty() => {
            let dt = config.duration / power.len() as f64;
            power.iter().sum::<f64>() * dt
        }
        _ => model.estimate_energy(&config.parameters, config.duration),
    }
}

/// Defect rate grows quadratically as quality falls from 1
pub fn defect_rate(quality_score: f64) -> f64 {
    0.1 * (1.0 - quality_score).powi(2)
}

fn check_output(model: &str, output: &ModelOutput) -> Result<()> {
    let n = output.timestamps.len();
    for (sensor, values) in &output.sensor_readings {
        if values.len() != n {
            return Err(Error::SimulationFailure(format!(
                "{} sensor '{}' has {} readings for {} timestamps",
                model,
                sensor,
                values.len(),
                n
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::SimulationFailure(format!(
                "{} sensor '{}' produced non-finite readings",
                model, sensor
            )));
        }
    }
    if let Some((name, _)) = output.quality_metrics.iter().find(|(_, v)| !v.is_finite()) {
        return Err(Error::SimulationFailure(format!(
            "{} quality metric '{}' is not finite",
            model, name
        )));
    }
    Ok(())
}

/// Parameter defaults of a process type as a map
pub fn default_parameters(parameters: &[ProcessParameter]) -> ParameterMap {
    parameters
        .iter()
        .map(|p| (p.name.clone(), p.default_value))
        .collect()
}
