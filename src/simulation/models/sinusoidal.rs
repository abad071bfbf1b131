use super::{gaussian, ModelInput, ModelOutput, ProcessModel};
use crate::error::Result;
use crate::simulation::types::{ParameterMap, ProcessParameter, DEFAULT_QUALITY_SCORE};
use rand::rngs::StdRng;
use std::collections::BTreeMap;

/// `baseline + amplitude * sin(t / period + phase)` with gaussian noise
#[derive(Debug, Clone)]
pub struct SensorWave {
    pub sensor: &'static str,
    pub baseline: f64,
    pub amplitude: f64,
    pub period: f64,
    pub phase: f64,
}

impl SensorWave {
    const fn new(
        sensor: &'static str,
        baseline: f64,
        amplitude: f64,
        period: f64,
        phase: f64,
    ) -> Self {
        Self {
            sensor,
            baseline,
            amplitude,
            period,
            phase,
        }
    }

    fn value_at(&self, t: f64) -> f64 {
        self.baseline + self.amplitude * (t / self.period + self.phase).sin()
    }
}

/// Placeholder physics for process types without a detailed model.
///
/// Sensors are phase-shifted sine waves with noise at 10% of their amplitude;
/// quality metrics are constant. Energy and throughput use flat estimates.
#[derive(Debug, Clone)]
pub struct SinusoidalModel {
    name: &'static str,
    waves: Vec<SensorWave>,
    parameters: Vec<ProcessParameter>,
    quality_metrics: Vec<(&'static str, f64)>,
}

/// Noise relative to wave amplitude
const NOISE_FRACTION: f64 = 0.1;
/// Flat energy draw per simulated second
const ENERGY_PER_SECOND: f64 = 10.0;
/// Flat parts per hour
const THROUGHPUT: f64 = 100.0;

impl SinusoidalModel {
    pub fn new(
        name: &'static str,
        waves: Vec<SensorWave>,
        parameters: Vec<ProcessParameter>,
        quality_metrics: Vec<(&'static str, f64)>,
    ) -> Self {
        Self {
            name,
            waves,
            parameters,
            quality_metrics,
        }
    }

    pub fn cnc_machining() -> Self {
        Self::new(
            "cnc_machining",
            vec![
                SensorWave::new("spindle_load", 0.0, 1.0, 10.0, 0.0),
                SensorWave::new("vibration", 0.0, 1.0, 5.0, std::f64::consts::FRAC_PI_2),
                SensorWave::new("tool_temperature", 0.0, 1.0, 7.0, 0.5),
            ],
            vec![
                ProcessParameter::new(
                    "spindle_speed",
                    "Spindle speed",
                    "rpm",
                    (500.0, 12000.0),
                    3000.0,
                    &[("quality", 0.4), ("energy", 0.6)],
                ),
                ProcessParameter::new(
                    "feed_rate",
                    "Feed rate",
                    "mm/min",
                    (50.0, 2000.0),
                    500.0,
                    &[("cycle_time", -0.7), ("quality", -0.3)],
                ),
                ProcessParameter::new(
                    "depth_of_cut",
                    "Depth of cut",
                    "mm",
                    (0.1, 5.0),
                    1.0,
                    &[("cycle_time", -0.5), ("defect_rate", 0.4)],
                ),
            ],
            vec![("surface_roughness", 0.85), ("dimensional_accuracy", 0.9)],
        )
    }

    pub fn assembly_line() -> Self {
        Self::new(
            "assembly_line",
            vec![
                SensorWave::new("station_utilization", 0.0, 1.0, 12.0, 0.0),
                SensorWave::new("conveyor_speed", 0.0, 1.0, 6.0, std::f64::consts::FRAC_PI_2),
                SensorWave::new("queue_length", 0.0, 1.0, 8.0, 0.5),
            ],
            vec![
                ProcessParameter::new(
                    "line_speed",
                    "Line speed",
                    "units/min",
                    (1.0, 60.0),
                    20.0,
                    &[("throughput", 0.8), ("defect_rate", 0.3)],
                ),
                ProcessParameter::new(
                    "station_count",
                    "Active stations",
                    "count",
                    (1.0, 50.0),
                    10.0,
                    &[("throughput", 0.5), ("energy", 0.4)],
                ),
                ProcessParameter::new(
                    "buffer_size",
                    "Inter-station buffer",
                    "units",
                    (0.0, 100.0),
                    20.0,
                    &[("throughput", 0.2)],
                ),
            ],
            vec![("assembly_accuracy", 0.85), ("first_pass_yield", 0.9)],
        )
    }

    pub fn chemical_process() -> Self {
        Self::new(
            "chemical_process",
            vec![
                SensorWave::new("reactor_temperature", 0.0, 1.0, 15.0, 0.0),
                SensorWave::new("reactor_pressure", 0.0, 1.0, 9.0, std::f64::consts::FRAC_PI_2),
                SensorWave::new("concentration", 0.0, 1.0, 20.0, 0.5),
            ],
            vec![
                ProcessParameter::new(
                    "reactor_temperature",
                    "Reactor temperature",
                    "°C",
                    (20.0, 300.0),
                    150.0,
                    &[("quality", 0.6), ("energy", 0.7)],
                ),
                ProcessParameter::new(
                    "reactor_pressure",
                    "Reactor pressure",
                    "bar",
                    (1.0, 50.0),
                    10.0,
                    &[("quality", 0.4)],
                ),
                ProcessParameter::new(
                    "residence_time",
                    "Residence time",
                    "min",
                    (1.0, 120.0),
                    30.0,
                    &[("quality", 0.5), ("throughput", -0.6)],
                ),
            ],
            vec![("purity", 0.85), ("yield", 0.9)],
        )
    }

    pub fn packaging_line() -> Self {
        Self::new(
            "packaging_line",
            vec![
                SensorWave::new("fill_weight", 0.0, 1.0, 4.0, 0.0),
                SensorWave::new("seal_temperature", 0.0, 1.0, 11.0, std::f64::consts::FRAC_PI_2),
                SensorWave::new("line_speed", 0.0, 1.0, 3.0, 0.5),
            ],
            vec![
                ProcessParameter::new(
                    "line_speed",
                    "Line speed",
                    "packs/min",
                    (10.0, 400.0),
                    120.0,
                    &[("throughput", 0.9), ("defect_rate", 0.4)],
                ),
                ProcessParameter::new(
                    "seal_temperature",
                    "Seal temperature",
                    "°C",
                    (100.0, 250.0),
                    160.0,
                    &[("quality", 0.6), ("energy", 0.3)],
                ),
                ProcessParameter::new(
                    "fill_target",
                    "Fill target",
                    "g",
                    (50.0, 1000.0),
                    500.0,
                    &[("quality", 0.2)],
                ),
            ],
            vec![("seal_integrity", 0.85), ("fill_accuracy", 0.9)],
        )
    }
}

impl ProcessModel for SinusoidalModel {
    fn name(&self) -> &str {
        self.name
    }

    fn parameters(&self) -> Vec<ProcessParameter> {
        self.parameters.clone()
    }

    fn simulate(&self, input: &ModelInput<'_>, rng: &mut StdRng) -> Result<ModelOutput> {
        let timestamps = input.timestamps();

        let mut sensor_readings = BTreeMap::new();
        for wave in &self.waves {
            let sigma = if input.include_sensor_noise {
                NOISE_FRACTION * wave.amplitude
            } else {
                0.0
            };
            let values: Vec<f64> = timestamps
                .iter()
                .map(|&t| wave.value_at(t) + gaussian(rng, sigma))
                .collect();
            sensor_readings.insert(wave.sensor.to_string(), values);
        }

        let mut quality_metrics =
            BTreeMap::from([("quality_score".to_string(), DEFAULT_QUALITY_SCORE)]);
        for (name, value) in &self.quality_metrics {
            quality_metrics.insert(name.to_string(), *value);
        }

        Ok(ModelOutput {
            timestamps,
            sensor_readings,
            quality_metrics,
        })
    }

    fn estimate_energy(&self, _parameters: &ParameterMap, duration: f64) -> f64 {
        ENERGY_PER_SECOND * duration
    }

    fn throughput(&self, _parameters: &ParameterMap) -> f64 {
        THROUGHPUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_stub_output_shape() {
        let model = SinusoidalModel::chemical_process();
        let params = ParameterMap::new();
        let input = ModelInput {
            parameters: &params,
            duration: 5.0,
            start_time: 0.0,
            sample_interval: 0.1,
            include_sensor_noise: true,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let out = model.simulate(&input, &mut rng).unwrap();

        assert_eq!(out.timestamps.len(), 50);
        assert_eq!(out.sensor_readings.len(), 3);
        assert!(out.sensor_readings.values().all(|v| v.len() == 50));
        assert_eq!(out.quality_metrics["quality_score"], 0.8);
        assert_eq!(out.quality_metrics["purity"], 0.85);
    }

    #[test]
    fn test_stub_readings_track_wave() {
        let model = SinusoidalModel::cnc_machining();
        let params = ParameterMap::new();
        let input = ModelInput {
            parameters: &params,
            duration: 20.0,
            start_time: 0.0,
            sample_interval: 0.1,
            include_sensor_noise: true,
        };
        let mut rng = StdRng::seed_from_u64(11);
        let out = model.simulate(&input, &mut rng).unwrap();

        let load = &out.sensor_readings["spindle_load"];
        for (t, v) in out.timestamps.iter().zip(load) {
            assert!((v - (t / 10.0).sin()).abs() < 0.6);
        }
    }

    #[test]
    fn test_stub_flat_estimates() {
        let model = SinusoidalModel::packaging_line();
        assert_eq!(model.estimate_energy(&ParameterMap::new(), 3.0), 30.0);
        assert_eq!(model.throughput(&ParameterMap::new()), 100.0);
        assert_eq!(model.parameters().len(), 3);
    }
}
