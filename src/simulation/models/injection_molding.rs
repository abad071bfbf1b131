use super::{gaussian, ModelInput, ModelOutput, ProcessModel};
use crate::error::{Error, Result};
use crate::simulation::types::{ParameterMap, ProcessParameter};
use rand::rngs::StdRng;
use std::collections::BTreeMap;

const INJECTION_SECS: f64 = 5.0;
const HOLD_SECS: f64 = 2.0;

const DEFAULT_TEMPERATURE: f64 = 230.0;
const DEFAULT_PRESSURE: f64 = 100.0;
const DEFAULT_COOLING_TIME: f64 = 20.0;
const DEFAULT_INJECTION_SPEED: f64 = 80.0;
const DEFAULT_MOLD_TEMPERATURE: f64 = 50.0;

/// Cyclic injection molding: injection -> hold -> cooling -> ejection.
///
/// Each phase has its own signal shape for melt temperature, cavity pressure,
/// flow rate and power draw. The phase is derived from the absolute sample
/// time, so a run starting at `start_time` continues the cycle where the
/// previous run stopped.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectionMoldingModel;

#[derive(Debug, Clone, Copy)]
struct Setpoint {
    temperature: f64,
    pressure: f64,
    cooling_time: f64,
    injection_speed: f64,
    mold_temperature: f64,
}

impl Setpoint {
    fn from_map(parameters: &ParameterMap) -> Self {
        let get = |name: &str, default: f64| parameters.get(name).copied().unwrap_or(default);
        Self {
            temperature: get("temperature", DEFAULT_TEMPERATURE),
            pressure: get("pressure", DEFAULT_PRESSURE),
            cooling_time: get("cooling_time", DEFAULT_COOLING_TIME),
            injection_speed: get("injection_speed", DEFAULT_INJECTION_SPEED),
            mold_temperature: get("mold_temperature", DEFAULT_MOLD_TEMPERATURE),
        }
    }

    /// Seconds per molded part
    fn cycle_time(&self) -> f64 {
        self.cooling_time + 10.0 + 100.0 / self.injection_speed
    }

    fn validate(&self) -> Result<()> {
        if !(self.injection_speed > 0.0) {
            return Err(Error::SimulationFailure(format!(
                "injection_speed must be positive, got {}",
                self.injection_speed
            )));
        }
        let cycle = self.cycle_time();
        if !cycle.is_finite() || cycle <= 0.0 {
            return Err(Error::SimulationFailure(format!(
                "cycle time must be positive, got {}",
                cycle
            )));
        }
        Ok(())
    }
}

/// One sample of the four sensors
struct Reading {
    temperature: f64,
    pressure: f64,
    flow_rate: f64,
    power: f64,
}

impl InjectionMoldingModel {
    fn sample(sp: &Setpoint, phase_t: f64, rng: &mut StdRng) -> Reading {
        let cooling_len = sp.cooling_time.max(0.0);
        let hold_end = INJECTION_SECS + HOLD_SECS;
        let cool_end = hold_end + cooling_len;

        if phase_t < INJECTION_SECS {
            let frac = phase_t / INJECTION_SECS;
            Reading {
                temperature: sp.temperature + gaussian(rng, 2.0),
                pressure: sp.pressure * frac + gaussian(rng, 3.0),
                flow_rate: sp.injection_speed + gaussian(rng, sp.injection_speed * 0.05),
                power: 0.8 * sp.pressure * sp.injection_speed / 1000.0 + gaussian(rng, 0.1),
            }
        } else if phase_t < hold_end {
            let frac = (phase_t - INJECTION_SECS) / HOLD_SECS;
            Reading {
                temperature: sp.temperature - 10.0 * frac + gaussian(rng, 1.0),
                pressure: sp.pressure + gaussian(rng, 2.0),
                flow_rate: gaussian(rng, 1.0),
                power: 0.5 * sp.pressure / 1000.0 + gaussian(rng, 0.05),
            }
        } else if phase_t < cool_end {
            let frac = (phase_t - hold_end) / cooling_len;
            let from = sp.temperature - 10.0;
            let to = sp.mold_temperature + 20.0;
            Reading {
                temperature: from + (to - from) * frac + gaussian(rng, 1.0),
                pressure: sp.pressure * (1.0 - frac) + gaussian(rng, 1.0),
                flow_rate: gaussian(rng, 0.5),
                power: 0.2 + gaussian(rng, 0.02),
            }
        } else {
            Reading {
                temperature: sp.mold_temperature + 20.0 + gaussian(rng, 1.0),
                pressure: gaussian(rng, 0.5),
                flow_rate: gaussian(rng, 0.5),
                power: 0.3 + gaussian(rng, 0.03),
            }
        }
    }

    /// Quality favors ~220 °C, ~120 MPa, ~15 s cooling, ~60 cm³/s
    fn quality_metrics(sp: &Setpoint) -> ParameterMap {
        let temp_quality = 1.0 - ((sp.temperature - 220.0) / 70.0).abs();
        let pressure_quality = 1.0 - ((sp.pressure - 120.0) / 50.0).abs();
        let cooling_quality = 1.0 - ((sp.cooling_time - 15.0) / 15.0).abs();
        let speed_quality = 1.0 - ((sp.injection_speed - 60.0) / 40.0).abs();

        let quality_score = (0.3 * temp_quality
            + 0.3 * pressure_quality
            + 0.2 * cooling_quality
            + 0.2 * speed_quality)
            .clamp(0.0, 1.0);

        BTreeMap::from([
            ("quality_score".to_string(), quality_score),
            ("dimensional_accuracy".to_string(), 0.95 + 0.05 * quality_score),
            ("surface_finish".to_string(), 0.90 + 0.10 * quality_score),
            ("strength".to_string(), 0.85 + 0.15 * quality_score),
            // Lower is better
            ("warpage".to_string(), 0.05 - 0.04 * quality_score),
        ])
    }
}

impl ProcessModel for InjectionMoldingModel {
    fn name(&self) -> &str {
        "injection_molding"
    }

    fn parameters(&self) -> Vec<ProcessParameter> {
        vec![
            ProcessParameter::new(
                "temperature",
                "Melt temperature",
                "°C",
                (150.0, 350.0),
                DEFAULT_TEMPERATURE,
                &[("quality", 0.7), ("energy", 0.5), ("cycle_time", -0.3)],
            ),
            ProcessParameter::new(
                "pressure",
                "Injection pressure",
                "MPa",
                (50.0, 200.0),
                DEFAULT_PRESSURE,
                &[("quality", 0.6), ("defect_rate", -0.5)],
            ),
            ProcessParameter::new(
                "cooling_time",
                "Cooling time",
                "s",
                (5.0, 60.0),
                DEFAULT_COOLING_TIME,
                &[("cycle_time", 0.8), ("quality", 0.4), ("energy", 0.3)],
            ),
            ProcessParameter::new(
                "injection_speed",
                "Injection speed",
                "cm³/s",
                (10.0, 150.0),
                DEFAULT_INJECTION_SPEED,
                &[("quality", 0.5), ("defect_rate", -0.3)],
            ),
            ProcessParameter::new(
                "mold_temperature",
                "Mold temperature",
                "°C",
                (20.0, 120.0),
                DEFAULT_MOLD_TEMPERATURE,
                &[("quality", 0.6), ("cycle_time", -0.2)],
            ),
        ]
    }

    fn simulate(&self, input: &ModelInput<'_>, rng: &mut StdRng) -> Result<ModelOutput> {
        let sp = Setpoint::from_map(input.parameters);
        sp.validate()?;

        let cycle_time = sp.cycle_time();
        let timestamps = input.timestamps();
        let n = timestamps.len();

        let mut temperature = Vec::with_capacity(n);
        let mut pressure = Vec::with_capacity(n);
        let mut flow_rate = Vec::with_capacity(n);
        let mut power = Vec::with_capacity(n);

        for &t in &timestamps {
            let mut r = Self::sample(&sp, t.rem_euclid(cycle_time), rng);

            if input.include_sensor_noise {
                r.temperature += gaussian(rng, 0.5);
                r.pressure += gaussian(rng, 1.0);
                r.flow_rate += gaussian(rng, 0.5);
                r.power += gaussian(rng, 0.02);
            }

            temperature.push(r.temperature);
            pressure.push(r.pressure);
            flow_rate.push(r.flow_rate);
            power.push(r.power);
        }

        let sensor_readings = BTreeMap::from([
            ("temperature".to_string(), temperature),
            ("pressure".to_string(), pressure),
            ("flow_rate".to_string(), flow_rate),
            ("power".to_string(), power),
        ]);

        Ok(ModelOutput {
            timestamps,
            sensor_readings,
            quality_metrics: Self::quality_metrics(&sp),
        })
    }

    fn estimate_energy(&self, parameters: &ParameterMap, duration: f64) -> f64 {
        let sp = Setpoint::from_map(parameters);
        0.01 * sp.temperature + 0.02 * sp.pressure * duration
    }

    fn throughput(&self, parameters: &ParameterMap) -> f64 {
        3600.0 / Setpoint::from_map(parameters).cycle_time()
    }
}
