use super::types::{DisruptionEffect, DisruptionKind, Severity, TwinEvent, TwinEventKind};
use crate::error::{Error, Result};
use crate::simulation::{ParameterMap, DEFAULT_QUALITY_SCORE};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::Rng;

const KINDS: [(DisruptionKind, f64); 4] = [
    (DisruptionKind::MachineFailure, 0.2),
    (DisruptionKind::MaterialDeviation, 0.3),
    (DisruptionKind::PowerFluctuation, 0.3),
    (DisruptionKind::QualityAlert, 0.2),
];

const SEVERITIES: [(Severity, f64); 3] = [
    (Severity::Low, 0.6),
    (Severity::Medium, 0.3),
    (Severity::High, 0.1),
];

/// Simulated seconds until a machine failure is repaired
const REPAIR_WINDOW: std::ops::Range<f64> = 10.0..60.0;

/// Parameter value to put back once a machine failure is repaired
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PendingRestoration {
    pub due_at: f64,
    pub parameter: String,
    pub original: f64,
    /// Value written by the failure; restoration is skipped if it changed since
    pub perturbed: f64,
}

impl PendingRestoration {
    /// Apply if due. Returns the restoration event when the value was put back.
    pub fn apply(&self, now: f64, parameters: &mut ParameterMap) -> Option<TwinEvent> {
        if now < self.due_at {
            return None;
        }
        let current = parameters.get_mut(&self.parameter)?;
        if *current != self.perturbed {
            return None;
        }
        *current = self.original;
        Some(TwinEvent {
            timestamp: now,
            kind: TwinEventKind::ParameterRestoration {
                parameter: self.parameter.clone(),
                value: self.original,
                related_event_type: DisruptionKind::MachineFailure,
            },
        })
    }
}

/// Outcome of one injected disruption
#[derive(Clone, Debug)]
pub(crate) struct Disruption {
    pub event: TwinEvent,
    pub restoration: Option<PendingRestoration>,
}

fn pick<T: Copy>(rng: &mut StdRng, table: &[(T, f64)]) -> Result<T> {
    let dist = WeightedIndex::new(table.iter().map(|(_, w)| *w))
        .map_err(|e| Error::SimulationFailure(format!("invalid event weights: {}", e)))?;
    Ok(table[dist.sample(rng)].0)
}

/// Draw one disruption and apply its effect to the live parameters and metrics
pub(crate) fn inject(
    rng: &mut StdRng,
    now: f64,
    parameters: &mut ParameterMap,
    metrics: &mut ParameterMap,
) -> Result<Disruption> {
    let kind = pick(rng, &KINDS)?;
    let severity = pick(rng, &SEVERITIES)?;
    let mut restoration = None;

    let effect = match kind {
        DisruptionKind::MachineFailure => {
            if parameters.is_empty() {
                DisruptionEffect::None
            } else {
                let index = rng.gen_range(0..parameters.len());
                match parameters.iter_mut().nth(index) {
                    Some((name, value)) => {
                        let original = *value;
                        let deviation = 0.2 * original * (rng.gen::<f64>() - 0.5);
                        *value = original + deviation;
                        let due_at = now + rng.gen_range(REPAIR_WINDOW);
                        restoration = Some(PendingRestoration {
                            due_at,
                            parameter: name.clone(),
                            original,
                            perturbed: *value,
                        });
                        DisruptionEffect::ParameterDeviation {
                            parameter: name.clone(),
                            deviation,
                            restore_at: due_at,
                        }
                    }
                    None => DisruptionEffect::None,
                }
            }
        }
        DisruptionKind::MaterialDeviation => {
            let impact = -0.1 * rng.gen::<f64>();
            let quality = metrics.entry("quality_score".to_string()).or_insert(DEFAULT_QUALITY_SCORE);
            *quality = (*quality + impact).clamp(0.0, 1.0);
            DisruptionEffect::QualityImpact(impact)
        }
        DisruptionKind::PowerFluctuation => {
            let impact = 0.15 * rng.gen::<f64>();
            let energy = metrics.entry("energy_consumption".to_string()).or_insert(100.0);
            *energy *= 1.0 + impact;
            DisruptionEffect::EnergyImpact(impact)
        }
        DisruptionKind::QualityAlert => {
            let impact = 0.05 * rng.gen::<f64>();
            let defects = metrics.entry("defect_rate".to_string()).or_insert(0.0);
            *defects = (*defects + impact).clamp(0.0, 1.0);
            DisruptionEffect::DefectImpact(impact)
        }
    };

    Ok(Disruption {
        event: TwinEvent {
            timestamp: now,
            kind: TwinEventKind::RandomEvent {
                event_type: kind,
                severity,
                effect,
            },
        },
        restoration,
    })
}

/// Queue a restoration. A failure that hits a parameter still awaiting repair
/// takes over the earlier restoration, so the pre-failure value is restored.
pub(crate) fn schedule(pending: &mut Vec<PendingRestoration>, mut restoration: PendingRestoration) {
    if let Some(index) = pending.iter().position(|p| p.parameter == restoration.parameter) {
        let earlier = pending.remove(index);
        // A manual change in between already voided the earlier restoration
        if earlier.perturbed == restoration.original {
            restoration.original = earlier.original;
        }
    }
    pending.push(restoration);
}
