//! Bayesian optimization with a Gaussian-process surrogate.
//!
//! Inputs are scaled to the unit cube and scores standardized before fitting.
//! The kernel is Matérn 5/2 with a fixed length scale; each guided iteration
//! scores random candidates with the upper confidence bound `mu + kappa * sigma`
//! and evaluates the best one.

use super::objective::{Bound, Objective};
use super::strategy::{assignment, SearchStrategy};
use crate::config::OptimizerSettings;
use crate::error::Result;
use crate::simulation::ParameterMap;
use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, warn};

/// Kernel length scale on unit-cube inputs
const LENGTH_SCALE: f64 = 0.25;
/// Diagonal jitter added to the kernel matrix
const NOISE: f64 = 1e-6;
/// Jitter escalations tried before giving up on a fit
const MAX_JITTER_STEPS: i32 = 6;

#[derive(Debug, Clone)]
pub struct BayesianOptimization {
    pub init_points: usize,
    pub kappa: f64,
    pub candidates: usize,
}

impl From<&OptimizerSettings> for BayesianOptimization {
    fn from(settings: &OptimizerSettings) -> Self {
        Self {
            init_points: settings.bayesian_init_points,
            kappa: settings.bayesian_kappa,
            candidates: settings.bayesian_candidates,
        }
    }
}

impl Default for BayesianOptimization {
    fn default() -> Self {
        Self::from(&OptimizerSettings::default())
    }
}

fn matern52(a: &[f64], b: &[f64]) -> f64 {
    let distance = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt();
    let s = 5f64.sqrt() * distance / LENGTH_SCALE;
    (1.0 + s + s * s / 3.0) * (-s).exp()
}

/// GP posterior over standardized scores
struct GaussianProcess<'a> {
    xs: &'a [Vec<f64>],
    cholesky: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    y_mean: f64,
    y_std: f64,
}

impl<'a> GaussianProcess<'a> {
    fn fit(xs: &'a [Vec<f64>], ys: &[f64]) -> Option<Self> {
        let n = ys.len();
        if n == 0 {
            return None;
        }
        let y_mean = ys.iter().sum::<f64>() / n as f64;
        let variance = ys.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / n as f64;
        let y_std = if variance.sqrt() > 1e-12 { variance.sqrt() } else { 1.0 };
        let y = DVector::from_iterator(n, ys.iter().map(|y| (y - y_mean) / y_std));

        let kernel = DMatrix::from_fn(n, n, |i, j| matern52(&xs[i], &xs[j]));
        for step in 0..MAX_JITTER_STEPS {
            let jitter = NOISE * 10f64.powi(step);
            let k = &kernel + DMatrix::identity(n, n) * jitter;
            if let Some(cholesky) = k.cholesky() {
                let alpha = cholesky.solve(&y);
                return Some(Self {
                    xs,
                    cholesky,
                    alpha,
                    y_mean,
                    y_std,
                });
            }
        }
        None
    }

    /// Posterior mean and standard deviation at each candidate, in score units
    fn predict(&self, candidates: &[Vec<f64>]) -> Vec<(f64, f64)> {
        let k_star = DMatrix::from_fn(self.xs.len(), candidates.len(), |i, j| {
            matern52(&self.xs[i], &candidates[j])
        });
        let means = k_star.transpose() * &self.alpha;
        let solved = self.cholesky.solve(&k_star);

        (0..candidates.len())
            .map(|j| {
                let variance = (1.0 - k_star.column(j).dot(&solved.column(j))).max(0.0);
                (
                    self.y_mean + self.y_std * means[j],
                    self.y_std * variance.sqrt(),
                )
            })
            .collect()
    }
}

/// Observed points in unit-cube coordinates
#[derive(Default)]
struct Observations {
    xs: Vec<Vec<f64>>,
    scores: Vec<f64>,
    best: Option<(f64, Vec<f64>)>,
}

impl Observations {
    fn observe(&mut self, objective: &Objective<'_>, bounds: &[Bound], unit: Vec<f64>) -> Result<()> {
        let values: Vec<f64> = bounds.iter().zip(&unit).map(|(b, &u)| b.lerp(u)).collect();
        let score = objective.evaluate(&assignment(bounds, &values))?.score;
        if self.best.as_ref().map_or(true, |(best, _)| score > *best) {
            self.best = Some((score, values));
        }
        self.xs.push(unit);
        self.scores.push(score);
        Ok(())
    }
}

fn random_unit(dimensions: usize, rng: &mut StdRng) -> Vec<f64> {
    (0..dimensions).map(|_| rng.gen::<f64>()).collect()
}

impl SearchStrategy for BayesianOptimization {
    fn name(&self) -> &'static str {
        "bayesian_optimization"
    }

    fn search(
        &self,
        objective: &Objective<'_>,
        bounds: &[Bound],
        max_iterations: usize,
        rng: &mut StdRng,
    ) -> Result<ParameterMap> {
        if bounds.is_empty() {
            objective.evaluate(&ParameterMap::new())?;
            return Ok(ParameterMap::new());
        }

        let dimensions = bounds.len();
        let budget = max_iterations.max(1);
        let init_points = self.init_points.clamp(1, budget);
        let mut observed = Observations::default();

        for _ in 0..init_points {
            observed.observe(objective, bounds, random_unit(dimensions, rng))?;
        }

        for iteration in init_points..budget {
            let candidates: Vec<Vec<f64>> = (0..self.candidates.max(1))
                .map(|_| random_unit(dimensions, rng))
                .collect();

            let next = match GaussianProcess::fit(&observed.xs, &observed.scores) {
                Some(gp) => gp
                    .predict(&candidates)
                    .into_iter()
                    .map(|(mean, std)| mean + self.kappa * std)
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(i, _)| i)
                    .unwrap_or(0),
                None => {
                    warn!(iteration, "Surrogate fit failed, sampling at random");
                    0
                }
            };
            let chosen = candidates.into_iter().nth(next).unwrap_or_else(|| random_unit(dimensions, rng));
            observed.observe(objective, bounds, chosen)?;

            if let Some((score, _)) = &observed.best {
                debug!(iteration, best_score = *score, "Bayesian optimization iteration");
            }
        }

        Ok(observed
            .best
            .map(|(_, values)| assignment(bounds, &values))
            .unwrap_or_else(|| bounds.iter().map(|b| (b.name.clone(), b.midpoint())).collect()))
    }
}
