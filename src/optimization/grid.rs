use super::objective::{Bound, Objective};
use super::strategy::{assignment, SearchStrategy};
use crate::error::{Error, Result};
use crate::simulation::models::linspace;
use crate::simulation::ParameterMap;
use rand::rngs::StdRng;
use tracing::{debug, warn};

/// Exhaustive search over an evenly spaced grid.
///
/// Points per dimension are `max(2, floor(max_iterations^(1/n)))`. Points
/// violating a hard constraint are discarded; if none survive, the midpoint of
/// every range is returned. Deterministic for a seeded objective.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSearch;

/// Grid density for `dimensions` free parameters
pub fn points_per_dimension(max_iterations: usize, dimensions: usize) -> usize {
    if dimensions == 0 {
        return 1;
    }
    // Epsilon keeps exact roots (1000^(1/3)) from rounding down
    let root = (max_iterations as f64).powf(1.0 / dimensions as f64);
    ((root + 1e-9).floor() as usize).max(2)
}

impl SearchStrategy for GridSearch {
    fn name(&self) -> &'static str {
        "grid_search"
    }

    fn search(
        &self,
        objective: &Objective<'_>,
        bounds: &[Bound],
        max_iterations: usize,
        _rng: &mut StdRng,
    ) -> Result<ParameterMap> {
        if bounds.is_empty() {
            objective.evaluate(&ParameterMap::new())?;
            return Ok(ParameterMap::new());
        }

        let per_dim = points_per_dimension(max_iterations, bounds.len());
        let axes: Vec<Vec<f64>> = bounds
            .iter()
            .map(|b| linspace(b.min, b.max, per_dim))
            .collect();
        debug!(points_per_dim = per_dim, dimensions = bounds.len(), "Grid search started");

        let mut best: Option<(f64, Vec<f64>)> = None;
        let mut visited = 0;
        // Odometer over the Cartesian product, last dimension fastest
        let mut index = vec![0usize; bounds.len()];
        loop {
            let values: Vec<f64> = index.iter().zip(&axes).map(|(&i, axis)| axis[i]).collect();
            let evaluation = objective.evaluate(&assignment(bounds, &values))?;
            visited += 1;

            if evaluation.is_feasible() && best.as_ref().map_or(true, |(score, _)| evaluation.score > *score) {
                best = Some((evaluation.score, values));
            }

            if !advance(&mut index, per_dim) {
                break;
            }
        }

        match best {
            Some((_, values)) => Ok(assignment(bounds, &values)),
            None => {
                warn!(
                    reason = %Error::ConstraintInfeasible(visited),
                    "Grid search found no feasible point, using range midpoints"
                );
                Ok(bounds.iter().map(|b| (b.name.clone(), b.midpoint())).collect())
            }
        }
    }
}

/// Step the odometer; false once every combination was visited
fn advance(index: &mut [usize], radix: usize) -> bool {
    for digit in index.iter_mut().rev() {
        *digit += 1;
        if *digit < radix {
            return true;
        }
        *digit = 0;
    }
    false
}
