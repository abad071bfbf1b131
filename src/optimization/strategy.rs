use super::objective::{Bound, Objective};
use crate::error::Result;
use crate::simulation::ParameterMap;
use rand::rngs::StdRng;

/// A parameter search algorithm.
///
/// Strategies see the objective as a black box: they propose free-parameter
/// assignments within `bounds` and keep the best-scoring one.
pub trait SearchStrategy {
    fn name(&self) -> &'static str;

    /// Best free-parameter assignment found within the iteration budget
    fn search(
        &self,
        objective: &Objective<'_>,
        bounds: &[Bound],
        max_iterations: usize,
        rng: &mut StdRng,
    ) -> Result<ParameterMap>;
}

/// Free-parameter map from values ordered like `bounds`
pub(crate) fn assignment(bounds: &[Bound], values: &[f64]) -> ParameterMap {
    bounds
        .iter()
        .zip(values)
        .map(|(bound, value)| (bound.name.clone(), *value))
        .collect()
}
