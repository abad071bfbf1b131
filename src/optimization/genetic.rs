use super::objective::{Bound, Objective};
use super::strategy::{assignment, SearchStrategy};
use crate::config::OptimizerSettings;
use crate::error::Result;
use crate::simulation::ParameterMap;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;
use tracing::debug;

/// Relative size of a mutation step (fraction of the parameter range)
const MUTATION_SPAN: f64 = 0.1;

/// Generational genetic algorithm with elitism and tournament selection.
///
/// Each generation evaluates the whole population; `max_iterations` is the
/// number of generations. Children take each gene from either parent with
/// equal probability, then mutate by up to 10% of the range.
#[derive(Debug, Clone)]
pub struct GeneticAlgorithm {
    pub population_size: usize,
    pub elitism_count: usize,
    pub tournament_size: usize,
    pub mutation_rate: f64,
}

impl From<&OptimizerSettings> for GeneticAlgorithm {
    fn from(settings: &OptimizerSettings) -> Self {
        Self {
            population_size: settings.population_size,
            elitism_count: settings.elitism_count,
            tournament_size: settings.tournament_size,
            mutation_rate: settings.mutation_rate,
        }
    }
}

impl Default for GeneticAlgorithm {
    fn default() -> Self {
        Self::from(&OptimizerSettings::default())
    }
}

type Genome = Vec<f64>;

impl GeneticAlgorithm {
    /// Best of `tournament_size` distinct individuals
    fn tournament(&self, scores: &[f64], rng: &mut StdRng) -> usize {
        let size = self.tournament_size.clamp(1, scores.len());
        index::sample(rng, scores.len(), size)
            .into_iter()
            .max_by(|&a, &b| scores[a].total_cmp(&scores[b]))
            .unwrap_or(0)
    }

    fn breed(&self, a: &Genome, b: &Genome, bounds: &[Bound], rng: &mut StdRng) -> Genome {
        a.iter()
            .zip(b)
            .zip(bounds)
            .map(|((&x, &y), bound)| {
                let mut gene = if rng.gen_bool(0.5) { x } else { y };
                if rng.gen::<f64>() < self.mutation_rate {
                    let delta = bound.span() * MUTATION_SPAN;
                    gene = (gene + rng.gen_range(-delta..=delta)).clamp(bound.min, bound.max);
                }
                gene
            })
            .collect()
    }
}

impl SearchStrategy for GeneticAlgorithm {
    fn name(&self) -> &'static str {
        "genetic_algorithm"
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

        let population_size = self.population_size.max(2);
        let elites = self.elitism_count.min(population_size);

        let mut population: Vec<Genome> = (0..population_size)
            .map(|_| bounds.iter().map(|b| b.lerp(rng.gen::<f64>())).collect())
            .collect();
        let mut best: Option<(f64, Genome)> = None;

        for generation in 0..max_iterations.max(1) {
            let mut scores = Vec::with_capacity(population.len());
            for genome in &population {
                let evaluation = objective.evaluate(&assignment(bounds, genome))?;
                if best.as_ref().map_or(true, |(score, _)| evaluation.score > *score) {
                    best = Some((evaluation.score, genome.clone()));
                }
                scores.push(evaluation.score);
            }

            let mut ranked: Vec<usize> = (0..population.len()).collect();
            ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

            let mut next: Vec<Genome> = ranked
                .iter()
                .take(elites)
                .map(|&i| population[i].clone())
                .collect();
            while next.len() < population_size {
                let first = self.tournament(&scores, rng);
                let second = self.tournament(&scores, rng);
                next.push(self.breed(&population[first], &population[second], bounds, rng));
            }
            population = next;

            if let Some((score, _)) = &best {
                debug!(generation, best_score = *score, "Genetic algorithm generation");
            }
        }

        Ok(best
            .map(|(_, genome)| assignment(bounds, &genome))
            .unwrap_or_else(|| bounds.iter().map(|b| (b.name.clone(), b.midpoint())).collect()))
    }
}
