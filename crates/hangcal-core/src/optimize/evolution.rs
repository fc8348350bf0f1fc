//! Differential evolution
//!
//! Best1Bin strategy with a generational update: every trial vector is
//! built from the best member of the previous generation plus a weighted
//! difference of two other members, binomially crossed with its parent,
//! clipped into the box and optionally repaired.

use std::collections::VecDeque;

use nalgebra::DVector;
use rand::Rng;
use tracing::{debug, info};

use super::{Minimum, Objective};
use crate::bounds::Bounds;
use crate::config::EvolutionConfig;

/// Smallest population Best1Bin can draw distinct members from
const MIN_POPULATION: usize = 4;

/// Feasibility nudge applied to every trial vector
pub type Repair<'a> = &'a dyn Fn(&DVector<f64>) -> DVector<f64>;

/// Global derivative-free search over the whole box
#[derive(Debug, Clone, Default)]
pub struct DifferentialEvolution {
    config: EvolutionConfig,
}

impl DifferentialEvolution {
    pub fn new(config: EvolutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Two distinct members, both different from `exclude`
    fn pick_pair<R: Rng + ?Sized>(rng: &mut R, size: usize, exclude: usize) -> (usize, usize) {
        let mut r1 = rng.gen_range(0..size);
        while r1 == exclude {
            r1 = rng.gen_range(0..size);
        }
        let mut r2 = rng.gen_range(0..size);
        while r2 == exclude || r2 == r1 {
            r2 = rng.gen_range(0..size);
        }
        (r1, r2)
    }

    /// Run the evolution until a termination criterion fires
    ///
    /// # Arguments
    /// * `objective` - function to minimize
    /// * `bounds` - box for the initial population and every trial vector
    /// * `repair` - optional nudge applied to the initial members and to
    ///   trial vectors after clipping
    /// * `rng` - random source for population and mutation
    pub fn run<R: Rng + ?Sized>(
        &self,
        objective: &dyn Objective,
        bounds: &Bounds,
        repair: Option<Repair<'_>>,
        rng: &mut R,
    ) -> Minimum {
        let size = self.config.population.max(MIN_POPULATION);
        let dim = bounds.len();

        let mut population: Vec<DVector<f64>> = (0..size)
            .map(|_| {
                let member = bounds.sample(rng);
                match repair {
                    Some(repair) => bounds.project(&repair(&member)),
                    None => member,
                }
            })
            .collect();
        let mut fitness: Vec<f64> = population.iter().map(|x| objective.value(x)).collect();
        let mut evaluations = size;

        let mut best = best_index(&fitness);
        let mut history: VecDeque<f64> = VecDeque::with_capacity(self.config.change_generations + 2);
        history.push_back(fitness[best]);
        let mut generations = 0;

        while generations < self.config.max_generations {
            let best_value = fitness[best];
            if best_value <= self.config.target_value {
                break;
            }
            if history.len() > self.config.change_generations
                && history.front().map_or(false, |old| (old - best_value).abs() <= self.config.change_tolerance)
            {
                break;
            }
            generations += 1;

            let leader = population[best].clone();
            let mut next = population.clone();
            let mut next_fitness = fitness.clone();

            for i in 0..size {
                let (r1, r2) = Self::pick_pair(rng, size, i);
                let forced = rng.gen_range(0..dim);

                let mut trial = DVector::from_fn(dim, |j, _| {
                    if j == forced || rng.gen::<f64>() < self.config.crossover {
                        leader[j] + self.config.mutation * (population[r1][j] - population[r2][j])
                    } else {
                        population[i][j]
                    }
                });
                bounds.project_in_place(&mut trial);
                if let Some(repair) = repair {
                    trial = bounds.project(&repair(&trial));
                }

                let value = objective.value(&trial);
                evaluations += 1;
                if value <= fitness[i] || fitness[i].is_nan() {
                    next[i] = trial;
                    next_fitness[i] = value;
                }
            }

            population = next;
            fitness = next_fitness;
            best = best_index(&fitness);

            history.push_back(fitness[best]);
            if history.len() > self.config.change_generations + 1 {
                history.pop_front();
            }
            if self.config.log_interval > 0 && generations % self.config.log_interval == 0 {
                info!(generation = generations, best = fitness[best], "differential evolution");
            }
        }

        debug!(generations, evaluations, value = fitness[best], "differential evolution finished");
        Minimum {
            x: population.swap_remove(best),
            value: fitness[best],
            iterations: generations,
            evaluations,
        }
    }
}

/// Index of the lowest value, NaN counting as worst
fn best_index(values: &[f64]) -> usize {
    let key = |v: f64| if v.is_nan() { f64::INFINITY } else { v };
    values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| key(**a).total_cmp(&key(**b)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
