//! Scatter search ensemble
//!
//! Rounds of independent local direction-set searches from uniformly
//! sprayed starting points. Every local minimum is filed under a rounded
//! signature of its position, so near-identical minima collapse into one
//! entry. The search stops once a number of consecutive rounds discovers
//! no new signature.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use nalgebra::DVector;
use rand::Rng;
use tracing::{debug, info};

use super::{BoundedMinimizer, DirectionSet, Executor, Minimum, Objective};
use crate::bounds::Bounds;
use crate::config::ScatterConfig;

/// Everything a scatter search found
#[derive(Debug, Clone)]
pub struct ScatterOutcome {
    /// Lowest local minimum
    pub best: Minimum,
    /// Number of distinct minima signatures
    pub distinct_minima: usize,
    /// Rounds performed
    pub rounds: usize,
}

/// Ensemble of local searches from scattered starting points
#[derive(Debug, Clone)]
pub struct ScatterSearch {
    config: ScatterConfig,
    local: DirectionSet,
    executor: Executor,
}

impl ScatterSearch {
    pub fn new(config: ScatterConfig, executor: Executor) -> Self {
        let local = DirectionSet::default()
            .with_relative_tolerance(config.local_tolerance)
            .with_max_generations(config.local_generations);
        Self {
            config,
            local,
            executor,
        }
    }

    /// Rounded position of a minimum
    fn signature(&self, x: &DVector<f64>) -> Vec<i64> {
        let factor = 10f64.powi(self.config.signature_decimals);
        x.iter().map(|v| (v * factor).round() as i64).collect()
    }

    /// Lowest local minimum found
    pub fn run<R: Rng + ?Sized>(&self, objective: &dyn Objective, bounds: &Bounds, rng: &mut R) -> Minimum {
        self.search(objective, bounds, rng).best
    }

    /// Run rounds until no new minimum shows up
    pub fn search<R: Rng + ?Sized>(
        &self,
        objective: &dyn Objective,
        bounds: &Bounds,
        rng: &mut R,
    ) -> ScatterOutcome {
        let searches = self.config.searches_per_round.max(1);
        let mut minima: BTreeMap<Vec<i64>, Minimum> = BTreeMap::new();
        let mut stale_rounds = 0;
        let mut rounds = 0;

        while rounds < self.config.max_rounds.max(1) {
            rounds += 1;

            // Starting points are drawn up front so results do not depend on the executor
            let starts: Vec<DVector<f64>> = (0..searches).map(|_| bounds.sample(rng)).collect();
            let local = &self.local;
            let results = self
                .executor
                .map(starts, |x0| local.minimize(objective, bounds, &x0));

            let mut discovered = 0;
            for minimum in results {
                match minima.entry(self.signature(&minimum.x)) {
                    Entry::Vacant(entry) => {
                        entry.insert(minimum);
                        discovered += 1;
                    }
                    Entry::Occupied(mut entry) => {
                        if minimum.improves_on(entry.get()) {
                            entry.insert(minimum);
                        }
                    }
                }
            }

            info!(round = rounds, discovered, distinct = minima.len(), "scatter search");
            if discovered == 0 {
                stale_rounds += 1;
                if stale_rounds >= self.config.retry {
                    break;
                }
            } else {
                stale_rounds = 0;
            }
        }

        let distinct_minima = minima.len();
        let mut best: Option<Minimum> = None;
        for minimum in minima.into_values() {
            if best.as_ref().map_or(true, |b| minimum.improves_on(b)) {
                best = Some(minimum);
            }
        }
        // At least one search ran, so the map is never empty
        let best = best.unwrap_or_else(|| {
            let x = bounds.sample(rng);
            let value = objective.value(&x);
            Minimum {
                x,
                value,
                iterations: 0,
                evaluations: 1,
            }
        });

        debug!(rounds, distinct_minima, value = best.value, "scatter search finished");
        ScatterOutcome {
            best,
            distinct_minima,
            rounds,
        }
    }
}
