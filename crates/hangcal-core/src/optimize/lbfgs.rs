//! Projected L-BFGS
//!
//! Limited-memory quasi-Newton search over a box. Variables sitting on a
//! bound with the gradient pushing outward are frozen for the iteration;
//! the two-loop recursion works on the remaining ones and every trial
//! point of the backtracking line search is projected back into the box.

use std::collections::VecDeque;

use nalgebra::DVector;
use tracing::debug;

use super::{BoundedMinimizer, Minimum, Objective};
use crate::bounds::Bounds;
use crate::config::QuasiNewtonConfig;

/// Sufficient decrease constant of the Armijo condition
const ARMIJO: f64 = 1e-4;

/// Correction pair of the limited-memory inverse Hessian
struct Correction {
    s: DVector<f64>,
    y: DVector<f64>,
    rho: f64,
}

/// Bounded quasi-Newton local search
#[derive(Debug, Clone, Default)]
pub struct ProjectedLbfgs {
    config: QuasiNewtonConfig,
}

impl ProjectedLbfgs {
    pub fn new(config: QuasiNewtonConfig) -> Self {
        Self { config }
    }

    /// Same settings with a different iteration budget
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn config(&self) -> &QuasiNewtonConfig {
        &self.config
    }

    /// Variables allowed to move this iteration
    fn free_mask(x: &DVector<f64>, g: &DVector<f64>, bounds: &Bounds) -> Vec<bool> {
        (0..x.len())
            .map(|i| {
                let at_lower = x[i] <= bounds.lower()[i] && g[i] > 0.0;
                let at_upper = x[i] >= bounds.upper()[i] && g[i] < 0.0;
                !(at_lower || at_upper)
            })
            .collect()
    }

    /// Search direction from the two-loop recursion over the free variables
    fn direction(g: &DVector<f64>, free: &[bool], history: &VecDeque<Correction>) -> DVector<f64> {
        let mask = |v: &DVector<f64>| DVector::from_fn(v.len(), |i, _| if free[i] { v[i] } else { 0.0 });

        let mut q = mask(g);
        let mut alphas = Vec::with_capacity(history.len());
        for c in history.iter().rev() {
            let alpha = c.rho * c.s.dot(&q);
            q.axpy(-alpha, &c.y, 1.0);
            alphas.push(alpha);
        }

        let gamma = history
            .back()
            .map(|c| c.s.dot(&c.y) / c.y.dot(&c.y))
            .unwrap_or(1.0);
        let mut r = q * gamma;

        for (c, alpha) in history.iter().zip(alphas.iter().rev()) {
            let beta = c.rho * c.y.dot(&r);
            r.axpy(alpha - beta, &c.s, 1.0);
        }

        -mask(&r)
    }
}

impl BoundedMinimizer for ProjectedLbfgs {
    fn minimize(&self, objective: &dyn Objective, bounds: &Bounds, x0: &DVector<f64>) -> Minimum {
        let n = x0.len();
        let mut x = bounds.project(x0);
        let mut g = DVector::zeros(n);
        let mut f = objective.value_and_gradient(&x, &mut g);
        let mut evaluations = 1;
        let mut history: VecDeque<Correction> = VecDeque::with_capacity(self.config.memory);
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let free = Self::free_mask(&x, &g, bounds);
            let projected_norm = g
                .iter()
                .zip(free.iter())
                .filter(|(_, is_free)| **is_free)
                .fold(0.0_f64, |acc, (gi, _)| acc.max(gi.abs()));
            if projected_norm <= self.config.pgtol || !f.is_finite() {
                break;
            }

            let mut d = Self::direction(&g, &free, &history);
            let mut slope = g.dot(&d);
            if slope >= 0.0 || !slope.is_finite() {
                // Lost curvature information, fall back to steepest descent
                history.clear();
                d = -DVector::from_fn(n, |i, _| if free[i] { g[i] } else { 0.0 });
                slope = g.dot(&d);
                if slope >= 0.0 {
                    break;
                }
            }

            let mut step = if history.is_empty() {
                (1.0 / d.amax()).min(1.0)
            } else {
                1.0
            };

            let mut accepted = None;
            for _ in 0..self.config.max_line_search {
                let trial = bounds.project(&(&x + &d * step));
                let f_trial = objective.value(&trial);
                evaluations += 1;
                let decrease = g.dot(&(&trial - &x));
                if f_trial.is_finite() && f_trial <= f + ARMIJO * decrease {
                    accepted = Some(trial);
                    break;
                }
                step *= 0.5;
            }
            let Some(x_new) = accepted else {
                debug!(iterations, value = f, "line search failed");
                break;
            };

            let mut g_new = DVector::zeros(n);
            let f_new = objective.value_and_gradient(&x_new, &mut g_new);
            evaluations += 1;

            let s = &x_new - &x;
            let y = &g_new - &g;
            let sy = s.dot(&y);
            if sy > f64::EPSILON * y.dot(&y) && sy > 0.0 {
                if history.len() == self.config.memory {
                    history.pop_front();
                }
                history.push_back(Correction { s, y, rho: 1.0 / sy });
            }

            let reduction = f - f_new;
            x = x_new;
            g = g_new;
            let scale = f.abs().max(f_new.abs()).max(1.0);
            f = f_new;
            if reduction <= self.config.ftol * scale {
                break;
            }
        }

        debug!(iterations, evaluations, value = f, "projected L-BFGS finished");
        Minimum {
            x,
            value: f,
            iterations,
            evaluations,
        }
    }
}
