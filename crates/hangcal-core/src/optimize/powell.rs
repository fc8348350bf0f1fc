//! Bounded Powell direction set search
//!
//! Derivative-free local search. Each generation minimizes along every
//! direction of the set in turn, then tries the overall displacement of the
//! generation as a new direction, replacing the direction that gave the
//! largest decrease. Line searches follow the projected path: trial points
//! are clipped into the box, so a direction pointing into an active face
//! still moves the remaining coordinates. A generation without progress
//! resets the set to the coordinate axes; the search only ends on no
//! progress once the axes fail too.

use std::cell::Cell;
use std::collections::VecDeque;

use nalgebra::DVector;
use tracing::{debug, trace};

use super::{BoundedMinimizer, Minimum, Objective};
use crate::bounds::Bounds;
use crate::config::DirectionSetConfig;

/// Golden ratio growth of the bracketing step
const GOLD: f64 = 1.618034;
/// Golden section fraction of Brent's method
const CGOLD: f64 = 0.381966;
/// Absolute floor of the Brent tolerance
const ZEPS: f64 = 1e-12;
/// Iteration cap of one Brent minimization
const BRENT_ITERATIONS: usize = 100;

/// Objective wrapper counting evaluations along one line
struct Line<'a> {
    objective: &'a dyn Objective,
    bounds: &'a Bounds,
    origin: &'a DVector<f64>,
    direction: &'a DVector<f64>,
    evaluations: &'a Cell<usize>,
}

impl Line<'_> {
    fn point(&self, t: f64) -> DVector<f64> {
        self.bounds.project(&(self.origin + self.direction * t))
    }

    fn value(&self, t: f64) -> f64 {
        self.evaluations.set(self.evaluations.get() + 1);
        self.objective.value(&self.point(t))
    }

    /// Step interval [t_min, t_max] over which the projected point moves
    ///
    /// Beyond it every coordinate sits on a bound and the path is constant.
    fn path_interval(&self) -> (f64, f64) {
        let mut t_min: f64 = 0.0;
        let mut t_max: f64 = 0.0;
        for i in 0..self.origin.len() {
            let d = self.direction[i];
            if d == 0.0 {
                continue;
            }
            let to_lower = (self.bounds.lower()[i] - self.origin[i]) / d;
            let to_upper = (self.bounds.upper()[i] - self.origin[i]) / d;
            t_min = t_min.min(to_lower.min(to_upper));
            t_max = t_max.max(to_lower.max(to_upper));
        }
        (t_min, t_max)
    }

    /// Minimize along the line starting from t = 0
    ///
    /// Returns the best step and its value, never worse than `f0`.
    fn minimize(&self, f0: f64, step: f64, tol: f64) -> (f64, f64) {
        let (t_min, t_max) = self.path_interval();
        if t_max - t_min <= 0.0 {
            return (0.0, f0);
        }

        let mut b = step.min(t_max);
        if b <= 0.0 {
            b = (-step).max(t_min);
        }
        let mut fb = self.value(b);
        let mut a: f64 = 0.0;

        if !(fb < f0) {
            let c = (-b).clamp(t_min, t_max);
            if c == 0.0 {
                return self.brent(a.min(b), a.max(b), 0.0, f0, tol);
            }
            let fc = self.value(c);
            if !(fc < f0) {
                return self.brent(b.min(c), b.max(c), 0.0, f0, tol);
            }
            b = c;
            fb = fc;
        }

        // Downhill from a to b, expand until the value rises or the box ends
        loop {
            let limit = if b > a { t_max } else { t_min };
            if b == limit {
                return self.brent(a.min(b), a.max(b), b, fb, tol);
            }
            let c = if b > a {
                (b + GOLD * (b - a)).min(limit)
            } else {
                (b + GOLD * (b - a)).max(limit)
            };
            let fc = self.value(c);
            if !(fc < fb) {
                return self.brent(a.min(c), a.max(c), b, fb, tol);
            }
            a = b;
            b = c;
            fb = fc;
        }
    }

    /// Brent's method on [lo, hi] from a known best point
    fn brent(&self, lo: f64, hi: f64, x_best: f64, f_best: f64, tol: f64) -> (f64, f64) {
        let (mut a, mut b) = (lo, hi);
        let (mut x, mut w, mut v) = (x_best, x_best, x_best);
        let (mut fx, mut fw, mut fv) = (f_best, f_best, f_best);
        let mut d: f64 = 0.0;
        let mut e: f64 = 0.0;

        for _ in 0..BRENT_ITERATIONS {
            let xm = 0.5 * (a + b);
            let tol1 = tol * x.abs() + ZEPS;
            let tol2 = 2.0 * tol1;
            if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
                break;
            }

            if e.abs() > tol1 {
                // Parabolic fit through x, w, v
                let r = (x - w) * (fx - fv);
                let mut q = (x - v) * (fx - fw);
                let mut p = (x - v) * q - (x - w) * r;
                q = 2.0 * (q - r);
                if q > 0.0 {
                    p = -p;
                }
                q = q.abs();
                let e_prev = e;
                e = d;
                if p.abs() >= (0.5 * q * e_prev).abs() || p <= q * (a - x) || p >= q * (b - x) {
                    e = if x >= xm { a - x } else { b - x };
                    d = CGOLD * e;
                } else {
                    d = p / q;
                    let u = x + d;
                    if u - a < tol2 || b - u < tol2 {
                        d = tol1.copysign(xm - x);
                    }
                }
            } else {
                e = if x >= xm { a - x } else { b - x };
                d = CGOLD * e;
            }

            let u = if d.abs() >= tol1 { x + d } else { x + tol1.copysign(d) };
            let fu = self.value(u);

            if fu <= fx {
                if u >= x {
                    a = x;
                } else {
                    b = x;
                }
                v = w;
                fv = fw;
                w = x;
                fw = fx;
                x = u;
                fx = fu;
            } else {
                if u < x {
                    a = u;
                } else {
                    b = u;
                }
                if fu <= fw || w == x {
                    v = w;
                    fv = fw;
                    w = u;
                    fw = fu;
                } else if fu <= fv || v == x || v == w {
                    v = u;
                    fv = fu;
                }
            }
        }

        if fx < f_best {
            (x, fx)
        } else {
            (x_best, f_best)
        }
    }
}

/// Bounded derivative-free local search
#[derive(Debug, Clone, Default)]
pub struct DirectionSet {
    config: DirectionSetConfig,
}

impl DirectionSet {
    pub fn new(config: DirectionSetConfig) -> Self {
        Self { config }
    }

    /// Stop on a relative change of the best value
    pub fn with_relative_tolerance(mut self, tolerance: f64) -> Self {
        self.config.relative_change = true;
        self.config.change_tolerance = tolerance;
        self
    }

    pub fn with_max_generations(mut self, max_generations: usize) -> Self {
        self.config.max_generations = max_generations;
        self
    }

    pub fn config(&self) -> &DirectionSetConfig {
        &self.config
    }

    fn stalled(&self, history: &VecDeque<f64>, value: f64) -> bool {
        if history.len() <= self.config.change_generations {
            return false;
        }
        let Some(&old) = history.front() else {
            return false;
        };
        let change = (old - value).abs();
        if self.config.relative_change {
            change <= self.config.change_tolerance * old.abs()
        } else {
            change <= self.config.change_tolerance
        }
    }
}

impl BoundedMinimizer for DirectionSet {
    fn minimize(&self, objective: &dyn Objective, bounds: &Bounds, x0: &DVector<f64>) -> Minimum {
        let n = x0.len();
        let evaluations = Cell::new(1);
        let mut x = bounds.project(x0);
        let mut f = objective.value(&x);

        let mut directions = axes(n);
        let mut steps = initial_steps(bounds);
        let mut on_axes = true;
        let mut stall_reset_used = false;

        let mut history: VecDeque<f64> = VecDeque::with_capacity(self.config.change_generations + 2);
        history.push_back(f);
        let mut generations = 0;

        while generations < self.config.max_generations {
            if f <= self.config.target_value || evaluations.get() >= self.config.max_evaluations {
                break;
            }
            if self.stalled(&history, f) {
                if on_axes || stall_reset_used {
                    break;
                }
                // One more chance with a fresh basis
                debug!(generations, value = f, "direction set stalled, resetting to axes");
                directions = axes(n);
                steps = initial_steps(bounds);
                on_axes = true;
                stall_reset_used = true;
                history.clear();
                history.push_back(f);
            }
            generations += 1;

            let x_start = x.clone();
            let f_start = f;
            let mut largest_drop = 0.0;
            let mut largest_index = 0;

            for (i, direction) in directions.iter().enumerate() {
                let line = Line {
                    objective,
                    bounds,
                    origin: &x,
                    direction,
                    evaluations: &evaluations,
                };
                let (t, f_new) = line.minimize(f, steps[i], self.config.line_tolerance);
                if t != 0.0 {
                    steps[i] = t.abs();
                    let x_new = line.point(t);
                    if f - f_new > largest_drop {
                        largest_drop = f - f_new;
                        largest_index = i;
                    }
                    x = x_new;
                    f = f_new;
                } else {
                    steps[i] = (steps[i] * 0.5).max(1e-12);
                }
            }

            // Powell's test for replacing the direction of largest decrease
            let displacement = &x - &x_start;
            let length = displacement.norm();
            if length > 0.0 {
                let extrapolated = bounds.project(&(&x + &displacement));
                let f_ext = objective.value(&extrapolated);
                evaluations.set(evaluations.get() + 1);
                if f_ext < f_start {
                    let t = 2.0 * (f_start - 2.0 * f + f_ext) * (f_start - f - largest_drop).powi(2)
                        - largest_drop * (f_start - f_ext).powi(2);
                    if t < 0.0 {
                        let direction = displacement / length;
                        let line = Line {
                            objective,
                            bounds,
                            origin: &x,
                            direction: &direction,
                            evaluations: &evaluations,
                        };
                        let (t, f_new) = line.minimize(f, length, self.config.line_tolerance);
                        if t != 0.0 {
                            x = line.point(t);
                            f = f_new;
                        }
                        directions.remove(largest_index);
                        steps.remove(largest_index);
                        directions.push(direction);
                        steps.push(length);
                        on_axes = false;
                    }
                }
            }

            if f >= f_start {
                if on_axes {
                    // No axis improves either
                    break;
                }
                trace!(generations, value = f, "no progress, resetting to axes");
                directions = axes(n);
                steps = initial_steps(bounds);
                on_axes = true;
            }

            history.push_back(f);
            if history.len() > self.config.change_generations + 1 {
                history.pop_front();
            }
            trace!(generations, value = f, "direction set generation");
        }

        debug!(
            generations,
            evaluations = evaluations.get(),
            value = f,
            "direction set finished"
        );
        Minimum {
            x,
            value: f,
            iterations: generations,
            evaluations: evaluations.get(),
        }
    }
}

/// Coordinate axes of an n-dimensional space
fn axes(n: usize) -> Vec<DVector<f64>> {
    (0..n)
        .map(|i| {
            let mut e = DVector::zeros(n);
            e[i] = 1.0;
            e
        })
        .collect()
}

/// First trial step along each axis, a tenth of the box width
fn initial_steps(bounds: &Bounds) -> Vec<f64> {
    (0..bounds.len())
        .map(|i| 0.1 * (bounds.upper()[i] - bounds.lower()[i]).max(1e-8))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::objective::test_functions::{Bowl, Rosenbrock};
    use approx::assert_relative_eq;

    /// Quadratic with coupled coordinates, minimum at (0.5, 0.5)
    struct Coupled;

    impl Objective for Coupled {
        fn dim(&self) -> usize {
            2
        }

        fn value(&self, x: &DVector<f64>) -> f64 {
            let s = x[0] + x[1] - 1.0;
            let d = x[0] - x[1];
            s * s + 10.0 * d * d
        }
    }

    /// Narrow diagonal valley whose constrained minimum lies on the face x = 1
    ///
    /// Minimum over x ≤ 1 at (1, 102/101) with value 100/101.
    struct DiagonalValley;

    impl Objective for DiagonalValley {
        fn dim(&self) -> usize {
            2
        }

        fn value(&self, x: &DVector<f64>) -> f64 {
            let d = x[0] - x[1];
            let s = x[0] + x[1] - 3.0;
            100.0 * d * d + s * s
        }
    }

    fn unit_box(n: usize, half: f64) -> Bounds {
        Bounds::new(DVector::from_element(n, -half), DVector::from_element(n, half))
    }

    #[test]
    fn test_coupled_quadratic() {
        let result = DirectionSet::default().minimize(&Coupled, &unit_box(2, 5.0), &DVector::zeros(2));

        assert_relative_eq!(result.x[0], 0.5, epsilon = 1e-5);
        assert_relative_eq!(result.x[1], 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_bowl_against_bounds() {
        let bowl = Bowl {
            center: DVector::from_vec(vec![3.0, -0.5]),
            weights: DVector::from_vec(vec![1.0, 2.0]),
        };
        let bounds = unit_box(2, 1.0);
        let result = DirectionSet::default().minimize(&bowl, &bounds, &DVector::zeros(2));

        assert!(bounds.contains(&result.x));
        assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(result.x[1], -0.5, epsilon = 1e-5);
        assert_relative_eq!(result.value, 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_valley_ending_on_box_face() {
        let bounds = Bounds::new(DVector::from_vec(vec![-5.0, -5.0]), DVector::from_vec(vec![1.0, 5.0]));
        let x0 = DVector::from_vec(vec![-1.0, -1.0]);
        let result = DirectionSet::default().minimize(&DiagonalValley, &bounds, &x0);

        assert!(bounds.contains(&result.x));
        assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(result.x[1], 102.0 / 101.0, epsilon = 1e-4);
        assert_relative_eq!(result.value, 100.0 / 101.0, epsilon = 1e-6);

        // A fresh search from the returned point finds nothing better
        let again = DirectionSet::default().minimize(&DiagonalValley, &bounds, &result.x);
        assert!(again.value >= result.value - 1e-9);
    }

    #[test]
    fn test_direction_into_active_face_still_moves() {
        let bounds = unit_box(2, 1.0);
        let origin = DVector::from_vec(vec![1.0, -0.5]);
        let direction = DVector::from_vec(vec![1.0, 1.0]).normalize();
        let evaluations = Cell::new(0);
        let line = Line {
            objective: &DiagonalValley,
            bounds: &bounds,
            origin: &origin,
            direction: &direction,
            evaluations: &evaluations,
        };

        let (t_min, t_max) = line.path_interval();
        assert!(t_max > 0.0);
        assert!(t_min < 0.0);

        // x stays clipped at 1 while y climbs to its own bound
        let f0 = DiagonalValley.value(&origin);
        let (t, value) = line.minimize(f0, 0.1, 1e-8);
        assert!(t > 0.0);
        assert!(value < f0);
        assert_eq!(line.point(t)[0], 1.0);
    }

    #[test]
    fn test_rosenbrock_valley() {
        let x0 = DVector::from_vec(vec![-1.2, 1.0]);
        let result = DirectionSet::default().minimize(&Rosenbrock, &unit_box(2, 2.0), &x0);

        assert_relative_eq!(result.x[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(result.x[1], 1.0, epsilon = 2e-3);
    }

    #[test]
    fn test_never_worse_than_start() {
        let x0 = DVector::from_vec(vec![0.3, 0.7]);
        let start = Coupled.value(&x0);
        let result = DirectionSet::default()
            .with_max_generations(1)
            .minimize(&Coupled, &unit_box(2, 5.0), &x0);

        assert!(result.value <= start);
        assert_eq!(result.iterations, 1);
        assert_relative_eq!(result.value, Coupled.value(&result.x), epsilon = 1e-12);
    }

    #[test]
    fn test_relative_tolerance_stops_early() {
        let x0 = DVector::from_vec(vec![-1.2, 1.0]);
        let tight = DirectionSet::default().minimize(&Rosenbrock, &unit_box(2, 2.0), &x0);
        let loose = DirectionSet::default()
            .with_relative_tolerance(1e-1)
            .minimize(&Rosenbrock, &unit_box(2, 2.0), &x0);

        assert!(loose.evaluations <= tight.evaluations);
        assert!(loose.value < Rosenbrock.value(&x0));
    }
}
