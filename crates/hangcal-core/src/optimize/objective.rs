//! Objective and minimizer abstractions
//!
//! Every search strategy minimizes an [`Objective`] over a box given by
//! [`Bounds`]. Local searches share the [`BoundedMinimizer`] capability so
//! restart loops and ensembles can drive either of them.

use nalgebra::DVector;

use crate::bounds::Bounds;

/// Scalar function to minimize
pub trait Objective: Sync {
    /// Number of parameters
    fn dim(&self) -> usize;

    /// Function value
    fn value(&self, x: &DVector<f64>) -> f64;

    /// Function value, writing the gradient into `grad`
    ///
    /// Defaults to central differences.
    fn value_and_gradient(&self, x: &DVector<f64>, grad: &mut DVector<f64>) -> f64 {
        let mut shifted = x.clone();
        for i in 0..x.len() {
            let h = 1e-6 * x[i].abs().max(1.0);
            shifted[i] = x[i] + h;
            let plus = self.value(&shifted);
            shifted[i] = x[i] - h;
            let minus = self.value(&shifted);
            shifted[i] = x[i];
            grad[i] = (plus - minus) / (2.0 * h);
        }
        self.value(x)
    }
}

/// Result of a minimization run
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Best point found (inside the bounds)
    pub x: DVector<f64>,
    /// Objective value at `x`
    pub value: f64,
    /// Iterations (or generations) performed
    pub iterations: usize,
    /// Objective evaluations performed
    pub evaluations: usize,
}

impl Minimum {
    /// True if `self` is strictly better than `other`
    ///
    /// NaN never improves on anything.
    pub fn improves_on(&self, other: &Minimum) -> bool {
        self.value < other.value || (other.value.is_nan() && !self.value.is_nan())
    }
}

/// Bounded local minimization from a starting point
pub trait BoundedMinimizer: Sync {
    fn minimize(&self, objective: &dyn Objective, bounds: &Bounds, x0: &DVector<f64>) -> Minimum;
}

#[cfg(test)]
pub(crate) mod test_functions {
    use super::*;

    /// Shifted quadratic bowl with a known minimum
    pub struct Bowl {
        pub center: DVector<f64>,
        pub weights: DVector<f64>,
    }

    impl Objective for Bowl {
        fn dim(&self) -> usize {
            self.center.len()
        }

        fn value(&self, x: &DVector<f64>) -> f64 {
            (x - &self.center)
                .iter()
                .zip(self.weights.iter())
                .map(|(d, w)| w * d * d)
                .sum()
        }
    }

    /// Two-dimensional Rosenbrock valley
    pub struct Rosenbrock;

    impl Objective for Rosenbrock {
        fn dim(&self) -> usize {
            2
        }

        fn value(&self, x: &DVector<f64>) -> f64 {
            let a = 1.0 - x[0];
            let b = x[1] - x[0] * x[0];
            a * a + 100.0 * b * b
        }

        fn value_and_gradient(&self, x: &DVector<f64>, grad: &mut DVector<f64>) -> f64 {
            let b = x[1] - x[0] * x[0];
            grad[0] = -2.0 * (1.0 - x[0]) - 400.0 * x[0] * b;
            grad[1] = 200.0 * b;
            self.value(x)
        }
    }

    #[test]
    fn test_default_gradient_is_central_difference() {
        let bowl = Bowl {
            center: DVector::from_vec(vec![1.0, -2.0]),
            weights: DVector::from_vec(vec![1.0, 3.0]),
        };
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let mut grad = DVector::zeros(2);
        let value = bowl.value_and_gradient(&x, &mut grad);

        assert!((value - 13.0).abs() < 1e-12);
        assert!((grad[0] + 2.0).abs() < 1e-6);
        assert!((grad[1] - 12.0).abs() < 1e-6);
    }
}
