//! Residuals and cost functions
//!
//! One residual per sample and line: the line length change predicted by
//! the anchor geometry minus the one recovered from the motor rotation
//! through the inverse buildup relation,
//!
//! rᵢₖ = (‖Aₖ − pᵢ‖ − ‖Aₖ‖) − Δl(θᵢₖ; b, r₀ₖ)
//!
//! The cost variants only differ in how the residual matrix is aggregated.

use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::kinematics::{line_deltas_from_motor, line_length_deltas, AnchorGeometry, SpoolHardware, SpoolModel};
use crate::optimize::Objective;
use crate::params::{ParameterLayout, ScaleConfig};
use crate::problem::CalibrationProblem;
use crate::{A, B, C, D, NUM_LINES, X, Y, Z};

/// Residual aggregation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostKind {
    /// Sum of absolute values
    L1,
    /// Sum of squares
    #[default]
    L2,
    /// Sum of 4th powers
    L4,
    /// Sum of 8th powers
    L8,
}

impl CostKind {
    /// Contribution of a single residual
    #[inline]
    pub fn term(&self, r: f64) -> f64 {
        match self {
            CostKind::L1 => r.abs(),
            CostKind::L2 => r * r,
            CostKind::L4 => {
                let r2 = r * r;
                r2 * r2
            }
            CostKind::L8 => {
                let r2 = r * r;
                let r4 = r2 * r2;
                r4 * r4
            }
        }
    }

    /// Derivative of [`Self::term`], the sign for L1
    #[inline]
    pub fn term_derivative(&self, r: f64) -> f64 {
        match self {
            CostKind::L1 => {
                if r > 0.0 {
                    1.0
                } else if r < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            CostKind::L2 => 2.0 * r,
            CostKind::L4 => 4.0 * r * r * r,
            CostKind::L8 => {
                let r2 = r * r;
                8.0 * r2 * r2 * r2 * r
            }
        }
    }

    /// Aggregate a residual matrix
    pub fn aggregate(&self, residuals: &DMatrix<f64>) -> f64 {
        residuals.iter().map(|&r| self.term(r)).sum()
    }

    /// Cost of a full set of estimates against motor samples
    pub fn cost(
        &self,
        anchors: &AnchorGeometry,
        positions: &[Vector3<f64>],
        motor_samples: &DMatrix<f64>,
        spool: &SpoolModel,
        hardware: &SpoolHardware,
    ) -> f64 {
        self.aggregate(&residuals(anchors, positions, motor_samples, spool, hardware))
    }
}

/// Residual matrix, u×4
///
/// `positions` must hold one position per sample row.
pub fn residuals(
    anchors: &AnchorGeometry,
    positions: &[Vector3<f64>],
    motor_samples: &DMatrix<f64>,
    spool: &SpoolModel,
    hardware: &SpoolHardware,
) -> DMatrix<f64> {
    debug_assert_eq!(positions.len(), motor_samples.nrows());
    line_length_deltas(anchors, positions) - line_deltas_from_motor(motor_samples, spool, hardware)
}

/// Parameter vector index of an anchor coordinate, None for pinned ones
pub fn anchor_param_index(line: usize, axis: usize) -> Option<usize> {
    match (line, axis) {
        (A, Y) => Some(0),
        (A, Z) => Some(1),
        (B, X) => Some(2),
        (B, Y) => Some(3),
        (B, Z) => Some(4),
        (C, X) => Some(5),
        (C, Y) => Some(6),
        (C, Z) => Some(7),
        (D, Z) => Some(8),
        _ => None,
    }
}

fn unit_or_zero(v: &Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm > 1e-12 {
        v / norm
    } else {
        Vector3::zeros()
    }
}

/// Calibration cost over the scaled parameter vector
///
/// This is the function every strategy minimizes. It unscales its input,
/// splices the known positions in front of the free ones and aggregates
/// the residuals.
pub struct ScaledObjective<'a> {
    problem: &'a CalibrationProblem,
    layout: ParameterLayout,
    factors: DVector<f64>,
    kind: CostKind,
}

impl<'a> ScaledObjective<'a> {
    pub fn new(problem: &'a CalibrationProblem, scale: &ScaleConfig, kind: CostKind) -> Self {
        let layout = problem.layout();
        Self {
            problem,
            layout,
            factors: scale.factors(&layout),
            kind,
        }
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    pub fn factors(&self) -> &DVector<f64> {
        &self.factors
    }

    /// Scaled to physical parameter vector
    pub fn physical(&self, scaled: &DVector<f64>) -> DVector<f64> {
        scaled.component_mul(&self.factors)
    }

    /// Physical to scaled parameter vector
    pub fn scaled(&self, physical: &DVector<f64>) -> DVector<f64> {
        physical.component_div(&self.factors)
    }

    /// Cost of a physical parameter vector
    pub fn physical_value(&self, physical: &DVector<f64>) -> f64 {
        let decoded = self.layout.decode(physical);
        let positions = self.problem.full_positions(&decoded.free_positions);
        self.kind.cost(
            &decoded.anchors,
            &positions,
            self.problem.motor_samples(),
            &decoded.spool,
            self.problem.hardware(),
        )
    }
}

impl Objective for ScaledObjective<'_> {
    fn dim(&self) -> usize {
        self.layout.len()
    }

    fn value(&self, x: &DVector<f64>) -> f64 {
        self.physical_value(&self.physical(x))
    }

    fn value_and_gradient(&self, x: &DVector<f64>, grad: &mut DVector<f64>) -> f64 {
        let physical = self.physical(x);
        let decoded = self.layout.decode(&physical);
        let positions = self.problem.full_positions(&decoded.free_positions);
        let samples = self.problem.motor_samples();
        let hardware = self.problem.hardware();
        let num_fixed = self.problem.num_fixed();
        let buildup_index = self.layout.buildup_index();
        let radius_start = self.layout.radii_range().start;

        let measured = line_deltas_from_motor(samples, &decoded.spool, hardware);
        let origin_units: Vec<Vector3<f64>> = decoded
            .anchors
            .anchors()
            .iter()
            .map(unit_or_zero)
            .collect();

        grad.fill(0.0);
        let mut value = 0.0;

        for (i, p) in positions.iter().enumerate() {
            for k in 0..NUM_LINES {
                let anchor = decoded.anchors.anchor(k);
                let to_anchor = anchor - p;
                let r = to_anchor.norm() - anchor.norm() - measured[(i, k)];
                value += self.kind.term(r);

                let w = self.kind.term_derivative(r);
                if w == 0.0 {
                    continue;
                }

                // ∂r/∂Aₖ and ∂r/∂pᵢ
                let unit = unit_or_zero(&to_anchor);
                let d_anchor = unit - origin_units[k];
                for axis in [X, Y, Z] {
                    if let Some(j) = anchor_param_index(k, axis) {
                        grad[j] += w * d_anchor[axis];
                    }
                }
                if i >= num_fixed {
                    for axis in [X, Y, Z] {
                        grad[self.layout.position_index(i - num_fixed, axis)] -= w * unit[axis];
                    }
                }

                // r contains −Δl(θ; b, r₀)
                let (d_buildup, d_radius) = hardware.line_delta_partials(k, samples[(i, k)]);
                grad[buildup_index] -= w * d_buildup;
                grad[radius_start + k] -= w * d_radius;
            }
        }

        // Chain rule through physical = scaled · factor
        grad.component_mul_assign(&self.factors);
        value
    }
}
