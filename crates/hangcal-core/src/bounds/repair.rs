//! Position repair heuristic
//!
//! Which lines were reeled in at a sample says which side of the origin
//! the sample was taken on. The repair applies those sign inferences to
//! the free positions of a physical parameter vector and clamps each
//! position into the hull spanned by the current anchor estimate.

use nalgebra::{DMatrix, DVector};

use crate::params::ParameterLayout;
use crate::{A, B, C, X, Y, Z};

// Anchor entries of the parameter vector
const AY: usize = 0;
const BX: usize = 2;
const BY: usize = 3;
const CX: usize = 5;
const CY: usize = 6;
const DZ: usize = 8;

/// Repaired copy of a physical parameter vector
///
/// # Arguments
/// * `x` - physical parameter vector
/// * `layout` - layout of `x`
/// * `motor_samples` - u×4 motor degrees, the first `num_fixed` rows belong
///   to known positions that are not part of `x`
/// * `num_fixed` - number of known positions
/// * `cx_is_positive` - anchor C sits on the positive x side
pub fn repair_positions(
    x: &DVector<f64>,
    layout: &ParameterLayout,
    motor_samples: &DMatrix<f64>,
    num_fixed: usize,
    cx_is_positive: bool,
) -> DVector<f64> {
    let mut repaired = x.clone();
    let x_sign = if cx_is_positive { -1.0 } else { 1.0 };
    let x_lo = x[BX].min(x[CX]);
    let x_hi = x[BX].max(x[CX]);

    for j in 0..layout.num_free_positions() {
        let row = motor_samples.row(num_fixed + j);
        let reeled_in = |line: usize| row[line] < 0.0;
        let ix = layout.position_index(j, X);
        let iy = layout.position_index(j, Y);
        let iz = layout.position_index(j, Z);

        // Reeling in A means the sample is on A's side
        if reeled_in(A) {
            repaired[iy] = -repaired[iy].abs();
        } else if reeled_in(B) && reeled_in(C) {
            repaired[iy] = repaired[iy].abs();
        }

        if reeled_in(A) && reeled_in(B) {
            repaired[ix] = x_sign * repaired[ix].abs();
        } else if reeled_in(A) && reeled_in(C) {
            repaired[ix] = -x_sign * repaired[ix].abs();
        }

        repaired[ix] = repaired[ix].clamp(x_lo, x_hi);

        if repaired[iy] < x[AY] {
            repaired[iy] = x[AY];
        } else if repaired[iy] > x[BY] && repaired[iy] > x[CY] {
            repaired[iy] = x[BY].max(x[CY]);
        }

        if repaired[iz] > x[DZ] {
            repaired[iz] = x[DZ];
        }
    }

    repaired
}
