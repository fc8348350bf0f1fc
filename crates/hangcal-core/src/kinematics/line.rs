//! Geometry-only line lengths
//!
//! Only differential line lengths are observable. Every sample is expressed
//! relative to the reference sample taken at the coordinate origin, where
//! the motor rotations were zeroed:
//!
//! Δlᵢₖ = ‖Aₖ − pᵢ‖ − ‖Aₖ‖

use nalgebra::{DMatrix, Vector3};

use crate::NUM_LINES;

use super::AnchorGeometry;

/// Relative line length of one line at one position
#[inline]
pub fn line_length_delta(anchor: &Vector3<f64>, position: &Vector3<f64>) -> f64 {
    (anchor - position).norm() - anchor.norm()
}

/// Relative line lengths for every position and line
///
/// # Returns
/// u×4 matrix, one row per position, one column per line (A, B, C, D)
pub fn line_length_deltas(anchors: &AnchorGeometry, positions: &[Vector3<f64>]) -> DMatrix<f64> {
    let origin = anchors.origin_distances();
    DMatrix::from_fn(positions.len(), NUM_LINES, |i, k| {
        (anchors.anchor(k) - positions[i]).norm() - origin[k]
    })
}
