//! Parameter vector layout and decoding

use std::ops::Range;

use nalgebra::{DVector, Vector3};

use crate::kinematics::{AnchorGeometry, SpoolModel};
use crate::{NUM_LINES, PARAMS_ANCHOR, PARAMS_SPOOL};

/// Structured view of one parameter vector
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedParams {
    pub anchors: AnchorGeometry,
    /// Positions solved for, in sample order after the fixed ones
    pub free_positions: Vec<Vector3<f64>>,
    pub spool: SpoolModel,
}

/// Field layout of the parameter vector for a given number of free positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterLayout {
    num_free_positions: usize,
}

impl ParameterLayout {
    pub fn new(num_free_positions: usize) -> Self {
        Self { num_free_positions }
    }

    pub fn num_free_positions(&self) -> usize {
        self.num_free_positions
    }

    /// Total number of parameters
    pub fn len(&self) -> usize {
        PARAMS_ANCHOR + 3 * self.num_free_positions + PARAMS_SPOOL
    }

    pub fn anchors_range(&self) -> Range<usize> {
        0..PARAMS_ANCHOR
    }

    pub fn positions_range(&self) -> Range<usize> {
        PARAMS_ANCHOR..PARAMS_ANCHOR + 3 * self.num_free_positions
    }

    pub fn buildup_index(&self) -> usize {
        PARAMS_ANCHOR + 3 * self.num_free_positions
    }

    pub fn radii_range(&self) -> Range<usize> {
        let start = self.buildup_index() + 1;
        start..start + NUM_LINES
    }

    /// Index of one coordinate of one free position
    pub fn position_index(&self, free_position: usize, axis: usize) -> usize {
        PARAMS_ANCHOR + 3 * free_position + axis
    }

    /// Split a physical parameter vector into its fields
    pub fn decode(&self, x: &DVector<f64>) -> DecodedParams {
        debug_assert_eq!(x.len(), self.len(), "parameter vector length mismatch");
        let values = x.as_slice();

        let mut anchors = [0.0; PARAMS_ANCHOR];
        anchors.copy_from_slice(&values[self.anchors_range()]);
        let mut radii = [0.0; NUM_LINES];
        radii.copy_from_slice(&values[self.radii_range()]);

        DecodedParams {
            anchors: AnchorGeometry::from_params(&anchors),
            free_positions: positions_from_vec(&values[self.positions_range()]),
            spool: SpoolModel::new(values[self.buildup_index()], radii),
        }
    }

    /// Concatenate fields into a physical parameter vector
    pub fn encode(
        &self,
        anchors: &AnchorGeometry,
        free_positions: &[Vector3<f64>],
        spool: &SpoolModel,
    ) -> DVector<f64> {
        debug_assert_eq!(free_positions.len(), self.num_free_positions);
        let mut values = Vec::with_capacity(self.len());
        values.extend_from_slice(&anchors.to_params());
        values.extend(positions_to_vec(free_positions));
        values.push(spool.buildup_factor);
        values.extend_from_slice(&spool.zero_radii);
        DVector::from_vec(values)
    }
}

/// Anchor geometry from the leading nine free coordinates, no scaling
///
/// Returns None if fewer than nine values are given.
pub fn anchors_from_vec(v: &[f64]) -> Option<AnchorGeometry> {
    AnchorGeometry::from_slice(v)
}

/// Positions from a flat [x₁ y₁ z₁ x₂ …] list, no scaling
///
/// Trailing values that do not fill a whole position are ignored.
pub fn positions_from_vec(v: &[f64]) -> Vec<Vector3<f64>> {
    v.chunks_exact(3)
        .map(|c| Vector3::new(c[0], c[1], c[2]))
        .collect()
}

/// Flat [x₁ y₁ z₁ x₂ …] list from positions, no scaling
pub fn positions_to_vec(positions: &[Vector3<f64>]) -> Vec<f64> {
    positions.iter().flat_map(|p| [p.x, p.y, p.z]).collect()
}
