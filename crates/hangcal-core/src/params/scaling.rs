//! Per-segment parameter scaling
//!
//! Anchor coordinates, positions, the buildup factor and the spool radii
//! differ by orders of magnitude. Each segment is divided by its own
//! constant before optimization so the optimizers see comparable steps,
//! and multiplied back exactly once on the returned solution.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::ParameterLayout;

/// Scale constants, physical = scaled · factor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Anchor coordinates [mm]
    pub anchor: f64,
    /// Position coordinates [mm]
    pub position: f64,
    /// Spool buildup factor
    pub buildup: f64,
    /// Spool radii [mm]
    pub radius: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        // Tuned for the quasi-Newton and random-restart searches
        Self {
            anchor: 14.0,
            position: 4.0,
            buildup: 0.010,
            radius: 0.005,
        }
    }
}

impl ScaleConfig {
    /// No scaling at all
    pub fn identity() -> Self {
        Self {
            anchor: 1.0,
            position: 1.0,
            buildup: 1.0,
            radius: 1.0,
        }
    }

    /// Scale factor of every entry of a parameter vector
    pub fn factors(&self, layout: &ParameterLayout) -> DVector<f64> {
        let mut factors = DVector::from_element(layout.len(), self.position);
        for i in layout.anchors_range() {
            factors[i] = self.anchor;
        }
        factors[layout.buildup_index()] = self.buildup;
        for i in layout.radii_range() {
            factors[i] = self.radius;
        }
        factors
    }

    /// Physical to optimizer units
    pub fn scale(&self, layout: &ParameterLayout, physical: &DVector<f64>) -> DVector<f64> {
        physical.component_div(&self.factors(layout))
    }

    /// Optimizer to physical units
    pub fn unscale(&self, layout: &ParameterLayout, scaled: &DVector<f64>) -> DVector<f64> {
        scaled.component_mul(&self.factors(layout))
    }
}
