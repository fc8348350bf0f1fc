//! Spool buildup compensation
//!
//! Line wound on a spool increases its effective radius linearly with the
//! wound length. With
//!
//! - m: mechanical advantage of the line routing
//! - n: number of lines wound on the spool
//! - b: buildup factor (radius growth per unit of wound length)
//! - r₀: spool radius with the reference line length wound
//! - g: spool-to-motor gear ratio
//!
//! and k₂ = −m·n·b (more line in the air means less on the spool),
//! k₀ = 2·g·m·360 / (2π·k₂), a relative line length Δl maps to motor degrees
//!
//! θ = k₀·(√(r₀² + Δl·k₂) − r₀)
//!
//! and back
//!
//! Δl = ((θ/k₀ + r₀)² − r₀²) / k₂

use std::f64::consts::PI;

use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};

use crate::NUM_LINES;

use super::{line_length_deltas, AnchorGeometry};

/// Estimated spool parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpoolModel {
    /// Spool buildup factor [mm radius / mm line]
    pub buildup_factor: f64,
    /// Spool radius at the reference sample, per line [mm]
    pub zero_radii: [f64; NUM_LINES],
}

impl SpoolModel {
    pub fn new(buildup_factor: f64, zero_radii: [f64; NUM_LINES]) -> Self {
        Self {
            buildup_factor,
            zero_radii,
        }
    }

    /// Same radius on every spool
    pub fn uniform(buildup_factor: f64, zero_radius: f64) -> Self {
        Self::new(buildup_factor, [zero_radius; NUM_LINES])
    }
}

impl Default for SpoolModel {
    fn default() -> Self {
        // Qualified first guess for 0.5 mm line on HP4 spools
        Self::uniform(0.008, 65.0)
    }
}

/// Fixed hardware constants of the line drive
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolHardware {
    /// Mechanical advantage per line (pulley blocks)
    pub mechanical_advantage: [f64; NUM_LINES],
    /// Number of lines wound on each spool
    pub lines_per_spool: [f64; NUM_LINES],
    /// Spool rotation to motor rotation ratio
    pub gear_ratio: f64,
}

impl Default for SpoolHardware {
    fn default() -> Self {
        Self {
            mechanical_advantage: [2.0; NUM_LINES], // HP4 default
            lines_per_spool: [1.0; NUM_LINES],
            gear_ratio: 12.75, // 255/20
        }
    }
}

impl SpoolHardware {
    /// Motor degrees per unit of spool radius change, times two
    ///
    /// This is k₀·k₂, the factor that does not depend on the buildup factor.
    fn degrees_factor(&self, line: usize) -> f64 {
        2.0 * self.gear_ratio * self.mechanical_advantage[line] * 360.0 / (2.0 * PI)
    }

    /// Buildup coefficient k₂ = −m·n·b
    fn buildup_coefficient(&self, line: usize, buildup_factor: f64) -> f64 {
        -self.mechanical_advantage[line] * self.lines_per_spool[line] * buildup_factor
    }

    /// Motor rotation [deg] that pays out a relative line length [mm]
    pub fn motor_degrees(&self, line: usize, line_delta: f64, spool: &SpoolModel) -> f64 {
        let r0 = spool.zero_radii[line];
        let k2 = self.buildup_coefficient(line, spool.buildup_factor);
        let k0 = self.degrees_factor(line) / k2;
        k0 * ((r0 * r0 + line_delta * k2).sqrt() - r0)
    }

    /// Relative line length [mm] paid out by a motor rotation [deg]
    pub fn line_delta(&self, line: usize, degrees: f64, spool: &SpoolModel) -> f64 {
        let r0 = spool.zero_radii[line];
        let k2 = self.buildup_coefficient(line, spool.buildup_factor);
        let k0 = self.degrees_factor(line) / k2;
        let r = degrees / k0 + r0;
        (r * r - r0 * r0) / k2
    }

    /// Partial derivatives of [`Self::line_delta`] with respect to the
    /// buildup factor and the zero radius of that line
    ///
    /// Expanding the inverse gives Δl = θ²·k₂/F² + 2θ·r₀/F with F = k₀·k₂,
    /// which is linear in both b and r₀.
    pub fn line_delta_partials(&self, line: usize, degrees: f64) -> (f64, f64) {
        let f = self.degrees_factor(line);
        let d_buildup =
            -self.mechanical_advantage[line] * self.lines_per_spool[line] * degrees * degrees / (f * f);
        let d_radius = 2.0 * degrees / f;
        (d_buildup, d_radius)
    }
}

/// Motor rotations [deg] the machine would report at the given positions
///
/// # Returns
/// u×4 matrix of motor degrees relative to the reference sample at the origin
pub fn motor_positions(
    anchors: &AnchorGeometry,
    positions: &[Vector3<f64>],
    spool: &SpoolModel,
    hardware: &SpoolHardware,
) -> DMatrix<f64> {
    let deltas = line_length_deltas(anchors, positions);
    DMatrix::from_fn(deltas.nrows(), NUM_LINES, |i, k| {
        hardware.motor_degrees(k, deltas[(i, k)], spool)
    })
}

/// Relative line lengths [mm] recovered from motor samples [deg]
pub fn line_deltas_from_motor(
    motor_samples: &DMatrix<f64>,
    spool: &SpoolModel,
    hardware: &SpoolHardware,
) -> DMatrix<f64> {
    DMatrix::from_fn(motor_samples.nrows(), NUM_LINES, |i, k| {
        hardware.line_delta(k, motor_samples[(i, k)], spool)
    })
}
