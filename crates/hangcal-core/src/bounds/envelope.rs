//! Physical envelope and bound box construction
//!
//! Bounds come from what is known about a typical machine before any
//! measurement: anchors sit within a few meters of the origin, B and C on
//! opposite sides of x = 0, D above the print volume, samples are taken
//! inside the reachable volume and the spool parameters stay in a narrow
//! band around their nominal values.

use nalgebra::DVector;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::params::{ParameterLayout, ScaleConfig};

/// Index of B.x in the parameter vector
const BX: usize = 2;
/// Index of C.x in the parameter vector
const CX: usize = 5;

/// Known envelope of the machine [mm]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Largest anchor coordinate magnitude
    pub long_axis: f64,
    /// Largest horizontal sample coordinate magnitude
    pub short_axis: f64,
    /// Lowest sample z
    pub data_z_min: f64,
    /// Smallest |x| of anchors B and C, smallest y of B and C
    pub anchor_clearance: f64,
    /// Range of the z coordinate of anchors A, B and C
    pub anchor_z: [f64; 2],
    /// Largest y coordinate of anchor A
    pub anchor_a_y_max: f64,
    /// Lowest z coordinate of anchor D
    pub anchor_d_z_min: f64,
    /// Range of the spool buildup factor
    pub buildup: [f64; 2],
    /// Range of the spool zero radii
    pub radius: [f64; 2],
    /// With more known positions than this, B.x may take either sign
    pub relax_sign_above_fixed: usize,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            long_axis: 4000.0,
            short_axis: 1700.0,
            data_z_min: -50.0,
            anchor_clearance: 300.0,
            anchor_z: [-300.0, 200.0],
            anchor_a_y_max: 500.0,
            anchor_d_z_min: 1000.0,
            buildup: [0.00005, 0.01],
            radius: [64.6, 67.0],
            relax_sign_above_fixed: 2,
        }
    }
}

/// Per-entry lower and upper bounds of a parameter vector
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl Bounds {
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> Self {
        debug_assert_eq!(lower.len(), upper.len());
        debug_assert!(lower.iter().zip(upper.iter()).all(|(l, u)| l <= u));
        Self { lower, upper }
    }

    pub fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Clip a point into the box
    pub fn project(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut projected = x.clone();
        self.project_in_place(&mut projected);
        projected
    }

    pub fn project_in_place(&self, x: &mut DVector<f64>) {
        for (i, value) in x.iter_mut().enumerate() {
            *value = value.clamp(self.lower[i], self.upper[i]);
        }
    }

    /// True if every entry lies within its bounds
    pub fn contains(&self, x: &DVector<f64>) -> bool {
        x.len() == self.len()
            && x
                .iter()
                .enumerate()
                .all(|(i, v)| *v >= self.lower[i] && *v <= self.upper[i])
    }

    /// Uniformly random point inside the box
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<f64> {
        DVector::from_fn(self.len(), |i, _| {
            let t: f64 = rng.gen();
            self.lower[i] + t * (self.upper[i] - self.lower[i])
        })
    }

    /// Bounds in physical units from bounds in scaled units
    pub fn unscale(&self, factors: &DVector<f64>) -> Bounds {
        Bounds::new(self.lower.component_mul(factors), self.upper.component_mul(factors))
    }

    /// Bounds in scaled units from bounds in physical units
    pub fn scale(&self, factors: &DVector<f64>) -> Bounds {
        Bounds::new(self.lower.component_div(factors), self.upper.component_div(factors))
    }
}

/// Builds the bound box for one problem layout
pub struct BoundsBuilder {
    envelope: EnvelopeConfig,
    layout: ParameterLayout,
    cx_is_positive: bool,
    num_fixed: usize,
}

impl BoundsBuilder {
    pub fn new(layout: ParameterLayout) -> Self {
        Self {
            envelope: EnvelopeConfig::default(),
            layout,
            cx_is_positive: false,
            num_fixed: 0,
        }
    }

    pub fn with_envelope(mut self, envelope: EnvelopeConfig) -> Self {
        self.envelope = envelope;
        self
    }

    /// Put anchor C on the positive x side instead of anchor B
    pub fn with_cx_positive(mut self, cx_is_positive: bool) -> Self {
        self.cx_is_positive = cx_is_positive;
        self
    }

    /// Number of caller-supplied positions
    pub fn with_fixed_positions(mut self, num_fixed: usize) -> Self {
        self.num_fixed = num_fixed;
        self
    }

    /// Bounds in physical units
    pub fn build_physical(&self) -> Bounds {
        let e = &self.envelope;
        let long = e.long_axis;
        let clear = e.anchor_clearance;
        let [z_lo, z_hi] = e.anchor_z;

        #[rustfmt::skip]
        let mut lower = vec![
            -long, z_lo,   // A.y, A.z
            clear, clear, z_lo, // B
            -long, clear, z_lo, // C
            e.anchor_d_z_min,   // D.z
        ];
        #[rustfmt::skip]
        let mut upper = vec![
            e.anchor_a_y_max, z_hi,
            long, long, z_hi,
            -clear, long, z_hi,
            long,
        ];

        for _ in 0..self.layout.num_free_positions() {
            lower.extend_from_slice(&[-e.short_axis, -e.short_axis, e.data_z_min]);
            upper.extend_from_slice(&[e.short_axis, e.short_axis, 2.0 * e.short_axis]);
        }

        lower.push(e.buildup[0]);
        upper.push(e.buildup[1]);
        for _ in 0..crate::NUM_LINES {
            lower.push(e.radius[0]);
            upper.push(e.radius[1]);
        }

        // Known positions pin the handedness
        if self.num_fixed > e.relax_sign_above_fixed {
            lower[BX] = -long;
        }

        if self.cx_is_positive {
            lower.swap(BX, CX);
            upper.swap(BX, CX);
        }

        Bounds::new(DVector::from_vec(lower), DVector::from_vec(upper))
    }

    /// Bounds in the scaled units the optimizers work in
    pub fn build(&self, scale: &ScaleConfig) -> Bounds {
        self.build_physical().scale(&scale.factors(&self.layout))
    }
}
