//! Anchor geometry
//!
//! Four anchor points A, B, C, D. The coordinate frame is pinned by
//! A.x = 0, D.x = 0 and D.y = 0, which leaves nine free coordinates:
//!
//! [A.y, A.z, B.x, B.y, B.z, C.x, C.y, C.z, D.z]

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{A, B, C, D, NUM_LINES, PARAMS_ANCHOR, X, Y, Z};

/// Anchor positions [mm] in the machine frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorGeometry {
    anchors: [Vector3<f64>; NUM_LINES],
}

impl AnchorGeometry {
    /// Build a geometry from its nine free coordinates
    pub fn from_params(p: &[f64; PARAMS_ANCHOR]) -> Self {
        Self {
            anchors: [
                Vector3::new(0.0, p[0], p[1]),
                Vector3::new(p[2], p[3], p[4]),
                Vector3::new(p[5], p[6], p[7]),
                Vector3::new(0.0, 0.0, p[8]),
            ],
        }
    }

    /// Build a geometry from a slice holding at least nine values
    ///
    /// Returns None if the slice is too short.
    pub fn from_slice(p: &[f64]) -> Option<Self> {
        let params: &[f64; PARAMS_ANCHOR] = p.get(..PARAMS_ANCHOR)?.try_into().ok()?;
        Some(Self::from_params(params))
    }

    /// The nine free coordinates, in parameter vector order
    pub fn to_params(&self) -> [f64; PARAMS_ANCHOR] {
        let a = &self.anchors;
        [
            a[A][Y], a[A][Z],
            a[B][X], a[B][Y], a[B][Z],
            a[C][X], a[C][Y], a[C][Z],
            a[D][Z],
        ]
    }

    /// Anchor position for a line index (0..4)
    pub fn anchor(&self, line: usize) -> &Vector3<f64> {
        &self.anchors[line]
    }

    /// All four anchors in line order
    pub fn anchors(&self) -> &[Vector3<f64>; NUM_LINES] {
        &self.anchors
    }

    /// Line lengths from each anchor to the coordinate origin
    pub fn origin_distances(&self) -> [f64; NUM_LINES] {
        [
            self.anchors[A].norm(),
            self.anchors[B].norm(),
            self.anchors[C].norm(),
            self.anchors[D].norm(),
        ]
    }

    /// Geometry reflected through the x = 0 plane
    ///
    /// Line labels are kept, so B and C swap the sign of their x-coordinate.
    /// Line lengths to reflected positions are unchanged.
    pub fn mirrored_x(&self) -> Self {
        let mut anchors = self.anchors;
        for anchor in anchors.iter_mut() {
            anchor.x = -anchor.x;
        }
        Self { anchors }
    }
}
