//! Text output of a calibration run

use std::fmt::Write;

use nalgebra::Vector3;

use hangcal_core::{AnchorGeometry, Candidate, SpoolModel, A, B, C, D, X, Y, Z};

/// Firmware configuration line for the anchors and spools
pub fn firmware_line(anchors: &AnchorGeometry, spool: &SpoolModel) -> String {
    let a = anchors.anchor(A);
    let b = anchors.anchor(B);
    let c = anchors.anchor(C);
    let d = anchors.anchor(D);
    let r = &spool.zero_radii;

    format!(
        "M669 A0.0:{:.2}:{:.2} B{:.2}:{:.2}:{:.2} C{:.2}:{:.2}:{:.2} D{:.2} Q{:.6} R{:.3}:{:.3}:{:.3}:{:.3}",
        a[Y], a[Z], b[X], b[Y], b[Z], c[X], c[Y], c[Z], d[Z], spool.buildup_factor, r[A], r[B], r[C], r[D]
    )
}

pub fn summary(candidate: &Candidate) -> String {
    let spool = candidate.spool();
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(out, "Spool buildup factor: {}", spool.buildup_factor);
    let _ = writeln!(out, "Spool radii: {:?}", spool.zero_radii);
    let _ = writeln!(out, "Total cost: {:e}", candidate.cost());
    let _ = write!(out, "Cost per sample: {:e}", candidate.cost_per_sample());
    out
}

/// One line per sample position, known positions marked
pub fn positions(positions: &[Vector3<f64>], num_fixed: usize) -> String {
    let mut out = String::from("Positions:");
    for (i, p) in positions.iter().enumerate() {
        let mark = if i < num_fixed { " (known)" } else { "" };
        let _ = write!(out, "\n{:4}: {:9.3} {:9.3} {:9.3}{}", i, p[X], p[Y], p[Z], mark);
    }
    out
}
