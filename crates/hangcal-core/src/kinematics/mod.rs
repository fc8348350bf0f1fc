//! Kinematic model of the four-line mechanism
//!
//! - Anchor geometry with the fixed-zero frame convention
//! - Geometry-only relative line lengths
//! - Spool buildup compensation between line length and motor rotation

mod anchors;
mod line;
mod spool;

pub use anchors::*;
pub use line::*;
pub use spool::*;
