//! Flat parameter vector
//!
//! Layout: [anchors(9) | free positions(3·(u−k)) | buildup(1) | spool radii(4)]
//!
//! Optimizers work on a scaled copy of this vector; every value leaving the
//! optimization module is in physical units.

mod layout;
mod scaling;

pub use layout::*;
pub use scaling::*;
