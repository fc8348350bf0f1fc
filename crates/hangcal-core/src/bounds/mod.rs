//! Box constraints and feasibility repair
//!
//! - [`envelope`]: physical envelope of the machine and the bound box built from it
//! - [`repair`]: sign and ordering projection of estimated positions

mod envelope;
mod repair;

pub use envelope::*;
pub use repair::*;
