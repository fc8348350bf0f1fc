//! Bounded minimization
//!
//! - [`ProjectedLbfgs`]: gradient-based local search
//! - [`DirectionSet`]: derivative-free local search
//! - [`DifferentialEvolution`]: population-based global search
//! - [`ScatterSearch`]: ensemble of local searches
//! - [`Calibrator`]: strategy driver tying them to a calibration problem

mod cancel;
mod driver;
mod evolution;
mod executor;
mod lbfgs;
mod objective;
mod powell;
mod scatter;
mod strategy;

pub use cancel::*;
pub use driver::*;
pub use evolution::*;
pub use executor::*;
pub use lbfgs::*;
pub use objective::*;
pub use powell::*;
pub use scatter::*;
pub use strategy::*;
