//! # Hangcal Core
//!
//! Auto-calibration engine for four-line cable-driven parallel robots
//! (Hangprinter-style machines).
//!
//! Given motor rotation samples recorded at a set of mostly unknown tool
//! positions, the engine estimates the anchor geometry, the spool line
//! buildup factor, the four spool zero-radii and the unknown positions by
//! minimizing the discrepancy between measured and predicted line-length
//! changes.
//!
//! ## Modules
//!
//! - [`kinematics`]: Anchor geometry, relative line lengths, spool buildup model
//! - [`params`]: Flat parameter vector layout and per-segment scaling
//! - [`cost`]: Residuals, cost aggregations and the scaled objective
//! - [`bounds`]: Physical box constraints and the position repair heuristic
//! - [`problem`]: Measurement set validation
//! - [`optimize`]: Bounded minimizers and the strategy driver
//! - [`candidate`]: Decoded solutions and winner selection

pub mod kinematics;
pub mod params;
pub mod cost;
pub mod bounds;
pub mod problem;
pub mod optimize;
pub mod candidate;
pub mod config;
pub mod error;

pub use candidate::{select_winner, Candidate};
pub use config::CalibrationConfig;
pub use error::CalibrationError;
pub use kinematics::{AnchorGeometry, SpoolHardware, SpoolModel};
pub use optimize::{CancelToken, Calibrator, Executor, Method, Strategy};
pub use problem::{CalibrationProblem, DataSufficiency};

use nalgebra::Vector3;

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// Number of lines (and anchors) of the mechanism
pub const NUM_LINES: usize = 4;

/// Number of free anchor coordinates in the parameter vector
///
/// Twelve coordinates minus the three pinned by the frame convention
/// (A.x = 0, D.x = 0, D.y = 0).
pub const PARAMS_ANCHOR: usize = 9;

/// Number of spool parameters in the parameter vector (buildup + 4 radii)
pub const PARAMS_SPOOL: usize = 5;

/// Line indices
pub const A: usize = 0;
pub const B: usize = 1;
pub const C: usize = 2;
pub const D: usize = 3;

/// Axis indices
pub const X: usize = 0;
pub const Y: usize = 1;
pub const Z: usize = 2;
