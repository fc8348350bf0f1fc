//! Calibration configuration
//!
//! Every tunable of the engine, grouped per concern. All groups have
//! defaults matching a stock four-line machine, so a partial JSON file only
//! needs to name what differs.

use serde::{Deserialize, Serialize};

use crate::bounds::EnvelopeConfig;
use crate::cost::CostKind;
use crate::kinematics::SpoolHardware;
use crate::optimize::Executor;
use crate::params::ScaleConfig;
use crate::problem::DataRequirements;

/// Main calibration configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Line drive hardware constants
    pub hardware: SpoolHardware,
    /// Parameter scaling
    pub scale: ScaleConfig,
    /// Physical envelope the bounds are built from
    pub envelope: EnvelopeConfig,
    /// Starting point of the deterministic local searches
    pub initial_guess: InitialGuess,
    /// Data sufficiency thresholds
    pub data: DataRequirements,
    /// Residual aggregation minimized by every strategy
    pub cost: CostKind,
    pub quasi_newton: QuasiNewtonConfig,
    pub direction_set: DirectionSetConfig,
    pub random_restart: RandomRestartConfig,
    pub evolution: EvolutionConfig,
    pub scatter: ScatterConfig,
    /// Executor of the scatter-search rounds
    pub executor: Executor,
    /// Seed for every random stream, entropy when unset
    pub seed: Option<u64>,
}

/// Initial estimate, anchors and positions start at zero
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialGuess {
    /// Spool buildup factor
    pub buildup_factor: f64,
    /// Spool zero radius, all lines [mm]
    pub zero_radius: f64,
}

impl Default for InitialGuess {
    fn default() -> Self {
        Self {
            buildup_factor: 0.006,
            zero_radius: 65.0,
        }
    }
}

/// Projected L-BFGS settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuasiNewtonConfig {
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Number of stored correction pairs
    pub memory: usize,
    /// Relative reduction of the cost below which iteration stops
    pub ftol: f64,
    /// Projected gradient norm below which iteration stops
    pub pgtol: f64,
    /// Maximum backtracking steps per line search
    pub max_line_search: usize,
}

impl Default for QuasiNewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            memory: 10,
            ftol: 1e-15,
            pgtol: 1e-10,
            max_line_search: 40,
        }
    }
}

/// Bounded Powell direction set settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionSetConfig {
    /// Runs after the first one, each seeded from the previous best
    pub restarts: usize,
    /// Maximum sweeps over the direction set per run
    pub max_generations: usize,
    /// Maximum objective evaluations per run
    pub max_evaluations: usize,
    /// Stop once the best value changed less than this ...
    pub change_tolerance: f64,
    /// ... over this many generations
    pub change_generations: usize,
    /// Measure the change relative to the best value
    pub relative_change: bool,
    /// Stop once the best value drops below this
    pub target_value: f64,
    /// Relative accuracy of the Brent line minimization
    pub line_tolerance: f64,
}

impl Default for DirectionSetConfig {
    fn default() -> Self {
        Self {
            restarts: 2,
            max_generations: 100_000,
            max_evaluations: 3_200_000,
            change_tolerance: 1e-12,
            change_generations: 5,
            relative_change: false,
            target_value: 1e-20,
            line_tolerance: 1e-8,
        }
    }
}

/// Random restart settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomRestartConfig {
    /// Number of random starting points
    pub trials: usize,
    /// Iteration budget of each local search
    pub local_iterations: usize,
}

impl Default for RandomRestartConfig {
    fn default() -> Self {
        Self {
            trials: 30,
            local_iterations: 500,
        }
    }
}

/// Differential evolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Population size (at least 4 is used)
    pub population: usize,
    /// Crossover probability
    pub crossover: f64,
    /// Differential weight
    pub mutation: f64,
    /// Stop once the best value drops below this
    pub target_value: f64,
    /// Stop once the best value changed less than this ...
    pub change_tolerance: f64,
    /// ... over this many generations
    pub change_generations: usize,
    /// Hard generation cap
    pub max_generations: usize,
    /// Generations between progress log lines
    pub log_interval: usize,
    /// Apply the position repair heuristic every generation
    pub repair: bool,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population: 3,
            crossover: 0.9,
            mutation: 0.8,
            target_value: 1e-12,
            change_tolerance: 1e-7,
            change_generations: 5000,
            max_generations: 1_000_000,
            log_interval: 100,
            repair: true,
        }
    }
}

/// Scatter search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterConfig {
    /// Local searches per round
    pub searches_per_round: usize,
    /// Rounds without a new minimum before stopping
    pub retry: usize,
    /// Hard round cap
    pub max_rounds: usize,
    /// Decimals kept in the minima signature
    pub signature_decimals: i32,
    /// Relative change tolerance of each local search
    pub local_tolerance: f64,
    /// Generation cap of each local search
    pub local_generations: usize,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            searches_per_round: 10,
            retry: 1,
            max_rounds: 20,
            signature_decimals: 1,
            local_tolerance: 1e-4,
            local_generations: 10_000,
        }
    }
}
