//! Strategy selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// One optimization method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Projected L-BFGS from the initial guess
    QuasiNewton,
    /// Powell direction set with restarts from the previous best
    DirectionSet,
    /// Local searches from uniformly random starting points
    RandomRestart,
    /// Differential evolution with position repair
    Evolution,
    /// Ensemble of scattered local searches
    ScatterSearch,
}

impl Method {
    /// Every method, in the order the all-strategies mode runs them
    pub const ALL: [Method; 5] = [
        Method::QuasiNewton,
        Method::DirectionSet,
        Method::RandomRestart,
        Method::Evolution,
        Method::ScatterSearch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Method::QuasiNewton => "quasi-newton",
            Method::DirectionSet => "direction-set",
            Method::RandomRestart => "random-restart",
            Method::Evolution => "evolution",
            Method::ScatterSearch => "scatter-search",
        }
    }

    /// Offset of this method's random stream from the base seed
    pub(crate) fn seed_offset(&self) -> u64 {
        match self {
            Method::QuasiNewton => 0,
            Method::DirectionSet => 1,
            Method::RandomRestart => 2,
            Method::Evolution => 3,
            Method::ScatterSearch => 4,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the calibrator runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    Single(Method),
    /// Every method, best candidate wins
    All,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Single(Method::DirectionSet)
    }
}

impl Strategy {
    /// Methods to run, in order
    pub fn methods(&self) -> Vec<Method> {
        match self {
            Strategy::Single(method) => vec![*method],
            Strategy::All => Method::ALL.to_vec(),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Single(method) => method.fmt(f),
            Strategy::All => f.write_str("all"),
        }
    }
}

impl FromStr for Strategy {
    type Err = CalibrationError;

    /// Accepts method names, a few common aliases and the digits 0 to 5
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let strategy = match normalized.as_str() {
            "0" | "quasi-newton" | "lbfgs" | "l-bfgs" | "l-bfgs-b" => Strategy::Single(Method::QuasiNewton),
            "1" | "direction-set" | "powell" | "powelldirectionalsolver" => Strategy::Single(Method::DirectionSet),
            "2" | "random-restart" | "slsqp" => Strategy::Single(Method::RandomRestart),
            "3" | "evolution" | "differential-evolution" | "differentialevolutionsolver" => {
                Strategy::Single(Method::Evolution)
            }
            "4" | "scatter-search" | "scatter" | "buckshot" => Strategy::Single(Method::ScatterSearch),
            "5" | "all" => Strategy::All,
            _ => return Err(CalibrationError::UnsupportedStrategy(s.to_string())),
        };
        Ok(strategy)
    }
}

impl From<Method> for Strategy {
    fn from(method: Method) -> Self {
        Strategy::Single(method)
    }
}
