//! Candidate solutions
//!
//! A candidate is one physical parameter vector decoded into anchors,
//! spool model and the full position set, together with its L2 cost. The
//! cost is always computed from the decoded fields at construction.

use nalgebra::{DVector, Vector3};

use crate::cost::CostKind;
use crate::kinematics::{AnchorGeometry, SpoolModel};
use crate::problem::CalibrationProblem;

/// Decoded and scored solution
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Method that produced the solution
    name: String,
    /// Physical parameter vector
    solution: DVector<f64>,
    anchors: AnchorGeometry,
    spool: SpoolModel,
    /// All u positions, the known ones first
    positions: Vec<Vector3<f64>>,
    cost: f64,
}

impl Candidate {
    /// Decode a physical parameter vector and compute its cost
    pub fn evaluate(name: impl Into<String>, solution: DVector<f64>, problem: &CalibrationProblem) -> Self {
        let decoded = problem.layout().decode(&solution);
        let positions = problem.full_positions(&decoded.free_positions);
        let cost = CostKind::L2.cost(
            &decoded.anchors,
            &positions,
            problem.motor_samples(),
            &decoded.spool,
            problem.hardware(),
        );

        Self {
            name: name.into(),
            solution,
            anchors: decoded.anchors,
            spool: decoded.spool,
            positions,
            cost,
        }
    }

    /// All-zero placeholder that loses against any evaluated candidate
    pub fn baseline(problem: &CalibrationProblem) -> Self {
        let layout = problem.layout();
        let solution = DVector::zeros(layout.len());
        let decoded = layout.decode(&solution);

        Self {
            name: "baseline".to_string(),
            positions: problem.full_positions(&decoded.free_positions),
            solution,
            anchors: decoded.anchors,
            spool: decoded.spool,
            cost: f64::INFINITY,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn solution(&self) -> &DVector<f64> {
        &self.solution
    }

    pub fn anchors(&self) -> &AnchorGeometry {
        &self.anchors
    }

    pub fn spool(&self) -> &SpoolModel {
        &self.spool
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Cost divided by the number of samples
    pub fn cost_per_sample(&self) -> f64 {
        self.cost / self.positions.len().max(1) as f64
    }
}

/// Lowest-cost item, ties keep the earliest, NaN never wins
pub fn select_min_by_cost<T, F>(items: impl IntoIterator<Item = T>, cost: F) -> Option<T>
where
    F: Fn(&T) -> f64,
{
    let key = |v: f64| if v.is_nan() { f64::INFINITY } else { v };
    let mut best: Option<(f64, T)> = None;
    for item in items {
        let c = key(cost(&item));
        match &best {
            Some((best_cost, _)) if c >= *best_cost => {}
            _ => best = Some((c, item)),
        }
    }
    best.map(|(_, item)| item)
}

/// Winner of an all-strategies run
pub fn select_winner(candidates: Vec<Candidate>) -> Option<Candidate> {
    select_min_by_cost(candidates, Candidate::cost)
}
