//! Calibration driver
//!
//! Runs one or every optimization method on a calibration problem:
//!
//! 1. Check that the data can determine the anchors at all
//! 2. Build the scaled objective, the bound box and the initial guess
//! 3. Minimize with the selected method
//! 4. Return the solution in physical units, or the best candidate

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, info_span, warn};

use super::{
    BoundedMinimizer, CancelToken, DifferentialEvolution, DirectionSet, Executor, Method, Minimum,
    Objective, ProjectedLbfgs, Repair, ScatterSearch, Strategy,
};
use crate::bounds::{repair_positions, Bounds, BoundsBuilder};
use crate::candidate::{select_winner, Candidate};
use crate::config::CalibrationConfig;
use crate::cost::ScaledObjective;
use crate::error::CalibrationError;
use crate::kinematics::{AnchorGeometry, SpoolModel};
use crate::problem::{CalibrationProblem, DataSufficiency};
use crate::Vec3;

/// Entry point of the calibration engine
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    config: CalibrationConfig,
    executor: Executor,
    cancel: CancelToken,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            executor: config.executor,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Executor for the scatter-search rounds
    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    /// Token polled between random-restart trials
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Refuse to solve when the data cannot determine the anchors
    pub fn check_data(&self, problem: &CalibrationProblem) -> Result<DataSufficiency, CalibrationError> {
        let requirements = &self.config.data;
        let measurements = problem.measurement_count();
        let sufficiency = problem.sufficiency(requirements);

        match sufficiency {
            DataSufficiency::Insufficient if !requirements.allow_insufficient => {
                return Err(CalibrationError::InsufficientData {
                    measurements,
                    required: requirements.min_measurements,
                });
            }
            DataSufficiency::Insufficient => warn!(
                measurements,
                required = requirements.min_measurements,
                "insufficient data, proceeding anyway; the result is not trustworthy"
            ),
            DataSufficiency::Marginal => warn!(
                measurements,
                recommended = requirements.reliable_measurements,
                "data is marginal; the result is unreliable unless the samples are very accurate"
            ),
            DataSufficiency::Sufficient => {}
        }
        Ok(sufficiency)
    }

    /// Minimize with one method
    ///
    /// # Returns
    /// The physical parameter vector
    /// [anchors(9) | free positions(3·(u−k)) | buildup | radii(4)]
    pub fn solve(
        &self,
        problem: &CalibrationProblem,
        method: Method,
        cx_is_positive: bool,
    ) -> Result<DVector<f64>, CalibrationError> {
        self.check_data(problem)?;
        Ok(self.run_method(problem, method, cx_is_positive))
    }

    /// Run a strategy and return the lowest-cost candidate
    pub fn calibrate(
        &self,
        problem: &CalibrationProblem,
        strategy: Strategy,
        cx_is_positive: bool,
    ) -> Result<Candidate, CalibrationError> {
        self.check_data(problem)?;

        let candidates: Vec<Candidate> = strategy
            .methods()
            .into_iter()
            .map(|method| {
                let solution = self.run_method(problem, method, cx_is_positive);
                let candidate = Candidate::evaluate(method.name(), solution, problem);
                info!(method = %method, cost = candidate.cost(), "candidate");
                candidate
            })
            .collect();

        let winner = select_winner(candidates).unwrap_or_else(|| Candidate::baseline(problem));
        if strategy == Strategy::All {
            info!(winner = winner.name(), cost = winner.cost(), "all strategies finished");
        }
        Ok(winner)
    }

    /// Bound box in scaled units
    pub fn bounds(&self, problem: &CalibrationProblem, cx_is_positive: bool) -> Bounds {
        BoundsBuilder::new(problem.layout())
            .with_envelope(self.config.envelope.clone())
            .with_cx_positive(cx_is_positive)
            .with_fixed_positions(problem.num_fixed())
            .build(&self.config.scale)
    }

    /// Initial guess in physical units: zero anchors and positions, nominal spools
    pub fn initial_guess(&self, problem: &CalibrationProblem) -> DVector<f64> {
        let guess = &self.config.initial_guess;
        problem.layout().encode(
            &AnchorGeometry::from_params(&[0.0; crate::PARAMS_ANCHOR]),
            &vec![Vec3::zeros(); problem.num_free()],
            &SpoolModel::uniform(guess.buildup_factor, guess.zero_radius),
        )
    }

    fn rng(&self, method: Method) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(method.seed_offset())),
            None => StdRng::from_entropy(),
        }
    }

    fn run_method(&self, problem: &CalibrationProblem, method: Method, cx_is_positive: bool) -> DVector<f64> {
        let span = info_span!("strategy", method = %method);
        let _enter = span.enter();

        let objective = ScaledObjective::new(problem, &self.config.scale, self.config.cost);
        let bounds = self.bounds(problem, cx_is_positive);
        let x0 = bounds.project(&objective.scaled(&self.initial_guess(problem)));
        let mut rng = self.rng(method);

        let best = match method {
            Method::QuasiNewton => {
                ProjectedLbfgs::new(self.config.quasi_newton.clone()).minimize(&objective, &bounds, &x0)
            }
            Method::DirectionSet => self.direction_set(&objective, &bounds, &x0),
            Method::RandomRestart => self.random_restart(&objective, &bounds, &x0, &mut rng),
            Method::Evolution => {
                let repair = |x: &DVector<f64>| {
                    let repaired = repair_positions(
                        &objective.physical(x),
                        objective.layout(),
                        problem.motor_samples(),
                        problem.num_fixed(),
                        cx_is_positive,
                    );
                    objective.scaled(&repaired)
                };
                let repair: Option<Repair<'_>> = if self.config.evolution.repair {
                    Some(&repair)
                } else {
                    None
                };
                DifferentialEvolution::new(self.config.evolution.clone()).run(&objective, &bounds, repair, &mut rng)
            }
            Method::ScatterSearch => {
                ScatterSearch::new(self.config.scatter.clone(), self.executor).run(&objective, &bounds, &mut rng)
            }
        };

        info!(
            value = best.value,
            iterations = best.iterations,
            evaluations = best.evaluations,
            "method finished"
        );
        objective.physical(&best.x)
    }

    /// Direction set search, restarted from its own best with a fresh basis
    fn direction_set(&self, objective: &dyn Objective, bounds: &Bounds, x0: &DVector<f64>) -> Minimum {
        let solver = DirectionSet::new(self.config.direction_set.clone());
        let mut best = solver.minimize(objective, bounds, x0);

        for restart in 0..self.config.direction_set.restarts {
            let result = solver.minimize(objective, bounds, &best.x);
            if !result.improves_on(&best) {
                break;
            }
            info!(restart, value = result.value, "direction set improved");
            best = result;
        }
        best
    }

    /// Local searches from random starting points, keeping the best
    ///
    /// Stops early with the best so far once the cancel token is set.
    fn random_restart(
        &self,
        objective: &dyn Objective,
        bounds: &Bounds,
        x0: &DVector<f64>,
        rng: &mut StdRng,
    ) -> Minimum {
        let config = &self.config.random_restart;
        let local = ProjectedLbfgs::new(self.config.quasi_newton.clone()).with_max_iterations(config.local_iterations);

        let mut best = Minimum {
            x: x0.clone(),
            value: objective.value(x0),
            iterations: 0,
            evaluations: 1,
        };

        for trial in 0..config.trials {
            if self.cancel.is_cancelled() {
                warn!(trial, value = best.value, "cancelled, keeping best result so far");
                break;
            }

            let start = bounds.sample(rng);
            let result = local.minimize(objective, bounds, &start);
            if result.improves_on(&best) {
                info!(trial, value = result.value, "new best");
                best = result;
            }
        }
        best
    }
}
