//! Calibration Engine Tests
//!
//! End-to-end checks on synthetic data generated with the forward model:
//! 1. The true parameters cost nothing, and default searches find them
//! 2. Every strategy respects the bound box
//! 3. Flipping the handedness flag mirrors the solution
//! 4. Insufficient data is refused unless overridden
//! 5. Cancellation and executors do not change what is returned

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector, Vector3};

use hangcal_core::bounds::BoundsBuilder;
use hangcal_core::config::{
    DirectionSetConfig, EvolutionConfig, QuasiNewtonConfig, RandomRestartConfig, ScatterConfig,
};
use hangcal_core::cost::{residuals, CostKind, ScaledObjective};
use hangcal_core::kinematics::motor_positions;
use hangcal_core::optimize::Objective;
use hangcal_core::{
    AnchorGeometry, CalibrationConfig, CalibrationError, CalibrationProblem, Calibrator, CancelToken,
    Candidate, DataSufficiency, Executor, Method, SpoolHardware, SpoolModel, Strategy,
};

fn true_anchors() -> AnchorGeometry {
    AnchorGeometry::from_params(&[
        -1620.0, -10.0, 1456.0, 1058.0, -10.0, -1403.0, 810.0, -10.0, 2350.0,
    ])
}

fn true_spool() -> SpoolModel {
    SpoolModel::new(0.0078, [65.1, 65.4, 64.9, 65.8])
}

/// Reference sample at the origin followed by samples around the volume
fn true_positions() -> Vec<Vector3<f64>> {
    vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(400.0, -300.0, 50.0),
        Vector3::new(-450.0, 250.0, 120.0),
        Vector3::new(300.0, 500.0, 600.0),
        Vector3::new(-200.0, -600.0, 900.0),
        Vector3::new(700.0, 100.0, 300.0),
        Vector3::new(-650.0, -150.0, 450.0),
        Vector3::new(50.0, 700.0, 1200.0),
        Vector3::new(-100.0, -350.0, 1500.0),
        Vector3::new(250.0, 200.0, 1000.0),
        Vector3::new(-300.0, 400.0, 200.0),
        Vector3::new(600.0, -500.0, 750.0),
        Vector3::new(150.0, -150.0, 400.0),
        Vector3::new(-350.0, -100.0, 700.0),
        Vector3::new(450.0, 350.0, 150.0),
        Vector3::new(-150.0, 450.0, 850.0),
        Vector3::new(0.0, -450.0, 300.0),
        Vector3::new(350.0, 50.0, 1300.0),
        Vector3::new(-500.0, 300.0, 550.0),
        Vector3::new(50.0, -100.0, 1800.0),
    ]
}

fn synthetic_problem(num_fixed: usize) -> CalibrationProblem {
    let positions = true_positions();
    let samples = motor_positions(&true_anchors(), &positions, &true_spool(), &SpoolHardware::default());
    CalibrationProblem::new(samples, positions[..num_fixed].to_vec(), SpoolHardware::default()).unwrap()
}

fn true_solution(problem: &CalibrationProblem) -> DVector<f64> {
    let positions = true_positions();
    problem
        .layout()
        .encode(&true_anchors(), &positions[problem.num_fixed()..], &true_spool())
}

/// Small budgets so every strategy finishes quickly
fn quick_config() -> CalibrationConfig {
    CalibrationConfig {
        quasi_newton: QuasiNewtonConfig {
            max_iterations: 200,
            ..QuasiNewtonConfig::default()
        },
        direction_set: DirectionSetConfig {
            restarts: 1,
            max_generations: 3,
            ..DirectionSetConfig::default()
        },
        random_restart: RandomRestartConfig {
            trials: 3,
            local_iterations: 20,
        },
        evolution: EvolutionConfig {
            population: 8,
            max_generations: 20,
            ..EvolutionConfig::default()
        },
        scatter: ScatterConfig {
            searches_per_round: 2,
            max_rounds: 2,
            local_generations: 2,
            ..ScatterConfig::default()
        },
        seed: Some(42),
        ..CalibrationConfig::default()
    }
}

mod model_tests {
    use super::*;

    #[test]
    fn test_true_parameters_cost_nothing() {
        for num_fixed in [0, 1, 4] {
            let problem = synthetic_problem(num_fixed);
            let candidate = Candidate::evaluate("truth", true_solution(&problem), &problem);

            assert!(candidate.cost() < 1e-12, "cost {}", candidate.cost());
            assert_eq!(candidate.positions().len(), true_positions().len());
            assert_relative_eq!(candidate.spool().buildup_factor, 0.0078, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_scaled_objective_agrees_with_candidate() {
        let problem = synthetic_problem(1);
        let config = CalibrationConfig::default();
        let objective = ScaledObjective::new(&problem, &config.scale, CostKind::L2);

        let mut physical = true_solution(&problem);
        physical[0] += 25.0;
        physical[12] -= 40.0;
        let candidate = Candidate::evaluate("perturbed", physical.clone(), &problem);

        assert_relative_eq!(objective.value(&objective.scaled(&physical)), candidate.cost(), max_relative = 1e-9);
        assert!(candidate.cost() > 1.0);
    }

    #[test]
    fn test_costs_non_negative_across_bounds() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let problem = synthetic_problem(0);
        let bounds = BoundsBuilder::new(problem.layout()).build_physical();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..20 {
            let x = bounds.sample(&mut rng);
            let decoded = problem.layout().decode(&x);
            let positions = problem.full_positions(&decoded.free_positions);
            for kind in [CostKind::L1, CostKind::L2, CostKind::L4, CostKind::L8] {
                let cost = kind.cost(
                    &decoded.anchors,
                    &positions,
                    problem.motor_samples(),
                    &decoded.spool,
                    problem.hardware(),
                );
                assert!(cost >= 0.0);
            }
        }
    }

    #[test]
    fn test_residual_rows_measured_from_origin() {
        let problem = synthetic_problem(0);
        let hw = SpoolHardware::default();
        let anchors = AnchorGeometry::from_params(&[
            -1500.0, 20.0, 1300.0, 1100.0, -40.0, -1500.0, 700.0, 15.0, 2200.0,
        ]);
        let spool = SpoolModel::uniform(0.005, 65.5);
        let positions = true_positions();

        // Shift every position except the reference sample
        let shift = Vector3::new(35.0, -20.0, 60.0);
        let shifted: Vec<Vector3<f64>> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| if i == 0 { *p } else { p + shift })
            .collect();

        let r = residuals(&anchors, &positions, problem.motor_samples(), &spool, &hw);
        let r_shifted = residuals(&anchors, &shifted, problem.motor_samples(), &spool, &hw);

        for k in 0..4 {
            assert_relative_eq!(r[(0, k)], 0.0, epsilon = 1e-9);
            assert_relative_eq!(r_shifted[(0, k)], 0.0, epsilon = 1e-9);
        }

        // Each row only depends on its own position
        for (i, p) in shifted.iter().enumerate() {
            let row_samples = DMatrix::from_rows(&[problem.motor_samples().row(i).into_owned()]);
            let single = residuals(&anchors, &[*p], &row_samples, &spool, &hw);
            for k in 0..4 {
                assert_relative_eq!(single[(0, k)], r_shifted[(i, k)], epsilon = 1e-9);
            }
        }
    }
}

mod bound_tests {
    use super::*;

    fn assert_within_bounds(calibrator: &Calibrator, problem: &CalibrationProblem, cx_is_positive: bool, x: &DVector<f64>) {
        let factors = calibrator.config().scale.factors(&problem.layout());
        let physical_bounds = calibrator.bounds(problem, cx_is_positive).unscale(&factors);
        assert!(physical_bounds.contains(x), "solution outside bounds: {x}");
    }

    #[test]
    fn test_every_method_stays_in_bounds() {
        let problem = synthetic_problem(0);
        let calibrator = Calibrator::new(quick_config());

        for method in Method::ALL {
            for cx_is_positive in [false, true] {
                let solution = calibrator.solve(&problem, method, cx_is_positive).unwrap();
                assert_eq!(solution.len(), problem.layout().len());
                assert_within_bounds(&calibrator, &problem, cx_is_positive, &solution);
            }
        }
    }

    #[test]
    fn test_sign_convention_holds_in_solution() {
        let problem = synthetic_problem(0);
        let calibrator = Calibrator::new(quick_config());

        let default = calibrator.solve(&problem, Method::QuasiNewton, false).unwrap();
        assert!(default[2] > 0.0, "B.x {}", default[2]);
        assert!(default[5] < 0.0, "C.x {}", default[5]);
        assert!(default[8] > 0.0, "D.z {}", default[8]);

        let flipped = calibrator.solve(&problem, Method::QuasiNewton, true).unwrap();
        assert!(flipped[2] < 0.0);
        assert!(flipped[5] > 0.0);
    }

    #[test]
    fn test_relaxed_sign_with_fixed_positions() {
        let problem = synthetic_problem(4);
        let calibrator = Calibrator::new(quick_config());
        let factors = calibrator.config().scale.factors(&problem.layout());
        let bounds = calibrator.bounds(&problem, false).unscale(&factors);

        assert_relative_eq!(bounds.lower()[2], -4000.0, max_relative = 1e-12);
        let solution = calibrator.solve(&problem, Method::QuasiNewton, false).unwrap();
        assert!(bounds.contains(&solution));
    }
}

mod optimization_tests {
    use super::*;

    #[test]
    fn test_quasi_newton_improves_on_initial_guess() {
        let problem = synthetic_problem(4);
        let calibrator = Calibrator::new(quick_config());

        let initial = calibrator.initial_guess(&problem);
        let factors = calibrator.config().scale.factors(&problem.layout());
        let initial = calibrator
            .bounds(&problem, false)
            .unscale(&factors)
            .project(&initial);
        let start = Candidate::evaluate("initial", initial, &problem);

        let solution = calibrator.solve(&problem, Method::QuasiNewton, false).unwrap();
        let end = Candidate::evaluate("quasi-newton", solution, &problem);

        assert!(end.cost() < start.cost());
    }

    #[test]
    fn test_default_methods_converge_on_exact_data() {
        let problem = synthetic_problem(0);
        let calibrator = Calibrator::new(CalibrationConfig {
            seed: Some(42),
            ..CalibrationConfig::default()
        });

        let solution = calibrator.solve(&problem, Method::QuasiNewton, false).unwrap();
        let quasi_newton = Candidate::evaluate("quasi-newton", solution, &problem);
        assert!(quasi_newton.cost() < 1e-6, "quasi-newton cost {}", quasi_newton.cost());

        let solution = calibrator.solve(&problem, Method::DirectionSet, false).unwrap();
        let direction_set = Candidate::evaluate("direction-set", solution, &problem);
        assert!(direction_set.cost() < 1.0, "direction-set cost {}", direction_set.cost());
    }

    #[test]
    fn test_flipped_handedness_mirrors_solution() {
        let problem = synthetic_problem(0);
        let calibrator = Calibrator::new(quick_config());
        let layout = problem.layout();

        let normal = calibrator.solve(&problem, Method::QuasiNewton, false).unwrap();
        let flipped = calibrator.solve(&problem, Method::QuasiNewton, true).unwrap();

        // Reflect the flipped solution back through x = 0
        let mut reflected = flipped.clone();
        reflected[2] = -reflected[2];
        reflected[5] = -reflected[5];
        for j in 0..layout.num_free_positions() {
            let ix = layout.position_index(j, hangcal_core::X);
            reflected[ix] = -reflected[ix];
        }

        let normal_cost = Candidate::evaluate("normal", normal.clone(), &problem).cost();
        let flipped_cost = Candidate::evaluate("flipped", flipped, &problem).cost();
        let reflected_cost = Candidate::evaluate("reflected", reflected.clone(), &problem).cost();

        assert_relative_eq!(flipped_cost, normal_cost, max_relative = 1e-9);
        assert_relative_eq!(reflected_cost, normal_cost, max_relative = 1e-9);
        for i in 0..normal.len() {
            assert_relative_eq!(reflected[i], normal[i], epsilon = 1e-9, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_all_strategies_pick_lowest_cost() {
        let problem = synthetic_problem(1);
        let calibrator = Calibrator::new(quick_config());

        let winner = calibrator.calibrate(&problem, Strategy::All, false).unwrap();
        for method in Method::ALL {
            let solution = calibrator.solve(&problem, method, false).unwrap();
            let candidate = Candidate::evaluate(method.name(), solution, &problem);
            assert!(winner.cost() <= candidate.cost(), "{method} beat the winner");
        }
    }

    #[test]
    fn test_single_strategy_candidate_named_after_method() {
        let problem = synthetic_problem(1);
        let calibrator = Calibrator::new(quick_config());

        let candidate = calibrator
            .calibrate(&problem, "0".parse().unwrap(), false)
            .unwrap();
        assert_eq!(candidate.name(), "quasi-newton");
        assert!(candidate.cost().is_finite());
    }

    #[test]
    fn test_scatter_search_independent_of_executor() {
        let problem = synthetic_problem(2);
        let serial = Calibrator::new(quick_config()).with_executor(Executor::Serial);
        let parallel = Calibrator::new(quick_config()).with_executor(Executor::Parallel);

        let a = serial.solve(&problem, Method::ScatterSearch, false).unwrap();
        let b = parallel.solve(&problem, Method::ScatterSearch, false).unwrap();
        assert_eq!(a, b);
    }
}

mod data_gate_tests {
    use super::*;

    fn two_samples() -> CalibrationProblem {
        let positions = &true_positions()[..2];
        let samples = motor_positions(&true_anchors(), positions, &true_spool(), &SpoolHardware::default());
        CalibrationProblem::new(samples, Vec::new(), SpoolHardware::default()).unwrap()
    }

    #[test]
    fn test_two_samples_refused() {
        let calibrator = Calibrator::new(quick_config());
        let problem = two_samples();

        assert_eq!(
            calibrator.solve(&problem, Method::QuasiNewton, false).unwrap_err(),
            CalibrationError::InsufficientData {
                measurements: 2,
                required: 9
            }
        );
        assert!(calibrator.calibrate(&problem, Strategy::All, false).is_err());
    }

    #[test]
    fn test_override_proceeds() {
        let mut config = quick_config();
        config.data.allow_insufficient = true;
        let calibrator = Calibrator::new(config);
        let problem = two_samples();

        assert_eq!(calibrator.check_data(&problem).unwrap(), DataSufficiency::Insufficient);
        let solution = calibrator.solve(&problem, Method::QuasiNewton, false).unwrap();
        assert_eq!(solution.len(), 9 + 6 + 5);
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let mut config = quick_config();
        config.data.min_measurements = 2;
        let calibrator = Calibrator::new(config);

        assert_eq!(calibrator.check_data(&two_samples()).unwrap(), DataSufficiency::Marginal);
    }

    #[test]
    fn test_unknown_strategy_name() {
        let err = "nelder-mead".parse::<Strategy>().unwrap_err();
        assert_eq!(err, CalibrationError::UnsupportedStrategy("nelder-mead".to_string()));
        assert!(err.to_string().contains("nelder-mead"));
    }
}

mod cancellation_tests {
    use super::*;

    #[test]
    fn test_cancelled_random_restart_returns_initial_guess() {
        let problem = synthetic_problem(0);
        let token = CancelToken::new();
        token.cancel();
        let calibrator = Calibrator::new(quick_config()).with_cancel_token(token);

        let solution = calibrator.solve(&problem, Method::RandomRestart, false).unwrap();

        let factors = calibrator.config().scale.factors(&problem.layout());
        let scaled_guess = calibrator.initial_guess(&problem).component_div(&factors);
        let expected = calibrator
            .bounds(&problem, false)
            .project(&scaled_guess)
            .component_mul(&factors);
        assert_eq!(solution, expected);
    }

    #[test]
    fn test_uncancelled_random_restart_does_no_worse() {
        let problem = synthetic_problem(0);
        let cancelled = CancelToken::new();
        cancelled.cancel();

        let baseline = Calibrator::new(quick_config())
            .with_cancel_token(cancelled)
            .solve(&problem, Method::RandomRestart, false)
            .unwrap();
        let full = Calibrator::new(quick_config())
            .solve(&problem, Method::RandomRestart, false)
            .unwrap();

        let baseline_cost = Candidate::evaluate("baseline", baseline, &problem).cost();
        let full_cost = Candidate::evaluate("full", full, &problem).cost();
        assert!(full_cost <= baseline_cost * (1.0 + 1e-9));
    }
}
