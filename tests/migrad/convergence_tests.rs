//! MIGRAD convergence on problems with known minima.

use approx::assert_relative_eq;
use minuit_rs::function::{FunctionAdapter, WithGradient};
use minuit_rs::migrad::{Migrad, MigradConfig, MinimizerStatus, Strategy};
use minuit_rs::parameters::Parameters;
use ndarray::array;

use crate::test_helpers::{bowl, quadratic, quadratic_form, rosenbrock};

#[test]
fn test_bowl_converges_with_unit_errors() {
    let params = Parameters::from_names(&["x", "y", "z"], &[0.0, 0.0, 0.0]).unwrap();
    let fcn = FunctionAdapter::new(&bowl, params);
    let minimum = Migrad::new().minimize(&fcn).unwrap();

    assert_eq!(minimum.status(), MinimizerStatus::Converged);
    assert!(minimum.is_valid());
    assert!(minimum.edm() < minimum.edm_goal());

    let values = minimum.values();
    assert_relative_eq!(values["x"], 2.0, epsilon = 1e-4);
    assert_relative_eq!(values["y"], 3.0, epsilon = 1e-4);
    assert_relative_eq!(values["z"], 4.0, epsilon = 1e-4);

    let errors = minimum.errors();
    for name in ["x", "y", "z"] {
        assert_relative_eq!(errors[name], 1.0, epsilon = 1e-3);
    }
}

#[test]
fn test_every_strategy_converges() {
    for strategy in [Strategy::Fast, Strategy::Default, Strategy::Thorough] {
        let params = Parameters::from_names(&["x", "y"], &[-1.0, 7.0]).unwrap();
        let fcn = FunctionAdapter::new(&quadratic, params);
        let minimum = Migrad::new().with_strategy(strategy).minimize(&fcn).unwrap();

        assert!(minimum.is_valid(), "strategy {:?}", strategy);
        assert_relative_eq!(minimum.values()["x"], 2.0, epsilon = 1e-3);
        assert_relative_eq!(minimum.values()["y"], 3.0, epsilon = 1e-3);
    }
}

#[test]
fn test_objective_decreases_with_iterations() {
    let run = |iterations: Option<usize>| {
        let params = Parameters::from_names(&["x", "y"], &[-1.2, 1.0]).unwrap();
        let fcn = FunctionAdapter::new(&rosenbrock, params);
        let mut migrad = Migrad::new().with_max_calls(10_000);
        if let Some(n) = iterations {
            migrad = migrad.with_max_iterations(n);
        }
        migrad.minimize(&fcn).unwrap()
    };

    let one = run(Some(1));
    let five = run(Some(5));
    let all = run(None);
    assert!(one.fval() < rosenbrock(&[-1.2, 1.0]));
    assert!(five.fval() <= one.fval());
    assert!(all.fval() <= five.fval());
    assert_eq!(one.status(), MinimizerStatus::MaxIterationsExceeded);

    assert!(all.is_valid());
    assert_relative_eq!(all.values()["x"], 1.0, epsilon = 1e-2);
    assert_relative_eq!(all.values()["y"], 1.0, epsilon = 2e-2);
}

#[test]
fn test_edm_decreases_with_iterations() {
    let a = array![[4.0, 2.0], [2.0, 3.0]];
    let run = |iterations: Option<usize>| {
        let fcn_fn = quadratic_form(a.clone(), vec![1.0, -1.0]);
        let params = Parameters::from_names(&["a", "b"], &[-2.0, 3.0]).unwrap();
        let fcn = FunctionAdapter::new(&fcn_fn, params);
        let mut migrad = Migrad::new();
        if let Some(n) = iterations {
            migrad = migrad.with_max_iterations(n);
        }
        migrad.minimize(&fcn).unwrap()
    };

    let minima: Vec<_> = [Some(1), Some(2), Some(3), Some(4), None].into_iter().map(run).collect();
    let goal = minima[0].edm_goal();
    assert!(minima[0].edm() > goal);
    for pair in minima.windows(2) {
        // below the goal only round-off is left
        assert!(
            pair[1].edm() <= pair[0].edm() || pair[1].edm() < goal,
            "edm went from {:e} to {:e}",
            pair[0].edm(),
            pair[1].edm()
        );
    }
    let last = &minima[minima.len() - 1];
    assert!(last.is_valid());
    assert!(last.edm() < goal);
}

#[test]
fn test_correlated_quadratic_covariance() {
    // f = d^T A d / 2 with up = 1 has covariance 2 A^-1
    let a = array![[4.0, 2.0], [2.0, 3.0]];
    let fcn_fn = quadratic_form(a, vec![1.0, -1.0]);
    let params = Parameters::from_names(&["a", "b"], &[0.0, 0.0]).unwrap();
    let fcn = FunctionAdapter::new(&fcn_fn, params);
    let minimum = Migrad::new().minimize(&fcn).unwrap();

    assert!(minimum.has_accurate_covar());
    let cov = minimum.covariance().unwrap();
    // A^-1 = [[3, -2], [-2, 4]] / 8
    assert_relative_eq!(cov.get("a", "a").unwrap(), 0.75, epsilon = 1e-3);
    assert_relative_eq!(cov.get("a", "b").unwrap(), -0.5, epsilon = 1e-3);
    assert_relative_eq!(cov.get("b", "b").unwrap(), 1.0, epsilon = 1e-3);

    let corr = cov.correlation();
    assert_relative_eq!(corr[[0, 1]], -0.5 / 0.75f64.sqrt(), epsilon = 1e-3);
}

#[test]
fn test_analytic_gradient_is_used() {
    let objective = WithGradient::new(quadratic, |p: &[f64]| {
        vec![2.0 * (p[0] - 2.0), 2.0 * (p[1] - 3.0)]
    });
    let params = Parameters::from_names(&["x", "y"], &[0.0, 0.0]).unwrap();
    let fcn = FunctionAdapter::new(&objective, params);
    assert!(fcn.has_gradient());

    let minimum = Migrad::new().minimize(&fcn).unwrap();
    assert!(minimum.is_valid());
    assert!(fcn.ngrad() > 0);
    assert_relative_eq!(minimum.values()["x"], 2.0, epsilon = 1e-4);
    assert_relative_eq!(minimum.values()["y"], 3.0, epsilon = 1e-4);
}

#[test]
fn test_fixed_parameter_is_excluded() {
    let mut params = Parameters::from_names(&["x", "y"], &[0.0, 5.0]).unwrap();
    params.fix("y").unwrap();
    let fcn = FunctionAdapter::new(&quadratic, params);
    let minimum = Migrad::new().minimize(&fcn).unwrap();

    assert_eq!(minimum.state().n(), 1);
    assert_relative_eq!(minimum.values()["x"], 2.0, epsilon = 1e-4);
    assert_eq!(minimum.values()["y"], 5.0);
    assert_relative_eq!(minimum.fval(), 4.0, epsilon = 1e-8);
}

#[test]
fn test_bounded_parameter_stays_inside() {
    let mut params = Parameters::new();
    params.add_param_with_bounds("x", 0.5, -1.0, 1.0).unwrap();
    params.add_param("y", 0.0).unwrap();
    let fcn = FunctionAdapter::new(&quadratic, params);
    let minimum = Migrad::new().minimize(&fcn).unwrap();

    let x = minimum.values()["x"];
    assert!((-1.0..=1.0).contains(&x));
    assert_relative_eq!(x, 1.0, epsilon = 1e-2);
    assert_relative_eq!(minimum.values()["y"], 3.0, epsilon = 1e-3);
}

#[test]
fn test_bounded_minimum_inside_range() {
    // a bound far from the minimum leaves the result unchanged
    let mut params = Parameters::new();
    params.add_param_with_bounds("x", 1.0, 0.0, 10.0).unwrap();
    params.add_param_with_bounds("y", 1.0, 0.0, f64::INFINITY).unwrap();
    let fcn = FunctionAdapter::new(&quadratic, params);
    let config = MigradConfig::default().with_tolerance(0.01);
    let minimum = Migrad::with_config(config).minimize(&fcn).unwrap();

    assert!(minimum.is_valid());
    assert!(!minimum.has_parameters_at_limit());
    assert_relative_eq!(minimum.values()["x"], 2.0, epsilon = 1e-3);
    assert_relative_eq!(minimum.values()["y"], 3.0, epsilon = 1e-3);
    // errors are mapped back to external coordinates
    assert_relative_eq!(minimum.errors()["x"], 1.0, epsilon = 0.05);
}
