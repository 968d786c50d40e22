//! MINOS intervals, profiles and confidence levels.

use approx::assert_relative_eq;
use minuit_rs::function::{FunctionAdapter, LIKELIHOOD};
use minuit_rs::migrad::Migrad;
use minuit_rs::parameters::Parameters;
use minuit_rs::uncertainty::{cl_to_delta, mnprofile, Minos, MinosConfig, MinosFailure};
use minuit_rs::{MigradConfig, Minuit};

use crate::test_helpers::{bowl, quadratic};

#[test]
fn test_minos_matches_hesse_on_quadratic() {
    let params = Parameters::from_names(&["x", "y", "z"], &[0.0, 0.0, 0.0]).unwrap();
    let fcn = FunctionAdapter::new(&bowl, params);
    let minimum = Migrad::new().minimize(&fcn).unwrap();
    let minos = Minos::new(&bowl, &minimum);

    for name in ["x", "y", "z"] {
        let error = minos.error(name, 1.0).unwrap();
        let sigma = minimum.errors()[name];
        assert!(error.is_valid());
        assert_relative_eq!(error.upper, sigma, epsilon = 1e-2);
        assert_relative_eq!(error.lower, -sigma, epsilon = 1e-2);
    }
}

#[test]
fn test_poisson_likelihood_interval() {
    // negative log-likelihood of a Poisson mean for n = 5 observed events
    let n = 5.0;
    let nll = |p: &[f64]| p[0] - n * p[0].ln();
    let mut params = Parameters::new();
    params.add_param_with_bounds("mu", 3.0, 1e-6, f64::INFINITY).unwrap();
    let fcn = FunctionAdapter::new(&nll, params).with_errordef(LIKELIHOOD);
    let minimum = Migrad::new().minimize(&fcn).unwrap();
    assert_relative_eq!(minimum.values()["mu"], 5.0, epsilon = 1e-2);

    let error = Minos::new(&nll, &minimum).error("mu", 1.0).unwrap();
    assert!(error.is_valid());
    // the likelihood is skewed towards larger means
    assert!(error.upper > -error.lower);

    let (lo, hi) = error.interval();
    let fmin = minimum.fval();
    assert!((nll(std::slice::from_ref(&lo)) - fmin - 0.5).abs() < 0.01);
    assert!((nll(std::slice::from_ref(&hi)) - fmin - 0.5).abs() < 0.01);
}

#[test]
fn test_probability_confidence_level() {
    let params = Parameters::from_names(&["x", "y"], &[0.0, 0.0]).unwrap();
    let fcn = FunctionAdapter::new(&quadratic, params);
    let minimum = Migrad::new().minimize(&fcn).unwrap();

    // a 90% interval of a unit Gaussian spans +/- 1.645
    let error = Minos::new(&quadratic, &minimum).error("x", 0.9).unwrap();
    let half_width = cl_to_delta(0.9, 1.0).unwrap().sqrt();
    assert_relative_eq!(half_width, 1.6449, epsilon = 1e-3);
    assert_relative_eq!(error.upper, half_width, epsilon = 1e-2);
}

#[test]
fn test_limited_iterations_fail_cleanly() {
    let params = Parameters::from_names(&["x", "y"], &[0.0, 0.0]).unwrap();
    let fcn = FunctionAdapter::new(&quadratic, params);
    let minimum = Migrad::new().minimize(&fcn).unwrap();
    let config = MinosConfig::default().with_max_iterations(1);

    let error = Minos::new(&quadratic, &minimum)
        .with_config(config)
        .error("y", 3.0)
        .unwrap();
    // the first trial at three sigma is exact for a quadratic
    assert!(error.is_valid());

    let config = MinosConfig::default().with_max_iterations(0);
    let error = Minos::new(&quadratic, &minimum)
        .with_config(config)
        .error("y", 1.0)
        .unwrap();
    assert!(!error.is_valid());
    assert_eq!(
        error.lower_failure,
        Some(MinosFailure::IterationLimit { iterations: 0 })
    );
}

#[test]
fn test_mnprofile_minimum_matches_fit() {
    let objective = |p: &[f64]| (p[0] - 1.0).powi(2) + (p[1] - p[0]).powi(2);
    let mut m = Minuit::new(objective, &["a", "b"], &[0.0, 0.0]).unwrap();
    m.migrad(None, 1).unwrap();

    let scan = m.mnprofile("a", Some((0.0, 2.0)), 21).unwrap();
    let (best, fval) = scan.best().unwrap();
    assert_relative_eq!(best, 1.0, epsilon = 1e-9);
    assert_relative_eq!(fval, 0.0, epsilon = 1e-6);

    // with b re-minimized only the first term remains
    assert_relative_eq!(scan.fvals[0], 1.0, epsilon = 1e-4);

    let direct = mnprofile(
        &objective,
        m.fmin().unwrap(),
        "a",
        Some((0.0, 2.0)),
        21,
        &MigradConfig::default(),
        None,
    )
    .unwrap();
    assert_eq!(direct.values, scan.values);
}

#[test]
fn test_parallel_minos_through_front_end() {
    let mut m = Minuit::new(bowl, &["x", "y", "z"], &[0.0, 0.0, 0.0]).unwrap();
    m.migrad(None, 1).unwrap();
    let calls = m.nfcn();

    let results = m.minos_parallel(&[], 2.0).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(m.merrors().len(), 3);
    assert!(m.nfcn() > calls);
    for error in &results {
        assert_relative_eq!(error.upper, 2.0, epsilon = 2e-2);
        assert_relative_eq!(error.lower, -2.0, epsilon = 2e-2);
    }
}
