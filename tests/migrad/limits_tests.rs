//! Budgets, evaluation failures and the recovery value.

use minuit_rs::error::MinuitError;
use minuit_rs::function::{Fallible, FunctionAdapter};
use minuit_rs::migrad::{Migrad, MigradConfig, MinimizerStatus};
use minuit_rs::parameters::Parameters;

use crate::test_helpers::{bowl, rosenbrock};

#[test]
fn test_call_limit_returns_best_point() {
    let params = Parameters::from_names(&["x", "y"], &[-1.2, 1.0]).unwrap();
    let fcn = FunctionAdapter::new(&rosenbrock, params);
    let minimum = Migrad::new().with_max_calls(25).minimize(&fcn).unwrap();

    assert_eq!(minimum.status(), MinimizerStatus::MaxCallsExceeded);
    assert!(minimum.has_reached_call_limit());
    assert!(!minimum.is_valid());
    assert!(minimum.fval() < rosenbrock(&[-1.2, 1.0]));
    // the limit is checked between iterations
    assert!(minimum.nfcn() >= 25);
}

#[test]
fn test_call_counter_is_per_adapter() {
    let params = Parameters::from_names(&["x", "y", "z"], &[0.0, 0.0, 0.0]).unwrap();
    let first = FunctionAdapter::new(&bowl, params.clone());
    let second = FunctionAdapter::new(&bowl, params);

    let a = Migrad::new().minimize(&first).unwrap();
    let b = Migrad::new().minimize(&second).unwrap();
    assert_eq!(a.nfcn(), first.nfcn());
    assert_eq!(a.nfcn(), b.nfcn());
}

#[test]
fn test_invalid_configuration() {
    let params = Parameters::from_names(&["x", "y", "z"], &[0.0, 0.0, 0.0]).unwrap();
    let fcn = FunctionAdapter::new(&bowl, params);

    let config = MigradConfig::default().with_tolerance(-1.0);
    assert!(matches!(
        Migrad::with_config(config).minimize(&fcn),
        Err(MinuitError::InvalidConfig(_))
    ));
    assert!(matches!(
        Migrad::new().with_max_calls(0).minimize(&fcn),
        Err(MinuitError::InvalidConfig(_))
    ));
}

#[test]
fn test_failure_at_start_is_an_error() {
    let objective = Fallible(|p: &[f64]| -> minuit_rs::Result<f64> {
        if p[0] <= 0.0 {
            Err(MinuitError::EvaluationError("log of non-positive value".to_string()))
        } else {
            Ok(p[0] - p[0].ln())
        }
    });
    let params = Parameters::from_names(&["x"], &[-1.0]).unwrap();
    let fcn = FunctionAdapter::new(&objective, params);
    assert!(matches!(
        Migrad::new().minimize(&fcn),
        Err(MinuitError::EvaluationError(_))
    ));
}

#[test]
fn test_failures_during_search_are_stepped_around() {
    // x - ln(x) has its minimum at 1 and is undefined for x <= 0
    let objective = |p: &[f64]| p[0] - p[0].ln();
    let params = Parameters::from_names(&["x"], &[3.0]).unwrap();

    // the first Newton step lands at x < 0, where the NaN is replaced by the
    // recovery value
    let fcn = FunctionAdapter::new(&objective, params).with_recovery(Some(1e6));
    let minimum = Migrad::new().minimize(&fcn).unwrap();
    assert!(minimum.is_valid());
    assert!((minimum.values()["x"] - 1.0).abs() < 1e-2);
}

#[test]
fn test_all_parameters_fixed() {
    let mut params = Parameters::from_names(&["x", "y", "z"], &[1.0, 1.0, 1.0]).unwrap();
    for name in ["x", "y", "z"] {
        params.fix(name).unwrap();
    }
    let fcn = FunctionAdapter::new(&bowl, params);
    let minimum = Migrad::new().minimize(&fcn).unwrap();

    assert_eq!(minimum.status(), MinimizerStatus::Converged);
    assert_eq!(minimum.nfcn(), 1);
    assert_eq!(minimum.fval(), 14.0);
    assert!(!minimum.has_covariance());
}
