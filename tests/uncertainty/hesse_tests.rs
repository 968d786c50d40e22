//! HESSE on minima with known curvature.

use approx::assert_relative_eq;
use minuit_rs::function::{FunctionAdapter, LIKELIHOOD};
use minuit_rs::migrad::Migrad;
use minuit_rs::parameters::Parameters;
use minuit_rs::uncertainty::{Hesse, HesseConfig, HesseFailure};
use minuit_rs::utils::initial_gradient;
use ndarray::array;

use crate::test_helpers::{matrix_approx_eq, quadratic_form};

#[test]
fn test_covariance_is_twice_up_times_inverse_hessian() {
    let a = array![[2.0, 0.5, 0.0], [0.5, 1.0, 0.2], [0.0, 0.2, 3.0]];
    let objective = quadratic_form(a.clone(), vec![1.0, 2.0, 3.0]);

    for up in [1.0, LIKELIHOOD] {
        let params = Parameters::from_names(&["a", "b", "c"], &[0.0, 0.0, 0.0]).unwrap();
        let fcn = FunctionAdapter::new(&objective, params).with_errordef(up);
        let minimum = Migrad::new().minimize(&fcn).unwrap();
        let minimum = Hesse::new().update(&fcn, &minimum).unwrap();
        assert!(minimum.has_accurate_covar());

        // inverse of the matrix a, by cofactors
        let det = 2.0 * (3.0 - 0.04) - 0.5 * (1.5 - 0.0);
        let inv = array![
            [(3.0 - 0.04) / det, -1.5 / det, 0.1 / det],
            [-1.5 / det, 6.0 / det, -0.4 / det],
            [0.1 / det, -0.4 / det, (2.0 - 0.25) / det],
        ];
        let expected = inv * (2.0 * up);
        let cov = minimum.covariance().unwrap().matrix().clone();
        assert!(matrix_approx_eq(&cov, &expected, 1e-3), "{:?}", cov);
    }
}

#[test]
fn test_hesse_detects_saddle() {
    // positive diagonal, eigenvalues 6 and -2
    let saddle = |p: &[f64]| p[0] * p[0] + 4.0 * p[0] * p[1] + p[1] * p[1];
    let params = Parameters::from_names(&["x", "y"], &[0.0, 0.0]).unwrap();
    let fcn = FunctionAdapter::new(&saddle, params);
    let x = fcn.parameters().internal_values().unwrap();
    let fval = fcn.eval_internal(&x).unwrap();
    let gradient = initial_gradient(&fcn, &x).unwrap();

    let estimate = Hesse::new().estimate(&fcn, &x, fval, &gradient).unwrap();
    assert!(matches!(
        estimate.inverse,
        Err(HesseFailure::NotPositiveDefinite { .. })
    ));

    // at_point forces a positive-definite matrix but stays usable
    let minimum = Hesse::new().at_point(&fcn, 1e-4).unwrap();
    assert!(minimum.has_made_posdef_covar());
    assert!(!minimum.has_posdef_covar());
    assert!(!minimum.hesse_failed());
}

#[test]
fn test_hesse_call_limit() {
    let objective = quadratic_form(array![[2.0, 0.0], [0.0, 2.0]], vec![0.0, 0.0]);
    let params = Parameters::from_names(&["x", "y"], &[0.0, 0.0]).unwrap();
    let fcn = FunctionAdapter::new(&objective, params);
    let minimum = Migrad::new().minimize(&fcn).unwrap();

    let hesse = Hesse::with_config(HesseConfig::default().with_max_calls(1));
    let refined = hesse.update(&fcn, &minimum).unwrap();
    assert!(refined.hesse_failed());
    assert!(!refined.is_valid());
    // the previous covariance is kept
    assert!(refined.has_covariance());
}
