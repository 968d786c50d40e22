//! Fits of NIST Statistical Reference Datasets (StRD) with certified results.
//!
//! Data source: https://www.itl.nist.gov/div898/strd/nls/nls_main.shtml

use approx::assert_relative_eq;
use minuit_rs::cost::LeastSquares;
use minuit_rs::{minimize, MinimizeOptions, Minuit};
use ndarray::{array, Array1};

/// Misra1a, lower difficulty: y = b1 * (1 - exp(-b2 * x))
fn misra1a() -> (Array1<f64>, Array1<f64>) {
    let x = array![
        77.6, 114.9, 141.1, 190.8, 239.9, 289.0, 332.8, 378.4, 434.8, 477.3, 536.8, 593.1,
        689.1, 760.0
    ];
    let y = array![
        10.07, 14.73, 17.94, 23.93, 29.61, 35.18, 40.02, 44.82, 50.76, 55.05, 61.01, 66.40,
        75.47, 81.78
    ];
    (x, y)
}

const MISRA1A_PARAMS: [f64; 2] = [2.3894212918e2, 5.5015643181e-4];
const MISRA1A_STD_DEV: [f64; 2] = [2.7070075241, 1.2889360290e-5];
const MISRA1A_RSS: f64 = 1.2455138894e-1;

fn misra1a_model(x: f64, b: &[f64]) -> f64 {
    b[0] * (1.0 - (-b[1] * x).exp())
}

#[test]
fn test_misra1a_certified_values() {
    let (x, y) = misra1a();
    let ndata = x.len();
    let cost = LeastSquares::unweighted(x, y, misra1a_model).unwrap();

    let mut m = Minuit::new(cost, &["b1", "b2"], &[250.0, 5e-4]).unwrap();
    m.set_error("b1", 10.0).unwrap();
    m.set_error("b2", 1e-5).unwrap();
    m.set_tolerance(1e-3);
    m.migrad(Some(10_000), 3).unwrap();
    m.hesse(None).unwrap();

    assert!(m.valid(), "{}", m);
    let values = m.values();
    assert_relative_eq!(values["b1"], MISRA1A_PARAMS[0], max_relative = 1e-3);
    assert_relative_eq!(values["b2"], MISRA1A_PARAMS[1], max_relative = 1e-3);

    let rss = m.fval().unwrap();
    assert_relative_eq!(rss, MISRA1A_RSS, max_relative = 1e-3);

    // errors of an unweighted fit scale with the residual variance
    let scale = (rss / (ndata - 2) as f64).sqrt();
    let errors = m.errors();
    assert_relative_eq!(errors["b1"] * scale, MISRA1A_STD_DEV[0], max_relative = 2e-2);
    assert_relative_eq!(errors["b2"] * scale, MISRA1A_STD_DEV[1], max_relative = 2e-2);

    // b1 and b2 are almost fully anti-correlated
    let corr = m.correlation().unwrap();
    assert!(corr[[0, 1]] < -0.99);
}

#[test]
fn test_misra1a_through_minimize() {
    let (x, y) = misra1a();
    let cost = LeastSquares::unweighted(x, y, misra1a_model).unwrap();
    let options = MinimizeOptions::default()
        .with_tol(1e-3)
        .with_max_calls(10_000);
    let result = minimize(cost, &[240.0, 5.5e-4], &options).unwrap();

    assert!(result.success, "{}", result.message);
    assert_relative_eq!(result.x[0], MISRA1A_PARAMS[0], max_relative = 1e-2);
    assert_relative_eq!(result.x[1], MISRA1A_PARAMS[1], max_relative = 1e-2);
    assert_relative_eq!(result.fun, MISRA1A_RSS, max_relative = 1e-2);
}
