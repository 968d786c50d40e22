//! Fits of the kind found in data analysis: a peak on a grid and a lifetime
//! from an unbinned likelihood.

use approx::assert_relative_eq;
use minuit_rs::cost::LeastSquares;
use minuit_rs::{minimize, MinimizeOptions, Minuit, MinuitConfig, LIKELIHOOD};
use ndarray::Array1;

fn gaussian(x: f64, p: &[f64]) -> f64 {
    p[0] * (-(x - p[1]).powi(2) / (2.0 * p[2] * p[2])).exp()
}

/// Decay times at the quantiles of an exponential with mean `tau`
fn decay_times(tau: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| -tau * (1.0 - (i as f64 + 0.5) / n as f64).ln())
        .collect()
}

#[test]
fn test_gaussian_peak_fit() {
    let x = Array1::linspace(-3.0, 3.0, 61);
    // small deterministic wiggle in place of noise
    let y = x.mapv(|x| gaussian(x, &[10.0, 0.5, 0.8]) + 0.05 * (13.0 * x).sin());
    let yerr = Array1::from_elem(x.len(), 0.1);
    let cost = LeastSquares::new(x, y, yerr, gaussian).unwrap();
    let ndata = cost.ndata();

    let mut m = Minuit::new(cost, &["amp", "mu", "sigma"], &[8.0, 0.0, 1.0]).unwrap();
    m.set_limits("sigma", 0.0, f64::INFINITY).unwrap();
    m.migrad(None, 2).unwrap();
    assert!(m.valid(), "{}", m);

    let values = m.values();
    assert_relative_eq!(values["amp"], 10.0, epsilon = 0.05);
    assert_relative_eq!(values["mu"], 0.5, epsilon = 0.01);
    assert_relative_eq!(values["sigma"], 0.8, epsilon = 0.01);

    let chi2_per_dof = m.fval().unwrap() / (ndata - 3) as f64;
    assert!(chi2_per_dof < 1.0, "chi2/ndof = {}", chi2_per_dof);

    // a near-linear parameter has a symmetric interval close to HESSE
    let sigma_mu = m.errors()["mu"];
    let errors = m.minos(&["mu"], 1.0).unwrap();
    assert!(errors[0].is_valid());
    assert_relative_eq!(errors[0].upper, sigma_mu, max_relative = 0.05);
    assert_relative_eq!(errors[0].lower, -sigma_mu, max_relative = 0.05);
    assert!(m.merror("mu").is_some());
}

#[test]
fn test_unbinned_lifetime_likelihood() {
    let times = decay_times(2.0, 200);
    let n = times.len() as f64;
    let mean = times.iter().sum::<f64>() / n;
    let nll = move |p: &[f64]| times.iter().map(|t| p[0].ln() + t / p[0]).sum::<f64>();

    let config = MinuitConfig::default().with_errordef(LIKELIHOOD);
    let mut m = Minuit::new(nll, &["tau"], &[1.0]).unwrap().with_config(config);
    m.set_limits("tau", 0.0, f64::INFINITY).unwrap();
    m.migrad(None, 1).unwrap();
    m.hesse(None).unwrap();
    assert!(m.valid());
    assert!(m.accurate());

    // the estimate is the sample mean with variance tau^2 / n
    let tau = m.values()["tau"];
    assert_relative_eq!(tau, mean, max_relative = 1e-4);
    assert_relative_eq!(m.errors()["tau"], tau / n.sqrt(), max_relative = 1e-2);

    // the likelihood rises more slowly towards long lifetimes
    let errors = m.minos(&[], 1.0).unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_valid());
    assert!(errors[0].upper > -errors[0].lower);
}

#[test]
fn test_minimize_agrees_with_front_end() {
    let times = decay_times(3.0, 100);
    let nll = move |p: &[f64]| times.iter().map(|t| p[0].ln() + t / p[0]).sum::<f64>();

    let options = MinimizeOptions::default().with_bounds(vec![(0.1, 100.0)]);
    let result = minimize(nll.clone(), &[1.0], &options).unwrap();
    assert!(result.success);
    assert!(result.nfev > 0);

    let mut m = Minuit::new(nll, &["tau"], &[1.0]).unwrap();
    m.set_limits("tau", 0.1, 100.0).unwrap();
    m.migrad(None, 1).unwrap();
    assert_relative_eq!(result.x[0], m.values()["tau"], max_relative = 1e-3);
    assert_eq!(result.nfev, m.nfcn());
}
