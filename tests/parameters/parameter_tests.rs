//! Integration tests for the Parameter struct
//!
//! These tests verify that the Parameter struct behaves correctly in various scenarios.

use minuit_rs::parameters::{Bounds, BoundsTransform, Parameter};
use std::f64::{INFINITY, NEG_INFINITY};

#[test]
fn test_parameter_lifecycle() {
    let mut param = Parameter::new("amplitude", 10.0);

    assert_eq!(param.name(), "amplitude");
    assert_eq!(param.value(), 10.0);
    assert!(!param.is_fixed());
    assert!(!param.has_limits());
    assert_eq!(param.min(), NEG_INFINITY);
    assert_eq!(param.max(), INFINITY);
    assert!(param.error() > 0.0);

    param.set_value(15.0).unwrap();
    assert_eq!(param.value(), 15.0);
    assert_eq!(param.init_value(), 10.0);

    param.reset();
    assert_eq!(param.value(), 10.0);

    param.set_bounds(0.0, 20.0).unwrap();
    assert!(param.has_limits());
    assert_eq!(param.min(), 0.0);
    assert_eq!(param.max(), 20.0);

    // Values outside the bounds are rejected
    assert!(param.set_value(-5.0).is_err());
    assert!(param.set_value(25.0).is_err());
    assert!(param.set_value(5.0).is_ok());
    assert!(param.set_value(f64::NAN).is_err());

    param.set_fixed(true);
    assert!(param.is_fixed());
    param.set_fixed(false);
    assert!(!param.is_fixed());

    // Steps must be positive
    assert!(param.set_error(0.0).is_err());
    param.set_error(0.5).unwrap();
    assert_eq!(param.error(), 0.5);

    param.clear_bounds();
    assert!(!param.has_limits());
}

#[test]
fn test_parameter_with_bounds() {
    let param = Parameter::with_bounds("amplitude", 10.0, 0.0, 20.0).unwrap();
    assert_eq!(param.min(), 0.0);
    assert_eq!(param.max(), 20.0);

    assert!(Parameter::with_bounds("amplitude", 10.0, 20.0, 0.0).is_err());

    // Value outside bounds is clamped to bounds
    let param = Parameter::with_bounds("amplitude", 30.0, 0.0, 20.0).unwrap();
    assert_eq!(param.value(), 20.0);

    let param = Parameter::with_bounds("amplitude", -10.0, 0.0, 20.0).unwrap();
    assert_eq!(param.value(), 0.0);
}

#[test]
fn test_parameter_with_step() {
    let param = Parameter::with_step("offset", 1.0, 0.25).unwrap();
    assert_eq!(param.error(), 0.25);
    assert!(Parameter::with_step("offset", 1.0, -1.0).is_err());
}

#[test]
fn test_parameter_bounds_transform() {
    // Unbounded parameters map to themselves
    let param = Parameter::new("amplitude", 10.0);
    assert_eq!(param.to_internal().unwrap(), 10.0);
    assert_eq!(param.from_internal(15.0), 15.0);

    for (min, max) in [(5.0, INFINITY), (NEG_INFINITY, 15.0), (0.0, 20.0)] {
        let mut param = Parameter::new("amplitude", 10.0);
        param.set_bounds(min, max).unwrap();

        let internal = param.to_internal().unwrap();
        assert_ne!(internal, 10.0);
        let external = param.from_internal(internal);
        assert!((external - 10.0).abs() < 1e-10);
    }

    let transform = BoundsTransform::new(Bounds::new(0.0, 20.0).unwrap());
    for &value in &[0.0, 1.0, 5.0, 10.0, 15.0, 19.0, 20.0] {
        let internal = transform.to_internal(value).unwrap();
        let external = transform.to_external(internal);
        assert!((external - value).abs() < 1e-10);
    }

    // Any internal value lands inside the bounds
    for &internal in &[-1e3, -7.0, -1.0, 0.0, 2.5, 40.0, 1e6] {
        let external = transform.to_external(internal);
        assert!((0.0..=20.0).contains(&external));
    }
}
