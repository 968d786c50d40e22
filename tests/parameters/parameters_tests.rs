//! Integration tests for the Parameters collection
//!
//! These tests verify that the Parameters collection behaves correctly in various scenarios.

use minuit_rs::parameters::{Parameter, Parameters};

#[test]
fn test_parameters_basic_operations() {
    let mut params = Parameters::new();
    assert_eq!(params.len(), 0);
    assert!(params.is_empty());

    params.add(Parameter::new("amplitude", 10.0)).unwrap();
    assert_eq!(params.len(), 1);
    assert!(params.contains("amplitude"));

    params.add_param("center", 5.0).unwrap();
    params.add_param_with_bounds("sigma", 2.0, 0.1, 10.0).unwrap();
    assert_eq!(params.len(), 3);

    // Names must be unique
    assert!(params.add_param("center", 1.0).is_err());

    assert_eq!(params.get("amplitude").unwrap().value(), 10.0);
    assert!(params.get("nonexistent").is_none());
    assert!(params.require("nonexistent").is_err());

    params.get_mut("center").unwrap().set_value(7.5).unwrap();
    assert_eq!(params.get("center").unwrap().value(), 7.5);

    // Declaration order is kept
    assert_eq!(params.names(), vec!["amplitude", "center", "sigma"]);
    assert_eq!(params.index_of("sigma"), Some(2));
    assert_eq!(params.external_values(), vec![10.0, 7.5, 2.0]);

    let values = params.values();
    assert_eq!(values.len(), 3);
    assert_eq!(values["center"], 7.5);
    assert_eq!(values[0], 10.0);
}

#[test]
fn test_parameters_free_and_fixed() {
    let mut params = Parameters::from_names(&["amplitude", "center", "sigma"], &[10.0, 5.0, 2.0])
        .unwrap();
    assert_eq!(params.n_free(), 3);
    assert_eq!(params.fixed().len(), 0);

    params.fix("center").unwrap();
    assert_eq!(params.n_free(), 2);
    assert_eq!(params.free_indices(), vec![0, 2]);
    assert_eq!(params.free_names(), vec!["amplitude", "sigma"]);
    assert_eq!(params.fixed()[0].name(), "center");

    // Fixed parameters are held at their value in the external vector
    let external = params.external_from_internal(&[11.0, 3.0]).unwrap();
    assert_eq!(external, vec![11.0, 5.0, 3.0]);

    params.release("center").unwrap();
    assert_eq!(params.n_free(), 3);
    assert!(params.fix("unknown").is_err());
}

#[test]
fn test_parameters_reset() {
    let mut params = Parameters::new();
    params.add_param("amplitude", 10.0).unwrap();
    params.add_param("center", 5.0).unwrap();

    params.set_values(&[15.0, 7.5]).unwrap();
    assert_eq!(params.get("amplitude").unwrap().value(), 15.0);

    params.reset();
    assert_eq!(params.get("amplitude").unwrap().value(), 10.0);
    assert_eq!(params.get("center").unwrap().value(), 5.0);

    assert!(params.set_values(&[1.0]).is_err());
}

#[test]
fn test_parameters_bounds_handling() {
    let mut params = Parameters::new();
    params.add_param_with_bounds("amplitude", 10.0, 0.0, 20.0).unwrap();
    params.add_param_with_bounds("center", 5.0, 0.0, 10.0).unwrap();

    let internal = params.internal_values().unwrap();
    assert_eq!(internal.len(), 2);

    // Round-trip preserves values
    params.update_from_internal(&internal.to_vec()).unwrap();
    assert!((params.get("amplitude").unwrap().value() - 10.0).abs() < 1e-10);
    assert!((params.get("center").unwrap().value() - 5.0).abs() < 1e-10);

    // Every internal point maps inside the bounds
    for &x in &[-10.0, -1.0, 0.0, 1.0, 10.0] {
        params.update_from_internal(&[x, x]).unwrap();
        let amplitude = params.get("amplitude").unwrap().value();
        let center = params.get("center").unwrap().value();
        assert!((0.0..=20.0).contains(&amplitude));
        assert!((0.0..=10.0).contains(&center));
    }

    // Derivative of the transform vanishes on the bound
    let at_bound = params.get("center").unwrap().bounds_transform().to_internal(10.0).unwrap();
    let dext = params.dext_dint(&[0.0, at_bound]);
    assert!(dext[1].abs() < 1e-8);
    assert!(params.at_limit(&[0.0, at_bound])[1]);
}

#[test]
fn test_parameters_json_round_trip() {
    let mut params = Parameters::new();
    params.add_param_with_step("offset", 1.0, 0.2).unwrap();
    params.add_param_with_bounds("decay", 0.5, 0.0, f64::INFINITY).unwrap();
    params.fix("offset").unwrap();

    let loaded = Parameters::from_json(&params.to_json().unwrap()).unwrap();
    assert_eq!(loaded.names(), params.names());
    assert!(loaded.get("offset").unwrap().is_fixed());
    assert_eq!(loaded.get("offset").unwrap().error(), 0.2);
    assert_eq!(loaded.get("decay").unwrap().max(), f64::INFINITY);
    assert_eq!(loaded.get("decay").unwrap().min(), 0.0);
}
