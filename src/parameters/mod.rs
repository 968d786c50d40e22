//! # Parameter System
//!
//! Named, ordered parameters with step sizes, bounds and a fixed flag, and the
//! mapping between the external values the objective sees and the internal,
//! unbounded coordinates the minimizer works in.
//!
//! ## Core Components
//!
//! - [`Parameter`]: a single parameter with value, step size, bounds and fixed flag
//! - [`Parameters`]: the ordered collection, and the internal/external mapping
//! - [`Bounds`] and [`BoundsTransform`]: bounds and their MINUIT transform
//! - [`NamedValues`]: ordered name -> value view used for values and errors
//!
//! ## Example Usage
//!
//! ```rust
//! use minuit_rs::parameters::Parameters;
//!
//! let mut params = Parameters::new();
//! params.add_param("offset", 1.0).unwrap();
//! params.add_param_with_bounds("amplitude", 3.0, 0.0, 10.0).unwrap();
//! params.add_param_with_bounds("decay", 0.5, 0.0, f64::INFINITY).unwrap();
//!
//! // Fixed parameters are not varied by the minimizer
//! params.fix("offset").unwrap();
//!
//! // Internal coordinates of the free parameters only
//! let internal = params.internal_values().unwrap();
//! assert_eq!(internal.len(), 2);
//! ```

pub mod bounds;
pub mod parameter;
pub mod parameters;


pub use bounds::{Bounds, BoundsError, BoundsTransform};
pub use parameter::{Parameter, ParameterError};
pub use parameters::{NamedValues, Parameters, SerializationError};
