//! Matrix conversion utilities between ndarray and nalgebra.
//!
//! The public API and the minimizer state use ndarray; factorizations and
//! eigen decompositions are done with nalgebra.

use nalgebra::DMatrix;
use ndarray::Array2;

/// Convert an ndarray Array2 to a nalgebra DMatrix.
///
/// # Arguments
///
/// * `arr` - The ndarray Array2 to convert
///
/// # Returns
///
/// * A nalgebra DMatrix with the same data
pub fn ndarray_to_nalgebra(arr: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert a nalgebra DMatrix to an ndarray Array2.
pub fn nalgebra_to_ndarray(mat: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}
