//! # Covariance Matrix Calculations
//!
//! This module holds the covariance matrix of a fit in external coordinates,
//! its conversion from the internal inverse Hessian, correlation matrices and
//! the repair of matrices that are not positive definite.

use nalgebra::SymmetricEigen;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::parameters::Parameters;
use crate::utils::finite_difference::MachinePrecision;
use crate::utils::matrix_convert::ndarray_to_nalgebra;

/// Covariance matrix over all parameters in declaration order.
///
/// Rows and columns of fixed parameters are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Covariance {
    names: Vec<String>,
    matrix: Array2<f64>,
}

impl Covariance {
    /// External covariance from the internal one: `C_ext = J C_int J`,
    /// with `J = diag(dext/dint)` at the internal point `x`.
    pub fn from_internal(params: &Parameters, x: &[f64], internal: &Array2<f64>) -> Self {
        let free = params.free_indices();
        let jacobian = params.dext_dint(x);
        let n = params.len();
        let mut matrix = Array2::zeros((n, n));

        for (a, &i) in free.iter().enumerate() {
            for (b, &j) in free.iter().enumerate() {
                matrix[[i, j]] = jacobian[a] * internal[[a, b]] * jacobian[b];
            }
        }

        Self {
            names: params.names(),
            matrix,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Covariance between two named parameters
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.matrix[[i, j]])
    }

    /// Correlation matrix of this covariance
    pub fn correlation(&self) -> Array2<f64> {
        calculate_correlation(&self.matrix)
    }
}

impl fmt::Display for Covariance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.names.iter().map(|n| n.len()).max().unwrap_or(0).max(10);
        write!(f, "{:width$}", "", width = width)?;
        for name in &self.names {
            write!(f, " {:>12}", name)?;
        }
        writeln!(f)?;
        for (i, name) in self.names.iter().enumerate() {
            write!(f, "{:width$}", name, width = width)?;
            for j in 0..self.names.len() {
                write!(f, " {:>12.4e}", self.matrix[[i, j]])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Calculate correlation matrix from covariance matrix.
///
/// The correlation matrix is calculated as:
///   correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])
///
/// Rows of parameters without variance (fixed parameters) are zero.
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    let mut correl = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..n {
            let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
            if covar[[i, i]] > 0.0 && covar[[j, j]] > 0.0 && denom > 0.0 {
                correl[[i, j]] = if i == j { 1.0 } else { covar[[i, j]] / denom };
            }
        }
    }

    correl
}

/// Force a symmetric matrix to be positive definite.
///
/// Non-positive diagonal elements are lifted first. If the matrix scaled to
/// unit diagonal still has an eigenvalue below `epspdf * max|eigenvalue|`,
/// the diagonal is inflated until the smallest eigenvalue is about
/// `0.001 * max|eigenvalue|`. Returns the matrix and whether it changed.
pub fn make_pos_def(matrix: &Array2<f64>) -> (Array2<f64>, bool) {
    let n = matrix.nrows();
    if n == 0 {
        return (matrix.clone(), false);
    }

    let epspdf = 1e-6_f64.max(MachinePrecision::default().eps2);
    let mut result = matrix.clone();
    let mut changed = false;

    let dgmin = matrix.diag().iter().copied().fold(f64::INFINITY, f64::min);
    if dgmin <= 0.0 {
        let dg = 0.5 + epspdf - dgmin;
        for i in 0..n {
            result[[i, i]] += dg;
        }
        changed = true;
    }

    let scale: Vec<f64> = (0..n).map(|i| 1.0 / result[[i, i]].sqrt()).collect();
    let scaled = Array2::from_shape_fn((n, n), |(i, j)| result[[i, j]] * scale[i] * scale[j]);
    let eigen = SymmetricEigen::new(ndarray_to_nalgebra(&scaled));
    let pmin = eigen.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    let pmax = eigen
        .eigenvalues
        .iter()
        .fold(1.0_f64, |acc, v| acc.max(v.abs()));

    if pmin > epspdf * pmax {
        return (result, changed);
    }

    let padd = 0.001 * pmax - pmin;
    log::debug!("forcing positive definite matrix, adding {:.3e} to the scaled diagonal", padd);
    for i in 0..n {
        result[[i, i]] *= 1.0 + padd;
    }

    (result, true)
}
