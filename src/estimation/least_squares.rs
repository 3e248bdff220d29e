//! # Weighted, regularized normal equations
//!
//! Given the normalized partials `H`, the residuals `r`, the diagonal `w` of the observation
//! weight matrix and the normalized inverse a-priori covariance `P'`, solve
//!
//! ```text
//! Δx' = (Hᵗ W H + P')⁻¹ Hᵗ W r
//! ```
//!
//! and return both the correction `Δx'` (normalized units) and the normalized covariance
//! `(Hᵗ W H + P')⁻¹`.
//!
//! The information matrix is factorized with a Cholesky decomposition. When it is not
//! numerically positive definite, an LU inversion is attempted instead. If neither yields a
//! finite covariance the system is reported as [`OdfitError::SingularNormalEquations`].
//!
//! A system without observations has no data term: the correction is zero and the
//! covariance is the pseudo-inverse of `P'`.
use nalgebra::{DMatrix, DVector};

use crate::{constants::ParameterVector, odfit_errors::OdfitError};

/// Correction and covariance in normalized parameter space.
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresSolution {
    pub correction: ParameterVector,
    pub covariance: DMatrix<f64>,
}

/// Solve the weighted, regularized normal equations.
///
/// Arguments
/// -----------------
/// * `partials`: normalized partials `H` (`n_obs × n_params`).
/// * `residuals`: residual vector `r` (`n_obs`).
/// * `weights`: diagonal of the weight matrix `W` (`n_obs`).
/// * `inverse_apriori_covariance`: normalized a-priori information `P'` (`n_params × n_params`).
///
/// Return
/// ----------
/// * The [`LeastSquaresSolution`], or [`OdfitError::SingularNormalEquations`].
///
/// See also
/// ------------
/// * [`normalize_partials`](crate::estimation::normalization::normalize_partials) – Produces `H` and the scales used for `P'`.
pub fn solve_normal_equations(
    partials: &DMatrix<f64>,
    residuals: &DVector<f64>,
    weights: &DVector<f64>,
    inverse_apriori_covariance: &DMatrix<f64>,
) -> Result<LeastSquaresSolution, OdfitError> {
    let n_params = partials.ncols();

    if partials.nrows() == 0 {
        let covariance = inverse_apriori_covariance
            .clone()
            .pseudo_inverse(f64::EPSILON)
            .map_err(|_| OdfitError::SingularNormalEquations)?;
        return Ok(LeastSquaresSolution {
            correction: DVector::zeros(n_params),
            covariance,
        });
    }

    let mut weighted = partials.clone();
    for (mut row, w) in weighted.row_iter_mut().zip(weights.iter()) {
        row *= *w;
    }

    let information = partials.tr_mul(&weighted) + inverse_apriori_covariance;
    let rhs = weighted.tr_mul(residuals);

    if let Some(cholesky) = information.clone().cholesky() {
        let solution = LeastSquaresSolution {
            correction: cholesky.solve(&rhs),
            covariance: cholesky.inverse(),
        };
        if is_finite(&solution) {
            return Ok(solution);
        }
    }

    let covariance = information
        .try_inverse()
        .ok_or(OdfitError::SingularNormalEquations)?;
    let solution = LeastSquaresSolution {
        correction: &covariance * rhs,
        covariance,
    };

    if is_finite(&solution) {
        Ok(solution)
    } else {
        Err(OdfitError::SingularNormalEquations)
    }
}

/// Only the factorization is checked: non-finite residuals yield a non-finite correction
/// that the estimation loop records as a failed iteration.
fn is_finite(solution: &LeastSquaresSolution) -> bool {
    solution.covariance.iter().all(|x| x.is_finite())
}

/// Root mean square of the entries of `v` (zero for an empty vector).
pub fn rms(v: &DVector<f64>) -> f64 {
    if v.is_empty() {
        0.0
    } else {
        (v.norm_squared() / v.len() as f64).sqrt()
    }
}
