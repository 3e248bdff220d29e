//! # Column normalization of the partials matrix
//!
//! Estimated parameters routinely differ by many orders of magnitude (positions in meters,
//! velocities in m/s, gravitational parameters, clock biases…). Each column of the partials
//! matrix is therefore divided by a scale before the normal equations are formed:
//!
//! * `m = min(column)`, `M = max(column)`,
//! * `scale = m` if `|m| > M`, else `scale = M`.
//!
//! After division, the entry of largest magnitude of every column is exactly `±1`, and
//! the scale has the sign that makes it `+1`.
//!
//! The same scales are applied to the a-priori information, and removed from the solved
//! correction and covariance:
//!
//! * `P'[j, k] = P[j, k] / (s_j · s_k)`,
//! * `Δx = Δx' ./ s`,
//! * `C[j, k] = C'[j, k] / (s_j · s_k)`.
//!
//! A column that is identically zero has no valid scale and is reported as
//! [`OdfitError::ZeroNormalizationColumn`]. A system without rows uses unit scales.
use nalgebra::{DMatrix, DVector};

use crate::{constants::ParameterVector, odfit_errors::OdfitError};

/// Per-parameter scales of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    scales: DVector<f64>,
}

impl Normalization {
    /// Unit scales for `n` parameters.
    pub fn identity(n: usize) -> Self {
        Normalization {
            scales: DVector::from_element(n, 1.0),
        }
    }

    pub fn scales(&self) -> &DVector<f64> {
        &self.scales
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    /// `P'[j, k] = P[j, k] / (s_j · s_k)`.
    pub fn normalize_inverse_covariance(&self, inverse_covariance: &DMatrix<f64>) -> DMatrix<f64> {
        self.scale_symmetric(inverse_covariance)
    }

    /// Correction in physical units from the correction in normalized units.
    pub fn denormalize_correction(&self, correction: &ParameterVector) -> ParameterVector {
        correction.component_div(&self.scales)
    }

    /// Covariance in physical units from the normalized covariance.
    pub fn denormalize_covariance(&self, covariance: &DMatrix<f64>) -> DMatrix<f64> {
        self.scale_symmetric(covariance)
    }

    /// Undo [`normalize_partials`] on a copy of `normalized`.
    pub fn denormalize_partials(&self, normalized: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = normalized.clone();
        for (mut column, s) in out.column_iter_mut().zip(self.scales.iter()) {
            column *= *s;
        }
        out
    }

    fn scale_symmetric(&self, m: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(m.nrows(), m.ncols(), |j, k| {
            m[(j, k)] / (self.scales[j] * self.scales[k])
        })
    }
}

/// Normalize every column of `partials` in place.
///
/// Arguments
/// -----------------
/// * `partials`: the `n_obs × n_params` partials matrix, overwritten with its normalized form.
///
/// Return
/// ----------
/// * The scales (length `n_params`), or:
///   * [`OdfitError::NonFiniteNormalization`] if a column holds NaN or infinite values,
///   * [`OdfitError::ZeroNormalizationColumn`] if a column is identically zero.
pub fn normalize_partials(partials: &mut DMatrix<f64>) -> Result<Normalization, OdfitError> {
    if partials.nrows() == 0 {
        return Ok(Normalization::identity(partials.ncols()));
    }

    let mut scales = DVector::zeros(partials.ncols());

    for (column_index, mut column) in partials.column_iter_mut().enumerate() {
        if column.iter().any(|x| !x.is_finite()) {
            return Err(OdfitError::NonFiniteNormalization {
                column: column_index,
            });
        }

        let min = column.min();
        let max = column.max();
        let scale = if min.abs() > max { min } else { max };

        if scale == 0.0 {
            return Err(OdfitError::ZeroNormalizationColumn {
                column: column_index,
            });
        }

        column /= scale;
        scales[column_index] = scale;
    }

    Ok(Normalization { scales })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            4,
            3,
            &[
                1.0e6, -3.0, 0.25, //
                2.0e6, -7.5, 0.5, //
                -4.0e6, 1.0, 0.125, //
                3.0e6, 2.0, -0.5,
            ],
        )
    }

    #[test]
    fn test_columns_have_unit_max_abs() {
        let mut h = sample();
        let normalization = normalize_partials(&mut h).unwrap();

        for column in h.column_iter() {
            assert_eq!(column.amax(), 1.0);
        }
        assert_eq!(normalization.scales().as_slice(), &[-4.0e6, -7.5, 0.5]);
    }

    #[test]
    fn test_round_trip() {
        let original = sample();
        let mut h = original.clone();
        let normalization = normalize_partials(&mut h).unwrap();

        let restored = normalization.denormalize_partials(&h);
        assert_relative_eq!(restored, original, max_relative = 1e-12);
    }

    #[test]
    fn test_zero_column_is_detected() {
        let mut h = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 2.0, 0.0]);
        assert_eq!(
            normalize_partials(&mut h),
            Err(OdfitError::ZeroNormalizationColumn { column: 1 })
        );

        let mut h = DMatrix::from_row_slice(2, 1, &[1.0, f64::NAN]);
        assert_eq!(
            normalize_partials(&mut h),
            Err(OdfitError::NonFiniteNormalization { column: 0 })
        );
    }

    #[test]
    fn test_empty_system_uses_unit_scales() {
        let mut h = DMatrix::zeros(0, 3);
        let normalization = normalize_partials(&mut h).unwrap();
        assert_eq!(normalization, Normalization::identity(3));
    }

    #[test]
    fn test_inverse_covariance_and_correction_scaling() {
        let normalization = Normalization {
            scales: DVector::from_vec(vec![2.0, -4.0]),
        };

        let p = DMatrix::from_row_slice(2, 2, &[8.0, 4.0, 4.0, 32.0]);
        let p_norm = normalization.normalize_inverse_covariance(&p);
        assert_relative_eq!(
            p_norm,
            DMatrix::from_row_slice(2, 2, &[2.0, -0.5, -0.5, 2.0])
        );

        let dx = normalization.denormalize_correction(&DVector::from_vec(vec![1.0, 1.0]));
        assert_relative_eq!(dx, DVector::from_vec(vec![0.5, -0.25]));
    }
}
