//! # Estimation input
//!
//! Everything an estimation call consumes besides the convergence checker:
//!
//! * the measured [`ObservationSet`] and its [`WeightSet`],
//! * optional a-priori information ([`AprioriInfo`]),
//! * the run flags ([`EstimationParams`]).
//!
//! [`EstimationParams`] follows the usual configuration pattern of the crate: sensible
//! [`Default`] values, a fluent builder, `serde` support and a compact / pretty
//! (`{:#}`) [`Display`](std::fmt::Display).
//!
//! ## Example
//!
//! ```rust
//! use odfit::estimation::estimation_input::{AprioriInfo, EstimationInput, EstimationParams};
//! use odfit::observations::observable_map::ObservationSet;
//! use nalgebra::{DMatrix, DVector};
//!
//! let params = EstimationParams::builder()
//!     .reintegrate_on_first_iteration(false)
//!     .print_progress(false)
//!     .build();
//!
//! let input = EstimationInput::new(ObservationSet::new())
//!     .with_apriori(AprioriInfo::new(
//!         DMatrix::identity(2, 2) * 1e-4,
//!         DVector::zeros(2),
//!     ))
//!     .with_params(params);
//!
//! assert!(input.validate(2).is_ok());
//! assert!(input.validate(3).is_err());
//! ```
use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{
    constants::ParameterVector,
    observations::observable_map::{ObservationSet, WeightSet},
    odfit_errors::OdfitError,
};

/// A-priori knowledge of the parameters.
///
/// Both members are optional; a missing inverse covariance is a zero matrix and a missing
/// deviation is a zero vector, with the size of the estimated parameter vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AprioriInfo {
    inverse_covariance: Option<DMatrix<f64>>,
    initial_deviation: Option<ParameterVector>,
}

impl AprioriInfo {
    pub fn new(inverse_covariance: DMatrix<f64>, initial_deviation: ParameterVector) -> Self {
        AprioriInfo {
            inverse_covariance: Some(inverse_covariance),
            initial_deviation: Some(initial_deviation),
        }
    }

    /// No a-priori information.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_inverse_covariance(mut self, inverse_covariance: DMatrix<f64>) -> Self {
        self.inverse_covariance = Some(inverse_covariance);
        self
    }

    pub fn with_initial_deviation(mut self, initial_deviation: ParameterVector) -> Self {
        self.initial_deviation = Some(initial_deviation);
        self
    }

    /// Inverse a-priori covariance for `n` parameters.
    pub fn inverse_covariance(&self, n: usize) -> DMatrix<f64> {
        self.inverse_covariance
            .clone()
            .unwrap_or_else(|| DMatrix::zeros(n, n))
    }

    /// Deviation added to the current estimate before the first iteration.
    pub fn initial_deviation(&self, n: usize) -> ParameterVector {
        self.initial_deviation
            .clone()
            .unwrap_or_else(|| DVector::zeros(n))
    }

    /// Check the dimensions against the number of estimated parameters.
    pub fn validate(&self, n: usize) -> Result<(), OdfitError> {
        if let Some(p) = &self.inverse_covariance {
            if p.shape() != (n, n) {
                return Err(OdfitError::AprioriDimensionMismatch {
                    what: "inverse covariance",
                    expected: format!("{n}x{n}"),
                    found: format!("{}x{}", p.nrows(), p.ncols()),
                });
            }
        }
        if let Some(dx) = &self.initial_deviation {
            if dx.len() != n {
                return Err(OdfitError::AprioriDimensionMismatch {
                    what: "parameter deviation",
                    expected: n.to_string(),
                    found: dx.len().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Run flags of an estimation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationParams {
    /// Reset and reintegrate the dynamics before the first iteration too.
    pub reintegrate_on_first_iteration: bool,
    /// Reintegrate the variational equations at every reset.
    pub reintegrate_variational_equations: bool,
    /// Keep the state and dependent-variable histories of every iteration.
    pub save_state_history_per_iteration: bool,
    /// Keep the residual vector and parameter estimate of every iteration.
    pub save_residuals_and_parameters_per_iteration: bool,
    /// Keep the normalized partials of the best iteration.
    pub save_information_matrix: bool,
    /// Report progress through the `log` facade.
    pub print_progress: bool,
}

impl Default for EstimationParams {
    fn default() -> Self {
        EstimationParams {
            reintegrate_on_first_iteration: true,
            reintegrate_variational_equations: true,
            save_state_history_per_iteration: false,
            save_residuals_and_parameters_per_iteration: true,
            save_information_matrix: true,
            print_progress: true,
        }
    }
}

impl EstimationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> EstimationParamsBuilder {
        EstimationParamsBuilder::new()
    }
}

impl fmt::Display for EstimationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 52;
            writeln!(f, "Estimation Parameters")?;
            writeln!(f, "---------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            line!(
                "reintegrate_on_first_iteration              = {}",
                self.reintegrate_on_first_iteration,
                "Reset dynamics before iteration 0"
            )?;
            line!(
                "reintegrate_variational_equations           = {}",
                self.reintegrate_variational_equations,
                "Recompute STM/sensitivity at each reset"
            )?;
            line!(
                "save_state_history_per_iteration            = {}",
                self.save_state_history_per_iteration,
                "Keep propagated histories"
            )?;
            line!(
                "save_residuals_and_parameters_per_iteration = {}",
                self.save_residuals_and_parameters_per_iteration,
                "Keep residual/parameter traces"
            )?;
            line!(
                "save_information_matrix                     = {}",
                self.save_information_matrix,
                "Keep best normalized partials"
            )?;
            line!(
                "print_progress                              = {}",
                self.print_progress,
                "Log each iteration"
            )?;
            Ok(())
        } else {
            write!(
                f,
                "EstimationParams(reintegrate_first={}, reintegrate_variational={}, save_states={}, save_traces={}, save_information={}, print={})",
                self.reintegrate_on_first_iteration,
                self.reintegrate_variational_equations,
                self.save_state_history_per_iteration,
                self.save_residuals_and_parameters_per_iteration,
                self.save_information_matrix,
                self.print_progress,
            )
        }
    }
}

/// Builder for [`EstimationParams`].
#[derive(Debug, Clone, Default)]
pub struct EstimationParamsBuilder {
    params: EstimationParams,
}

impl EstimationParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reintegrate_on_first_iteration(mut self, v: bool) -> Self {
        self.params.reintegrate_on_first_iteration = v;
        self
    }
    pub fn reintegrate_variational_equations(mut self, v: bool) -> Self {
        self.params.reintegrate_variational_equations = v;
        self
    }
    pub fn save_state_history_per_iteration(mut self, v: bool) -> Self {
        self.params.save_state_history_per_iteration = v;
        self
    }
    pub fn save_residuals_and_parameters_per_iteration(mut self, v: bool) -> Self {
        self.params.save_residuals_and_parameters_per_iteration = v;
        self
    }
    pub fn save_information_matrix(mut self, v: bool) -> Self {
        self.params.save_information_matrix = v;
        self
    }
    pub fn print_progress(mut self, v: bool) -> Self {
        self.params.print_progress = v;
        self
    }

    pub fn build(self) -> EstimationParams {
        self.params
    }
}

/// Observations, weights, a-priori information and run flags of one estimation call.
#[derive(Debug, Clone)]
pub struct EstimationInput {
    pub observations: ObservationSet,
    pub weights: WeightSet,
    pub apriori: AprioriInfo,
    pub params: EstimationParams,
}

impl EstimationInput {
    /// Input with unit weights, no a-priori information and default flags.
    pub fn new(observations: ObservationSet) -> Self {
        let weights = WeightSet::constant(&observations, 1.0);
        EstimationInput {
            observations,
            weights,
            apriori: AprioriInfo::none(),
            params: EstimationParams::default(),
        }
    }

    pub fn with_weights(mut self, weights: WeightSet) -> Self {
        self.weights = weights;
        self
    }

    /// Replace the weights by the same `weight` for every observation.
    pub fn with_constant_weight(mut self, weight: f64) -> Self {
        self.weights = WeightSet::constant(&self.observations, weight);
        self
    }

    pub fn with_apriori(mut self, apriori: AprioriInfo) -> Self {
        self.apriori = apriori;
        self
    }

    pub fn with_params(mut self, params: EstimationParams) -> Self {
        self.params = params;
        self
    }

    /// Check the a-priori dimensions against `parameter_size`.
    pub fn validate(&self, parameter_size: usize) -> Result<(), OdfitError> {
        self.apriori.validate(parameter_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_defaults() {
        let p = EstimationParams::default();
        assert!(p.reintegrate_on_first_iteration);
        assert!(p.reintegrate_variational_equations);
        assert!(!p.save_state_history_per_iteration);
        assert!(p.save_residuals_and_parameters_per_iteration);
        assert!(p.save_information_matrix);
        assert!(p.print_progress);
        assert_eq!(EstimationParams::builder().build(), p);
    }

    #[test]
    fn test_params_builder_and_display() {
        let p = EstimationParams::builder()
            .save_state_history_per_iteration(true)
            .print_progress(false)
            .build();
        assert!(p.save_state_history_per_iteration);
        assert!(!p.print_progress);
        assert!(p.to_string().contains("save_states=true"));

        let pretty = format!("{p:#}");
        assert!(pretty.starts_with("Estimation Parameters"));
        assert_eq!(pretty.lines().count(), 8);
    }

    #[test]
    fn test_apriori_defaults_are_zero() {
        let a = AprioriInfo::none();
        assert_eq!(a.inverse_covariance(3), DMatrix::zeros(3, 3));
        assert_eq!(a.initial_deviation(3), DVector::zeros(3));
        assert!(a.validate(7).is_ok());
    }

    #[test]
    fn test_apriori_dimension_checks() {
        let a = AprioriInfo::none().with_inverse_covariance(DMatrix::identity(2, 3));
        assert_eq!(
            a.validate(2),
            Err(OdfitError::AprioriDimensionMismatch {
                what: "inverse covariance",
                expected: "2x2".into(),
                found: "2x3".into(),
            })
        );

        let a = AprioriInfo::none().with_initial_deviation(DVector::zeros(4));
        assert!(matches!(
            a.validate(2),
            Err(OdfitError::AprioriDimensionMismatch {
                what: "parameter deviation",
                ..
            })
        ));
    }
}
