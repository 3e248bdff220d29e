//! # Estimation output
//!
//! An estimation call returns an [`EstimationOutput`]: the [`IterationSnapshot`] of the
//! iteration with the lowest RMS residual (not necessarily the last one), the RMS history,
//! and the optional per-iteration traces requested through
//! [`EstimationParams`](crate::estimation::estimation_input::EstimationParams).
//!
//! Covariance-derived quantities are computed on demand from the snapshot:
//!
//! | Method                             | Quantity                                       |
//! |------------------------------------|------------------------------------------------|
//! | [`EstimationOutput::unnormalized_covariance`] | `C[j, k] = C'[j, k] / (s_j · s_k)`  |
//! | [`EstimationOutput::formal_errors`]           | `σ_j = sqrt(C[j, j])`               |
//! | [`EstimationOutput::correlations`]            | `ρ[j, k] = C[j, k] / (σ_j · σ_k)`   |
//! | [`EstimationOutput::normalized_information_matrix`] | saved normalized partials     |
use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::{
    constants::{ObservationVector, ParameterVector, StateHistory},
    estimation::{convergence::TerminationReason, normalization::Normalization},
};

/// State of the estimation after one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSnapshot {
    /// Zero-based index of the iteration.
    pub iteration: usize,
    /// Estimate after applying the correction computed in this iteration.
    pub parameter_estimate: ParameterVector,
    pub residuals: ObservationVector,
    pub rms: f64,
    /// Normalized partials, kept when the information matrix is saved.
    pub normalized_partials: Option<DMatrix<f64>>,
    pub weights: ObservationVector,
    pub normalization: Normalization,
    /// `(Hᵗ W H + P')⁻¹` in normalized units.
    pub normalized_covariance: DMatrix<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimationOutput {
    pub best: IterationSnapshot,
    pub number_of_iterations: usize,
    pub rms_history: Vec<f64>,
    /// Residuals of every iteration, if saved.
    pub residual_history: Vec<ObservationVector>,
    /// Starting estimate followed by the estimate after every iteration, if saved.
    pub parameter_history: Vec<ParameterVector>,
    /// Per-arc state histories after every reset, if saved.
    pub state_history_per_iteration: Vec<Vec<StateHistory>>,
    pub dependent_variable_history_per_iteration: Vec<Vec<StateHistory>>,
    pub termination_reasons: Vec<TerminationReason>,
}

impl EstimationOutput {
    pub fn parameter_estimate(&self) -> &ParameterVector {
        &self.best.parameter_estimate
    }

    pub fn best_rms(&self) -> f64 {
        self.best.rms
    }

    pub fn best_iteration(&self) -> usize {
        self.best.iteration
    }

    pub fn residuals(&self) -> &ObservationVector {
        &self.best.residuals
    }

    pub fn normalized_covariance(&self) -> &DMatrix<f64> {
        &self.best.normalized_covariance
    }

    /// Covariance of the estimate in physical units.
    pub fn unnormalized_covariance(&self) -> DMatrix<f64> {
        self.best
            .normalization
            .denormalize_covariance(&self.best.normalized_covariance)
    }

    /// One-sigma formal errors of the estimate.
    pub fn formal_errors(&self) -> DVector<f64> {
        self.unnormalized_covariance().diagonal().map(f64::sqrt)
    }

    /// Correlation matrix of the estimate.
    pub fn correlations(&self) -> DMatrix<f64> {
        let covariance = self.unnormalized_covariance();
        let sigma = covariance.diagonal().map(f64::sqrt);
        DMatrix::from_fn(covariance.nrows(), covariance.ncols(), |j, k| {
            covariance[(j, k)] / (sigma[j] * sigma[k])
        })
    }

    pub fn normalized_information_matrix(&self) -> Option<&DMatrix<f64>> {
        self.best.normalized_partials.as_ref()
    }

    /// Partials of the best iteration in physical units.
    pub fn unnormalized_information_matrix(&self) -> Option<DMatrix<f64>> {
        self.best
            .normalized_partials
            .as_ref()
            .map(|h| self.best.normalization.denormalize_partials(h))
    }

    pub fn weights(&self) -> &ObservationVector {
        &self.best.weights
    }
}

impl fmt::Display for EstimationOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons = self
            .termination_reasons
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        if f.alternate() {
            writeln!(f, "Estimation result")?;
            writeln!(f, "-----------------")?;
            writeln!(f, "iterations      : {}", self.number_of_iterations)?;
            writeln!(f, "best iteration  : {}", self.best.iteration)?;
            writeln!(f, "best RMS        : {:.6e}", self.best.rms)?;
            writeln!(f, "observations    : {}", self.best.residuals.len())?;
            writeln!(f, "stopped because : {reasons}")?;
            writeln!(f, "RMS history     :")?;
            for (i, rms) in self.rms_history.iter().enumerate() {
                writeln!(f, "  [{i:>3}] {rms:.6e}")?;
            }
            writeln!(f, "parameters (estimate ± 1σ):")?;
            let sigma = self.formal_errors();
            for (j, x) in self.best.parameter_estimate.iter().enumerate() {
                writeln!(f, "  [{j:>3}] {x:>+.12e} ± {:.3e}", sigma[j])?;
            }
            Ok(())
        } else {
            write!(
                f,
                "EstimationOutput(iterations={}, best_iteration={}, best_rms={:.3e}, n_obs={}, n_params={}, stop=[{}])",
                self.number_of_iterations,
                self.best.iteration,
                self.best.rms,
                self.best.residuals.len(),
                self.best.parameter_estimate.len(),
                reasons
            )
        }
    }
}
