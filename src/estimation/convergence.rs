//! # Convergence checker
//!
//! Termination policy of the estimation loop. The checker holds configuration only and is a
//! pure function of the number of completed iterations and of the RMS-residual history.
//!
//! The loop stops when **any** of the following holds:
//!
//! 1. the iteration count reached `max_iterations`,
//! 2. the latest RMS residual is below `min_residual`,
//! 3. the history shows no improvement, as decided by the [`StallCriterion`],
//! 4. the last two RMS residuals differ by less than `min_residual_change`.
//!
//! The checker never reports convergence before at least one iteration has completed.
//!
//! ## Stall criteria
//!
//! * [`StallCriterion::HistoryArgmaxOffset`] (default) evaluates
//!   `argmax(history) − len(history) < window` in unsigned, wrapping arithmetic. The index of
//!   any entry is smaller than the length, so the difference wraps to a value close to
//!   `u64::MAX` and the condition never holds: the default checker stops on the iteration
//!   limit or on the residual thresholds only.
//! * [`StallCriterion::IterationsSinceBest`] stops once `window` iterations have passed since
//!   the lowest RMS residual, i.e. `len(history) − 1 − argmin(history) ≥ window`.
//!
//! ## Example
//!
//! ```rust
//! use odfit::estimation::convergence::{ConvergenceChecker, StallCriterion, TerminationReason};
//!
//! let checker = ConvergenceChecker::builder()
//!     .max_iterations(10)
//!     .min_residual(1e-6)
//!     .stall_criterion(StallCriterion::IterationsSinceBest)
//!     .build()
//!     .unwrap();
//!
//! assert!(!checker.is_estimation_converged(1, &[1e-3]));
//! assert_eq!(
//!     checker.termination_reasons(2, &[1e-3, 1e-7]),
//!     vec![TerminationReason::ResidualBelowMinimum]
//! );
//! ```
use std::{
    cmp::Ordering::{Equal, Greater},
    fmt,
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_RESIDUAL, DEFAULT_MIN_RESIDUAL_CHANGE,
        DEFAULT_NO_IMPROVEMENT_WINDOW,
    },
    odfit_errors::OdfitError,
};

/// Rule used to decide that the residual history stopped improving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StallCriterion {
    /// `argmax(history) − len(history) < window`, unsigned and wrapping.
    #[default]
    HistoryArgmaxOffset,
    /// `len(history) − 1 − argmin(history) ≥ window`.
    IterationsSinceBest,
}

/// Why the estimation loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    MaximumIterations,
    ResidualBelowMinimum,
    NoImprovement,
    ResidualChangeBelowMinimum,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            TerminationReason::MaximumIterations => "maximum number of iterations reached",
            TerminationReason::ResidualBelowMinimum => "RMS residual below minimum",
            TerminationReason::NoImprovement => "too many iterations without improvement",
            TerminationReason::ResidualChangeBelowMinimum => {
                "RMS residual change below minimum"
            }
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceChecker {
    pub max_iterations: usize,
    pub min_residual_change: f64,
    pub min_residual: f64,
    pub no_improvement_window: usize,
    #[serde(default)]
    pub stall_criterion: StallCriterion,
}

impl Default for ConvergenceChecker {
    fn default() -> Self {
        ConvergenceChecker {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            min_residual_change: DEFAULT_MIN_RESIDUAL_CHANGE,
            min_residual: DEFAULT_MIN_RESIDUAL,
            no_improvement_window: DEFAULT_NO_IMPROVEMENT_WINDOW,
            stall_criterion: StallCriterion::default(),
        }
    }
}

impl ConvergenceChecker {
    /// Checker with explicit limits and the default stall criterion.
    pub fn new(
        max_iterations: usize,
        min_residual_change: f64,
        min_residual: f64,
        no_improvement_window: usize,
    ) -> Result<Self, OdfitError> {
        Self::builder()
            .max_iterations(max_iterations)
            .min_residual_change(min_residual_change)
            .min_residual(min_residual)
            .no_improvement_window(no_improvement_window)
            .build()
    }

    pub fn builder() -> ConvergenceCheckerBuilder {
        ConvergenceCheckerBuilder::new()
    }

    /// Every termination condition met after `iteration_count` completed iterations.
    ///
    /// Arguments
    /// -----------------
    /// * `iteration_count`: number of completed iterations.
    /// * `rms_history`: RMS residual of each completed iteration, oldest first.
    ///
    /// Return
    /// ----------
    /// * The reasons to stop, in the order of the list above. Empty if the loop must go on,
    ///   and always empty when `iteration_count == 0`.
    pub fn termination_reasons(
        &self,
        iteration_count: usize,
        rms_history: &[f64],
    ) -> Vec<TerminationReason> {
        let mut reasons = Vec::new();
        if iteration_count == 0 {
            return reasons;
        }

        if iteration_count >= self.max_iterations {
            reasons.push(TerminationReason::MaximumIterations);
        }

        let Some(&latest) = rms_history.last() else {
            return reasons;
        };

        if latest < self.min_residual {
            reasons.push(TerminationReason::ResidualBelowMinimum);
        }

        if self.is_stalled(rms_history) {
            reasons.push(TerminationReason::NoImprovement);
        }

        if let [.., previous, latest] = rms_history {
            if (latest - previous).abs() < self.min_residual_change {
                reasons.push(TerminationReason::ResidualChangeBelowMinimum);
            }
        }

        reasons
    }

    /// `true` if the loop must stop after `iteration_count` completed iterations.
    pub fn is_estimation_converged(&self, iteration_count: usize, rms_history: &[f64]) -> bool {
        !self
            .termination_reasons(iteration_count, rms_history)
            .is_empty()
    }

    fn is_stalled(&self, rms_history: &[f64]) -> bool {
        let len = rms_history.len();
        match self.stall_criterion {
            StallCriterion::HistoryArgmaxOffset => rms_history
                .iter()
                .position_max_by(|a, b| a.total_cmp(b))
                .is_some_and(|argmax| {
                    (argmax as u64).wrapping_sub(len as u64) < self.no_improvement_window as u64
                }),
            StallCriterion::IterationsSinceBest => rms_history
                .iter()
                .position_min_by(|a, b| a.total_cmp(b))
                .is_some_and(|argmin| len - 1 - argmin >= self.no_improvement_window),
        }
    }
}

impl fmt::Display for ConvergenceChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Convergence checker")?;
            writeln!(f, "-------------------")?;
            writeln!(f, "  max_iterations        = {}", self.max_iterations)?;
            writeln!(f, "  min_residual_change   = {:.3e}", self.min_residual_change)?;
            writeln!(f, "  min_residual          = {:.3e}", self.min_residual)?;
            writeln!(f, "  no_improvement_window = {}", self.no_improvement_window)?;
            write!(f, "  stall_criterion       = {:?}", self.stall_criterion)
        } else {
            write!(
                f,
                "ConvergenceChecker(max_iterations={}, min_residual_change={:.1e}, min_residual={:.1e}, window={}, {:?})",
                self.max_iterations,
                self.min_residual_change,
                self.min_residual,
                self.no_improvement_window,
                self.stall_criterion
            )
        }
    }
}

/// Builder for [`ConvergenceChecker`], with validation.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceCheckerBuilder {
    checker: ConvergenceChecker,
}

impl ConvergenceCheckerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iterations(mut self, v: usize) -> Self {
        self.checker.max_iterations = v;
        self
    }
    pub fn min_residual_change(mut self, v: f64) -> Self {
        self.checker.min_residual_change = v;
        self
    }
    pub fn min_residual(mut self, v: f64) -> Self {
        self.checker.min_residual = v;
        self
    }
    pub fn no_improvement_window(mut self, v: usize) -> Self {
        self.checker.no_improvement_window = v;
        self
    }
    pub fn stall_criterion(mut self, v: StallCriterion) -> Self {
        self.checker.stall_criterion = v;
        self
    }

    /// Return true iff x >= 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    /// Finalize the builder.
    ///
    /// Return
    /// ----------
    /// * `Err(OdfitError::InvalidConvergenceParameter)` if `max_iterations` is zero or a
    ///   residual threshold is negative or NaN.
    pub fn build(self) -> Result<ConvergenceChecker, OdfitError> {
        let c = &self.checker;

        if c.max_iterations == 0 {
            return Err(OdfitError::InvalidConvergenceParameter(
                "max_iterations must be at least 1".into(),
            ));
        }
        if !Self::ge0(c.min_residual_change) {
            return Err(OdfitError::InvalidConvergenceParameter(
                "min_residual_change must be non-negative".into(),
            ));
        }
        if !Self::ge0(c.min_residual) {
            return Err(OdfitError::InvalidConvergenceParameter(
                "min_residual must be non-negative".into(),
            ));
        }

        Ok(self.checker)
    }
}
