//! # Estimation manager
//!
//! [`EstimationManager`] owns the iterative weighted least-squares loop. It is built once
//! from:
//!
//! * the estimated parameter set ([`EstimatableParameterSet`]),
//! * one observation manager per observable type ([`ObservationManagers`]),
//! * the attached dynamics ([`PropagationSetup`]),
//!
//! and can then run any number of estimations with
//! [`estimate_parameters`](EstimationManager::estimate_parameters).
//!
//! ## Iteration
//!
//! Starting from the values held by the parameter set when the call is made, plus the
//! a-priori deviation, each iteration
//!
//! 1. resets the dynamics with the trial estimate (skipped on the first iteration unless
//!    `reintegrate_on_first_iteration` is set),
//! 2. assembles residuals and partials for every observation group,
//! 3. normalizes the partials and the a-priori information,
//! 4. solves the normal equations and applies the de-normalized correction,
//! 5. records the RMS residual and, if it is the lowest so far, snapshots the iteration,
//! 6. asks the [`ConvergenceChecker`] whether to stop.
//!
//! The returned [`EstimationOutput`] holds the snapshot with the lowest RMS, which is not
//! necessarily the last iteration.
//!
//! ## Errors
//!
//! Configuration errors (missing observation manager, inconsistent weights or a-priori
//! dimensions) are reported before the first iteration. Numerical errors (zero partials
//! column, singular normal equations) and collaborator failures abort the call. An iteration
//! whose residuals are not finite is recorded and skipped by the best-iterate tracking, and
//! its correction is discarded: the next iteration restarts from the best estimate so far. If
//! no iteration produced a finite RMS the call fails with [`OdfitError::NoValidIteration`].
use std::sync::Arc;

use log::{debug, warn};

use crate::{
    constants::ParameterVector,
    dynamics::{
        parameter_reset::ParameterResetStrategy, EstimatableParameterSet, PropagationSetup,
        StateTransitionInterface,
    },
    estimation::{
        convergence::ConvergenceChecker,
        estimation_input::EstimationInput,
        estimation_output::{EstimationOutput, IterationSnapshot},
        least_squares::{rms, solve_normal_equations},
        normalization::normalize_partials,
        observer::{EstimationObserver, IterationReport, LogObserver, SilentObserver},
        residuals::{compute_residuals_and_partials, ResidualsAndPartials},
    },
    observation_models::{ObservationManager, ObservationManagers},
    observations::{
        aggregation::{concatenated_weights, ObservationSummary},
        ObservableType,
    },
    odfit_errors::OdfitError,
};

pub struct EstimationManager {
    parameters: Box<dyn EstimatableParameterSet>,
    observation_managers: ObservationManagers,
    reset_strategy: ParameterResetStrategy,
    current_parameter_estimate: ParameterVector,
}

impl EstimationManager {
    /// Build a manager and read the starting estimate from `parameters`.
    ///
    /// Arguments
    /// -----------------
    /// * `parameters`: the estimated parameter set.
    /// * `observation_managers`: observation managers keyed by observable type.
    /// * `propagation`: the dynamics attached to the estimation.
    ///
    /// Return
    /// ----------
    /// * The manager, or an error if `propagation` does not match the parameter set (see
    ///   [`ParameterResetStrategy::from_setup`]).
    pub fn new(
        parameters: Box<dyn EstimatableParameterSet>,
        observation_managers: ObservationManagers,
        propagation: PropagationSetup,
    ) -> Result<Self, OdfitError> {
        let reset_strategy = ParameterResetStrategy::from_setup(parameters.as_ref(), propagation)?;
        let current_parameter_estimate = parameters.parameter_values();

        debug!(
            "Estimation manager ready: {} parameters, observation managers for {:?}, dynamics estimated: {}",
            current_parameter_estimate.len(),
            observation_managers,
            reset_strategy.estimates_dynamics()
        );

        Ok(EstimationManager {
            parameters,
            observation_managers,
            reset_strategy,
            current_parameter_estimate,
        })
    }

    pub fn parameter_size(&self) -> usize {
        self.current_parameter_estimate.len()
    }

    /// Estimate currently pushed into the dynamics.
    pub fn current_parameter_estimate(&self) -> &ParameterVector {
        &self.current_parameter_estimate
    }

    pub fn observation_managers(&self) -> &ObservationManagers {
        &self.observation_managers
    }

    /// Manager of `observable`, or [`OdfitError::MissingObservationManager`].
    pub fn observation_manager(
        &self,
        observable: ObservableType,
    ) -> Result<&Arc<dyn ObservationManager>, OdfitError> {
        self.observation_managers.get(observable)
    }

    /// State-transition and sensitivity interface of the attached dynamics.
    ///
    /// Without estimated dynamics this is an empty interface with no state rows.
    pub fn state_transition_interface(&self) -> Arc<dyn StateTransitionInterface> {
        self.reset_strategy.state_transition_interface()
    }

    /// Push `new_estimate` into the dynamics (or the parameter set when no dynamics is
    /// estimated) and make it the current estimate.
    pub fn reset_parameter_estimate(
        &mut self,
        new_estimate: &ParameterVector,
        reintegrate_variational_equations: bool,
    ) -> Result<(), OdfitError> {
        if new_estimate.len() != self.parameter_size() {
            return Err(OdfitError::ParameterVectorSizeMismatch {
                expected: self.parameter_size(),
                found: new_estimate.len(),
            });
        }

        self.reset_strategy.reset(
            self.parameters.as_mut(),
            new_estimate,
            reintegrate_variational_equations,
        )?;
        self.current_parameter_estimate = new_estimate.clone();
        Ok(())
    }

    /// Run the estimation, logging progress when `input.params.print_progress` is set.
    ///
    /// See also
    /// ------------
    /// * [`estimate_parameters_with_observer`](EstimationManager::estimate_parameters_with_observer) – Same loop with a caller-provided observer.
    pub fn estimate_parameters(
        &mut self,
        input: &EstimationInput,
        checker: &ConvergenceChecker,
    ) -> Result<EstimationOutput, OdfitError> {
        if input.params.print_progress {
            self.estimate_parameters_with_observer(input, checker, &mut LogObserver::new())
        } else {
            self.estimate_parameters_with_observer(input, checker, &mut SilentObserver)
        }
    }

    /// Run the estimation, reporting progress to `observer`.
    ///
    /// Arguments
    /// -----------------
    /// * `input`: observations, weights, a-priori information and run flags.
    /// * `checker`: termination policy.
    /// * `observer`: progress sink.
    ///
    /// Return
    /// ----------
    /// * The [`EstimationOutput`] built around the iteration with the lowest RMS residual.
    pub fn estimate_parameters_with_observer(
        &mut self,
        input: &EstimationInput,
        checker: &ConvergenceChecker,
        observer: &mut dyn EstimationObserver,
    ) -> Result<EstimationOutput, OdfitError> {
        self.current_parameter_estimate = self.parameters.parameter_values();
        let n = self.parameter_size();
        let params = &input.params;

        input.validate(n)?;
        let summary = ObservationSummary::from_observations(&input.observations);
        let weights = concatenated_weights(&input.weights, &summary)?;
        for observable in input.observations.observables() {
            self.observation_managers.get(observable)?;
        }
        if summary.is_empty() {
            warn!("Estimating {n} parameters without any observation");
        }

        let inverse_apriori_covariance = input.apriori.inverse_covariance(n);
        observer.on_estimation_start(&summary, n, checker);

        let mut new_estimate =
            &self.current_parameter_estimate + input.apriori.initial_deviation(n);

        let mut best: Option<IterationSnapshot> = None;
        let mut rms_history = Vec::new();
        let mut residual_history = Vec::new();
        let mut parameter_history = Vec::new();
        let mut state_history_per_iteration = Vec::new();
        let mut dependent_variable_history_per_iteration = Vec::new();
        let mut iteration = 0;

        let termination_reasons = loop {
            observer.on_iteration_start(iteration);

            if iteration > 0 || params.reintegrate_on_first_iteration {
                self.reset_parameter_estimate(
                    &new_estimate,
                    params.reintegrate_variational_equations,
                )?;
            }

            if params.save_state_history_per_iteration {
                if let Some((states, dependent)) = self.reset_strategy.histories() {
                    state_history_per_iteration.push(states);
                    dependent_variable_history_per_iteration.push(dependent);
                }
            }

            let old_estimate = new_estimate;

            let ResidualsAndPartials {
                residuals,
                mut partials,
            } = compute_residuals_and_partials(
                &input.observations,
                &summary,
                &self.observation_managers,
                n,
            )?;

            let normalization = normalize_partials(&mut partials)?;
            let normalized_apriori =
                normalization.normalize_inverse_covariance(&inverse_apriori_covariance);
            let solution =
                solve_normal_equations(&partials, &residuals, &weights, &normalized_apriori)?;

            let residual_rms = rms(&residuals);
            let correction = normalization.denormalize_correction(&solution.correction);
            new_estimate = if residual_rms.is_finite() {
                &old_estimate + &correction
            } else {
                warn!("Iteration {iteration}: non-finite residuals, correction discarded");
                best.as_ref()
                    .map_or_else(|| old_estimate.clone(), |b| b.parameter_estimate.clone())
            };

            if params.save_residuals_and_parameters_per_iteration {
                residual_history.push(residuals.clone());
                if iteration == 0 {
                    parameter_history.push(old_estimate.clone());
                }
                parameter_history.push(new_estimate.clone());
            }

            rms_history.push(residual_rms);

            let previous_best_rms = best.as_ref().map_or(f64::INFINITY, |b| b.rms);
            observer.on_residuals_computed(&IterationReport {
                iteration,
                observation_count: summary.total,
                rms: residual_rms,
                previous_best_rms,
                correction: &correction,
                parameter_estimate: &new_estimate,
            });

            if residual_rms < previous_best_rms {
                best = Some(IterationSnapshot {
                    iteration,
                    parameter_estimate: new_estimate.clone(),
                    residuals,
                    rms: residual_rms,
                    normalized_partials: params.save_information_matrix.then_some(partials),
                    weights: weights.clone(),
                    normalization,
                    normalized_covariance: solution.covariance,
                });
            }

            iteration += 1;

            let reasons = checker.termination_reasons(iteration, &rms_history);
            observer.on_convergence_decision(iteration, &reasons);
            if !reasons.is_empty() {
                break reasons;
            }
        };

        let best = best.ok_or(OdfitError::NoValidIteration)?;

        let output = EstimationOutput {
            best,
            number_of_iterations: iteration,
            rms_history,
            residual_history,
            parameter_history,
            state_history_per_iteration,
            dependent_variable_history_per_iteration,
            termination_reasons,
        };

        observer.on_estimation_finished(&output);
        Ok(output)
    }
}
