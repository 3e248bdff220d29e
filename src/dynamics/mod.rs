//! # Dynamics boundary
//!
//! The estimation core never propagates trajectories itself. It talks to the dynamics
//! through three small traits:
//!
//! * [`EstimatableParameterSet`] – the set of estimated parameters, which can be read as a
//!   single vector and overwritten with a new estimate,
//! * [`VariationalEquationsSolver`] – the propagator of the equations of motion and of the
//!   variational equations, reset (and reintegrated) with each new estimate,
//! * [`StateTransitionInterface`] – read access to the combined state-transition and
//!   sensitivity matrices produced by the solver, consumed by the observation managers.
//!
//! [`PropagationSetup`] tells the [`EstimationManager`](crate::estimation::manager::EstimationManager)
//! which kind of dynamics is attached. The valid combinations are resolved into a
//! [`ParameterResetStrategy`](parameter_reset::ParameterResetStrategy).
pub mod parameter_reset;

use std::sync::Arc;

use nalgebra::DMatrix;

use crate::{
    constants::{ParameterVector, StateHistory, TimeTag},
    odfit_errors::OdfitError,
};

/// The full set of estimated parameters.
pub trait EstimatableParameterSet: Send {
    /// Current values of all parameters, concatenated in estimation order.
    fn parameter_values(&self) -> ParameterVector;

    /// Overwrite all parameter values with `values`.
    fn reset_parameter_values(&mut self, values: &ParameterVector) -> Result<(), OdfitError>;

    /// `true` if at least one initial dynamical state is estimated.
    fn has_dynamical_parameters(&self) -> bool;

    /// Start times of the estimated arcs, for multi-arc state estimation.
    fn arc_start_times(&self) -> Option<Vec<TimeTag>> {
        None
    }

    fn parameter_set_size(&self) -> usize {
        self.parameter_values().len()
    }
}

/// Combined state-transition and sensitivity matrices `[Φ(t, t0) | S(t)]`.
pub trait StateTransitionInterface: Send + Sync {
    /// Number of propagated state entries (rows of the combined matrix).
    fn state_size(&self) -> usize;

    /// Number of estimated parameters (columns of the combined matrix).
    fn parameter_size(&self) -> usize;

    /// Combined `state_size × parameter_size` matrix at `time`.
    fn full_matrix_at(&self, time: TimeTag) -> Result<DMatrix<f64>, OdfitError>;
}

/// Propagator of the equations of motion and of the variational equations.
///
/// The solver keeps its own handle on the parameter set: resetting the estimate
/// updates the parameters, then reintegrates the dynamics.
pub trait VariationalEquationsSolver: Send {
    /// Push a new parameter estimate into the dynamics and reintegrate.
    ///
    /// Arguments
    /// -----------------
    /// * `parameters`: the new full parameter vector.
    /// * `reintegrate_variational_equations`: when `false`, only the equations of motion are
    ///   reintegrated and the previous state-transition matrices are kept.
    fn reset_parameter_estimate(
        &mut self,
        parameters: &ParameterVector,
        reintegrate_variational_equations: bool,
    ) -> Result<(), OdfitError>;

    fn state_transition_interface(&self) -> Arc<dyn StateTransitionInterface>;

    /// Numerical solution of the equations of motion, one history per arc.
    fn state_history(&self) -> Vec<StateHistory>;

    /// Dependent variables saved during the last propagation, one history per arc.
    fn dependent_variable_history(&self) -> Vec<StateHistory> {
        Vec::new()
    }
}

/// Dynamics attached to an estimation.
pub enum PropagationSetup {
    /// No propagation: only non-dynamical parameters are estimated.
    None,
    SingleArc(Box<dyn VariationalEquationsSolver>),
    /// Requires [`EstimatableParameterSet::arc_start_times`].
    MultiArc(Box<dyn VariationalEquationsSolver>),
}

impl PropagationSetup {
    pub fn is_none(&self) -> bool {
        matches!(self, PropagationSetup::None)
    }
}

impl std::fmt::Debug for PropagationSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropagationSetup::None => write!(f, "PropagationSetup::None"),
            PropagationSetup::SingleArc(_) => write!(f, "PropagationSetup::SingleArc(..)"),
            PropagationSetup::MultiArc(_) => write!(f, "PropagationSetup::MultiArc(..)"),
        }
    }
}
