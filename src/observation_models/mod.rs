//! # Observation manager boundary
//!
//! The estimation core does not model observations itself. For every observable type it
//! relies on an external [`ObservationManager`] that, given time tags, link ends and the
//! reference link-end role, returns the computed observations and their partials with
//! respect to the full parameter vector, evaluated against the current dynamics state.
//!
//! Managers are registered per observable type in an [`ObservationManagers`] registry owned
//! by the [`EstimationManager`](crate::estimation::manager::EstimationManager).
//! Requesting a type without a registered manager is a fatal configuration error.
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    constants::{ObservationVector, PartialsMatrix, TimeTag},
    observations::{LinkEndType, LinkEnds, ObservableType},
    odfit_errors::OdfitError,
};

/// Computed observations of one group and their partials.
///
/// `partials` has one row per value and one column per estimated parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationsWithPartials {
    pub values: ObservationVector,
    pub partials: PartialsMatrix,
}

/// Computes observations and partials for one observable type.
///
/// Implementations read the live dynamics state, so two calls with the same inputs must
/// return the same result as long as the parameter estimate has not been reset in between.
pub trait ObservationManager: Send + Sync {
    /// Arguments
    /// -----------------
    /// * `times`: time tags at which to evaluate the observable.
    /// * `link_ends`: participants of the observation series.
    /// * `reference_link_end`: role at which `times` are defined.
    ///
    /// Return
    /// ----------
    /// * `times.len()` computed values and a `times.len() × n_parameters` partials block.
    fn compute_observations_with_partials(
        &self,
        times: &[TimeTag],
        link_ends: &LinkEnds,
        reference_link_end: LinkEndType,
    ) -> Result<ObservationsWithPartials, OdfitError>;
}

/// Observation managers keyed by observable type.
#[derive(Clone, Default)]
pub struct ObservationManagers {
    managers: BTreeMap<ObservableType, Arc<dyn ObservationManager>>,
}

impl ObservationManagers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the manager of `observable`.
    pub fn register(
        &mut self,
        observable: ObservableType,
        manager: Arc<dyn ObservationManager>,
    ) -> &mut Self {
        self.managers.insert(observable, manager);
        self
    }

    pub fn with(mut self, observable: ObservableType, manager: Arc<dyn ObservationManager>) -> Self {
        self.register(observable, manager);
        self
    }

    /// Manager of `observable`, or [`OdfitError::MissingObservationManager`].
    pub fn get(&self, observable: ObservableType) -> Result<&Arc<dyn ObservationManager>, OdfitError> {
        self.managers
            .get(&observable)
            .ok_or(OdfitError::MissingObservationManager(observable))
    }

    pub fn contains(&self, observable: ObservableType) -> bool {
        self.managers.contains_key(&observable)
    }

    pub fn observables(&self) -> impl Iterator<Item = ObservableType> + '_ {
        self.managers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

impl std::fmt::Debug for ObservationManagers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.managers.keys()).finish()
    }
}
