//! # Parameter reset strategies
//!
//! Pushing a new estimate into the dynamics depends on what is estimated:
//!
//! | Estimated parameters      | Propagation            | Strategy                        |
//! |---------------------------|------------------------|---------------------------------|
//! | with dynamical states     | single arc             | [`ParameterResetStrategy::SingleArc`] |
//! | with dynamical states     | multi arc              | [`ParameterResetStrategy::MultiArc`]  |
//! | without dynamical states  | none                   | [`ParameterResetStrategy::ParametersOnly`] |
//! | with dynamical states     | none                   | error                           |
//! | without dynamical states  | single or multi arc    | error                           |
//!
//! The strategy is selected once, when the estimation manager is built, and every later
//! reset goes through [`ParameterResetStrategy::reset`].
use std::sync::Arc;

use itertools::Itertools;
use log::debug;
use nalgebra::DMatrix;

use super::{
    EstimatableParameterSet, PropagationSetup, StateTransitionInterface,
    VariationalEquationsSolver,
};
use crate::{
    constants::{ParameterVector, StateHistory, TimeTag},
    odfit_errors::OdfitError,
};

/// State-transition interface used when no dynamics is estimated.
///
/// It has no state rows, so every matrix it returns is `0 × parameter_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyStateTransitionInterface {
    parameter_size: usize,
}

impl EmptyStateTransitionInterface {
    pub fn new(parameter_size: usize) -> Self {
        EmptyStateTransitionInterface { parameter_size }
    }
}

impl StateTransitionInterface for EmptyStateTransitionInterface {
    fn state_size(&self) -> usize {
        0
    }

    fn parameter_size(&self) -> usize {
        self.parameter_size
    }

    fn full_matrix_at(&self, _time: TimeTag) -> Result<DMatrix<f64>, OdfitError> {
        Ok(DMatrix::zeros(0, self.parameter_size))
    }
}

/// How a new parameter estimate reaches the dynamics.
pub enum ParameterResetStrategy {
    SingleArc {
        solver: Box<dyn VariationalEquationsSolver>,
    },
    MultiArc {
        solver: Box<dyn VariationalEquationsSolver>,
        arc_start_times: Vec<TimeTag>,
    },
    /// Only the parameter set is updated; there is nothing to reintegrate.
    ParametersOnly {
        interface: Arc<EmptyStateTransitionInterface>,
    },
}

impl ParameterResetStrategy {
    /// Select the strategy matching `parameters` and `setup`.
    ///
    /// Return
    /// ----------
    /// * The strategy, or:
    ///   * [`OdfitError::PropagationWithoutDynamicalParameters`] if a propagation is given but no
    ///     dynamical state is estimated,
    ///   * [`OdfitError::MissingPropagationForDynamicalParameters`] in the opposite case,
    ///   * [`OdfitError::InvalidArcStartTimes`] if a multi-arc setup has no, or unsorted, arc
    ///     start times.
    pub fn from_setup(
        parameters: &dyn EstimatableParameterSet,
        setup: PropagationSetup,
    ) -> Result<Self, OdfitError> {
        match (parameters.has_dynamical_parameters(), setup) {
            (true, PropagationSetup::SingleArc(solver)) => {
                debug!("Estimating single-arc dynamics");
                Ok(ParameterResetStrategy::SingleArc { solver })
            }
            (true, PropagationSetup::MultiArc(solver)) => {
                let arc_start_times = parameters.arc_start_times().ok_or_else(|| {
                    OdfitError::InvalidArcStartTimes(
                        "multi-arc propagation requires arc start times".into(),
                    )
                })?;
                check_arc_start_times(&arc_start_times)?;
                debug!(
                    "Estimating multi-arc dynamics over {} arcs",
                    arc_start_times.len()
                );
                Ok(ParameterResetStrategy::MultiArc {
                    solver,
                    arc_start_times,
                })
            }
            (true, PropagationSetup::None) => {
                Err(OdfitError::MissingPropagationForDynamicalParameters)
            }
            (false, PropagationSetup::None) => Ok(ParameterResetStrategy::ParametersOnly {
                interface: Arc::new(EmptyStateTransitionInterface::new(
                    parameters.parameter_set_size(),
                )),
            }),
            (false, _) => Err(OdfitError::PropagationWithoutDynamicalParameters),
        }
    }

    /// Push `values` into the dynamics (or only into `parameters` when no dynamics is
    /// estimated).
    pub fn reset(
        &mut self,
        parameters: &mut dyn EstimatableParameterSet,
        values: &ParameterVector,
        reintegrate_variational_equations: bool,
    ) -> Result<(), OdfitError> {
        match self {
            ParameterResetStrategy::SingleArc { solver }
            | ParameterResetStrategy::MultiArc { solver, .. } => {
                solver.reset_parameter_estimate(values, reintegrate_variational_equations)
            }
            ParameterResetStrategy::ParametersOnly { .. } => {
                parameters.reset_parameter_values(values)
            }
        }
    }

    pub fn state_transition_interface(&self) -> Arc<dyn StateTransitionInterface> {
        match self {
            ParameterResetStrategy::SingleArc { solver }
            | ParameterResetStrategy::MultiArc { solver, .. } => {
                solver.state_transition_interface()
            }
            ParameterResetStrategy::ParametersOnly { interface } => interface.clone(),
        }
    }

    /// State and dependent-variable histories of the last propagation, if any.
    pub fn histories(&self) -> Option<(Vec<StateHistory>, Vec<StateHistory>)> {
        match self {
            ParameterResetStrategy::SingleArc { solver }
            | ParameterResetStrategy::MultiArc { solver, .. } => {
                Some((solver.state_history(), solver.dependent_variable_history()))
            }
            ParameterResetStrategy::ParametersOnly { .. } => None,
        }
    }

    pub fn is_multi_arc(&self) -> bool {
        matches!(self, ParameterResetStrategy::MultiArc { .. })
    }

    pub fn estimates_dynamics(&self) -> bool {
        !matches!(self, ParameterResetStrategy::ParametersOnly { .. })
    }

    pub fn arc_start_times(&self) -> Option<&[TimeTag]> {
        match self {
            ParameterResetStrategy::MultiArc {
                arc_start_times, ..
            } => Some(arc_start_times),
            _ => None,
        }
    }
}

fn check_arc_start_times(times: &[TimeTag]) -> Result<(), OdfitError> {
    if times.is_empty() {
        return Err(OdfitError::InvalidArcStartTimes(
            "no arc start time given".into(),
        ));
    }
    if let Some((i, (a, b))) = times
        .iter()
        .tuple_windows()
        .enumerate()
        .find(|(_, (a, b))| !(a < b))
    {
        return Err(OdfitError::InvalidArcStartTimes(format!(
            "arc {} starts at {b}, not after arc {i} at {a}",
            i + 1
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;
    use std::sync::{Mutex, RwLock};

    struct Params {
        values: ParameterVector,
        dynamical: bool,
        arcs: Option<Vec<TimeTag>>,
    }

    impl EstimatableParameterSet for Params {
        fn parameter_values(&self) -> ParameterVector {
            self.values.clone()
        }

        fn reset_parameter_values(&mut self, values: &ParameterVector) -> Result<(), OdfitError> {
            self.values = values.clone();
            Ok(())
        }

        fn has_dynamical_parameters(&self) -> bool {
            self.dynamical
        }

        fn arc_start_times(&self) -> Option<Vec<TimeTag>> {
            self.arcs.clone()
        }
    }

    #[derive(Default)]
    struct RecordingSolver {
        calls: Arc<Mutex<Vec<(Vec<f64>, bool)>>>,
        current: Arc<RwLock<Vec<f64>>>,
    }

    impl VariationalEquationsSolver for RecordingSolver {
        fn reset_parameter_estimate(
            &mut self,
            parameters: &ParameterVector,
            reintegrate_variational_equations: bool,
        ) -> Result<(), OdfitError> {
            self.calls
                .lock()
                .unwrap()
                .push((parameters.as_slice().to_vec(), reintegrate_variational_equations));
            *self.current.write().unwrap() = parameters.as_slice().to_vec();
            Ok(())
        }

        fn state_transition_interface(&self) -> Arc<dyn StateTransitionInterface> {
            Arc::new(EmptyStateTransitionInterface::new(2))
        }

        fn state_history(&self) -> Vec<StateHistory> {
            let x = self.current.read().unwrap().clone();
            vec![vec![(0.0, DVector::from_vec(x))]]
        }
    }

    fn params(dynamical: bool, arcs: Option<Vec<TimeTag>>) -> Params {
        Params {
            values: DVector::from_vec(vec![1.0, 2.0]),
            dynamical,
            arcs,
        }
    }

    #[test]
    fn test_parameters_only_strategy() {
        let mut p = params(false, None);
        let mut strategy = ParameterResetStrategy::from_setup(&p, PropagationSetup::None).unwrap();

        assert!(!strategy.estimates_dynamics());
        let stm = strategy.state_transition_interface();
        assert_eq!(stm.state_size(), 0);
        assert_eq!(stm.parameter_size(), 2);
        assert_eq!(stm.full_matrix_at(10.0).unwrap().shape(), (0, 2));

        strategy
            .reset(&mut p, &DVector::from_vec(vec![5.0, 6.0]), true)
            .unwrap();
        assert_eq!(p.values.as_slice(), &[5.0, 6.0]);
        assert!(strategy.histories().is_none());
    }

    #[test]
    fn test_single_arc_strategy_forwards_flag() {
        let solver = RecordingSolver::default();
        let calls = solver.calls.clone();
        let mut p = params(true, None);

        let mut strategy =
            ParameterResetStrategy::from_setup(&p, PropagationSetup::SingleArc(Box::new(solver)))
                .unwrap();
        strategy
            .reset(&mut p, &DVector::from_vec(vec![3.0, 4.0]), false)
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![(vec![3.0, 4.0], false)]);
        let (states, dependent) = strategy.histories().unwrap();
        assert_eq!(states[0][0].1.as_slice(), &[3.0, 4.0]);
        assert!(dependent.is_empty());
        assert!(!strategy.is_multi_arc());
    }

    #[test]
    fn test_multi_arc_requires_sorted_start_times() {
        let p = params(true, Some(vec![0.0, 86_400.0, 172_800.0]));
        let strategy = ParameterResetStrategy::from_setup(
            &p,
            PropagationSetup::MultiArc(Box::new(RecordingSolver::default())),
        )
        .unwrap();
        assert!(strategy.is_multi_arc());
        assert_eq!(strategy.arc_start_times().unwrap().len(), 3);

        let p = params(true, Some(vec![0.0, 86_400.0, 86_400.0]));
        let err = ParameterResetStrategy::from_setup(
            &p,
            PropagationSetup::MultiArc(Box::new(RecordingSolver::default())),
        )
        .err()
        .unwrap();
        assert!(matches!(err, OdfitError::InvalidArcStartTimes(_)));

        let p = params(true, None);
        assert!(matches!(
            ParameterResetStrategy::from_setup(
                &p,
                PropagationSetup::MultiArc(Box::new(RecordingSolver::default())),
            ),
            Err(OdfitError::InvalidArcStartTimes(_))
        ));
    }

    #[test]
    fn test_invalid_combinations() {
        let p = params(false, None);
        assert!(matches!(
            ParameterResetStrategy::from_setup(
                &p,
                PropagationSetup::SingleArc(Box::new(RecordingSolver::default())),
            ),
            Err(OdfitError::PropagationWithoutDynamicalParameters)
        ));

        let p = params(true, None);
        assert!(matches!(
            ParameterResetStrategy::from_setup(&p, PropagationSetup::None),
            Err(OdfitError::MissingPropagationForDynamicalParameters)
        ));
    }
}
