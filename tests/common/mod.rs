#![allow(dead_code)]

use std::sync::{Arc, Mutex, RwLock};

use nalgebra::{DMatrix, DVector};
use odfit::constants::{ParameterVector, StateHistory, TimeTag};
use odfit::dynamics::parameter_reset::EmptyStateTransitionInterface;
use odfit::dynamics::{EstimatableParameterSet, StateTransitionInterface, VariationalEquationsSolver};
use odfit::observation_models::{ObservationManager, ObservationsWithPartials};
use odfit::observations::observable_map::ObservationSet;
use odfit::observations::{LinkEndType, LinkEnds, ObservableType, ObservationRecord};
use odfit::OdfitError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Parameter vector shared between the parameter set, the solver and the models.
pub type SharedParameters = Arc<RwLock<ParameterVector>>;

pub fn shared(values: &[f64]) -> SharedParameters {
    Arc::new(RwLock::new(DVector::from_column_slice(values)))
}

/// Parameter set backed by a [`SharedParameters`].
pub struct SharedParameterSet {
    pub values: SharedParameters,
    pub dynamical: bool,
    pub arc_start_times: Option<Vec<TimeTag>>,
}

impl SharedParameterSet {
    pub fn new(values: &SharedParameters) -> Self {
        SharedParameterSet {
            values: values.clone(),
            dynamical: false,
            arc_start_times: None,
        }
    }

    pub fn dynamical(values: &SharedParameters) -> Self {
        SharedParameterSet {
            dynamical: true,
            ..Self::new(values)
        }
    }
}

impl EstimatableParameterSet for SharedParameterSet {
    fn parameter_values(&self) -> ParameterVector {
        self.values.read().unwrap().clone()
    }

    fn reset_parameter_values(&mut self, values: &ParameterVector) -> Result<(), OdfitError> {
        *self.values.write().unwrap() = values.clone();
        Ok(())
    }

    fn has_dynamical_parameters(&self) -> bool {
        self.dynamical
    }

    fn arc_start_times(&self) -> Option<Vec<TimeTag>> {
        self.arc_start_times.clone()
    }
}

/// Variational solver that copies the estimate into the shared parameters and records
/// each reset.
pub struct RecordingSolver {
    pub values: SharedParameters,
    pub resets: Arc<Mutex<Vec<(ParameterVector, bool)>>>,
}

impl RecordingSolver {
    pub fn new(values: &SharedParameters) -> Self {
        RecordingSolver {
            values: values.clone(),
            resets: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl VariationalEquationsSolver for RecordingSolver {
    fn reset_parameter_estimate(
        &mut self,
        parameters: &ParameterVector,
        reintegrate_variational_equations: bool,
    ) -> Result<(), OdfitError> {
        *self.values.write().unwrap() = parameters.clone();
        self.resets
            .lock()
            .unwrap()
            .push((parameters.clone(), reintegrate_variational_equations));
        Ok(())
    }

    fn state_transition_interface(&self) -> Arc<dyn StateTransitionInterface> {
        Arc::new(EmptyStateTransitionInterface::new(self.values.read().unwrap().len()))
    }

    fn state_history(&self) -> Vec<StateHistory> {
        vec![vec![(0.0, self.values.read().unwrap().clone())]]
    }

    fn dependent_variable_history(&self) -> Vec<StateHistory> {
        vec![vec![(0.0, DVector::from_element(1, self.values.read().unwrap().norm()))]]
    }
}

/// `y(t) = x[0] + x[1]·t`.
pub struct LinearRange(pub SharedParameters);

impl ObservationManager for LinearRange {
    fn compute_observations_with_partials(
        &self,
        times: &[TimeTag],
        _link_ends: &LinkEnds,
        _reference_link_end: LinkEndType,
    ) -> Result<ObservationsWithPartials, OdfitError> {
        let x = self.0.read().unwrap();
        Ok(ObservationsWithPartials {
            values: DVector::from_iterator(times.len(), times.iter().map(|t| linear(&x, *t))),
            partials: DMatrix::from_fn(times.len(), x.len(), |i, j| match j {
                0 => 1.0,
                1 => times[i],
                _ => 0.0,
            }),
        })
    }
}

/// `y(t) = x[1]`, the rate of [`LinearRange`].
pub struct LinearRate(pub SharedParameters);

impl ObservationManager for LinearRate {
    fn compute_observations_with_partials(
        &self,
        times: &[TimeTag],
        _link_ends: &LinkEnds,
        _reference_link_end: LinkEndType,
    ) -> Result<ObservationsWithPartials, OdfitError> {
        let x = self.0.read().unwrap();
        Ok(ObservationsWithPartials {
            values: DVector::from_element(times.len(), x[1]),
            partials: DMatrix::from_fn(times.len(), x.len(), |_, j| if j == 1 { 1.0 } else { 0.0 }),
        })
    }
}

/// `y(t) = x[0]·exp(x[1]·t)`.
pub struct ExponentialDecay(pub SharedParameters);

impl ObservationManager for ExponentialDecay {
    fn compute_observations_with_partials(
        &self,
        times: &[TimeTag],
        _link_ends: &LinkEnds,
        _reference_link_end: LinkEndType,
    ) -> Result<ObservationsWithPartials, OdfitError> {
        let x = self.0.read().unwrap();
        let (a, b) = (x[0], x[1]);
        Ok(ObservationsWithPartials {
            values: DVector::from_iterator(
                times.len(),
                times.iter().map(|t| a * (b * t).exp()),
            ),
            partials: DMatrix::from_fn(times.len(), 2, |i, j| {
                let e = (b * times[i]).exp();
                if j == 0 {
                    e
                } else {
                    a * times[i] * e
                }
            }),
        })
    }
}

pub fn linear(x: &ParameterVector, t: TimeTag) -> f64 {
    x[0] + x[1] * t
}

pub fn station_link(station: &str) -> LinkEnds {
    LinkEnds::new()
        .with(LinkEndType::Transmitter, ("Earth", station))
        .with(LinkEndType::Receiver, ("Spacecraft", ""))
}

/// Samples of `model` at `times`, perturbed by uniform noise in `[-noise, noise]`.
pub fn synthetic_record(
    times: &[TimeTag],
    model: impl Fn(TimeTag) -> f64,
    noise: f64,
    rng: &mut StdRng,
) -> ObservationRecord {
    let values = DVector::from_iterator(
        times.len(),
        times.iter().map(|t| {
            let eps = if noise > 0.0 {
                rng.random_range(-noise..noise)
            } else {
                0.0
            };
            model(*t) + eps
        }),
    );
    ObservationRecord::new(values, times.to_vec(), LinkEndType::Receiver).unwrap()
}

pub fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

/// Single one-way range group generated from `y = a + b·t`.
pub fn linear_observations(a: f64, b: f64, times: &[TimeTag], noise: f64) -> ObservationSet {
    let mut rng = seeded_rng();
    ObservationSet::new().with(
        ObservableType::OneWayRange,
        station_link("DSS-14"),
        synthetic_record(times, |t| a + b * t, noise, &mut rng),
    )
}
