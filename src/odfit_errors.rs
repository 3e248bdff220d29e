use thiserror::Error;

use crate::observations::ObservableType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OdfitError {
    #[error("No observation manager registered for observable type {0}")]
    MissingObservationManager(ObservableType),

    #[error("Propagation settings were provided but no dynamical parameter is estimated")]
    PropagationWithoutDynamicalParameters,

    #[error("Dynamical parameters are estimated but no propagation setup was provided")]
    MissingPropagationForDynamicalParameters,

    #[error("Invalid multi-arc start times: {0}")]
    InvalidArcStartTimes(String),

    #[error("Observation record has {values} values but {times} time tags")]
    ObservationTimeLengthMismatch { values: usize, times: usize },

    #[error("No weights found for observable {observable} with link ends [{link_ends}]")]
    WeightsNotFound {
        observable: ObservableType,
        link_ends: String,
    },

    #[error(
        "Weight vector for observable {observable} with link ends [{link_ends}] has length {found}, expected {expected}"
    )]
    WeightLengthMismatch {
        observable: ObservableType,
        link_ends: String,
        expected: usize,
        found: usize,
    },

    #[error("Weights given for observable {observable} with link ends [{link_ends}] without observations")]
    UnexpectedWeights {
        observable: ObservableType,
        link_ends: String,
    },

    #[error("A-priori {what} has dimension {found}, expected {expected}")]
    AprioriDimensionMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("Parameter vector has size {found}, expected {expected}")]
    ParameterVectorSizeMismatch { expected: usize, found: usize },

    #[error("Invalid convergence parameter: {0}")]
    InvalidConvergenceParameter(String),

    #[error(
        "Observation manager for {observable} with link ends [{link_ends}] returned {found_rows} values and a {found_rows_partials}x{found_cols} partials block, expected {expected_rows} values and a {expected_rows}x{expected_cols} block"
    )]
    ObservationManagerOutputMismatch {
        observable: ObservableType,
        link_ends: String,
        expected_rows: usize,
        expected_cols: usize,
        found_rows: usize,
        found_rows_partials: usize,
        found_cols: usize,
    },

    #[error(
        "Observation summary does not match the observation set at group {group}: expected {expected}, found {found}"
    )]
    ObservationSummaryMismatch {
        group: usize,
        expected: String,
        found: String,
    },

    #[error("Partials column {column} is identically zero and cannot be normalized")]
    ZeroNormalizationColumn { column: usize },

    #[error("Partials column {column} contains non-finite values")]
    NonFiniteNormalization { column: usize },

    #[error("Normal equations matrix is singular (cannot be inverted)")]
    SingularNormalEquations,

    #[error("No iteration produced a finite RMS residual")]
    NoValidIteration,

    #[error("Observation model failure: {0}")]
    ObservationModel(String),

    #[error("Propagation failure: {0}")]
    Propagation(String),
}
