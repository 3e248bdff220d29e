pub mod constants;
pub mod dynamics;
pub mod estimation;
pub mod observation_models;
pub mod observations;
pub mod odfit_errors;

pub use estimation::{
    convergence::ConvergenceChecker,
    estimation_input::{AprioriInfo, EstimationInput, EstimationParams},
    estimation_output::EstimationOutput,
    manager::EstimationManager,
};
pub use odfit_errors::OdfitError;
