//! # Residuals and partials assembly
//!
//! For the current parameter estimate (held by the dynamics the observation managers read
//! from), evaluate every `(observable, link ends)` group of an observation set and assemble
//!
//! * the residual vector `r[i] = measured_i − computed_i`,
//! * the partials matrix `H[i, :] = ∂computed_i / ∂parameters`,
//!
//! with rows in the canonical order given by an
//! [`ObservationSummary`](crate::observations::aggregation::ObservationSummary).
//!
//! Each group is evaluated independently by its observation manager and copied into its
//! pre-computed row range. With the `parallel` feature the groups are evaluated on the
//! `rayon` thread pool; the assembled system is the same in both modes.
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use nalgebra::{DMatrix, DVector};

use crate::{
    constants::{ObservationVector, PartialsMatrix},
    observation_models::{ObservationManagers, ObservationsWithPartials},
    observations::{
        aggregation::{ObservationBlock, ObservationSummary},
        observable_map::ObservationSet,
        LinkEnds, ObservableType, ObservationRecord,
    },
    odfit_errors::OdfitError,
};

/// Assembled linear system of one iteration, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualsAndPartials {
    pub residuals: ObservationVector,
    pub partials: PartialsMatrix,
}

/// Evaluate all observation groups and assemble residuals and partials.
///
/// Arguments
/// -----------------
/// * `observations`: measured data, consistent with `summary`.
/// * `summary`: row layout built from `observations`.
/// * `managers`: one observation manager per observable type.
/// * `parameter_size`: number of estimated parameters (columns of the partials).
///
/// Return
/// ----------
/// * `summary.total` residuals and a `summary.total × parameter_size` partials matrix, or:
///   * [`OdfitError::MissingObservationManager`] for the first observable type without a
///     manager (checked before any manager is called),
///   * [`OdfitError::ObservationSummaryMismatch`] if `summary` was not built from
///     `observations`,
///   * [`OdfitError::ObservationManagerOutputMismatch`] if a manager returns a block of the
///     wrong shape,
///   * any error returned by a manager.
pub fn compute_residuals_and_partials(
    observations: &ObservationSet,
    summary: &ObservationSummary,
    managers: &ObservationManagers,
    parameter_size: usize,
) -> Result<ResidualsAndPartials, OdfitError> {
    for observable in observations.observables() {
        managers.get(observable)?;
    }

    let groups = pair_blocks(observations, summary)?;

    #[cfg(feature = "parallel")]
    let computed: Vec<ObservationsWithPartials> = groups
        .par_iter()
        .map(|(block, record)| evaluate_group(managers, block, record, parameter_size))
        .collect::<Result<_, _>>()?;

    #[cfg(not(feature = "parallel"))]
    let computed: Vec<ObservationsWithPartials> = groups
        .iter()
        .map(|(block, record)| evaluate_group(managers, block, record, parameter_size))
        .collect::<Result<_, _>>()?;

    let mut residuals = DVector::zeros(summary.total);
    let mut partials = DMatrix::zeros(summary.total, parameter_size);

    for ((block, record), computed) in groups.iter().zip(computed) {
        residuals
            .rows_mut(block.start, block.len)
            .copy_from(&(record.values() - &computed.values));
        partials
            .rows_mut(block.start, block.len)
            .copy_from(&computed.partials);
    }

    Ok(ResidualsAndPartials {
        residuals,
        partials,
    })
}

fn pair_blocks<'a>(
    observations: &'a ObservationSet,
    summary: &'a ObservationSummary,
) -> Result<Vec<(&'a ObservationBlock, &'a ObservationRecord)>, OdfitError> {
    let describe = |observable: ObservableType, link_ends: &LinkEnds, len: usize| {
        format!("{observable} [{link_ends}] with {len} observations")
    };

    if summary.blocks.len() != observations.len() {
        return Err(OdfitError::ObservationSummaryMismatch {
            group: summary.blocks.len().min(observations.len()),
            expected: format!("{} groups", observations.len()),
            found: format!("{} groups", summary.blocks.len()),
        });
    }

    summary
        .blocks
        .iter()
        .zip(observations.iter())
        .enumerate()
        .map(|(group, (block, (observable, link_ends, record)))| {
            if block.observable != observable
                || &block.link_ends != link_ends
                || block.len != record.len()
            {
                return Err(OdfitError::ObservationSummaryMismatch {
                    group,
                    expected: describe(observable, link_ends, record.len()),
                    found: describe(block.observable, &block.link_ends, block.len),
                });
            }
            Ok((block, record))
        })
        .collect()
}

fn evaluate_group(
    managers: &ObservationManagers,
    block: &ObservationBlock,
    record: &ObservationRecord,
    parameter_size: usize,
) -> Result<ObservationsWithPartials, OdfitError> {
    let manager = managers.get(block.observable)?;
    let computed = manager.compute_observations_with_partials(
        record.times(),
        &block.link_ends,
        record.reference_link_end(),
    )?;

    if computed.values.len() != block.len
        || computed.partials.nrows() != block.len
        || computed.partials.ncols() != parameter_size
    {
        return Err(OdfitError::ObservationManagerOutputMismatch {
            observable: block.observable,
            link_ends: block.link_ends.to_string(),
            expected_rows: block.len,
            expected_cols: parameter_size,
            found_rows: computed.values.len(),
            found_rows_partials: computed.partials.nrows(),
            found_cols: computed.partials.ncols(),
        });
    }

    Ok(computed)
}
