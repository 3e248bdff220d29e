//! # Observation bookkeeping and weight concatenation
//!
//! Before the first iteration the estimation loop needs to know how many rows the
//! linear system has and where each `(observable, link ends)` group lands in it.
//! [`ObservationSummary`] computes this once from an
//! [`ObservationSet`](crate::observations::observable_map::ObservationSet):
//!
//! * the total number of observations,
//! * the number of observations per observable type (and per link ends),
//! * the row range ([`ObservationBlock`]) of every group, in canonical order.
//!
//! [`concatenated_weights`] flattens a [`WeightSet`] into the diagonal of the observation
//! weight matrix using the very same block layout, so weights and residual rows line up.
//!
//! An empty observation set yields a zero total, no blocks and a zero-length weight vector.
use std::{collections::BTreeMap, fmt, ops::Range};

use nalgebra::DVector;

use crate::{
    constants::ObservationVector,
    observations::{
        observable_map::{ObservationSet, WeightSet},
        LinkEnds, ObservableType,
    },
    odfit_errors::OdfitError,
};

/// Row range of one `(observable, link ends)` group in the concatenated system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationBlock {
    pub observable: ObservableType,
    pub link_ends: LinkEnds,
    pub start: usize,
    pub len: usize,
}

impl ObservationBlock {
    pub fn rows(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Observation counts and row layout of an observation set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObservationSummary {
    pub total: usize,
    pub per_observable: BTreeMap<ObservableType, usize>,
    pub blocks: Vec<ObservationBlock>,
}

impl ObservationSummary {
    /// Count the observations of `observations` and lay out their rows.
    ///
    /// Arguments
    /// -----------------
    /// * `observations`: the measured data of the estimation call.
    ///
    /// Return
    /// ----------
    /// * The summary. `total` equals the sum of `per_observable`, which equals the sum of all
    ///   record lengths. Blocks are contiguous and follow the canonical group order.
    pub fn from_observations(observations: &ObservationSet) -> Self {
        let mut summary = ObservationSummary::default();

        for (observable, link_ends, record) in observations.iter() {
            let len = record.len();
            *summary.per_observable.entry(observable).or_insert(0) += len;
            summary.blocks.push(ObservationBlock {
                observable,
                link_ends: link_ends.clone(),
                start: summary.total,
                len,
            });
            summary.total += len;
        }

        summary
    }

    /// Number of observations of each link-ends group of `observable`, in link-ends order.
    ///
    /// Returns an empty vector if the observable type is not present.
    pub fn observations_per_link_ends(&self, observable: ObservableType) -> Vec<usize> {
        self.blocks
            .iter()
            .filter(|block| block.observable == observable)
            .map(|block| block.len)
            .collect()
    }

    pub fn number_of_groups(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl fmt::Display for ObservationSummary {
    /// Compact by default; aligned multi-line table with `{:#}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Observation summary")?;
            writeln!(f, "-------------------")?;
            for (observable, count) in &self.per_observable {
                writeln!(f, "{:<28}: {}", observable.to_string(), count)?;
            }
            writeln!(f, "{:<28}: {}", "groups", self.blocks.len())?;
            write!(f, "{:<28}: {}", "total", self.total)
        } else {
            write!(f, "total={}, groups={}", self.total, self.blocks.len())?;
            for (observable, count) in &self.per_observable {
                write!(f, ", {observable}={count}")?;
            }
            Ok(())
        }
    }
}

/// Concatenate the weights of every group into a single vector aligned with the rows
/// described by `summary`.
///
/// Arguments
/// -----------------
/// * `weights`: per-observation weights, one vector per group.
/// * `summary`: the row layout of the observation set the weights belong to.
///
/// Return
/// ----------
/// * A vector of length `summary.total`, or:
///   * [`OdfitError::WeightsNotFound`] if a group has no weights,
///   * [`OdfitError::WeightLengthMismatch`] if a weight vector has the wrong length,
///   * [`OdfitError::UnexpectedWeights`] if weights are given for a group without observations.
pub fn concatenated_weights(
    weights: &WeightSet,
    summary: &ObservationSummary,
) -> Result<ObservationVector, OdfitError> {
    let mut out = DVector::zeros(summary.total);

    for block in &summary.blocks {
        let w = weights
            .get(block.observable, &block.link_ends)
            .ok_or_else(|| OdfitError::WeightsNotFound {
                observable: block.observable,
                link_ends: block.link_ends.to_string(),
            })?;

        if w.len() != block.len {
            return Err(OdfitError::WeightLengthMismatch {
                observable: block.observable,
                link_ends: block.link_ends.to_string(),
                expected: block.len,
                found: w.len(),
            });
        }

        out.rows_mut(block.start, block.len).copy_from(w);
    }

    if weights.len() != summary.blocks.len() {
        if let Some((observable, link_ends, _)) = weights.iter().find(|(o, l, _)| {
            !summary
                .blocks
                .iter()
                .any(|b| b.observable == *o && &b.link_ends == *l)
        }) {
            return Err(OdfitError::UnexpectedWeights {
                observable,
                link_ends: link_ends.to_string(),
            });
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::{LinkEndType, ObservationRecord};

    fn link(station: &str) -> LinkEnds {
        LinkEnds::new()
            .with(LinkEndType::Transmitter, ("Earth", station))
            .with(LinkEndType::Receiver, ("Spacecraft", ""))
    }

    fn record(n: usize) -> ObservationRecord {
        ObservationRecord::new(
            DVector::from_element(n, 1.0),
            (0..n).map(|i| i as f64).collect(),
            LinkEndType::Receiver,
        )
        .unwrap()
    }

    fn sample_set() -> ObservationSet {
        ObservationSet::new()
            .with(ObservableType::AngularPosition, link("A"), record(4))
            .with(ObservableType::OneWayRange, link("B"), record(2))
            .with(ObservableType::OneWayRange, link("A"), record(3))
            .with(ObservableType::OneWayDoppler, link("C"), record(1))
    }

    #[test]
    fn test_counts_are_consistent() {
        let set = sample_set();
        let summary = ObservationSummary::from_observations(&set);

        let leaf_sum: usize = set.iter().map(|(_, _, r)| r.len()).sum();
        let per_type_sum: usize = summary.per_observable.values().sum();

        assert_eq!(summary.total, 10);
        assert_eq!(summary.total, per_type_sum);
        assert_eq!(summary.total, leaf_sum);
        assert_eq!(summary.per_observable[&ObservableType::OneWayRange], 5);
        assert_eq!(
            summary.observations_per_link_ends(ObservableType::OneWayRange),
            vec![3, 2]
        );
        assert!(summary
            .observations_per_link_ends(ObservableType::Velocity)
            .is_empty());
    }

    #[test]
    fn test_blocks_are_contiguous_and_canonical() {
        let summary = ObservationSummary::from_observations(&sample_set());

        let layout: Vec<(ObservableType, usize, usize)> = summary
            .blocks
            .iter()
            .map(|b| (b.observable, b.start, b.len))
            .collect();

        assert_eq!(
            layout,
            vec![
                (ObservableType::OneWayRange, 0, 3),
                (ObservableType::OneWayRange, 3, 2),
                (ObservableType::OneWayDoppler, 5, 1),
                (ObservableType::AngularPosition, 6, 4),
            ]
        );
        assert_eq!(summary.blocks[1].link_ends, link("B"));
    }

    #[test]
    fn test_empty_set() {
        let summary = ObservationSummary::from_observations(&ObservationSet::new());
        assert_eq!(summary.total, 0);
        assert!(summary.blocks.is_empty());

        let w = concatenated_weights(&WeightSet::new(), &summary).unwrap();
        assert_eq!(w.len(), 0);
    }

    #[test]
    fn test_concatenated_weights_order() {
        let set = sample_set();
        let summary = ObservationSummary::from_observations(&set);

        let weights = set.map(|observable, link_ends, record| {
            let value = match (observable, link_ends == &link("A")) {
                (ObservableType::OneWayRange, true) => 1.0,
                (ObservableType::OneWayRange, false) => 2.0,
                (ObservableType::OneWayDoppler, _) => 3.0,
                _ => 4.0,
            };
            DVector::from_element(record.len(), value)
        });

        let w = concatenated_weights(&weights, &summary).unwrap();
        assert_eq!(
            w.as_slice(),
            &[1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 4.0, 4.0, 4.0, 4.0]
        );
    }

    #[test]
    fn test_weight_shape_errors() {
        let set = sample_set();
        let summary = ObservationSummary::from_observations(&set);

        let mut weights = WeightSet::constant(&set, 1.0);
        weights.insert(
            ObservableType::OneWayDoppler,
            link("C"),
            DVector::from_element(5, 1.0),
        );
        assert!(matches!(
            concatenated_weights(&weights, &summary),
            Err(OdfitError::WeightLengthMismatch {
                expected: 1,
                found: 5,
                ..
            })
        ));

        let mut weights = WeightSet::constant(&set, 1.0);
        weights.insert(
            ObservableType::Velocity,
            link("A"),
            DVector::from_element(2, 1.0),
        );
        assert!(matches!(
            concatenated_weights(&weights, &summary),
            Err(OdfitError::UnexpectedWeights {
                observable: ObservableType::Velocity,
                ..
            })
        ));

        let partial = WeightSet::new().with(
            ObservableType::OneWayRange,
            link("A"),
            DVector::from_element(3, 1.0),
        );
        assert!(matches!(
            concatenated_weights(&partial, &summary),
            Err(OdfitError::WeightsNotFound {
                observable: ObservableType::OneWayRange,
                ..
            })
        ));
    }
}
