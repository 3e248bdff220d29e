//! # Two-level observable / link-ends container
//!
//! [`ObservableMap`] stores one value per `(ObservableType, LinkEnds)` pair in nested
//! sorted maps. Iteration always visits the observable types in their declared order and,
//! inside each type, the link ends in their lexicographic order, independently of the
//! insertion order.
//!
//! Two aliases are used throughout the crate:
//!
//! * [`ObservationSet`] – the measured data, one [`ObservationRecord`] per group,
//! * [`WeightSet`] – per-observation scalar weights, one vector per group.
//!
//! The weight helpers ([`WeightSet::constant`], [`WeightSet::constant_per_observable`],
//! [`WeightSet::constant_per_link_ends`]) build a weight set with the exact shape of a given
//! observation set.
use std::collections::BTreeMap;

use nalgebra::DVector;

use crate::{
    constants::ObservationVector,
    observations::{LinkEnds, ObservableType, ObservationRecord},
    odfit_errors::OdfitError,
};

/// Nested sorted map `observable type → link ends → T`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservableMap<T> {
    inner: BTreeMap<ObservableType, BTreeMap<LinkEnds, T>>,
}

/// Measured observations of one estimation call.
pub type ObservationSet = ObservableMap<ObservationRecord>;

/// Per-observation scalar weights, same shape as an [`ObservationSet`].
pub type WeightSet = ObservableMap<ObservationVector>;

impl<T> Default for ObservableMap<T> {
    fn default() -> Self {
        ObservableMap {
            inner: BTreeMap::new(),
        }
    }
}

impl<T> ObservableMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value for a group, returning the previous one if the group existed.
    pub fn insert(
        &mut self,
        observable: ObservableType,
        link_ends: LinkEnds,
        value: T,
    ) -> Option<T> {
        self.inner
            .entry(observable)
            .or_default()
            .insert(link_ends, value)
    }

    /// Builder-style variant of [`ObservableMap::insert`].
    pub fn with(mut self, observable: ObservableType, link_ends: LinkEnds, value: T) -> Self {
        self.insert(observable, link_ends, value);
        self
    }

    pub fn get(&self, observable: ObservableType, link_ends: &LinkEnds) -> Option<&T> {
        self.inner.get(&observable)?.get(link_ends)
    }

    /// All groups of one observable type, in link-ends order.
    pub fn get_observable(&self, observable: ObservableType) -> Option<&BTreeMap<LinkEnds, T>> {
        self.inner.get(&observable)
    }

    /// Observable types present in the map, in canonical order.
    pub fn observables(&self) -> impl Iterator<Item = ObservableType> + '_ {
        self.inner.keys().copied()
    }

    /// Visit every group in canonical `(observable, link ends)` order.
    pub fn iter(&self) -> impl Iterator<Item = (ObservableType, &LinkEnds, &T)> {
        self.inner.iter().flat_map(|(observable, per_link)| {
            per_link
                .iter()
                .map(move |(link_ends, value)| (*observable, link_ends, value))
        })
    }

    /// Number of `(observable, link ends)` groups.
    pub fn len(&self) -> usize {
        self.inner.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `f` to every group, keeping the shape.
    pub fn map<U, F>(&self, mut f: F) -> ObservableMap<U>
    where
        F: FnMut(ObservableType, &LinkEnds, &T) -> U,
    {
        let inner = self
            .inner
            .iter()
            .map(|(observable, per_link)| {
                let mapped = per_link
                    .iter()
                    .map(|(link_ends, value)| (link_ends.clone(), f(*observable, link_ends, value)))
                    .collect();
                (*observable, mapped)
            })
            .collect();
        ObservableMap { inner }
    }
}

impl<T> FromIterator<(ObservableType, LinkEnds, T)> for ObservableMap<T> {
    fn from_iter<I: IntoIterator<Item = (ObservableType, LinkEnds, T)>>(iter: I) -> Self {
        let mut map = ObservableMap::new();
        for (observable, link_ends, value) in iter {
            map.insert(observable, link_ends, value);
        }
        map
    }
}

impl ObservableMap<ObservationVector> {
    /// Same weight `weight` for every observation of `observations`.
    pub fn constant(observations: &ObservationSet, weight: f64) -> Self {
        observations.map(|_, _, record| DVector::from_element(record.len(), weight))
    }

    /// One constant weight per observable type.
    ///
    /// Return
    /// ----------
    /// * The weight set, or [`OdfitError::WeightsNotFound`] for the first observable type of
    ///   `observations` without an entry in `weights`.
    pub fn constant_per_observable(
        observations: &ObservationSet,
        weights: &BTreeMap<ObservableType, f64>,
    ) -> Result<Self, OdfitError> {
        let mut out = WeightSet::new();
        for (observable, link_ends, record) in observations.iter() {
            let w = weights
                .get(&observable)
                .ok_or_else(|| OdfitError::WeightsNotFound {
                    observable,
                    link_ends: link_ends.to_string(),
                })?;
            out.insert(
                observable,
                link_ends.clone(),
                DVector::from_element(record.len(), *w),
            );
        }
        Ok(out)
    }

    /// One constant weight per `(observable, link ends)` group.
    pub fn constant_per_link_ends(
        observations: &ObservationSet,
        weights: &ObservableMap<f64>,
    ) -> Result<Self, OdfitError> {
        let mut out = WeightSet::new();
        for (observable, link_ends, record) in observations.iter() {
            let w = weights
                .get(observable, link_ends)
                .ok_or_else(|| OdfitError::WeightsNotFound {
                    observable,
                    link_ends: link_ends.to_string(),
                })?;
            out.insert(
                observable,
                link_ends.clone(),
                DVector::from_element(record.len(), *w),
            );
        }
        Ok(out)
    }
}
