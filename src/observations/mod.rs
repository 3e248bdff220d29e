//! # Observation identifiers and records
//!
//! This module defines the vocabulary used to address measurement data in the estimation
//! core:
//!
//! - [`ObservableType`] – the category of measured quantity (range, Doppler, angles, …),
//! - [`LinkEndType`] / [`LinkEndId`] / [`LinkEnds`] – the participants of a measurement and
//!   their role,
//! - [`ObservationRecord`] – one time-tagged observation series for a given observable
//!   and set of link ends.
//!
//! All identifier types are totally ordered. The ordering is **load-bearing**: the
//! [`ObservationSet`](crate::observations::observable_map::ObservationSet) iterates in
//! `(ObservableType, LinkEnds)` order, and this canonical order fixes the row layout of the
//! residual vector, the weight vector and the partials matrix.
//!
//! ## Example
//!
//! ```rust
//! use odfit::observations::{LinkEndType, LinkEnds, ObservableType, ObservationRecord};
//! use nalgebra::DVector;
//!
//! let link_ends = LinkEnds::new()
//!     .with(LinkEndType::Transmitter, ("Earth", "DSS-63"))
//!     .with(LinkEndType::Receiver, ("MEX", ""));
//!
//! let record = ObservationRecord::new(
//!     DVector::from_vec(vec![1.0e8, 1.1e8]),
//!     vec![0.0, 60.0],
//!     LinkEndType::Receiver,
//! )
//! .unwrap();
//!
//! assert_eq!(record.len(), 2);
//! assert_eq!(ObservableType::OneWayRange.to_string(), "one-way range");
//! # let _ = link_ends;
//! ```
pub mod aggregation;
pub mod observable_map;

use std::{collections::BTreeMap, fmt};

use hifitime::{Epoch, TimeScale};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{ObservationVector, TimeTag, SECONDS_PER_DAY, T2000},
    odfit_errors::OdfitError,
};

/// Category of measured quantity.
///
/// The declaration order is the canonical outer ordering of an observation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObservableType {
    OneWayRange,
    OneWayDoppler,
    TwoWayDoppler,
    OneWayDifferencedRange,
    NWayRange,
    AngularPosition,
    Position,
    EulerAngle313,
    Velocity,
}

impl fmt::Display for ObservableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObservableType::OneWayRange => "one-way range",
            ObservableType::OneWayDoppler => "one-way Doppler",
            ObservableType::TwoWayDoppler => "two-way Doppler",
            ObservableType::OneWayDifferencedRange => "one-way differenced range",
            ObservableType::NWayRange => "n-way range",
            ObservableType::AngularPosition => "angular position",
            ObservableType::Position => "position",
            ObservableType::EulerAngle313 => "Euler angles (3-1-3)",
            ObservableType::Velocity => "velocity",
        };
        f.write_str(name)
    }
}

/// Role of a participant in a measurement link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LinkEndType {
    Unidentified,
    Transmitter,
    Reflector1,
    Reflector2,
    Reflector3,
    Reflector4,
    Receiver,
    ObservedBody,
}

impl fmt::Display for LinkEndType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkEndType::Unidentified => "unidentified",
            LinkEndType::Transmitter => "transmitter",
            LinkEndType::Reflector1 => "reflector1",
            LinkEndType::Reflector2 => "reflector2",
            LinkEndType::Reflector3 => "reflector3",
            LinkEndType::Reflector4 => "reflector4",
            LinkEndType::Receiver => "receiver",
            LinkEndType::ObservedBody => "observed body",
        };
        f.write_str(name)
    }
}

/// Identifier of a link end: a body and an optional reference point on it
/// (empty `station` for the body center).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkEndId {
    pub body: String,
    pub station: String,
}

impl LinkEndId {
    pub fn new(body: impl Into<String>, station: impl Into<String>) -> Self {
        LinkEndId {
            body: body.into(),
            station: station.into(),
        }
    }
}

impl<B: Into<String>, S: Into<String>> From<(B, S)> for LinkEndId {
    fn from((body, station): (B, S)) -> Self {
        LinkEndId::new(body, station)
    }
}

impl fmt::Display for LinkEndId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.station.is_empty() {
            write!(f, "{}", self.body)
        } else {
            write!(f, "{}/{}", self.body, self.station)
        }
    }
}

/// Participants of one observation series, keyed by their role.
///
/// Two `LinkEnds` compare lexicographically over their `(role, id)` pairs, which gives the
/// canonical inner ordering of an observation set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkEnds(BTreeMap<LinkEndType, LinkEndId>);

impl LinkEnds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of a link end.
    pub fn with(mut self, role: LinkEndType, id: impl Into<LinkEndId>) -> Self {
        self.0.insert(role, id.into());
        self
    }

    pub fn insert(&mut self, role: LinkEndType, id: impl Into<LinkEndId>) -> Option<LinkEndId> {
        self.0.insert(role, id.into())
    }

    pub fn get(&self, role: LinkEndType) -> Option<&LinkEndId> {
        self.0.get(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkEndType, &LinkEndId)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(LinkEndType, LinkEndId)> for LinkEnds {
    fn from_iter<I: IntoIterator<Item = (LinkEndType, LinkEndId)>>(iter: I) -> Self {
        LinkEnds(iter.into_iter().collect())
    }
}

impl fmt::Display for LinkEnds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (role, id)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{role}: {id}")?;
        }
        Ok(())
    }
}

/// One observation series: values, their time tags, and the link end whose clock
/// defines the time tags.
///
/// Invariant: `values.len() == times.len()`, enforced by every constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    values: ObservationVector,
    times: Vec<TimeTag>,
    reference_link_end: LinkEndType,
}

impl ObservationRecord {
    /// Create a new observation record.
    ///
    /// Arguments
    /// -----------------
    /// * `values`: observed values, in time-tag order.
    /// * `times`: time tags (seconds past J2000 TT), one per value.
    /// * `reference_link_end`: role of the link end at which the time tags are defined.
    ///
    /// Return
    /// ----------
    /// * The record, or [`OdfitError::ObservationTimeLengthMismatch`] if the lengths differ.
    pub fn new(
        values: ObservationVector,
        times: Vec<TimeTag>,
        reference_link_end: LinkEndType,
    ) -> Result<Self, OdfitError> {
        if values.len() != times.len() {
            return Err(OdfitError::ObservationTimeLengthMismatch {
                values: values.len(),
                times: times.len(),
            });
        }
        Ok(ObservationRecord {
            values,
            times,
            reference_link_end,
        })
    }

    /// Build a record from `(time, value)` pairs given in any order.
    ///
    /// The pairs are sorted by time tag before splitting them into the parallel
    /// value/time sequences.
    pub fn from_time_series(
        series: impl IntoIterator<Item = (TimeTag, f64)>,
        reference_link_end: LinkEndType,
    ) -> Self {
        let mut series: Vec<(TimeTag, f64)> = series.into_iter().collect();
        series.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (times, values): (Vec<TimeTag>, Vec<f64>) = series.into_iter().unzip();
        ObservationRecord {
            values: DVector::from_vec(values),
            times,
            reference_link_end,
        }
    }

    /// Build a record whose time tags are given as [`Epoch`]s.
    ///
    /// Epochs are converted to seconds past J2000 in the TT time scale.
    pub fn from_epochs(
        values: ObservationVector,
        epochs: &[Epoch],
        reference_link_end: LinkEndType,
    ) -> Result<Self, OdfitError> {
        let times = epochs
            .iter()
            .map(|epoch| (epoch.to_mjd_tt_days() - T2000) * SECONDS_PER_DAY)
            .collect();
        Self::new(values, times, reference_link_end)
    }

    pub fn values(&self) -> &ObservationVector {
        &self.values
    }

    pub fn times(&self) -> &[TimeTag] {
        &self.times
    }

    /// Time tags converted back to TT [`Epoch`]s.
    pub fn epochs(&self) -> Vec<Epoch> {
        self.times
            .iter()
            .map(|t| Epoch::from_mjd_in_time_scale(T2000 + t / SECONDS_PER_DAY, TimeScale::TT))
            .collect()
    }

    pub fn reference_link_end(&self) -> LinkEndType {
        self.reference_link_end
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
