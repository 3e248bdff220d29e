//! # Constants and type definitions for odfit
//!
//! This module centralizes the **time constants**, **convergence defaults**, and **common type
//! aliases** used throughout the estimation core.
//!
//! ## Overview
//!
//! - Time conversions used for observation time tags (seconds past J2000 TT)
//! - Default values of the convergence checker
//! - Type aliases for parameter, observation and state vectors
//!
//! These definitions are shared by the observation containers, the dynamics boundary and
//! the estimation loop.

use nalgebra::{DMatrix, DVector};

// -------------------------------------------------------------------------------------------------
// Time constants
// -------------------------------------------------------------------------------------------------

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// MJD epoch of J2000.0 (2000-01-01 12:00:00 TT)
pub const T2000: f64 = 51544.5;

// -------------------------------------------------------------------------------------------------
// Convergence defaults
// -------------------------------------------------------------------------------------------------

/// Default maximum number of estimation iterations
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Default minimum change of the RMS residual between two iterations
pub const DEFAULT_MIN_RESIDUAL_CHANGE: f64 = 0.0;

/// Default RMS residual below which the estimation is converged
pub const DEFAULT_MIN_RESIDUAL: f64 = 1.0e-20;

/// Default number of iterations tolerated without improvement
pub const DEFAULT_NO_IMPROVEMENT_WINDOW: usize = 2;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Observation time tag, in seconds past J2000 (TT)
pub type TimeTag = f64;

/// Vector of all estimated parameters
pub type ParameterVector = DVector<f64>;

/// Vector of observation values, residuals or weights
pub type ObservationVector = DVector<f64>;

/// Matrix of observation partials w.r.t. the parameter vector
pub type PartialsMatrix = DMatrix<f64>;

/// Time-ordered numerical solution of a single propagation arc
pub type StateHistory = Vec<(TimeTag, DVector<f64>)>;
