//! # Iterative weighted least-squares estimation
//!
//! Components, from the leaves to the root:
//!
//! * [`convergence`] – termination policy over the RMS history,
//! * [`residuals`] – residual vector and partials matrix from the observation managers,
//! * [`normalization`] – column scaling of the partials and of the a-priori information,
//! * [`least_squares`] – solution of the regularized normal equations,
//! * [`manager`] – the estimation loop and best-iterate tracking,
//!
//! plus the input/output types ([`estimation_input`], [`estimation_output`]) and the
//! progress observers ([`observer`]).
pub mod convergence;
pub mod estimation_input;
pub mod estimation_output;
pub mod iter_timer;
pub mod least_squares;
pub mod manager;
pub mod normalization;
pub mod observer;
pub mod residuals;
