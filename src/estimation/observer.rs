//! # Estimation observers
//!
//! The estimation loop never prints. It reports its progress to an [`EstimationObserver`]
//! at fixed points:
//!
//! 1. [`on_estimation_start`](EstimationObserver::on_estimation_start) once, with the
//!    observation summary,
//! 2. per iteration: [`on_iteration_start`](EstimationObserver::on_iteration_start),
//!    [`on_residuals_computed`](EstimationObserver::on_residuals_computed) and
//!    [`on_convergence_decision`](EstimationObserver::on_convergence_decision),
//! 3. [`on_estimation_finished`](EstimationObserver::on_estimation_finished) once, with the
//!    output.
//!
//! Implementations:
//!
//! * [`SilentObserver`] – ignores everything,
//! * [`LogObserver`] – writes through the [`log`] facade, with per-iteration timing,
//! * [`ProgressObserver`] – draws an `indicatif` progress bar (feature `progress`).
use log::{debug, info, warn};

use crate::{
    constants::ParameterVector,
    estimation::{
        convergence::{ConvergenceChecker, TerminationReason},
        estimation_output::EstimationOutput,
        iter_timer::{fmt_duration, IterTimer},
    },
    observations::aggregation::ObservationSummary,
};

/// What one iteration produced, reported after the correction is applied.
#[derive(Debug, Clone, Copy)]
pub struct IterationReport<'a> {
    pub iteration: usize,
    pub observation_count: usize,
    pub rms: f64,
    /// Lowest RMS of the previous iterations (infinite on the first one).
    pub previous_best_rms: f64,
    /// Correction in physical units.
    pub correction: &'a ParameterVector,
    pub parameter_estimate: &'a ParameterVector,
}

impl IterationReport<'_> {
    pub fn is_improvement(&self) -> bool {
        self.rms < self.previous_best_rms
    }
}

/// Receives progress notifications from the estimation loop. Every method defaults to a
/// no-op.
pub trait EstimationObserver {
    fn on_estimation_start(
        &mut self,
        _summary: &ObservationSummary,
        _parameter_size: usize,
        _checker: &ConvergenceChecker,
    ) {
    }

    fn on_iteration_start(&mut self, _iteration: usize) {}

    fn on_residuals_computed(&mut self, _report: &IterationReport<'_>) {}

    fn on_convergence_decision(&mut self, _iteration_count: usize, _reasons: &[TerminationReason]) {
    }

    fn on_estimation_finished(&mut self, _output: &EstimationOutput) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl EstimationObserver for SilentObserver {}

/// Logs every step of the estimation at `info` level.
#[derive(Debug, Default)]
pub struct LogObserver {
    timer: IterTimer,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EstimationObserver for LogObserver {
    fn on_estimation_start(
        &mut self,
        summary: &ObservationSummary,
        parameter_size: usize,
        checker: &ConvergenceChecker,
    ) {
        info!(
            "Starting estimation of {parameter_size} parameters from {} observations ({summary})",
            summary.total
        );
        debug!("Convergence settings: {checker}");
    }

    fn on_iteration_start(&mut self, iteration: usize) {
        self.timer.restart_lap();
        info!("Iteration {iteration}: computing residuals and partials");
    }

    fn on_residuals_computed(&mut self, report: &IterationReport<'_>) {
        let dt = self.timer.lap();
        info!(
            "Iteration {}: RMS residual {:.6e} over {} observations (took {}, avg {})",
            report.iteration,
            report.rms,
            report.observation_count,
            fmt_duration(dt),
            fmt_duration(self.timer.average())
        );
        if !report.is_improvement() && report.previous_best_rms.is_finite() {
            warn!(
                "Iteration {}: RMS residual {:.6e} did not improve on {:.6e}",
                report.iteration, report.rms, report.previous_best_rms
            );
        }
        debug!(
            "Iteration {}: parameter update {}",
            report.iteration,
            report.correction.transpose()
        );
    }

    fn on_convergence_decision(&mut self, iteration_count: usize, reasons: &[TerminationReason]) {
        for reason in reasons {
            info!("Estimation stops after {iteration_count} iterations: {reason}");
        }
    }

    fn on_estimation_finished(&mut self, output: &EstimationOutput) {
        info!(
            "Final residual: {:.6e} (iteration {}, total time {})",
            output.best_rms(),
            output.best_iteration(),
            fmt_duration(self.timer.elapsed())
        );
    }
}

#[cfg(feature = "progress")]
pub use progress::ProgressObserver;

#[cfg(feature = "progress")]
mod progress {
    use std::time::Duration;

    use indicatif::{ProgressBar, ProgressStyle};

    use super::{EstimationObserver, IterationReport};
    use crate::estimation::{
        convergence::{ConvergenceChecker, TerminationReason},
        estimation_output::EstimationOutput,
        iter_timer::{fmt_duration, IterTimer},
    };
    use crate::observations::aggregation::ObservationSummary;

    /// Progress bar over the maximum number of iterations.
    pub struct ProgressObserver {
        bar: ProgressBar,
        timer: IterTimer,
    }

    impl ProgressObserver {
        pub fn new() -> Self {
            ProgressObserver {
                bar: ProgressBar::hidden(),
                timer: IterTimer::new(0.2),
            }
        }
    }

    impl Default for ProgressObserver {
        fn default() -> Self {
            Self::new()
        }
    }

    impl EstimationObserver for ProgressObserver {
        fn on_estimation_start(
            &mut self,
            summary: &ObservationSummary,
            _parameter_size: usize,
            checker: &ConvergenceChecker,
        ) {
            let bar = ProgressBar::new(checker.max_iterations.max(1) as u64);
            let style = ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} iterations | {elapsed_precise} | {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(200));
            bar.set_message(format!("{} observations", summary.total));
            self.bar = bar;
        }

        fn on_iteration_start(&mut self, _iteration: usize) {
            self.timer.restart_lap();
        }

        fn on_residuals_computed(&mut self, report: &IterationReport<'_>) {
            let last = self.timer.lap();
            self.bar.set_message(format!(
                "rms: {:.3e}, last: {}, avg: {}",
                report.rms,
                fmt_duration(last),
                fmt_duration(self.timer.average())
            ));
            self.bar.inc(1);
        }

        fn on_convergence_decision(&mut self, _iteration_count: usize, reasons: &[TerminationReason]) {
            if let Some(reason) = reasons.first() {
                self.bar.set_message(reason.to_string());
            }
        }

        fn on_estimation_finished(&mut self, output: &EstimationOutput) {
            self.bar
                .finish_with_message(format!("best rms: {:.3e}", output.best_rms()));
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::observations::observable_map::ObservationSet;
        use nalgebra::DVector;

        #[test]
        fn test_bar_follows_iterations() {
            let summary = ObservationSummary::from_observations(&ObservationSet::new());
            let checker = ConvergenceChecker::builder().max_iterations(7).build().unwrap();
            let dx = DVector::from_vec(vec![0.1, 0.2]);

            let mut observer = ProgressObserver::new();
            observer.on_estimation_start(&summary, 2, &checker);
            assert_eq!(observer.bar.length(), Some(7));

            for iteration in 0..3 {
                observer.on_iteration_start(iteration);
                observer.on_residuals_computed(&IterationReport {
                    iteration,
                    observation_count: 0,
                    rms: 1.0 / (iteration + 1) as f64,
                    previous_best_rms: f64::INFINITY,
                    correction: &dx,
                    parameter_estimate: &dx,
                });
            }
            observer.on_convergence_decision(3, &[TerminationReason::MaximumIterations]);

            assert_eq!(observer.bar.position(), 3);
            assert_eq!(observer.timer.laps(), 3);
            assert_eq!(
                observer.bar.message(),
                TerminationReason::MaximumIterations.to_string()
            );
            observer.bar.finish_and_clear();
        }
    }
}
