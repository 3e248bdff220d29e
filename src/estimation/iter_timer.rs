//! Per-iteration wall-clock timing for the estimation observers.
//!
//! [`IterTimer`] records the duration of each estimation iteration and keeps an
//! exponential moving average (EMA) of it:
//!
//! `ema ← α·dt + (1 − α)·ema`, with `α ∈ (0, 1]`; the first lap initializes the average.
//!
//! [`fmt_duration`] renders durations as `"253µs"`, `"42ms"` or `"3.14s"`.
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct IterTimer {
    started: Instant,
    last: Instant,
    ema_ns: Option<f64>,
    alpha: f64,
    laps: usize,
}

impl IterTimer {
    /// New timer with smoothing factor `alpha`, clamped to `(0, 1]`.
    pub fn new(alpha: f64) -> Self {
        let now = Instant::now();
        IterTimer {
            started: now,
            last: now,
            ema_ns: None,
            alpha: alpha.clamp(f64::MIN_POSITIVE, 1.0),
            laps: 0,
        }
    }

    /// Restart the current lap without recording it.
    pub fn restart_lap(&mut self) {
        self.last = Instant::now();
    }

    /// Close the current lap and return its duration.
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;
        self.record(dt);
        dt
    }

    fn record(&mut self, dt: Duration) {
        let dt_ns = dt.as_nanos() as f64;
        self.ema_ns = Some(match self.ema_ns {
            None => dt_ns,
            Some(ema) => self.alpha * dt_ns + (1.0 - self.alpha) * ema,
        });
        self.laps += 1;
    }

    /// Smoothed lap duration (zero before the first lap).
    pub fn average(&self) -> Duration {
        self.ema_ns
            .map(|ns| Duration::from_nanos(ns as u64))
            .unwrap_or_default()
    }

    pub fn laps(&self) -> usize {
        self.laps
    }

    /// Time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for IterTimer {
    fn default() -> Self {
        IterTimer::new(0.2)
    }
}

#[inline]
pub fn fmt_duration(d: Duration) -> String {
    let us = d.as_micros();
    if us < 1_000 {
        format!("{us}µs")
    } else if d.as_millis() < 1_000 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.2}s", d.as_secs_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_update() {
        let mut timer = IterTimer::new(0.5);
        assert_eq!(timer.average(), Duration::ZERO);

        timer.record(Duration::from_millis(10));
        assert_eq!(timer.average(), Duration::from_millis(10));

        timer.record(Duration::from_millis(20));
        assert_eq!(timer.average(), Duration::from_millis(15));
        assert_eq!(timer.laps(), 2);
    }

    #[test]
    fn test_lap_counts() {
        let mut timer = IterTimer::default();
        timer.restart_lap();
        let dt = timer.lap();
        assert_eq!(timer.laps(), 1);
        assert!(timer.elapsed() >= dt);
    }

    #[test]
    fn test_fmt_duration() {
        assert_eq!(fmt_duration(Duration::from_micros(253)), "253µs");
        assert_eq!(fmt_duration(Duration::from_millis(42)), "42ms");
        assert_eq!(fmt_duration(Duration::from_millis(3140)), "3.14s");
    }
}
