//! Tick-rate estimation
//!
//! Turns the arrival times of single encoder steps into a dimensionless speed
//! factor used as a dynamic gain. Two policies sit behind [`RateEstimator`]:
//!
//! - [`WindowedTickCounter`] counts ticks since the last silence gap longer than
//!   [`ROLLING_WINDOW`]. It never decays, so rocking back and forth inside the
//!   window keeps raising the factor.
//! - [`ExponentialRateEstimator`] smooths the instantaneous tick rate with an
//!   exponential moving average and converts it to the tick count a window of
//!   that rate would hold. The factor is held at its burst peak, so a slowing
//!   cadence inside a burst never lowers it.
//!
//! Both return factors in `[1, max_gain]`, non-decreasing within a burst.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Silence longer than this starts a new motion burst
pub const ROLLING_WINDOW: Duration = Duration::from_millis(150);

/// Ticks per +1.0 of speed factor
pub const TICKS_PER_GAIN_STEP: f64 = 10.0;

/// What an estimator reports for one observed tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateSample {
    /// Ticks in the current burst, including this one
    pub tick_count: u32,
    pub speed_factor: f64,
}

/// Per-deck rate estimator.
pub trait RateEstimator: Send + fmt::Debug {
    /// Records one tick at `now` and returns the updated sample.
    fn observe(&mut self, now: Instant) -> RateSample;

    fn velocity(&self) -> &DeviceVelocityState;
}

/// Which estimator a deck uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorKind {
    #[default]
    Windowed,
    Exponential,
}

impl EstimatorKind {
    pub fn build(self, max_gain: f64) -> Box<dyn RateEstimator> {
        match self {
            EstimatorKind::Windowed => Box::new(WindowedTickCounter::new(max_gain)),
            EstimatorKind::Exponential => Box::new(ExponentialRateEstimator::new(max_gain)),
        }
    }
}

/// Rolling tick counter for one deck.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceVelocityState {
    pub last_event: Option<Instant>,
    pub tick_count: u32,
}

impl DeviceVelocityState {
    /// Applies the window rule for a tick at `now` and returns the new count.
    ///
    /// A deck that has never seen a tick behaves as if the gap were infinite.
    pub fn record(&mut self, now: Instant) -> u32 {
        let expired = match self.last_event {
            Some(last) => now.saturating_duration_since(last) > ROLLING_WINDOW,
            None => true,
        };
        if expired {
            self.tick_count = 0;
        }
        self.tick_count = self.tick_count.saturating_add(1);
        self.last_event = Some(now);
        self.tick_count
    }
}

/// `min(1 + ticks / 10, max_gain)`, never below 1.
pub fn speed_factor(tick_count: u32, max_gain: f64) -> f64 {
    (1.0 + f64::from(tick_count) / TICKS_PER_GAIN_STEP).min(max_gain.max(1.0))
}

#[derive(Clone, Debug)]
pub struct WindowedTickCounter {
    state: DeviceVelocityState,
    max_gain: f64,
}

impl WindowedTickCounter {
    pub fn new(max_gain: f64) -> Self {
        Self {
            state: DeviceVelocityState::default(),
            max_gain,
        }
    }
}

impl RateEstimator for WindowedTickCounter {
    fn observe(&mut self, now: Instant) -> RateSample {
        let tick_count = self.state.record(now);
        RateSample {
            tick_count,
            speed_factor: speed_factor(tick_count, self.max_gain),
        }
    }

    fn velocity(&self) -> &DeviceVelocityState {
        &self.state
    }
}

/// Smoothing weight for the newest interval
const EMA_WEIGHT: f64 = 0.75;

/// Intervals shorter than this are treated as this long
const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Clone, Debug)]
pub struct ExponentialRateEstimator {
    state: DeviceVelocityState,
    // ticks per second
    rate_ema: f64,
    // highest factor handed out in the current burst
    peak: f64,
    max_gain: f64,
}

impl ExponentialRateEstimator {
    pub fn new(max_gain: f64) -> Self {
        Self {
            state: DeviceVelocityState::default(),
            rate_ema: 0.0,
            peak: 1.0,
            max_gain,
        }
    }

    pub fn rate_hz(&self) -> f64 {
        self.rate_ema
    }
}

impl RateEstimator for ExponentialRateEstimator {
    fn observe(&mut self, now: Instant) -> RateSample {
        let previous = self.state.last_event;
        let tick_count = self.state.record(now);

        if tick_count == 1 {
            self.rate_ema = 0.0;
            self.peak = 1.0;
        } else if let Some(last) = previous {
            let interval = now.saturating_duration_since(last).max(MIN_INTERVAL);
            let instantaneous = 1.0 / interval.as_secs_f64();
            self.rate_ema = if self.rate_ema == 0.0 {
                instantaneous
            } else {
                EMA_WEIGHT * instantaneous + (1.0 - EMA_WEIGHT) * self.rate_ema
            };
        }

        let ticks_per_window = self.rate_ema * ROLLING_WINDOW.as_secs_f64();
        let smoothed =
            (1.0 + ticks_per_window / TICKS_PER_GAIN_STEP).clamp(1.0, self.max_gain.max(1.0));
        self.peak = self.peak.max(smoothed);
        let speed_factor = self.peak;

        RateSample {
            tick_count,
            speed_factor,
        }
    }

    fn velocity(&self) -> &DeviceVelocityState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_tick_starts_a_burst() {
        let mut counter = WindowedTickCounter::new(5.0);
        let sample = counter.observe(Instant::now());
        assert_eq!(sample.tick_count, 1);
        assert!((sample.speed_factor - 1.1).abs() < 1e-9);
    }

    #[test]
    fn ticks_inside_window_accumulate() {
        let t0 = Instant::now();
        let mut counter = WindowedTickCounter::new(5.0);
        for i in 0..5 {
            counter.observe(t0 + ms(i * 100));
        }
        assert_eq!(counter.velocity().tick_count, 5);
    }

    #[test]
    fn silence_resets_to_one() {
        let t0 = Instant::now();
        let mut counter = WindowedTickCounter::new(5.0);
        counter.observe(t0);
        counter.observe(t0 + ms(10));
        counter.observe(t0 + ms(20));
        let sample = counter.observe(t0 + ms(171));
        assert_eq!(sample.tick_count, 1);
    }

    #[test]
    fn gap_of_exactly_the_window_does_not_reset() {
        let t0 = Instant::now();
        let mut counter = WindowedTickCounter::new(5.0);
        counter.observe(t0);
        let sample = counter.observe(t0 + ROLLING_WINDOW);
        assert_eq!(sample.tick_count, 2);
    }

    #[test]
    fn factor_saturates_at_max_gain() {
        assert_eq!(speed_factor(100, 1.25), 1.25);
        assert_eq!(speed_factor(100, 5.0), 5.0);
        assert!((speed_factor(20, 5.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn factor_never_below_one() {
        assert_eq!(speed_factor(0, 0.5), 1.0);
        assert_eq!(speed_factor(3, 0.5), 1.0);
    }

    #[test]
    fn exponential_tracks_cadence() {
        let t0 = Instant::now();
        let mut estimator = ExponentialRateEstimator::new(5.0);
        let first = estimator.observe(t0);
        assert_eq!(first.speed_factor, 1.0);

        // 10 ms cadence is 100 Hz, 15 ticks per window, factor 2.5
        let mut last = first;
        for i in 1..10 {
            last = estimator.observe(t0 + ms(i * 10));
        }
        assert!((estimator.rate_hz() - 100.0).abs() < 1e-6);
        assert!((last.speed_factor - 2.5).abs() < 1e-6);
        assert_eq!(last.tick_count, 10);
    }

    #[test]
    fn exponential_resets_after_silence() {
        let t0 = Instant::now();
        let mut estimator = ExponentialRateEstimator::new(5.0);
        estimator.observe(t0);
        estimator.observe(t0 + ms(5));
        let sample = estimator.observe(t0 + ms(400));
        assert_eq!(sample.tick_count, 1);
        assert_eq!(sample.speed_factor, 1.0);
        assert_eq!(estimator.rate_hz(), 0.0);
    }

    #[test]
    fn exponential_holds_peak_when_cadence_slows() {
        let t0 = Instant::now();
        let mut estimator = ExponentialRateEstimator::new(10.0);
        estimator.observe(t0);
        let fast = estimator.observe(t0 + ms(10));
        let slow = estimator.observe(t0 + ms(160));

        assert_eq!(slow.tick_count, 3);
        assert!((fast.speed_factor - 2.5).abs() < 1e-6);
        assert_eq!(slow.speed_factor, fast.speed_factor);
        assert!(estimator.rate_hz() < 100.0);
    }

    #[test]
    fn exponential_peak_resets_with_burst() {
        let t0 = Instant::now();
        let mut estimator = ExponentialRateEstimator::new(10.0);
        estimator.observe(t0);
        estimator.observe(t0 + ms(10));
        let sample = estimator.observe(t0 + ms(200));
        assert_eq!(sample.tick_count, 1);
        assert_eq!(sample.speed_factor, 1.0);
    }

    #[test]
    fn exponential_respects_max_gain() {
        let t0 = Instant::now();
        let mut estimator = ExponentialRateEstimator::new(1.25);
        let mut sample = estimator.observe(t0);
        for i in 1..20 {
            sample = estimator.observe(t0 + ms(i));
        }
        assert_eq!(sample.speed_factor, 1.25);
    }
}
