use jogwheel::controller::{decode_step, encode_step};
use jogwheel::jog::estimator::{
    speed_factor, ExponentialRateEstimator, RateEstimator, WindowedTickCounter, ROLLING_WINDOW,
};
use jogwheel::jog::scrub::adjusted_position;
use proptest::prelude::*;
use std::time::{Duration, Instant};

proptest! {
    /// Property: every step the wire can carry survives encode then decode
    #[test]
    fn prop_step_round_trips(step in -63i8..=64i8) {
        prop_assert_eq!(decode_step(encode_step(step)), step);
    }

    /// Property: the lower half of the range decodes to itself, the upper half wraps
    #[test]
    fn prop_decode_matches_wrap_rule(value in 0u8..=127u8) {
        let step = decode_step(value);
        if value <= 64 {
            prop_assert_eq!(i16::from(step), i16::from(value));
        } else {
            prop_assert_eq!(i16::from(step), i16::from(value) - 128);
        }
    }

    /// Property: speed factor is monotone in the tick count and stays in [1, max]
    #[test]
    fn prop_speed_factor_monotone_and_bounded(
        ticks in 0u32..10_000,
        max_gain in 1.0f64..10.0
    ) {
        let factor = speed_factor(ticks, max_gain);
        prop_assert!(factor >= 1.0);
        prop_assert!(factor <= max_gain);
        prop_assert!(speed_factor(ticks + 1, max_gain) >= factor);
    }

    /// Property: inside one burst the windowed factor never drops
    #[test]
    fn prop_windowed_factor_non_decreasing_within_window(
        gaps in prop::collection::vec(0u64..=150, 1..60),
        max_gain in 1.0f64..6.0
    ) {
        let t0 = Instant::now();
        let mut counter = WindowedTickCounter::new(max_gain);
        let mut now = t0;
        let mut previous = counter.observe(now);
        for gap in gaps {
            now += Duration::from_millis(gap);
            let sample = counter.observe(now);
            prop_assert_eq!(sample.tick_count, previous.tick_count + 1);
            prop_assert!(sample.speed_factor >= previous.speed_factor);
            prop_assert!(sample.speed_factor <= max_gain);
            previous = sample;
        }
    }

    /// Property: any gap longer than the window restarts the count at one
    #[test]
    fn prop_long_gap_resets_to_one(
        burst in 1usize..30,
        extra in 1u64..10_000
    ) {
        let t0 = Instant::now();
        let mut counter = WindowedTickCounter::new(5.0);
        let mut now = t0;
        for _ in 0..burst {
            counter.observe(now);
            now += Duration::from_millis(5);
        }
        let sample = counter.observe(now + ROLLING_WINDOW + Duration::from_millis(extra));
        prop_assert_eq!(sample.tick_count, 1);
    }

    /// Property: the adjusted position always lands in [0, 1]
    #[test]
    fn prop_position_stays_in_unit_range(
        position in -2.0f64..3.0,
        step in -63i8..=64i8,
        scaling in 1.0f64..10.0,
        gain in 0.0f64..1.0
    ) {
        let moved = adjusted_position(position, step, scaling, gain);
        prop_assert!((0.0..=1.0).contains(&moved));
    }

    /// Property: inside one burst the exponential factor never drops, whatever the gaps
    #[test]
    fn prop_exponential_factor_non_decreasing_within_window(
        gaps in prop::collection::vec(0u64..=150, 1..60),
        max_gain in 1.0f64..10.0
    ) {
        let t0 = Instant::now();
        let mut estimator = ExponentialRateEstimator::new(max_gain);
        let mut now = t0;
        let mut previous = estimator.observe(now);
        for gap in gaps {
            now += Duration::from_millis(gap);
            let sample = estimator.observe(now);
            prop_assert_eq!(sample.tick_count, previous.tick_count + 1);
            prop_assert!(sample.speed_factor >= previous.speed_factor);
            prop_assert!(sample.speed_factor <= max_gain);
            prop_assert!(sample.speed_factor >= 1.0);
            previous = sample;
        }
    }
}
