//! Cumulative average metric

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::util::units::round_to_precision;

/// Running mean of scalar samples.
///
/// Sum and count live under one lock, so `get_and_reset` always pairs a sum
/// with the count of the same samples even while streams keep adding.
#[derive(Debug, Default)]
pub struct CumulativeAverage {
    state: Mutex<(f64, u64)>,
    precision: Option<u32>,
}

impl CumulativeAverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average whose output is rounded to `precision` decimal places.
    ///
    /// `with_precision(0)` rounds to whole numbers; use [`CumulativeAverage::new`]
    /// for an unrounded mean.
    pub fn with_precision(precision: u32) -> Self {
        Self {
            precision: Some(precision),
            ..Self::default()
        }
    }

    // The state is two plain numbers, so a panic elsewhere cannot leave it half-updated
    fn state(&self) -> MutexGuard<'_, (f64, u64)> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a sample
    pub fn add(&self, value: f64) {
        let mut state = self.state();
        state.0 += value;
        state.1 += 1;
    }

    /// Number of samples added since the last reset
    pub fn count(&self) -> u64 {
        self.state().1
    }

    /// Return the current mean (0 when empty) and clear the accumulator
    pub fn get_and_reset(&self) -> f64 {
        let (sum, count) = std::mem::take(&mut *self.state());

        let mean = if count == 0 { 0.0 } else { sum / count as f64 };

        match self.precision {
            Some(precision) => round_to_precision(mean, precision),
            None => mean,
        }
    }

    pub fn reset(&self) {
        *self.state() = (0.0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_mean_of_samples() {
        let average = CumulativeAverage::new();
        for value in [1.0, 2.0, 3.0, 4.0] {
            average.add(value);
        }

        assert_eq!(average.count(), 4);
        assert_eq!(average.get_and_reset(), 2.5);
    }

    #[test]
    fn test_empty_average_is_zero() {
        let average = CumulativeAverage::new();
        assert_eq!(average.get_and_reset(), 0.0);
    }

    #[test]
    fn test_get_and_reset_starts_fresh_average() {
        let average = CumulativeAverage::new();
        average.add(100.0);
        average.add(200.0);
        assert_eq!(average.get_and_reset(), 150.0);

        assert_eq!(average.count(), 0);
        assert_eq!(average.get_and_reset(), 0.0);

        average.add(7.0);
        assert_eq!(average.get_and_reset(), 7.0);
    }

    #[test]
    fn test_reset() {
        let average = CumulativeAverage::new();
        average.add(42.0);
        average.reset();

        assert_eq!(average.count(), 0);
        assert_eq!(average.get_and_reset(), 0.0);
    }

    #[test]
    fn test_precision() {
        let average = CumulativeAverage::with_precision(2);
        average.add(1.0);
        average.add(1.0);
        average.add(2.0);
        assert_eq!(average.get_and_reset(), 1.33);

        let unrounded = CumulativeAverage::new();
        unrounded.add(1.0);
        unrounded.add(1.0);
        unrounded.add(2.0);
        assert!((unrounded.get_and_reset() - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_concurrent_add() {
        let average = CumulativeAverage::new();

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        average.add(2.0);
                    }
                });
            }
        });

        assert_eq!(average.count(), 8000);
        assert_eq!(average.get_and_reset(), 2.0);
    }

    #[test]
    fn test_get_and_reset_while_adding() {
        let average = CumulativeAverage::new();
        let done = AtomicBool::new(false);
        let mut drained = 0;

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..20_000 {
                        average.add(1.0);
                    }
                });
            }
            scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    average.add(1.0);
                }
            });

            for _ in 0..2_000 {
                let mean = average.get_and_reset();
                assert!(mean == 0.0 || mean == 1.0, "mean mixed two snapshots: {}", mean);
                drained += 1;
            }
            done.store(true, Ordering::Release);
        });

        assert_eq!(drained, 2_000);
        let rest = average.get_and_reset();
        assert!(rest == 0.0 || rest == 1.0);
    }

    #[test]
    fn test_zero_precision_rounds_to_integer() {
        let average = CumulativeAverage::with_precision(0);
        average.add(1.0);
        average.add(2.0);
        assert_eq!(average.get_and_reset(), 2.0);
    }
}
