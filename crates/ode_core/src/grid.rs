use crate::error::{Error, Result};
use crate::traits::{lit, Scalar};
use log::{debug, warn};

/// Relative slack on `(tf - t0) / h` so that an exact division spoiled by
/// rounding (e.g. `1.0 / 0.1`) does not add a step past `tf`.
const STEP_COUNT_TOLERANCE: f64 = 1e-9;
/// The final grid point may fall short of `tf` by at most this many ulps of
/// the interval bounds.
const REACH_ULPS: f64 = 4.0;

/// Uniform time grid `t_i = t0 + i*h`, `i = 0..=steps`, reaching at least `tf`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid<T> {
    pub t0: T,
    pub tf: T,
    pub h: T,
    pub steps: usize,
}

impl<T: Scalar> Grid<T> {
    pub fn new(t0: T, tf: T, h: T, max_steps: usize) -> Result<Self> {
        if !t0.is_finite() || !tf.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "interval bounds must be finite (t0 = {t0:?}, tf = {tf:?})"
            )));
        }
        if !h.is_finite() || h <= T::zero() {
            return Err(Error::InvalidParameter(format!(
                "step size h must be positive and finite (got {h:?})"
            )));
        }
        if tf < t0 {
            return Err(Error::InvalidParameter(format!(
                "tf must not precede t0 (t0 = {t0:?}, tf = {tf:?})"
            )));
        }

        let ratio = (tf - t0) / h;
        let slack = lit::<T>(STEP_COUNT_TOLERANCE) * ratio.max(T::one());
        let reach = tf - lit::<T>(REACH_ULPS) * T::epsilon() * tf.abs().max(t0.abs());
        let mut steps = (ratio - slack).ceil().max(T::zero());
        if t0 + steps * h < reach {
            steps = ratio.ceil();
        }
        if t0 + steps * h < reach {
            steps = steps + T::one();
        }
        let steps = steps
            .to_usize()
            .filter(|&n| n <= max_steps)
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "grid from {t0:?} to {tf:?} with h = {h:?} needs {steps:?} steps, more than the limit of {max_steps}"
                ))
            })?;

        let grid = Self { t0, tf, h, steps };
        debug!("grid t0 = {t0:?}, tf = {tf:?}, h = {h:?}: {steps} steps");
        if grid.overshoot() > h * lit(STEP_COUNT_TOLERANCE) {
            warn!(
                "final grid point {:?} lies past tf = {:?}; the result is reported at the final grid point",
                grid.final_time(),
                tf
            );
        }
        Ok(grid)
    }

    /// Number of grid points, both ends included.
    pub fn points(&self) -> usize {
        self.steps + 1
    }

    pub fn time_at(&self, i: usize) -> T {
        self.t0 + lit::<T>(i as f64) * self.h
    }

    pub fn final_time(&self) -> T {
        self.time_at(self.steps)
    }

    /// How far the final grid point lies beyond `tf` (zero when it lands on it).
    pub fn overshoot(&self) -> T {
        (self.final_time() - self.tf).max(T::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_divisions_do_not_gain_a_step() {
        let grid = Grid::<f64>::new(0.0, 1.0, 0.1, usize::MAX).expect("grid");
        assert_eq!(grid.steps, 10);
        assert_eq!(grid.points(), 11);
        assert!((grid.final_time() - 1.0).abs() < 1e-12);

        let grid = Grid::<f64>::new(0.0, 0.7, 0.1, usize::MAX).expect("grid");
        assert_eq!(grid.steps, 7);
        let grid = Grid::<f64>::new(0.0, 1.0, 1e-3, usize::MAX).expect("grid");
        assert_eq!(grid.steps, 1000);
    }

    #[test]
    fn inexact_divisions_overshoot_tf() {
        let grid = Grid::<f64>::new(0.0, 1.0, 0.3, usize::MAX).expect("grid");
        assert_eq!(grid.steps, 4);
        assert!((grid.final_time() - 1.2).abs() < 1e-12);
        assert!((grid.overshoot() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn long_grids_never_stop_short_of_tf() {
        let tf = 1.0 + 5e-10;
        let grid = Grid::<f64>::new(0.0, tf, 1e-7, usize::MAX).expect("grid");
        assert_eq!(grid.steps, 10_000_001);
        assert!(grid.final_time() >= tf);
        assert!(grid.time_at(grid.steps - 1) < tf);

        let grid = Grid::<f64>::new(0.0, 1e4 + 1e-6, 1e-6, usize::MAX).expect("grid");
        assert!(grid.final_time() >= 1e4 + 1e-6 - 4.0 * f64::EPSILON * 1e4);
    }

    #[test]
    fn step_larger_than_interval_gives_two_points() {
        let grid = Grid::<f64>::new(0.0, 0.5, 2.0, usize::MAX).expect("grid");
        assert_eq!(grid.points(), 2);
        assert_eq!(grid.final_time(), 2.0);
    }

    #[test]
    fn empty_interval_has_no_steps() {
        let grid = Grid::<f64>::new(1.0, 1.0, 0.1, usize::MAX).expect("grid");
        assert_eq!(grid.steps, 0);
        assert_eq!(grid.final_time(), 1.0);
    }

    #[test]
    fn rejects_invalid_parameters() {
        for (t0, tf, h) in [
            (0.0, 1.0, 0.0),
            (0.0, 1.0, -0.1),
            (1.0, 0.0, 0.1),
            (0.0, f64::INFINITY, 0.1),
            (f64::NAN, 1.0, 0.1),
            (0.0, 1.0, f64::NAN),
        ] {
            let err = Grid::<f64>::new(t0, tf, h, usize::MAX).expect_err("should be rejected");
            assert!(matches!(err, Error::InvalidParameter(_)), "{err}");
        }
    }

    #[test]
    fn enforces_step_limit() {
        let err = Grid::<f64>::new(0.0, 1.0, 1e-6, 1000).expect_err("too many steps");
        assert!(err.to_string().contains("limit of 1000"), "{err}");
        assert!(Grid::<f64>::new(0.0, 1.0, 1e-3, 1000).is_ok());
    }
}
