//! The three supported problem shapes, each viewed as a small first-order
//! system so a single RK4 stepper serves all of them.
//!
//! Each system owns the VM stack its right-hand sides evaluate on, so the
//! four stage evaluations of every step share one allocation.

use crate::error::Result;
use crate::traits::{DynamicalSystem, Rhs, Scalar};
use std::cell::RefCell;

/// `y' = f(t, y)`, state `[y]`.
pub struct FirstOrder<'a, T, F> {
    f: &'a F,
    stack: RefCell<Vec<T>>,
}

impl<'a, T: Scalar, F: Rhs<T, 2>> FirstOrder<'a, T, F> {
    pub fn new(f: &'a F) -> Self {
        Self {
            f,
            stack: RefCell::new(Vec::new()),
        }
    }
}

impl<T: Scalar, F: Rhs<T, 2>> DynamicalSystem<T> for FirstOrder<'_, T, F> {
    fn dimension(&self) -> usize {
        1
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) -> Result<()> {
        let mut stack = self.stack.borrow_mut();
        out[0] = self.f.call_with_stack([t, x[0]], &mut stack)?;
        Ok(())
    }
}

/// `y'' = f(t, y, dy)` reduced to state `[y, dy]`.
///
/// The position component of every stage is the stage-advanced velocity,
/// so only the acceleration law is user supplied.
pub struct SecondOrder<'a, T, F> {
    accel: &'a F,
    stack: RefCell<Vec<T>>,
}

impl<'a, T: Scalar, F: Rhs<T, 3>> SecondOrder<'a, T, F> {
    pub fn new(accel: &'a F) -> Self {
        Self {
            accel,
            stack: RefCell::new(Vec::new()),
        }
    }
}

impl<T: Scalar, F: Rhs<T, 3>> DynamicalSystem<T> for SecondOrder<'_, T, F> {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) -> Result<()> {
        let mut stack = self.stack.borrow_mut();
        out[0] = x[1];
        out[1] = self.accel.call_with_stack([t, x[0], x[1]], &mut stack)?;
        Ok(())
    }
}

/// `x' = f1(t, x, y)`, `y' = f2(t, x, y)`, state `[x, y]`.
///
/// Both right-hand sides see the same stage point.
pub struct Planar<'a, T, F1, F2> {
    f1: &'a F1,
    f2: &'a F2,
    stack: RefCell<Vec<T>>,
}

impl<'a, T: Scalar, F1: Rhs<T, 3>, F2: Rhs<T, 3>> Planar<'a, T, F1, F2> {
    pub fn new(f1: &'a F1, f2: &'a F2) -> Self {
        Self {
            f1,
            f2,
            stack: RefCell::new(Vec::new()),
        }
    }
}

impl<T: Scalar, F1: Rhs<T, 3>, F2: Rhs<T, 3>> DynamicalSystem<T> for Planar<'_, T, F1, F2> {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) -> Result<()> {
        let mut stack = self.stack.borrow_mut();
        let args = [t, x[0], x[1]];
        out[0] = self.f1.call_with_stack(args, &mut stack)?;
        out[1] = self.f2.call_with_stack(args, &mut stack)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::formula::{compile, SECOND_ORDER_VARIABLES, SYSTEM_VARIABLES};

    #[test]
    fn second_order_velocity_component_is_the_state_velocity() {
        let accel = compile("-y", &SECOND_ORDER_VARIABLES).expect("compile");
        let system = SecondOrder::<f64, _>::new(&accel);
        let mut out = [0.0f64; 2];
        system.apply(0.0, &[2.0, 5.0], &mut out).expect("apply");
        assert_eq!(out, [5.0, -2.0]);
    }

    #[test]
    fn planar_system_evaluates_both_sides_at_the_same_point() {
        let seen = RefCell::new(Vec::new());
        let f1 = |t: f64, x: f64, y: f64| -> Result<f64> {
            seen.borrow_mut().push((t, x, y));
            Ok(y)
        };
        let f2 = |t: f64, x: f64, y: f64| -> Result<f64> {
            seen.borrow_mut().push((t, x, y));
            Ok(-x)
        };
        let system = Planar::<f64, _, _>::new(&f1, &f2);
        let mut out = [0.0f64; 2];
        system.apply(0.5, &[1.0, 2.0], &mut out).expect("apply");
        assert_eq!(out, [2.0, -1.0]);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
    }

    #[test]
    fn planar_system_surfaces_rhs_failure() {
        let f1 = compile("1 / x", &SYSTEM_VARIABLES).expect("compile");
        let f2 = compile("y", &SYSTEM_VARIABLES).expect("compile");
        let system = Planar::<f64, _, _>::new(&f1, &f2);
        let mut out = [0.0f64; 2];
        let err = system
            .apply(0.0, &[0.0, 1.0], &mut out)
            .expect_err("division by zero");
        assert!(matches!(err, Error::Evaluation { ref formula, .. } if formula == "1 / x"));
    }

    /// Reports how much scratch space it has been handed so far.
    struct ScratchCounter;

    impl Rhs<f64, 2> for ScratchCounter {
        fn call(&self, _args: [f64; 2]) -> Result<f64> {
            Ok(0.0)
        }

        fn call_with_stack(&self, _args: [f64; 2], stack: &mut Vec<f64>) -> Result<f64> {
            stack.push(1.0);
            Ok(stack.len() as f64)
        }
    }

    #[test]
    fn stage_evaluations_share_one_stack() {
        let system = FirstOrder::<f64, _>::new(&ScratchCounter);
        let mut out = [0.0f64];
        system.apply(0.0, &[0.0], &mut out).expect("apply");
        assert_eq!(out, [1.0]);
        system.apply(0.1, &[0.0], &mut out).expect("apply");
        assert_eq!(out, [2.0]);
    }
}
