//! Fixed-step RK4 entry points for the three problem shapes.
//!
//! Each entry point walks the uniform grid from `t0` with step `h` until the
//! last grid point at or past `tf`, keeping only the current state, and
//! returns the final state together with the time it belongs to.

use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::solvers::RK4;
use crate::systems::{FirstOrder, Planar, SecondOrder};
use crate::traits::{DynamicalSystem, Rhs, Scalar, Steppable};
use log::info;
use serde::{Deserialize, Serialize};

/// Default bound on the number of steps of a single run.
pub const DEFAULT_MAX_STEPS: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Grids needing more steps than this are rejected up front.
    pub max_steps: usize,
    /// Abort with `Error::NumericDivergence` once the state stops being finite.
    pub check_finite: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            check_finite: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FirstOrderSolution<T> {
    /// Time of the final grid point (may lie past `tf`).
    pub t: T,
    pub y: T,
    pub steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondOrderSolution<T> {
    pub t: T,
    pub y: T,
    pub dy: T,
    pub steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemSolution<T> {
    pub t: T,
    pub x: T,
    pub y: T,
    pub steps: usize,
}

/// RK4 driver carrying the run options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rk4Driver {
    pub options: SolveOptions,
}

impl Rk4Driver {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }

    /// Solves `y' = f(t, y)`, `y(t0) = y0`.
    pub fn first_order<T: Scalar>(
        &self,
        f: &impl Rhs<T, 2>,
        t0: T,
        y0: T,
        tf: T,
        h: T,
    ) -> Result<FirstOrderSolution<T>> {
        let mut state = [y0];
        let (t, steps) = self.integrate(&FirstOrder::new(f), t0, tf, h, &mut state)?;
        Ok(FirstOrderSolution {
            t,
            y: state[0],
            steps,
        })
    }

    /// Solves `y'' = f(t, y, dy)`, `y(t0) = y0`, `y'(t0) = dy0`.
    pub fn second_order<T: Scalar>(
        &self,
        accel: &impl Rhs<T, 3>,
        t0: T,
        y0: T,
        dy0: T,
        tf: T,
        h: T,
    ) -> Result<SecondOrderSolution<T>> {
        let mut state = [y0, dy0];
        let (t, steps) = self.integrate(&SecondOrder::new(accel), t0, tf, h, &mut state)?;
        Ok(SecondOrderSolution {
            t,
            y: state[0],
            dy: state[1],
            steps,
        })
    }

    /// Solves `x' = f1(t, x, y)`, `y' = f2(t, x, y)` from `(x0, y0)`.
    #[allow(clippy::too_many_arguments)]
    pub fn system<T: Scalar>(
        &self,
        f1: &impl Rhs<T, 3>,
        f2: &impl Rhs<T, 3>,
        t0: T,
        x0: T,
        y0: T,
        tf: T,
        h: T,
    ) -> Result<SystemSolution<T>> {
        let mut state = [x0, y0];
        let (t, steps) = self.integrate(&Planar::new(f1, f2), t0, tf, h, &mut state)?;
        Ok(SystemSolution {
            t,
            x: state[0],
            y: state[1],
            steps,
        })
    }

    /// Advances `state` over the grid in place; returns the final grid time
    /// and the number of steps taken.
    fn integrate<T: Scalar>(
        &self,
        system: &impl DynamicalSystem<T>,
        t0: T,
        tf: T,
        h: T,
        state: &mut [T],
    ) -> Result<(T, usize)> {
        if let Some(bad) = state.iter().find(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "initial values must be finite (got {bad:?})"
            )));
        }
        let grid = Grid::new(t0, tf, h, self.options.max_steps)?;
        info!(
            "RK4 over [{t0:?}, {tf:?}] with h = {h:?}: {} steps, dimension {}",
            grid.steps,
            system.dimension()
        );

        let mut solver = RK4::new(system.dimension());
        for i in 0..grid.steps {
            let mut t = grid.time_at(i);
            solver.step(system, &mut t, state, h)?;
            if self.options.check_finite && state.iter().any(|v| !v.is_finite()) {
                return Err(Error::NumericDivergence {
                    step: i + 1,
                    t: grid.time_at(i + 1).to_f64().unwrap_or(f64::NAN),
                });
            }
        }

        let t_final = grid.final_time();
        info!("RK4 finished at t = {t_final:?}, state = {state:?}");
        Ok((t_final, grid.steps))
    }
}

/// Variant A: `y' = f(t, y)`. Returns the state at the last grid point.
pub fn rk4_first_order<T: Scalar>(
    f: &impl Rhs<T, 2>,
    t0: T,
    y0: T,
    tf: T,
    h: T,
) -> Result<FirstOrderSolution<T>> {
    Rk4Driver::default().first_order(f, t0, y0, tf, h)
}

/// Variant B: `y'' = f(t, y, dy)` as the pair `(y, dy)`.
pub fn rk4_second_order<T: Scalar>(
    accel: &impl Rhs<T, 3>,
    t0: T,
    y0: T,
    dy0: T,
    tf: T,
    h: T,
) -> Result<SecondOrderSolution<T>> {
    Rk4Driver::default().second_order(accel, t0, y0, dy0, tf, h)
}

/// Variant C: the coupled pair `x' = f1(t, x, y)`, `y' = f2(t, x, y)`.
pub fn rk4_system<T: Scalar>(
    f1: &impl Rhs<T, 3>,
    f2: &impl Rhs<T, 3>,
    t0: T,
    x0: T,
    y0: T,
    tf: T,
    h: T,
) -> Result<SystemSolution<T>> {
    Rk4Driver::default().system(f1, f2, t0, x0, y0, tf, h)
}
