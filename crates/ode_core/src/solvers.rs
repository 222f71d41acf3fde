use crate::error::Result;
use crate::traits::{lit, DynamicalSystem, Scalar, Steppable};

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: &mut T,
        state: &mut [T],
        dt: T,
    ) -> Result<()> {
        let two: T = lit(2.0);
        let six: T = lit(6.0);

        let t0 = *t;
        let half_dt = dt / two;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1)?;

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] / two;
        }
        system.apply(t0 + half_dt, &self.tmp, &mut self.k2)?;

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] / two;
        }
        system.apply(t0 + half_dt, &self.tmp, &mut self.k3)?;

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4)?;

        // y_next = y + dt*(k1 + 2k2 + 2k3 + k4)/6
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]) / six;
        }

        *t = t0 + dt;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) -> Result<()> {
            out[0] = -x[0];
            Ok(())
        }
    }

    struct TimeOnly;

    impl DynamicalSystem<f64> for TimeOnly {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, t: f64, _x: &[f64], out: &mut [f64]) -> Result<()> {
            out[0] = 3.0 * t * t;
            Ok(())
        }
    }

    #[test]
    fn single_step_matches_taylor_polynomial() {
        // For y' = -y one RK4 step multiplies y by 1 - h + h^2/2 - h^3/6 + h^4/24.
        let h = 0.1f64;
        let mut solver = RK4::<f64>::new(1);
        let mut t = 0.0;
        let mut state = [1.0];
        solver.step(&Decay, &mut t, &mut state, h).expect("step");
        let expected = 1.0 - h + h * h / 2.0 - h.powi(3) / 6.0 + h.powi(4) / 24.0;
        assert!((state[0] - expected).abs() < 1e-15);
        assert!((t - h).abs() < 1e-15);
    }

    #[test]
    fn integrates_cubic_quadrature_exactly() {
        // Simpson's rule is exact for y' = 3t^2.
        let mut solver = RK4::<f64>::new(1);
        let mut t = 0.0;
        let mut state = [0.0];
        for _ in 0..4 {
            solver.step(&TimeOnly, &mut t, &mut state, 0.5).expect("step");
        }
        assert!((state[0] - 8.0).abs() < 1e-12);
    }
}
