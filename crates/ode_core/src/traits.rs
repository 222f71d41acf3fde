use crate::error::Result;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in the solvers and the VM.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Converts an `f64` constant into `T`. Every `Float` can represent an `f64`
/// approximately, so the NaN fallback is never hit for `f32`/`f64`.
pub(crate) fn lit<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// Represents a first-order ODE system `x' = f(t, x)`.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt into
    fn apply(&self, t: T, x: &[T], out: &mut [T]) -> Result<()>;
}

/// A trait for solvers that can step a system forward.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    fn step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: &mut T,
        state: &mut [T],
        dt: T,
    ) -> Result<()>;
}

/// A right-hand-side callable of `N` positional arguments, `t` first.
///
/// Implemented by compiled [`Formula`](crate::formula::Formula)s and by
/// closures `Fn(T, T) -> Result<T>` (`N = 2`) or `Fn(T, T, T) -> Result<T>`
/// (`N = 3`).
pub trait Rhs<T: Scalar, const N: usize> {
    fn call(&self, args: [T; N]) -> Result<T>;

    /// Like [`Rhs::call`], with a scratch buffer the caller keeps between
    /// calls. Implementations that need no scratch space ignore it.
    fn call_with_stack(&self, args: [T; N], _stack: &mut Vec<T>) -> Result<T> {
        self.call(args)
    }
}

impl<T: Scalar, F> Rhs<T, 2> for F
where
    F: Fn(T, T) -> Result<T>,
{
    fn call(&self, [a, b]: [T; 2]) -> Result<T> {
        self(a, b)
    }
}

impl<T: Scalar, F> Rhs<T, 3> for F
where
    F: Fn(T, T, T) -> Result<T>,
{
    fn call(&self, [a, b, c]: [T; 3]) -> Result<T> {
        self(a, b, c)
    }
}
