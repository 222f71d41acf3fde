pub mod equation_engine;
pub mod error;
pub mod formula;
pub mod grid;
pub mod ivp;
pub mod problem;
pub mod solvers;
pub mod systems;
/// The `ode_core` crate provides the numerical engine behind the ODE CLI and
/// the WASM bridge.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem`, `Steppable` and `Rhs`.
/// - **Equation Engine**: a restricted-grammar parser and bytecode VM for user formulas.
/// - **Formula**: the compiled, callable form of a formula over named variables.
/// - **Solvers / IVP**: the classical RK4 stepper and the three fixed-step entry points
///   (first order, second order, 2x2 system).
/// - **Problem**: serde-friendly solve requests shared by the shells.
pub mod traits;

pub use error::{Error, ExprError, Result};
pub use formula::{compile, Formula};
pub use ivp::{
    rk4_first_order, rk4_second_order, rk4_system, FirstOrderSolution, Rk4Driver,
    SecondOrderSolution, SolveOptions, SystemSolution,
};
pub use problem::{Outcome, Problem, Shape};
