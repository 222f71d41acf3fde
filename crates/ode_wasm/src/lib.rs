//! WASM bindings for the RK4 solvers and the formula compiler.
//!
//! `system` wraps compiled formulas for direct evaluation from JS, `solve`
//! exposes the three solver shapes and the serde-shaped problem API.

mod solve;
mod system;

pub use solve::{solve_first_order, solve_problem, solve_second_order, solve_system};
pub use system::WasmFormula;
