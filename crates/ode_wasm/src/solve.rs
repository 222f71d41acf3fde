//! RK4 solve entry points for JS.
//!
//! The shaped functions return `[t_final, state...]` as a `Float64Array`;
//! `solve_problem` takes and returns the serde shape of `Problem`/`Outcome`.

use crate::system::to_js_error;
use anyhow::Context;
use js_sys::Float64Array;
use ode_core::formula::{FIRST_ORDER_VARIABLES, SECOND_ORDER_VARIABLES, SYSTEM_VARIABLES};
use ode_core::{Formula, Outcome, Problem, Rk4Driver, SolveOptions};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub(crate) fn first_order_state(
    expression: &str,
    t0: f64,
    y0: f64,
    tf: f64,
    h: f64,
) -> anyhow::Result<Vec<f64>> {
    let f = Formula::compile(expression, &FIRST_ORDER_VARIABLES)?;
    let sol = Rk4Driver::default()
        .first_order(&f, t0, y0, tf, h)
        .context("First-order solve failed")?;
    Ok(vec![sol.t, sol.y])
}

pub(crate) fn second_order_state(
    expression: &str,
    t0: f64,
    y0: f64,
    dy0: f64,
    tf: f64,
    h: f64,
) -> anyhow::Result<Vec<f64>> {
    let accel = Formula::compile(expression, &SECOND_ORDER_VARIABLES)?;
    let sol = Rk4Driver::default()
        .second_order(&accel, t0, y0, dy0, tf, h)
        .context("Second-order solve failed")?;
    Ok(vec![sol.t, sol.y, sol.dy])
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn system_state(
    f1: &str,
    f2: &str,
    t0: f64,
    x0: f64,
    y0: f64,
    tf: f64,
    h: f64,
) -> anyhow::Result<Vec<f64>> {
    let f1 = Formula::compile(f1, &SYSTEM_VARIABLES)?;
    let f2 = Formula::compile(f2, &SYSTEM_VARIABLES)?;
    let sol = Rk4Driver::default()
        .system(&f1, &f2, t0, x0, y0, tf, h)
        .context("System solve failed")?;
    Ok(vec![sol.t, sol.x, sol.y])
}

pub(crate) fn solve_problem_with(
    problem: &Problem,
    options: SolveOptions,
) -> anyhow::Result<Outcome> {
    problem
        .solve(&options)
        .with_context(|| format!("{} solve failed", problem.shape()))
}

/// Solves `y' = f(t, y)`; returns `[t_final, y]`.
#[wasm_bindgen]
pub fn solve_first_order(
    expression: &str,
    t0: f64,
    y0: f64,
    tf: f64,
    h: f64,
) -> Result<Float64Array, JsValue> {
    let state =
        first_order_state(expression, t0, y0, tf, h).map_err(|e| to_js_error(format!("{e:#}")))?;
    Ok(Float64Array::from(state.as_slice()))
}

/// Solves `y'' = f(t, y, dy)`; returns `[t_final, y, dy]`.
#[wasm_bindgen]
pub fn solve_second_order(
    expression: &str,
    t0: f64,
    y0: f64,
    dy0: f64,
    tf: f64,
    h: f64,
) -> Result<Float64Array, JsValue> {
    let state = second_order_state(expression, t0, y0, dy0, tf, h)
        .map_err(|e| to_js_error(format!("{e:#}")))?;
    Ok(Float64Array::from(state.as_slice()))
}

/// Solves `x' = f1(t, x, y)`, `y' = f2(t, x, y)`; returns `[t_final, x, y]`.
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn solve_system(
    f1: &str,
    f2: &str,
    t0: f64,
    x0: f64,
    y0: f64,
    tf: f64,
    h: f64,
) -> Result<Float64Array, JsValue> {
    let state =
        system_state(f1, f2, t0, x0, y0, tf, h).map_err(|e| to_js_error(format!("{e:#}")))?;
    Ok(Float64Array::from(state.as_slice()))
}

/// Solves a `{ kind, ... }` problem object; `options` may be `undefined`
/// and missing option fields fall back to the defaults.
#[wasm_bindgen]
pub fn solve_problem(problem: JsValue, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let problem: Problem =
        from_value(problem).map_err(|e| to_js_error(format!("Invalid problem: {e}")))?;
    let options: SolveOptions = if options.is_undefined() || options.is_null() {
        SolveOptions::default()
    } else {
        from_value(options).map_err(|e| to_js_error(format!("Invalid options: {e}")))?
    };
    let outcome =
        solve_problem_with(&problem, options).map_err(|e| to_js_error(format!("{e:#}")))?;
    to_value(&outcome).map_err(|e| to_js_error(format!("Failed to serialize outcome: {e}")))
}
