//! Self-contained solve requests, as supplied by the text menu, batch files
//! or the WASM bridge.

use crate::error::{Error, Result};
use crate::formula::{Formula, FIRST_ORDER_VARIABLES, SECOND_ORDER_VARIABLES, SYSTEM_VARIABLES};
use crate::ivp::{FirstOrderSolution, Rk4Driver, SecondOrderSolution, SolveOptions, SystemSolution};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three supported problem shapes, numbered as in the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    FirstOrder,
    SecondOrder,
    System,
}

impl Shape {
    pub const ALL: [Shape; 3] = [Shape::FirstOrder, Shape::SecondOrder, Shape::System];

    /// Maps a menu selector (`"1"`, `"2"`, `"3"`) to a shape.
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector.trim() {
            "1" => Some(Shape::FirstOrder),
            "2" => Some(Shape::SecondOrder),
            "3" => Some(Shape::System),
            _ => None,
        }
    }

    pub fn selector(self) -> u8 {
        match self {
            Shape::FirstOrder => 1,
            Shape::SecondOrder => 2,
            Shape::System => 3,
        }
    }

    /// Free variables available to the formulas of this shape, in call order.
    pub fn variables(self) -> &'static [&'static str] {
        match self {
            Shape::FirstOrder => &FIRST_ORDER_VARIABLES,
            Shape::SecondOrder => &SECOND_ORDER_VARIABLES,
            Shape::System => &SYSTEM_VARIABLES,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::FirstOrder => write!(f, "First-order differential equation"),
            Shape::SecondOrder => write!(f, "Second-order differential equation"),
            Shape::System => write!(f, "2x2 system of differential equations"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Problem {
    /// `y' = f(t, y)`
    FirstOrder {
        f: String,
        t0: f64,
        y0: f64,
        tf: f64,
        h: f64,
    },
    /// `y'' = f(t, y, dy)`
    SecondOrder {
        f: String,
        t0: f64,
        y0: f64,
        dy0: f64,
        tf: f64,
        h: f64,
    },
    /// `x' = f1(t, x, y)`, `y' = f2(t, x, y)`
    System {
        f1: String,
        f2: String,
        t0: f64,
        x0: f64,
        y0: f64,
        tf: f64,
        h: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    FirstOrder(FirstOrderSolution<f64>),
    SecondOrder(SecondOrderSolution<f64>),
    System(SystemSolution<f64>),
}

impl Problem {
    pub fn shape(&self) -> Shape {
        match self {
            Problem::FirstOrder { .. } => Shape::FirstOrder,
            Problem::SecondOrder { .. } => Shape::SecondOrder,
            Problem::System { .. } => Shape::System,
        }
    }

    /// The requested end of the interval.
    pub fn tf(&self) -> f64 {
        match *self {
            Problem::FirstOrder { tf, .. }
            | Problem::SecondOrder { tf, .. }
            | Problem::System { tf, .. } => tf,
        }
    }

    /// Compiles the formulas and runs the matching RK4 entry point.
    pub fn solve(&self, options: &SolveOptions) -> Result<Outcome> {
        let driver = Rk4Driver::new(*options);
        let vars = self.shape().variables();
        match self {
            Problem::FirstOrder { f, t0, y0, tf, h } => {
                let f = Formula::compile(f, vars)?;
                driver
                    .first_order(&f, *t0, *y0, *tf, *h)
                    .map(Outcome::FirstOrder)
            }
            Problem::SecondOrder {
                f,
                t0,
                y0,
                dy0,
                tf,
                h,
            } => {
                let accel = Formula::compile(f, vars)?;
                driver
                    .second_order(&accel, *t0, *y0, *dy0, *tf, *h)
                    .map(Outcome::SecondOrder)
            }
            Problem::System {
                f1,
                f2,
                t0,
                x0,
                y0,
                tf,
                h,
            } => {
                let f1 = Formula::compile(f1, vars)?;
                let f2 = Formula::compile(f2, vars)?;
                driver
                    .system(&f1, &f2, *t0, *x0, *y0, *tf, *h)
                    .map(Outcome::System)
            }
        }
    }
}

impl Outcome {
    /// Final state values in the order the shape names them.
    pub fn values(&self) -> Vec<f64> {
        match self {
            Outcome::FirstOrder(s) => vec![s.y],
            Outcome::SecondOrder(s) => vec![s.y, s.dy],
            Outcome::System(s) => vec![s.x, s.y],
        }
    }

    /// Time of the final grid point.
    pub fn t(&self) -> f64 {
        match self {
            Outcome::FirstOrder(s) => s.t,
            Outcome::SecondOrder(s) => s.t,
            Outcome::System(s) => s.t,
        }
    }

    pub fn steps(&self) -> usize {
        match self {
            Outcome::FirstOrder(s) => s.steps,
            Outcome::SecondOrder(s) => s.steps,
            Outcome::System(s) => s.steps,
        }
    }

    /// Display lines such as `y(1.0) ≈ 2.718282`, labelled with `tf`.
    pub fn report_lines(&self, tf: f64) -> Vec<String> {
        let labels: &[&str] = match self {
            Outcome::FirstOrder(_) => &["y"],
            Outcome::SecondOrder(_) => &["y", "y'"],
            Outcome::System(_) => &["x", "y"],
        };
        labels
            .iter()
            .zip(self.values())
            .map(|(label, value)| format!("{label}({tf:?}) ≈ {value:.6}"))
            .collect()
    }
}

/// Shapes the error text the shells print for a failed request.
pub fn describe_failure(err: &Error) -> String {
    match err {
        Error::Evaluation { .. } => format!("Error while evaluating the function: {err}"),
        _ => format!("Error: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_map_to_shapes() {
        for shape in Shape::ALL {
            let selector = shape.selector().to_string();
            assert_eq!(Shape::from_selector(&selector), Some(shape));
        }
        assert_eq!(Shape::from_selector(" 2 "), Some(Shape::SecondOrder));
        assert_eq!(Shape::from_selector("4"), None);
        assert_eq!(Shape::SecondOrder.variables(), &["t", "y", "dy"]);
    }

    #[test]
    fn solves_each_shape() {
        let first = Problem::FirstOrder {
            f: "t + y".to_string(),
            t0: 0.0,
            y0: 1.0,
            tf: 1.0,
            h: 0.01,
        };
        // y = 2e^t - t - 1
        let outcome = first.solve(&SolveOptions::default()).expect("solve");
        let exact = 2.0 * 1f64.exp() - 2.0;
        assert!((outcome.values()[0] - exact).abs() < 1e-8);
        assert_eq!(outcome.steps(), 100);

        let second = Problem::SecondOrder {
            f: "-y".to_string(),
            t0: 0.0,
            y0: 0.0,
            dy0: 1.0,
            tf: 1.0,
            h: 0.01,
        };
        let outcome = second.solve(&SolveOptions::default()).expect("solve");
        let values = outcome.values();
        assert!((values[0] - 1f64.sin()).abs() < 1e-9);
        assert!((values[1] - 1f64.cos()).abs() < 1e-9);

        let system = Problem::System {
            f1: "-x".to_string(),
            f2: "x - y".to_string(),
            t0: 0.0,
            x0: 1.0,
            y0: 0.0,
            tf: 1.0,
            h: 0.01,
        };
        // x = e^-t, y = t e^-t
        let outcome = system.solve(&SolveOptions::default()).expect("solve");
        let values = outcome.values();
        assert!((values[0] - (-1f64).exp()).abs() < 1e-9);
        assert!((values[1] - (-1f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn formulas_are_checked_against_the_shape_variables() {
        let problem = Problem::FirstOrder {
            f: "x + y".to_string(),
            t0: 0.0,
            y0: 1.0,
            tf: 1.0,
            h: 0.1,
        };
        let err = problem
            .solve(&SolveOptions::default())
            .expect_err("x is not a first-order variable");
        assert!(describe_failure(&err).starts_with("Error while evaluating the function:"));
    }

    #[test]
    fn report_lines_use_six_decimals() {
        let outcome = Outcome::SecondOrder(SecondOrderSolution {
            t: 2.0,
            y: 0.5,
            dy: -1.0 / 3.0,
            steps: 20,
        });
        assert_eq!(
            outcome.report_lines(2.0),
            vec!["y(2.0) ≈ 0.500000".to_string(), "y'(2.0) ≈ -0.333333".to_string()]
        );
    }

    #[test]
    fn problem_json_shape() {
        let problem: Problem = serde_json::from_str(
            r#"{ "kind": "system", "f1": "y", "f2": "-x", "t0": 0, "x0": 1, "y0": 0, "tf": 1, "h": 0.5 }"#,
        )
        .expect("deserialize");
        assert_eq!(problem.shape(), Shape::System);
        let outcome = problem.solve(&SolveOptions::default()).expect("solve");
        let json = serde_json::to_value(outcome).expect("serialize");
        assert_eq!(json["kind"], "system");
        assert_eq!(json["steps"], 2);
    }
}
