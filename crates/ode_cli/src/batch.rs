//! TOML problem files: one `[options]` table and any number of `[[problem]]`s.

use anyhow::Context;
use log::{error, info};
use ode_core::problem::describe_failure;
use ode_core::{Problem, SolveOptions};
use serde::Deserialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchFile {
    #[serde(default)]
    pub options: SolveOptions,
    #[serde(default)]
    pub problem: Vec<Problem>,
}

impl BatchFile {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("Malformed problem file")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Solves every problem in order and returns how many failed.
    pub fn run<W: Write>(&self, out: &mut W) -> std::io::Result<usize> {
        info!("solving {} problem(s)", self.problem.len());
        let mut failures = 0;
        for (index, problem) in self.problem.iter().enumerate() {
            writeln!(out, "[{}] {}", index + 1, problem.shape())?;
            match problem.solve(&self.options) {
                Ok(outcome) => {
                    for line in outcome.report_lines(problem.tf()) {
                        writeln!(out, "{line}")?;
                    }
                }
                Err(err) => {
                    error!("problem {} failed: {err}", index + 1);
                    writeln!(out, "{}", describe_failure(&err))?;
                    failures += 1;
                }
            }
        }
        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ode_core::Shape;

    const SAMPLE: &str = r#"
[options]
max_steps = 1000000

[[problem]]
kind = "first_order"
f = "t + y"
t0 = 0.0
y0 = 1.0
tf = 1.0
h = 0.01

[[problem]]
kind = "second_order"
f = "-y"
t0 = 0.0
y0 = 1.0
dy0 = 0.0
tf = 1.5707963
h = 0.01

[[problem]]
kind = "system"
f1 = "y"
f2 = "-x"
t0 = 0.0
x0 = 1.0
y0 = 0.0
tf = 6.2831853
h = 0.01
"#;

    #[test]
    fn parses_options_and_problems() {
        let batch = BatchFile::from_toml(SAMPLE).expect("parse");
        assert_eq!(batch.options.max_steps, 1_000_000);
        assert!(batch.options.check_finite);
        let shapes: Vec<Shape> = batch.problem.iter().map(Problem::shape).collect();
        assert_eq!(
            shapes,
            vec![Shape::FirstOrder, Shape::SecondOrder, Shape::System]
        );
    }

    #[test]
    fn options_table_is_optional() {
        let batch = BatchFile::from_toml(
            "[[problem]]\nkind = \"first_order\"\nf = \"y\"\nt0 = 0.0\ny0 = 1.0\ntf = 1.0\nh = 0.1\n",
        )
        .expect("parse");
        assert_eq!(batch.options, SolveOptions::default());
        assert_eq!(batch.problem.len(), 1);
    }

    #[test]
    fn run_prints_every_result_in_order() {
        let batch = BatchFile::from_toml(SAMPLE).expect("parse");
        let mut out = Vec::new();
        let failures = batch.run(&mut out).expect("write");
        let text = String::from_utf8(out).expect("utf-8");
        assert_eq!(failures, 0);
        assert!(text.contains("y(1.0) ≈ 3.436564"), "{text}");
        // Both grids overshoot tf: 158 steps to t = 1.58, 629 steps to t = 6.29.
        assert!(text.contains("y(1.5707963) ≈ -0.009204"), "{text}");
        assert!(text.contains("x(6.2831853) ≈ 0.999977"), "{text}");
        let first = text.find("[1]").expect("first header");
        let third = text.find("[3]").expect("third header");
        assert!(first < third);
    }

    #[test]
    fn failures_are_counted_and_reported() {
        let text = "\
[[problem]]
kind = \"first_order\"
f = \"y + z\"
t0 = 0.0
y0 = 1.0
tf = 1.0
h = 0.1

[[problem]]
kind = \"first_order\"
f = \"y\"
t0 = 0.0
y0 = 1.0
tf = 1.0
h = -0.1
";
        let batch = BatchFile::from_toml(text).expect("parse");
        let mut out = Vec::new();
        assert_eq!(batch.run(&mut out).expect("write"), 2);
        let printed = String::from_utf8(out).expect("utf-8");
        assert!(printed.contains("Error while evaluating the function: "));
        assert!(printed.contains("Error: invalid parameter"));
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        let err = BatchFile::from_toml("[[problem]]\nkind = \"third_order\"\n")
            .expect_err("unknown kind");
        assert!(format!("{err:#}").starts_with("Malformed problem file"));
    }
}
