//! Interactive text menu over any `BufRead`/`Write` pair.

use log::{debug, warn};
use ode_core::problem::describe_failure;
use ode_core::{Problem, Shape, SolveOptions};
use std::io::{self, BufRead, Write};

const INSTRUCTIONS: &str = "\
Instructions for entering functions:
- Use 't' for the independent variable
- Use 'y' for the unknown function (first order)
- Use 'y' and 'dy' for the function and its derivative (second order)
- Use 'x' and 'y' for systems of equations
- Available functions: sin, cos, tan, exp, log, sqrt, abs, atan2, min, max, ...
- Use '^' or '**' for powers
Examples:
- t + y
- sin(t*y)
- exp(t*y)
- t^2 * y";

const MENU: &str = "
What do you want to solve?
1. First-order differential equation
2. Second-order differential equation
3. 2x2 system of differential equations
4. Exit";

enum PromptError {
    Closed,
    Invalid(String),
    Io(io::Error),
}

impl From<io::Error> for PromptError {
    fn from(err: io::Error) -> Self {
        PromptError::Io(err)
    }
}

pub struct Session<R, W> {
    input: R,
    output: W,
    options: SolveOptions,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(input: R, output: W, options: SolveOptions) -> Self {
        Self {
            input,
            output,
            options,
        }
    }

    /// Runs the menu until the user exits or the input is exhausted.
    pub fn run(&mut self) -> anyhow::Result<()> {
        writeln!(self.output, "\n{INSTRUCTIONS}")?;
        loop {
            writeln!(self.output, "{MENU}")?;
            let choice = match self.prompt("\nSelect an option: ") {
                Ok(choice) => choice,
                Err(PromptError::Io(err)) => return Err(err.into()),
                Err(_) => break,
            };
            if choice.trim() == "4" {
                writeln!(self.output, "\nGoodbye!")?;
                break;
            }
            let Some(shape) = Shape::from_selector(&choice) else {
                writeln!(
                    self.output,
                    "\nInvalid option. Please select an option from 1 to 4."
                )?;
                continue;
            };
            match self.read_problem(shape) {
                Ok(problem) => self.solve(&problem)?,
                Err(PromptError::Invalid(text)) => {
                    writeln!(self.output, "Error: '{text}' is not a valid number")?;
                }
                Err(PromptError::Closed) => break,
                Err(PromptError::Io(err)) => return Err(err.into()),
            }
        }
        self.output.flush()?;
        Ok(())
    }

    fn prompt(&mut self, text: &str) -> Result<String, PromptError> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            debug!("input closed");
            return Err(PromptError::Closed);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn number(&mut self, name: &str) -> Result<f64, PromptError> {
        let text = self.prompt(&format!("Enter {name}: "))?;
        text.trim()
            .parse()
            .map_err(|_| PromptError::Invalid(text.trim().to_string()))
    }

    fn read_problem(&mut self, shape: Shape) -> Result<Problem, PromptError> {
        match shape {
            Shape::FirstOrder => {
                writeln!(self.output, "\nFor an equation of the form y'(t) = f(t,y)")?;
                let f = self.prompt("Enter the function f(t,y): ")?;
                Ok(Problem::FirstOrder {
                    f,
                    t0: self.number("t0")?,
                    y0: self.number("y0")?,
                    tf: self.number("tf")?,
                    h: self.number("h")?,
                })
            }
            Shape::SecondOrder => {
                writeln!(
                    self.output,
                    "\nFor an equation of the form y''(t) = f(t,y,y')"
                )?;
                let f = self.prompt("Enter the function f(t,y,dy): ")?;
                Ok(Problem::SecondOrder {
                    f,
                    t0: self.number("t0")?,
                    y0: self.number("y0")?,
                    dy0: self.number("y'0")?,
                    tf: self.number("tf")?,
                    h: self.number("h")?,
                })
            }
            Shape::System => {
                writeln!(self.output, "\nFor a system of the form:")?;
                writeln!(self.output, "x'(t) = f1(t,x,y)")?;
                writeln!(self.output, "y'(t) = f2(t,x,y)")?;
                let f1 = self.prompt("Enter the function f1(t,x,y): ")?;
                let f2 = self.prompt("Enter the function f2(t,x,y): ")?;
                Ok(Problem::System {
                    f1,
                    f2,
                    t0: self.number("t0")?,
                    x0: self.number("x0")?,
                    y0: self.number("y0")?,
                    tf: self.number("tf")?,
                    h: self.number("h")?,
                })
            }
        }
    }

    fn solve(&mut self, problem: &Problem) -> io::Result<()> {
        match problem.solve(&self.options) {
            Ok(outcome) => {
                writeln!(self.output)?;
                for line in outcome.report_lines(problem.tf()) {
                    writeln!(self.output, "{line}")?;
                }
            }
            Err(err) => {
                warn!("{} failed: {err}", problem.shape());
                writeln!(self.output, "{}", describe_failure(&err))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_script(script: &str) -> String {
        let mut output = Vec::new();
        Session::new(script.as_bytes(), &mut output, SolveOptions::default())
            .run()
            .expect("session");
        String::from_utf8(output).expect("utf-8 output")
    }

    #[test]
    fn first_order_session_prints_the_final_value() {
        let output = run_script("1\ny\n0\n1\n1\n0.001\n4\n");
        assert!(output.contains("y(1.0) ≈ 2.718282"), "{output}");
        assert!(output.trim_end().ends_with("Goodbye!"));
    }

    #[test]
    fn second_order_session_prints_value_and_derivative() {
        let output = run_script("2\n-y\n0\n1\n0\n3.141592653589793\n0.001\n4\n");
        assert!(output.contains("y(3.141592653589793) ≈ -1.000000"), "{output}");
        assert!(output.contains("y'(3.141592653589793) ≈ "), "{output}");
    }

    #[test]
    fn system_session_prints_both_components() {
        let output = run_script("3\ny\n-x\n0\n1\n0\n0\n0.1\n4\n");
        assert!(output.contains("x(0.0) ≈ 1.000000"), "{output}");
        assert!(output.contains("y(0.0) ≈ 0.000000"), "{output}");
    }

    #[test]
    fn evaluation_errors_keep_the_menu_running() {
        let output = run_script("1\n1/(t-0.5)\n0\n1\n1\n0.25\n1\nt\n0\n0\n2\n0.5\n4\n");
        assert!(
            output.contains("Error while evaluating the function: "),
            "{output}"
        );
        assert!(output.contains("y(2.0) ≈ 2.000000"), "{output}");
    }

    #[test]
    fn invalid_numbers_and_options_are_reported() {
        let output = run_script("7\n1\ny\nzero\n4\n");
        assert!(output.contains("Invalid option"), "{output}");
        assert!(output.contains("'zero' is not a valid number"), "{output}");
        assert!(output.contains("Goodbye!"));
    }

    #[test]
    fn closed_input_ends_the_session() {
        let output = run_script("1\nt + y\n0\n");
        assert!(!output.contains("Goodbye!"));
        assert!(!output.contains("≈"));
    }
}
