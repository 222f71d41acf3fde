//! Compiled right-hand-side formulas.
//!
//! A [`Formula`] is the callable form of a user expression such as
//! `"t^2 * y"`: parsed against a restricted grammar, compiled to bytecode
//! once, and evaluated on the stack VM for every call.

use crate::equation_engine::{parse, Bytecode, Compiler, VM};
use crate::error::{Error, ExprError, Result};
use crate::traits::{Rhs, Scalar};
use log::debug;
use std::collections::HashSet;

/// Variable names for `y' = f(t, y)`.
pub const FIRST_ORDER_VARIABLES: [&str; 2] = ["t", "y"];
/// Variable names for `y'' = f(t, y, dy)`.
pub const SECOND_ORDER_VARIABLES: [&str; 3] = ["t", "y", "dy"];
/// Variable names for `x' = f1(t, x, y)`, `y' = f2(t, x, y)`.
pub const SYSTEM_VARIABLES: [&str; 3] = ["t", "x", "y"];

#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    variables: Vec<String>,
    bytecode: Bytecode,
}

impl Formula {
    /// Compiles `expression` as a function of `variables`, bound by position.
    ///
    /// Syntax errors and references to undeclared names are reported here;
    /// arithmetic errors (division by zero, math domain errors) only show up
    /// when the formula is evaluated.
    pub fn compile<S: AsRef<str>>(expression: &str, variables: &[S]) -> Result<Self> {
        let fail = |source: ExprError| Error::evaluation(expression, source);
        let names: Vec<&str> = variables.iter().map(AsRef::as_ref).collect();

        let mut seen = HashSet::new();
        for &name in &names {
            if !is_identifier(name) {
                return Err(fail(ExprError::InvalidVariable(name.to_string())));
            }
            if !seen.insert(name) {
                return Err(fail(ExprError::DuplicateVariable(name.to_string())));
            }
        }

        let expr = parse(expression).map_err(fail)?;
        let bytecode = Compiler::new(&names).compile(&expr).map_err(fail)?;
        debug!(
            "compiled '{}' over ({}) into {} ops",
            expression,
            names.join(", "),
            bytecode.ops.len()
        );

        Ok(Self {
            source: expression.to_string(),
            variables: names.iter().map(|name| name.to_string()).collect(),
            bytecode,
        })
    }

    /// Evaluates the formula with one value per declared variable.
    pub fn eval<T: Scalar>(&self, args: &[T]) -> Result<T> {
        let mut stack = Vec::with_capacity(16);
        self.eval_with_stack(args, &mut stack)
    }

    /// Like [`Formula::eval`], reusing a caller-owned VM stack.
    pub fn eval_with_stack<T: Scalar>(&self, args: &[T], stack: &mut Vec<T>) -> Result<T> {
        if args.len() != self.variables.len() {
            return Err(Error::evaluation(
                &self.source,
                ExprError::ArgumentCount {
                    expected: self.variables.len(),
                    found: args.len(),
                },
            ));
        }
        VM::execute(&self.bytecode, args, stack).map_err(|e| Error::evaluation(&self.source, e))
    }

    /// The expression text as supplied, before `^` normalization.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn arity(&self) -> usize {
        self.variables.len()
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }
}

impl<T: Scalar, const N: usize> Rhs<T, N> for Formula {
    fn call(&self, args: [T; N]) -> Result<T> {
        self.eval(&args)
    }

    fn call_with_stack(&self, args: [T; N], stack: &mut Vec<T>) -> Result<T> {
        self.eval_with_stack(&args, stack)
    }
}

/// Compiles `expression_text` into a callable of `variable_names`.
pub fn compile<S: AsRef<str>>(expression_text: &str, variable_names: &[S]) -> Result<Formula> {
    Formula::compile(expression_text, variable_names)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
