//! Error types shared by the expression engine and the solvers.

use thiserror::Error;

/// Why a formula could not be compiled or evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("unexpected {found} at position {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected ')' at position {pos}")]
    ExpectedRParen { pos: usize },
    #[error("name '{0}' is not defined")]
    UnknownName(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("'{0}' is a function and must be called")]
    NotAValue(String),
    #[error("'{0}' is not a function")]
    NotCallable(String),
    #[error("{name}() takes {expected} argument(s) ({found} given)")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },
    #[error("invalid variable name '{0}'")]
    InvalidVariable(String),
    #[error("variable '{0}' is declared more than once")]
    DuplicateVariable(String),
    #[error("expected {expected} argument(s), got {found}")]
    ArgumentCount { expected: usize, found: usize },
    #[error("expression nested too deeply (limit {limit})")]
    TooDeep { limit: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("math domain error in {0}")]
    Domain(&'static str),
    #[error("math range error in {0}")]
    Overflow(&'static str),
    #[error("malformed bytecode: operand stack underflow")]
    StackUnderflow,
}

/// Errors surfaced by the public API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A formula failed to compile, or failed while being evaluated.
    #[error("failed to evaluate '{formula}': {source}")]
    Evaluation {
        formula: String,
        #[source]
        source: ExprError,
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The state stopped being finite during stepping.
    #[error("numeric divergence at step {step} (t = {t}): state is no longer finite")]
    NumericDivergence { step: usize, t: f64 },
}

impl Error {
    pub(crate) fn evaluation(formula: &str, source: ExprError) -> Self {
        Error::Evaluation {
            formula: formula.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
