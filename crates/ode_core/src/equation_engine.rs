use crate::error::ExprError;
use crate::traits::{lit, Scalar};
use std::collections::HashMap;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
}

/// Comparison operators. A comparison evaluates to `1.0` or `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    fn holds<T: Scalar>(self, a: T, b: T) -> bool {
        match self {
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
        }
    }
}

/// Whitelisted one-argument functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func1 {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Exp,
    Expm1,
    Log,
    Log10,
    Log2,
    Log1p,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Trunc,
    Round,
    Degrees,
    Radians,
}

impl Func1 {
    fn apply<T: Scalar>(self, x: T) -> Result<T, ExprError> {
        let zero = T::zero();
        let one = T::one();
        match self {
            Func1::Sin => finite_arg(x, "sin").map(T::sin),
            Func1::Cos => finite_arg(x, "cos").map(T::cos),
            Func1::Tan => finite_arg(x, "tan").map(T::tan),
            Func1::Asin => domain(x.abs() > one, "asin").map(|_| x.asin()),
            Func1::Acos => domain(x.abs() > one, "acos").map(|_| x.acos()),
            Func1::Atan => Ok(x.atan()),
            Func1::Sinh => no_overflow(x.sinh(), &[x], "sinh"),
            Func1::Cosh => no_overflow(x.cosh(), &[x], "cosh"),
            Func1::Tanh => Ok(x.tanh()),
            Func1::Asinh => Ok(x.asinh()),
            Func1::Acosh => domain(x < one, "acosh").map(|_| x.acosh()),
            Func1::Atanh => domain(x.abs() >= one, "atanh").map(|_| x.atanh()),
            Func1::Exp => no_overflow(x.exp(), &[x], "exp"),
            Func1::Expm1 => no_overflow(x.exp_m1(), &[x], "expm1"),
            Func1::Log => domain(x <= zero, "log").map(|_| x.ln()),
            Func1::Log10 => domain(x <= zero, "log10").map(|_| x.log10()),
            Func1::Log2 => domain(x <= zero, "log2").map(|_| x.log2()),
            Func1::Log1p => domain(x <= -one, "log1p").map(|_| x.ln_1p()),
            Func1::Sqrt => domain(x < zero, "sqrt").map(|_| x.sqrt()),
            Func1::Abs => Ok(x.abs()),
            Func1::Floor => integral_arg(x, "floor").map(T::floor),
            Func1::Ceil => integral_arg(x, "ceil").map(T::ceil),
            Func1::Trunc => integral_arg(x, "trunc").map(T::trunc),
            Func1::Round => integral_arg(x, "round").map(round_half_even),
            Func1::Degrees => Ok(x.to_degrees()),
            Func1::Radians => Ok(x.to_radians()),
        }
    }
}

/// Whitelisted two-argument functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func2 {
    Atan2,
    Pow,
    Hypot,
    LogBase,
}

impl Func2 {
    fn apply<T: Scalar>(self, a: T, b: T) -> Result<T, ExprError> {
        match self {
            Func2::Atan2 => Ok(a.atan2(b)),
            Func2::Pow => {
                if a.is_zero() && b < T::zero() {
                    return Err(ExprError::Domain("pow"));
                }
                power(a, b, "pow")
            }
            Func2::Hypot => no_overflow(a.hypot(b), &[a, b], "hypot"),
            Func2::LogBase => {
                if a <= T::zero() || b <= T::zero() {
                    return Err(ExprError::Domain("log"));
                }
                let denominator = b.ln();
                if denominator.is_zero() {
                    return Err(ExprError::DivisionByZero);
                }
                Ok(a.ln() / denominator)
            }
        }
    }
}

/// Reductions over two or more arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fold {
    Min,
    Max,
}

impl Fold {
    /// Keeps the first value unless a later one is strictly smaller (larger).
    fn apply<T: Scalar>(self, values: &[T]) -> Result<T, ExprError> {
        let (&first, rest) = values.split_first().ok_or(ExprError::StackUnderflow)?;
        Ok(rest.iter().fold(first, |acc, &v| match self {
            Fold::Min if v < acc => v,
            Fold::Max if v > acc => v,
            _ => acc,
        }))
    }
}

#[derive(Debug, Clone, Copy)]
enum Signature {
    Unary(Func1),
    Binary(Func2),
    UnaryOrBinary(Func1, Func2),
    Variadic(Fold),
}

impl Signature {
    fn describe(self) -> &'static str {
        match self {
            Signature::Unary(_) => "exactly 1",
            Signature::Binary(_) => "exactly 2",
            Signature::UnaryOrBinary(..) => "1 or 2",
            Signature::Variadic(_) => "at least 2",
        }
    }
}

const FUNCTIONS: &[(&str, Signature)] = &[
    ("sin", Signature::Unary(Func1::Sin)),
    ("cos", Signature::Unary(Func1::Cos)),
    ("tan", Signature::Unary(Func1::Tan)),
    ("asin", Signature::Unary(Func1::Asin)),
    ("acos", Signature::Unary(Func1::Acos)),
    ("atan", Signature::Unary(Func1::Atan)),
    ("sinh", Signature::Unary(Func1::Sinh)),
    ("cosh", Signature::Unary(Func1::Cosh)),
    ("tanh", Signature::Unary(Func1::Tanh)),
    ("asinh", Signature::Unary(Func1::Asinh)),
    ("acosh", Signature::Unary(Func1::Acosh)),
    ("atanh", Signature::Unary(Func1::Atanh)),
    ("exp", Signature::Unary(Func1::Exp)),
    ("expm1", Signature::Unary(Func1::Expm1)),
    ("log", Signature::UnaryOrBinary(Func1::Log, Func2::LogBase)),
    ("log10", Signature::Unary(Func1::Log10)),
    ("log2", Signature::Unary(Func1::Log2)),
    ("log1p", Signature::Unary(Func1::Log1p)),
    ("sqrt", Signature::Unary(Func1::Sqrt)),
    ("abs", Signature::Unary(Func1::Abs)),
    ("fabs", Signature::Unary(Func1::Abs)),
    ("floor", Signature::Unary(Func1::Floor)),
    ("ceil", Signature::Unary(Func1::Ceil)),
    ("trunc", Signature::Unary(Func1::Trunc)),
    ("round", Signature::Unary(Func1::Round)),
    ("degrees", Signature::Unary(Func1::Degrees)),
    ("radians", Signature::Unary(Func1::Radians)),
    ("atan2", Signature::Binary(Func2::Atan2)),
    ("pow", Signature::Binary(Func2::Pow)),
    ("hypot", Signature::Binary(Func2::Hypot)),
    ("min", Signature::Variadic(Fold::Min)),
    ("max", Signature::Variadic(Fold::Max)),
];

const CONSTANTS: &[(&str, f64)] = &[
    ("pi", std::f64::consts::PI),
    ("e", std::f64::consts::E),
    ("tau", std::f64::consts::TAU),
    ("inf", f64::INFINITY),
    ("nan", f64::NAN),
];

fn lookup_function(name: &str) -> Option<Signature> {
    FUNCTIONS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|&(_, signature)| signature)
}

fn lookup_constant(name: &str) -> Option<f64> {
    CONSTANTS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|&(_, value)| value)
}

/// Names of every whitelisted function, in table order.
pub fn function_names() -> impl Iterator<Item = &'static str> {
    FUNCTIONS.iter().map(|(name, _)| *name)
}

/// OpCodes for the Stack-based Virtual Machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant `f64` value onto the stack.
    LoadConst(f64),
    /// Pushes the value of a variable (by declared position) onto the stack.
    LoadVar(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b).
    Div,
    /// Pops top two values (b, a), pushes floor(a / b).
    FloorDiv,
    /// Pops top two values (b, a), pushes a mod b with the sign of b.
    Mod,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
    /// Pops top value (a), pushes -a.
    Neg,
    /// Pops one argument, pushes the function value.
    Call1(Func1),
    /// Pops two arguments, pushes the function value.
    Call2(Func2),
    /// Pops `n` arguments, pushes their min or max.
    Fold(Fold, usize),
    /// Pops (b, a), pushes the comparison flag and then `b` again so the
    /// next link of a chain can compare against it.
    Compare(CompareOp),
    /// Pops (b, flag). A false flag ends the chain: it is pushed back and
    /// execution continues at the target. Otherwise `b` is pushed back.
    ChainJump(usize),
    /// Pops and drops the top value.
    Discard,
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

impl Bytecode {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }
}

/// Stack-based Virtual Machine for evaluating equations.
///
/// The VM is stateless; `execute` takes all necessary context:
/// - `bytecode`: Instructions to run.
/// - `vars`: Variable values in declared order (read-only).
/// - `stack`: A mutable buffer for intermediate computations.
///
/// Returns the value left on the stack, or the first arithmetic error hit.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(
        bytecode: &Bytecode,
        vars: &[T],
        stack: &mut Vec<T>,
    ) -> Result<T, ExprError> {
        stack.clear();

        let mut pc = 0;
        while let Some(&op) = bytecode.ops.get(pc) {
            pc += 1;
            match op {
                OpCode::LoadConst(val) => stack.push(lit(val)),
                OpCode::LoadVar(idx) => {
                    let value = vars.get(idx).copied().ok_or(ExprError::ArgumentCount {
                        expected: idx + 1,
                        found: vars.len(),
                    })?;
                    stack.push(value);
                }
                OpCode::Add => binary(stack, |a, b| Ok(a + b))?,
                OpCode::Sub => binary(stack, |a, b| Ok(a - b))?,
                OpCode::Mul => binary(stack, |a, b| Ok(a * b))?,
                OpCode::Div => binary(stack, divide)?,
                OpCode::FloorDiv => binary(stack, floor_divide)?,
                OpCode::Mod => binary(stack, modulo)?,
                OpCode::Pow => binary(stack, |a, b| {
                    if a.is_zero() && b < T::zero() {
                        return Err(ExprError::DivisionByZero);
                    }
                    power(a, b, "**")
                })?,
                OpCode::Neg => {
                    let a = pop(stack)?;
                    stack.push(-a);
                }
                OpCode::Call1(func) => {
                    let a = pop(stack)?;
                    stack.push(func.apply(a)?);
                }
                OpCode::Call2(func) => binary(stack, |a, b| func.apply(a, b))?,
                OpCode::Fold(fold, n) => {
                    let start = stack
                        .len()
                        .checked_sub(n)
                        .ok_or(ExprError::StackUnderflow)?;
                    let value = fold.apply(&stack[start..])?;
                    stack.truncate(start);
                    stack.push(value);
                }
                OpCode::Compare(cmp) => {
                    let b = pop(stack)?;
                    let a = pop(stack)?;
                    stack.push(flag(cmp.holds(a, b)));
                    stack.push(b);
                }
                OpCode::ChainJump(target) => {
                    let b = pop(stack)?;
                    let holds = pop(stack)?;
                    if holds.is_zero() {
                        stack.push(holds);
                        pc = target;
                    } else {
                        stack.push(b);
                    }
                }
                OpCode::Discard => {
                    pop(stack)?;
                }
            }
        }

        pop(stack)
    }
}

fn pop<T>(stack: &mut Vec<T>) -> Result<T, ExprError> {
    stack.pop().ok_or(ExprError::StackUnderflow)
}

fn binary<T: Scalar>(
    stack: &mut Vec<T>,
    op: impl FnOnce(T, T) -> Result<T, ExprError>,
) -> Result<(), ExprError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(op(a, b)?);
    Ok(())
}

fn flag<T: Scalar>(value: bool) -> T {
    if value {
        T::one()
    } else {
        T::zero()
    }
}

fn divide<T: Scalar>(a: T, b: T) -> Result<T, ExprError> {
    if b.is_zero() {
        return Err(ExprError::DivisionByZero);
    }
    Ok(a / b)
}

/// Floor division paired with [`modulo`]: `(a - a % b) / b`, stepped down
/// when the remainder and the divisor differ in sign, then floored.
fn floor_divide<T: Scalar>(a: T, b: T) -> Result<T, ExprError> {
    if b.is_zero() {
        return Err(ExprError::DivisionByZero);
    }
    let r = a % b;
    let mut quotient = (a - r) / b;
    if !r.is_zero() && (r < T::zero()) != (b < T::zero()) {
        quotient = quotient - T::one();
    }
    if quotient.is_zero() {
        let zero = T::zero();
        return Ok(if (a / b).is_sign_negative() { -zero } else { zero });
    }
    let floored = quotient.floor();
    if quotient - floored > lit(0.5) {
        Ok(floored + T::one())
    } else {
        Ok(floored)
    }
}

/// Floored modulo: the result takes the sign of the divisor.
fn modulo<T: Scalar>(a: T, b: T) -> Result<T, ExprError> {
    if b.is_zero() {
        return Err(ExprError::DivisionByZero);
    }
    let r = a % b;
    if !r.is_zero() && (r < T::zero()) != (b < T::zero()) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn power<T: Scalar>(a: T, b: T, name: &'static str) -> Result<T, ExprError> {
    if a < T::zero() && b.is_finite() && b != b.trunc() {
        return Err(ExprError::Domain(name));
    }
    no_overflow(a.powf(b), &[a, b], name)
}

fn domain(violated: bool, name: &'static str) -> Result<(), ExprError> {
    if violated {
        Err(ExprError::Domain(name))
    } else {
        Ok(())
    }
}

fn finite_arg<T: Scalar>(x: T, name: &'static str) -> Result<T, ExprError> {
    domain(x.is_infinite(), name).map(|_| x)
}

fn integral_arg<T: Scalar>(x: T, name: &'static str) -> Result<T, ExprError> {
    if x.is_nan() {
        Err(ExprError::Domain(name))
    } else if x.is_infinite() {
        Err(ExprError::Overflow(name))
    } else {
        Ok(x)
    }
}

/// An infinite result computed from finite inputs is a range error.
fn no_overflow<T: Scalar>(result: T, inputs: &[T], name: &'static str) -> Result<T, ExprError> {
    if result.is_infinite() && inputs.iter().all(|x| x.is_finite()) {
        Err(ExprError::Overflow(name))
    } else {
        Ok(result)
    }
}

fn round_half_even<T: Scalar>(x: T) -> T {
    let two: T = lit(2.0);
    let half: T = lit(0.5);
    let floor = x.floor();
    let diff = x - floor;
    if diff > half {
        floor + T::one()
    } else if diff < half {
        floor
    } else if (floor / two).floor() * two == floor {
        floor
    } else {
        floor + T::one()
    }
}

// --- AST & Compiler ---

/// Abstract Syntax Tree nodes for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Call(String, Vec<Expr>),
    /// `first op1 e1 op2 e2 ...`, true when every link holds. Evaluation
    /// stops at the first link that does not.
    Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
}

/// Compiles an AST (`Expr`) into `Bytecode`.
/// Resolves variable names to positional indices and function names against
/// the whitelist.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new<S: AsRef<str>>(var_names: &[S]) -> Self {
        let var_map = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_ref().to_string(), i))
            .collect();
        Self { var_map }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, ExprError> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<(), ExprError> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => {
                if let Some(&idx) = self.var_map.get(name) {
                    ops.push(OpCode::LoadVar(idx));
                } else if let Some(value) = lookup_constant(name) {
                    ops.push(OpCode::LoadConst(value));
                } else if lookup_function(name).is_some() {
                    return Err(ExprError::NotAValue(name.clone()));
                } else {
                    return Err(ExprError::UnknownName(name.clone()));
                }
            }
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                self.compile_recursive(right, ops)?;
                ops.push(match op {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Sub => OpCode::Sub,
                    BinaryOp::Mul => OpCode::Mul,
                    BinaryOp::Div => OpCode::Div,
                    BinaryOp::FloorDiv => OpCode::FloorDiv,
                    BinaryOp::Mod => OpCode::Mod,
                    BinaryOp::Pow => OpCode::Pow,
                });
            }
            Expr::Unary(op, operand) => {
                self.compile_recursive(operand, ops)?;
                if let UnaryOp::Neg = op {
                    ops.push(OpCode::Neg);
                }
            }
            Expr::Call(func, args) => {
                let op = self.resolve_call(func, args.len())?;
                for arg in args {
                    self.compile_recursive(arg, ops)?;
                }
                ops.push(op);
            }
            Expr::Compare(first, links) => {
                self.compile_recursive(first, ops)?;
                let mut jumps = Vec::new();
                for (i, (cmp, operand)) in links.iter().enumerate() {
                    self.compile_recursive(operand, ops)?;
                    ops.push(OpCode::Compare(*cmp));
                    if i + 1 < links.len() {
                        jumps.push(ops.len());
                        ops.push(OpCode::ChainJump(0));
                    }
                }
                ops.push(OpCode::Discard);
                let end = ops.len();
                for at in jumps {
                    ops[at] = OpCode::ChainJump(end);
                }
            }
        }
        Ok(())
    }

    fn resolve_call(&self, name: &str, argc: usize) -> Result<OpCode, ExprError> {
        if self.var_map.contains_key(name) || lookup_constant(name).is_some() {
            return Err(ExprError::NotCallable(name.to_string()));
        }
        let signature =
            lookup_function(name).ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;
        match (signature, argc) {
            (Signature::Unary(f), 1) | (Signature::UnaryOrBinary(f, _), 1) => Ok(OpCode::Call1(f)),
            (Signature::Binary(f), 2) | (Signature::UnaryOrBinary(_, f), 2) => Ok(OpCode::Call2(f)),
            (Signature::Variadic(fold), n) if n >= 2 => Ok(OpCode::Fold(fold, n)),
            _ => Err(ExprError::Arity {
                name: name.to_string(),
                expected: signature.describe().to_string(),
                found: argc,
            }),
        }
    }
}

// --- Simple Parser ---

/// Rewrites every `^` into the native power operator `**`.
pub fn normalize(input: &str) -> String {
    input.replace('^', "**")
}

/// Parses a string expression into an AST. `^` is accepted as power.
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(&normalize(input))?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
    };
    let (expr, _) = parser.parse_comparison()?;
    match parser.peek_spanned() {
        None => Ok(expr),
        Some(extra) => Err(ExprError::UnexpectedToken {
            found: extra.token.describe(),
            pos: extra.pos,
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
    Comma,
    Cmp(CompareOp),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Identifier(name) => format!("name '{name}'"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::DoubleStar => "'**'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::DoubleSlash => "'//'".to_string(),
            Token::Percent => "'%'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Cmp(op) => format!("comparison {op:?}"),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    pos: usize,
}

fn tokenize(input: &str) -> Result<Vec<Spanned>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let token = if c.is_ascii_digit() || c == '.' {
            i = scan_number(&chars, i);
            let text: String = chars[start..i].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| ExprError::InvalidNumber(text.clone()))?;
            Token::Number(value)
        } else if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            Token::Identifier(chars[start..i].iter().collect())
        } else {
            let next = chars.get(i + 1).copied();
            let (token, width) = match (c, next) {
                ('*', Some('*')) => (Token::DoubleStar, 2),
                ('/', Some('/')) => (Token::DoubleSlash, 2),
                ('<', Some('=')) => (Token::Cmp(CompareOp::Le), 2),
                ('>', Some('=')) => (Token::Cmp(CompareOp::Ge), 2),
                ('=', Some('=')) => (Token::Cmp(CompareOp::Eq), 2),
                ('!', Some('=')) => (Token::Cmp(CompareOp::Ne), 2),
                ('<', _) => (Token::Cmp(CompareOp::Lt), 1),
                ('>', _) => (Token::Cmp(CompareOp::Gt), 1),
                ('+', _) => (Token::Plus, 1),
                ('-', _) => (Token::Minus, 1),
                ('*', _) => (Token::Star, 1),
                ('/', _) => (Token::Slash, 1),
                ('%', _) => (Token::Percent, 1),
                ('(', _) => (Token::LParen, 1),
                (')', _) => (Token::RParen, 1),
                (',', _) => (Token::Comma, 1),
                _ => return Err(ExprError::UnexpectedChar { ch: c, pos: i }),
            };
            i += width;
            token
        };
        tokens.push(Spanned { token, pos: start });
    }
    Ok(tokens)
}

/// Returns the index one past the numeric literal starting at `i`:
/// digits, an optional fraction and an optional signed exponent.
fn scan_number(chars: &[char], mut i: usize) -> usize {
    let digits = |chars: &[char], mut i: usize| {
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    i = digits(chars, i);
    if chars.get(i) == Some(&'.') {
        i = digits(chars, i + 1);
    }
    if matches!(chars.get(i), Some('e') | Some('E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+') | Some('-')) {
            j += 1;
        }
        if chars.get(j).is_some_and(|c| c.is_ascii_digit()) {
            i = digits(chars, j);
        }
    }
    i
}

/// Deepest parenthesis, call, sign or power nesting the parser accepts.
pub const MAX_NESTING: usize = 200;
/// Deepest expression tree accepted; compiling and dropping a tree recurse
/// once per level.
pub const MAX_TREE_DEPTH: usize = 1000;

/// A parsed subexpression and the depth of its tree.
type Parsed = Result<(Expr, usize), ExprError>;

fn grow(depth: usize) -> Result<usize, ExprError> {
    if depth >= MAX_TREE_DEPTH {
        return Err(ExprError::TooDeep {
            limit: MAX_TREE_DEPTH,
        });
    }
    Ok(depth + 1)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_spanned(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Spanned> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn end_pos(&self) -> usize {
        self.tokens.last().map(|s| s.pos + 1).unwrap_or(0)
    }

    /// Runs `inner` one nesting level down.
    fn nested(&mut self, inner: impl FnOnce(&mut Self) -> Parsed) -> Parsed {
        if self.nesting >= MAX_NESTING {
            return Err(ExprError::TooDeep { limit: MAX_NESTING });
        }
        self.nesting += 1;
        let parsed = inner(self);
        self.nesting -= 1;
        parsed
    }

    fn parse_comparison(&mut self) -> Parsed {
        let (first, mut depth) = self.parse_arith()?;
        let mut links = Vec::new();
        while let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.consume();
            let (operand, operand_depth) = self.parse_arith()?;
            depth = depth.max(operand_depth);
            links.push((op, operand));
        }
        if links.is_empty() {
            Ok((first, depth))
        } else {
            Ok((Expr::Compare(Box::new(first), links), grow(depth)?))
        }
    }

    fn parse_arith(&mut self) -> Parsed {
        let (mut left, mut depth) = self.parse_term()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            let (right, right_depth) = self.parse_term()?;
            depth = grow(depth.max(right_depth))?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok((left, depth))
    }

    fn parse_term(&mut self) -> Parsed {
        let (mut left, mut depth) = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::DoubleSlash => BinaryOp::FloorDiv,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.consume();
            let (right, right_depth) = self.parse_unary()?;
            depth = grow(depth.max(right_depth))?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok((left, depth))
    }

    fn parse_unary(&mut self) -> Parsed {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.parse_power(),
        };
        self.consume();
        let (expr, depth) = self.nested(Self::parse_unary)?;
        Ok((Expr::Unary(op, Box::new(expr)), grow(depth)?))
    }

    /// `primary ** unary`: right-associative, and binds tighter than a
    /// unary minus on its left (`-2**2 == -4`).
    fn parse_power(&mut self) -> Parsed {
        let (base, base_depth) = self.parse_primary()?;
        if let Some(Token::DoubleStar) = self.peek() {
            self.consume();
            let (exponent, exponent_depth) = self.nested(Self::parse_unary)?;
            let depth = grow(base_depth.max(exponent_depth))?;
            return Ok((
                Expr::Binary(Box::new(base), BinaryOp::Pow, Box::new(exponent)),
                depth,
            ));
        }
        Ok((base, base_depth))
    }

    fn parse_primary(&mut self) -> Parsed {
        let Some(Spanned { token, pos }) = self.consume() else {
            return Err(ExprError::UnexpectedEnd);
        };
        match token {
            Token::Number(n) => Ok((Expr::Number(n), 1)),
            Token::Identifier(name) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume(); // eat '('
                    self.nested(|parser| {
                        let (args, depth) = parser.parse_arguments()?;
                        Ok((Expr::Call(name, args), grow(depth)?))
                    })
                } else {
                    Ok((Expr::Variable(name), 1))
                }
            }
            Token::LParen => self.nested(|parser| {
                let parsed = parser.parse_comparison()?;
                parser.expect_rparen()?;
                Ok(parsed)
            }),
            other => Err(ExprError::UnexpectedToken {
                found: other.describe(),
                pos,
            }),
        }
    }

    /// Comma-separated arguments after an opening '('; consumes the ')'.
    /// Returns the arguments and the depth of the deepest one.
    fn parse_arguments(&mut self) -> Result<(Vec<Expr>, usize), ExprError> {
        let mut args = Vec::new();
        let mut depth = 0;
        if let Some(Token::RParen) = self.peek() {
            self.consume();
            return Ok((args, depth));
        }
        loop {
            let (arg, arg_depth) = self.parse_comparison()?;
            depth = depth.max(arg_depth);
            args.push(arg);
            match self.peek() {
                Some(Token::Comma) => {
                    self.consume();
                }
                _ => break,
            }
        }
        self.expect_rparen()?;
        Ok((args, depth))
    }

    fn expect_rparen(&mut self) -> Result<(), ExprError> {
        match self.consume() {
            Some(Spanned {
                token: Token::RParen,
                ..
            }) => Ok(()),
            Some(Spanned { pos, .. }) => Err(ExprError::ExpectedRParen { pos }),
            None => Err(ExprError::ExpectedRParen {
                pos: self.end_pos(),
            }),
        }
    }
}
