//! Surface expression encoding used by the host bridge (spec §6).
//!
//! An `Expression` is what a host passes to `eval`/`observe`/`assume`: an
//! s-expression tree of operator application, symbol reference and literal
//! leaves. It is evaluated against an `Environment` to produce a family of
//! trace nodes; it is not itself evaluated by this crate (that lives in
//! `venture-trace`), only represented and walked.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A literal leaf value embeddable directly in an expression tree, mirroring
/// the subset of [`Value`] that a host can express syntactically (hosts
/// never write down an `Env`, `Procedure` or `Request` literal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Numeric literal.
    Number(f64),
    /// Boolean literal.
    Bool(bool),
    /// Atom literal (`#3`-style tags).
    Atom(u32),
    /// Quoted symbol literal, distinct from an unquoted `Symbol` reference.
    QuotedSymbol(String),
}

impl Literal {
    /// Lowers this literal into a runtime [`Value`].
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Number(x) => Value::Number(*x),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Atom(a) => Value::Atom(*a),
            Literal::QuotedSymbol(s) => Value::Symbol(Rc::from(s.as_str())),
        }
    }
}

/// A surface expression: either a literal, a variable reference, an
/// application of an operator expression to zero or more operand
/// expressions, or a procedure literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// A self-evaluating literal.
    Literal(Literal),
    /// A reference to a symbol bound in the evaluation environment.
    Variable(String),
    /// `(operator operand...)`.
    Application(Vec<Expression>),
    /// `(lambda (params...) body)`. Evaluating this builds a compound
    /// procedure closing over the environment it was evaluated in, without
    /// running `body` — only applying the resulting procedure does that.
    /// This is what lets `branch`'s two arms be passed through ordinary
    /// (eager) operand evaluation while still executing only the taken one:
    /// each arm is written as a zero-argument lambda, and `branch`'s
    /// request PSP applies only the one it picks.
    Lambda(Vec<String>, Rc<Expression>),
}

impl Expression {
    /// Builds a literal number expression.
    pub fn number(x: f64) -> Self {
        Expression::Literal(Literal::Number(x))
    }

    /// Builds a symbol reference expression.
    pub fn var(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    /// Builds an application expression from an operator and operands.
    pub fn apply(operator: Expression, operands: Vec<Expression>) -> Self {
        let mut parts = Vec::with_capacity(operands.len() + 1);
        parts.push(operator);
        parts.extend(operands);
        Expression::Application(parts)
    }

    /// Builds a procedure-literal expression closing over `body`.
    pub fn lambda(params: Vec<String>, body: Expression) -> Self {
        Expression::Lambda(params, Rc::new(body))
    }

    /// Builds a zero-argument thunk wrapping `body`, the shape `branch`'s
    /// arms and similar lazily-selected sub-expressions are written as.
    pub fn thunk(body: Expression) -> Self {
        Expression::lambda(Vec::new(), body)
    }

    /// Returns the operator sub-expression of an application, if this is one.
    pub fn operator(&self) -> Option<&Expression> {
        match self {
            Expression::Application(parts) => parts.first(),
            _ => None,
        }
    }

    /// Returns the operand sub-expressions of an application, if this is one.
    pub fn operands(&self) -> &[Expression] {
        match self {
            Expression::Application(parts) if parts.len() > 1 => &parts[1..],
            _ => &[],
        }
    }
}
