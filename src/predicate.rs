//! Named predicates over system states, with boolean combinators.

use std::{
    fmt::{Debug, Display},
    sync::Arc,
};

use thiserror::Error;

use crate::{envelope::MessageEnvelope, state::SearchState};

////////////////////////////////////////////////////////////////////////////////

/// Failure raised by a predicate body. An exceptional outcome is a distinct
/// third result next to `true` and `false`, never silently coerced to
/// either.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{info}")]
pub struct EvalError {
    pub info: String,
}

impl EvalError {
    pub fn new(info: impl Into<String>) -> Self {
        Self { info: info.into() }
    }
}

////////////////////////////////////////////////////////////////////////////////

type TestFn = dyn Fn(&SearchState) -> Result<(bool, Option<String>), EvalError> + Send + Sync;

#[derive(Clone)]
enum Expr {
    Test(Arc<TestFn>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// A human-readable name plus a small expression tree of leaf test
/// functions combined with `not`, `and` and `or`.
///
/// Evaluation is uniform over the tree. `and`/`or` short-circuit, and an
/// error from any evaluated leaf propagates as an exceptional outcome.
#[derive(Clone)]
pub struct Predicate {
    name: Arc<str>,
    expr: Expr,
}

impl Predicate {
    /// Leaf predicate from an infallible boolean test.
    pub fn new(
        name: impl Into<String>,
        test: impl Fn(&SearchState) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::with_detail(name, move |s| Ok((test(s), None)))
    }

    /// Leaf predicate from the full test form: a value, an optional detail
    /// string shown in reports, or an evaluation error.
    pub fn with_detail(
        name: impl Into<String>,
        test: impl Fn(&SearchState) -> Result<(bool, Option<String>), EvalError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into().into(),
            expr: Expr::Test(Arc::new(test)),
        }
    }

    /// Holds when some network envelope satisfies `matches`.
    pub fn network_contains(
        name: impl Into<String>,
        matches: impl Fn(&MessageEnvelope) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, move |s| s.network().any(&matches))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    ////////////////////////////////////////////////////////////////////////////////

    pub fn negate(&self) -> Self {
        Self {
            name: format!("¬({})", self.name).into(),
            expr: Expr::Not(Box::new(self.expr.clone())),
        }
    }

    pub fn and(&self, other: &Predicate) -> Self {
        Self {
            name: format!("({}) ∧ ({})", self.name, other.name).into(),
            expr: Expr::And(Box::new(self.expr.clone()), Box::new(other.expr.clone())),
        }
    }

    pub fn or(&self, other: &Predicate) -> Self {
        Self {
            name: format!("({}) ∨ ({})", self.name, other.name).into(),
            expr: Expr::Or(Box::new(self.expr.clone()), Box::new(other.expr.clone())),
        }
    }

    /// `self → other`, evaluated as `¬self ∨ other`.
    pub fn implies(&self, other: &Predicate) -> Self {
        Self {
            name: format!("({}) → ({})", self.name, other.name).into(),
            expr: Expr::Or(
                Box::new(Expr::Not(Box::new(self.expr.clone()))),
                Box::new(other.expr.clone()),
            ),
        }
    }

    ////////////////////////////////////////////////////////////////////////////////

    /// Evaluate against a state and record the outcome.
    pub fn test(&self, state: &SearchState) -> PredicateResult {
        match eval(&self.expr, state) {
            Ok((value, detail)) => PredicateResult {
                predicate: self.clone(),
                value: Ok(value),
                detail,
            },
            Err(e) => PredicateResult {
                predicate: self.clone(),
                value: Err(e),
                detail: None,
            },
        }
    }

    /// Evaluate expecting `normal_value`: `None` when the outcome is the
    /// expected value, `Some(result)` for the opposite value or an
    /// exceptional outcome.
    pub fn test_expecting(
        &self,
        state: &SearchState,
        normal_value: bool,
    ) -> Option<PredicateResult> {
        let result = self.test(state);
        match result.value {
            Ok(v) if v == normal_value => None,
            _ => Some(result),
        }
    }
}

fn eval(expr: &Expr, state: &SearchState) -> Result<(bool, Option<String>), EvalError> {
    match expr {
        Expr::Test(f) => f(state),
        Expr::Not(e) => eval(e, state).map(|(v, d)| (!v, d)),
        Expr::And(a, b) => {
            let (va, da) = eval(a, state)?;
            if !va {
                return Ok((false, da));
            }
            let (vb, db) = eval(b, state)?;
            if !vb {
                return Ok((false, db));
            }
            Ok((true, combine(da, db, "and")))
        }
        Expr::Or(a, b) => {
            let (va, da) = eval(a, state)?;
            if va {
                return Ok((true, da));
            }
            let (vb, db) = eval(b, state)?;
            if vb {
                return Ok((true, db));
            }
            Ok((false, combine(da, db, "or")))
        }
    }
}

fn combine(a: Option<String>, b: Option<String>, op: &str) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(format!("({}) {} ({})", a, op, b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

impl Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Predicate({})", self.name)
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// The recorded outcome of one predicate evaluation.
#[derive(Debug, Clone)]
pub struct PredicateResult {
    predicate: Predicate,
    value: Result<bool, EvalError>,
    detail: Option<String>,
}

impl PredicateResult {
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// The boolean outcome, `None` for an exceptional one.
    pub fn value(&self) -> Option<bool> {
        self.value.as_ref().ok().copied()
    }

    pub fn exception_thrown(&self) -> bool {
        self.value.is_err()
    }

    pub fn eval_error(&self) -> Option<&EvalError> {
        self.value.as_ref().err()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// One-line report for logs and assertion messages. Long predicate
    /// names are truncated.
    pub fn error_message(&self) -> String {
        let mut name = self.predicate.name.to_string();
        if name.len() > 100 {
            name.truncate(100);
            name.push('…');
        }
        match &self.value {
            Err(e) => format!("{} raised an error: {}", name, e),
            Ok(v) => match &self.detail {
                Some(d) => format!("{} evaluated to {} ({})", name, v, d),
                None => format!("{} evaluated to {}", name, v),
            },
        }
    }
}

impl Display for PredicateResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error_message())
    }
}

////////////////////////////////////////////////////////////////////////////////
