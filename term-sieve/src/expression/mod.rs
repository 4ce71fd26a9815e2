//! Row-level predicate expressions.
//!
//! Rule contracts express each check as a SQL boolean expression over a single
//! record, for example `salary > 0 AND hired <= current_date()`. This module
//! parses that text once into an [`Expr`] tree and evaluates it per record with
//! SQL three-valued logic.
//!
//! ```rust
//! use term_sieve::expression::{Outcome, Predicate};
//! use term_sieve::record::Record;
//!
//! let predicate = Predicate::parse("id IS NULL OR CAST(id AS int) IS NOT NULL").unwrap();
//! let ok = Record::from_pairs([("id", Some("42"))]);
//! let bad = Record::from_pairs([("id", Some("forty-two"))]);
//! assert_eq!(predicate.check(&ok), Outcome::Satisfied);
//! assert_eq!(predicate.check(&bad), Outcome::Violated);
//! ```

mod eval;
mod lexer;
mod parser;

use crate::types::SqlType;
use crate::value::Value;
use regex::Regex;
use thiserror::Error;

pub use eval::evaluate;

/// Maximum nesting depth accepted by the parser.
pub const MAX_DEPTH: usize = 128;

/// Errors raised while parsing or evaluating an expression.
///
/// Parse errors make a rule unusable and it is dropped when rules are
/// compiled. Evaluation errors only affect the record being evaluated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExpressionError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{function}' expects {expected} argument(s), found {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("unsupported cast type '{0}'")]
    UnsupportedType(String),

    #[error("expression nested deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("arithmetic overflow in {0}")]
    Overflow(String),
}

/// Result alias for expression operations.
pub type ExprResult<T> = std::result::Result<T, ExpressionError>;

/// Read access to a record's fields.
///
/// `None` means the column does not exist; `Some(None)` means it is null.
pub trait FieldLookup {
    fn field(&self, column: &str) -> Option<Option<&str>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `<=>`: equality where two nulls are equal
    NullSafeEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
}

/// Built-in scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    ToDate,
    Length,
    Trim,
    LTrim,
    RTrim,
    Upper,
    Lower,
    Coalesce,
    Abs,
    Substring,
    Concat,
    CurrentDate,
    IsNull,
    IsNotNull,
}

impl Function {
    /// Resolves a function name, case-insensitively.
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "to_date" => Function::ToDate,
            "length" | "len" | "char_length" | "character_length" => Function::Length,
            "trim" => Function::Trim,
            "ltrim" => Function::LTrim,
            "rtrim" => Function::RTrim,
            "upper" | "ucase" => Function::Upper,
            "lower" | "lcase" => Function::Lower,
            "coalesce" | "nvl" | "ifnull" => Function::Coalesce,
            "abs" => Function::Abs,
            "substring" | "substr" => Function::Substring,
            "concat" => Function::Concat,
            "current_date" => Function::CurrentDate,
            "isnull" => Function::IsNull,
            "isnotnull" => Function::IsNotNull,
            _ => return None,
        })
    }

    /// Accepted argument counts as `(min, max)`; `None` means unbounded.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Function::CurrentDate => (0, Some(0)),
            Function::ToDate => (1, Some(2)),
            Function::Substring => (2, Some(3)),
            Function::Coalesce | Function::Concat => (1, None),
            _ => (1, Some(1)),
        }
    }
}

/// A pattern for `LIKE` / `RLIKE`: compiled up front when it is a literal.
#[derive(Debug, Clone)]
pub enum Matcher {
    Static(Regex),
    Dynamic(Box<Expr>),
}

/// A parsed expression.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Column(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Arithmetic {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Matcher,
        case_insensitive: bool,
        negated: bool,
    },
    RLike {
        expr: Box<Expr>,
        pattern: Matcher,
        negated: bool,
    },
    Cast {
        expr: Box<Expr>,
        to: SqlType,
    },
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    Function {
        func: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Parses expression text.
    pub fn parse(text: &str) -> ExprResult<Self> {
        parser::parse(text)
    }

    /// Names of all columns the expression reads.
    pub fn referenced_columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Column(name) => {
                if !out.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                    out.push(name.clone());
                }
            }
            Expr::Not(e) | Expr::Negate(e) => e.collect_columns(out),
            Expr::IsNull { expr, .. } | Expr::Cast { expr, .. } => expr.collect_columns(out),
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Expr::Compare { left, right, .. } | Expr::Arithmetic { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::InList { expr, list, .. } => {
                expr.collect_columns(out);
                list.iter().for_each(|e| e.collect_columns(out));
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.collect_columns(out);
                low.collect_columns(out);
                high.collect_columns(out);
            }
            Expr::Like { expr, pattern, .. } | Expr::RLike { expr, pattern, .. } => {
                expr.collect_columns(out);
                if let Matcher::Dynamic(p) = pattern {
                    p.collect_columns(out);
                }
            }
            Expr::Case {
                operand,
                branches,
                otherwise,
            } => {
                if let Some(op) = operand {
                    op.collect_columns(out);
                }
                for (when, then) in branches {
                    when.collect_columns(out);
                    then.collect_columns(out);
                }
                if let Some(e) = otherwise {
                    e.collect_columns(out);
                }
            }
            Expr::Function { args, .. } => args.iter().for_each(|e| e.collect_columns(out)),
        }
    }
}

/// The verdict of a predicate against one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The predicate was true or NULL
    Satisfied,
    /// The predicate was false
    Violated,
    /// Evaluation failed; treated as a violation
    Failed(ExpressionError),
}

impl Outcome {
    pub fn is_violation(&self) -> bool {
        !matches!(self, Outcome::Satisfied)
    }
}

/// A compiled boolean expression together with its source text.
#[derive(Debug, Clone)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    pub fn parse(source: impl Into<String>) -> ExprResult<Self> {
        let source = source.into();
        let expr = Expr::parse(&source)?;
        Ok(Self { source, expr })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluates the predicate. A NULL result counts as satisfied.
    pub fn check(&self, row: &dyn FieldLookup) -> Outcome {
        match evaluate(&self.expr, row).and_then(|v| eval::truth(&v)) {
            Ok(Some(false)) => Outcome::Violated,
            Ok(_) => Outcome::Satisfied,
            Err(err) => Outcome::Failed(err),
        }
    }
}
