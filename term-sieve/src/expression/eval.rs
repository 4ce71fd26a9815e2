//! Evaluation of parsed expressions against a single record.
//!
//! Nulls propagate the way SQL defines them: comparisons and arithmetic with a
//! null operand yield null, `AND`/`OR` use three-valued logic. Column values
//! arrive as text and are coerced to the type of the other operand when
//! compared with numbers, dates or booleans.

use super::parser::{compile_regex, like_to_regex};
use super::{ArithOp, CompareOp, Expr, ExprResult, ExpressionError, FieldLookup, Function, Matcher};
use crate::types::SqlType;
use crate::value::{cast_str, cast_value, date_pattern_to_chrono, parse_date_with_format, Decimal, Value};
use chrono::NaiveTime;
use std::cmp::Ordering;

/// Evaluates an expression against a record.
pub fn evaluate(expr: &Expr, row: &dyn FieldLookup) -> ExprResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Column(name) => match row.field(name) {
            Some(value) => Ok(Value::from(value)),
            None => Err(ExpressionError::UnknownColumn(name.clone())),
        },
        Expr::Not(inner) => Ok(match truth(&evaluate(inner, row)?)? {
            Some(b) => Value::Boolean(!b),
            None => Value::Null,
        }),
        Expr::And(left, right) => {
            let l = truth(&evaluate(left, row)?)?;
            if l == Some(false) {
                return Ok(Value::Boolean(false));
            }
            let r = truth(&evaluate(right, row)?)?;
            Ok(match (l, r) {
                (_, Some(false)) => Value::Boolean(false),
                (Some(true), Some(true)) => Value::Boolean(true),
                _ => Value::Null,
            })
        }
        Expr::Or(left, right) => {
            let l = truth(&evaluate(left, row)?)?;
            if l == Some(true) {
                return Ok(Value::Boolean(true));
            }
            let r = truth(&evaluate(right, row)?)?;
            Ok(match (l, r) {
                (_, Some(true)) => Value::Boolean(true),
                (Some(false), Some(false)) => Value::Boolean(false),
                _ => Value::Null,
            })
        }
        Expr::Compare { op, left, right } => {
            let l = evaluate(left, row)?;
            let r = evaluate(right, row)?;
            if *op == CompareOp::NullSafeEq {
                return Ok(Value::Boolean(match (l.is_null(), r.is_null()) {
                    (true, true) => true,
                    (false, false) => compare(&l, &r)? == Some(Ordering::Equal),
                    _ => false,
                }));
            }
            Ok(match compare(&l, &r)? {
                Some(ordering) => Value::Boolean(match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::NotEq => ordering != Ordering::Equal,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::LtEq => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::GtEq => ordering != Ordering::Less,
                    CompareOp::NullSafeEq => ordering == Ordering::Equal,
                }),
                None => Value::Null,
            })
        }
        Expr::Arithmetic { op, left, right } => {
            arithmetic(*op, &evaluate(left, row)?, &evaluate(right, row)?)
        }
        Expr::Negate(inner) => negate(&evaluate(inner, row)?),
        Expr::IsNull { expr, negated } => {
            Ok(Value::Boolean(evaluate(expr, row)?.is_null() != *negated))
        }
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let value = evaluate(expr, row)?;
            if value.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                let candidate = evaluate(item, row)?;
                if candidate.is_null() {
                    saw_null = true;
                } else if compare(&value, &candidate)? == Some(Ordering::Equal) {
                    return Ok(Value::Boolean(!negated));
                }
            }
            Ok(if saw_null {
                Value::Null
            } else {
                Value::Boolean(*negated)
            })
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let value = evaluate(expr, row)?;
            let above = compare(&value, &evaluate(low, row)?)?.map(|o| o != Ordering::Less);
            let below = compare(&value, &evaluate(high, row)?)?.map(|o| o != Ordering::Greater);
            let within = match (above, below) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            };
            Ok(within.map_or(Value::Null, |b| Value::Boolean(b != *negated)))
        }
        Expr::Like {
            expr,
            pattern,
            case_insensitive,
            negated,
        } => {
            let Some(text) = evaluate(expr, row)?.to_text() else {
                return Ok(Value::Null);
            };
            let matched = match pattern {
                Matcher::Static(regex) => regex.is_match(&text),
                Matcher::Dynamic(p) => match evaluate(p, row)?.to_text() {
                    Some(p) => like_to_regex(&p, *case_insensitive)?.is_match(&text),
                    None => return Ok(Value::Null),
                },
            };
            Ok(Value::Boolean(matched != *negated))
        }
        Expr::RLike {
            expr,
            pattern,
            negated,
        } => {
            let Some(text) = evaluate(expr, row)?.to_text() else {
                return Ok(Value::Null);
            };
            let matched = match pattern {
                Matcher::Static(regex) => regex.is_match(&text),
                Matcher::Dynamic(p) => match evaluate(p, row)?.to_text() {
                    Some(p) => compile_regex(&p, &p)?.is_match(&text),
                    None => return Ok(Value::Null),
                },
            };
            Ok(Value::Boolean(matched != *negated))
        }
        Expr::Cast { expr, to } => Ok(cast_value(&evaluate(expr, row)?, to)),
        Expr::Case {
            operand,
            branches,
            otherwise,
        } => {
            let operand = operand.as_ref().map(|o| evaluate(o, row)).transpose()?;
            for (when, then) in branches {
                let condition = evaluate(when, row)?;
                let hit = match &operand {
                    Some(value) => compare(value, &condition)? == Some(Ordering::Equal),
                    None => truth(&condition)? == Some(true),
                };
                if hit {
                    return evaluate(then, row);
                }
            }
            match otherwise {
                Some(e) => evaluate(e, row),
                None => Ok(Value::Null),
            }
        }
        Expr::Function { func, args } => call(*func, args, row),
    }
}

/// Interprets a value as a SQL boolean; `None` is unknown.
pub(crate) fn truth(value: &Value) -> ExprResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        Value::String(s) => match cast_str(s, &SqlType::Boolean) {
            Value::Boolean(b) => Ok(Some(b)),
            _ => Err(ExpressionError::TypeMismatch(format!(
                "'{s}' is not a boolean"
            ))),
        },
        other => Err(ExpressionError::TypeMismatch(format!(
            "{} used as a condition",
            other.type_name()
        ))),
    }
}

fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_) | Value::Decimal(_))
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Decimal(d) => Some(d.to_f64()),
        _ => None,
    }
}

fn compare_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn compare_numeric(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Decimal(a), Value::Decimal(b)) => a.compare(b),
        (Value::Int(a), Value::Decimal(b)) => Decimal::new(*a as i128, 0).compare(b),
        (Value::Decimal(a), Value::Int(b)) => a.compare(&Decimal::new(*b as i128, 0)),
        _ => None,
    }
    .or_else(|| Some(compare_f64(to_f64(left)?, to_f64(right)?)))
}

/// Orders two values after coercing text to the other operand's type.
/// Returns `None` when either side is null or text fails to coerce.
fn compare(left: &Value, right: &Value) -> ExprResult<Option<Ordering>> {
    use Value::*;
    Ok(match (left, right) {
        (Null, _) | (_, Null) => None,
        (String(a), String(b)) => Some(a.cmp(b)),
        (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
        (Date(a), Date(b)) => Some(a.cmp(b)),
        (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
        (Date(a), Timestamp(b)) => Some(a.and_time(NaiveTime::MIN).cmp(b)),
        (Timestamp(a), Date(b)) => Some(a.cmp(&b.and_time(NaiveTime::MIN))),
        (l, r) if is_numeric(l) && is_numeric(r) => compare_numeric(l, r),
        (String(s), other) | (other, String(s)) => {
            let target = match other {
                Int(_) | Float(_) | Decimal(_) => SqlType::Double,
                Boolean(_) => SqlType::Boolean,
                Date(_) => SqlType::Date,
                Timestamp(_) => SqlType::Timestamp,
                _ => unreachable!("string and null pairs are matched above"),
            };
            let coerced = cast_str(s, &target);
            if coerced.is_null() {
                return Ok(None);
            }
            if matches!(left, String(_)) {
                compare(&coerced, other)?
            } else {
                compare(other, &coerced)?
            }
        }
        (l, r) => {
            return Err(ExpressionError::TypeMismatch(format!(
                "cannot compare {} with {}",
                l.type_name(),
                r.type_name()
            )))
        }
    })
}

enum Num {
    Int(i64),
    Float(f64),
}

fn numeric_operand(value: &Value, op: &str) -> ExprResult<Option<Num>> {
    Ok(match value {
        Value::Null => None,
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        Value::Decimal(d) => Some(Num::Float(d.to_f64())),
        Value::String(s) => match cast_str(s, &SqlType::Double) {
            Value::Float(f) => Some(Num::Float(f)),
            _ => None,
        },
        other => {
            return Err(ExpressionError::TypeMismatch(format!(
                "{} operand for {op}",
                other.type_name()
            )))
        }
    })
}

fn arithmetic(op: ArithOp, left: &Value, right: &Value) -> ExprResult<Value> {
    if op == ArithOp::Concat {
        return Ok(match (left.to_text(), right.to_text()) {
            (Some(l), Some(r)) => Value::String(l + &r),
            _ => Value::Null,
        });
    }

    let name = format!("{op:?}").to_lowercase();
    let (Some(l), Some(r)) = (numeric_operand(left, &name)?, numeric_operand(right, &name)?)
    else {
        return Ok(Value::Null);
    };

    let overflow = || ExpressionError::Overflow(name.clone());
    Ok(match (l, r) {
        (Num::Int(a), Num::Int(b)) => match op {
            ArithOp::Add => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
            ArithOp::Sub => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
            ArithOp::Mul => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
            ArithOp::Div if b == 0 => Value::Null,
            ArithOp::Div => Value::Float(a as f64 / b as f64),
            ArithOp::Mod if b == 0 => Value::Null,
            ArithOp::Mod => Value::Int(a.checked_rem(b).ok_or_else(overflow)?),
            ArithOp::Concat => unreachable!("handled above"),
        },
        (l, r) => {
            let a = match l {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            let b = match r {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            match op {
                ArithOp::Add => Value::Float(a + b),
                ArithOp::Sub => Value::Float(a - b),
                ArithOp::Mul => Value::Float(a * b),
                ArithOp::Div | ArithOp::Mod if b == 0.0 => Value::Null,
                ArithOp::Div => Value::Float(a / b),
                ArithOp::Mod => Value::Float(a % b),
                ArithOp::Concat => unreachable!("handled above"),
            }
        }
    })
}

fn negate(value: &Value) -> ExprResult<Value> {
    Ok(match value {
        Value::Null => Value::Null,
        Value::Int(i) => Value::Int(
            i.checked_neg()
                .ok_or_else(|| ExpressionError::Overflow("negation".to_string()))?,
        ),
        Value::Float(f) => Value::Float(-f),
        Value::Decimal(d) => Value::Decimal(Decimal::new(-d.mantissa(), d.scale())),
        Value::String(s) => match cast_str(s, &SqlType::Double) {
            Value::Float(f) => Value::Float(-f),
            _ => Value::Null,
        },
        other => {
            return Err(ExpressionError::TypeMismatch(format!(
                "cannot negate {}",
                other.type_name()
            )))
        }
    })
}

fn integer_arg(value: &Value) -> ExprResult<Option<i64>> {
    Ok(match cast_value(value, &SqlType::BigInt) {
        Value::Int(i) => Some(i),
        _ if value.is_null() => None,
        _ => {
            return Err(ExpressionError::TypeMismatch(format!(
                "'{value}' is not an integer"
            )))
        }
    })
}

fn text_fn(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    value.to_text().map_or(Value::Null, |t| Value::String(f(&t)))
}

fn call(func: Function, args: &[Expr], row: &dyn FieldLookup) -> ExprResult<Value> {
    let arg = |i: usize| evaluate(&args[i], row);

    Ok(match func {
        Function::CurrentDate => Value::Date(chrono::Utc::now().date_naive()),
        Function::IsNull => Value::Boolean(arg(0)?.is_null()),
        Function::IsNotNull => Value::Boolean(!arg(0)?.is_null()),
        Function::Coalesce => {
            for expr in args {
                let value = evaluate(expr, row)?;
                if !value.is_null() {
                    return Ok(value);
                }
            }
            Value::Null
        }
        Function::Concat => {
            let mut out = String::new();
            for expr in args {
                match evaluate(expr, row)?.to_text() {
                    Some(text) => out.push_str(&text),
                    None => return Ok(Value::Null),
                }
            }
            Value::String(out)
        }
        Function::Length => arg(0)?
            .to_text()
            .map_or(Value::Null, |t| Value::Int(t.chars().count() as i64)),
        Function::Trim => text_fn(arg(0)?, |t| t.trim_matches(' ').to_string()),
        Function::LTrim => text_fn(arg(0)?, |t| t.trim_start_matches(' ').to_string()),
        Function::RTrim => text_fn(arg(0)?, |t| t.trim_end_matches(' ').to_string()),
        Function::Upper => text_fn(arg(0)?, str::to_uppercase),
        Function::Lower => text_fn(arg(0)?, str::to_lowercase),
        Function::Abs => match arg(0)? {
            Value::Int(i) => Value::Int(
                i.checked_abs()
                    .ok_or_else(|| ExpressionError::Overflow("abs".to_string()))?,
            ),
            Value::Decimal(d) => Value::Decimal(Decimal::new(d.mantissa().abs(), d.scale())),
            other => match numeric_operand(&other, "abs")? {
                Some(Num::Float(f)) => Value::Float(f.abs()),
                Some(Num::Int(i)) => Value::Int(i.saturating_abs()),
                None => Value::Null,
            },
        },
        Function::Substring => {
            let Some(text) = arg(0)?.to_text() else {
                return Ok(Value::Null);
            };
            let Some(pos) = integer_arg(&arg(1)?)? else {
                return Ok(Value::Null);
            };
            let length = match args.len() {
                3 => match integer_arg(&arg(2)?)? {
                    Some(len) => len,
                    None => return Ok(Value::Null),
                },
                _ => i32::MAX as i64,
            };
            Value::String(substring(&text, pos, length))
        }
        Function::ToDate => {
            let value = arg(0)?;
            match (&value, args.len()) {
                (Value::Null, _) => Value::Null,
                (Value::Date(d), _) => Value::Date(*d),
                (Value::Timestamp(t), _) => Value::Date(t.date()),
                (_, 2) => {
                    let Some(pattern) = arg(1)?.to_text() else {
                        return Ok(Value::Null);
                    };
                    let format = date_pattern_to_chrono(&pattern).ok_or_else(|| {
                        ExpressionError::InvalidPattern {
                            pattern: pattern.clone(),
                            message: "unsupported date pattern".to_string(),
                        }
                    })?;
                    value
                        .to_text()
                        .and_then(|t| parse_date_with_format(&t, &format))
                        .map_or(Value::Null, Value::Date)
                }
                _ => cast_value(&value, &SqlType::Date),
            }
        }
    })
}

/// One-based substring where a negative start counts from the end.
fn substring(text: &str, pos: i64, length: i64) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;
    let start = match pos {
        p if p > 0 => p - 1,
        p if p < 0 => len + p,
        _ => 0,
    };
    let end = start.saturating_add(length).min(len);
    let start = start.max(0);
    if start >= end {
        return String::new();
    }
    chars[start as usize..end as usize].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn eval_on(expr: &str, record: &Record) -> Value {
        let parsed = Expr::parse(expr).unwrap();
        evaluate(&parsed, record).unwrap()
    }

    fn employee() -> Record {
        Record::from_pairs([
            ("id", Some("7")),
            ("name", Some("  Ann ")),
            ("salary", Some("1234.50")),
            ("hired", Some("2024-01-05")),
            ("dept", None),
        ])
    }

    #[test]
    fn test_string_number_comparison() {
        let r = employee();
        assert_eq!(eval_on("id > 0", &r), Value::Boolean(true));
        assert_eq!(eval_on("id = 7.0", &r), Value::Boolean(true));
        assert_eq!(eval_on("salary BETWEEN 1000 AND 2000", &r), Value::Boolean(true));
        assert_eq!(eval_on("name > 0", &r), Value::Null);
    }

    #[test]
    fn test_three_valued_logic() {
        let r = employee();
        assert_eq!(eval_on("dept = 'x'", &r), Value::Null);
        assert_eq!(eval_on("dept = 'x' OR id = 7", &r), Value::Boolean(true));
        assert_eq!(eval_on("dept = 'x' AND id = 8", &r), Value::Boolean(false));
        assert_eq!(eval_on("dept = 'x' AND id = 7", &r), Value::Null);
        assert_eq!(eval_on("NOT (dept = 'x')", &r), Value::Null);
        assert_eq!(eval_on("dept <=> NULL", &r), Value::Boolean(true));
    }

    #[test]
    fn test_in_list_null_semantics() {
        let r = employee();
        assert_eq!(eval_on("id IN (1, 7)", &r), Value::Boolean(true));
        assert_eq!(eval_on("id NOT IN (1, 2)", &r), Value::Boolean(true));
        assert_eq!(eval_on("id IN (1, NULL)", &r), Value::Null);
        assert_eq!(eval_on("dept IN ('a')", &r), Value::Null);
    }

    #[test]
    fn test_cast_checks() {
        let r = employee();
        assert_eq!(eval_on("CAST(id AS int) IS NOT NULL", &r), Value::Boolean(true));
        assert_eq!(eval_on("CAST(name AS int) IS NULL", &r), Value::Boolean(true));
        assert_eq!(
            eval_on("CAST(salary AS decimal(10,2))", &r).to_text().unwrap(),
            "1234.50"
        );
        assert_eq!(
            eval_on("CAST(salary AS decimal(5,2)) IS NULL", &r),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_to_date() {
        let r = employee();
        assert_eq!(
            eval_on("to_date(hired, 'yyyy-MM-dd') IS NOT NULL", &r),
            Value::Boolean(true)
        );
        assert_eq!(eval_on("to_date(name, 'yyyy-MM-dd')", &r), Value::Null);
        assert_eq!(
            eval_on("to_date(hired) < DATE '2025-01-01'", &r),
            Value::Boolean(true)
        );
        assert_eq!(
            eval_on("hired < '2025-01-01'", &r),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_string_functions() {
        let r = employee();
        assert_eq!(eval_on("trim(name)", &r), Value::String("Ann".into()));
        assert_eq!(eval_on("length(trim(name)) = 3", &r), Value::Boolean(true));
        assert_eq!(eval_on("upper(trim(name))", &r), Value::String("ANN".into()));
        assert_eq!(eval_on("coalesce(dept, 'none')", &r), Value::String("none".into()));
        assert_eq!(eval_on("concat(id, '-', dept)", &r), Value::Null);
        assert_eq!(eval_on("id || '-x'", &r), Value::String("7-x".into()));
    }

    #[test]
    fn test_substring() {
        assert_eq!(substring("Spark SQL", 5, 1), "k");
        assert_eq!(substring("Spark SQL", -3, i32::MAX as i64), "SQL");
        assert_eq!(substring("Spark SQL", 0, 2), "Sp");
        assert_eq!(substring("abc", 10, 2), "");
        assert_eq!(substring("abc", -5, 3), "a");
    }

    #[test]
    fn test_like_and_rlike() {
        let r = Record::from_pairs([("email", Some("ann@example.com"))]);
        assert_eq!(eval_on("email LIKE '%@%.com'", &r), Value::Boolean(true));
        assert_eq!(eval_on("email NOT LIKE 'bob%'", &r), Value::Boolean(true));
        assert_eq!(eval_on("email RLIKE '^[a-z]+@'", &r), Value::Boolean(true));
        assert_eq!(eval_on("email ILIKE 'ANN%'", &r), Value::Boolean(true));
    }

    #[test]
    fn test_arithmetic() {
        let r = employee();
        assert_eq!(eval_on("id * 2", &r), Value::Float(14.0));
        assert_eq!(eval_on("2 + 3 * 4", &r), Value::Int(14));
        assert_eq!(eval_on("7 / 2", &r), Value::Float(3.5));
        assert_eq!(eval_on("7 % 0", &r), Value::Null);
        assert_eq!(eval_on("-id", &r), Value::Float(-7.0));
    }

    #[test]
    fn test_case_when() {
        let r = employee();
        assert_eq!(
            eval_on("CASE WHEN dept IS NULL THEN 'none' ELSE dept END", &r),
            Value::String("none".into())
        );
        assert_eq!(
            eval_on("CASE id WHEN 7 THEN 'seven' END", &r),
            Value::String("seven".into())
        );
    }

    #[test]
    fn test_errors() {
        let r = employee();
        let unknown = Expr::parse("nope = 1").unwrap();
        assert!(matches!(
            evaluate(&unknown, &r),
            Err(ExpressionError::UnknownColumn(_))
        ));
        let overflow = Expr::parse("9223372036854775807 + 1").unwrap();
        assert!(matches!(
            evaluate(&overflow, &r),
            Err(ExpressionError::Overflow(_))
        ));
        let mismatch = Expr::parse("DATE '2024-01-01' > TRUE").unwrap();
        assert!(matches!(
            evaluate(&mismatch, &r),
            Err(ExpressionError::TypeMismatch(_))
        ));
    }
}
