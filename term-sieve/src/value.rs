//! Typed values and the cast semantics shared by predicates and the schema caster.
//!
//! Casting follows lenient SQL rules: a value that cannot be represented in
//! the target type becomes [`Value::Null`] instead of raising an error. Both
//! `CAST(..)` inside rule predicates and the final schema cast go through
//! [`cast_value`], so a value that passes a dtype rule always casts.

use crate::types::SqlType;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

/// A single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "bigint",
            Value::Float(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
        }
    }

    /// Textual form of the value, `None` for null.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Boolean(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format_float(*f)),
            Value::Decimal(d) => Some(d.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(t) => Some(t.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => write!(f, "{text}"),
            None => write!(f, "NULL"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Option<&str>> for Value {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Value::Null, Value::from)
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        (if f > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// A fixed-point decimal: `mantissa * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    scale: u8,
}

impl Decimal {
    pub fn new(mantissa: i128, scale: u8) -> Self {
        Self { mantissa, scale }
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Parses decimal text (optionally signed, with fraction and exponent) and
    /// rounds it half-up to `scale`. Returns `None` when the result needs more
    /// than `precision` digits.
    pub fn parse(text: &str, precision: u8, scale: u8) -> Option<Self> {
        let text = text.trim();
        let (negative, unsigned) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let (body, exponent) = match unsigned.find(['e', 'E']) {
            Some(pos) => (&unsigned[..pos], unsigned[pos + 1..].parse::<i32>().ok()?),
            None => (unsigned, 0),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let digits = format!("{int_part}{frac_part}");
        let digits = digits.trim_start_matches('0');
        if digits.len() > MAX_DIGITS {
            return None;
        }
        let unscaled: i128 = if digits.is_empty() { 0 } else { digits.parse().ok()? };

        // value = unscaled * 10^(exponent - frac_len); target = value * 10^scale
        let shift = i64::from(exponent) - frac_part.len() as i64 + i64::from(scale);
        let mantissa = if unscaled == 0 {
            0
        } else if shift >= 0 {
            unscaled.checked_mul(pow10(u32::try_from(shift).ok()?)?)?
        } else {
            let divisor = u32::try_from(shift.unsigned_abs()).ok().and_then(pow10);
            match divisor {
                Some(divisor) => {
                    let quotient = unscaled / divisor;
                    let remainder = unscaled % divisor;
                    if remainder >= divisor - remainder {
                        quotient + 1
                    } else {
                        quotient
                    }
                }
                None => 0,
            }
        };

        if mantissa >= pow10(precision as u32)? {
            return None;
        }
        Some(Self {
            mantissa: if negative { -mantissa } else { mantissa },
            scale,
        })
    }

    /// Re-expresses this decimal at a new precision and scale.
    pub fn rescale(&self, precision: u8, scale: u8) -> Option<Self> {
        Self::parse(&self.to_string(), precision, scale)
    }

    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    /// Integral part, truncated toward zero.
    pub fn trunc(&self) -> i128 {
        match pow10(self.scale as u32) {
            Some(divisor) => self.mantissa / divisor,
            None => 0,
        }
    }

    /// Compares two decimals exactly when their aligned mantissas fit in `i128`.
    pub fn compare(&self, other: &Decimal) -> Option<Ordering> {
        let scale = self.scale.max(other.scale);
        let left = self
            .mantissa
            .checked_mul(pow10((scale - self.scale) as u32)?)?;
        let right = other
            .mantissa
            .checked_mul(pow10((scale - other.scale) as u32)?)?;
        Some(left.cmp(&right))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

const MAX_DIGITS: usize = 38;

fn pow10(exp: u32) -> Option<i128> {
    10i128.checked_pow(exp)
}

/// Casts a value to the target type. Unrepresentable values become `Null`.
pub fn cast_value(value: &Value, target: &SqlType) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => cast_str(s, target),
        Value::Boolean(b) => match target {
            SqlType::Text => Value::String(b.to_string()),
            SqlType::Boolean => Value::Boolean(*b),
            SqlType::Float | SqlType::Double => Value::Float(if *b { 1.0 } else { 0.0 }),
            SqlType::Decimal { precision, scale } => {
                decimal_value(Decimal::parse(if *b { "1" } else { "0" }, *precision, *scale))
            }
            ty if ty.integer_range().is_some() => Value::Int(*b as i64),
            _ => Value::Null,
        },
        Value::Int(i) => match target {
            SqlType::Text => Value::String(i.to_string()),
            SqlType::Boolean => Value::Boolean(*i != 0),
            SqlType::Float => Value::Float(*i as f32 as f64),
            SqlType::Double => Value::Float(*i as f64),
            SqlType::Decimal { precision, scale } => {
                decimal_value(Decimal::parse(&i.to_string(), *precision, *scale))
            }
            ty => integral_in_range(*i as i128, ty),
        },
        Value::Float(f) => match target {
            SqlType::Text => Value::String(format_float(*f)),
            SqlType::Boolean => Value::Boolean(*f != 0.0),
            SqlType::Float => Value::Float(*f as f32 as f64),
            SqlType::Double => Value::Float(*f),
            SqlType::Decimal { precision, scale } if f.is_finite() => {
                decimal_value(Decimal::parse(&f.to_string(), *precision, *scale))
            }
            ty if ty.integer_range().is_some() && f.is_finite() => {
                integral_in_range(f.trunc() as i128, ty)
            }
            _ => Value::Null,
        },
        Value::Decimal(d) => match target {
            SqlType::Text => Value::String(d.to_string()),
            SqlType::Boolean => Value::Boolean(d.mantissa() != 0),
            SqlType::Float => Value::Float(d.to_f64() as f32 as f64),
            SqlType::Double => Value::Float(d.to_f64()),
            SqlType::Decimal { precision, scale } => decimal_value(d.rescale(*precision, *scale)),
            ty => integral_in_range(d.trunc(), ty),
        },
        Value::Date(d) => match target {
            SqlType::Text => Value::String(d.format("%Y-%m-%d").to_string()),
            SqlType::Date => Value::Date(*d),
            SqlType::Timestamp => Value::Timestamp(d.and_time(NaiveTime::MIN)),
            _ => Value::Null,
        },
        Value::Timestamp(t) => match target {
            SqlType::Text => Value::String(t.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            SqlType::Date => Value::Date(t.date()),
            SqlType::Timestamp => Value::Timestamp(*t),
            _ => Value::Null,
        },
    }
}

/// Casts raw text to the target type.
pub fn cast_str(text: &str, target: &SqlType) -> Value {
    match target {
        SqlType::Text => Value::String(text.to_string()),
        SqlType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "1" => Value::Boolean(true),
            "f" | "false" | "n" | "no" | "0" => Value::Boolean(false),
            _ => Value::Null,
        },
        SqlType::Float => parse_float(text).map_or(Value::Null, |f| Value::Float(f as f32 as f64)),
        SqlType::Double => parse_float(text).map_or(Value::Null, Value::Float),
        SqlType::Decimal { precision, scale } => {
            decimal_value(Decimal::parse(text, *precision, *scale))
        }
        SqlType::Date => parse_date_lenient(text).map_or(Value::Null, Value::Date),
        SqlType::Timestamp => parse_timestamp(text).map_or(Value::Null, Value::Timestamp),
        ty => parse_integral(text).map_or(Value::Null, |i| integral_in_range(i, ty)),
    }
}

fn decimal_value(decimal: Option<Decimal>) -> Value {
    decimal.map_or(Value::Null, Value::Decimal)
}

fn integral_in_range(value: i128, target: &SqlType) -> Value {
    match target.integer_range() {
        Some((min, max)) if value >= min as i128 && value <= max as i128 => {
            Value::Int(value as i64)
        }
        _ => Value::Null,
    }
}

/// Parses integral text. A fractional part of digits is accepted and truncated.
fn parse_integral(text: &str) -> Option<i128> {
    let text = text.trim();
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if int_part.is_empty()
        || int_part.len() > MAX_DIGITS
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let magnitude: i128 = int_part.parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim();
    let text = text
        .strip_suffix(['d', 'D', 'f', 'F'])
        .filter(|rest| rest.ends_with(|c: char| c.is_ascii_digit() || c == '.'))
        .unwrap_or(text);
    text.parse::<f64>().ok()
}

static LENIENT_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})(?:-(\d{1,2})(?:-(\d{1,2}))?)?(?:[T ].*)?$").expect("valid date regex")
});

/// Parses a date the way an untyped `CAST(.. AS date)` does: `yyyy`,
/// `yyyy-[m]m`, `yyyy-[m]m-[d]d`, optionally followed by a time part.
pub fn parse_date_lenient(text: &str) -> Option<NaiveDate> {
    let caps = LENIENT_DATE.captures(text.trim())?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2).map_or(Some(1), |m| m.as_str().parse().ok())?;
    let day = caps.get(3).map_or(Some(1), |d| d.as_str().parse().ok())?;
    NaiveDate::from_ymd_opt(year, month, day)
}

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Translates a `yyyy-MM-dd` style date pattern into a chrono format string.
///
/// Single-letter fields parse without padding. Text inside single quotes is
/// literal. Returns `None` for pattern letters that have no date equivalent.
pub fn date_pattern_to_chrono(pattern: &str) -> Option<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            let close = chars[i + 1..].iter().position(|&q| q == '\'')? + i + 1;
            if close == i + 1 {
                out.push('\'');
            }
            for &literal in &chars[i + 1..close] {
                push_literal(&mut out, literal);
            }
            i = close + 1;
            continue;
        }
        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }
        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let spec = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('D', _) => "%j",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            _ => return None,
        };
        out.push_str(spec);
        i += run;
    }
    Some(out)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Parses a date strictly against a `yyyy-MM-dd` style pattern.
///
/// The text must match the pattern exactly: `2024-1-5` does not match
/// `yyyy-MM-dd`.
pub fn parse_date_with_pattern(text: &str, pattern: &str) -> Option<NaiveDate> {
    let format = date_pattern_to_chrono(pattern)?;
    parse_date_with_format(text, &format)
}

/// Like [`parse_date_with_pattern`] with an already translated chrono format.
pub fn parse_date_with_format(text: &str, format: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(text, format).ok()?;
    (date.format(format).to_string() == text).then_some(date)
}
