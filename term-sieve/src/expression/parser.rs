//! Recursive-descent parser for predicate expressions.
//!
//! Precedence, loosest first: `OR`, `AND`, `NOT`, predicates (comparison,
//! `IS NULL`, `IN`, `BETWEEN`, `LIKE`, `RLIKE`), `+ - ||`, `* / %`, unary minus.

use super::lexer::{tokenize, Spanned, Token};
use super::{ArithOp, CompareOp, Expr, ExprResult, ExpressionError, Function, Matcher, MAX_DEPTH};
use crate::types::SqlType;
use crate::value::{Decimal, Value};
use regex::Regex;

pub(crate) fn parse(input: &str) -> ExprResult<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(parser.error(format!("unexpected token {other:?}"))),
    }
}

/// Converts a SQL `LIKE` pattern into an anchored regular expression.
pub(crate) fn like_to_regex(pattern: &str, case_insensitive: bool) -> ExprResult<Regex> {
    let mut out = String::from(if case_insensitive { "(?is)^" } else { "(?s)^" });
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => out.push_str(&regex::escape("\\")),
            },
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    compile_regex(&out, pattern)
}

pub(crate) fn compile_regex(regex: &str, original: &str) -> ExprResult<Regex> {
    Regex::new(regex).map_err(|e| ExpressionError::InvalidPattern {
        pattern: original.to_string(),
        message: e.to_string(),
    })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Syntax {
            offset: self.tokens[self.pos].offset,
            message: message.into(),
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ExprResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {keyword}")))
        }
    }

    fn expect(&mut self, expected: Token) -> ExprResult<()> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}, found {:?}", self.peek())))
        }
    }

    fn enter(&mut self) -> ExprResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep);
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> ExprResult<Expr> {
        self.enter()?;
        let result = self.parse_or();
        self.depth -= 1;
        result
    }

    fn parse_or(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("AND") {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ExprResult<Expr> {
        if self.peek().is_keyword("NOT") {
            self.advance();
            self.enter()?;
            let inner = self.parse_not();
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner?)));
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            if let Some(op) = self.compare_op() {
                self.advance();
                let right = self.parse_additive()?;
                left = Expr::Compare {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                };
                continue;
            }

            if self.eat_keyword("IS") {
                let negated = self.eat_keyword("NOT");
                if self.eat_keyword("NULL") {
                    left = Expr::IsNull {
                        expr: Box::new(left),
                        negated,
                    };
                    continue;
                }
                let truth = if self.eat_keyword("TRUE") {
                    true
                } else if self.eat_keyword("FALSE") {
                    false
                } else {
                    return Err(self.error("expected NULL, TRUE or FALSE after IS"));
                };
                // `x IS [NOT] TRUE` is null-safe equality with a boolean
                let compare = Expr::Compare {
                    op: CompareOp::NullSafeEq,
                    left: Box::new(left),
                    right: Box::new(Expr::Literal(Value::Boolean(truth))),
                };
                left = if negated {
                    Expr::Not(Box::new(compare))
                } else {
                    compare
                };
                continue;
            }

            // Lookahead so a trailing `NOT` that is not part of a predicate is left alone.
            let negated = self.peek().is_keyword("NOT")
                && ["IN", "BETWEEN", "LIKE", "ILIKE", "RLIKE", "REGEXP"]
                    .iter()
                    .any(|k| self.peek_at(1).is_keyword(k));
            if negated {
                self.advance();
            }

            if self.eat_keyword("IN") {
                self.expect(Token::LParen)?;
                let mut list = vec![self.parse_expr()?];
                while *self.peek() == Token::Comma {
                    self.advance();
                    list.push(self.parse_expr()?);
                }
                self.expect(Token::RParen)?;
                left = Expr::InList {
                    expr: Box::new(left),
                    list,
                    negated,
                };
            } else if self.eat_keyword("BETWEEN") {
                let low = self.parse_additive()?;
                self.expect_keyword("AND")?;
                let high = self.parse_additive()?;
                left = Expr::Between {
                    expr: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                };
            } else if self.peek().is_keyword("LIKE") || self.peek().is_keyword("ILIKE") {
                let case_insensitive = self.peek().is_keyword("ILIKE");
                self.advance();
                let pattern = self.parse_additive()?;
                let pattern = match pattern {
                    Expr::Literal(Value::String(p)) => {
                        Matcher::Static(like_to_regex(&p, case_insensitive)?)
                    }
                    other => Matcher::Dynamic(Box::new(other)),
                };
                left = Expr::Like {
                    expr: Box::new(left),
                    pattern,
                    case_insensitive,
                    negated,
                };
            } else if self.eat_keyword("RLIKE") || self.eat_keyword("REGEXP") {
                let pattern = self.parse_additive()?;
                let pattern = match pattern {
                    Expr::Literal(Value::String(p)) => Matcher::Static(compile_regex(&p, &p)?),
                    other => Matcher::Dynamic(Box::new(other)),
                };
                left = Expr::RLike {
                    expr: Box::new(left),
                    pattern,
                    negated,
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn compare_op(&self) -> Option<CompareOp> {
        Some(match self.peek() {
            Token::Eq => CompareOp::Eq,
            Token::NotEq => CompareOp::NotEq,
            Token::Lt => CompareOp::Lt,
            Token::LtEq => CompareOp::LtEq,
            Token::Gt => CompareOp::Gt,
            Token::GtEq => CompareOp::GtEq,
            Token::NullSafeEq => CompareOp::NullSafeEq,
            _ => return None,
        })
    }

    fn parse_additive(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => ArithOp::Add,
                Token::Minus => ArithOp::Sub,
                Token::Concat => ArithOp::Concat,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => ArithOp::Mul,
                Token::Slash => ArithOp::Div,
                Token::Percent => ArithOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> ExprResult<Expr> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                self.enter()?;
                let inner = self.parse_unary();
                self.depth -= 1;
                Ok(match inner? {
                    Expr::Literal(Value::Int(i)) => Expr::Literal(Value::Int(-i)),
                    Expr::Literal(Value::Float(f)) => Expr::Literal(Value::Float(-f)),
                    Expr::Literal(Value::Decimal(d)) => {
                        Expr::Literal(Value::Decimal(Decimal::new(-d.mantissa(), d.scale())))
                    }
                    other => Expr::Negate(Box::new(other)),
                })
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> ExprResult<Expr> {
        match self.advance() {
            Token::Number(text) => number_literal(&text).ok_or_else(|| {
                self.error(format!("invalid numeric literal '{text}'"))
            }),
            Token::Str(text) => Ok(Expr::Literal(Value::String(text))),
            Token::Quoted(name) => Ok(Expr::Column(name)),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Word(word) => self.parse_word(word),
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_word(&mut self, word: String) -> ExprResult<Expr> {
        let upper = word.to_ascii_uppercase();
        match upper.as_str() {
            "NULL" => return Ok(Expr::Literal(Value::Null)),
            "TRUE" => return Ok(Expr::Literal(Value::Boolean(true))),
            "FALSE" => return Ok(Expr::Literal(Value::Boolean(false))),
            "CASE" => return self.parse_case(),
            "CAST" if *self.peek() == Token::LParen => return self.parse_cast(),
            "CURRENT_DATE" if *self.peek() != Token::LParen => {
                return Ok(Expr::Function {
                    func: Function::CurrentDate,
                    args: Vec::new(),
                })
            }
            "DATE" => {
                // DATE 'yyyy-mm-dd' literal
                if let Token::Str(text) = self.peek().clone() {
                    self.advance();
                    return crate::value::parse_date_lenient(&text)
                        .map(|d| Expr::Literal(Value::Date(d)))
                        .ok_or_else(|| self.error(format!("invalid date literal '{text}'")));
                }
            }
            _ => {}
        }

        if *self.peek() == Token::LParen {
            self.advance();
            let func =
                Function::lookup(&word).ok_or_else(|| ExpressionError::UnknownFunction(word.clone()))?;
            let mut args = Vec::new();
            if *self.peek() != Token::RParen {
                args.push(self.parse_expr()?);
                while *self.peek() == Token::Comma {
                    self.advance();
                    args.push(self.parse_expr()?);
                }
            }
            self.expect(Token::RParen)?;

            let (min, max) = func.arity();
            if args.len() < min || max.is_some_and(|max| args.len() > max) {
                let expected = match max {
                    Some(max) if max == min => min.to_string(),
                    Some(max) => format!("{min}-{max}"),
                    None => format!("at least {min}"),
                };
                return Err(ExpressionError::Arity {
                    function: word,
                    expected,
                    found: args.len(),
                });
            }
            return Ok(Expr::Function { func, args });
        }

        if is_reserved(&upper) {
            return Err(self.error(format!("unexpected keyword {word}")));
        }
        Ok(Expr::Column(word))
    }

    fn parse_cast(&mut self) -> ExprResult<Expr> {
        self.expect(Token::LParen)?;
        let expr = self.parse_expr()?;
        self.expect_keyword("AS")?;
        let type_text = self.parse_type_name()?;
        self.expect(Token::RParen)?;
        let to = SqlType::parse(&type_text)
            .ok_or_else(|| ExpressionError::UnsupportedType(type_text.clone()))?;
        Ok(Expr::Cast {
            expr: Box::new(expr),
            to,
        })
    }

    /// Reads `name` or `name(p[, s])` back into type text.
    fn parse_type_name(&mut self) -> ExprResult<String> {
        let mut text = match self.advance() {
            Token::Word(w) => w,
            other => return Err(self.error(format!("expected type name, found {other:?}"))),
        };
        if *self.peek() == Token::LParen {
            self.advance();
            text.push('(');
            loop {
                match self.advance() {
                    Token::Number(n) => text.push_str(&n),
                    Token::Comma => text.push(','),
                    Token::RParen => break,
                    other => {
                        return Err(self.error(format!("unexpected {other:?} in type parameters")))
                    }
                }
            }
            text.push(')');
        }
        Ok(text)
    }

    fn parse_case(&mut self) -> ExprResult<Expr> {
        let operand = if self.peek().is_keyword("WHEN") {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };

        let mut branches = Vec::new();
        while self.eat_keyword("WHEN") {
            let when = self.parse_expr()?;
            self.expect_keyword("THEN")?;
            let then = self.parse_expr()?;
            branches.push((when, then));
        }
        if branches.is_empty() {
            return Err(self.error("CASE requires at least one WHEN branch"));
        }

        let otherwise = if self.eat_keyword("ELSE") {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword("END")?;
        Ok(Expr::Case {
            operand,
            branches,
            otherwise,
        })
    }
}

fn is_reserved(upper: &str) -> bool {
    matches!(
        upper,
        "AND"
            | "OR"
            | "NOT"
            | "IS"
            | "IN"
            | "BETWEEN"
            | "LIKE"
            | "ILIKE"
            | "RLIKE"
            | "REGEXP"
            | "AS"
            | "WHEN"
            | "THEN"
            | "ELSE"
            | "END"
    )
}

fn number_literal(text: &str) -> Option<Expr> {
    if text.contains(['e', 'E']) {
        return text.parse::<f64>().ok().map(|f| Expr::Literal(Value::Float(f)));
    }
    if let Some((int_part, frac_part)) = text.split_once('.') {
        let scale = u8::try_from(frac_part.len()).ok()?;
        let digits = int_part.trim_start_matches('0').len() + frac_part.len();
        let precision = u8::try_from(digits.max(scale as usize).max(1)).ok()?;
        return Decimal::parse(text, precision, scale).map(|d| Expr::Literal(Value::Decimal(d)));
    }
    match text.parse::<i64>() {
        Ok(i) => Some(Expr::Literal(Value::Int(i))),
        Err(_) => {
            let precision = u8::try_from(text.trim_start_matches('0').len()).ok()?;
            Decimal::parse(text, precision, 0).map(|d| Expr::Literal(Value::Decimal(d)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Expr {
        parse(input).unwrap_or_else(|e| panic!("failed to parse '{input}': {e}"))
    }

    #[test]
    fn test_precedence_and_binds_tighter_than_or() {
        let expr = parse_ok("a = 1 OR b = 2 AND c = 3");
        match expr {
            Expr::Or(_, right) => assert!(matches!(*right, Expr::And(_, _))),
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn test_dtype_rule_shapes() {
        assert!(matches!(
            parse_ok("`id` IS NULL OR CAST(`id` AS decimal(10,2)) IS NOT NULL"),
            Expr::Or(_, _)
        ));
        assert!(matches!(
            parse_ok("hired IS NULL OR to_date(hired, 'yyyy-MM-dd') IS NOT NULL"),
            Expr::Or(_, _)
        ));
    }

    #[test]
    fn test_not_predicates() {
        assert!(matches!(
            parse_ok("status NOT IN ('a', 'b')"),
            Expr::InList { negated: true, .. }
        ));
        assert!(matches!(
            parse_ok("age NOT BETWEEN 1 AND 10"),
            Expr::Between { negated: true, .. }
        ));
        assert!(matches!(
            parse_ok("email NOT LIKE '%@%'"),
            Expr::Like { negated: true, .. }
        ));
        assert!(matches!(parse_ok("NOT (a > 1)"), Expr::Not(_)));
    }

    #[test]
    fn test_negative_literals_fold() {
        assert!(matches!(
            parse_ok("-5"),
            Expr::Literal(Value::Int(-5))
        ));
    }

    #[test]
    fn test_decimal_literal() {
        match parse_ok("0.25") {
            Expr::Literal(Value::Decimal(d)) => assert_eq!(d.to_string(), "0.25"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_case_expression() {
        assert!(matches!(
            parse_ok("CASE WHEN a > 1 THEN true ELSE false END"),
            Expr::Case { operand: None, .. }
        ));
        assert!(matches!(
            parse_ok("CASE grade WHEN 'A' THEN 1 END = 1"),
            Expr::Compare { .. }
        ));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse("a >").is_err());
        assert!(parse("(a > 1").is_err());
        assert!(parse("a > 1 b").is_err());
        assert!(parse("CAST(a AS array)").is_err());
        assert!(matches!(
            parse("explode(a)"),
            Err(ExpressionError::UnknownFunction(_))
        ));
        assert!(matches!(
            parse("upper(a, b)"),
            Err(ExpressionError::Arity { .. })
        ));
        assert!(matches!(
            parse("a RLIKE '('"),
            Err(ExpressionError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 5), ")".repeat(MAX_DEPTH + 5));
        assert_eq!(parse(&deep).unwrap_err(), ExpressionError::TooDeep);
    }

    #[test]
    fn test_like_translation() {
        let re = like_to_regex("A_c%", false).unwrap();
        assert!(re.is_match("Abcdef"));
        assert!(!re.is_match("xAbc"));
        let re = like_to_regex("100\\%", false).unwrap();
        assert!(re.is_match("100%"));
        assert!(!re.is_match("1000"));
        let re = like_to_regex("abc", true).unwrap();
        assert!(re.is_match("ABC"));
    }
}
