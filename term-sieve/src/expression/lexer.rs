//! Tokenizer for predicate expressions.

use super::{ExprResult, ExpressionError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Bare word: identifier or keyword
    Word(String),
    /// Back-quoted identifier
    Quoted(String),
    Number(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    NullSafeEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Concat,
    Eof,
}

impl Token {
    /// True if this is the given keyword (case-insensitive).
    pub(crate) fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> ExprResult<Vec<Spanned>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let peek = chars.get(i + 1).map(|&(_, c)| c);
        let (token, consumed) = match c {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            ',' => (Token::Comma, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' => (Token::Star, 1),
            '/' => (Token::Slash, 1),
            '%' => (Token::Percent, 1),
            '=' if peek == Some('=') => (Token::Eq, 2),
            '=' => (Token::Eq, 1),
            '!' if peek == Some('=') => (Token::NotEq, 2),
            '|' if peek == Some('|') => (Token::Concat, 2),
            '<' => match peek {
                Some('=') if chars.get(i + 2).map(|&(_, c)| c) == Some('>') => {
                    (Token::NullSafeEq, 3)
                }
                Some('=') => (Token::LtEq, 2),
                Some('>') => (Token::NotEq, 2),
                _ => (Token::Lt, 1),
            },
            '>' if peek == Some('=') => (Token::GtEq, 2),
            '>' => (Token::Gt, 1),
            '\'' | '"' => {
                let (text, consumed) = read_string(&chars[i..], c, offset)?;
                (Token::Str(text), consumed)
            }
            '`' => {
                let (text, consumed) = read_quoted_ident(&chars[i..], offset)?;
                (Token::Quoted(text), consumed)
            }
            c if c.is_ascii_digit() || (c == '.' && peek.is_some_and(|p| p.is_ascii_digit())) => {
                let consumed = number_len(&chars[i..]);
                let text: String = chars[i..i + consumed].iter().map(|&(_, c)| c).collect();
                (Token::Number(text), consumed)
            }
            c if c.is_alphabetic() || c == '_' => {
                let consumed = chars[i..]
                    .iter()
                    .take_while(|&&(_, c)| c.is_alphanumeric() || c == '_')
                    .count();
                let text: String = chars[i..i + consumed].iter().map(|&(_, c)| c).collect();
                (Token::Word(text), consumed)
            }
            other => {
                return Err(ExpressionError::Syntax {
                    offset,
                    message: format!("unexpected character '{other}'"),
                })
            }
        };

        tokens.push(Spanned { token, offset });
        i += consumed;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: input.len(),
    });
    Ok(tokens)
}

/// Reads a string literal. Quotes are escaped by doubling or with a backslash;
/// backslash escapes of other characters follow SQL unescaping rules.
fn read_string(chars: &[(usize, char)], quote: char, offset: usize) -> ExprResult<(String, usize)> {
    let mut out = String::new();
    let mut i = 1;
    while i < chars.len() {
        let c = chars[i].1;
        if c == quote {
            if chars.get(i + 1).map(|&(_, c)| c) == Some(quote) {
                out.push(quote);
                i += 2;
                continue;
            }
            return Ok((out, i + 1));
        }
        if c == '\\' {
            let Some(&(_, escaped)) = chars.get(i + 1) else {
                break;
            };
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                // kept escaped so LIKE patterns can match literal wildcards
                '%' | '_' => {
                    out.push('\\');
                    out.push(escaped);
                }
                other => out.push(other),
            }
            i += 2;
            continue;
        }
        out.push(c);
        i += 1;
    }
    Err(ExpressionError::Syntax {
        offset,
        message: "unterminated string literal".to_string(),
    })
}

fn read_quoted_ident(chars: &[(usize, char)], offset: usize) -> ExprResult<(String, usize)> {
    let mut out = String::new();
    let mut i = 1;
    while i < chars.len() {
        let c = chars[i].1;
        if c == '`' {
            if chars.get(i + 1).map(|&(_, c)| c) == Some('`') {
                out.push('`');
                i += 2;
                continue;
            }
            return Ok((out, i + 1));
        }
        out.push(c);
        i += 1;
    }
    Err(ExpressionError::Syntax {
        offset,
        message: "unterminated quoted identifier".to_string(),
    })
}

fn number_len(chars: &[(usize, char)]) -> usize {
    let mut i = 0;
    let mut seen_dot = false;
    while let Some(&(_, c)) = chars.get(i) {
        if c.is_ascii_digit() {
            i += 1;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
            i += 1;
        } else {
            break;
        }
    }
    // exponent: e[+-]digits
    if let Some(&(_, e)) = chars.get(i) {
        if e == 'e' || e == 'E' {
            let mut j = i + 1;
            if matches!(chars.get(j), Some(&(_, '+' | '-'))) {
                j += 1;
            }
            if chars.get(j).is_some_and(|&(_, c)| c.is_ascii_digit()) {
                while chars.get(j).is_some_and(|&(_, c)| c.is_ascii_digit()) {
                    j += 1;
                }
                i = j;
            }
        }
    }
    i
}
