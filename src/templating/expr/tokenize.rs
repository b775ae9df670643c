//! Quote-aware splitting of declaration and tag expressions.

use std::fmt;

/// A piece of an expression as written in the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprToken {
    /// `"` or `'`, opening or closing a string literal
    Quote(char),
    /// `(`
    Open,
    /// `)`
    Close,
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `#`
    Hash,
    /// `=`
    Equals,
    /// `[`
    BracketOpen,
    /// `]`
    BracketClose,
    /// Text between delimiters; trimmed outside quotes, verbatim inside
    Run(String),
}

impl fmt::Display for ExprToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quote(q) => write!(f, "{q}"),
            Self::Open => f.write_str("("),
            Self::Close => f.write_str(")"),
            Self::Question => f.write_str("?"),
            Self::Colon => f.write_str(":"),
            Self::Hash => f.write_str("#"),
            Self::Equals => f.write_str("="),
            Self::BracketOpen => f.write_str("["),
            Self::BracketClose => f.write_str("]"),
            Self::Run(text) => f.write_str(text),
        }
    }
}

fn delimiter(c: char) -> Option<ExprToken> {
    Some(match c {
        '(' => ExprToken::Open,
        ')' => ExprToken::Close,
        '?' => ExprToken::Question,
        ':' => ExprToken::Colon,
        '#' => ExprToken::Hash,
        '=' => ExprToken::Equals,
        '[' => ExprToken::BracketOpen,
        ']' => ExprToken::BracketClose,
        _ => return None,
    })
}

/// Split `expr` into delimiter and run tokens.
///
/// Line breaks are treated as spaces. Text inside a string literal is kept as a
/// single verbatim run, backslash escapes included; an unterminated literal
/// runs to the end of the input.
#[must_use]
pub fn tokenize(expr: &str) -> Vec<ExprToken> {
    let mut tokens = Vec::new();
    let mut run = String::new();
    let mut chars = expr.chars();

    fn flush(run: &mut String, tokens: &mut Vec<ExprToken>) {
        let trimmed = run.trim();
        if !trimmed.is_empty() {
            tokens.push(ExprToken::Run(trimmed.to_string()));
        }
        run.clear();
    }

    while let Some(c) = chars.next() {
        if c == '"' || c == '\'' {
            flush(&mut run, &mut tokens);
            tokens.push(ExprToken::Quote(c));

            let mut literal = String::new();
            let mut closed = false;
            while let Some(inner) = chars.next() {
                if inner == '\\' {
                    literal.push(inner);
                    if let Some(escaped) = chars.next() {
                        literal.push(escaped);
                    }
                } else if inner == c {
                    closed = true;
                    break;
                } else {
                    literal.push(inner);
                }
            }
            if !literal.is_empty() {
                tokens.push(ExprToken::Run(literal));
            }
            if closed {
                tokens.push(ExprToken::Quote(c));
            }
        } else if let Some(token) = delimiter(c) {
            flush(&mut run, &mut tokens);
            tokens.push(token);
        } else if c == '\n' || c == '\r' {
            run.push(' ');
        } else {
            run.push(c);
        }
    }

    flush(&mut run, &mut tokens);
    tokens
}
