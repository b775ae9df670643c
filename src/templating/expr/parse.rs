//! Recursive-descent parser for qualified expressions.
//!
//! Precedence, lowest first:
//!
//! ```text
//! assignment    target = value            (right associative)
//! ternary       cond ? then : else
//! or / and      ||  &&
//! equality      ==  !=  (=== and !== are accepted as aliases)
//! relational    <  <=  >  >=
//! additive      +  -
//! multiplicative *  /  %
//! unary         !  -  +
//! postfix       .name  [index]
//! primary       number  string  true  false  null  identifier  ( expr )
//! ```

use serde_json::{Number, Value};

use super::qualify::SCOPE_ROOT;
use crate::core::{HandlebarError, Result};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal(Value),
    /// Bare identifier; only the scope root resolves to anything
    Root(String),
    /// `base.name`
    Member(Box<Expr>, String),
    /// `base[index]`
    Index(Box<Expr>, Box<Expr>),
    /// Prefix operator
    Unary(UnaryOp, Box<Expr>),
    /// Infix operator
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `cond ? then : else`
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// `target = value`, where target is a path rooted at the scope
    Assign(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(Number),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

// Longest first so `<=` wins over `<`
const PUNCTUATION: [&str; 24] = [
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "[", "]", ".", "?", ":", "=", "<",
    ">", "+", "-", "*", "/", "%", "!",
];

impl Expr {
    /// Parse a qualified expression.
    ///
    /// # Errors
    ///
    /// Returns [`HandlebarError::InvalidExpression`] on a syntax error or an
    /// assignment to something other than a scope path.
    ///
    /// # Examples
    ///
    /// ```
    /// use handlebar::templating::expr::Expr;
    /// use serde_json::json;
    ///
    /// let expr = Expr::parse(r#"_.n > 1 ? "many" : "one""#).unwrap();
    /// assert_eq!(expr.evaluate(&json!({"n": 3})), json!("many"));
    /// ```
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = lex(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let expr = parser.assignment()?;
        if let Some(extra) = parser.tokens.get(parser.pos) {
            return Err(parser.error(&format!("unexpected {}", describe(extra))));
        }
        Ok(expr)
    }

    /// Whether this expression names a location in the scope
    #[must_use]
    pub fn is_place(&self) -> bool {
        match self {
            Self::Root(name) => name == SCOPE_ROOT,
            Self::Member(base, _) | Self::Index(base, _) => base.is_place(),
            _ => false,
        }
    }
}

fn lex(source: &str) -> Result<Vec<Tok>> {
    let invalid = |reason: String| HandlebarError::InvalidExpression {
        expression: source.to_string(),
        reason,
    };

    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let mut i = 0;

    while i < source.len() {
        let c = source[i..].chars().next().unwrap_or(' ');

        if c.is_whitespace() {
            i += c.len_utf8();
        } else if c.is_ascii_digit() {
            let start = i;
            let mut is_float = false;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                is_float |= bytes[i] == b'.';
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                is_float = true;
                i += 1;
                if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
                    i += 1;
                }
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text = &source[start..i];
            let number = if is_float {
                text.parse::<f64>().ok().and_then(Number::from_f64)
            } else {
                text.parse::<i64>().ok().map(Number::from)
            };
            tokens.push(Tok::Num(number.ok_or_else(|| invalid(format!("bad number '{text}'")))?));
        } else if c == '"' || c == '\'' {
            let (literal, len) = lex_string(&source[i..]).ok_or_else(|| invalid("unterminated string".to_string()))?;
            tokens.push(Tok::Str(literal));
            i += len;
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while let Some(next) = source[i..].chars().next() {
                if !(next.is_alphanumeric() || next == '_' || next == '$') {
                    break;
                }
                i += next.len_utf8();
            }
            tokens.push(Tok::Ident(source[start..i].to_string()));
        } else {
            let punct = *PUNCTUATION
                .iter()
                .find(|p| source[i..].starts_with(**p))
                .ok_or_else(|| invalid(format!("unexpected character '{c}'")))?;
            tokens.push(Tok::Punct(punct));
            i += punct.len();
        }
    }

    Ok(tokens)
}

/// Lex a quoted string at the start of `s`, returning its value and byte length.
fn lex_string(s: &str) -> Option<(String, usize)> {
    let mut chars = s.char_indices();
    let (_, quote) = chars.next()?;
    let mut value = String::new();

    while let Some((i, c)) = chars.next() {
        if c == quote {
            return Some((value, i + c.len_utf8()));
        }
        if c != '\\' {
            value.push(c);
            continue;
        }
        let (_, escaped) = chars.next()?;
        value.push(match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        });
    }
    None
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Num(n) => format!("number {n}"),
        Tok::Str(s) => format!("string \"{s}\""),
        Tok::Ident(name) => format!("identifier '{name}'"),
        Tok::Punct(p) => format!("'{p}'"),
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> HandlebarError {
        HandlebarError::InvalidExpression {
            expression: self.source.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek_punct(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Tok::Punct(p)) => Some(*p),
            _ => None,
        }
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.peek_punct() == Some(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{punct}'")))
        }
    }

    fn assignment(&mut self) -> Result<Expr> {
        let target = self.ternary()?;
        if !self.eat("=") {
            return Ok(target);
        }
        if !target.is_place() || target == Expr::Root(SCOPE_ROOT.to_string()) {
            return Err(self.error("assignment target must be a path inside the scope"));
        }
        let value = self.assignment()?;
        Ok(Expr::Assign(Box::new(target), Box::new(value)))
    }

    fn ternary(&mut self) -> Result<Expr> {
        let cond = self.binary(0)?;
        if !self.eat("?") {
            return Ok(cond);
        }
        let then = self.assignment()?;
        self.expect(":")?;
        let otherwise = self.assignment()?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    /// Precedence climbing over the binary operator levels.
    fn binary(&mut self, level: usize) -> Result<Expr> {
        const LEVELS: [&[(&str, BinaryOp)]; 6] = [
            &[("||", BinaryOp::Or)],
            &[("&&", BinaryOp::And)],
            &[("===", BinaryOp::Eq), ("!==", BinaryOp::Ne), ("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
            &[("<=", BinaryOp::Le), (">=", BinaryOp::Ge), ("<", BinaryOp::Lt), (">", BinaryOp::Gt)],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
        ];

        let Some(operators) = LEVELS.get(level) else {
            return self.unary();
        };

        let mut left = self.binary(level + 1)?;
        'outer: loop {
            let Some(punct) = self.peek_punct() else {
                break;
            };
            for (symbol, op) in *operators {
                if punct == *symbol {
                    self.pos += 1;
                    let right = self.binary(level + 1)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            break;
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek_punct() {
            Some("!") => UnaryOp::Not,
            Some("-") => UnaryOp::Neg,
            Some("+") => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.pos += 1;
        Ok(Expr::Unary(op, Box::new(self.unary()?)))
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(".") {
                match self.tokens.get(self.pos) {
                    Some(Tok::Ident(name)) => {
                        expr = Expr::Member(Box::new(expr), name.clone());
                        self.pos += 1;
                    }
                    _ => return Err(self.error("expected a property name after '.'")),
                }
            } else if self.eat("[") {
                let index = self.assignment()?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let Some(token) = self.tokens.get(self.pos).cloned() else {
            return Err(self.error("unexpected end of expression"));
        };
        self.pos += 1;

        match token {
            Tok::Num(n) => Ok(Expr::Literal(Value::Number(n))),
            Tok::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Tok::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "undefined" => Expr::Literal(Value::Null),
                _ => Expr::Root(name),
            }),
            Tok::Punct("(") => {
                let inner = self.assignment()?;
                self.expect(")")?;
                Ok(inner)
            }
            other => Err(self.error(&format!("unexpected {}", describe(&other)))),
        }
    }
}
