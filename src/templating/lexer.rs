//! Lexer for the template markup.
//!
//! The lexer turns (masked) resource text into a flat stream of tokens: literal
//! text runs and tags. Nesting is not tracked here; the extractor and the
//! compiler walk the token stream with an explicit depth counter or stack.
//!
//! | Marker | Token |
//! |---|---|
//! | `{$: "#id" \| a = 1 }` | [`TokenKind::Declaration`] |
//! | `{$: "#id" $}` | self-closing [`TokenKind::Declaration`] |
//! | `{$}` | [`TokenKind::Close`] |
//! | `{$* items }` | [`TokenKind::LoopStart`] |
//! | `{$= data.name $}` | [`TokenKind::Expression`] |
//! | `{$%12345%$}` | [`TokenKind::RawOutput`] |
//! | `{$/ note /$}` | [`TokenKind::Comment`] |
//! | `{$+ "base.html#page" $}` | [`TokenKind::Extends`] |
//!
//! `{$` followed by anything else is literal text.

use crate::constants::{COMMENT_CLOSE, RAW_CLOSE, TAG_OPEN};
use crate::core::{HandlebarError, Result};

/// The kind of a lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal text
    Text,
    /// Sub-template declaration
    Declaration {
        /// Identifier including the leading `#`
        id: String,
        /// Trimmed, non-empty pipe clauses in declaration order
        extras: Vec<String>,
        /// Whether the tag ended with `$}` (empty body, no close expected)
        self_closing: bool,
    },
    /// Block close `{$}`
    Close,
    /// Loop start; `source` is the expression naming the iterated value
    LoopStart {
        /// Loop source expression as written
        source: String,
    },
    /// Value output or include
    Expression {
        /// Expression as written, trimmed
        source: String,
    },
    /// Masked raw block
    RawOutput {
        /// The full sentinel text, delimiters included
        sentinel: String,
    },
    /// Comment block
    Comment,
    /// Extends declaration
    Extends {
        /// Parent reference (`resource#slot`)
        reference: String,
    },
}

impl TokenKind {
    /// Whether this token opens a block that a `{$}` must close
    #[must_use]
    pub fn opens_block(&self) -> bool {
        matches!(
            self,
            Self::LoopStart { .. }
                | Self::Declaration {
                    self_closing: false,
                    ..
                }
        )
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// Byte offset where the token starts
    pub start: usize,
    /// Byte offset one past the token end
    pub end: usize,
}

impl Token {
    /// The source text covered by this token
    #[must_use]
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        &input[self.start..self.end]
    }
}

/// The end of a `}`-terminated tag.
struct TagEnd {
    /// Offset one past the closing `}`
    end: usize,
    /// Offset where the tag's inner text stops (before `$}` or `}`)
    inner_end: usize,
    /// Whether the tag ended with `$}`
    self_closing: bool,
}

/// The lexer for template markup.
pub struct Lexer<'a> {
    /// The text being tokenized
    input: &'a str,
    /// Resource name used in diagnostics
    resource: &'a str,
    /// Current byte position in the input
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    pub fn new(input: &'a str, resource: &'a str) -> Self {
        Self {
            input,
            resource,
            pos: 0,
        }
    }

    /// Tokenizes the entire input.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Returns the next token, or None at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if self.pos >= self.input.len() {
            return Ok(None);
        }

        let start = self.pos;
        if let Some(marker) = self.marker_at(start) {
            let token = self.lex_tag(start, marker)?;
            self.pos = token.end;
            return Ok(Some(token));
        }

        let mut scan = start;
        let end = loop {
            match self.input[scan..].find(TAG_OPEN) {
                None => break self.input.len(),
                Some(rel) => {
                    let at = scan + rel;
                    if at > start && self.marker_at(at).is_some() {
                        break at;
                    }
                    scan = at + TAG_OPEN.len();
                }
            }
        };

        self.pos = end;
        Ok(Some(Token {
            kind: TokenKind::Text,
            start,
            end,
        }))
    }

    /// The tag marker byte following `{$` at `at`, if it starts a known tag.
    fn marker_at(&self, at: usize) -> Option<u8> {
        if !self.input[at..].starts_with(TAG_OPEN) {
            return None;
        }
        match self.input.as_bytes().get(at + TAG_OPEN.len()) {
            Some(&b) if matches!(b, b'}' | b':' | b'*' | b'=' | b'%' | b'/' | b'+') => Some(b),
            _ => None,
        }
    }

    fn lex_tag(&self, start: usize, marker: u8) -> Result<Token> {
        let body = start + TAG_OPEN.len() + 1;
        let (kind, end) = match marker {
            b'}' => (TokenKind::Close, body),
            b'%' => {
                let end = self.find_terminator(start, body, RAW_CLOSE)?;
                let sentinel = self.input[start..end].to_string();
                (
                    TokenKind::RawOutput {
                        sentinel,
                    },
                    end,
                )
            }
            b'/' => (TokenKind::Comment, self.find_terminator(start, body, COMMENT_CLOSE)?),
            b':' => {
                let tag = self.find_tag_end(start, body)?;
                let kind = self.parse_declaration(start, &self.input[body..tag.inner_end], tag.self_closing)?;
                (kind, tag.end)
            }
            b'*' => {
                let tag = self.find_tag_end(start, body)?;
                let source = self.input[body..tag.inner_end].trim().to_string();
                if source.is_empty() {
                    return Err(HandlebarError::InvalidExpression {
                        expression: self.input[start..tag.end].to_string(),
                        reason: "loop tag needs a value to iterate".to_string(),
                    });
                }
                (
                    TokenKind::LoopStart {
                        source,
                    },
                    tag.end,
                )
            }
            b'=' => {
                let tag = self.find_tag_end(start, body)?;
                let source = self.input[body..tag.inner_end].trim().to_string();
                if source.is_empty() {
                    return Err(HandlebarError::InvalidExpression {
                        expression: self.input[start..tag.end].to_string(),
                        reason: "expression tag is empty".to_string(),
                    });
                }
                (
                    TokenKind::Expression {
                        source,
                    },
                    tag.end,
                )
            }
            _ => {
                let tag = self.find_tag_end(start, body)?;
                let inner = self.input[body..tag.inner_end].trim();
                let reference = match split_quoted(inner) {
                    Some((reference, rest)) if rest.trim().is_empty() => reference.to_string(),
                    _ => {
                        return Err(HandlebarError::InvalidDeclaration {
                            resource: self.resource.to_string(),
                            offset: start,
                            reason: "extends needs a single quoted reference".to_string(),
                        });
                    }
                };
                (
                    TokenKind::Extends {
                        reference,
                    },
                    tag.end,
                )
            }
        };

        Ok(Token {
            kind,
            start,
            end,
        })
    }

    /// Parse the inside of `{$: ... }`.
    fn parse_declaration(&self, start: usize, inner: &str, self_closing: bool) -> Result<TokenKind> {
        let invalid = |reason: &str| HandlebarError::InvalidDeclaration {
            resource: self.resource.to_string(),
            offset: start,
            reason: reason.to_string(),
        };

        let (id, rest) =
            split_quoted(inner.trim_start()).ok_or_else(|| invalid("expected a quoted identifier"))?;
        if !id.starts_with('#') || id.len() < 2 {
            return Err(invalid("identifiers start with '#' and are not empty"));
        }

        let mut clauses = split_outside_quotes(rest, '|').into_iter();
        if clauses.next().is_some_and(|lead| !lead.trim().is_empty()) {
            return Err(invalid("declarations must be separated from the identifier by '|'"));
        }
        let extras = clauses.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string).collect();

        Ok(TokenKind::Declaration {
            id: id.to_string(),
            extras,
            self_closing,
        })
    }

    /// Find the `}` ending a tag, skipping quoted text.
    fn find_tag_end(&self, start: usize, from: usize) -> Result<TagEnd> {
        let mut quote: Option<char> = None;
        let mut escaped = false;
        let mut prev_dollar = false;

        for (rel, c) in self.input[from..].char_indices() {
            let at = from + rel;
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                prev_dollar = false;
                continue;
            }
            match c {
                '"' | '\'' => quote = Some(c),
                '}' => {
                    return Ok(TagEnd {
                        end: at + 1,
                        inner_end: if prev_dollar { at - 1 } else { at },
                        self_closing: prev_dollar,
                    });
                }
                _ => {}
            }
            prev_dollar = c == '$';
        }

        Err(self.unterminated(start))
    }

    /// Find a fixed terminator such as `%$}`, returning the offset past it.
    fn find_terminator(&self, start: usize, from: usize, terminator: &str) -> Result<usize> {
        self.input[from..]
            .find(terminator)
            .map(|rel| from + rel + terminator.len())
            .ok_or_else(|| self.unterminated(start))
    }

    fn unterminated(&self, start: usize) -> HandlebarError {
        HandlebarError::UnterminatedTag {
            resource: self.resource.to_string(),
            marker: self.input[start..start + TAG_OPEN.len() + 1].to_string(),
            offset: start,
        }
    }
}

/// Split a leading quoted string off `s`, returning (contents, remainder).
fn split_quoted(s: &str) -> Option<(&str, &str)> {
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let close = s[1..].find(quote)? + 1;
    Some((&s[1..close], &s[close + 1..]))
}

/// Split `s` on `sep`, ignoring separators inside quoted text.
fn split_outside_quotes(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut last = 0;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' {
            quote = Some(c);
        } else if c == sep {
            parts.push(&s[last..i]);
            last = i + c.len_utf8();
        }
    }
    parts.push(&s[last..]);
    parts
}
