//! Sub-template extraction.
//!
//! A resource declares any number of sub-templates. Extraction walks the token
//! stream of the (masked, comment-free) text and cuts out the body of every
//! declaration by counting block opens against `{$}` closes. Declarations
//! nested inside another body are extracted as sub-templates of their own; the
//! enclosing body keeps them in place so the compiler can splice them inline.

use tracing::debug;

use crate::constants::{COMMENT_CLOSE, COMMENT_OPEN};
use crate::core::{HandlebarError, Result};
use crate::templating::lexer::{Lexer, Token, TokenKind};

/// The uncompiled text of one declared sub-template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTemplate {
    /// Identifier including the leading `#`
    pub id: String,
    /// Body text between the declaration tag and its matching close
    pub text: String,
    /// Pipe-clause declarations, run before the body on every render
    pub extras: Vec<String>,
}

/// Remove every `{$/ ... /$}` comment block.
///
/// A comment opener without a terminator is kept so the lexer can report it.
#[must_use]
pub fn strip_comments(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(COMMENT_OPEN) {
        let after = &rest[start + COMMENT_OPEN.len()..];
        let Some(rel_end) = after.find(COMMENT_CLOSE) else {
            break;
        };
        result.push_str(&rest[..start]);
        rest = &after[rel_end + COMMENT_CLOSE.len()..];
    }

    result.push_str(rest);
    result
}

/// Extract the sub-templates declared in `masked`.
///
/// With `only`, extraction stops once that identifier has been extracted;
/// text after its closing tag is never lexed.
///
/// # Errors
///
/// Returns [`HandlebarError::StructuralImbalance`] when a declaration's body
/// never closes, and propagates lexer errors for malformed tags.
pub fn extract(masked: &str, resource: &str, only: Option<&str>) -> Result<Vec<SubTemplate>> {
    let mut lexer = Lexer::new(masked, resource);
    let mut tokens = Vec::new();
    let mut templates = Vec::new();
    let mut index = 0;

    while pull(&mut lexer, &mut tokens, index)? {
        let token = &tokens[index];
        let TokenKind::Declaration {
            id,
            extras,
            self_closing,
        } = &token.kind
        else {
            index += 1;
            continue;
        };
        let (id, extras, self_closing, body_start) = (id.clone(), extras.clone(), *self_closing, token.end);

        let text = if self_closing {
            String::new()
        } else {
            let mut depth = 1usize;
            let mut cursor = index + 1;
            let mut body_end = None;
            while pull(&mut lexer, &mut tokens, cursor)? {
                let inner = &tokens[cursor];
                if inner.kind.opens_block() {
                    depth += 1;
                } else if inner.kind == TokenKind::Close {
                    depth -= 1;
                    if depth == 0 {
                        body_end = Some(inner.start);
                        break;
                    }
                }
                cursor += 1;
            }
            let end = body_end.ok_or_else(|| HandlebarError::StructuralImbalance {
                resource: resource.to_string(),
                id: id.clone(),
                unclosed: depth,
            })?;
            masked[body_start..end].to_string()
        };

        debug!("Extracted sub-template {}{} ({} bytes)", resource, id, text.len());
        let done = only == Some(id.as_str());
        templates.push(SubTemplate {
            id,
            text,
            extras,
        });

        if done {
            break;
        }
        index += 1;
    }

    Ok(templates)
}

/// Lex on demand until `tokens[index]` exists; `false` once the input ends.
fn pull(lexer: &mut Lexer<'_>, tokens: &mut Vec<Token>, index: usize) -> Result<bool> {
    while tokens.len() <= index {
        match lexer.next_token()? {
            Some(token) => tokens.push(token),
            None => return Ok(false),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("a{$/ one /$}b{$/two/$}c"), "abc");
        assert_eq!(strip_comments("keep {$/ open"), "keep {$/ open");
    }

    #[test]
    fn test_extract_nested_body_is_exact() {
        let text = r##"{$: "#outer" }A{$* data.list }[{$= item.value $}]{$}B{$}"##;
        let subs = extract(text, "page.html", None).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id, "#outer");
        assert_eq!(subs[0].text, "A{$* data.list }[{$= item.value $}]{$}B");
    }

    #[test]
    fn test_extract_nested_declarations_individually() {
        let text = r##"{$: "#a" | x = 1 }<{$: "#b" }inner{$}>{$}{$: "#c" $}"##;
        let subs = extract(text, "page.html", None).unwrap();
        let ids: Vec<&str> = subs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["#a", "#b", "#c"]);
        assert_eq!(subs[0].text, r##"<{$: "#b" }inner{$}>"##);
        assert_eq!(subs[0].extras, vec!["x = 1".to_string()]);
        assert_eq!(subs[1].text, "inner");
        assert_eq!(subs[2].text, "");
    }

    #[test]
    fn test_extract_only_stops_at_match() {
        let text = r##"{$: "#a" }1{$}{$: "#b" }2{$}{$: "#c" }3"##;
        // "#c" is never closed, but extraction stops before reaching it
        let subs = extract(text, "page.html", Some("#b")).unwrap();
        assert_eq!(subs.last().map(|s| s.id.as_str()), Some("#b"));
    }

    #[test]
    fn test_extract_only_ignores_malformed_tags_after_match() {
        let text = r##"{$: "#page" }P{$} trailing {$= broken"##;
        let subs = extract(text, "base.html", Some("#page")).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].text, "P");

        let err = extract(text, "base.html", None).unwrap_err();
        assert!(matches!(err, HandlebarError::UnterminatedTag { .. }));
    }

    #[test]
    fn test_unbalanced_body_fails() {
        let text = r##"{$: "#a" }{$* data.x }never closed{$}"##;
        let err = extract(text, "page.html", None).unwrap_err();
        assert_eq!(
            err,
            HandlebarError::StructuralImbalance {
                resource: "page.html".to_string(),
                id: "#a".to_string(),
                unclosed: 1,
            }
        );
    }
}
