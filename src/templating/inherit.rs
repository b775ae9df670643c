//! Template inheritance through `{$+ "parent.html#slot" $}`.
//!
//! A resource whose text starts with an extends tag is merged with its parent
//! before anything else happens. The loading side lives in
//! [`crate::engine::Engine`]; this module holds the text transformations:
//!
//! - [`parse_extends`] splits the leading tag from the child body.
//! - [`parent_part`] turns the parent text into the part that precedes the
//!   child: either one rebuilt slot declaration or the whole parent.
//! - [`merge`] joins parent part and child body.
//!
//! Declarations in the child override same-named ones from the parent because
//! the child body comes last and extraction keeps the last declaration.

use crate::constants::BLOCK_CLOSE;
use crate::core::{HandlebarError, Result};
use crate::reference::TemplateKey;
use crate::templating::extract::{extract, strip_comments};
use crate::templating::lexer::{Lexer, TokenKind};
use crate::templating::mask::MaskTable;

/// A leading extends tag split from the rest of the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extends<'a> {
    /// Parent reference as written
    pub reference: String,
    /// Everything after the extends tag
    pub remainder: &'a str,
}

/// Split a leading extends tag off `text`.
///
/// Only the first non-whitespace content counts; an extends tag anywhere
/// else is not an inheritance declaration.
///
/// # Errors
///
/// Fails when the leading tag is an extends tag that does not lex.
///
/// # Examples
///
/// ```
/// use handlebar::templating::inherit::parse_extends;
///
/// let ext = parse_extends("  {$+ \"base.html#page\" $}rest").unwrap().unwrap();
/// assert_eq!(ext.reference, "base.html#page");
/// assert_eq!(ext.remainder, "rest");
/// assert!(parse_extends("no tag {$+ \"x\" $}").unwrap().is_none());
/// ```
pub fn parse_extends(text: &str) -> Result<Option<Extends<'_>>> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with("{$+") {
        return Ok(None);
    }

    let mut lexer = Lexer::new(trimmed, "");
    match lexer.next_token()? {
        Some(token) => match token.kind {
            TokenKind::Extends {
                reference,
            } => Ok(Some(Extends {
                reference,
                remainder: &trimmed[token.end..],
            })),
            _ => Ok(None),
        },
        None => Ok(None),
    }
}

/// Build the parent contribution for a child extending `parent`.
///
/// With a slot identifier the parent's `slot` sub-template is rebuilt as a
/// standalone declaration with its raw blocks restored byte-for-byte. The
/// parent's own extends tag, if any, is carried along with its reference made
/// root-relative so it resolves the same way from the child.
///
/// # Errors
///
/// Returns [`HandlebarError::MissingExtendsSlot`] when the parent does not
/// declare `slot`, and propagates markup errors from the parent text.
pub fn parent_part(parent_text: &str, parent: &TemplateKey) -> Result<String> {
    let own_extends = parse_extends(parent_text)?;
    let carried = own_extends
        .as_ref()
        .map(|ext| rooted_extends_tag(&ext.reference, &parent.resource))
        .unwrap_or_default();

    if parent.id.is_empty() {
        return Ok(match own_extends {
            Some(ext) => format!("{carried}{}", ext.remainder),
            None => parent_text.to_string(),
        });
    }

    let mut masks = MaskTable::new();
    let masked = strip_comments(&masks.mask_all(parent_text));
    let slot = extract(&masked, &parent.resource, Some(&parent.id))?
        .into_iter()
        .find(|sub| sub.id == parent.id)
        .ok_or_else(|| HandlebarError::MissingExtendsSlot {
            parent: parent.resource.clone(),
            slot: parent.id.clone(),
        })?;

    let quote = if slot.id.contains('"') { '\'' } else { '"' };
    let mut rebuilt = format!("{carried}{{$: {quote}{}{quote}", slot.id);
    for extra in &slot.extras {
        rebuilt.push_str(" | ");
        rebuilt.push_str(extra);
    }
    rebuilt.push_str(" }");
    rebuilt.push_str(&masks.unmask(&slot.text));
    rebuilt.push_str(BLOCK_CLOSE);
    Ok(rebuilt)
}

/// Join the parent contribution and the child body.
#[must_use]
pub fn merge(parent_part: &str, child_remainder: &str) -> String {
    format!("{parent_part}\n\n{child_remainder}")
}

fn rooted_extends_tag(reference: &str, parent_resource: &str) -> String {
    let key = crate::reference::canonicalize(reference, parent_resource);
    format!("{{$+ \"/{}{}\" $}}", key.resource, key.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extends_requires_leading_tag() {
        assert!(parse_extends("text").unwrap().is_none());
        assert!(parse_extends(r#"{$= x $}{$+ "p.html" $}"#).unwrap().is_none());
        assert!(parse_extends("{$+ unquoted $}").is_err());
    }

    #[test]
    fn test_parent_part_rebuilds_slot_with_raw_blocks() {
        let parent = r##"{$: "#page" | title = "Base" }<h1>{$= title $}</h1>{$% {$} %$}{$}{$: "#other" }x{$}"##;
        let part = parent_part(parent, &TemplateKey::new("base.html", "#page")).unwrap();
        assert_eq!(part, r##"{$: "#page" | title = "Base" }<h1>{$= title $}</h1>{$% {$} %$}{$}"##);
    }

    #[test]
    fn test_parent_part_carries_rooted_extends() {
        let parent = r##"{$+ "../root.html#frame" $}{$: "#page" }p{$}"##;
        let part = parent_part(parent, &TemplateKey::new("layouts/base.html", "#page")).unwrap();
        assert_eq!(part, r##"{$+ "/root.html#frame" $}{$: "#page" }p{$}"##);
    }

    #[test]
    fn test_whole_parent_without_slot() {
        let parent = "{$/ c /$}plain";
        assert_eq!(parent_part(parent, &TemplateKey::new("p.html", "")).unwrap(), parent);
    }

    #[test]
    fn test_missing_slot() {
        let err = parent_part(r##"{$: "#a" }{$}"##, &TemplateKey::new("p.html", "#b")).unwrap_err();
        assert_eq!(
            err,
            HandlebarError::MissingExtendsSlot {
                parent: "p.html".to_string(),
                slot: "#b".to_string(),
            }
        );
    }

    #[test]
    fn test_merge() {
        assert_eq!(merge("P", "C"), "P\n\nC");
    }
}
