//! Scope qualification of tokenized expressions.
//!
//! Every free identifier in an expression refers to the render scope, so
//! qualification rewrites `data.name` to `_.data.name` and `title = "x"` to
//! `_.title="x"`. Ternaries missing their else branch are completed with
//! `:""`.

use super::tokenize::ExprToken;

/// The root identifier every qualified path starts from.
pub const SCOPE_ROOT: &str = "_";

const KEYWORDS: [&str; 3] = ["true", "false", "null"];

/// Join `tokens` back into expression text with free identifiers qualified.
#[must_use]
pub fn qualify(tokens: &[ExprToken]) -> String {
    let mut pos = 0;
    let mut out = String::new();
    while pos < tokens.len() {
        // Only a stray `)` makes a top-level group return early
        out.push_str(&qualify_group(tokens, &mut pos));
    }
    out
}

fn qualify_group(tokens: &[ExprToken], pos: &mut usize) -> String {
    let mut out = String::new();
    let mut ternaries = 0usize;
    let mut literal: Option<char> = None;

    while let Some(token) = tokens.get(*pos) {
        *pos += 1;

        if let Some(quote) = literal {
            if *token == ExprToken::Quote(quote) {
                literal = None;
            }
            out.push_str(&token.to_string());
            continue;
        }

        match token {
            ExprToken::Quote(q) => {
                literal = Some(*q);
                out.push(*q);
            }
            ExprToken::Open => {
                out.push('(');
                out.push_str(&qualify_group(tokens, pos));
            }
            ExprToken::Close => {
                complete_ternaries(&mut out, ternaries);
                out.push(')');
                return out;
            }
            ExprToken::Question => {
                ternaries += 1;
                out.push('?');
            }
            ExprToken::Colon => {
                ternaries = ternaries.saturating_sub(1);
                out.push(':');
            }
            ExprToken::Run(run) => qualify_run(run, &mut out),
            other => out.push_str(&other.to_string()),
        }
    }

    complete_ternaries(&mut out, ternaries);
    out
}

fn complete_ternaries(out: &mut String, open: usize) {
    for _ in 0..open {
        out.push_str(":\"\"");
    }
}

/// Qualify the identifiers of a run outside string literals.
fn qualify_run(run: &str, out: &mut String) {
    let mut chars = run.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if !is_ident_char(c) {
            out.push(c);
            continue;
        }

        let mut end = start + c.len_utf8();
        while let Some(&(i, next)) = chars.peek() {
            // number literals such as 1.5 keep their dot
            let continues = is_ident_char(next) || (next == '.' && c.is_ascii_digit());
            if !continues {
                break;
            }
            end = i + next.len_utf8();
            chars.next();
        }
        let word = &run[start..end];

        let after_dot = out.trim_end().ends_with('.');
        if c.is_ascii_lowercase() && !after_dot && !KEYWORDS.contains(&word) {
            out.push_str(SCOPE_ROOT);
            out.push('.');
        }
        out.push_str(word);
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::super::tokenize::tokenize;
    use super::*;

    fn q(expr: &str) -> String {
        qualify(&tokenize(expr))
    }

    #[test]
    fn test_identifiers_are_scoped() {
        assert_eq!(q("data.user.name"), "_.data.user.name");
        assert_eq!(q("count + 1"), "_.count + 1");
        assert_eq!(q("list[idx].label"), "_.list[_.idx].label");
    }

    #[test]
    fn test_literals_and_keywords_untouched() {
        assert_eq!(q(r#"title = "some words""#), r#"_.title="some words""#);
        assert_eq!(q("flag = true"), "_.flag=true");
        assert_eq!(q("Math.max"), "Math.max");
        assert_eq!(q("x = 2.5"), "_.x=2.5");
    }

    #[test]
    fn test_incomplete_ternaries_are_completed() {
        assert_eq!(q("a ? b"), r#"_.a?_.b:"""#);
        assert_eq!(q("a ? b : c ? d"), r#"_.a?_.b:_.c?_.d:"""#);
        assert_eq!(q("(a ? b) + c"), r#"(_.a?_.b:"")+ _.c"#);
        assert_eq!(q("x = (a ? (b ? c : d) : e)"), "_.x=(_.a?(_.b?_.c:_.d):_.e)");
    }

    #[test]
    fn test_colon_inside_string_does_not_close_ternary() {
        assert_eq!(q(r#"a ? "x:y""#), r#"_.a?"x:y":"""#);
    }
}
