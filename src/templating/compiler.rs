//! Compilation of sub-templates into render trees.
//!
//! A compiled template is a list of [`Node`]s plus the declarations that run
//! before them. Rendering walks the tree with a JSON scope; nothing is turned
//! back into source code, so literal text needs no escaping.
//!
//! # Scope rules
//!
//! - Declarations run against a clone of the caller's scope, so assignments
//!   never leak back into the including template.
//! - A loop clones the scope once and rebinds `item` for every iteration.
//! - Includes render with the scope of the include site.

use serde_json::{Value, json};
use std::borrow::Cow;
use tracing::{debug, warn};

use crate::core::{HandlebarError, Result};
use crate::reference::{TemplateKey, canonicalize};
use crate::templating::expr::{Expr, compile_expression, to_display};
use crate::templating::extract::SubTemplate;
use crate::templating::lexer::{Lexer, TokenKind};
use crate::templating::mask::MaskTable;
use crate::templating::registry::TemplateRegistry;

/// The scope key a loop binds its current record to.
pub const LOOP_ITEM: &str = "item";

/// Where an include tag points.
#[derive(Debug, Clone, PartialEq)]
pub enum IncludeTarget {
    /// `@"res#id"`, canonicalized when the template was compiled
    Static(TemplateKey),
    /// `@path`, evaluated at render time and resolved against `base_resource`
    Dynamic {
        /// Expression producing the reference string
        path: Expr,
        /// Resource the include tag was written in
        base_resource: String,
    },
}

/// A node of a compiled render tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal markup text
    Text(String),
    /// Verbatim raw-block content
    Raw(String),
    /// Value output
    Value(Expr),
    /// Splice of another sub-template
    Include(IncludeTarget),
    /// Loop over the value of `source`
    Loop {
        /// The iterated value
        source: Expr,
        /// Nodes rendered once per record
        body: Vec<Node>,
    },
}

/// A sub-template ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    /// Identity of this template
    pub key: TemplateKey,
    declarations: Vec<Expr>,
    body: Vec<Node>,
}

impl CompiledTemplate {
    /// A template that renders nothing
    #[must_use]
    pub fn empty(key: TemplateKey) -> Self {
        Self {
            key,
            declarations: Vec::new(),
            body: Vec::new(),
        }
    }

    /// The top-level nodes of the render tree
    #[cfg(test)]
    pub(crate) fn nodes(&self) -> &[Node] {
        &self.body
    }

    /// Render with `context` as the scope.
    #[must_use]
    pub fn render(&self, context: &Value, registry: &TemplateRegistry) -> String {
        let mut out = String::new();
        self.render_into(context, registry, 0, &mut out);
        out
    }

    fn render_into(&self, context: &Value, registry: &TemplateRegistry, depth: usize, out: &mut String) {
        if self.body.is_empty() {
            return;
        }

        let scope = if self.declarations.is_empty() {
            Cow::Borrowed(context)
        } else {
            let mut sandbox = context.clone();
            for declaration in &self.declarations {
                declaration.execute(&mut sandbox);
            }
            Cow::Owned(sandbox)
        };

        render_nodes(&self.body, &scope, registry, depth, out);
    }
}

fn render_nodes(nodes: &[Node], scope: &Value, registry: &TemplateRegistry, depth: usize, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) | Node::Raw(text) => out.push_str(text),
            Node::Value(expr) => out.push_str(&to_display(&expr.evaluate(scope))),
            Node::Include(target) => render_include(target, scope, registry, depth, out),
            Node::Loop {
                source,
                body,
            } => {
                let mut loop_scope = scope.clone();
                for record in loop_records(source.evaluate(scope)) {
                    if let Value::Object(map) = &mut loop_scope {
                        map.insert(LOOP_ITEM.to_string(), record);
                    }
                    render_nodes(body, &loop_scope, registry, depth, out);
                }
            }
        }
    }
}

fn render_include(
    target: &IncludeTarget,
    scope: &Value,
    registry: &TemplateRegistry,
    depth: usize,
    out: &mut String,
) {
    let key = match target {
        IncludeTarget::Static(key) => Cow::Borrowed(key),
        IncludeTarget::Dynamic {
            path,
            base_resource,
        } => match path.evaluate(scope) {
            Value::String(reference) if !reference.is_empty() => {
                Cow::Owned(canonicalize(&reference, base_resource))
            }
            other => {
                debug!("Dynamic include produced no reference ({})", other);
                return;
            }
        },
    };

    if depth >= registry.include_limit() {
        warn!("Include depth limit ({}) reached at {}", registry.include_limit(), key);
        return;
    }

    match registry.lookup_key(&key) {
        Some(template) => template.render_into(scope, registry, depth + 1, out),
        None => debug!("Unresolved include {}, rendering nothing", key),
    }
}

/// Turn an iterated value into loop records.
///
/// `null`, which is also what a missing path evaluates to, yields no records,
/// so a loop over data that is not there renders nothing. Any other
/// non-composite value is wrapped as a single element.
fn loop_records(iterated: Value) -> Vec<Value> {
    let record = |key: Value, value: Value, index: usize, last: bool| {
        json!({
            "key": key,
            "value": value,
            "first": index == 0,
            "last": last,
            "odd": index % 2 == 1,
            "even": index % 2 == 0,
        })
    };

    match iterated {
        Value::Null => Vec::new(),
        Value::Array(items) => {
            let len = items.len();
            items
                .into_iter()
                .enumerate()
                .map(|(index, value)| record(json!(index), value, index, index + 1 == len))
                .collect()
        }
        Value::Object(map) => {
            let mut records: Vec<Value> = map
                .into_iter()
                .enumerate()
                .map(|(index, (key, value))| record(Value::String(key), value, index, false))
                .collect();
            let len = records.len();
            for (index, entry) in records.iter_mut().enumerate() {
                entry["last"] = Value::Bool(index + 1 == len);
            }
            records
        }
        scalar => vec![record(json!(0), scalar, 0, true)],
    }
}

/// Compiles the sub-templates of one resource.
pub struct Compiler<'a> {
    resource: &'a str,
    masks: &'a MaskTable,
    check_queue: &'a mut Vec<TemplateKey>,
}

impl<'a> Compiler<'a> {
    /// Create a compiler for sub-templates declared in `resource`.
    ///
    /// Static include targets met while compiling are appended to `check_queue`.
    pub fn new(resource: &'a str, masks: &'a MaskTable, check_queue: &'a mut Vec<TemplateKey>) -> Self {
        Self {
            resource,
            masks,
            check_queue,
        }
    }

    /// Compile one extracted sub-template.
    ///
    /// # Errors
    ///
    /// Fails on malformed tags, unparsable expressions, and loops that are
    /// never closed.
    pub fn compile(&mut self, sub: &SubTemplate) -> Result<CompiledTemplate> {
        let key = TemplateKey::new(self.resource, &sub.id);
        if sub.text.is_empty() {
            return Ok(CompiledTemplate::empty(key));
        }

        let declarations = sub
            .extras
            .iter()
            .map(|extra| compile_expression(extra))
            .collect::<Result<Vec<_>>>()?;

        let tokens = Lexer::new(&sub.text, self.resource).tokenize()?;
        let mut current: Vec<Node> = Vec::new();
        // enclosing loops: (loop source, nodes collected before the loop opened)
        let mut loops: Vec<(Expr, Vec<Node>)> = Vec::new();
        // depth inside a nested declaration, whose body is its own template
        let mut skip_depth = 0usize;

        for token in tokens {
            if skip_depth > 0 {
                if token.kind.opens_block() {
                    skip_depth += 1;
                } else if token.kind == TokenKind::Close {
                    skip_depth -= 1;
                }
                continue;
            }

            match token.kind {
                TokenKind::Text => push_text(&mut current, token.text(&sub.text)),
                TokenKind::Declaration {
                    id,
                    self_closing,
                    ..
                } => {
                    current.push(Node::Include(IncludeTarget::Static(TemplateKey::new(self.resource, id))));
                    if !self_closing {
                        skip_depth = 1;
                    }
                }
                TokenKind::LoopStart {
                    source,
                } => {
                    let source = compile_expression(&source)?;
                    loops.push((source, std::mem::take(&mut current)));
                }
                TokenKind::Close => match loops.pop() {
                    Some((source, outer)) => {
                        let body = std::mem::replace(&mut current, outer);
                        current.push(Node::Loop {
                            source,
                            body,
                        });
                    }
                    None => warn!("Ignoring stray block close at byte {} of {}", token.start, key),
                },
                TokenKind::Expression {
                    source,
                } => current.push(self.compile_output(&source)?),
                TokenKind::RawOutput {
                    sentinel,
                } => match self.masks.resolve(&sentinel) {
                    Some(raw) => current.push(Node::Raw(raw.to_string())),
                    None => warn!("Unknown raw block {} in {}, rendering nothing", sentinel, key),
                },
                TokenKind::Comment => {}
                TokenKind::Extends {
                    reference,
                } => warn!("Ignoring extends of '{}' inside the body of {}", reference, key),
            }
        }

        if !loops.is_empty() {
            return Err(HandlebarError::StructuralImbalance {
                resource: self.resource.to_string(),
                id: sub.id.clone(),
                unclosed: loops.len(),
            });
        }

        debug!("Compiled {} ({} node(s), {} declaration(s))", key, current.len(), declarations.len());
        Ok(CompiledTemplate {
            key,
            declarations,
            body: current,
        })
    }

    /// Compile the content of a `{$= ... $}` tag.
    fn compile_output(&mut self, source: &str) -> Result<Node> {
        let Some(target) = source.strip_prefix('@') else {
            return Ok(Node::Value(compile_expression(source)?));
        };
        let target = target.trim();

        if let Some(reference) = quoted_literal(target) {
            let key = canonicalize(reference, self.resource);
            self.check_queue.push(key.clone());
            return Ok(Node::Include(IncludeTarget::Static(key)));
        }

        Ok(Node::Include(IncludeTarget::Dynamic {
            path: compile_expression(target)?,
            base_resource: self.resource.to_string(),
        }))
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if let Some(Node::Text(previous)) = nodes.last_mut() {
        previous.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

/// The contents of `s` when it is exactly one quoted string.
fn quoted_literal(s: &str) -> Option<&str> {
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = s.strip_prefix(quote)?.strip_suffix(quote)?;
    (!inner.contains(quote)).then_some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templating::extract::extract;
    use std::sync::Arc;

    fn compile_all(resource: &str, text: &str, masks: &MaskTable) -> (TemplateRegistry, Vec<TemplateKey>) {
        let mut registry = TemplateRegistry::new();
        let mut queue = Vec::new();
        for sub in extract(text, resource, None).unwrap() {
            let compiled = Compiler::new(resource, masks, &mut queue).compile(&sub).unwrap();
            registry.register(resource, &sub.id, compiled);
        }
        (registry, queue)
    }

    fn render(registry: &TemplateRegistry, resource: &str, id: &str, data: Value) -> String {
        let template: Arc<CompiledTemplate> = registry.lookup(resource, id).unwrap();
        template.render(&json!({ "data": data }), registry)
    }

    #[test]
    fn test_array_loop_records() {
        let masks = MaskTable::new();
        let text = r##"{$: "#list" }{$* data.items }{$= item.key $}:{$= item.value $}:{$= item.first $}:{$= item.last $}:{$= item.odd $};{$}{$}"##;
        let (registry, _) = compile_all("l.html", text, &masks);
        assert_eq!(
            render(&registry, "l.html", "#list", json!({"items": [10, 20, 30]})),
            "0:10:true:false:false;1:20:false:false:true;2:30:false:true:false;"
        );
    }

    #[test]
    fn test_object_loop_fills_last_in_second_pass() {
        let masks = MaskTable::new();
        let text = r##"{$: "#map" }{$* data.m }{$= item.key $}={$= item.value $}{$= item.last ? "." : "," $}{$}{$}"##;
        let (registry, _) = compile_all("m.html", text, &masks);
        assert_eq!(render(&registry, "m.html", "#map", json!({"m": {"a": 1, "b": 2}})), "a=1,b=2.");
    }

    #[test]
    fn test_loop_over_scalar_and_null() {
        let masks = MaskTable::new();
        let text = r##"{$: "#t" }[{$* data.v }{$= item.value $}{$}]{$}"##;
        let (registry, _) = compile_all("s.html", text, &masks);
        assert_eq!(render(&registry, "s.html", "#t", json!({"v": "one"})), "[one]");
        assert_eq!(render(&registry, "s.html", "#t", json!({"v": null})), "[]");
        assert_eq!(render(&registry, "s.html", "#t", json!({})), "[]");
    }

    #[test]
    fn test_declarations_are_sandboxed() {
        let masks = MaskTable::new();
        let text = r##"{$: "#outer" | label = "outer" }{$= @"#inner" $}/{$= label $}{$}{$: "#inner" | label = "inner" }{$= label $}{$}"##;
        let (registry, queue) = compile_all("d.html", text, &masks);
        assert_eq!(render(&registry, "d.html", "#outer", json!({})), "inner/outer");
        assert_eq!(queue, vec![TemplateKey::new("d.html", "#inner")]);
    }

    #[test]
    fn test_raw_output_is_verbatim() {
        let mut masks = MaskTable::new();
        let masked = masks.mask_all(r##"{$: "#r" }<{$% {$= data.x $} %$}>{$}"##);
        let (registry, _) = compile_all("r.html", &masked, &masks);
        assert_eq!(render(&registry, "r.html", "#r", json!({"x": 1})), "< {$= data.x $} >");
    }

    #[test]
    fn test_nested_declaration_renders_inline() {
        let masks = MaskTable::new();
        let text = r##"{$: "#page" }<{$: "#title" }T:{$= data.t $}{$}>{$}"##;
        let (registry, _) = compile_all("p.html", text, &masks);
        assert_eq!(render(&registry, "p.html", "#page", json!({"t": "x"})), "<T:x>");
        assert_eq!(render(&registry, "p.html", "#title", json!({"t": "y"})), "T:y");
    }

    #[test]
    fn test_dynamic_include_and_missing_targets() {
        let masks = MaskTable::new();
        let text = r##"{$: "#main" }{$= @data.which $}|{$= @"#nope" $}{$}{$: "#a" }A{$}"##;
        let (registry, _) = compile_all("dir/x.html", text, &masks);
        assert_eq!(render(&registry, "dir/x.html", "#main", json!({"which": "#a"})), "A|");
        assert_eq!(render(&registry, "dir/x.html", "#main", json!({"which": 3})), "|");
    }

    #[test]
    fn test_self_include_stops_at_depth_limit() {
        let masks = MaskTable::new();
        let text = r##"{$: "#loop" }x{$= @"#loop" $}{$}"##;
        let (registry, _) = compile_all("x.html", text, &masks);
        let out = render(&registry, "x.html", "#loop", json!({}));
        assert_eq!(out.len(), registry.include_limit() + 1);
    }

    #[test]
    fn test_unclosed_loop_fails() {
        let masks = MaskTable::new();
        let sub = SubTemplate {
            id: "#bad".to_string(),
            text: "{$* data.x }never".to_string(),
            extras: vec![],
        };
        let mut queue = Vec::new();
        let err = Compiler::new("b.html", &masks, &mut queue).compile(&sub).unwrap_err();
        assert!(matches!(err, HandlebarError::StructuralImbalance { unclosed: 1, .. }));
    }

    #[test]
    fn test_empty_body_ignores_declarations() {
        let masks = MaskTable::new();
        let sub = SubTemplate {
            id: "#e".to_string(),
            text: String::new(),
            extras: vec!["this is not an expression (".to_string()],
        };
        let mut queue = Vec::new();
        let compiled = Compiler::new("e.html", &masks, &mut queue).compile(&sub).unwrap();
        assert!(compiled.nodes().is_empty());
        assert_eq!(compiled.render(&json!({}), &TemplateRegistry::new()), "");
    }
}
