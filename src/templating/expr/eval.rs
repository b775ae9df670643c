//! Evaluation of parsed expressions against a JSON scope.
//!
//! Values follow loose scripting rules: `null`, `false`, `0` and `""` are
//! falsy, `+` concatenates when either side is a string, and arithmetic on
//! non-numbers goes through a numeric conversion. Paths that do not resolve
//! evaluate to `null`.

use serde_json::{Map, Number, Value};

use super::parse::{BinaryOp, Expr, UnaryOp};
use crate::constants::MAX_ARRAY_GROWTH;
use super::qualify::SCOPE_ROOT;

/// Step of a write path, computed before the scope is borrowed mutably.
enum Key {
    Name(String),
    Position(usize),
}

impl Expr {
    /// Evaluate against `scope` without side effects.
    ///
    /// An assignment evaluates to its right-hand side but writes nothing.
    #[must_use]
    pub fn evaluate(&self, scope: &Value) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Root(name) if name == SCOPE_ROOT => scope.clone(),
            Self::Root(_) => Value::Null,
            Self::Member(base, name) => match base.lookup(scope) {
                Some(found) => member(found, name),
                None if base.is_place() => None,
                None => member(&base.evaluate(scope), name),
            }
            .unwrap_or(Value::Null),
            Self::Index(base, index) => {
                let index = index.evaluate(scope);
                match base.lookup(scope) {
                    Some(found) => element(found, &index).cloned(),
                    None if base.is_place() => None,
                    None => element(&base.evaluate(scope), &index).cloned(),
                }
                .unwrap_or(Value::Null)
            }
            Self::Unary(op, operand) => {
                let value = operand.evaluate(scope);
                match op {
                    UnaryOp::Not => Value::Bool(!truthy(&value)),
                    UnaryOp::Neg => number_value(-to_number(&value)),
                    UnaryOp::Plus => number_value(to_number(&value)),
                }
            }
            Self::Binary(BinaryOp::And, left, right) => {
                let left = left.evaluate(scope);
                if truthy(&left) { right.evaluate(scope) } else { left }
            }
            Self::Binary(BinaryOp::Or, left, right) => {
                let left = left.evaluate(scope);
                if truthy(&left) { left } else { right.evaluate(scope) }
            }
            Self::Binary(op, left, right) => binary(*op, &left.evaluate(scope), &right.evaluate(scope)),
            Self::Ternary(cond, then, otherwise) => {
                if truthy(&cond.evaluate(scope)) {
                    then.evaluate(scope)
                } else {
                    otherwise.evaluate(scope)
                }
            }
            Self::Assign(_, value) => value.evaluate(scope),
        }
    }

    /// Evaluate against `scope`, performing assignments.
    ///
    /// Assignments create intermediate objects as needed; a scalar standing in
    /// the way of a path is replaced by an object. An index far past the end
    /// of an array writes nothing. Returns the expression value.
    pub fn execute(&self, scope: &mut Value) -> Value {
        match self {
            Self::Assign(target, value) => {
                let value = value.execute(scope);
                if let Some(keys) = target.write_path(scope) {
                    if let Some(slot) = slot_mut(scope, &keys) {
                        *slot = value.clone();
                    }
                }
                value
            }
            Self::Ternary(cond, then, otherwise) => {
                if truthy(&cond.execute(scope)) {
                    then.execute(scope)
                } else {
                    otherwise.execute(scope)
                }
            }
            other => other.evaluate(scope),
        }
    }

    /// Borrow the value a place expression names.
    fn lookup<'v>(&self, scope: &'v Value) -> Option<&'v Value> {
        match self {
            Self::Root(name) if name == SCOPE_ROOT => Some(scope),
            Self::Member(base, name) => base.lookup(scope)?.get(name.as_str()),
            Self::Index(base, index) => element(base.lookup(scope)?, &index.evaluate(scope)),
            _ => None,
        }
    }

    /// Resolve the keys of a place expression, evaluating index expressions.
    fn write_path(&self, scope: &Value) -> Option<Vec<Key>> {
        match self {
            Self::Root(_) => Some(Vec::new()),
            Self::Member(base, name) => {
                let mut keys = base.write_path(scope)?;
                keys.push(Key::Name(name.clone()));
                Some(keys)
            }
            Self::Index(base, index) => {
                let mut keys = base.write_path(scope)?;
                keys.push(match index.evaluate(scope) {
                    Value::Number(n) => match n.as_u64() {
                        Some(position) => Key::Position(usize::try_from(position).ok()?),
                        None => Key::Name(n.to_string()),
                    },
                    other => Key::Name(to_display(&other)),
                });
                Some(keys)
            }
            _ => None,
        }
    }
}

fn slot_mut<'v>(scope: &'v mut Value, keys: &[Key]) -> Option<&'v mut Value> {
    let mut current = scope;
    for key in keys {
        let node = current;
        current = match key {
            Key::Position(position) if node.is_array() => {
                let items = node.as_array_mut()?;
                if position.saturating_sub(items.len()) > MAX_ARRAY_GROWTH {
                    return None;
                }
                if items.len() <= *position {
                    items.resize(position + 1, Value::Null);
                }
                items.get_mut(*position)?
            }
            Key::Position(position) => object_entry(node, position.to_string())?,
            Key::Name(name) => object_entry(node, name.clone())?,
        };
    }
    Some(current)
}

fn object_entry(value: &mut Value, name: String) -> Option<&mut Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    Some(value.as_object_mut()?.entry(name).or_insert(Value::Null))
}

/// Property access on an evaluated value.
fn member(value: &Value, name: &str) -> Option<Value> {
    if let Some(found) = value.get(name) {
        return Some(found.clone());
    }
    if name != "length" {
        return None;
    }
    match value {
        Value::Array(items) => Some(Value::from(items.len())),
        Value::String(s) => Some(Value::from(s.chars().count())),
        _ => None,
    }
}

fn element<'v>(value: &'v Value, index: &Value) -> Option<&'v Value> {
    match (value, index) {
        (Value::Array(items), Value::Number(n)) => items.get(usize::try_from(n.as_u64()?).ok()?),
        (Value::Object(map), Value::Number(n)) => map.get(&n.to_string()),
        (Value::Object(map), other) => map.get(&to_display(other)),
        _ => None,
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add if left.is_string() || right.is_string() => {
            Value::String(format!("{}{}", to_display(left), to_display(right)))
        }
        BinaryOp::Add => number_value(to_number(left) + to_number(right)),
        BinaryOp::Sub => number_value(to_number(left) - to_number(right)),
        BinaryOp::Mul => number_value(to_number(left) * to_number(right)),
        BinaryOp::Div => number_value(to_number(left) / to_number(right)),
        BinaryOp::Rem => number_value(to_number(left) % to_number(right)),
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::Ne => Value::Bool(!loose_eq(left, right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => to_number(left).partial_cmp(&to_number(right)),
            };
            let Some(ordering) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
        // short-circuit operators are handled before operands are evaluated
        BinaryOp::And | BinaryOp::Or => Value::Null,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// Whether a value counts as true in a condition.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form of a value as written into template output.
///
/// `null` renders as nothing; composite values render as JSON.
#[must_use]
pub fn to_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// Integral results stay integers; non-finite results become `null`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::Number(Number::from(f as i64))
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}
