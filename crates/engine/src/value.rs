//! Abstract values produced by the resolver.

use ir::{number_to_string, ClassId, FnId};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::scope::BindingKey;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    List(Vec<Value>),
    /// Ordered object fields.
    Map(Vec<Field>),
    Func(FnId),
    Class(ClassId),
    Instance(Proto),
    /// Property path below the global object, `""` being the object itself.
    Global(String),
    /// String with unresolved holes.
    Partial(Vec<Part>),
    Sym(Sym),
    Many(Vec<Value>),
    Unknown,
    Circular,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: Value,
    /// Field came from an object spread.
    pub spread: bool,
}

/// Prototype an instance was created from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Proto {
    Func(FnId),
    Class(ClassId),
    Global(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Hole(Sym),
}

/// Named placeholder for a value that depends on an unresolved input.
#[derive(Debug, Clone, PartialEq)]
pub struct Sym {
    pub name: String,
    pub binding: Option<BindingKey>,
    /// Fallback supplied through `||` / `??` / a parameter default.
    pub default: Option<Box<Value>>,
}

impl Sym {
    pub fn named(name: impl Into<String>) -> Self {
        Sym {
            name: name.into(),
            binding: None,
            default: None,
        }
    }
}

impl Value {
    /// Flattens, deduplicates and bounds a set of alternatives. Unresolved
    /// members are dropped when anything concrete remains.
    pub fn join(values: Vec<Value>, max: usize) -> Value {
        let mut out: Vec<Value> = Vec::new();
        let mut stack: Vec<Value> = values.into_iter().rev().collect();
        while let Some(v) = stack.pop() {
            match v {
                Value::Many(inner) => stack.extend(inner.into_iter().rev()),
                other => {
                    if !out.contains(&other) {
                        out.push(other);
                    }
                }
            }
        }
        if out
            .iter()
            .any(|v| !matches!(v, Value::Unknown | Value::Circular))
        {
            out.retain(|v| !matches!(v, Value::Unknown | Value::Circular));
        } else if out.contains(&Value::Unknown) {
            return Value::Unknown;
        }
        out.truncate(max.max(1));
        match out.len() {
            0 => Value::Unknown,
            1 => out.pop().unwrap_or(Value::Unknown),
            _ => Value::Many(out),
        }
    }

    pub fn members(&self) -> Vec<&Value> {
        match self {
            Value::Many(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    pub fn into_members(self) -> Vec<Value> {
        match self {
            Value::Many(items) => items,
            other => vec![other],
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Value::Unknown | Value::Circular)
    }

    /// String form of a scalar literal.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Num(n) => Some(number_to_string(*n)),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => Some("null".into()),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.scalar_string().is_some()
    }

    /// Statically known truthiness.
    pub fn truthiness(&self) -> Option<bool> {
        match self {
            Value::Str(s) => Some(!s.is_empty()),
            Value::Num(n) => Some(*n != 0.0 && !n.is_nan()),
            Value::Bool(b) => Some(*b),
            Value::Null => Some(false),
            Value::List(_)
            | Value::Map(_)
            | Value::Func(_)
            | Value::Class(_)
            | Value::Instance(_) => Some(true),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(fields) => fields.iter().rev().find(|f| f.key == key).map(|f| &f.value),
            _ => None,
        }
    }

    /// Pieces of a string-like value, `None` for non-string shapes.
    pub fn to_parts(&self) -> Option<Vec<Part>> {
        match self {
            Value::Partial(parts) => Some(parts.clone()),
            Value::Sym(s) => Some(vec![Part::Hole(s.clone())]),
            other => other.scalar_string().map(|s| vec![Part::Text(s)]),
        }
    }

    /// `a + b` over abstract values.
    pub fn concat(a: &Value, b: &Value, max: usize) -> Value {
        if matches!(a, Value::Many(_)) || matches!(b, Value::Many(_)) {
            let mut out = Vec::new();
            'outer: for x in a.members() {
                for y in b.members() {
                    if out.len() >= max {
                        break 'outer;
                    }
                    out.push(Value::concat(x, y, max));
                }
            }
            return Value::join(out, max);
        }
        if let (Value::Num(x), Value::Num(y)) = (a, b) {
            return Value::Num(x + y);
        }
        let (Some(left), Some(right)) = (a.to_parts(), b.to_parts()) else {
            return Value::Unknown;
        };
        let mut parts: Vec<Part> = Vec::with_capacity(left.len() + right.len());
        for p in left.into_iter().chain(right) {
            match (parts.last_mut(), p) {
                (Some(Part::Text(prev)), Part::Text(t)) => prev.push_str(&t),
                (_, p) => parts.push(p),
            }
        }
        Value::from_parts(parts)
    }

    pub fn from_parts(parts: Vec<Part>) -> Value {
        if parts.iter().all(|p| matches!(p, Part::Text(_))) {
            let s: String = parts
                .into_iter()
                .map(|p| match p {
                    Part::Text(t) => t,
                    Part::Hole(_) => String::new(),
                })
                .collect();
            Value::Str(s)
        } else {
            Value::Partial(parts)
        }
    }

    /// JSON rendering of concrete data, `None` for symbolic shapes.
    pub fn to_json(&self) -> Option<JsonValue> {
        match self {
            Value::Str(s) => Some(JsonValue::String(s.clone())),
            Value::Num(n) => Some(number_json(*n)),
            Value::Bool(b) => Some(JsonValue::Bool(*b)),
            Value::Null => Some(JsonValue::Null),
            Value::List(items) => Some(JsonValue::Array(
                items
                    .iter()
                    .map(|v| v.to_json().unwrap_or(JsonValue::Null))
                    .collect(),
            )),
            Value::Map(fields) => {
                let mut map = JsonMap::new();
                for f in fields {
                    map.insert(f.key.clone(), f.value.to_json().unwrap_or(JsonValue::Null));
                }
                Some(JsonValue::Object(map))
            }
            _ => None,
        }
    }

    /// Parameter type name inferred from a literal.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::List(_) => "array",
            Value::Map(_) | Value::Instance(_) => "object",
            Value::Func(_) | Value::Class(_) => "function",
            Value::Sym(s) => s.default.as_deref().map_or("string", Value::type_name),
            Value::Many(items) => items.first().map_or("string", Value::type_name),
            _ => "string",
        }
    }
}

pub fn number_json(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 9.0e15 {
        JsonValue::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(JsonValue::Null, JsonValue::Number)
    }
}

/// Percent-encodes like `encodeURIComponent`.
pub fn encode_uri_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        let keep = b.is_ascii_alphanumeric()
            || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')');
        if keep {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::Str(v.into())
    }

    #[test]
    fn join_flattens_and_drops_unknown() {
        let v = Value::join(
            vec![
                s("a"),
                Value::Many(vec![s("b"), s("a")]),
                Value::Unknown,
                Value::Circular,
            ],
            8,
        );
        assert_eq!(v, Value::Many(vec![s("a"), s("b")]));
        assert_eq!(Value::join(vec![Value::Circular], 8), Value::Circular);
        assert_eq!(Value::join(vec![], 8), Value::Unknown);
    }

    #[test]
    fn concat_produces_holes_for_symbols() {
        let v = Value::concat(&s("/api/"), &Value::Sym(Sym::named("id")), 8);
        let v = Value::concat(&v, &s("/x"), 8);
        assert_eq!(
            v,
            Value::Partial(vec![
                Part::Text("/api/".into()),
                Part::Hole(Sym::named("id")),
                Part::Text("/x".into()),
            ])
        );
    }

    #[test]
    fn concat_crosses_alternatives_and_adds_numbers() {
        let v = Value::concat(&Value::Many(vec![s("/a"), s("/b")]), &s("?x"), 8);
        assert_eq!(v, Value::Many(vec![s("/a?x"), s("/b?x")]));
        assert_eq!(Value::concat(&Value::Num(1.0), &Value::Num(2.0), 8), Value::Num(3.0));
        assert_eq!(Value::concat(&s("p"), &Value::Num(2.0), 8), s("p2"));
    }

    #[test]
    fn json_rendering_keeps_integers() {
        assert_eq!(Value::Num(3.0).to_json(), Some(serde_json::json!(3)));
        assert_eq!(Value::Sym(Sym::named("x")).to_json(), None);
    }

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(encode_uri_component("a b/c?d"), "a%20b%2Fc%3Fd");
    }
}
