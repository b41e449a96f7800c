//! Expected-shape descriptors for JSON response bodies.

use serde_json::Value;

use crate::Violation;

/// Structural description of a JSON value.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Any,
    Null,
    Bool,
    /// Any JSON number.
    Number,
    /// A number with no fractional part.
    Integer,
    String,
    Array(Box<Shape>),
    /// An object with the listed fields; unlisted keys are allowed.
    Object(Vec<Field>),
    /// `null` or the inner shape.
    Nullable(Box<Shape>),
}

/// One named member of an [`Shape::Object`].
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
    pub required: bool,
}

impl Field {
    pub fn required(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: false,
        }
    }
}

impl Shape {
    pub fn array(element: Shape) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    pub fn nullable(inner: Shape) -> Self {
        Self::Nullable(Box::new(inner))
    }

    /// Checks `value` and returns every violation found.
    pub fn check(&self, value: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();
        self.check_at("$", value, &mut violations);
        violations
    }

    fn check_at(&self, path: &str, value: &Value, out: &mut Vec<Violation>) {
        match (self, value) {
            (Self::Any, _) => {}
            (Self::Nullable(_), Value::Null) => {}
            (Self::Nullable(inner), _) => inner.check_at(path, value, out),
            (Self::Null, Value::Null)
            | (Self::Bool, Value::Bool(_))
            | (Self::Number, Value::Number(_))
            | (Self::String, Value::String(_)) => {}
            (Self::Integer, Value::Number(number)) => {
                if !(number.is_i64() || number.is_u64()) {
                    out.push(Violation::new(path, format!("expected integer, found {number}")));
                }
            }
            (Self::Array(element), Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    element.check_at(&format!("{path}[{index}]"), item, out);
                }
            }
            (Self::Object(fields), Value::Object(map)) => {
                for field in fields {
                    let field_path = format!("{path}.{}", field.name);
                    match map.get(&field.name) {
                        Some(member) => field.shape.check_at(&field_path, member, out),
                        None if field.required => {
                            out.push(Violation::new(field_path, "missing required field"));
                        }
                        None => {}
                    }
                }
            }
            (expected, found) => out.push(Violation::new(
                path,
                format!("expected {}, found {}", expected.describe(), json_type(found)),
            )),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Any => "any value",
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Nullable(_) => "nullable value",
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
