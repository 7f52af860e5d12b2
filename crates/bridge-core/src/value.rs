//! Values crossing the bridge and the argument shapes methods declare.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
pub use serde_json::Value;

use crate::errors::{BridgeError, ErrorInfo, MethodError, CODE_ARGUMENT_MISMATCH};

/// Immutable snapshot of a module's exported constants.
pub type Constants = BTreeMap<String, Value>;

/// Shape a positional argument must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgShape {
    /// Any value, including `null`.
    Any,
    /// A JSON boolean.
    Bool,
    /// Any JSON number.
    Number,
    /// A JSON number without a fractional part.
    Integer,
    /// A JSON string.
    String,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl ArgShape {
    /// Returns true when a non-null value has this shape.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ArgShape::Any => true,
            ArgShape::Bool => value.is_boolean(),
            ArgShape::Number => value.is_number(),
            ArgShape::Integer => value.is_i64() || value.is_u64(),
            ArgShape::String => value.is_string(),
            ArgShape::Array => value.is_array(),
            ArgShape::Object => value.is_object(),
        }
    }

    /// Lower-case name used in diagnostics and signatures.
    pub fn as_str(self) -> &'static str {
        match self {
            ArgShape::Any => "any",
            ArgShape::Bool => "bool",
            ArgShape::Number => "number",
            ArgShape::Integer => "integer",
            ArgShape::String => "string",
            ArgShape::Array => "array",
            ArgShape::Object => "object",
        }
    }
}

impl fmt::Display for ArgShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Declared shape of one positional argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Required shape of non-null values.
    pub shape: ArgShape,
    /// Whether `null` is accepted.
    #[serde(default)]
    pub nullable: bool,
}

impl ArgSpec {
    /// Creates a non-nullable spec of the given shape.
    pub fn new(shape: ArgShape) -> Self {
        Self {
            name: None,
            shape,
            nullable: false,
        }
    }

    /// Shorthand for [`ArgShape::Any`].
    pub fn any() -> Self {
        Self::new(ArgShape::Any)
    }

    /// Shorthand for [`ArgShape::Bool`].
    pub fn bool() -> Self {
        Self::new(ArgShape::Bool)
    }

    /// Shorthand for [`ArgShape::Number`].
    pub fn number() -> Self {
        Self::new(ArgShape::Number)
    }

    /// Shorthand for [`ArgShape::Integer`].
    pub fn integer() -> Self {
        Self::new(ArgShape::Integer)
    }

    /// Shorthand for [`ArgShape::String`].
    pub fn string() -> Self {
        Self::new(ArgShape::String)
    }

    /// Shorthand for [`ArgShape::Array`].
    pub fn array() -> Self {
        Self::new(ArgShape::Array)
    }

    /// Shorthand for [`ArgShape::Object`].
    pub fn object() -> Self {
        Self::new(ArgShape::Object)
    }

    /// Attaches a display name used in diagnostics and generated stubs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Allows `null` in addition to the declared shape.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Returns true when `value` is acceptable for this argument.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.nullable || self.shape == ArgShape::Any;
        }
        self.shape.matches(value)
    }
}

/// Checks positional arguments against their declared specs.
///
/// Fails with [`BridgeError::ArgumentMismatch`] on the first count or shape
/// violation.
pub fn validate_arguments(specs: &[ArgSpec], args: &[Value]) -> Result<(), BridgeError> {
    if specs.len() != args.len() {
        return Err(BridgeError::ArgumentMismatch(
            ErrorInfo::new(
                CODE_ARGUMENT_MISMATCH,
                format!(
                    "expected {} argument(s) but received {}",
                    specs.len(),
                    args.len()
                ),
            )
            .with_context("expected", specs.len().to_string())
            .with_context("received", args.len().to_string()),
        ));
    }
    for (idx, (spec, value)) in specs.iter().zip(args).enumerate() {
        if !spec.accepts(value) {
            let label = spec
                .name
                .clone()
                .unwrap_or_else(|| format!("#{idx}"));
            return Err(BridgeError::ArgumentMismatch(
                ErrorInfo::new(
                    CODE_ARGUMENT_MISMATCH,
                    format!(
                        "argument {label} expected {} but received {}",
                        spec.shape,
                        describe(value)
                    ),
                )
                .with_context("index", idx.to_string())
                .with_context("expected", spec.shape.as_str())
                .with_context("received", describe(value)),
            ));
        }
    }
    Ok(())
}

/// Ordered arguments handed to a method body after validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(Vec<Value>);

impl Arguments {
    /// Wraps positional values.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Number of positional values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no values were passed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the raw value at `idx`.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }

    /// Borrows all values in order.
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    /// Consumes the wrapper.
    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }

    fn required(&self, idx: usize) -> Result<&Value, MethodError> {
        self.0.get(idx).ok_or_else(|| {
            MethodError::new(
                CODE_ARGUMENT_MISMATCH,
                format!("missing argument at position {idx}"),
            )
        })
    }

    /// Returns the argument at `idx` as a string slice.
    pub fn str(&self, idx: usize) -> Result<&str, MethodError> {
        self.required(idx)?.as_str().ok_or_else(|| {
            MethodError::new(
                CODE_ARGUMENT_MISMATCH,
                format!("argument at position {idx} is not a string"),
            )
        })
    }

    /// Returns the argument at `idx` as a float.
    pub fn f64(&self, idx: usize) -> Result<f64, MethodError> {
        self.required(idx)?.as_f64().ok_or_else(|| {
            MethodError::new(
                CODE_ARGUMENT_MISMATCH,
                format!("argument at position {idx} is not a number"),
            )
        })
    }

    /// Returns the argument at `idx` as a signed integer.
    pub fn i64(&self, idx: usize) -> Result<i64, MethodError> {
        self.required(idx)?.as_i64().ok_or_else(|| {
            MethodError::new(
                CODE_ARGUMENT_MISMATCH,
                format!("argument at position {idx} is not an integer"),
            )
        })
    }

    /// Returns the argument at `idx` as a bool.
    pub fn bool(&self, idx: usize) -> Result<bool, MethodError> {
        self.required(idx)?.as_bool().ok_or_else(|| {
            MethodError::new(
                CODE_ARGUMENT_MISMATCH,
                format!("argument at position {idx} is not a bool"),
            )
        })
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}
