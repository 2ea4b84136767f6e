use crate::{JsString, Object, Promise};
use std::fmt;

/// A JavaScript value.
///
/// Primitive values are stored inline; objects are reference-counted handles into the embedding's
/// object model (see [`HostObject`](crate::HostObject)).
#[derive(Clone, Default)]
pub enum Value {
  /// The JavaScript `undefined` value.
  #[default]
  Undefined,
  /// The JavaScript `null` value.
  Null,
  /// A JavaScript boolean.
  Bool(bool),
  /// A JavaScript number (IEEE-754 double).
  Number(f64),
  /// A JavaScript string.
  String(JsString),
  /// A JavaScript object.
  Object(Object),
}

impl Value {
  /// ECMAScript `SameValue(x, y)`.
  ///
  /// This differs from `==`/`===` for Numbers:
  /// - `NaN` is the same as `NaN`
  /// - `+0` and `-0` are distinct
  pub fn same_value(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::Undefined, Value::Undefined) => true,
      (Value::Null, Value::Null) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Number(a), Value::Number(b)) => {
        if a.is_nan() && b.is_nan() {
          return true;
        }
        if *a == 0.0 && *b == 0.0 {
          // Distinguish +0 and -0.
          return a.to_bits() == b.to_bits();
        }
        a == b
      }
      (Value::String(a), Value::String(b)) => a == b,
      (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
      _ => false,
    }
  }

  /// ECMAScript `ToBoolean(argument)`.
  pub fn to_boolean(&self) -> bool {
    match self {
      Value::Undefined | Value::Null => false,
      Value::Bool(b) => *b,
      Value::Number(n) => !(n.is_nan() || *n == 0.0),
      Value::String(s) => !s.is_empty(),
      Value::Object(_) => true,
    }
  }

  #[inline]
  pub fn is_undefined(&self) -> bool {
    matches!(self, Value::Undefined)
  }

  #[inline]
  pub fn is_nullish(&self) -> bool {
    matches!(self, Value::Undefined | Value::Null)
  }

  #[inline]
  pub fn as_object(&self) -> Option<&Object> {
    match self {
      Value::Object(obj) => Some(obj),
      _ => None,
    }
  }

  /// Returns the promise record if this value is a promise object.
  pub fn as_promise(&self) -> Option<&Promise> {
    self.as_object().and_then(Object::as_promise)
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      Value::Number(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s.as_str()),
      _ => None,
    }
  }

  /// ECMAScript `IsCallable(argument)`.
  pub fn is_callable(&self) -> bool {
    self.as_object().is_some_and(Object::is_callable)
  }

  /// ECMAScript `IsConstructor(argument)`.
  pub fn is_constructor(&self) -> bool {
    self.as_object().is_some_and(Object::is_constructor)
  }

  /// The `typeof`-style name of this value's type, for diagnostics.
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Undefined => "undefined",
      Value::Null => "null",
      Value::Bool(_) => "boolean",
      Value::Number(_) => "number",
      Value::String(_) => "string",
      Value::Object(obj) if obj.is_callable() => "function",
      Value::Object(_) => "object",
    }
  }
}

impl PartialEq for Value {
  /// Strict equality (`===`): numbers compare numerically, objects by identity.
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::Number(a), Value::Number(b)) => a == b,
      _ => self.same_value(other),
    }
  }
}

impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Undefined => f.write_str("undefined"),
      Value::Null => f.write_str("null"),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Number(n) => write!(f, "{n}"),
      Value::String(s) => write!(f, "{s:?}"),
      Value::Object(obj) => fmt::Debug::fmt(obj, f),
    }
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Self::Number(value)
  }
}

impl From<i32> for Value {
  fn from(value: i32) -> Self {
    Self::Number(value as f64)
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Self::String(JsString::from(value))
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Self::String(JsString::from(value))
  }
}

impl From<JsString> for Value {
  fn from(value: JsString) -> Self {
    Self::String(value)
  }
}

impl From<Object> for Value {
  fn from(value: Object) -> Self {
    Self::Object(value)
  }
}

impl From<Promise> for Value {
  fn from(value: Promise) -> Self {
    Self::Object(Object::Promise(value))
  }
}
