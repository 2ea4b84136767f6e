use crate::{ArrayObject, HostObject, JsString, Object, Value, VmError, VmHostHooks};
use std::any::Any;

/// The native error constructors the engine needs to instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Error,
  TypeError,
  AggregateError,
}

impl ErrorKind {
  pub fn name(self) -> &'static str {
    match self {
      ErrorKind::Error => "Error",
      ErrorKind::TypeError => "TypeError",
      ErrorKind::AggregateError => "AggregateError",
    }
  }
}

/// A minimal native `Error` object instance.
///
/// Exposes own `"name"` and `"message"` data properties, plus `"errors"` for `AggregateError`.
pub struct ErrorObject {
  kind: ErrorKind,
  message: JsString,
  errors: Vec<Value>,
}

impl ErrorObject {
  pub fn new(kind: ErrorKind, message: &str) -> Self {
    Self {
      kind,
      message: JsString::from(message),
      errors: Vec::new(),
    }
  }

  pub fn kind(&self) -> ErrorKind {
    self.kind
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn errors(&self) -> &[Value] {
    &self.errors
  }

  /// Returns the error object behind `value`, if any.
  pub fn from_value(value: &Value) -> Option<&ErrorObject> {
    value.as_object().and_then(|obj| obj.downcast_ref::<ErrorObject>())
  }

  pub fn into_value(self) -> Value {
    Value::Object(Object::new(self))
  }
}

impl HostObject for ErrorObject {
  fn class_name(&self) -> &'static str {
    self.kind.name()
  }

  fn get(&self, _host: &mut dyn VmHostHooks, key: &str, _receiver: &Value) -> Result<Value, VmError> {
    Ok(match key {
      "name" => Value::from(self.kind.name()),
      "message" => Value::String(self.message.clone()),
      "errors" if self.kind == ErrorKind::AggregateError => {
        ArrayObject::from_values(self.errors.clone())
      }
      _ => Value::Undefined,
    })
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// Allocates a new ECMAScript `TypeError` object (instance).
pub fn new_type_error(message: &str) -> Value {
  ErrorObject::new(ErrorKind::TypeError, message).into_value()
}

/// Creates a thrown `TypeError` completion.
pub fn throw_type_error(message: &str) -> VmError {
  VmError::Throw(new_type_error(message))
}

/// Allocates a new `AggregateError` carrying `errors` in order.
pub fn new_aggregate_error(errors: Vec<Value>, message: &str) -> Value {
  ErrorObject {
    kind: ErrorKind::AggregateError,
    message: JsString::from(message),
    errors,
  }
  .into_value()
}
