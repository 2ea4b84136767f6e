use crate::{HostObject, JsString, Object, Value, VmError, VmHostHooks};
use std::any::Any;

/// Signature of a native `[[Call]]` implementation: `(host, this, args) -> completion`.
pub type NativeCallFn = dyn Fn(&mut dyn VmHostHooks, Value, &[Value]) -> Result<Value, VmError>;

/// Signature of a native `[[Construct]]` implementation: `(host, args, newTarget) -> completion`.
pub type NativeConstructFn =
  dyn Fn(&mut dyn VmHostHooks, &[Value], &Value) -> Result<Value, VmError>;

/// A JavaScript function object backed by a Rust closure.
///
/// This is how the engine materializes built-in internal functions (resolving functions, combinator
/// element functions, `finally` thunks) and how embeddings and tests provide executors and
/// handlers.
pub struct NativeFunction {
  name: JsString,
  length: u32,
  call: Box<NativeCallFn>,
  construct: Option<Box<NativeConstructFn>>,
}

impl NativeFunction {
  pub fn new(
    name: &str,
    length: u32,
    call: impl Fn(&mut dyn VmHostHooks, Value, &[Value]) -> Result<Value, VmError> + 'static,
  ) -> Self {
    Self {
      name: JsString::from(name),
      length,
      call: Box::new(call),
      construct: None,
    }
  }

  /// Gives this function a `[[Construct]]` internal method.
  pub fn with_construct(
    mut self,
    construct: impl Fn(&mut dyn VmHostHooks, &[Value], &Value) -> Result<Value, VmError> + 'static,
  ) -> Self {
    self.construct = Some(Box::new(construct));
    self
  }

  pub fn into_value(self) -> Value {
    Value::Object(Object::new(self))
  }
}

impl HostObject for NativeFunction {
  fn class_name(&self) -> &'static str {
    "Function"
  }

  fn get(&self, _host: &mut dyn VmHostHooks, key: &str, _receiver: &Value) -> Result<Value, VmError> {
    Ok(match key {
      "name" => Value::String(self.name.clone()),
      "length" => Value::Number(self.length as f64),
      _ => Value::Undefined,
    })
  }

  fn is_callable(&self) -> bool {
    true
  }

  fn call(&self, host: &mut dyn VmHostHooks, this: Value, args: &[Value]) -> Result<Value, VmError> {
    (self.call)(host, this, args)
  }

  fn is_constructor(&self) -> bool {
    self.construct.is_some()
  }

  fn construct(
    &self,
    host: &mut dyn VmHostHooks,
    args: &[Value],
    new_target: &Value,
  ) -> Result<Value, VmError> {
    match &self.construct {
      Some(construct) => construct(host, args, new_target),
      None => Err(crate::error_object::throw_type_error("value is not a constructor")),
    }
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// Returns `args[index]` or `undefined`, mirroring how builtins read missing
/// arguments.
#[inline]
pub fn arg(args: &[Value], index: usize) -> Value {
  args.get(index).cloned().unwrap_or_default()
}
