//! The object capability interface consumed by the promise engine.
//!
//! The engine never owns a full object model. Everything it needs from an object (property reads
//! that may run user code, `[[Call]]`, `[[Construct]]`) goes through [`HostObject`], so an
//! embedding can expose its own objects as thenables, iterables, executors and constructors.
//!
//! Promises are the one object kind the engine owns directly ([`Object::Promise`]); every other
//! object is an [`Object::Host`] trait object.

use crate::error_object::throw_type_error;
use crate::{NativeFunction, Promise, Value, VmError, VmHostHooks};
use ahash::AHashMap;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Property key standing in for the well-known symbol `@@species`.
pub const SPECIES_KEY: &str = "@@species";
/// Property key standing in for the well-known symbol `@@iterator`.
pub const ITERATOR_KEY: &str = "@@iterator";

/// An embedding-provided object.
///
/// All methods except [`HostObject::as_any`] have defaults describing a plain, non-callable object
/// without properties.
pub trait HostObject: 'static {
  /// Class name used for diagnostics.
  fn class_name(&self) -> &'static str {
    "Object"
  }

  /// `[[Get]](key, receiver)`.
  ///
  /// Implementations may run arbitrary user code (accessors) and may therefore throw.
  fn get(
    &self,
    _host: &mut dyn VmHostHooks,
    _key: &str,
    _receiver: &Value,
  ) -> Result<Value, VmError> {
    Ok(Value::Undefined)
  }

  fn is_callable(&self) -> bool {
    false
  }

  /// `[[Call]](this, args)`.
  fn call(
    &self,
    _host: &mut dyn VmHostHooks,
    _this: Value,
    _args: &[Value],
  ) -> Result<Value, VmError> {
    Err(throw_type_error("value is not callable"))
  }

  fn is_constructor(&self) -> bool {
    false
  }

  /// `[[Construct]](args, newTarget)`.
  fn construct(
    &self,
    _host: &mut dyn VmHostHooks,
    _args: &[Value],
    _new_target: &Value,
  ) -> Result<Value, VmError> {
    Err(throw_type_error("value is not a constructor"))
  }

  fn as_any(&self) -> &dyn Any;
}

/// A handle to a JavaScript object.
#[derive(Clone)]
pub enum Object {
  /// An engine-owned promise.
  Promise(Promise),
  /// Any other object, supplied by the embedding or by this crate's helper object kinds.
  Host(Rc<dyn HostObject>),
}

impl Object {
  pub fn new<T: HostObject>(object: T) -> Self {
    Self::Host(Rc::new(object))
  }

  /// Object identity.
  pub fn ptr_eq(&self, other: &Object) -> bool {
    match (self, other) {
      (Object::Promise(a), Object::Promise(b)) => a.ptr_eq(b),
      (Object::Host(a), Object::Host(b)) => {
        std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
      }
      _ => false,
    }
  }

  pub fn as_promise(&self) -> Option<&Promise> {
    match self {
      Object::Promise(promise) => Some(promise),
      Object::Host(_) => None,
    }
  }

  /// Attempts to downcast a host object by reference.
  pub fn downcast_ref<T: HostObject>(&self) -> Option<&T> {
    match self {
      Object::Promise(_) => None,
      Object::Host(obj) => obj.as_any().downcast_ref::<T>(),
    }
  }

  pub fn class_name(&self) -> &'static str {
    match self {
      Object::Promise(_) => "Promise",
      Object::Host(obj) => obj.class_name(),
    }
  }

  /// `Get(O, P)`.
  pub fn get(&self, host: &mut dyn VmHostHooks, key: &str) -> Result<Value, VmError> {
    let receiver = Value::Object(self.clone());
    match self {
      Object::Promise(promise) => promise.get_property(host, key),
      Object::Host(obj) => obj.get(host, key, &receiver),
    }
  }

  pub fn is_callable(&self) -> bool {
    match self {
      Object::Promise(_) => false,
      Object::Host(obj) => obj.is_callable(),
    }
  }

  pub fn is_constructor(&self) -> bool {
    match self {
      Object::Promise(_) => false,
      Object::Host(obj) => obj.is_constructor(),
    }
  }

  pub fn call(
    &self,
    host: &mut dyn VmHostHooks,
    this: Value,
    args: &[Value],
  ) -> Result<Value, VmError> {
    match self {
      Object::Host(obj) if obj.is_callable() => obj.call(host, this, args),
      _ => Err(throw_type_error("value is not callable")),
    }
  }

  pub fn construct(
    &self,
    host: &mut dyn VmHostHooks,
    args: &[Value],
    new_target: &Value,
  ) -> Result<Value, VmError> {
    match self {
      Object::Host(obj) if obj.is_constructor() => obj.construct(host, args, new_target),
      _ => Err(throw_type_error("value is not a constructor")),
    }
  }
}

impl fmt::Debug for Object {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Object::Promise(promise) => fmt::Debug::fmt(promise, f),
      Object::Host(obj) => write!(f, "[object {}]", obj.class_name()),
    }
  }
}

/// `GetV(V, P)`: property lookup on any value. Primitives have no properties in this engine.
pub fn get(host: &mut dyn VmHostHooks, value: &Value, key: &str) -> Result<Value, VmError> {
  match value {
    Value::Object(obj) => obj.get(host, key),
    Value::Undefined | Value::Null => Err(throw_type_error(
      "cannot read properties of undefined or null",
    )),
    _ => Ok(Value::Undefined),
  }
}

/// `Call(F, V, argumentsList)`.
pub fn call(
  host: &mut dyn VmHostHooks,
  callee: &Value,
  this: Value,
  args: &[Value],
) -> Result<Value, VmError> {
  match callee {
    Value::Object(obj) => obj.call(host, this, args),
    _ => Err(throw_type_error("value is not callable")),
  }
}

/// `Construct(F, argumentsList, newTarget)`.
pub fn construct(
  host: &mut dyn VmHostHooks,
  constructor: &Value,
  args: &[Value],
  new_target: Option<&Value>,
) -> Result<Value, VmError> {
  let new_target = new_target.unwrap_or(constructor);
  match constructor {
    Value::Object(obj) => obj.construct(host, args, new_target),
    _ => Err(throw_type_error("value is not a constructor")),
  }
}

/// `Invoke(V, P, argumentsList)`.
pub fn invoke(
  host: &mut dyn VmHostHooks,
  value: &Value,
  key: &str,
  args: &[Value],
) -> Result<Value, VmError> {
  let func = get(host, value, key)?;
  call(host, &func, value.clone(), args)
}

/// An ordinary object holding data properties.
#[derive(Default)]
pub struct PlainObject {
  properties: RefCell<AHashMap<String, Value>>,
}

impl PlainObject {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style helper used when creating result records.
  pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
    self.set(key, value);
    self
  }

  pub fn set(&self, key: &str, value: impl Into<Value>) {
    self.properties.borrow_mut().insert(key.to_string(), value.into());
  }

  pub fn get_own(&self, key: &str) -> Option<Value> {
    self.properties.borrow().get(key).cloned()
  }

  pub fn into_value(self) -> Value {
    Value::Object(Object::new(self))
  }
}

impl HostObject for PlainObject {
  fn get(&self, _host: &mut dyn VmHostHooks, key: &str, _receiver: &Value) -> Result<Value, VmError> {
    Ok(self.get_own(key).unwrap_or_default())
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// An Array-like list of values.
///
/// Arrays are the result type of `Promise.all`/`Promise.allSettled`, and the iterable fast path
/// for combinators.
#[derive(Default)]
pub struct ArrayObject {
  elements: RefCell<Vec<Value>>,
}

impl ArrayObject {
  pub fn new(elements: Vec<Value>) -> Self {
    Self {
      elements: RefCell::new(elements),
    }
  }

  pub fn from_values(elements: Vec<Value>) -> Value {
    Value::Object(Object::new(Self::new(elements)))
  }

  pub fn len(&self) -> usize {
    self.elements.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.elements.borrow().is_empty()
  }

  pub fn element(&self, index: usize) -> Option<Value> {
    self.elements.borrow().get(index).cloned()
  }

  pub fn to_vec(&self) -> Vec<Value> {
    self.elements.borrow().clone()
  }

  /// Returns a copy of the elements of `value` if it is an [`ArrayObject`].
  pub fn values_of(value: &Value) -> Option<Vec<Value>> {
    value
      .as_object()
      .and_then(|obj| obj.downcast_ref::<ArrayObject>())
      .map(ArrayObject::to_vec)
  }
}

impl HostObject for ArrayObject {
  fn class_name(&self) -> &'static str {
    "Array"
  }

  fn get(&self, _host: &mut dyn VmHostHooks, key: &str, receiver: &Value) -> Result<Value, VmError> {
    if key == "length" {
      return Ok(Value::Number(self.len() as f64));
    }
    if key == ITERATOR_KEY {
      let array = receiver.clone();
      return Ok(NativeFunction::new("[Symbol.iterator]", 0, move |_host, _this, _args| {
        Ok(Value::Object(Object::new(ArrayIterator {
          array: array.clone(),
          next_index: RefCell::new(0),
        })))
      })
      .into_value());
    }
    match key.parse::<usize>() {
      Ok(index) => Ok(self.element(index).unwrap_or_default()),
      Err(_) => Ok(Value::Undefined),
    }
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// `%ArrayIteratorPrototype%`-shaped iterator over an [`ArrayObject`].
struct ArrayIterator {
  array: Value,
  next_index: RefCell<usize>,
}

impl HostObject for ArrayIterator {
  fn class_name(&self) -> &'static str {
    "Array Iterator"
  }

  fn get(&self, _host: &mut dyn VmHostHooks, key: &str, _receiver: &Value) -> Result<Value, VmError> {
    if key != "next" {
      return Ok(Value::Undefined);
    }
    Ok(
      NativeFunction::new("next", 0, |_host, this, _args| {
        let Some(iter) = this.as_object().and_then(|o| o.downcast_ref::<ArrayIterator>()) else {
          return Err(throw_type_error("next called on incompatible receiver"));
        };
        let index = *iter.next_index.borrow();
        let element = iter
          .array
          .as_object()
          .and_then(|o| o.downcast_ref::<ArrayObject>())
          .and_then(|a| a.element(index));
        let result = match element {
          Some(value) => {
            *iter.next_index.borrow_mut() = index + 1;
            PlainObject::new().with("done", false).with("value", value)
          }
          None => PlainObject::new().with("done", true),
        };
        Ok(result.into_value())
      })
      .into_value(),
    )
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}
