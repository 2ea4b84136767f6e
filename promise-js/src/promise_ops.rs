//! ECMAScript Promise abstract operations and the `%Promise%` constructor object.
//!
//! Engine code calls these helpers directly instead of going through property lookups on the
//! constructor:
//! - `NewPromiseCapability(C)`
//! - `PromiseResolve(C, x)`
//! - `SpeciesConstructor(O, defaultConstructor)`
//!
//! [`PromiseConstructor`] exposes the same operations to user code as members of `%Promise%`, with
//! the receiver as `C`, which is how subclass-shaped constructors reach them.

use crate::error_object::throw_type_error;
use crate::function::arg;
use crate::object::{call, construct, get, SPECIES_KEY};
use crate::promise::{PromiseCapability, ResolvingFunctions};
use crate::promise_combinators::{promise_all, promise_all_settled, promise_any, promise_race};
use crate::{
  HostObject, NativeFunction, Object, PlainObject, Promise, Value, VmError, VmHostHooks,
};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// The intrinsic `%Promise%` constructor.
///
/// There is one instance per thread; see [`intrinsic_promise_constructor`].
pub struct PromiseConstructor {
  _private: (),
}

thread_local! {
  static INTRINSIC_PROMISE: Value = Value::Object(Object::new(PromiseConstructor { _private: () }));
}

/// Returns `%Promise%`.
pub fn intrinsic_promise_constructor() -> Value {
  INTRINSIC_PROMISE.with(Value::clone)
}

/// Returns whether `value` is `%Promise%`.
pub fn is_intrinsic_promise_constructor(value: &Value) -> bool {
  value
    .as_object()
    .is_some_and(|obj| obj.downcast_ref::<PromiseConstructor>().is_some())
}

fn static_method(
  name: &'static str,
  length: u32,
  f: fn(&mut dyn VmHostHooks, &Value, Value) -> Result<Value, VmError>,
) -> Value {
  NativeFunction::new(name, length, move |host, this, args| f(host, &this, arg(args, 0)))
    .into_value()
}

impl HostObject for PromiseConstructor {
  fn class_name(&self) -> &'static str {
    "Function"
  }

  fn get(&self, _host: &mut dyn VmHostHooks, key: &str, receiver: &Value) -> Result<Value, VmError> {
    Ok(match key {
      // `get Promise[@@species]` returns `this`.
      SPECIES_KEY => receiver.clone(),
      "name" => Value::from("Promise"),
      "length" => Value::Number(1.0),
      "resolve" => static_method("resolve", 1, promise_resolve),
      "reject" => static_method("reject", 1, promise_reject),
      "all" => static_method("all", 1, promise_all),
      "allSettled" => static_method("allSettled", 1, promise_all_settled),
      "any" => static_method("any", 1, promise_any),
      "race" => static_method("race", 1, promise_race),
      "withResolvers" => NativeFunction::new("withResolvers", 0, |host, this, _args| {
        promise_with_resolvers(host, &this)
      })
      .into_value(),
      _ => Value::Undefined,
    })
  }

  fn is_callable(&self) -> bool {
    true
  }

  fn call(&self, _host: &mut dyn VmHostHooks, _this: Value, _args: &[Value]) -> Result<Value, VmError> {
    Err(throw_type_error("Promise constructor cannot be invoked without 'new'"))
  }

  fn is_constructor(&self) -> bool {
    true
  }

  fn construct(
    &self,
    host: &mut dyn VmHostHooks,
    args: &[Value],
    new_target: &Value,
  ) -> Result<Value, VmError> {
    let new_target = if is_intrinsic_promise_constructor(new_target) {
      None
    } else {
      Some(new_target)
    };
    let promise = Promise::construct(host, &arg(args, 0), new_target)?;
    Ok(Value::from(promise))
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// `NewPromiseCapability(C)`.
///
/// See <https://tc39.es/ecma262/#sec-newpromisecapability>
pub fn new_promise_capability(
  host: &mut dyn VmHostHooks,
  constructor: &Value,
) -> Result<PromiseCapability, VmError> {
  if !constructor.is_constructor() {
    return Err(throw_type_error("Promise capability constructor is not a constructor"));
  }

  if is_intrinsic_promise_constructor(constructor) {
    let (promise, ResolvingFunctions { resolve, reject }) = Promise::with_resolvers(host);
    return Ok(PromiseCapability {
      promise: Value::from(promise),
      resolve,
      reject,
    });
  }

  // GetCapabilitiesExecutor: records the functions handed to it by `C`'s constructor.
  let slots = Rc::new(RefCell::new((Value::Undefined, Value::Undefined)));
  let executor = {
    let slots = slots.clone();
    NativeFunction::new("", 2, move |_host, _this, args| {
      let mut slots = slots.borrow_mut();
      if !slots.0.is_undefined() {
        return Err(throw_type_error("Promise executor has already been invoked with a resolve function"));
      }
      if !slots.1.is_undefined() {
        return Err(throw_type_error("Promise executor has already been invoked with a reject function"));
      }
      *slots = (arg(args, 0), arg(args, 1));
      Ok(Value::Undefined)
    })
    .into_value()
  };

  let promise = construct(host, constructor, &[executor], None)?;

  let (resolve, reject) = slots.borrow().clone();
  if !resolve.is_callable() {
    return Err(throw_type_error("Promise resolve function is not callable"));
  }
  if !reject.is_callable() {
    return Err(throw_type_error("Promise reject function is not callable"));
  }

  Ok(PromiseCapability {
    promise,
    resolve,
    reject,
  })
}

/// `PromiseResolve(C, x)`.
///
/// See <https://tc39.es/ecma262/#sec-promise-resolve>
pub fn promise_resolve(
  host: &mut dyn VmHostHooks,
  constructor: &Value,
  value: Value,
) -> Result<Value, VmError> {
  if value.as_promise().is_some() {
    let value_constructor = get(host, &value, "constructor")?;
    if value_constructor.same_value(constructor) {
      return Ok(value);
    }
  }

  let capability = new_promise_capability(host, constructor)?;
  call(host, &capability.resolve, Value::Undefined, &[value])?;
  Ok(capability.promise)
}

/// `Promise.reject(r)` with `this = C`.
pub fn promise_reject(
  host: &mut dyn VmHostHooks,
  constructor: &Value,
  reason: Value,
) -> Result<Value, VmError> {
  let capability = new_promise_capability(host, constructor)?;
  call(host, &capability.reject, Value::Undefined, &[reason])?;
  Ok(capability.promise)
}

/// `Promise.withResolvers()` with `this = C`: `{ promise, resolve, reject }`.
pub fn promise_with_resolvers(
  host: &mut dyn VmHostHooks,
  constructor: &Value,
) -> Result<Value, VmError> {
  let capability = new_promise_capability(host, constructor)?;
  Ok(
    PlainObject::new()
      .with("promise", capability.promise)
      .with("resolve", capability.resolve)
      .with("reject", capability.reject)
      .into_value(),
  )
}

/// `SpeciesConstructor(O, defaultConstructor)`.
///
/// Looks up `O.constructor[@@species]` once. A missing or unusable constructor (not an object, or a
/// species that is not a constructor) falls back to `default`; exceptions thrown by the lookups
/// propagate.
pub fn species_constructor(
  host: &mut dyn VmHostHooks,
  object: &Value,
  default: &Value,
) -> Result<Value, VmError> {
  let constructor = get(host, object, "constructor")?;
  let Value::Object(constructor) = constructor else {
    return Ok(default.clone());
  };

  let species = constructor.get(host, SPECIES_KEY)?;
  if species.is_constructor() {
    Ok(species)
  } else {
    Ok(default.clone())
  }
}
