//! The Promise state machine: construction, resolving functions, settlement and reaction
//! registration.
//!
//! ECMA-262 references:
//! - Promise objects: <https://tc39.es/ecma262/#sec-promise-objects>
//! - `CreateResolvingFunctions`: <https://tc39.es/ecma262/#sec-createresolvingfunctions>
//! - `FulfillPromise` / `RejectPromise` / `TriggerPromiseReactions`
//! - `PerformPromiseThen`: <https://tc39.es/ecma262/#sec-performpromisethen>
//!
//! Promises are single-threaded, reference-counted records. A promise's mutable state is only ever
//! touched synchronously by the engine, and every borrow is released before user code runs, so
//! reentrant callbacks (an executor resolving and then rejecting, a `then` getter settling the
//! promise it is being read from, ...) always observe a consistent record.

use crate::error_object::{new_type_error, throw_type_error};
use crate::function::arg;
use crate::object::{call, invoke};
use crate::promise_jobs::{new_promise_reaction_job, new_promise_resolve_thenable_job};
use crate::promise_ops::{
  intrinsic_promise_constructor, is_intrinsic_promise_constructor, new_promise_capability,
  promise_resolve, species_constructor,
};
use crate::{
  MultipleResolveKind, NativeFunction, PromiseHookEvent, PromiseRejectionOperation, Value, VmError,
  VmHostHooks,
};
use ahash::AHashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

/// The value of a Promise object's `[[PromiseState]]` internal slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseState {
  Pending,
  Fulfilled,
  Rejected,
}

/// The `[[Type]]` of a Promise reaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseReactionType {
  Fulfill,
  Reject,
}

/// An ECMAScript PromiseCapability Record.
///
/// `promise` is usually a [`Promise`], but a capability built from a user-defined constructor may
/// hold any object.
///
/// See <https://tc39.es/ecma262/#sec-promisecapability-records>
#[derive(Debug, Clone)]
pub struct PromiseCapability {
  pub promise: Value,
  pub resolve: Value,
  pub reject: Value,
}

/// The `[[Handler]]` of a reaction record.
///
/// ECMA-262 stores "empty" for a missing handler and branches on the reaction type when the job
/// runs; here the pass-through behaviour is decided once, when the reaction is created.
#[derive(Debug, Clone)]
pub enum Handler {
  /// Forward the settlement value to the derived promise's `resolve`.
  Identity,
  /// Forward the settlement reason to the derived promise's `reject`.
  Thrower,
  /// A callable supplied to `then`.
  User(Value),
}

impl Handler {
  fn from_callback(callback: Value, reaction_type: PromiseReactionType) -> Self {
    if callback.is_callable() {
      return Handler::User(callback);
    }
    match reaction_type {
      PromiseReactionType::Fulfill => Handler::Identity,
      PromiseReactionType::Reject => Handler::Thrower,
    }
  }
}

/// An ECMAScript PromiseReaction Record stored in a Promise's reaction lists.
///
/// See <https://tc39.es/ecma262/#sec-promisereaction-records>
#[derive(Debug, Clone)]
pub struct PromiseReaction {
  pub capability: PromiseCapability,
  pub reaction_type: PromiseReactionType,
  pub handler: Handler,
}

/// A process-unique promise identity, stable for the promise's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromiseId(u64);

impl PromiseId {
  fn next() -> Self {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    Self(NEXT.fetch_add(1, Ordering::Relaxed))
  }

  #[inline]
  pub const fn to_raw(self) -> u64 {
    self.0
  }
}

struct PromiseRecord {
  state: PromiseState,
  result: Value,
  is_handled: bool,
  fulfill_reactions: Vec<PromiseReaction>,
  reject_reactions: Vec<PromiseReaction>,
}

struct PromiseInner {
  id: PromiseId,
  record: RefCell<PromiseRecord>,
  /// The `newTarget` the promise was constructed with; `undefined` means `%Promise%`.
  constructor: Value,
  /// Own properties shadowing the `%Promise.prototype%` members (`then`, `constructor`, ...).
  own_properties: RefCell<AHashMap<String, Value>>,
}

/// A Promise object.
///
/// Cloning a `Promise` clones the handle, not the promise.
#[derive(Clone)]
pub struct Promise {
  inner: Rc<PromiseInner>,
}

impl Promise {
  fn alloc(host: &mut dyn VmHostHooks, constructor: Value, parent: Option<&Promise>) -> Self {
    let promise = Self {
      inner: Rc::new(PromiseInner {
        id: PromiseId::next(),
        record: RefCell::new(PromiseRecord {
          state: PromiseState::Pending,
          result: Value::Undefined,
          is_handled: false,
          fulfill_reactions: Vec::new(),
          reject_reactions: Vec::new(),
        }),
        constructor,
        own_properties: RefCell::new(AHashMap::new()),
      }),
    };
    host.host_promise_hook(
      PromiseHookEvent::Init {
        parent: parent.cloned(),
      },
      &promise,
    );
    promise
  }

  /// `new Promise(executor)`, with `new_target` standing in for a subclass constructor.
  ///
  /// Exceptions thrown by `executor` reject the promise; they never escape as errors. The only
  /// synchronous failure is a non-callable `executor`.
  pub fn construct(
    host: &mut dyn VmHostHooks,
    executor: &Value,
    new_target: Option<&Value>,
  ) -> Result<Promise, VmError> {
    if !executor.is_callable() {
      return Err(throw_type_error("Promise executor is not callable"));
    }

    let constructor = new_target.cloned().unwrap_or_default();
    let promise = Promise::alloc(host, constructor, None);
    let ResolvingFunctions { resolve, reject } = create_resolving_functions(&promise);

    match call(host, executor, Value::Undefined, &[resolve, reject.clone()]) {
      Ok(_) => {}
      Err(VmError::Throw(reason)) => {
        // Go through the resolving function so the alreadyResolved latch is respected.
        call(host, &reject, Value::Undefined, &[reason])?;
      }
      Err(e) => return Err(e),
    }

    Ok(promise)
  }

  /// Creates a pending `%Promise%` together with its resolving functions.
  pub fn with_resolvers(host: &mut dyn VmHostHooks) -> (Promise, ResolvingFunctions) {
    Self::with_resolvers_and_parent(host, None)
  }

  pub(crate) fn with_resolvers_and_parent(
    host: &mut dyn VmHostHooks,
    parent: Option<&Promise>,
  ) -> (Promise, ResolvingFunctions) {
    let promise = Promise::alloc(host, Value::Undefined, parent);
    let functions = create_resolving_functions(&promise);
    (promise, functions)
  }

  /// `Promise.resolve(value)` on `%Promise%`.
  ///
  /// Returns `value` itself when it already is a `%Promise%` instance.
  pub fn resolved(host: &mut dyn VmHostHooks, value: Value) -> Result<Promise, VmError> {
    let resolved = promise_resolve(host, &intrinsic_promise_constructor(), value)?;
    resolved
      .as_promise()
      .cloned()
      .ok_or(VmError::InvariantViolation("%Promise% capability did not produce a promise"))
  }

  /// `Promise.reject(reason)` on `%Promise%`.
  pub fn rejected(host: &mut dyn VmHostHooks, reason: Value) -> Result<Promise, VmError> {
    let (promise, functions) = Self::with_resolvers(host);
    call(host, &functions.reject, Value::Undefined, &[reason])?;
    Ok(promise)
  }

  #[inline]
  pub fn id(&self) -> PromiseId {
    self.inner.id
  }

  pub fn ptr_eq(&self, other: &Promise) -> bool {
    Rc::ptr_eq(&self.inner, &other.inner)
  }

  /// Returns a handle that does not keep the promise alive.
  pub fn downgrade(&self) -> WeakPromise {
    WeakPromise {
      id: self.inner.id,
      inner: Rc::downgrade(&self.inner),
    }
  }

  pub fn state(&self) -> PromiseState {
    self.inner.record.borrow().state
  }

  /// `[[PromiseResult]]`, or `None` while pending.
  pub fn result(&self) -> Option<Value> {
    let record = self.inner.record.borrow();
    match record.state {
      PromiseState::Pending => None,
      PromiseState::Fulfilled | PromiseState::Rejected => Some(record.result.clone()),
    }
  }

  /// `[[PromiseIsHandled]]`.
  pub fn is_handled(&self) -> bool {
    self.inner.record.borrow().is_handled
  }

  /// Number of reactions waiting for settlement (fulfill and reject lists have equal length).
  pub fn pending_reaction_count(&self) -> usize {
    self.inner.record.borrow().fulfill_reactions.len()
  }

  /// Defines an own data property that shadows the corresponding `%Promise.prototype%` member.
  ///
  /// This is how embeddings (and tests) model user code such as `p.then = ...` or
  /// `p.constructor = ...`.
  pub fn define_own_property(&self, key: &str, value: Value) {
    self
      .inner
      .own_properties
      .borrow_mut()
      .insert(key.to_string(), value);
  }

  /// `[[Get]]` for promise objects: own properties first, then `%Promise.prototype%`.
  pub(crate) fn get_property(
    &self,
    _host: &mut dyn VmHostHooks,
    key: &str,
  ) -> Result<Value, VmError> {
    if let Some(value) = self.inner.own_properties.borrow().get(key) {
      return Ok(value.clone());
    }
    Ok(match key {
      "then" => NativeFunction::new("then", 2, |host, this, args| {
        promise_then(host, &this, arg(args, 0), arg(args, 1))
      })
      .into_value(),
      "catch" => NativeFunction::new("catch", 1, |host, this, args| {
        promise_catch(host, &this, arg(args, 0))
      })
      .into_value(),
      "finally" => NativeFunction::new("finally", 1, |host, this, args| {
        promise_finally(host, &this, arg(args, 0))
      })
      .into_value(),
      "constructor" => {
        if self.inner.constructor.is_undefined() {
          intrinsic_promise_constructor()
        } else {
          self.inner.constructor.clone()
        }
      }
      _ => Value::Undefined,
    })
  }

  /// `promise.then(on_fulfilled, on_rejected)`.
  pub fn then(
    &self,
    host: &mut dyn VmHostHooks,
    on_fulfilled: Value,
    on_rejected: Value,
  ) -> Result<Value, VmError> {
    promise_then(host, &Value::from(self.clone()), on_fulfilled, on_rejected)
  }

  /// `promise.catch(on_rejected)`.
  pub fn catch(&self, host: &mut dyn VmHostHooks, on_rejected: Value) -> Result<Value, VmError> {
    promise_catch(host, &Value::from(self.clone()), on_rejected)
  }

  /// `promise.finally(on_finally)`.
  pub fn finally(&self, host: &mut dyn VmHostHooks, on_finally: Value) -> Result<Value, VmError> {
    promise_finally(host, &Value::from(self.clone()), on_finally)
  }
}

impl fmt::Debug for Promise {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut dbg = f.debug_struct("Promise");
    dbg.field("id", &self.inner.id.0);
    match self.inner.record.try_borrow() {
      Ok(record) => {
        dbg.field("state", &record.state);
        if record.state != PromiseState::Pending {
          dbg.field("result", &record.result);
        }
      }
      Err(_) => {
        dbg.field("state", &"<borrowed>");
      }
    }
    dbg.finish()
  }
}

/// A non-owning [`Promise`] handle, created by [`Promise::downgrade`].
#[derive(Clone)]
pub struct WeakPromise {
  id: PromiseId,
  inner: Weak<PromiseInner>,
}

impl WeakPromise {
  pub fn id(&self) -> PromiseId {
    self.id
  }

  /// Returns the promise if any strong handle to it is still alive.
  pub fn upgrade(&self) -> Option<Promise> {
    self.inner.upgrade().map(|inner| Promise { inner })
  }

  pub fn is_alive(&self) -> bool {
    self.inner.strong_count() > 0
  }
}

impl fmt::Debug for WeakPromise {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WeakPromise")
      .field("id", &self.id.0)
      .field("alive", &self.is_alive())
      .finish()
  }
}

/// The `resolve`/`reject` pair returned by `CreateResolvingFunctions`.
#[derive(Debug, Clone)]
pub struct ResolvingFunctions {
  pub resolve: Value,
  pub reject: Value,
}

/// `CreateResolvingFunctions(promise)`.
///
/// Both functions share one `alreadyResolved` latch: the first call to either one wins and every
/// later call is a no-op (reported through
/// [`VmHostHooks::host_promise_multiple_resolves`]).
pub fn create_resolving_functions(promise: &Promise) -> ResolvingFunctions {
  let already_resolved = Rc::new(Cell::new(false));

  let resolve = {
    let promise = promise.clone();
    let already_resolved = already_resolved.clone();
    NativeFunction::new("", 1, move |host, _this, args| {
      let resolution = arg(args, 0);
      if already_resolved.replace(true) {
        host.host_promise_multiple_resolves(
          &promise,
          MultipleResolveKind::ResolveAfterResolved,
          &resolution,
        );
        return Ok(Value::Undefined);
      }
      host.host_promise_hook(PromiseHookEvent::Resolve, &promise);
      resolve_promise(host, &promise, resolution)?;
      Ok(Value::Undefined)
    })
    .into_value()
  };

  let reject = {
    let promise = promise.clone();
    NativeFunction::new("", 1, move |host, _this, args| {
      let reason = arg(args, 0);
      if already_resolved.replace(true) {
        host.host_promise_multiple_resolves(
          &promise,
          MultipleResolveKind::RejectAfterResolved,
          &reason,
        );
        return Ok(Value::Undefined);
      }
      host.host_promise_hook(PromiseHookEvent::Resolve, &promise);
      reject_promise(host, &promise, reason)?;
      Ok(Value::Undefined)
    })
    .into_value()
  };

  ResolvingFunctions { resolve, reject }
}

/// The body of a promise resolve function after the latch check (27.2.1.3.2 steps 7-16).
fn resolve_promise(
  host: &mut dyn VmHostHooks,
  promise: &Promise,
  resolution: Value,
) -> Result<(), VmError> {
  // Self-resolution is a TypeError rejection.
  if resolution.as_promise().is_some_and(|p| p.ptr_eq(promise)) {
    return reject_promise(host, promise, new_type_error("Promise cannot resolve itself"));
  }

  // Non-objects cannot be thenables.
  let Value::Object(thenable) = &resolution else {
    return fulfill_promise(host, promise, resolution);
  };

  // Get `resolution.then`; the getter may throw or even settle other promises.
  let then = match thenable.get(host, "then") {
    Ok(v) => v,
    Err(VmError::Throw(e)) => return reject_promise(host, promise, e),
    Err(e) => return Err(e),
  };

  if !then.is_callable() {
    return fulfill_promise(host, promise, resolution);
  }

  // Enqueue PromiseResolveThenableJob(promise, thenable, then). The job uses *fresh* resolving
  // functions for `promise`, with their own alreadyResolved latch.
  tracing::trace!(
    target: "promise_js::promise",
    promise = promise.id().to_raw(),
    "adopting thenable"
  );
  let functions = create_resolving_functions(promise);
  host.host_enqueue_promise_job(new_promise_resolve_thenable_job(resolution, then, functions));
  Ok(())
}

/// Settles `promise` and takes the reaction list matching `state`.
fn settle(
  promise: &Promise,
  state: PromiseState,
  result: Value,
) -> Result<(bool, Vec<PromiseReaction>), VmError> {
  let mut record = promise.inner.record.borrow_mut();
  if record.state != PromiseState::Pending {
    return Err(VmError::InvariantViolation("settling a promise that is not pending"));
  }
  let fulfill_reactions = mem::take(&mut record.fulfill_reactions);
  let reject_reactions = mem::take(&mut record.reject_reactions);
  record.result = result;
  record.state = state;
  let reactions = match state {
    PromiseState::Rejected => reject_reactions,
    _ => fulfill_reactions,
  };
  Ok((record.is_handled, reactions))
}

/// `FulfillPromise(promise, value)`.
pub(crate) fn fulfill_promise(
  host: &mut dyn VmHostHooks,
  promise: &Promise,
  value: Value,
) -> Result<(), VmError> {
  let (_, reactions) = settle(promise, PromiseState::Fulfilled, value.clone())?;
  tracing::trace!(
    target: "promise_js::promise",
    promise = promise.id().to_raw(),
    reactions = reactions.len(),
    "fulfilled"
  );
  trigger_promise_reactions(host, reactions, value);
  Ok(())
}

/// `RejectPromise(promise, reason)`.
pub(crate) fn reject_promise(
  host: &mut dyn VmHostHooks,
  promise: &Promise,
  reason: Value,
) -> Result<(), VmError> {
  let (is_handled, reactions) = settle(promise, PromiseState::Rejected, reason.clone())?;
  tracing::trace!(
    target: "promise_js::promise",
    promise = promise.id().to_raw(),
    reactions = reactions.len(),
    handled = is_handled,
    "rejected"
  );

  if !is_handled {
    host.host_promise_rejection_tracker(promise, PromiseRejectionOperation::Reject);
  }

  trigger_promise_reactions(host, reactions, reason);
  Ok(())
}

/// `TriggerPromiseReactions(reactions, argument)`: one job per reaction, in registration order.
fn trigger_promise_reactions(
  host: &mut dyn VmHostHooks,
  reactions: Vec<PromiseReaction>,
  argument: Value,
) {
  for reaction in reactions {
    host.host_enqueue_promise_job(new_promise_reaction_job(reaction, argument.clone()));
  }
}

/// `PerformPromiseThen(promise, onFulfilled, onRejected, resultCapability)`.
pub fn perform_promise_then(
  host: &mut dyn VmHostHooks,
  promise: &Promise,
  on_fulfilled: Value,
  on_rejected: Value,
  capability: PromiseCapability,
) {
  let fulfill_reaction = PromiseReaction {
    capability: capability.clone(),
    reaction_type: PromiseReactionType::Fulfill,
    handler: Handler::from_callback(on_fulfilled, PromiseReactionType::Fulfill),
  };
  let reject_reaction = PromiseReaction {
    capability,
    reaction_type: PromiseReactionType::Reject,
    handler: Handler::from_callback(on_rejected, PromiseReactionType::Reject),
  };

  let (state, result, was_handled) = {
    let mut record = promise.inner.record.borrow_mut();
    let was_handled = mem::replace(&mut record.is_handled, true);
    match record.state {
      PromiseState::Pending => {
        record.fulfill_reactions.push(fulfill_reaction);
        record.reject_reactions.push(reject_reaction);
        return;
      }
      state => (state, record.result.clone(), was_handled),
    }
  };

  match state {
    PromiseState::Fulfilled => {
      host.host_enqueue_promise_job(new_promise_reaction_job(fulfill_reaction, result));
    }
    PromiseState::Rejected => {
      if !was_handled {
        host.host_promise_rejection_tracker(promise, PromiseRejectionOperation::Handle);
      }
      host.host_enqueue_promise_job(new_promise_reaction_job(reject_reaction, result));
    }
    PromiseState::Pending => {}
  }
}

/// `Promise.prototype.then` with `this = this_value`.
pub fn promise_then(
  host: &mut dyn VmHostHooks,
  this_value: &Value,
  on_fulfilled: Value,
  on_rejected: Value,
) -> Result<Value, VmError> {
  let Some(promise) = this_value.as_promise() else {
    return Err(throw_type_error(
      "Promise.prototype.then called on incompatible receiver",
    ));
  };

  let constructor = species_constructor(host, this_value, &intrinsic_promise_constructor())?;
  let capability = if is_intrinsic_promise_constructor(&constructor) {
    let (derived, functions) = Promise::with_resolvers_and_parent(host, Some(promise));
    PromiseCapability {
      promise: Value::from(derived),
      resolve: functions.resolve,
      reject: functions.reject,
    }
  } else {
    new_promise_capability(host, &constructor)?
  };

  let derived = capability.promise.clone();
  perform_promise_then(host, promise, on_fulfilled, on_rejected, capability);
  Ok(derived)
}

/// `Promise.prototype.catch`: `Invoke(this, "then", « undefined, onRejected »)`.
pub fn promise_catch(
  host: &mut dyn VmHostHooks,
  this_value: &Value,
  on_rejected: Value,
) -> Result<Value, VmError> {
  invoke(host, this_value, "then", &[Value::Undefined, on_rejected])
}

/// `Promise.prototype.finally`.
///
/// `on_finally` runs on both paths; the original value or reason passes through unless
/// `on_finally` throws or returns a promise that rejects.
pub fn promise_finally(
  host: &mut dyn VmHostHooks,
  this_value: &Value,
  on_finally: Value,
) -> Result<Value, VmError> {
  if this_value.as_object().is_none() {
    return Err(throw_type_error(
      "Promise.prototype.finally called on a non-object",
    ));
  }

  let constructor = species_constructor(host, this_value, &intrinsic_promise_constructor())?;

  let (then_finally, catch_finally) = if on_finally.is_callable() {
    (
      finally_function(constructor.clone(), on_finally.clone(), false),
      finally_function(constructor, on_finally, true),
    )
  } else {
    (on_finally.clone(), on_finally)
  };

  invoke(host, this_value, "then", &[then_finally, catch_finally])
}

/// Builds `thenFinally` (`is_reject = false`) or `catchFinally` (`is_reject = true`).
fn finally_function(constructor: Value, on_finally: Value, is_reject: bool) -> Value {
  let name = if is_reject { "catchFinally" } else { "thenFinally" };
  NativeFunction::new(name, 1, move |host, _this, args| {
    let captured = arg(args, 0);

    let result = call(host, &on_finally, Value::Undefined, &[])?;
    let promise = promise_resolve(host, &constructor, result)?;

    let thunk = if is_reject {
      NativeFunction::new("thrower", 0, move |_host, _this, _args| {
        Err(VmError::Throw(captured.clone()))
      })
    } else {
      NativeFunction::new("valueThunk", 0, move |_host, _this, _args| Ok(captured.clone()))
    };

    invoke(host, &promise, "then", &[thunk.into_value()])
  })
  .into_value()
}
