//! `Promise.all`, `Promise.allSettled`, `Promise.any` and `Promise.race`.
//!
//! See <https://tc39.es/ecma262/#sec-promise.all> and siblings.
//!
//! All four share one driver: build a capability from `C`, read `C.resolve` once, iterate the
//! input, normalize each element by calling `C.resolve(element)`, subscribe through an observable
//! `then` call, and turn any abrupt completion into a rejection of the result promise (closing the
//! iterator first when the abrupt completion did not come from the iterator itself).
//!
//! The aggregating combinators count outstanding elements starting from 1; the extra count is
//! released once iteration finishes, so the result cannot settle while elements are still being
//! subscribed.

use crate::error_object::{new_aggregate_error, throw_type_error};
use crate::function::arg;
use crate::iterator::{get_iterator, iterator_close, iterator_step_value, IteratorRecord};
use crate::object::{call, get, invoke};
use crate::promise::PromiseCapability;
use crate::promise_ops::new_promise_capability;
use crate::{ArrayObject, NativeFunction, PlainObject, Value, VmError, VmHostHooks};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// `Promise.all(iterable)` with `this = C`.
pub fn promise_all(
  host: &mut dyn VmHostHooks,
  constructor: &Value,
  iterable: Value,
) -> Result<Value, VmError> {
  run_combinator(host, constructor, &iterable, "all", |host, record, resolve, capability| {
    perform_aggregate(host, record, constructor, resolve, capability, Aggregate::All)
  })
}

/// `Promise.allSettled(iterable)` with `this = C`.
pub fn promise_all_settled(
  host: &mut dyn VmHostHooks,
  constructor: &Value,
  iterable: Value,
) -> Result<Value, VmError> {
  run_combinator(host, constructor, &iterable, "allSettled", |host, record, resolve, capability| {
    perform_aggregate(host, record, constructor, resolve, capability, Aggregate::AllSettled)
  })
}

/// `Promise.any(iterable)` with `this = C`.
pub fn promise_any(
  host: &mut dyn VmHostHooks,
  constructor: &Value,
  iterable: Value,
) -> Result<Value, VmError> {
  run_combinator(host, constructor, &iterable, "any", |host, record, resolve, capability| {
    perform_aggregate(host, record, constructor, resolve, capability, Aggregate::Any)
  })
}

/// `Promise.race(iterable)` with `this = C`.
///
/// The first element to settle settles the result; an empty input leaves it pending forever.
pub fn promise_race(
  host: &mut dyn VmHostHooks,
  constructor: &Value,
  iterable: Value,
) -> Result<Value, VmError> {
  run_combinator(host, constructor, &iterable, "race", |host, record, resolve, capability| {
    while let Some(next) = iterator_step_value(host, record)? {
      let next_promise = call(host, resolve, constructor.clone(), &[next])?;
      invoke(
        host,
        &next_promise,
        "then",
        &[capability.resolve.clone(), capability.reject.clone()],
      )?;
    }
    Ok(())
  })
}

fn run_combinator(
  host: &mut dyn VmHostHooks,
  constructor: &Value,
  iterable: &Value,
  name: &'static str,
  perform: impl FnOnce(
    &mut dyn VmHostHooks,
    &mut IteratorRecord,
    &Value,
    &PromiseCapability,
  ) -> Result<(), VmError>,
) -> Result<Value, VmError> {
  let capability = new_promise_capability(host, constructor)?;

  let resolve = match get_promise_resolve(host, constructor) {
    Ok(resolve) => resolve,
    Err(e) => return reject_with_abrupt(host, capability, e),
  };

  let mut record = match get_iterator(host, iterable) {
    Ok(record) => record,
    Err(e) => return reject_with_abrupt(host, capability, e),
  };

  let mut result = perform(host, &mut record, &resolve, &capability);
  if result.is_err() && !record.done {
    result = iterator_close(host, &record, result);
  }

  match result {
    Ok(()) => Ok(capability.promise),
    Err(e) => {
      tracing::trace!(target: "promise_js::promise", combinator = name, "input iteration was abrupt");
      reject_with_abrupt(host, capability, e)
    }
  }
}

/// `GetPromiseResolve(C)`: the `resolve` method every element is normalized through.
fn get_promise_resolve(host: &mut dyn VmHostHooks, constructor: &Value) -> Result<Value, VmError> {
  let resolve = get(host, constructor, "resolve")?;
  if !resolve.is_callable() {
    return Err(throw_type_error("Promise resolve is not a function"));
  }
  Ok(resolve)
}

/// `IfAbruptRejectPromise(value, capability)`.
fn reject_with_abrupt(
  host: &mut dyn VmHostHooks,
  capability: PromiseCapability,
  error: VmError,
) -> Result<Value, VmError> {
  let VmError::Throw(reason) = error else {
    return Err(error);
  };
  call(host, &capability.reject, Value::Undefined, &[reason])?;
  Ok(capability.promise)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
  All,
  AllSettled,
  Any,
}

/// State shared by the element functions of one aggregating combinator call.
struct AggregateState {
  /// Fulfillment values (`all`), settlement records (`allSettled`) or reasons (`any`), in input
  /// order.
  values: RefCell<Vec<Value>>,
  remaining: Cell<usize>,
}

impl AggregateState {
  /// Decrements the outstanding count; returns whether it reached zero.
  fn release(&self) -> bool {
    let remaining = self.remaining.get().saturating_sub(1);
    self.remaining.set(remaining);
    remaining == 0
  }

  fn finish(
    &self,
    host: &mut dyn VmHostHooks,
    kind: Aggregate,
    capability: &PromiseCapability,
  ) -> Result<(), VmError> {
    let values = self.values.borrow().clone();
    match kind {
      Aggregate::All | Aggregate::AllSettled => {
        call(host, &capability.resolve, Value::Undefined, &[ArrayObject::from_values(values)])?;
      }
      Aggregate::Any => {
        let error = new_aggregate_error(values, "All promises were rejected");
        call(host, &capability.reject, Value::Undefined, &[error])?;
      }
    }
    Ok(())
  }
}

fn perform_aggregate(
  host: &mut dyn VmHostHooks,
  record: &mut IteratorRecord,
  constructor: &Value,
  resolve: &Value,
  capability: &PromiseCapability,
  kind: Aggregate,
) -> Result<(), VmError> {
  let state = Rc::new(AggregateState {
    values: RefCell::new(Vec::new()),
    remaining: Cell::new(1),
  });
  let mut index = 0;

  while let Some(next) = iterator_step_value(host, record)? {
    state.values.borrow_mut().push(Value::Undefined);
    let next_promise = call(host, resolve, constructor.clone(), &[next])?;

    let already_called = Rc::new(Cell::new(false));
    let (on_fulfilled, on_rejected) = match kind {
      Aggregate::All => (
        element_function(&state, &already_called, capability, kind, index, ElementSlot::Value),
        capability.reject.clone(),
      ),
      Aggregate::AllSettled => (
        element_function(&state, &already_called, capability, kind, index, ElementSlot::Fulfilled),
        element_function(&state, &already_called, capability, kind, index, ElementSlot::Rejected),
      ),
      Aggregate::Any => (
        capability.resolve.clone(),
        element_function(&state, &already_called, capability, kind, index, ElementSlot::Value),
      ),
    };

    state.remaining.set(state.remaining.get() + 1);
    invoke(host, &next_promise, "then", &[on_fulfilled, on_rejected])?;
    index += 1;
  }

  if state.release() {
    state.finish(host, kind, capability)?;
  }
  Ok(())
}

#[derive(Debug, Clone, Copy)]
enum ElementSlot {
  /// Store the argument as is.
  Value,
  /// Store `{ status: "fulfilled", value }`.
  Fulfilled,
  /// Store `{ status: "rejected", reason }`.
  Rejected,
}

/// Creates a `Promise.all` resolve element function (or the `allSettled`/`any` equivalent).
///
/// `already_called` is shared by every element function created for the same input element, so
/// only the first call for that element has any effect.
fn element_function(
  state: &Rc<AggregateState>,
  already_called: &Rc<Cell<bool>>,
  capability: &PromiseCapability,
  kind: Aggregate,
  index: usize,
  slot: ElementSlot,
) -> Value {
  let state = state.clone();
  let already_called = already_called.clone();
  let capability = capability.clone();
  NativeFunction::new("", 1, move |host, _this, args| {
    if already_called.replace(true) {
      return Ok(Value::Undefined);
    }
    let x = arg(args, 0);
    let stored = match slot {
      ElementSlot::Value => x,
      ElementSlot::Fulfilled => PlainObject::new()
        .with("status", "fulfilled")
        .with("value", x)
        .into_value(),
      ElementSlot::Rejected => PlainObject::new()
        .with("status", "rejected")
        .with("reason", x)
        .into_value(),
    };
    if let Some(entry) = state.values.borrow_mut().get_mut(index) {
      *entry = stored;
    }
    if state.release() {
      state.finish(host, kind, &capability)?;
    }
    Ok(Value::Undefined)
  })
  .into_value()
}
