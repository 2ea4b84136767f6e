use crate::error_object::throw_type_error;
use crate::object::{call, get, ITERATOR_KEY};
use crate::{ArrayObject, Value, VmError, VmHostHooks};

/// ECMAScript "IteratorRecord" (ECMA-262).
///
/// Iterator object, `next` method and done flag as in ECMA-262, plus a private fast path for
/// [`ArrayObject`] iterables whose observable behaviour matches `%ArrayIteratorPrototype%.next`.
#[derive(Debug, Clone)]
pub struct IteratorRecord {
  pub iterator: Value,
  pub next_method: Value,
  pub done: bool,
  kind: IteratorKind,
}

#[derive(Debug, Clone)]
enum IteratorKind {
  Protocol,
  Array { next_index: usize },
}

/// `GetMethod(V, P)`: `None` for `undefined`/`null`, TypeError for other non-callables.
fn get_method(host: &mut dyn VmHostHooks, value: &Value, key: &str) -> Result<Option<Value>, VmError> {
  let method = get(host, value, key)?;
  if method.is_nullish() {
    return Ok(None);
  }
  if !method.is_callable() {
    return Err(throw_type_error(&format!("{key} is not a function")));
  }
  Ok(Some(method))
}

/// `GetIterator(obj, sync)` (ECMA-262).
pub fn get_iterator(host: &mut dyn VmHostHooks, iterable: &Value) -> Result<IteratorRecord, VmError> {
  if let Value::Object(obj) = iterable {
    if obj.downcast_ref::<ArrayObject>().is_some() {
      return Ok(IteratorRecord {
        iterator: iterable.clone(),
        next_method: Value::Undefined,
        done: false,
        kind: IteratorKind::Array { next_index: 0 },
      });
    }
  }

  let Some(method) = get_method(host, iterable, ITERATOR_KEY)? else {
    return Err(throw_type_error(&format!(
      "{} is not iterable",
      iterable.type_name()
    )));
  };
  get_iterator_from_method(host, iterable, &method)
}

/// `GetIteratorFromMethod` (ECMA-262).
pub fn get_iterator_from_method(
  host: &mut dyn VmHostHooks,
  iterable: &Value,
  method: &Value,
) -> Result<IteratorRecord, VmError> {
  let iterator = call(host, method, iterable.clone(), &[])?;
  if iterator.as_object().is_none() {
    return Err(throw_type_error("Result of the Symbol.iterator method is not an object"));
  }
  let next_method = get(host, &iterator, "next")?;
  Ok(IteratorRecord {
    iterator,
    next_method,
    done: false,
    kind: IteratorKind::Protocol,
  })
}

/// `IteratorStepValue` (ECMA-262).
///
/// Returns `Ok(None)` when iteration is complete. Any error marks the record as done, so callers
/// must not close it afterwards.
pub fn iterator_step_value(
  host: &mut dyn VmHostHooks,
  record: &mut IteratorRecord,
) -> Result<Option<Value>, VmError> {
  if record.done {
    return Ok(None);
  }

  let result = match &mut record.kind {
    IteratorKind::Array { next_index } => {
      let element = record
        .iterator
        .as_object()
        .and_then(|obj| obj.downcast_ref::<ArrayObject>())
        .and_then(|array| array.element(*next_index));
      *next_index += 1;
      Ok(element)
    }
    IteratorKind::Protocol => protocol_step_value(host, &record.iterator, &record.next_method),
  };

  match &result {
    Ok(None) | Err(_) => record.done = true,
    Ok(Some(_)) => {}
  }
  result
}

fn protocol_step_value(
  host: &mut dyn VmHostHooks,
  iterator: &Value,
  next_method: &Value,
) -> Result<Option<Value>, VmError> {
  let result = call(host, next_method, iterator.clone(), &[])?;
  if result.as_object().is_none() {
    return Err(throw_type_error(&format!(
      "Iterator result {} is not an object",
      result.type_name()
    )));
  }
  if get(host, &result, "done")?.to_boolean() {
    return Ok(None);
  }
  Ok(Some(get(host, &result, "value")?))
}

/// `IteratorClose(iteratorRecord, completion)` (ECMA-262).
///
/// Precedence: a throw completion passed in wins over anything `return()` does; otherwise an
/// exception from looking up or calling `return()` wins; otherwise a non-object result of
/// `return()` is a TypeError. Terminations always propagate.
pub fn iterator_close<T>(
  host: &mut dyn VmHostHooks,
  record: &IteratorRecord,
  completion: Result<T, VmError>,
) -> Result<T, VmError> {
  if matches!(record.kind, IteratorKind::Array { .. }) {
    return completion;
  }

  let inner = match get_method(host, &record.iterator, "return") {
    Ok(None) => return completion,
    Ok(Some(return_method)) => call(host, &return_method, record.iterator.clone(), &[]),
    Err(e) => Err(e),
  };

  if let Err(e) = &inner {
    if e.is_termination() {
      return Err(e.clone());
    }
  }
  let completion_value = completion?;
  let inner_value = inner?;
  if inner_value.as_object().is_none() {
    return Err(throw_type_error("Iterator result is not an object"));
  }
  Ok(completion_value)
}
