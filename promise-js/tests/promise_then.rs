use std::cell::RefCell;
use std::rc::Rc;

use promise_js::{
  arg, call, format_value, invoke, Agent, AgentOptions, ArrayObject, ErrorKind, ErrorObject,
  NativeFunction, PlainObject, Promise, PromiseState, UnhandledRejectionsMode, Value, VmError,
};

fn quiet_agent() -> Agent {
  Agent::new(AgentOptions {
    unhandled_rejections: UnhandledRejectionsMode::None,
    ..AgentOptions::default()
  })
}

fn tagged_logger(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> Value {
  let log = log.clone();
  NativeFunction::new(tag, 1, move |_host, _this, args| {
    log.borrow_mut().push(format!("{tag}:{}", format_value(&arg(args, 0))));
    Ok(Value::Undefined)
  })
  .into_value()
}

fn returning(value: Value) -> Value {
  NativeFunction::new("returning", 1, move |_host, _this, _args| Ok(value.clone())).into_value()
}

fn throwing(reason: Value) -> Value {
  NativeFunction::new("throwing", 1, move |_host, _this, _args| {
    Err(VmError::Throw(reason.clone()))
  })
  .into_value()
}

fn as_promise(value: &Value) -> Promise {
  value.as_promise().expect("expected a promise").clone()
}

#[test]
fn reactions_run_in_registration_order() {
  let mut agent = quiet_agent();
  let log = Rc::new(RefCell::new(Vec::new()));
  let (promise, functions) = Promise::with_resolvers(&mut agent);

  for tag in ["r1", "r2", "r3", "r4"] {
    promise
      .then(&mut agent, tagged_logger(&log, tag), Value::Undefined)
      .unwrap();
  }
  assert_eq!(promise.pending_reaction_count(), 4);

  call(&mut agent, &functions.resolve, Value::Undefined, &[Value::Number(1.0)]).unwrap();
  assert!(log.borrow().is_empty());
  assert_eq!(agent.pending_jobs(), 4);

  agent.run_jobs().unwrap();
  assert_eq!(*log.borrow(), vec!["r1:1", "r2:1", "r3:1", "r4:1"]);
  assert_eq!(promise.pending_reaction_count(), 0);
}

#[test]
fn reject_reactions_run_in_registration_order() {
  let mut agent = quiet_agent();
  let log = Rc::new(RefCell::new(Vec::new()));
  let (promise, functions) = Promise::with_resolvers(&mut agent);

  promise
    .then(&mut agent, tagged_logger(&log, "f1"), tagged_logger(&log, "r1"))
    .unwrap();
  promise.catch(&mut agent, tagged_logger(&log, "r2")).unwrap();

  call(&mut agent, &functions.reject, Value::Undefined, &[Value::from("e")]).unwrap();
  agent.run_jobs().unwrap();

  assert_eq!(*log.borrow(), vec!["r1:e", "r2:e"]);
}

#[test]
fn jobs_from_independent_promises_interleave_fifo() {
  let mut agent = quiet_agent();
  let log = Rc::new(RefCell::new(Vec::new()));

  let a = Promise::resolved(&mut agent, Value::from("a")).unwrap();
  let b = Promise::resolved(&mut agent, Value::from("b")).unwrap();

  let a1 = a.then(&mut agent, tagged_logger(&log, "a1"), Value::Undefined).unwrap();
  b.then(&mut agent, tagged_logger(&log, "b1"), Value::Undefined).unwrap();
  a.then(&mut agent, tagged_logger(&log, "a2"), Value::Undefined).unwrap();
  invoke(&mut agent, &a1, "then", &[tagged_logger(&log, "a1-next")]).unwrap();

  agent.run_jobs().unwrap();
  assert_eq!(
    *log.borrow(),
    vec!["a1:a", "b1:b", "a2:a", "a1-next:undefined"]
  );
}

#[test]
fn then_on_a_settled_promise_still_waits_for_a_turn() {
  let mut agent = quiet_agent();
  let log = Rc::new(RefCell::new(Vec::new()));
  let promise = Promise::resolved(&mut agent, Value::Number(5.0)).unwrap();

  promise.then(&mut agent, tagged_logger(&log, "f"), Value::Undefined).unwrap();
  assert!(log.borrow().is_empty());
  assert_eq!(agent.pending_jobs(), 1);

  agent.run_jobs().unwrap();
  assert_eq!(*log.borrow(), vec!["f:5"]);
}

#[test]
fn missing_handlers_pass_values_and_reasons_through() {
  let mut agent = quiet_agent();

  let fulfilled = Promise::resolved(&mut agent, Value::Number(1.0)).unwrap();
  let passed_value = fulfilled
    .then(&mut agent, Value::Undefined, returning(Value::from("unused")))
    .unwrap();

  let rejected = Promise::rejected(&mut agent, Value::from("reason")).unwrap();
  let passed_reason = rejected
    .then(&mut agent, Value::Number(3.0), Value::Null)
    .unwrap();

  agent.run_jobs().unwrap();

  let passed_value = as_promise(&passed_value);
  assert_eq!(passed_value.state(), PromiseState::Fulfilled);
  assert_eq!(passed_value.result(), Some(Value::Number(1.0)));

  let passed_reason = as_promise(&passed_reason);
  assert_eq!(passed_reason.state(), PromiseState::Rejected);
  assert_eq!(passed_reason.result(), Some(Value::from("reason")));
}

#[test]
fn handler_return_value_fulfills_the_derived_promise() {
  let mut agent = quiet_agent();
  let rejected = Promise::rejected(&mut agent, Value::from("e")).unwrap();
  let recovered = rejected.catch(&mut agent, returning(Value::from("recovered"))).unwrap();

  agent.run_jobs().unwrap();
  let recovered = as_promise(&recovered);
  assert_eq!(recovered.state(), PromiseState::Fulfilled);
  assert_eq!(recovered.result(), Some(Value::from("recovered")));
}

#[test]
fn handler_exception_rejects_the_derived_promise() {
  let mut agent = quiet_agent();
  let promise = Promise::resolved(&mut agent, Value::Number(1.0)).unwrap();
  let derived = promise
    .then(&mut agent, throwing(Value::from("handler failed")), Value::Undefined)
    .unwrap();

  let report = agent.run_jobs().unwrap();
  assert!(report.errors.is_empty());

  let derived = as_promise(&derived);
  assert_eq!(derived.state(), PromiseState::Rejected);
  assert_eq!(derived.result(), Some(Value::from("handler failed")));
}

#[test]
fn handler_returning_a_promise_is_adopted() {
  let mut agent = quiet_agent();
  let (inner, inner_functions) = Promise::with_resolvers(&mut agent);
  let outer = Promise::resolved(&mut agent, Value::Undefined).unwrap();
  let derived = outer
    .then(&mut agent, returning(Value::from(inner.clone())), Value::Undefined)
    .unwrap();

  agent.run_jobs().unwrap();
  let derived = as_promise(&derived);
  assert_eq!(derived.state(), PromiseState::Pending);

  call(
    &mut agent,
    &inner_functions.reject,
    Value::Undefined,
    &[Value::from("inner")],
  )
  .unwrap();
  agent.run_jobs().unwrap();

  assert_eq!(derived.state(), PromiseState::Rejected);
  assert_eq!(derived.result(), Some(Value::from("inner")));
}

#[test]
fn handler_returning_its_own_derived_promise_rejects_with_type_error() {
  let mut agent = quiet_agent();
  let promise = Promise::resolved(&mut agent, Value::Undefined).unwrap();

  let slot: Rc<RefCell<Value>> = Rc::new(RefCell::new(Value::Undefined));
  let handler = {
    let slot = slot.clone();
    NativeFunction::new("cycle", 1, move |_host, _this, _args| Ok(slot.borrow().clone())).into_value()
  };
  let derived = promise.then(&mut agent, handler, Value::Undefined).unwrap();
  *slot.borrow_mut() = derived.clone();

  agent.run_jobs().unwrap();

  let derived = as_promise(&derived);
  assert_eq!(derived.state(), PromiseState::Rejected);
  let reason = derived.result().unwrap();
  assert_eq!(ErrorObject::from_value(&reason).unwrap().kind(), ErrorKind::TypeError);
  *slot.borrow_mut() = Value::Undefined;
}

#[test]
fn handlers_are_called_with_undefined_this_and_one_argument() {
  let mut agent = quiet_agent();
  let seen: Rc<RefCell<Vec<(bool, usize)>>> = Rc::new(RefCell::new(Vec::new()));
  let handler = {
    let seen = seen.clone();
    NativeFunction::new("inspect", 1, move |_host, this, args| {
      seen.borrow_mut().push((this.is_undefined(), args.len()));
      Ok(Value::Undefined)
    })
    .into_value()
  };

  let promise = Promise::resolved(&mut agent, Value::Number(1.0)).unwrap();
  promise.then(&mut agent, handler, Value::Undefined).unwrap();
  agent.run_jobs().unwrap();

  assert_eq!(*seen.borrow(), vec![(true, 1)]);
}

#[test]
fn then_on_a_non_promise_is_a_type_error() {
  let mut agent = quiet_agent();
  let promise = Promise::resolved(&mut agent, Value::Undefined).unwrap();
  let then = promise_js::get(&mut agent, &Value::from(promise), "then").unwrap();

  let receiver = PlainObject::new().into_value();
  let err = call(&mut agent, &then, receiver, &[]).unwrap_err();
  let reason = err.thrown_value().unwrap();
  assert_eq!(ErrorObject::from_value(reason).unwrap().kind(), ErrorKind::TypeError);
}

#[test]
fn catch_goes_through_an_overridden_then() {
  let mut agent = quiet_agent();
  let promise = Promise::resolved(&mut agent, Value::Undefined).unwrap();
  let captured: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
  {
    let captured = captured.clone();
    promise.define_own_property(
      "then",
      NativeFunction::new("then", 2, move |_host, _this, args| {
        captured.borrow_mut().extend(args.iter().cloned());
        Ok(Value::from("custom"))
      })
      .into_value(),
    );
  }

  let handler = returning(Value::Undefined);
  let result = promise.catch(&mut agent, handler.clone()).unwrap();

  assert_eq!(result, Value::from("custom"));
  let captured = captured.borrow();
  assert_eq!(captured.len(), 2);
  assert!(captured[0].is_undefined());
  assert!(captured[1].same_value(&handler));
}

#[test]
fn catch_on_a_plain_thenable_object() {
  let mut agent = quiet_agent();
  let calls = Rc::new(RefCell::new(0));
  let thenable = {
    let calls = calls.clone();
    PlainObject::new()
      .with(
        "then",
        NativeFunction::new("then", 2, move |_host, _this, _args| {
          *calls.borrow_mut() += 1;
          Ok(Value::Undefined)
        })
        .into_value(),
      )
      .into_value()
  };

  promise_js::promise_catch(&mut agent, &thenable, Value::Undefined).unwrap();
  assert_eq!(*calls.borrow(), 1);
}

#[test]
fn fulfilling_with_an_array_does_not_adopt_it() {
  let mut agent = quiet_agent();
  let array = ArrayObject::from_values(vec![Value::Number(1.0)]);
  let promise = Promise::resolved(&mut agent, array.clone()).unwrap();
  assert_eq!(promise.state(), PromiseState::Fulfilled);
  assert!(promise.result().unwrap().same_value(&array));
}
