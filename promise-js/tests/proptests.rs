use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use promise_js::{
  arg, call, Agent, AgentOptions, NativeFunction, Promise, PromiseState, UnhandledRejectionsMode,
  Value,
};

fn quiet_agent() -> Agent {
  Agent::new(AgentOptions {
    unhandled_rejections: UnhandledRejectionsMode::None,
    ..AgentOptions::default()
  })
}

/// A call to one of the resolving functions: `(is_resolve, payload)`.
fn arb_call() -> impl Strategy<Value = (bool, i32)> {
  (any::<bool>(), -1000i32..1000)
}

proptest! {
  #[test]
  fn first_resolving_call_wins(calls in prop::collection::vec(arb_call(), 1..16)) {
    let mut agent = quiet_agent();
    let (promise, functions) = Promise::with_resolvers(&mut agent);

    for &(is_resolve, payload) in &calls {
      let function = if is_resolve { &functions.resolve } else { &functions.reject };
      call(&mut agent, function, Value::Undefined, &[Value::from(payload)]).unwrap();
    }
    agent.run_jobs().unwrap();

    let (is_resolve, payload) = calls[0];
    let expected = if is_resolve { PromiseState::Fulfilled } else { PromiseState::Rejected };
    prop_assert_eq!(promise.state(), expected);
    prop_assert_eq!(promise.result(), Some(Value::from(payload)));
  }

  #[test]
  fn reactions_run_in_registration_order(count in 1usize..24, reject in any::<bool>()) {
    let mut agent = quiet_agent();
    let (promise, functions) = Promise::with_resolvers(&mut agent);
    let log: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));

    for i in 0..count {
      let log = log.clone();
      let handler = NativeFunction::new("record", 1, move |_host, _this, _args| {
        log.borrow_mut().push(i);
        Ok(Value::Undefined)
      })
      .into_value();
      if reject {
        promise.then(&mut agent, Value::Undefined, handler).unwrap();
      } else {
        promise.then(&mut agent, handler, Value::Undefined).unwrap();
      }
    }

    let settle = if reject { &functions.reject } else { &functions.resolve };
    call(&mut agent, settle, Value::Undefined, &[Value::Undefined]).unwrap();
    let report = agent.run_jobs().unwrap();

    prop_assert_eq!(report.jobs_run, count as u64);
    prop_assert_eq!(log.borrow().clone(), (0..count).collect::<Vec<_>>());
  }

  #[test]
  fn chain_length_matches_job_count(links in 1usize..32, value in -1000i32..1000) {
    let mut agent = quiet_agent();
    let mut tail = Value::from(Promise::resolved(&mut agent, Value::from(value)).unwrap());
    for _ in 0..links {
      let passthrough = NativeFunction::new("pass", 1, |_host, _this, args| Ok(arg(args, 0))).into_value();
      tail = tail.as_promise().unwrap().then(&mut agent, passthrough, Value::Undefined).unwrap();
    }

    let report = agent.run_jobs().unwrap();
    prop_assert_eq!(report.jobs_run, links as u64);
    prop_assert_eq!(tail.as_promise().unwrap().result(), Some(Value::from(value)));
  }
}
