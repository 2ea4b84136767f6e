use std::cell::RefCell;
use std::rc::Rc;

use promise_js::{
  Job, JobKind, MicrotaskQueue, NativeFunction, Promise, PromiseState, Value, VmError, VmHostHooks,
};

fn logging_job(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Job {
  let log = log.clone();
  Job::new(JobKind::Generic, move |_host| {
    log.borrow_mut().push(name);
    Ok(())
  })
}

#[test]
fn microtask_queue_runs_jobs_in_fifo_order() {
  let log = Rc::new(RefCell::new(Vec::new()));
  let mut queue = MicrotaskQueue::new();
  queue.enqueue(logging_job(&log, "a"));
  queue.enqueue(logging_job(&log, "b"));
  queue.enqueue(logging_job(&log, "c"));
  assert_eq!(queue.len(), 3);

  let errors = queue.perform_microtask_checkpoint();
  assert!(errors.is_empty());
  assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
  assert!(queue.is_empty());
}

#[test]
fn microtask_queue_drains_jobs_enqueued_while_running() {
  let log = Rc::new(RefCell::new(Vec::new()));
  let mut queue = MicrotaskQueue::new();

  let nested = logging_job(&log, "nested");
  {
    let log = log.clone();
    queue.enqueue(Job::new(JobKind::Generic, move |host| {
      log.borrow_mut().push("outer");
      host.host_enqueue_promise_job(nested);
      Ok(())
    }));
  }
  queue.enqueue(logging_job(&log, "sibling"));

  queue.perform_microtask_checkpoint();
  assert_eq!(*log.borrow(), vec!["outer", "sibling", "nested"]);
}

#[test]
fn microtask_queue_continues_after_errors() {
  let log = Rc::new(RefCell::new(Vec::new()));
  let mut queue = MicrotaskQueue::new();
  queue.enqueue(Job::new(JobKind::Generic, |_host| {
    Err(VmError::Throw(Value::from("boom")))
  }));
  queue.enqueue(logging_job(&log, "after"));

  let errors = queue.perform_microtask_checkpoint();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].thrown_value(), Some(&Value::from("boom")));
  assert_eq!(*log.borrow(), vec!["after"]);
}

#[test]
fn microtask_queue_drain_and_cancel_discards_jobs() {
  let log = Rc::new(RefCell::new(Vec::new()));
  let mut queue = MicrotaskQueue::new();
  queue.enqueue(logging_job(&log, "never"));
  queue.drain_and_cancel();

  assert!(queue.is_empty());
  assert!(queue.perform_microtask_checkpoint().is_empty());
  assert!(log.borrow().is_empty());
}

#[test]
fn pop_front_hands_out_the_oldest_job() {
  let log = Rc::new(RefCell::new(Vec::new()));
  let mut queue = MicrotaskQueue::new();
  queue.enqueue(logging_job(&log, "first"));
  queue.enqueue(Job::new(JobKind::Promise, |_host| Ok(())));

  let job = queue.pop_front().unwrap();
  assert_eq!(job.kind(), JobKind::Generic);
  job.run(&mut queue).unwrap();
  assert_eq!(*log.borrow(), vec!["first"]);
  assert_eq!(queue.pop_front().map(|job| job.kind()), Some(JobKind::Promise));
  assert!(queue.pop_front().is_none());
}

#[test]
fn microtask_queue_can_host_promises_directly() {
  let mut queue = MicrotaskQueue::new();
  let seen = Rc::new(RefCell::new(None));
  let handler = {
    let seen = seen.clone();
    NativeFunction::new("record", 1, move |_host, _this, args| {
      *seen.borrow_mut() = Some(promise_js::arg(args, 0));
      Ok(Value::from("done"))
    })
    .into_value()
  };

  let promise = Promise::resolved(&mut queue, Value::Number(7.0)).unwrap();
  let derived = promise.then(&mut queue, handler, Value::Undefined).unwrap();
  assert_eq!(queue.len(), 1);

  assert!(queue.perform_microtask_checkpoint().is_empty());
  assert_eq!(*seen.borrow(), Some(Value::Number(7.0)));
  let derived = derived.as_promise().unwrap();
  assert_eq!(derived.state(), PromiseState::Fulfilled);
  assert_eq!(derived.result(), Some(Value::from("done")));
}
