//! Promise job abstract closures.
//!
//! These jobs are enqueued via `HostEnqueuePromiseJob` and run during microtask checkpoints in
//! HTML.

use crate::object::call;
use crate::promise::{Handler, PromiseReaction, ResolvingFunctions};
use crate::{Job, JobKind, PromiseHookEvent, Value, VmError};

/// Creates a `PromiseReactionJob` job abstract closure.
///
/// See <https://tc39.es/ecma262/#sec-promisereactionjob>.
///
/// A user handler's exception rejects the derived promise; its return value resolves it (which
/// adopts thenables). `Before`/`After` hook events bracket the user handler, keyed by the derived
/// promise.
pub fn new_promise_reaction_job(reaction: PromiseReaction, argument: Value) -> Job {
  Job::new(JobKind::Promise, move |host| {
    let PromiseReaction {
      capability,
      reaction_type,
      handler,
    } = reaction;

    tracing::trace!(
      target: "promise_js::jobs",
      ?reaction_type,
      "running promise reaction job"
    );

    let handler_result = match handler {
      Handler::Identity => Ok(argument),
      Handler::Thrower => Err(argument),
      Handler::User(callback) => {
        let hooked = capability.promise.as_promise().cloned();
        if let Some(promise) = &hooked {
          host.host_promise_hook(PromiseHookEvent::Before, promise);
        }
        let result = call(host, &callback, Value::Undefined, &[argument]);
        if let Some(promise) = &hooked {
          host.host_promise_hook(PromiseHookEvent::After, promise);
        }
        match result {
          Ok(value) => Ok(value),
          Err(VmError::Throw(reason)) => Err(reason),
          Err(e) => return Err(e),
        }
      }
    };

    match handler_result {
      Ok(value) => call(host, &capability.resolve, Value::Undefined, &[value])?,
      Err(reason) => call(host, &capability.reject, Value::Undefined, &[reason])?,
    };
    Ok(())
  })
}

/// Creates a `PromiseResolveThenableJob` job abstract closure.
///
/// See <https://tc39.es/ecma262/#sec-promiseresolvethenablejob>.
///
/// `functions` are a fresh resolving-function pair for the promise being resolved; an exception
/// thrown by `then` is routed through `functions.reject`, so it is ignored if `then` already
/// called one of them.
pub fn new_promise_resolve_thenable_job(
  thenable: Value,
  then: Value,
  functions: ResolvingFunctions,
) -> Job {
  Job::new(JobKind::Promise, move |host| {
    tracing::trace!(target: "promise_js::jobs", "running promise resolve thenable job");
    let ResolvingFunctions { resolve, reject } = functions;
    match call(host, &then, thenable, &[resolve, reject.clone()]) {
      Ok(_) => Ok(()),
      Err(VmError::Throw(reason)) => {
        call(host, &reject, Value::Undefined, &[reason])?;
        Ok(())
      }
      Err(e) => Err(e),
    }
  })
}
