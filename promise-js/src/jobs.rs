//! ECMAScript jobs and host integration hooks.
//!
//! ## Background
//!
//! - **ECMA-262** defines *job abstract closures* (e.g. Promise jobs) and requires the host
//!   environment to schedule them via host-defined hooks:
//!   - [`HostEnqueuePromiseJob`](https://tc39.es/ecma262/#sec-hostenqueuepromisejob) (FIFO ordering)
//!   - [`HostPromiseRejectionTracker`](https://tc39.es/ecma262/#sec-host-promise-rejection-tracker)
//! - **HTML** maps these hooks onto the browser event loop: Promise jobs become microtasks that are
//!   processed at
//!   [microtask checkpoints](https://html.spec.whatwg.org/multipage/webappapis.html#perform-a-microtask-checkpoint).
//!
//! The main integration point is [`VmHostHooks::host_enqueue_promise_job`]. The queue itself is
//! **host-owned**; this crate provides the job representation plus a ready-made FIFO queue
//! ([`MicrotaskQueue`](crate::MicrotaskQueue)) and embedding façade ([`Agent`](crate::Agent)).

use crate::{Promise, Value, VmError};
use std::fmt;

/// A coarse classification of host-scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
  /// A Promise job (`PromiseReactionJob` / `PromiseResolveThenableJob`).
  Promise,
  /// Generic work queued by the embedding (`queueMicrotask`-like).
  Generic,
}

/// The result of running a job.
///
/// Jobs convert user exceptions into rejections themselves, so an `Err` here is either a
/// termination, an engine invariant violation, or an exception thrown by a host-provided
/// capability function. The embedding is expected to report it and keep draining.
pub type JobResult = Result<(), VmError>;

/// An ECMAScript *Job Abstract Closure*.
///
/// A job is a boxed `FnOnce` that receives the host hooks at run time, so it can enqueue further
/// jobs and report rejection-tracking events.
pub struct Job {
  kind: JobKind,
  run: Box<dyn FnOnce(&mut dyn VmHostHooks) -> JobResult + 'static>,
}

impl Job {
  /// Create a new job of `kind` backed by `run`.
  pub fn new(kind: JobKind, run: impl FnOnce(&mut dyn VmHostHooks) -> JobResult + 'static) -> Self {
    Self {
      kind,
      run: Box::new(run),
    }
  }

  /// Returns this job's kind.
  #[inline]
  pub fn kind(&self) -> JobKind {
    self.kind
  }

  /// Run the job, consuming it.
  #[inline]
  pub fn run(self, host: &mut dyn VmHostHooks) -> JobResult {
    let Job { run, .. } = self;
    run(host)
  }
}

impl fmt::Debug for Job {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Job").field("kind", &self.kind).finish()
  }
}

/// The `operation` argument of `HostPromiseRejectionTracker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseRejectionOperation {
  /// A promise was rejected while it had no handlers.
  Reject,
  /// A handler was added to a rejected promise that had none.
  Handle,
}

/// Which resolving function was called after its promise was already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultipleResolveKind {
  ResolveAfterResolved,
  RejectAfterResolved,
}

/// Lifecycle events reported through [`VmHostHooks::host_promise_hook`].
///
/// These are observational only; no hook implementation can affect settlement.
#[derive(Debug, Clone)]
pub enum PromiseHookEvent {
  /// A promise was created. `parent` is the promise whose `then` created it, if any.
  Init { parent: Option<Promise> },
  /// A resolving function of the promise was called for the first time.
  Resolve,
  /// A reaction handler whose derived promise is the hooked promise is about to run.
  Before,
  /// The reaction handler reported by the matching `Before` returned or threw.
  After,
}

/// Host hooks required by the ECMAScript specification.
///
/// The engine calls into this trait; the embedding provides the implementation.
///
/// ## FIFO requirement
///
/// ECMA-262 requires Promise jobs to be processed in FIFO order for an agent:
/// <https://tc39.es/ecma262/#sec-hostenqueuepromisejob>.
///
/// The engine will call [`VmHostHooks::host_enqueue_promise_job`] in the order ECMA-262 requires; hosts
/// MUST preserve this ordering when running the queued jobs, and MUST NOT run a job before the
/// code that enqueued it has returned.
pub trait VmHostHooks {
  /// Enqueue a Promise job.
  ///
  /// This corresponds to
  /// [`HostEnqueuePromiseJob(job, realm)`](https://tc39.es/ecma262/#sec-hostenqueuepromisejob).
  fn host_enqueue_promise_job(&mut self, job: Job);

  /// Promise rejection tracker hook (unhandled rejection reporting).
  ///
  /// This default implementation does nothing.
  fn host_promise_rejection_tracker(
    &mut self,
    _promise: &Promise,
    _operation: PromiseRejectionOperation,
  ) {
  }

  /// Promise lifecycle instrumentation.
  ///
  /// This default implementation does nothing.
  fn host_promise_hook(&mut self, _event: PromiseHookEvent, _promise: &Promise) {}

  /// Called when a resolving function is invoked after its promise was already resolved. `value`
  /// is the ignored resolution or reason.
  ///
  /// This default implementation does nothing.
  fn host_promise_multiple_resolves(
    &mut self,
    _promise: &Promise,
    _kind: MultipleResolveKind,
    _value: &Value,
  ) {
  }
}
