use crate::error_object::ErrorObject;
use crate::object::call;
use crate::promise_rejection_tracker::PromiseRejectionHandleAction;
use crate::{
  InterruptHandle, InterruptToken, Job, JobKind, MicrotaskQueue, MultipleResolveKind, Promise,
  PromiseHookEvent, PromiseRejectionOperation, PromiseRejectionTracker, TerminationReason,
  UnhandledRejectionsMode, Value, VmError, VmHostHooks,
};
use serde::{Deserialize, Serialize};
use std::mem;

/// Agent configuration.
///
/// Every field has a default, so a partial JSON/TOML document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentOptions {
  /// Upper bound on the number of jobs a single [`Agent::run_jobs`] call may run. `None` means
  /// unbounded.
  pub max_jobs_per_checkpoint: Option<u64>,
  /// What to do with rejections that are still unhandled after a checkpoint.
  pub unhandled_rejections: UnhandledRejectionsMode,
}

impl Default for AgentOptions {
  fn default() -> Self {
    Self {
      max_jobs_per_checkpoint: None,
      unhandled_rejections: UnhandledRejectionsMode::Warn,
    }
  }
}

/// Observes the engine's promise lifecycle callbacks as they pass through an [`Agent`].
///
/// All methods default to doing nothing.
pub trait PromiseHookObserver {
  fn promise_hook(&mut self, _event: &PromiseHookEvent, _promise: &Promise) {}

  fn rejection_tracker(&mut self, _promise: &Promise, _operation: PromiseRejectionOperation) {}

  fn multiple_resolves(&mut self, _promise: &Promise, _kind: MultipleResolveKind, _value: &Value) {}
}

/// The outcome of one [`Agent::run_jobs`] call.
#[derive(Debug, Default)]
pub struct CheckpointReport {
  /// Number of jobs that ran.
  pub jobs_run: u64,
  /// Errors returned by jobs; the checkpoint kept draining after each of them.
  pub errors: Vec<VmError>,
  /// Rejected promises that are still unhandled at the end of the checkpoint, in rejection order.
  pub unhandled: Vec<Promise>,
  /// Previously reported promises that gained a handler during this checkpoint.
  pub rejection_handled: Vec<Promise>,
}

/// A single-threaded embedding façade that bundles the job queue and rejection tracking.
///
/// `Agent` is the [`VmHostHooks`] implementation most embeddings want: pass `&mut agent` wherever
/// the engine takes hooks, then call [`Agent::run_jobs`] once the synchronous work is done.
pub struct Agent {
  queue: MicrotaskQueue,
  tracker: PromiseRejectionTracker,
  options: AgentOptions,
  observer: Option<Box<dyn PromiseHookObserver>>,
  interrupt: InterruptToken,
  interrupt_handle: InterruptHandle,
  rejection_handled: Vec<Promise>,
}

impl Default for Agent {
  fn default() -> Self {
    Self::new(AgentOptions::default())
  }
}

impl Agent {
  pub fn new(options: AgentOptions) -> Self {
    let (interrupt, interrupt_handle) = InterruptToken::new();
    Self {
      queue: MicrotaskQueue::new(),
      tracker: PromiseRejectionTracker::new(),
      options,
      observer: None,
      interrupt,
      interrupt_handle,
      rejection_handled: Vec::new(),
    }
  }

  /// Installs an observer for promise lifecycle callbacks, replacing any previous one.
  pub fn set_observer(&mut self, observer: impl PromiseHookObserver + 'static) {
    self.observer = Some(Box::new(observer));
  }

  #[inline]
  pub fn options(&self) -> &AgentOptions {
    &self.options
  }

  #[inline]
  pub fn options_mut(&mut self) -> &mut AgentOptions {
    &mut self.options
  }

  /// Returns a handle that can interrupt this agent, including from another thread.
  pub fn interrupt_handle(&self) -> InterruptHandle {
    self.interrupt_handle.clone()
  }

  #[inline]
  pub fn tracker(&self) -> &PromiseRejectionTracker {
    &self.tracker
  }

  /// Number of queued jobs.
  pub fn pending_jobs(&self) -> usize {
    self.queue.len()
  }

  /// Discards all queued jobs.
  pub fn drain_and_cancel(&mut self) {
    let dropped = self.queue.len();
    self.queue.drain_and_cancel();
    tracing::debug!(target: "promise_js::jobs", dropped, "cancelled queued jobs");
  }

  /// Enqueues a generic microtask that calls `callback` with no arguments.
  ///
  /// An exception thrown by `callback` is reported in [`CheckpointReport::errors`].
  pub fn queue_microtask(&mut self, callback: Value) {
    self.queue.enqueue(Job::new(JobKind::Generic, move |host| {
      call(host, &callback, Value::Undefined, &[])?;
      Ok(())
    }));
  }

  /// Performs a microtask checkpoint followed by HTML's "notify about rejected promises".
  ///
  /// Jobs run in FIFO order until the queue is empty, including jobs enqueued while draining. Job
  /// errors are collected and draining continues; terminations (interrupt, job budget) stop the
  /// checkpoint immediately and leave the remaining jobs queued.
  pub fn run_jobs(&mut self) -> Result<CheckpointReport, VmError> {
    let span = tracing::debug_span!(target: "promise_js::jobs", "microtask_checkpoint");
    let _guard = span.enter();

    let mut report = CheckpointReport::default();
    loop {
      if self.interrupt.is_interrupted() {
        self.interrupt.reset();
        return Err(VmError::Termination(TerminationReason::Interrupted));
      }
      if self.queue.is_empty() {
        break;
      }
      if let Some(max) = self.options.max_jobs_per_checkpoint {
        if report.jobs_run >= max {
          tracing::warn!(
            target: "promise_js::jobs",
            max,
            pending = self.queue.len(),
            "job budget exhausted"
          );
          return Err(VmError::Termination(TerminationReason::OutOfJobs));
        }
      }
      let Some(job) = self.queue.pop_front() else {
        break;
      };
      report.jobs_run += 1;
      if let Err(err) = job.run(self) {
        if err.is_termination() {
          return Err(err);
        }
        tracing::warn!(target: "promise_js::jobs", error = %format_vm_error(&err), "job failed");
        report.errors.push(err);
      }
    }

    tracing::debug!(
      target: "promise_js::jobs",
      jobs_run = report.jobs_run,
      errors = report.errors.len(),
      "microtask checkpoint finished"
    );

    // Taken before notifying so a throwing checkpoint does not carry them into the next report.
    report.rejection_handled = mem::take(&mut self.rejection_handled);
    match self.notify_about_rejected_promises() {
      Ok(unhandled) => report.unhandled = unhandled,
      Err(err) => {
        tracing::warn!(
          target: "promise_js::jobs",
          jobs_run = report.jobs_run,
          errors = report.errors.len(),
          rejection_handled = report.rejection_handled.len(),
          "checkpoint report discarded by unhandled rejection"
        );
        return Err(err);
      }
    }
    Ok(report)
  }

  fn notify_about_rejected_promises(&mut self) -> Result<Vec<Promise>, VmError> {
    let unhandled = self.tracker.drain_about_to_be_notified();
    let mode = self.options.unhandled_rejections;

    for promise in &unhandled {
      let reason = promise.result().unwrap_or_default();
      match mode {
        UnhandledRejectionsMode::None | UnhandledRejectionsMode::Throw => {}
        UnhandledRejectionsMode::Warn => tracing::warn!(
          target: "promise_js::rejection",
          promise = promise.id().to_raw(),
          reason = %format_value(&reason),
          "unhandled promise rejection"
        ),
        UnhandledRejectionsMode::Error => tracing::error!(
          target: "promise_js::rejection",
          promise = promise.id().to_raw(),
          reason = %format_value(&reason),
          "unhandled promise rejection"
        ),
      }
      self
        .tracker
        .after_unhandledrejection_dispatch(promise, promise.is_handled());
    }

    if mode == UnhandledRejectionsMode::Throw {
      if let Some(first) = unhandled.first() {
        return Err(VmError::UnhandledRejection(first.result().unwrap_or_default()));
      }
    }
    Ok(unhandled)
  }
}

impl VmHostHooks for Agent {
  fn host_enqueue_promise_job(&mut self, job: Job) {
    self.queue.enqueue(job);
  }

  fn host_promise_rejection_tracker(&mut self, promise: &Promise, operation: PromiseRejectionOperation) {
    if let Some(observer) = self.observer.as_mut() {
      observer.rejection_tracker(promise, operation);
    }
    match operation {
      PromiseRejectionOperation::Reject => self.tracker.on_reject(promise),
      PromiseRejectionOperation::Handle => {
        if let PromiseRejectionHandleAction::QueueRejectionHandled { promise } =
          self.tracker.on_handle(promise)
        {
          tracing::debug!(
            target: "promise_js::rejection",
            promise = promise.id().to_raw(),
            "rejection handled after being reported"
          );
          self.rejection_handled.push(promise);
        }
      }
    }
  }

  fn host_promise_hook(&mut self, event: PromiseHookEvent, promise: &Promise) {
    if let Some(observer) = self.observer.as_mut() {
      observer.promise_hook(&event, promise);
    }
  }

  fn host_promise_multiple_resolves(&mut self, promise: &Promise, kind: MultipleResolveKind, value: &Value) {
    tracing::trace!(
      target: "promise_js::promise",
      promise = promise.id().to_raw(),
      ?kind,
      "resolving function called after the promise was resolved"
    );
    if let Some(observer) = self.observer.as_mut() {
      observer.multiple_resolves(promise, kind, value);
    }
  }
}

/// Formats a value for diagnostics, rendering error objects as `Name: message`.
pub fn format_value(value: &Value) -> String {
  if let Some(error) = ErrorObject::from_value(value) {
    return format!("{}: {}", error.kind().name(), error.message());
  }
  match value {
    Value::String(s) => s.to_string(),
    other => format!("{other:?}"),
  }
}

/// Formats a VM error into a host-visible string.
pub fn format_vm_error(err: &VmError) -> String {
  match err {
    VmError::Throw(value) => format!("uncaught exception: {}", format_value(value)),
    VmError::UnhandledRejection(value) => {
      format!("unhandled promise rejection: {}", format_value(value))
    }
    other => other.to_string(),
  }
}
