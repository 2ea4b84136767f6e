//! A minimal, engine-supplied microtask queue implementation.
//!
//! This is intended for embeddings that do not (yet) have a full HTML event loop implementation
//! but still need Promise/`queueMicrotask`-like behavior:
//! - FIFO job ordering
//! - "perform a microtask checkpoint" semantics (drain until empty, including jobs enqueued while
//!   running)
//! - teardown support for discarding pending work

use std::collections::VecDeque;

use crate::Job;
use crate::VmError;
use crate::VmHostHooks;

/// A FIFO microtask queue.
///
/// The queue stores jobs in a [`VecDeque`] and provides a microtask checkpoint runner that drains
/// the queue until empty (including jobs enqueued by jobs during execution).
///
/// On its own the queue is a complete [`VmHostHooks`] implementation that ignores rejection
/// tracking; [`Agent`](crate::Agent) layers tracking, hooks and budgets on top of it.
#[derive(Debug, Default)]
pub struct MicrotaskQueue {
  queue: VecDeque<Job>,
}

impl MicrotaskQueue {
  pub fn new() -> Self {
    Self {
      queue: VecDeque::new(),
    }
  }

  /// Enqueue a microtask job.
  pub fn enqueue(&mut self, job: Job) {
    self.queue.push_back(job);
  }

  /// Dequeues the oldest job.
  pub fn pop_front(&mut self) -> Option<Job> {
    self.queue.pop_front()
  }

  /// Returns whether the queue is empty.
  pub fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  /// Returns the number of queued microtasks.
  pub fn len(&self) -> usize {
    self.queue.len()
  }

  /// Runs all queued microtasks (and any microtasks enqueued while running) until the queue is
  /// empty.
  ///
  /// If a job returns `Err`, this method **continues draining** the queue (HTML reports the
  /// exception and continues). Errors are returned to the caller for reporting.
  pub fn perform_microtask_checkpoint(&mut self) -> Vec<VmError> {
    let mut errors = Vec::new();
    while let Some(job) = self.queue.pop_front() {
      if let Err(err) = job.run(self) {
        tracing::debug!(target: "promise_js::jobs", error = %err, "microtask failed");
        errors.push(err);
      }
    }
    errors
  }

  /// Cancels all queued microtasks without running them.
  pub fn drain_and_cancel(&mut self) {
    self.queue.clear();
  }
}

impl VmHostHooks for MicrotaskQueue {
  fn host_enqueue_promise_job(&mut self, job: Job) {
    self.enqueue(job);
  }
}
