use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A token observed by the [`Agent`](crate::Agent) between jobs to detect host interrupts.
#[derive(Debug, Clone)]
pub struct InterruptToken {
  interrupted: Arc<AtomicBool>,
}

impl InterruptToken {
  /// Create a new interrupt token + handle pair.
  pub fn new() -> (Self, InterruptHandle) {
    let interrupted = Arc::new(AtomicBool::new(false));
    (
      Self {
        interrupted: interrupted.clone(),
      },
      InterruptHandle { interrupted },
    )
  }

  pub fn is_interrupted(&self) -> bool {
    self.interrupted.load(Ordering::Relaxed)
  }

  /// Clears a pending interrupt so the agent can run again.
  pub fn reset(&self) {
    self.interrupted.store(false, Ordering::Relaxed);
  }
}

/// A host handle used to request that the agent stops running jobs.
///
/// The handle is `Send`, so it can be used from a watchdog thread.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
  interrupted: Arc<AtomicBool>,
}

impl InterruptHandle {
  /// Request that the agent terminates the current checkpoint before its next job.
  pub fn interrupt(&self) {
    self.interrupted.store(true, Ordering::Relaxed);
  }
}
