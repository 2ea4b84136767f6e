use crate::value::Value;
use std::fmt::Display;

/// Errors produced by the promise engine and by host callbacks.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VmError {
  /// A JavaScript `throw` value. This is catchable from JS and is converted into a rejection at
  /// every boundary where the engine calls user code.
  #[error("uncaught exception: {0:?}")]
  Throw(Value),

  /// A non-catchable termination condition (job budget exhausted, host interrupt).
  #[error("{0}")]
  Termination(TerminationReason),

  /// An internal engine invariant did not hold.
  #[error("invariant violation: {0}")]
  InvariantViolation(&'static str),

  /// A rejected promise was still unhandled at the end of a microtask checkpoint and the agent is
  /// configured to treat that as fatal.
  #[error("unhandled promise rejection: {0:?}")]
  UnhandledRejection(Value),
}

impl VmError {
  /// Returns the thrown value if this error is catchable.
  pub fn thrown_value(&self) -> Option<&Value> {
    match self {
      VmError::Throw(value) => Some(value),
      _ => None,
    }
  }

  #[inline]
  pub fn is_termination(&self) -> bool {
    matches!(self, VmError::Termination(_))
  }
}

/// The reason execution terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
  /// The per-checkpoint job budget was exhausted.
  OutOfJobs,
  /// The host requested termination through an [`InterruptHandle`](crate::InterruptHandle).
  Interrupted,
}

impl Display for TerminationReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      TerminationReason::OutOfJobs => f.write_str("execution terminated: job budget exhausted"),
      TerminationReason::Interrupted => f.write_str("execution terminated: interrupted"),
    }
  }
}
