//! HTML-style promise rejection tracking.
//!
//! ECMA-262 defines the `HostPromiseRejectionTracker(promise, operation)` hook:
//! <https://tc39.es/ecma262/#sec-host-promise-rejection-tracker>.
//!
//! HTML provides a concrete host implementation based on two per-global data structures:
//! - the **about-to-be-notified rejected promises list** (strongly referenced), and
//! - the **outstanding rejected promises weak set** (here: [`WeakPromise`]s keyed by
//!   [`PromiseId`]; entries whose promise was dropped are pruned on every insertion).
//!
//! See: <https://html.spec.whatwg.org/multipage/webappapis.html#the-hostpromiserejectiontracker-implementation>
//!
//! The tracker is independent of Promise internals; [`Agent`](crate::Agent) feeds it from the
//! engine's hook calls and decides what to do with each drained batch according to
//! [`UnhandledRejectionsMode`].

use crate::{Promise, PromiseId, WeakPromise};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem;
use std::str::FromStr;

/// The action requested when a previously-unhandled rejected promise becomes handled.
#[derive(Debug, Clone)]
pub enum PromiseRejectionHandleAction {
  /// No further action is required.
  None,
  /// Queue a `rejectionhandled` notification for `promise`.
  QueueRejectionHandled { promise: Promise },
}

/// A reusable implementation of HTML's promise rejection tracking state.
#[derive(Debug, Default)]
pub struct PromiseRejectionTracker {
  /// Promises that are about to be notified, in rejection order.
  about_to_be_notified: Vec<Promise>,
  /// Promises that were reported as unhandled and have not yet had `rejectionhandled` dispatched.
  outstanding_rejected: AHashMap<PromiseId, WeakPromise>,
}

impl PromiseRejectionTracker {
  /// Creates a new empty tracker.
  pub fn new() -> Self {
    Self::default()
  }

  /// Called when the engine reports `HostPromiseRejectionTracker(promise, "reject")`.
  pub fn on_reject(&mut self, promise: &Promise) {
    self.about_to_be_notified.push(promise.clone());
  }

  /// Called when the engine reports `HostPromiseRejectionTracker(promise, "handle")`.
  pub fn on_handle(&mut self, promise: &Promise) -> PromiseRejectionHandleAction {
    if let Some(idx) = self
      .about_to_be_notified
      .iter()
      .position(|p| p.ptr_eq(promise))
    {
      self.about_to_be_notified.remove(idx);
      return PromiseRejectionHandleAction::None;
    }

    if self.outstanding_rejected.remove(&promise.id()).is_some() {
      return PromiseRejectionHandleAction::QueueRejectionHandled {
        promise: promise.clone(),
      };
    }

    PromiseRejectionHandleAction::None
  }

  /// Drains the about-to-be-notified list.
  ///
  /// Promises that became handled since they were rejected are skipped, as in HTML's "notify about
  /// rejected promises".
  pub fn drain_about_to_be_notified(&mut self) -> Vec<Promise> {
    mem::take(&mut self.about_to_be_notified)
      .into_iter()
      .filter(|p| !p.is_handled())
      .collect()
  }

  /// Called after the host reports `promise` as an unhandled rejection.
  ///
  /// If the rejection remains unhandled, the promise is added to the outstanding rejected set so a
  /// later handler produces [`PromiseRejectionHandleAction::QueueRejectionHandled`]. The set holds
  /// the promise weakly; a promise that is dropped can never be handled, so its entry is removed the
  /// next time this is called.
  pub fn after_unhandledrejection_dispatch(&mut self, promise: &Promise, is_handled_after_event: bool) {
    if is_handled_after_event {
      return;
    }
    self.outstanding_rejected.retain(|_, weak| weak.is_alive());
    self.outstanding_rejected.insert(promise.id(), promise.downgrade());
  }

  /// Number of promises waiting for the next notification step.
  pub fn pending_len(&self) -> usize {
    self.about_to_be_notified.len()
  }

  /// Number of reported promises that are still unhandled and still alive.
  pub fn outstanding_len(&self) -> usize {
    self
      .outstanding_rejected
      .values()
      .filter(|weak| weak.is_alive())
      .count()
  }
}

/// What the [`Agent`](crate::Agent) does with rejections that are still unhandled at the end of a
/// microtask checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhandledRejectionsMode {
  /// Only collect them in the checkpoint report.
  None,
  /// Also log a `tracing` warning.
  #[default]
  Warn,
  /// Also log a `tracing` error.
  Error,
  /// Fail the checkpoint with [`VmError::UnhandledRejection`](crate::VmError::UnhandledRejection).
  Throw,
}

impl UnhandledRejectionsMode {
  pub fn as_str(self) -> &'static str {
    match self {
      UnhandledRejectionsMode::None => "none",
      UnhandledRejectionsMode::Warn => "warn",
      UnhandledRejectionsMode::Error => "error",
      UnhandledRejectionsMode::Throw => "throw",
    }
  }
}

impl fmt::Display for UnhandledRejectionsMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Error returned when parsing an unknown [`UnhandledRejectionsMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown unhandled rejections mode `{0}` (expected none, warn, error or throw)")]
pub struct ParseUnhandledRejectionsModeError(String);

impl FromStr for UnhandledRejectionsMode {
  type Err = ParseUnhandledRejectionsModeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "none" => Ok(UnhandledRejectionsMode::None),
      "warn" => Ok(UnhandledRejectionsMode::Warn),
      "error" => Ok(UnhandledRejectionsMode::Error),
      "throw" => Ok(UnhandledRejectionsMode::Throw),
      other => Err(ParseUnhandledRejectionsModeError(other.to_string())),
    }
  }
}
