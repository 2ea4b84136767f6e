//! An ECMAScript Promise engine for `ecma-rs` embeddings.
//!
//! This crate implements the Promise state machine of ECMA-262 independently of any interpreter:
//! - Promise records, resolving functions and reaction jobs ([`Promise`], [`PromiseCapability`])
//! - `then`/`catch`/`finally` with species lookup, and the `all`/`allSettled`/`any`/`race`
//!   combinators
//! - host integration through [`VmHostHooks`] (job queue, rejection tracker, lifecycle hooks)
//! - a ready-made FIFO [`MicrotaskQueue`], HTML-style [`PromiseRejectionTracker`] and an embedding
//!   façade ([`Agent`])
//!
//! # Object model
//!
//! The engine does not own an object model. Everything it needs from objects (property reads that
//! may throw, `[[Call]]`, `[[Construct]]`) goes through the [`HostObject`] trait, so embeddings can
//! expose their own thenables, iterables and constructors. Promises themselves are the one object
//! kind the engine owns ([`Object::Promise`]).
//!
//! # Scheduling
//!
//! No engine operation ever runs a reaction synchronously. Settling a promise only enqueues jobs
//! through [`VmHostHooks::host_enqueue_promise_job`]; the host decides when to drain them (for
//! example with [`Agent::run_jobs`]). User exceptions are converted into rejections at every point
//! where the engine calls user code.
//!
//! # Memory
//!
//! Promises, reactions and closures are reference counted. A promise keeps its pending reactions
//! alive and reactions keep their derived promises alive; these references are released when the
//! promise settles. Cycles that never settle are leaked (there is no cycle collector).

mod agent;
mod error;
mod error_object;
mod function;
mod interrupt;
mod iterator;
mod jobs;
mod microtask_queue;
mod object;
mod promise;
mod promise_combinators;
mod promise_jobs;
mod promise_ops;
mod promise_rejection_tracker;
mod string;
mod value;

pub use crate::agent::format_value;
pub use crate::agent::format_vm_error;
pub use crate::agent::Agent;
pub use crate::agent::AgentOptions;
pub use crate::agent::CheckpointReport;
pub use crate::agent::PromiseHookObserver;
pub use crate::error::TerminationReason;
pub use crate::error::VmError;
pub use crate::error_object::new_aggregate_error;
pub use crate::error_object::new_type_error;
pub use crate::error_object::throw_type_error;
pub use crate::error_object::ErrorKind;
pub use crate::error_object::ErrorObject;
pub use crate::function::arg;
pub use crate::function::NativeFunction;
pub use crate::interrupt::InterruptHandle;
pub use crate::interrupt::InterruptToken;
pub use crate::iterator::get_iterator;
pub use crate::iterator::iterator_close;
pub use crate::iterator::iterator_step_value;
pub use crate::iterator::IteratorRecord;
pub use crate::jobs::Job;
pub use crate::jobs::JobKind;
pub use crate::jobs::JobResult;
pub use crate::jobs::MultipleResolveKind;
pub use crate::jobs::PromiseHookEvent;
pub use crate::jobs::PromiseRejectionOperation;
pub use crate::jobs::VmHostHooks;
pub use crate::microtask_queue::MicrotaskQueue;
pub use crate::object::call;
pub use crate::object::construct;
pub use crate::object::get;
pub use crate::object::invoke;
pub use crate::object::ArrayObject;
pub use crate::object::HostObject;
pub use crate::object::Object;
pub use crate::object::PlainObject;
pub use crate::object::ITERATOR_KEY;
pub use crate::object::SPECIES_KEY;
pub use crate::promise::create_resolving_functions;
pub use crate::promise::perform_promise_then;
pub use crate::promise::promise_catch;
pub use crate::promise::promise_finally;
pub use crate::promise::promise_then;
pub use crate::promise::Handler;
pub use crate::promise::Promise;
pub use crate::promise::PromiseCapability;
pub use crate::promise::PromiseId;
pub use crate::promise::PromiseReaction;
pub use crate::promise::PromiseReactionType;
pub use crate::promise::PromiseState;
pub use crate::promise::ResolvingFunctions;
pub use crate::promise::WeakPromise;
pub use crate::promise_combinators::promise_all;
pub use crate::promise_combinators::promise_all_settled;
pub use crate::promise_combinators::promise_any;
pub use crate::promise_combinators::promise_race;
pub use crate::promise_jobs::new_promise_reaction_job;
pub use crate::promise_jobs::new_promise_resolve_thenable_job;
pub use crate::promise_ops::intrinsic_promise_constructor;
pub use crate::promise_ops::is_intrinsic_promise_constructor;
pub use crate::promise_ops::new_promise_capability;
pub use crate::promise_ops::promise_reject;
pub use crate::promise_ops::promise_resolve;
pub use crate::promise_ops::promise_with_resolvers;
pub use crate::promise_ops::species_constructor;
pub use crate::promise_ops::PromiseConstructor;
pub use crate::promise_rejection_tracker::ParseUnhandledRejectionsModeError;
pub use crate::promise_rejection_tracker::PromiseRejectionHandleAction;
pub use crate::promise_rejection_tracker::PromiseRejectionTracker;
pub use crate::promise_rejection_tracker::UnhandledRejectionsMode;
pub use crate::string::JsString;
pub use crate::value::Value;
