//! Future Implementation
//!
//! A [`Future`] is a value that becomes available at most once. It starts
//! pending and settles exactly once, to fulfilled or rejected; every later
//! settle attempt is ignored.
//!
//! Callbacks registered with [`Future::then`] always run in a later task on
//! the future's [`Scheduler`](crate::event_loop::Scheduler), never during the
//! call that registered them or the call that settled the future.

use super::resolution::resolve_with;
use super::value::{first_arg, Value};
use crate::error::{Error, Result};
use crate::event_loop::SchedulerRef;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// ID counter for future tracking
static FUTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Future state
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FutureState {
    /// Not yet settled
    Pending,
    /// Settled with a value
    Fulfilled,
    /// Settled with a reason
    Rejected,
}

impl FutureState {
    /// Lowercase name, as used in settlement descriptors
    pub fn as_str(&self) -> &'static str {
        match self {
            FutureState::Pending => "pending",
            FutureState::Fulfilled => "fulfilled",
            FutureState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FutureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A callback waiting for settlement.
///
/// The future the callback settles is held here rather than inside the
/// closure, so a dropped chain can be unlinked without recursion.
pub(crate) struct Reaction {
    target: Future,
    run: Box<dyn FnOnce(&Future, Value)>,
}

impl Reaction {
    pub(crate) fn new<F>(target: &Future, run: F) -> Self
    where
        F: FnOnce(&Future, Value) + 'static,
    {
        Reaction {
            target: target.clone(),
            run: Box::new(run),
        }
    }

    fn fire(self, payload: Value) {
        let Reaction { target, run } = self;
        run(&target, payload)
    }
}

struct FutureInner {
    id: u64,
    state: FutureState,
    value: Option<Value>,
    reason: Option<Value>,
    /// Drained in order when the future fulfills
    fulfill_callbacks: Vec<Reaction>,
    /// Drained in order when the future rejects
    reject_callbacks: Vec<Reaction>,
}

impl Drop for FutureInner {
    fn drop(&mut self) {
        // Worklist, not recursion: each pending bridge owns the next one.
        let mut orphans = std::mem::take(&mut self.fulfill_callbacks);
        orphans.append(&mut self.reject_callbacks);
        while let Some(Reaction { target, run }) = orphans.pop() {
            drop(run);
            let Future { inner, .. } = target;
            if let Ok(cell) = Rc::try_unwrap(inner) {
                let mut child = cell.into_inner();
                orphans.append(&mut child.fulfill_callbacks);
                orphans.append(&mut child.reject_callbacks);
            }
        }
    }
}

/// A deferred value.
///
/// Cloning yields another handle to the same future.
#[derive(Clone)]
pub struct Future {
    inner: Rc<RefCell<FutureInner>>,
    scheduler: SchedulerRef,
}

/// Which handler of a `then` pair a reaction runs
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ReactionKind {
    Fulfill,
    Reject,
}

impl Future {
    /// Create a future and run `initializer` synchronously with its
    /// resolving functions.
    ///
    /// An `Err` returned by the initializer rejects the future, unless it
    /// was already resolved.
    pub fn new<F>(scheduler: &SchedulerRef, initializer: F) -> Future
    where
        F: FnOnce(Resolve, Reject) -> Result<()>,
    {
        let future = Future::pending(scheduler);
        let (resolve, reject) = future.resolving_functions();
        if let Err(err) = initializer(resolve, reject.clone()) {
            trace!(future_id = future.id(), error = %err, "initializer threw");
            reject.call(err.into_reason());
        }
        future
    }

    /// Create a future settled by whoever holds the returned resolvers
    pub fn with_resolvers(scheduler: &SchedulerRef) -> WithResolvers {
        let future = Future::pending(scheduler);
        let (resolve, reject) = future.resolving_functions();
        WithResolvers {
            future,
            resolve,
            reject,
        }
    }

    /// Create a bare pending future
    pub(crate) fn pending(scheduler: &SchedulerRef) -> Future {
        let id = FUTURE_ID.fetch_add(1, Ordering::SeqCst);
        scheduler.future_created();
        Future {
            inner: Rc::new(RefCell::new(FutureInner {
                id,
                state: FutureState::Pending,
                value: None,
                reason: None,
                fulfill_callbacks: Vec::new(),
                reject_callbacks: Vec::new(),
            })),
            scheduler: scheduler.clone(),
        }
    }

    /// A fresh resolve/reject pair sharing one already-resolved flag
    fn resolving_functions(&self) -> (Resolve, Reject) {
        let already_resolved = Rc::new(Cell::new(false));
        (
            Resolve {
                future: self.clone(),
                already_resolved: already_resolved.clone(),
            },
            Reject {
                future: self.clone(),
                already_resolved,
            },
        )
    }

    /// Unique ID, for logging
    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    /// Current state
    pub fn state(&self) -> FutureState {
        self.inner.borrow().state
    }

    /// Check if the future has not settled yet
    pub fn is_pending(&self) -> bool {
        self.state() == FutureState::Pending
    }

    /// The fulfillment value, if fulfilled
    pub fn value(&self) -> Option<Value> {
        self.inner.borrow().value.clone()
    }

    /// The rejection reason, if rejected
    pub fn reason(&self) -> Option<Value> {
        self.inner.borrow().reason.clone()
    }

    /// The scheduler this future defers its callbacks to
    pub fn scheduler(&self) -> &SchedulerRef {
        &self.scheduler
    }

    /// Check whether two handles refer to the same future
    pub fn ptr_eq(&self, other: &Future) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Fulfill with a plain value. No-op once settled.
    pub(crate) fn fulfill_with(&self, value: Value) {
        self.settle(FutureState::Fulfilled, value);
    }

    /// Reject with a reason. No-op once settled.
    pub(crate) fn reject_with(&self, reason: Value) {
        self.settle(FutureState::Rejected, reason);
    }

    fn settle(&self, state: FutureState, payload: Value) {
        let (id, callbacks, discarded) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != FutureState::Pending {
                trace!(future_id = inner.id, ignored = %state, "future already settled");
                return;
            }
            inner.state = state;
            let fulfill_callbacks = std::mem::take(&mut inner.fulfill_callbacks);
            let reject_callbacks = std::mem::take(&mut inner.reject_callbacks);
            let (callbacks, discarded) = match state {
                FutureState::Fulfilled => {
                    inner.value = Some(payload.clone());
                    (fulfill_callbacks, reject_callbacks)
                }
                _ => {
                    inner.reason = Some(payload.clone());
                    (reject_callbacks, fulfill_callbacks)
                }
            };
            (inner.id, callbacks, discarded)
        };
        drop(discarded);

        self.scheduler.future_settled();
        debug!(future_id = id, %state, callbacks = callbacks.len(), "future settled");

        for reaction in callbacks {
            let payload = payload.clone();
            self.scheduler.schedule(Box::new(move || reaction.fire(payload)));
        }
    }

    /// Register a reaction pair. Exactly one of them eventually runs, in a
    /// later task, with the settled payload.
    pub(crate) fn subscribe(&self, on_fulfilled: Reaction, on_rejected: Reaction) {
        let mut inner = self.inner.borrow_mut();
        let state = inner.state;
        let (reaction, payload) = match state {
            FutureState::Pending => {
                inner.fulfill_callbacks.push(on_fulfilled);
                inner.reject_callbacks.push(on_rejected);
                return;
            }
            FutureState::Fulfilled => (on_fulfilled, inner.value.clone().unwrap_or_default()),
            FutureState::Rejected => (on_rejected, inner.reason.clone().unwrap_or_default()),
        };
        drop(inner);
        self.scheduler.schedule(Box::new(move || reaction.fire(payload)));
    }

    /// Chain handlers, returning a new bridge future.
    ///
    /// A non-callable `on_fulfilled` passes the value through; a non-callable
    /// `on_rejected` passes the rejection through. The bridge settles with
    /// whatever the handler returns (unwrapped through the resolution
    /// procedure), or rejects with whatever it throws.
    pub fn then(&self, on_fulfilled: Value, on_rejected: Value) -> Future {
        let bridge = Future::pending(&self.scheduler);
        let on_fulfilled = on_fulfilled.is_callable().then_some(on_fulfilled);
        let on_rejected = on_rejected.is_callable().then_some(on_rejected);

        self.subscribe(
            Reaction::new(&bridge, move |bridge, value| {
                run_reaction(bridge, on_fulfilled, ReactionKind::Fulfill, value)
            }),
            Reaction::new(&bridge, move |bridge, reason| {
                run_reaction(bridge, on_rejected, ReactionKind::Reject, reason)
            }),
        );
        trace!(source_id = self.id(), bridge_id = bridge.id(), "then registered");
        bridge
    }

    /// Shorthand for `then(undefined, on_rejected)`
    pub fn catch(&self, on_rejected: Value) -> Future {
        self.then(Value::Undefined, on_rejected)
    }

    /// Run `on_finally` on either outcome and pass the original outcome on.
    ///
    /// If `on_finally` throws, or returns a future that rejects, the bridge
    /// rejects with that reason instead.
    pub fn finally(&self, on_finally: Value) -> Future {
        if !on_finally.is_callable() {
            return self.then(Value::Undefined, Value::Undefined);
        }

        let scheduler = self.scheduler.clone();
        let callback = on_finally.clone();
        let on_fulfilled = Value::native_function("finally", move |args| {
            let value = first_arg(args);
            let settled = Future::resolve(&scheduler, callback.call(&[])?);
            let pass_value = Value::function(move |_| Ok(value.clone()));
            Ok(settled.then(pass_value, Value::Undefined).into())
        });

        let scheduler = self.scheduler.clone();
        let on_rejected = Value::native_function("finally", move |args| {
            let reason = first_arg(args);
            let settled = Future::resolve(&scheduler, on_finally.call(&[])?);
            let pass_reason = Value::function(move |_| Err(Error::Thrown(reason.clone())));
            Ok(settled.then(pass_reason, Value::Undefined).into())
        });

        self.then(on_fulfilled, on_rejected)
    }
}

/// Run one handler of a `then` pair and settle the bridge with its outcome
fn run_reaction(bridge: &Future, handler: Option<Value>, kind: ReactionKind, argument: Value) {
    let outcome = match handler {
        Some(handler) => handler.call(&[argument]),
        None => match kind {
            ReactionKind::Fulfill => Ok(argument),
            ReactionKind::Reject => Err(Error::Thrown(argument)),
        },
    };

    match outcome {
        Ok(produced) => resolve_with(bridge, produced),
        Err(err) => bridge.reject_with(err.into_reason()),
    }
}

impl fmt::Debug for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let mut s = f.debug_struct("Future");
        s.field("id", &inner.id).field("state", &inner.state);
        if let Some(value) = &inner.value {
            s.field("value", value);
        }
        if let Some(reason) = &inner.reason {
            s.field("reason", reason);
        }
        s.finish()
    }
}

/// The resolve half of a future's resolving functions.
///
/// One-shot together with its [`Reject`] partner: after either has been
/// called, both do nothing.
#[derive(Clone)]
pub struct Resolve {
    future: Future,
    already_resolved: Rc<Cell<bool>>,
}

impl Resolve {
    /// Resolve the future. Futures and thenables are adopted rather than
    /// stored.
    pub fn call(&self, value: impl Into<Value>) {
        if self.already_resolved.replace(true) {
            trace!(future_id = self.future.id(), "resolve ignored");
            return;
        }
        resolve_with(&self.future, value.into());
    }

    /// This resolve as a callable value, e.g. for passing to `then`
    pub fn to_function(&self) -> Value {
        let resolve = self.clone();
        Value::native_function("resolve", move |args| {
            resolve.call(first_arg(args));
            Ok(Value::Undefined)
        })
    }
}

/// The reject half of a future's resolving functions
#[derive(Clone)]
pub struct Reject {
    future: Future,
    already_resolved: Rc<Cell<bool>>,
}

impl Reject {
    /// Reject the future with `reason`, stored as is
    pub fn call(&self, reason: impl Into<Value>) {
        if self.already_resolved.replace(true) {
            trace!(future_id = self.future.id(), "reject ignored");
            return;
        }
        self.future.reject_with(reason.into());
    }

    /// This reject as a callable value, e.g. for passing to `then`
    pub fn to_function(&self) -> Value {
        let reject = self.clone();
        Value::native_function("reject", move |args| {
            reject.call(first_arg(args));
            Ok(Value::Undefined)
        })
    }
}

/// A future together with the functions that settle it
#[derive(Clone)]
pub struct WithResolvers {
    pub future: Future,
    pub resolve: Resolve,
    pub reject: Reject,
}
