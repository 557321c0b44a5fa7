//! The resolution procedure
//!
//! Decides how a produced value settles a target future: plain values fulfill
//! it, futures and foreign thenables are unwrapped recursively, and a target
//! asked to adopt itself is rejected with a chaining-cycle error. Every call
//! ends in at most one terminal action on the target, however the foreign
//! `then` behaves.

use super::future::{Future, Reaction};
use super::thenable::{Shape, Thenable};
use super::value::{first_arg, Value};
use crate::error::Error;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, trace};

/// Settle `target` according to the shape of `produced`.
pub(crate) fn resolve_with(target: &Future, produced: Value) {
    // Identity must be checked before anything else touches `produced`.
    if let Some(candidate) = produced.as_future() {
        if candidate.ptr_eq(target) {
            debug!(future_id = target.id(), "chaining cycle detected");
            target.reject_with(Error::chaining_cycle().into_reason());
            return;
        }
    }

    let shape = match Shape::classify(&produced) {
        Ok(shape) => shape,
        Err(err) => {
            target.reject_with(err.into_reason());
            return;
        }
    };

    match shape {
        Shape::Plain(value) => target.fulfill_with(value),
        Shape::Native(source) => {
            trace!(
                future_id = target.id(),
                source_id = source.id(),
                "adopting future"
            );
            source.subscribe(
                Reaction::new(target, resolve_with),
                Reaction::new(target, |target, reason| target.reject_with(reason)),
            );
        }
        Shape::Foreign(thenable) => adopt_thenable(target, thenable),
    }
}

/// Subscribe `target` to a foreign thenable through a one-shot callback pair.
fn adopt_thenable(target: &Future, thenable: Rc<dyn Thenable>) {
    trace!(future_id = target.id(), "adopting foreign thenable");
    let called = Rc::new(Cell::new(false));

    let on_fulfilled = {
        let target = target.clone();
        let called = called.clone();
        Value::native_function("resolve", move |args| {
            if !called.replace(true) {
                resolve_with(&target, first_arg(args));
            }
            Ok(Value::Undefined)
        })
    };

    let on_rejected = {
        let target = target.clone();
        let called = called.clone();
        Value::native_function("reject", move |args| {
            if !called.replace(true) {
                target.reject_with(first_arg(args));
            }
            Ok(Value::Undefined)
        })
    };

    if let Err(err) = thenable.then(on_fulfilled, on_rejected) {
        // A throw after one of the callbacks already fired is ignored.
        if !called.replace(true) {
            target.reject_with(err.into_reason());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, Result};
    use crate::event_loop::EventLoop;
    use crate::runtime::future::FutureState;

    /// Calls fulfill twice, then reject, then throws
    struct Chaotic;

    impl Thenable for Chaotic {
        fn then(&self, on_fulfilled: Value, on_rejected: Value) -> Result<()> {
            on_fulfilled.call(&[Value::from("first")])?;
            on_fulfilled.call(&[Value::from("second")])?;
            on_rejected.call(&[Value::from("late")])?;
            Err(Error::thrown("after the fact"))
        }
    }

    /// Throws without calling anything
    struct Throwing;

    impl Thenable for Throwing {
        fn then(&self, _: Value, _: Value) -> Result<()> {
            Err(Error::thrown("then exploded"))
        }
    }

    #[test]
    fn test_plain_value_fulfills_synchronously() {
        let el = EventLoop::new();
        let target = Future::pending(&el.scheduler());
        resolve_with(&target, Value::from(7));
        assert_eq!(target.state(), FutureState::Fulfilled);
        assert_eq!(target.value().and_then(|v| v.as_number()), Some(7.0));
    }

    #[test]
    fn test_self_resolution_rejects_with_cycle_error() {
        let el = EventLoop::new();
        let target = Future::pending(&el.scheduler());
        resolve_with(&target, Value::from(&target));
        assert_eq!(target.state(), FutureState::Rejected);
        assert_eq!(
            target.reason().and_then(|r| r.error_kind()),
            Some(ErrorKind::ChainingCycle)
        );
        // Nothing was subscribed to the target itself.
        assert!(!el.has_pending_tasks());
    }

    #[test]
    fn test_first_callback_wins_for_chaotic_thenable() {
        let el = EventLoop::new();
        let target = Future::pending(&el.scheduler());
        resolve_with(&target, Value::new_thenable(Rc::new(Chaotic)));
        assert_eq!(target.state(), FutureState::Fulfilled);
        assert_eq!(target.value().and_then(|v| v.as_str().map(String::from)), Some("first".to_string()));
    }

    #[test]
    fn test_throwing_then_rejects() {
        let el = EventLoop::new();
        let target = Future::pending(&el.scheduler());
        resolve_with(&target, Value::new_thenable(Rc::new(Throwing)));
        assert_eq!(target.state(), FutureState::Rejected);
        assert_eq!(target.reason().and_then(|r| r.as_str().map(String::from)), Some("then exploded".to_string()));
    }

    #[test]
    fn test_native_future_adoption_is_deferred() {
        let el = EventLoop::new();
        let scheduler = el.scheduler();
        let source = Future::resolve(&scheduler, 3);
        let target = Future::pending(&scheduler);

        resolve_with(&target, Value::from(&source));
        assert!(target.is_pending());

        el.run_to_completion().unwrap();
        assert_eq!(target.value().and_then(|v| v.as_number()), Some(3.0));
    }
}
