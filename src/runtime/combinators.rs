//! Static combinators
//!
//! - `Future::resolve(value)` / `Future::reject(reason)`
//! - `Future::all(items)`: fulfills with every value in input order, rejects on the first rejection
//! - `Future::race(items)`: adopts whichever item settles first
//! - `Future::all_settled(items)`: fulfills with one status descriptor per item, never rejects
//!
//! Items may be plain values, futures or foreign thenables; each one is
//! unwrapped with the same resolution procedure `then` uses. A combinator
//! handed something other than an array rejects with a TypeError.

use super::future::{Future, Reaction};
use super::resolution::resolve_with;
use super::value::Value;
use crate::error::{messages, Error};
use crate::event_loop::SchedulerRef;
use rustc_hash::FxHashMap as HashMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

impl Future {
    /// A future for `value`.
    ///
    /// A future from this crate is adopted through `then`; anything else is
    /// handed to a fresh future's resolve.
    pub fn resolve(scheduler: &SchedulerRef, value: impl Into<Value>) -> Future {
        let value = value.into();
        if let Some(source) = value.as_future() {
            return Future::new(scheduler, move |resolve, reject| {
                source.then(resolve.to_function(), reject.to_function());
                Ok(())
            });
        }
        Future::new(scheduler, move |resolve, _| {
            resolve.call(value);
            Ok(())
        })
    }

    /// A future rejected with `reason`
    pub fn reject(scheduler: &SchedulerRef, reason: impl Into<Value>) -> Future {
        let reason = reason.into();
        Future::new(scheduler, move |_, reject| {
            reject.call(reason);
            Ok(())
        })
    }

    /// Wait for every item.
    ///
    /// Fulfills with an array holding item `i`'s value at index `i`; rejects
    /// with the first rejection reason.
    pub fn all(scheduler: &SchedulerRef, items: impl Into<Value>) -> Future {
        let aggregate = Future::pending(scheduler);
        let Some(items) = expect_array(&aggregate, "all", items.into()) else {
            return aggregate;
        };
        if items.is_empty() {
            aggregate.fulfill_with(Value::new_array(vec![]));
            return aggregate;
        }

        let total = items.len();
        let results = Rc::new(RefCell::new(vec![Value::Undefined; total]));
        let remaining = Rc::new(Cell::new(total));

        for (index, item) in items.into_iter().enumerate() {
            let on_fulfilled = {
                let results = results.clone();
                let remaining = remaining.clone();
                Reaction::new(&aggregate, move |aggregate, value| {
                    results.borrow_mut()[index] = value;
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        debug!(future_id = aggregate.id(), total, "all items fulfilled");
                        let values = std::mem::take(&mut *results.borrow_mut());
                        aggregate.fulfill_with(Value::new_array(values));
                    }
                })
            };
            let on_rejected = Reaction::new(&aggregate, |aggregate, reason| {
                aggregate.reject_with(reason)
            });
            unwrap_item(scheduler, item).subscribe(on_fulfilled, on_rejected);
        }

        aggregate
    }

    /// Adopt the outcome of whichever item settles first.
    ///
    /// An empty array never settles.
    pub fn race(scheduler: &SchedulerRef, items: impl Into<Value>) -> Future {
        let items = items.into();
        let race_scheduler = scheduler.clone();
        Future::new(scheduler, move |resolve, reject| {
            let entries = items.as_array().ok_or_else(|| {
                Error::type_error(messages::combinator_requires_array("race", items.type_of()))
            })?;
            for item in entries {
                Future::resolve(&race_scheduler, item)
                    .then(resolve.to_function(), reject.to_function());
            }
            Ok(())
        })
    }

    /// Wait for every item to settle, whatever the outcome.
    ///
    /// Fulfills with `{status: "fulfilled", value}` or
    /// `{status: "rejected", reason}` per item, in input order.
    pub fn all_settled(scheduler: &SchedulerRef, items: impl Into<Value>) -> Future {
        let aggregate = Future::pending(scheduler);
        let Some(items) = expect_array(&aggregate, "allSettled", items.into()) else {
            return aggregate;
        };
        if items.is_empty() {
            aggregate.fulfill_with(Value::new_array(vec![]));
            return aggregate;
        }

        let total = items.len();
        let results = Rc::new(RefCell::new(vec![Value::Undefined; total]));
        let remaining = Rc::new(Cell::new(total));

        let record = Rc::new(move |aggregate: &Future, index: usize, descriptor: Value| {
            results.borrow_mut()[index] = descriptor;
            remaining.set(remaining.get() - 1);
            if remaining.get() == 0 {
                debug!(future_id = aggregate.id(), total, "all items settled");
                let descriptors = std::mem::take(&mut *results.borrow_mut());
                aggregate.fulfill_with(Value::new_array(descriptors));
            }
        });

        for (index, item) in items.into_iter().enumerate() {
            let on_fulfilled = {
                let record = record.clone();
                Reaction::new(&aggregate, move |aggregate, value| {
                    record(aggregate, index, settled_descriptor("fulfilled", "value", value))
                })
            };
            let on_rejected = {
                let record = record.clone();
                Reaction::new(&aggregate, move |aggregate, reason| {
                    record(aggregate, index, settled_descriptor("rejected", "reason", reason))
                })
            };
            unwrap_item(scheduler, item).subscribe(on_fulfilled, on_rejected);
        }

        aggregate
    }
}

/// The array elements of `input`, or `None` after rejecting `aggregate`
fn expect_array(aggregate: &Future, combinator: &str, input: Value) -> Option<Vec<Value>> {
    let items = input.as_array();
    if items.is_none() {
        let message = messages::combinator_requires_array(combinator, input.type_of());
        aggregate.reject_with(Error::type_error(message).into_reason());
    }
    items
}

/// A future settled by running `item` through the resolution procedure
fn unwrap_item(scheduler: &SchedulerRef, item: Value) -> Future {
    let slot = Future::pending(scheduler);
    resolve_with(&slot, item);
    slot
}

/// `{status, <key>: payload}`
fn settled_descriptor(status: &str, key: &str, payload: Value) -> Value {
    let mut props = HashMap::default();
    props.insert("status".to_string(), Value::from(status));
    props.insert(key.to_string(), payload);
    Value::new_object_with_properties(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::event_loop::EventLoop;
    use crate::runtime::future::FutureState;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn json_value(future: &Future) -> serde_json::Value {
        future.value().map(|v| v.to_json()).unwrap_or_default()
    }

    #[test]
    fn test_resolve_plain_value() {
        let el = EventLoop::new();
        let future = Future::resolve(&el.scheduler(), "x");
        assert_eq!(future.state(), FutureState::Fulfilled);
    }

    #[test]
    fn test_resolve_future_returns_new_future_adopting_state() {
        let el = EventLoop::new();
        let scheduler = el.scheduler();
        let source = Future::reject(&scheduler, "no");
        let wrapped = Future::resolve(&scheduler, &source);
        assert!(!wrapped.ptr_eq(&source));
        assert!(wrapped.is_pending());
        el.run_to_completion().unwrap();
        assert_eq!(wrapped.reason().map(|r| r.to_js_string()), Some("no".to_string()));
    }

    #[test]
    fn test_all_empty_resolves_immediately() {
        let el = EventLoop::new();
        let future = Future::all(&el.scheduler(), Vec::<Value>::new());
        assert_eq!(future.state(), FutureState::Fulfilled);
        assert_eq!(json_value(&future), json!([]));
    }

    #[test]
    fn test_all_preserves_order() {
        let el = EventLoop::new();
        let scheduler = el.scheduler();
        let items = vec![
            Value::from(1),
            Value::from(Future::resolve(&scheduler, 2)),
            Value::from(3),
        ];
        let future = Future::all(&scheduler, items);
        el.run_to_completion().unwrap();
        assert_eq!(json_value(&future), json!([1, 2, 3]));
    }

    #[test]
    fn test_all_rejects_on_non_array() {
        let el = EventLoop::new();
        let future = Future::all(&el.scheduler(), 5);
        assert_eq!(future.state(), FutureState::Rejected);
        assert_eq!(future.reason().and_then(|r| r.error_kind()), Some(ErrorKind::TypeError));
    }

    #[test]
    fn test_all_settled_rejects_on_non_array() {
        let el = EventLoop::new();
        let future = Future::all_settled(&el.scheduler(), "nope");
        assert_eq!(future.state(), FutureState::Rejected);
    }

    #[test]
    fn test_race_rejects_on_non_array() {
        let el = EventLoop::new();
        let future = Future::race(&el.scheduler(), Value::Null);
        assert_eq!(future.state(), FutureState::Rejected);
        assert_eq!(future.reason().and_then(|r| r.error_kind()), Some(ErrorKind::TypeError));
    }

    #[test]
    fn test_race_empty_stays_pending() {
        let el = EventLoop::new();
        let future = Future::race(&el.scheduler(), Vec::<Value>::new());
        el.run_to_completion().unwrap();
        assert!(future.is_pending());
    }

    #[test]
    fn test_all_settled_mixed() {
        let el = EventLoop::new();
        let scheduler = el.scheduler();
        let items = vec![
            Value::from(Future::resolve(&scheduler, 1)),
            Value::from(Future::reject(&scheduler, "e")),
        ];
        let future = Future::all_settled(&scheduler, items);
        el.run_to_completion().unwrap();
        assert_eq!(
            json_value(&future),
            json!([
                {"status": "fulfilled", "value": 1},
                {"status": "rejected", "reason": "e"}
            ])
        );
    }
}
