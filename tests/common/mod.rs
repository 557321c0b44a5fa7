//! Shared test helpers for integration tests

use quickfuture::runtime::Future;
use quickfuture::{Runtime, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Drain the runtime and return the future's outcome as JSON:
/// `{"state": ..., "value" | "reason": ...}`
pub fn settle(runtime: &Runtime, future: &Future) -> serde_json::Value {
    runtime.run().expect("event loop failed");
    outcome(future)
}

/// The future's current outcome as JSON
pub fn outcome(future: &Future) -> serde_json::Value {
    let mut out = serde_json::json!({ "state": future.state().as_str() });
    if let Some(value) = future.value() {
        out["value"] = value.to_json();
    }
    if let Some(reason) = future.reason() {
        out["reason"] = reason.to_json();
    }
    out
}

/// A callable that records every argument it is called with
#[allow(dead_code)]
pub fn recorder() -> (Value, Rc<RefCell<Vec<Value>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let func = Value::function(move |v| {
        log.borrow_mut().push(v.clone());
        Ok(v)
    });
    (func, seen)
}

/// A plain object whose `then` property is the given native function
#[allow(dead_code)]
pub fn thenable_object<F>(then: F) -> Value
where
    F: Fn(&[Value]) -> quickfuture::Result<Value> + 'static,
{
    let object = Value::new_object();
    object.set_property("then", Value::native_function("then", then));
    object
}
