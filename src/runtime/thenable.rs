//! Thenable capability
//!
//! A thenable is anything exposing a callable `then` accepting two callbacks.
//! Rather than probing properties ad hoc at every use site, a value's shape is
//! decided once, at the resolution boundary, by [`Shape::classify`].

use super::future::Future;
use super::value::{ObjectKind, Value};
use crate::error::Result;
use std::rc::Rc;

/// A future-like value from another implementation.
///
/// Both methods may fail; a failure is reported through `Err` exactly like a
/// thrown exception and ends up rejecting the future being resolved.
pub trait Thenable {
    /// Read the `then` capability.
    ///
    /// `Ok(false)` means the value has no callable `then` and is treated as a
    /// plain value.
    fn has_then(&self) -> Result<bool> {
        Ok(true)
    }

    /// Invoke `then` with a fulfillment and a rejection callback.
    ///
    /// Both callbacks are callable [`Value`]s taking one argument.
    fn then(&self, on_fulfilled: Value, on_rejected: Value) -> Result<()>;
}

/// How a produced value has to be unwrapped
pub enum Shape {
    /// Anything that is not future-like
    Plain(Value),
    /// A future from this crate
    Native(Future),
    /// A foreign thenable
    Foreign(Rc<dyn Thenable>),
}

impl Shape {
    /// Decide the shape of a value.
    ///
    /// Fails when reading a foreign `then` capability fails.
    pub fn classify(value: &Value) -> Result<Shape> {
        let obj = match value {
            Value::Object(obj) => obj,
            _ => return Ok(Shape::Plain(value.clone())),
        };

        let (thenable, then_property) = {
            let obj_ref = obj.borrow();
            match &obj_ref.kind {
                ObjectKind::Future(future) => return Ok(Shape::Native(future.clone())),
                ObjectKind::Thenable(thenable) => (Some(thenable.clone()), None),
                _ => (None, obj_ref.properties.get("then").cloned()),
            }
        };

        if let Some(thenable) = thenable {
            return Ok(if thenable.has_then()? {
                Shape::Foreign(thenable)
            } else {
                Shape::Plain(value.clone())
            });
        }

        match then_property {
            Some(method) if method.is_callable() => Ok(Shape::Foreign(Rc::new(ThenMethod {
                receiver: value.clone(),
                method,
            }))),
            _ => Ok(Shape::Plain(value.clone())),
        }
    }
}

/// Adapter for ordinary objects carrying a callable `then` property.
///
/// `then` runs with the object itself as `this`.
struct ThenMethod {
    receiver: Value,
    method: Value,
}

impl Thenable for ThenMethod {
    fn then(&self, on_fulfilled: Value, on_rejected: Value) -> Result<()> {
        self.method
            .call_with_this(&self.receiver, &[on_fulfilled, on_rejected])
            .map(|_| ())
    }
}

impl Thenable for Future {
    fn then(&self, on_fulfilled: Value, on_rejected: Value) -> Result<()> {
        Future::then(self, on_fulfilled, on_rejected);
        Ok(())
    }
}
