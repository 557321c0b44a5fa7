//! Dynamic value types
//!
//! Futures carry payloads of any type, so every value that flows through a
//! future is represented by [`Value`]. Objects are reference counted and
//! compared by identity, which is what the chaining-cycle check relies on.

use super::future::Future;
use super::thenable::Thenable;
use crate::error::{messages, Error, ErrorKind, Result};
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// JSON stand-in for an object nested inside itself
const CIRCULAR: &str = "[Circular]";

/// Type alias for native function implementations: `(this, args)`
pub type NativeFn = Rc<dyn Fn(&Value, &[Value]) -> Result<Value>>;

/// A dynamically typed value
#[derive(Clone, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Object (includes arrays, functions, errors, futures, thenables)
    Object(Rc<RefCell<Object>>),
}

/// A heap object
pub struct Object {
    /// What kind of object this is
    pub kind: ObjectKind,
    /// Own properties
    pub properties: HashMap<String, Value>,
}

/// Object kinds
pub enum ObjectKind {
    /// Plain key/value record
    Ordinary,
    /// Ordered sequence
    Array(Vec<Value>),
    /// Structured error produced by the runtime
    Error { kind: ErrorKind, message: String },
    /// Callable implemented in Rust
    NativeFunction { name: String, func: NativeFn },
    /// A future from this crate
    Future(Future),
    /// A future-like value from another implementation
    Thenable(Rc<dyn Thenable>),
}

impl Object {
    /// Create a new ordinary object
    pub fn new() -> Self {
        Self {
            kind: ObjectKind::Ordinary,
            properties: HashMap::default(),
        }
    }

    /// Create an object of the given kind with no properties
    pub fn with_kind(kind: ObjectKind) -> Self {
        Self {
            kind,
            properties: HashMap::default(),
        }
    }

    /// Get an own property
    pub fn get_property(&self, key: &str) -> Option<Value> {
        match (&self.kind, key) {
            (ObjectKind::Array(elements), "length") => Some(Value::Number(elements.len() as f64)),
            (ObjectKind::Array(elements), _) => match key.parse::<usize>() {
                Ok(index) => elements.get(index).cloned(),
                Err(_) => self.properties.get(key).cloned(),
            },
            (ObjectKind::NativeFunction { name, .. }, "name") => Some(Value::String(name.clone())),
            _ => self.properties.get(key).cloned(),
        }
    }

    /// Set an own property
    pub fn set_property(&mut self, key: &str, value: Value) {
        if let ObjectKind::Array(elements) = &mut self.kind {
            if let Ok(index) = key.parse::<usize>() {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
                return;
            }
        }
        self.properties.insert(key.to_string(), value);
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Value {
    /// Check if value is nullish (null or undefined)
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Check if value can be called
    pub fn is_callable(&self) -> bool {
        match self {
            Value::Object(obj) => matches!(obj.borrow().kind, ObjectKind::NativeFunction { .. }),
            _ => false,
        }
    }

    /// Check if value is an array
    pub fn is_array(&self) -> bool {
        match self {
            Value::Object(obj) => matches!(obj.borrow().kind, ObjectKind::Array(_)),
            _ => false,
        }
    }

    /// The future wrapped by this value, if any
    pub fn as_future(&self) -> Option<Future> {
        match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Future(future) => Some(future.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// A copy of the array elements, if this is an array
    pub fn as_array(&self) -> Option<Vec<Value>> {
        match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Array(elements) => Some(elements.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// The number, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string slice, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The error kind, if this is a structured error value
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Error { kind, .. } => Some(*kind),
                _ => None,
            },
            _ => None,
        }
    }

    /// Check if this is the error produced by a chaining cycle
    pub fn is_chaining_cycle_error(&self) -> bool {
        self.error_kind() == Some(ErrorKind::ChainingCycle)
    }

    /// Get a property (objects only)
    pub fn get_property(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.borrow().get_property(key),
            Value::String(s) if key == "length" => Some(Value::Number(s.chars().count() as f64)),
            _ => None,
        }
    }

    /// Set a property, returning false for primitives
    pub fn set_property(&self, key: &str, value: Value) -> bool {
        match self {
            Value::Object(obj) => {
                obj.borrow_mut().set_property(key, value);
                true
            }
            _ => false,
        }
    }

    /// Call this value as a function with an `undefined` receiver.
    ///
    /// `Err` is how a callee throws; a non-callable value throws a TypeError.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        self.call_with_this(&Value::Undefined, args)
    }

    /// Call this value as a function with `this` bound to `receiver`
    pub fn call_with_this(&self, receiver: &Value, args: &[Value]) -> Result<Value> {
        let func = match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::NativeFunction { func, .. } => Some(func.clone()),
                _ => None,
            },
            _ => None,
        };
        match func {
            Some(func) => func(receiver, args),
            None => Err(Error::type_error(messages::not_a_function(
                &self.to_js_string(),
            ))),
        }
    }

    /// Create a new object value
    pub fn new_object() -> Value {
        Value::Object(Rc::new(RefCell::new(Object::new())))
    }

    /// Create a new object value with properties
    pub fn new_object_with_properties(properties: HashMap<String, Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(Object {
            kind: ObjectKind::Ordinary,
            properties,
        })))
    }

    /// Create a new array value
    pub fn new_array(elements: Vec<Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(Object::with_kind(ObjectKind::Array(
            elements,
        )))))
    }

    /// Create a new error value
    pub fn new_error(kind: ErrorKind, message: &str) -> Value {
        let mut properties = HashMap::default();
        properties.insert("name".to_string(), Value::String(kind.to_string()));
        properties.insert("message".to_string(), Value::String(message.to_string()));
        Value::Object(Rc::new(RefCell::new(Object {
            kind: ObjectKind::Error {
                kind,
                message: message.to_string(),
            },
            properties,
        })))
    }

    /// Create a native function value that ignores its receiver
    pub fn native_function<F>(name: &str, func: F) -> Value
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Value::method(name, move |_, args| func(args))
    }

    /// Create a native function value that sees its receiver as `this`
    pub fn method<F>(name: &str, func: F) -> Value
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
    {
        Value::Object(Rc::new(RefCell::new(Object::with_kind(
            ObjectKind::NativeFunction {
                name: name.to_string(),
                func: Rc::new(func),
            },
        ))))
    }

    /// Create an anonymous single-argument function value.
    ///
    /// Missing arguments arrive as `undefined`.
    pub fn function<F>(func: F) -> Value
    where
        F: Fn(Value) -> Result<Value> + 'static,
    {
        Value::native_function("anonymous", move |args| func(first_arg(args)))
    }

    /// Wrap a foreign thenable implementation
    pub fn new_thenable(thenable: Rc<dyn Thenable>) -> Value {
        Value::Object(Rc::new(RefCell::new(Object::with_kind(
            ObjectKind::Thenable(thenable),
        ))))
    }

    /// Get the typeof string
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(obj) => match obj.borrow().kind {
                ObjectKind::NativeFunction { .. } => "function",
                _ => "object",
            },
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => !a.is_nan() && !b.is_nan() && a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Convert to a display string.
    ///
    /// An array that contains itself prints the inner occurrence as empty.
    pub fn to_js_string(&self) -> String {
        self.display_string(&mut Vec::new())
    }

    fn display_string(&self, ancestors: &mut Vec<*const RefCell<Object>>) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Object(obj) => {
                let ptr = Rc::as_ptr(obj);
                if ancestors.contains(&ptr) {
                    return String::new();
                }
                ancestors.push(ptr);
                let obj = obj.borrow();
                let out = match &obj.kind {
                    ObjectKind::Array(elements) => elements
                        .iter()
                        .map(|e| {
                            if e.is_nullish() {
                                String::new()
                            } else {
                                e.display_string(ancestors)
                            }
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                    ObjectKind::Error { kind, message } => format!("{}: {}", kind, message),
                    ObjectKind::NativeFunction { name, .. } => {
                        format!("function {}() {{ [native code] }}", name)
                    }
                    ObjectKind::Future(_) => "[object Future]".to_string(),
                    ObjectKind::Ordinary | ObjectKind::Thenable(_) => "[object Object]".to_string(),
                };
                ancestors.pop();
                out
            }
        }
    }

    /// Project the value onto JSON.
    ///
    /// Non-finite numbers and `undefined` become `null`; futures, functions
    /// and thenables become their display string. An object nested inside
    /// itself becomes the string `"[Circular]"`.
    pub fn to_json(&self) -> serde_json::Value {
        self.json_value(&mut Vec::new())
    }

    fn json_value(&self, ancestors: &mut Vec<*const RefCell<Object>>) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                if n.is_nan() || n.is_infinite() {
                    serde_json::Value::Null
                } else if n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
                    serde_json::json!(*n as i64)
                } else {
                    serde_json::json!(*n)
                }
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(obj) => {
                let ptr = Rc::as_ptr(obj);
                if ancestors.contains(&ptr) {
                    return serde_json::Value::String(CIRCULAR.to_string());
                }
                ancestors.push(ptr);
                let obj = obj.borrow();
                let out = match &obj.kind {
                    ObjectKind::Array(elements) => serde_json::Value::Array(
                        elements.iter().map(|e| e.json_value(ancestors)).collect(),
                    ),
                    ObjectKind::Ordinary | ObjectKind::Error { .. } => {
                        let mut map = serde_json::Map::new();
                        for (k, v) in &obj.properties {
                            map.insert(k.clone(), v.json_value(ancestors));
                        }
                        serde_json::Value::Object(map)
                    }
                    _ => serde_json::Value::String(self.to_js_string()),
                };
                ancestors.pop();
                out
            }
        }
    }
}

/// The first argument, or `undefined` when none was passed
pub fn first_arg(args: &[Value]) -> Value {
    args.first().cloned().unwrap_or_default()
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(_) if self.is_array() => {
                write!(f, "[{}]", self.to_js_string())
            }
            other => write!(f, "{}", other.to_js_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(elements: Vec<Value>) -> Self {
        Value::new_array(elements)
    }
}

impl From<Future> for Value {
    fn from(future: Future) -> Self {
        Value::Object(Rc::new(RefCell::new(Object::with_kind(
            ObjectKind::Future(future),
        ))))
    }
}

impl From<&Future> for Value {
    fn from(future: &Future) -> Self {
        Value::from(future.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_equals_uses_identity_for_objects() {
        let a = Value::new_object();
        let b = Value::new_object();
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&b));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn test_call_native_function() {
        let double = Value::function(|v| Ok(Value::Number(v.as_number().unwrap_or(0.0) * 2.0)));
        assert!(double.is_callable());
        assert_eq!(double.type_of(), "function");
        let result = double.call(&[Value::from(21)]).unwrap();
        assert_eq!(result.as_number(), Some(42.0));
    }

    #[test]
    fn test_call_non_callable_is_type_error() {
        let err = Value::from(3).call(&[]).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TypeError));
    }

    #[test]
    fn test_array_properties() {
        let arr = Value::new_array(vec![Value::from(1), Value::from("two")]);
        assert!(arr.is_array());
        assert_eq!(arr.get_property("length").and_then(|v| v.as_number()), Some(2.0));
        assert_eq!(arr.get_property("1").map(|v| v.to_js_string()), Some("two".to_string()));
        arr.set_property("3", Value::from(true));
        assert_eq!(arr.as_array().map(|a| a.len()), Some(4));
    }

    #[test]
    fn test_to_json_projection() {
        let mut props = HashMap::default();
        props.insert("status".to_string(), Value::from("fulfilled"));
        props.insert("value".to_string(), Value::from(1));
        let obj = Value::new_object_with_properties(props);
        let arr = Value::new_array(vec![obj, Value::Undefined, Value::from(1.5)]);
        assert_eq!(
            arr.to_json(),
            serde_json::json!([{"status": "fulfilled", "value": 1}, null, 1.5])
        );
    }

    #[test]
    fn test_error_value_display() {
        let err = Value::new_error(ErrorKind::ChainingCycle, "cycle");
        assert_eq!(err.to_js_string(), "TypeError: cycle");
        assert!(err.is_chaining_cycle_error());
        assert_eq!(err.to_json(), serde_json::json!({"name": "TypeError", "message": "cycle"}));
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(Value::from(3).to_js_string(), "3");
        assert_eq!(Value::from(0.5).to_js_string(), "0.5");
        assert_eq!(Value::Number(f64::INFINITY).to_js_string(), "Infinity");
        assert_eq!(format!("{:?}", Value::from("x")), "\"x\"");
        assert_eq!(
            format!("{:?}", Value::new_array(vec![Value::from(1), Value::from(2)])),
            "[1,2]"
        );
    }

    #[test]
    fn test_self_containing_values_format() {
        let arr = Value::new_array(vec![Value::from(1)]);
        arr.set_property("1", arr.clone());
        assert_eq!(arr.to_js_string(), "1,");
        assert_eq!(arr.to_json(), serde_json::json!([1, "[Circular]"]));
        assert_eq!(format!("{:?}", arr), "[1,]");

        let obj = Value::new_object();
        obj.set_property("me", obj.clone());
        assert_eq!(obj.to_json(), serde_json::json!({"me": "[Circular]"}));
    }

    #[test]
    fn test_shared_child_is_not_circular() {
        let child = Value::new_array(vec![Value::from(2)]);
        let parent = Value::new_array(vec![child.clone(), child]);
        assert_eq!(parent.to_json(), serde_json::json!([[2], [2]]));
    }

    #[test]
    fn test_method_sees_receiver() {
        let receiver = Value::new_object();
        receiver.set_property("n", Value::from(7));
        let read_n = Value::method("readN", |this, _| {
            Ok(this.get_property("n").unwrap_or_default())
        });
        assert_eq!(read_n.call_with_this(&receiver, &[]).unwrap().as_number(), Some(7.0));
        assert!(read_n.call(&[]).unwrap().is_nullish());
    }
}
