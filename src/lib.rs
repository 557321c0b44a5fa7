//! Quickfuture: deferred values for embedders, written in Rust
//!
//! A [`Future`](runtime::Future) holds a value that becomes available later.
//! It settles exactly once, runs its callbacks on a host-provided
//! [`Scheduler`](event_loop::Scheduler), and interoperates with any
//! third-party object exposing a `then` method.
//!
//! # Quick Start
//!
//! ```no_run
//! use quickfuture::{Runtime, Value};
//!
//! fn main() -> quickfuture::Result<()> {
//!     let runtime = Runtime::new();
//!     let doubled = runtime
//!         .resolve(21)
//!         .then(Value::function(|v| Ok(Value::from(v.as_number().unwrap_or(0.0) * 2.0))), Value::Undefined);
//!     runtime.run()?;
//!     println!("Result: {:?}", doubled.value());
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Core** | [`runtime`], [`error`](Error) |
//! | **Scheduling** | [`event_loop`] |
// Clippy configuration for quickfuture.
//
// - type_complexity: reaction queues hold boxed FnOnce closures
// - new_without_default: Some types have required initialization logic
#![allow(clippy::type_complexity)]
#![allow(clippy::new_without_default)]

pub mod event_loop;
pub mod prelude;
pub mod runtime;

mod error;

pub use error::{messages, Error, ErrorKind, ResourceLimitKind, Result};
pub use event_loop::{EventLoop, EventLoopConfig, Scheduler, SchedulerRef};
pub use runtime::{Future, FutureState, Runtime, Thenable, Value};

/// Quickfuture version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
