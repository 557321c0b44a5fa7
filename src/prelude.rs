//! Prelude module for convenient imports
//!
//! This module provides the most commonly used types and traits for working
//! with quickfuture. Import everything from this module for quick access:
//!
//! ```no_run
//! use quickfuture::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let runtime = Runtime::new();
//!     let all = runtime.all(vec![Value::from(1), runtime.resolve(2).into()]);
//!     runtime.run()?;
//!     println!("{:?}", all.value());
//!     Ok(())
//! }
//! ```

// Core runtime types
pub use crate::runtime::{
    Future, FutureState, Object, ObjectKind, Reject, Resolve, Runtime, Shape, Thenable, Value,
    WithResolvers,
};

// Error handling
pub use crate::error::{Error, ErrorKind, Result};

// Scheduling
pub use crate::event_loop::{
    EventLoop, EventLoopConfig, EventLoopStats, RunResult, Scheduler, SchedulerRef, TimerId,
};

// Version constant
pub use crate::VERSION;
