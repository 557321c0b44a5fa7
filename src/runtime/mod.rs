//! Runtime environment for quickfuture
//!
//! This module provides the value model, the [`Future`] state machine and
//! its resolution procedure, plus a [`Runtime`] that owns an event loop and
//! hands out futures bound to it.

mod combinators;
mod future;
mod resolution;
mod thenable;
mod value;

pub use future::{Future, FutureState, Reject, Resolve, WithResolvers};
pub use thenable::{Shape, Thenable};
pub use value::{first_arg, NativeFn, Object, ObjectKind, Value};

use crate::error::Result;
use crate::event_loop::{EventLoop, EventLoopConfig, RunResult, SchedulerRef};
use tracing::trace;

/// The quickfuture runtime
pub struct Runtime {
    event_loop: EventLoop,
    scheduler: SchedulerRef,
}

impl Runtime {
    /// Create a new runtime with the default event loop configuration
    pub fn new() -> Self {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        Self {
            event_loop,
            scheduler,
        }
    }

    /// Create a runtime whose event loop uses `config`
    pub fn with_config(config: EventLoopConfig) -> Result<Self> {
        let event_loop = EventLoop::with_config(config)?;
        let scheduler = event_loop.scheduler();
        Ok(Self {
            event_loop,
            scheduler,
        })
    }

    /// The event loop driving this runtime's callbacks
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// The scheduler futures created here defer to
    pub fn scheduler(&self) -> &SchedulerRef {
        &self.scheduler
    }

    /// See [`Future::new`]
    pub fn future<F>(&self, initializer: F) -> Future
    where
        F: FnOnce(Resolve, Reject) -> Result<()>,
    {
        Future::new(&self.scheduler, initializer)
    }

    /// See [`Future::with_resolvers`]
    pub fn with_resolvers(&self) -> WithResolvers {
        Future::with_resolvers(&self.scheduler)
    }

    pub fn resolve(&self, value: impl Into<Value>) -> Future {
        Future::resolve(&self.scheduler, value)
    }

    pub fn reject(&self, reason: impl Into<Value>) -> Future {
        Future::reject(&self.scheduler, reason)
    }

    pub fn all(&self, items: impl Into<Value>) -> Future {
        Future::all(&self.scheduler, items)
    }

    pub fn race(&self, items: impl Into<Value>) -> Future {
        Future::race(&self.scheduler, items)
    }

    pub fn all_settled(&self, items: impl Into<Value>) -> Future {
        Future::all_settled(&self.scheduler, items)
    }

    /// A future that fulfills with `value` once `ms` of virtual time pass.
    ///
    /// `value` goes through resolve when the timer fires, so a future or
    /// thenable is adopted at that point.
    pub fn delay(&self, ms: u64, value: impl Into<Value>) -> Future {
        let value = value.into();
        let WithResolvers {
            future, resolve, ..
        } = self.with_resolvers();
        let timer = self.event_loop.set_timeout(ms, Box::new(move || resolve.call(value)));
        trace!(future_id = future.id(), timer_id = timer, delay_ms = ms, "delay scheduled");
        future
    }

    /// Drain the event loop: every queued callback and every timer
    pub fn run(&self) -> Result<RunResult> {
        self.event_loop.run_to_completion()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
