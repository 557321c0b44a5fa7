//! Event Loop Implementation
//!
//! Futures never run their callbacks synchronously; they hand them to a
//! [`Scheduler`], which guarantees a task runs after the current call stack
//! unwinds and in FIFO order relative to every other scheduled task.
//!
//! [`EventLoop`] is the production scheduler: a FIFO task queue plus
//! virtual-time timers, driven explicitly by the embedder via
//! [`EventLoop::tick`], [`EventLoop::run_pending`] or
//! [`EventLoop::run_to_completion`].

mod config;

pub use config::{EventLoopConfig, DEFAULT_MAX_TASKS_PER_TICK};

use crate::error::{Error, Result};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, trace};

/// A deferred unit of work
pub type Task = Box<dyn FnOnce()>;

/// Host-provided deferred execution.
///
/// `schedule` must never run the task before returning. Tasks scheduled
/// earlier run before tasks scheduled later.
pub trait Scheduler {
    /// Queue a task to run after the current synchronous execution completes
    fn schedule(&self, task: Task);

    /// Called whenever a future is created on this scheduler
    fn future_created(&self) {}

    /// Called whenever a future scheduled here settles
    fn future_settled(&self) {}
}

/// Shared handle to a scheduler, as held by every future
pub type SchedulerRef = Rc<dyn Scheduler>;

/// Timer identifier returned by [`EventLoop::set_timeout`]
pub type TimerId = u64;

/// A task waiting for virtual time to reach `fire_at`
struct Timer {
    id: TimerId,
    fire_at: u64,
    task: Task,
}

/// Result of running the event loop to completion via `run_to_completion()`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Total number of queued tasks that were run
    pub tasks_processed: usize,
    /// Total number of timers that fired
    pub timers_fired: usize,
    /// Number of loop iterations (each iteration = drain tasks + at most one timer)
    pub iterations: u64,
    /// The virtual time when the event loop finished
    pub final_time: u64,
}

/// Runtime statistics for the event loop
#[derive(Clone, Debug, Default)]
pub struct EventLoopStats {
    /// Total queued tasks run across all ticks
    pub total_tasks: u64,
    /// Total timers fired
    pub total_timers: u64,
    /// Total number of event loop ticks
    pub total_ticks: u64,
    /// Maximum tasks drained in a single tick
    pub max_tasks_per_tick: u64,
    /// Longest tick duration in milliseconds (wall-clock)
    pub longest_tick_ms: u64,
    /// Total futures created
    pub total_futures_created: u64,
    /// Total futures settled (fulfilled or rejected)
    pub total_futures_settled: u64,
}

struct EventLoopInner {
    /// FIFO task queue
    tasks: RefCell<VecDeque<Task>>,
    /// Pending timers, unordered
    timers: RefCell<Vec<Timer>>,
    /// Current virtual time in milliseconds
    virtual_time: Cell<u64>,
    /// Next timer ID
    next_timer_id: Cell<TimerId>,
    config: EventLoopConfig,
    stats: RefCell<EventLoopStats>,
}

/// The event loop manages the task queue, timers and virtual time.
///
/// Cloning yields another handle to the same loop.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<EventLoopInner>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Create a new event loop with the default configuration
    pub fn new() -> Self {
        Self::build(EventLoopConfig::default())
    }

    /// Create a new event loop with a validated configuration
    pub fn with_config(config: EventLoopConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EventLoopConfig) -> Self {
        Self {
            inner: Rc::new(EventLoopInner {
                tasks: RefCell::new(VecDeque::new()),
                timers: RefCell::new(Vec::new()),
                virtual_time: Cell::new(0),
                next_timer_id: Cell::new(1),
                config,
                stats: RefCell::new(EventLoopStats::default()),
            }),
        }
    }

    /// The configuration this loop runs with
    pub fn config(&self) -> &EventLoopConfig {
        &self.inner.config
    }

    /// A scheduler handle for creating futures on this loop
    pub fn scheduler(&self) -> SchedulerRef {
        Rc::new(self.clone())
    }

    /// Get current virtual time
    pub fn current_time(&self) -> u64 {
        self.inner.virtual_time.get()
    }

    /// Advance virtual time without firing anything
    pub fn advance_time(&self, ms: u64) {
        self.inner
            .virtual_time
            .set(self.inner.virtual_time.get() + ms);
    }

    /// Schedule a task to run once `delay` ms of virtual time have passed
    pub fn set_timeout(&self, delay: u64, task: Task) -> TimerId {
        let id = self.inner.next_timer_id.get();
        self.inner.next_timer_id.set(id + 1);

        let fire_at = self.current_time() + delay;
        self.inner.timers.borrow_mut().push(Timer { id, fire_at, task });
        trace!(timer_id = id, fire_at, "timer scheduled");
        id
    }

    /// Cancel a timer by ID, returning whether it was still pending
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut timers = self.inner.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|t| t.id != id);
        before != timers.len()
    }

    /// Check if there are queued tasks
    pub fn has_pending_tasks(&self) -> bool {
        !self.inner.tasks.borrow().is_empty()
    }

    /// Check if there are pending timers
    pub fn has_pending_timers(&self) -> bool {
        !self.inner.timers.borrow().is_empty()
    }

    /// Check if the event loop has any pending work
    pub fn has_pending_work(&self) -> bool {
        self.has_pending_tasks() || self.has_pending_timers()
    }

    /// Number of queued tasks
    pub fn pending_task_count(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    /// Run exactly one queued task, returning false if the queue was empty
    pub fn tick(&self) -> bool {
        // The queue borrow must end before the task runs: tasks schedule more tasks.
        let task = self.inner.tasks.borrow_mut().pop_front();
        match task {
            Some(task) => {
                trace!("running task");
                task();
                self.inner.stats.borrow_mut().total_tasks += 1;
                true
            }
            None => false,
        }
    }

    /// Run queued tasks, including ones queued along the way, until the
    /// queue is empty or the per-tick budget is spent.
    ///
    /// Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let budget = self.inner.config.max_tasks_per_tick;
        let mut count = 0;
        while count < budget && self.tick() {
            count += 1;
        }

        let mut stats = self.inner.stats.borrow_mut();
        if count as u64 > stats.max_tasks_per_tick {
            stats.max_tasks_per_tick = count as u64;
        }
        count
    }

    /// Get the time of the next pending timer
    pub fn next_timer_time(&self) -> Option<u64> {
        self.inner.timers.borrow().iter().map(|t| t.fire_at).min()
    }

    /// Fire the earliest timer.
    ///
    /// With `advance` set, virtual time jumps forward to the timer if it is
    /// not due yet; otherwise only already-due timers fire.
    fn fire_next_timer(&self, advance: bool) -> bool {
        let now = self.current_time();
        let mut timers = self.inner.timers.borrow_mut();
        let next = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| advance || t.fire_at <= now)
            .min_by_key(|(_, t)| (t.fire_at, t.id))
            .map(|(i, _)| i);
        let timer = next.map(|i| timers.remove(i));
        drop(timers);

        match timer {
            Some(timer) => {
                if timer.fire_at > now {
                    self.inner.virtual_time.set(timer.fire_at);
                }
                debug!(timer_id = timer.id, time = timer.fire_at, "timer fired");
                (timer.task)();
                self.inner.stats.borrow_mut().total_timers += 1;
                true
            }
            None => false,
        }
    }

    /// Run the event loop to completion:
    ///   1. Drain queued tasks (budget-limited)
    ///   2. Fire the earliest timer, advancing virtual time if the queue is empty
    ///   3. Repeat from step 1
    ///   4. Stop when no tasks and no timers remain
    ///
    /// Fails if the configured iteration limit is exceeded.
    pub fn run_to_completion(&self) -> Result<RunResult> {
        let mut result = RunResult::default();

        loop {
            if let Some(limit) = self.inner.config.max_iterations {
                if result.iterations >= limit {
                    return Err(Error::operation_limit_exceeded(result.iterations, limit));
                }
            }

            let tick_start = Instant::now();

            result.tasks_processed += self.run_pending();
            let fired = self.fire_next_timer(!self.has_pending_tasks());

            {
                let mut stats = self.inner.stats.borrow_mut();
                let tick_elapsed = tick_start.elapsed().as_millis() as u64;
                if tick_elapsed > stats.longest_tick_ms {
                    stats.longest_tick_ms = tick_elapsed;
                }
                stats.total_ticks += 1;
            }

            if fired {
                result.timers_fired += 1;
                result.iterations += 1;
                continue;
            }

            if !self.has_pending_tasks() {
                break;
            }

            result.iterations += 1;
        }

        result.final_time = self.current_time();
        debug!(
            tasks = result.tasks_processed,
            timers = result.timers_fired,
            final_time = result.final_time,
            "event loop idle"
        );
        Ok(result)
    }

    /// Drop all pending work
    pub fn clear(&self) {
        self.inner.tasks.borrow_mut().clear();
        self.inner.timers.borrow_mut().clear();
    }

    /// Get a snapshot of the statistics
    pub fn stats(&self) -> EventLoopStats {
        self.inner.stats.borrow().clone()
    }

    /// Reset statistics
    pub fn reset_stats(&self) {
        *self.inner.stats.borrow_mut() = EventLoopStats::default();
    }
}

impl Scheduler for EventLoop {
    fn schedule(&self, task: Task) {
        let mut tasks = self.inner.tasks.borrow_mut();
        tasks.push_back(task);
        trace!(queued = tasks.len(), "task scheduled");
    }

    fn future_created(&self) {
        self.inner.stats.borrow_mut().total_futures_created += 1;
    }

    fn future_settled(&self) {
        self.inner.stats.borrow_mut().total_futures_settled += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |label: &'static str| -> Task {
            let log = log_clone.clone();
            Box::new(move || log.borrow_mut().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_event_loop_creation() {
        let el = EventLoop::new();
        assert_eq!(el.current_time(), 0);
        assert!(!el.has_pending_work());
    }

    #[test]
    fn test_schedule_does_not_run_synchronously() {
        let el = EventLoop::new();
        let (log, task) = recorder();

        el.schedule(task("a"));
        assert!(log.borrow().is_empty());
        assert_eq!(el.pending_task_count(), 1);

        assert!(el.tick());
        assert_eq!(*log.borrow(), vec!["a"]);
        assert!(!el.tick());
    }

    #[test]
    fn test_tasks_run_in_fifo_order() {
        let el = EventLoop::new();
        let (log, task) = recorder();

        el.schedule(task("first"));
        el.schedule(task("second"));
        el.schedule(task("third"));
        el.run_pending();

        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_task_scheduled_from_task_goes_to_back() {
        let el = EventLoop::new();
        let (log, task) = recorder();

        let inner_loop = el.clone();
        let nested = task("nested");
        let outer_log = log.clone();
        el.schedule(Box::new(move || {
            outer_log.borrow_mut().push("outer");
            inner_loop.schedule(nested);
        }));
        el.schedule(task("sibling"));
        el.run_pending();

        assert_eq!(*log.borrow(), vec!["outer", "sibling", "nested"]);
    }

    #[test]
    fn test_timer_scheduling() {
        let el = EventLoop::new();
        let (log, task) = recorder();

        let id = el.set_timeout(100, task("timer"));
        assert_eq!(id, 1);
        assert!(el.has_pending_timers());
        assert_eq!(el.next_timer_time(), Some(100));

        // Not due yet
        assert!(!el.fire_next_timer(false));

        el.advance_time(100);
        assert!(el.fire_next_timer(false));
        assert_eq!(*log.borrow(), vec!["timer"]);
    }

    #[test]
    fn test_timer_cancellation() {
        let el = EventLoop::new();
        let (log, task) = recorder();

        let id = el.set_timeout(100, task("timer"));
        assert!(el.clear_timeout(id));
        assert!(!el.clear_timeout(id));

        let result = el.run_to_completion().unwrap();
        assert_eq!(result.timers_fired, 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_run_to_completion_empty() {
        let el = EventLoop::new();
        let result = el.run_to_completion().unwrap();
        assert_eq!(result, RunResult::default());
    }

    #[test]
    fn test_run_to_completion_orders_timers_by_time() {
        let el = EventLoop::new();
        let (log, task) = recorder();

        el.set_timeout(50, task("slow"));
        el.set_timeout(10, task("fast"));
        el.set_timeout(10, task("fast-second"));
        el.schedule(task("immediate"));

        let result = el.run_to_completion().unwrap();
        assert_eq!(*log.borrow(), vec!["immediate", "fast", "fast-second", "slow"]);
        assert_eq!(result.tasks_processed, 1);
        assert_eq!(result.timers_fired, 3);
        assert_eq!(result.final_time, 50);
    }

    #[test]
    fn test_budget_does_not_advance_time_past_queued_tasks() {
        let el = EventLoop::with_config(EventLoopConfig {
            max_tasks_per_tick: 1,
            max_iterations: None,
        })
        .unwrap();
        let (log, task) = recorder();

        el.set_timeout(5, task("timer"));
        el.schedule(task("a"));
        el.schedule(task("b"));
        el.run_to_completion().unwrap();

        assert_eq!(*log.borrow(), vec!["a", "b", "timer"]);
        assert_eq!(el.stats().max_tasks_per_tick, 1);
    }

    #[test]
    fn test_iteration_limit() {
        let el = EventLoop::with_config(EventLoopConfig {
            max_tasks_per_tick: 10,
            max_iterations: Some(3),
        })
        .unwrap();

        fn reschedule(el: EventLoop) {
            let next = el.clone();
            el.set_timeout(1, Box::new(move || reschedule(next)));
        }
        reschedule(el.clone());

        let err = el.run_to_completion().unwrap_err();
        assert!(matches!(err, Error::ResourceLimitError { .. }));
    }

    #[test]
    fn test_stats_and_clear() {
        let el = EventLoop::new();
        let (_log, task) = recorder();

        el.schedule(task("a"));
        el.schedule(task("b"));
        el.run_to_completion().unwrap();
        assert_eq!(el.stats().total_tasks, 2);

        el.reset_stats();
        assert_eq!(el.stats().total_tasks, 0);

        el.schedule(task("c"));
        el.set_timeout(1, task("d"));
        el.clear();
        assert!(!el.has_pending_work());
    }
}
