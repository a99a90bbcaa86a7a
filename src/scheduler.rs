//! Cooperative Task Scheduler
//!
//! A fixed-capacity, ordered table of polled tasks run from an infinite main
//! loop. Every pass calls [`Task::iteration`] on each task in registration
//! order, then one application hook. Nothing is preempted: a task that blocks
//! stalls the whole board.
//!
//! Timer tasks are ordinary tasks that only fire when their due tick has been
//! reached. They are additionally listed in a second table so that the
//! scheduler can rebase their due times whenever it restarts the tick timer.

use heapless::Vec;
use thiserror::Error;

use crate::config::{MAX_TASKS, MAX_TIMER_TASKS, TIMER_WRAP_CEILING};
use crate::timer::{has_reached, TickSource};

/// A unit of work polled once per scheduler pass
pub trait Task {
    /// Do a bounded amount of work and return promptly
    fn iteration(&mut self);

    /// The tick timer was restarted after counting `delta` ticks
    ///
    /// Only called for tasks registered with
    /// [`Scheduler::register_timer_task`].
    fn on_timer_shift(&mut self, _delta: u32) {}
}

/// Scheduler registration errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The task table is at capacity
    #[error("task table full")]
    TaskTableFull,
    /// The timer task table is at capacity
    #[error("timer task table full")]
    TimerTableFull,
    /// The handle does not refer to a registered task
    #[error("unknown task handle")]
    UnknownTask,
}

/// Handle to a registered task (its index in the task table)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskHandle(usize);

impl TaskHandle {
    /// Position of the task in the polling order
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Fixed-capacity cooperative scheduler
pub struct Scheduler<'a, T: TickSource, const N: usize = MAX_TASKS, const M: usize = MAX_TIMER_TASKS> {
    timer: &'a T,
    tasks: Vec<&'a mut dyn Task, N>,
    timer_tasks: Vec<usize, M>,
    wrap_ceiling: u32,
}

impl<'a, T: TickSource, const N: usize, const M: usize> Scheduler<'a, T, N, M> {
    /// Create an empty scheduler using the default wrap ceiling
    #[must_use]
    pub fn new(timer: &'a T) -> Self {
        Self::with_wrap_ceiling(timer, TIMER_WRAP_CEILING)
    }

    /// Create an empty scheduler that restarts the timer at `wrap_ceiling` ticks
    #[must_use]
    pub fn with_wrap_ceiling(timer: &'a T, wrap_ceiling: u32) -> Self {
        Self {
            timer,
            tasks: Vec::new(),
            timer_tasks: Vec::new(),
            wrap_ceiling,
        }
    }

    /// Append a task to the polling order
    ///
    /// # Errors
    ///
    /// [`SchedulerError::TaskTableFull`] if `N` tasks are already registered.
    pub fn register_task(&mut self, task: &'a mut dyn Task) -> Result<TaskHandle, SchedulerError> {
        let index = self.tasks.len();
        self.tasks
            .push(task)
            .map_err(|_| SchedulerError::TaskTableFull)?;
        Ok(TaskHandle(index))
    }

    /// Mark an already registered task as a timer task
    ///
    /// Timer tasks receive [`Task::on_timer_shift`] whenever the scheduler
    /// restarts the tick timer. No deduplication is done.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::UnknownTask`] for a handle from another scheduler,
    /// [`SchedulerError::TimerTableFull`] if `M` timer tasks are registered.
    pub fn register_timer_task(&mut self, handle: TaskHandle) -> Result<(), SchedulerError> {
        if handle.0 >= self.tasks.len() {
            return Err(SchedulerError::UnknownTask);
        }
        self.timer_tasks
            .push(handle.0)
            .map_err(|_| SchedulerError::TimerTableFull)
    }

    /// Register a task and mark it as a timer task in one step
    ///
    /// # Errors
    ///
    /// Same as [`Self::register_task`] and [`Self::register_timer_task`].
    pub fn register_timer(&mut self, task: &'a mut dyn Task) -> Result<TaskHandle, SchedulerError> {
        let handle = self.register_task(task)?;
        self.register_timer_task(handle)?;
        Ok(handle)
    }

    /// Number of registered tasks
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Number of registered timer tasks
    #[must_use]
    pub fn timer_task_count(&self) -> usize {
        self.timer_tasks.len()
    }

    /// Run one pass of the main loop
    ///
    /// Rebases timer tasks if the timer passed the wrap ceiling, polls every
    /// task in registration order, then calls `hook` once.
    pub fn iterate<F: FnMut()>(&mut self, mut hook: F) {
        let now = self.timer.count();
        if now >= self.wrap_ceiling {
            self.timer.restart();
            for &index in &self.timer_tasks {
                self.tasks[index].on_timer_shift(now);
            }
        }

        for task in &mut self.tasks {
            task.iteration();
        }

        hook();
    }

    /// Run the main loop forever
    pub fn run<F: FnMut()>(&mut self, mut hook: F) -> ! {
        loop {
            self.iterate(&mut hook);
        }
    }
}

/// Callback invoked when a timer task comes due
pub trait TimerHandler {
    /// The due time was reached
    fn on_timer(&mut self);
}

impl<F: FnMut()> TimerHandler for F {
    fn on_timer(&mut self) {
        self();
    }
}

/// A task that runs its handler at a fixed period
///
/// The next due time always advances by exactly one period from the previous
/// due time, never from the time the task happened to be polled, so the due
/// times form an arithmetic progression regardless of polling jitter.
pub struct TimerTask<'t, T: TickSource, H: TimerHandler> {
    timer: &'t T,
    target: u32,
    period: u32,
    handler: H,
}

impl<'t, T: TickSource, H: TimerHandler> TimerTask<'t, T, H> {
    /// Create a timer task first due `initial_offset` ticks from now
    pub fn new(timer: &'t T, initial_offset: u32, period: u32, handler: H) -> Self {
        Self {
            timer,
            target: timer.count().wrapping_add(initial_offset),
            period,
            handler,
        }
    }

    /// Re-arm the timer so it is next due one period from now
    pub fn restart(&mut self) {
        self.target = self.timer.count().wrapping_add(self.period);
    }

    /// Absolute tick at which the handler next runs
    #[must_use]
    pub const fn next_due(&self) -> u32 {
        self.target
    }

    /// Ticks between runs
    #[must_use]
    pub const fn period(&self) -> u32 {
        self.period
    }

    /// Access the handler
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access to the handler
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

impl<T: TickSource, H: TimerHandler> Task for TimerTask<'_, T, H> {
    fn iteration(&mut self) {
        if has_reached(self.timer.count(), self.target) {
            self.handler.on_timer();
            self.target = self.target.wrapping_add(self.period);
        }
    }

    fn on_timer_shift(&mut self, delta: u32) {
        self.target = self.target.saturating_sub(delta);
    }
}
