//! Cooperative, time-budgeted task scheduling.
//!
//! One [`WorkScheduler::perform_work`] call runs per display frame. Tasks
//! scheduled while a tick is running land in a future queue and only become
//! eligible on the following tick, unless they ask to begin immediately.

pub mod queue;
pub mod task;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use glimmer_core::{FrameHandle, GlimmerError, GlimmerResult, TimingSource};

pub use queue::WorkQueue;
pub use task::{Budget, TaskCallback, TaskId, WorkTask};

struct SchedulerState<C> {
    present: WorkQueue<C>,
    future: WorkQueue<C>,
    enabled: bool,
    performing_work: bool,
    frame: Option<FrameHandle>,
}

/// Drives queued tasks over a context `C` within a per-tick time budget.
///
/// Cloning yields another handle onto the same queues, so task bodies can
/// schedule follow-up work while the scheduler is running them.
pub struct WorkScheduler<C> {
    state: Rc<RefCell<SchedulerState<C>>>,
    timing: Rc<dyn TimingSource>,
    max_work_time_ms: f64,
}

impl<C> Clone for WorkScheduler<C> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            timing: Rc::clone(&self.timing),
            max_work_time_ms: self.max_work_time_ms,
        }
    }
}

impl<C> fmt::Debug for WorkScheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("WorkScheduler")
            .field("present", &state.present.len())
            .field("future", &state.future.len())
            .field("enabled", &state.enabled)
            .field("performing_work", &state.performing_work)
            .field("max_work_time_ms", &self.max_work_time_ms)
            .finish()
    }
}

impl<C> WorkScheduler<C> {
    /// Create an enabled scheduler.
    pub fn new(timing: Rc<dyn TimingSource>, max_work_time_ms: f64) -> Self {
        Self {
            state: Rc::new(RefCell::new(SchedulerState {
                present: WorkQueue::new(),
                future: WorkQueue::new(),
                enabled: true,
                performing_work: false,
                frame: None,
            })),
            timing,
            max_work_time_ms,
        }
    }

    pub fn timing(&self) -> &Rc<dyn TimingSource> {
        &self.timing
    }

    pub fn is_enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    pub fn is_performing_work(&self) -> bool {
        self.state.borrow().performing_work
    }

    /// Start requesting frames whenever work is queued.
    pub fn enable(&self) {
        self.state.borrow_mut().enabled = true;
        self.update_timer();
    }

    /// Stop requesting frames. Queued tasks are kept.
    pub fn disable(&self) {
        self.state.borrow_mut().enabled = false;
        self.update_timer();
    }

    /// Queue `task`. A task whose id is already queued is not added twice.
    pub fn schedule_task(&self, task: WorkTask<C>) {
        {
            let mut state = self.state.borrow_mut();
            if state.performing_work && !task.begin_immediately {
                state.future.enqueue(task);
            } else {
                state.present.enqueue(task);
            }
        }
        self.update_timer();
    }

    /// Queue a bare callback; its allocation is its identity.
    pub fn schedule_callback(&self, callback: TaskCallback<C>) -> TaskId {
        let task = WorkTask::from_callback(callback);
        let id = task.id;
        self.schedule_task(task);
        id
    }

    /// Remove the task with `id` from both queues, if it has not started.
    pub fn unschedule_task(&self, id: TaskId) -> bool {
        let removed = {
            let mut state = self.state.borrow_mut();
            let from_present = state.present.remove(id);
            let from_future = state.future.remove(id);
            from_present || from_future
        };
        if removed {
            self.update_timer();
        }
        removed
    }

    /// Unschedule any queued copy of `task`, then schedule it afresh.
    pub fn schedule_unique_task(&self, task: WorkTask<C>) {
        {
            let mut state = self.state.borrow_mut();
            state.present.remove(task.id);
            state.future.remove(task.id);
        }
        self.schedule_task(task);
    }

    pub fn is_scheduled_id(&self, id: TaskId) -> bool {
        let state = self.state.borrow();
        state.present.contains(id) || state.future.contains(id)
    }

    /// Number of tasks waiting in the present and future queues.
    pub fn pending_counts(&self) -> (usize, usize) {
        let state = self.state.borrow();
        (state.present.len(), state.future.len())
    }

    /// Run queued tasks until the queue drains or the budget runs out.
    ///
    /// Errors from a task end the tick early and are returned after the
    /// scheduler's own bookkeeping has been restored. Calling this from inside
    /// a running task is an internal error.
    pub fn perform_work(&self, context: &mut C) -> GlimmerResult<()> {
        {
            let mut state = self.state.borrow_mut();
            if state.performing_work {
                return Err(GlimmerError::internal(
                    "perform_work called while already performing work",
                ));
            }
            state.performing_work = true;
            // The frame that invoked us has fired.
            state.frame = None;
        }

        let start = self.timing.now();
        let budget = Budget::new(self.timing.as_ref(), start + self.max_work_time_ms);
        let result = self.run_present_queue(context, &budget);

        {
            let mut state = self.state.borrow_mut();
            state.performing_work = false;
            let SchedulerState {
                present, future, ..
            } = &mut *state;
            present.append(future);
        }
        self.update_timer();

        if let Err(err) = &result {
            tracing::error!("scheduler tick aborted: {}", err);
        }
        result
    }

    fn run_present_queue(&self, context: &mut C, budget: &Budget<'_>) -> GlimmerResult<()> {
        let mut ran = 0usize;
        while budget.remaining_ms() > 0.0 {
            let Some(task) = self.state.borrow_mut().present.dequeue() else {
                break;
            };
            ran += 1;

            let mut done = (task.callback)(&mut *context, budget)?;
            if !task.run_until_done {
                continue;
            }
            while !done && budget.remaining_ms() > 0.0 {
                done = (task.callback)(&mut *context, budget)?;
            }
            if !done {
                tracing::debug!("task {} out of time, resuming next frame", task.id);
                self.state.borrow_mut().future.enqueue(task);
            }
        }
        tracing::trace!(tasks = ran, "scheduler tick finished");
        Ok(())
    }

    /// Arm a frame request when enabled with work queued; cancel it otherwise.
    fn update_timer(&self) {
        let mut state = self.state.borrow_mut();
        let wants_frame = state.enabled && !state.present.is_empty();
        if wants_frame && state.frame.is_none() {
            state.frame = Some(self.timing.request_frame());
            tracing::trace!("scheduler armed frame callback");
        } else if !wants_frame {
            if let Some(handle) = state.frame.take() {
                self.timing.cancel_frame(handle);
                tracing::trace!("scheduler disarmed frame callback");
            }
        }
    }
}
