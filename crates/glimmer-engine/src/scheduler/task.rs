use std::fmt;
use std::rc::Rc;

use glimmer_core::{GlimmerResult, TimingSource};

/// Identity of a scheduled task. At most one task per id is queued at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// A well-known task kind.
    Named(&'static str),
    /// Identity of a callback allocation, for tasks scheduled from bare closures.
    Callback(usize),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Named(name) => f.write_str(name),
            TaskId::Callback(addr) => write!(f, "callback@{:#x}", addr),
        }
    }
}

/// Time left in the current scheduler tick.
pub struct Budget<'a> {
    timing: Option<&'a dyn TimingSource>,
    deadline_ms: f64,
}

impl<'a> Budget<'a> {
    pub fn new(timing: &'a dyn TimingSource, deadline_ms: f64) -> Self {
        Self {
            timing: Some(timing),
            deadline_ms,
        }
    }

    /// A budget that never runs out.
    pub fn unlimited() -> Self {
        Self {
            timing: None,
            deadline_ms: f64::INFINITY,
        }
    }

    /// Milliseconds left before the deadline. Negative once overrun.
    pub fn remaining_ms(&self) -> f64 {
        match self.timing {
            Some(timing) => self.deadline_ms - timing.now(),
            None => f64::INFINITY,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_ms() <= 0.0
    }
}

/// Task body. Returns `Ok(true)` when its work is finished.
pub type TaskCallback<C> = Rc<dyn Fn(&mut C, &Budget<'_>) -> GlimmerResult<bool>>;

/// A deferrable, resumable unit of work over a context `C`.
pub struct WorkTask<C> {
    pub id: TaskId,
    pub callback: TaskCallback<C>,
    /// Keep invoking the callback within a tick until it reports completion.
    pub run_until_done: bool,
    /// When scheduled mid-tick, join the present queue instead of waiting for the next tick.
    pub begin_immediately: bool,
}

impl<C> WorkTask<C> {
    pub fn new(id: TaskId, callback: TaskCallback<C>) -> Self {
        Self {
            id,
            callback,
            run_until_done: false,
            begin_immediately: false,
        }
    }

    /// Build a task whose identity is its callback allocation.
    pub fn from_callback(callback: TaskCallback<C>) -> Self {
        let id = TaskId::Callback(Rc::as_ptr(&callback) as *const () as usize);
        Self::new(id, callback)
    }

    pub fn run_until_done(mut self) -> Self {
        self.run_until_done = true;
        self
    }

    pub fn begin_immediately(mut self) -> Self {
        self.begin_immediately = true;
        self
    }
}

impl<C> Clone for WorkTask<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Rc::clone(&self.callback),
            run_until_done: self.run_until_done,
            begin_immediately: self.begin_immediately,
        }
    }
}

impl<C> fmt::Debug for WorkTask<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkTask")
            .field("id", &self.id)
            .field("run_until_done", &self.run_until_done)
            .field("begin_immediately", &self.begin_immediately)
            .finish()
    }
}
