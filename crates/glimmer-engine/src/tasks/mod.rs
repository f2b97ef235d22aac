//! Task bodies run by the scheduler over the [`Coordinator`](crate::coordinator::Coordinator).
//!
//! Each task scans only its own index range and re-checks the real phase of
//! every sprite it visits. Tasks hand sprites to one another by expanding the
//! next task's range and queuing it:
//!
//! `assign_waiting -> run_callbacks -> rebase -> texture_sync -> removal`

mod assign_waiting;
mod draw;
mod rebase;
mod removal;
mod run_callbacks;
mod texture_sync;

use crate::scheduler::TaskId;

pub use assign_waiting::assign_waiting;
pub use draw::draw;
pub use hit_test::{hit_test, HitTestArea, HitTestResult};
pub use rebase::rebase;
pub use removal::removal;
pub use run_callbacks::run_callbacks;
pub use texture_sync::texture_sync;

pub const ASSIGN_WAITING: TaskId = TaskId::Named("assign_waiting");
pub const RUN_CALLBACKS: TaskId = TaskId::Named("run_callbacks");
pub const REBASE: TaskId = TaskId::Named("rebase");
pub const TEXTURE_SYNC: TaskId = TaskId::Named("texture_sync");
pub const REMOVAL: TaskId = TaskId::Named("removal");
pub const DRAW: TaskId = TaskId::Named("draw");

/// Counts loop steps and checks the budget every `interval` steps.
pub(crate) struct StepCounter {
    interval: usize,
    steps: usize,
}

impl StepCounter {
    pub(crate) fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            steps: 0,
        }
    }

    /// Record one step; true when this step lands on a check.
    pub(crate) fn tick(&mut self) -> bool {
        self.steps += 1;
        self.steps % self.interval == 0
    }

    pub(crate) fn steps(&self) -> usize {
        self.steps
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    use glimmer_core::{FrameHandle, TimingSource};

    use crate::scheduler::Budget;

    /// Clock that moves `step_ms` forward every time it is read.
    pub(crate) struct StepClock {
        now: Cell<f64>,
        step_ms: f64,
    }

    impl StepClock {
        pub(crate) fn new(step_ms: f64) -> Self {
            Self {
                now: Cell::new(0.0),
                step_ms,
            }
        }

        /// A budget that survives `checks` reads and runs out on the next one.
        pub(crate) fn budget(&self, checks: usize) -> Budget<'_> {
            Budget::new(self, self.now.get() + (checks as f64 - 0.5) * self.step_ms)
        }
    }

    impl TimingSource for StepClock {
        fn now(&self) -> f64 {
            let now = self.now.get();
            self.now.set(now + self.step_ms);
            now
        }

        fn request_frame(&self) -> FrameHandle {
            FrameHandle(0)
        }

        fn cancel_frame(&self, _handle: FrameHandle) {}
    }

    #[test]
    fn test_step_clock_budget_runs_out_after_checks() {
        let clock = StepClock::new(1.0);
        let budget = clock.budget(2);
        assert!(!budget.is_exhausted());
        assert!(!budget.is_exhausted());
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_step_counter_checks_on_interval() {
        let mut counter = StepCounter::new(3);
        let checks: Vec<bool> = (0..7).map(|_| counter.tick()).collect();
        assert_eq!(checks, vec![false, false, true, false, false, true, false]);
        assert_eq!(counter.steps(), 7);
        assert!(StepCounter::new(0).tick());
    }
}
