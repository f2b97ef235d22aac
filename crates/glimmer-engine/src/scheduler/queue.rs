use std::collections::{HashSet, VecDeque};

use super::task::{TaskId, WorkTask};

/// FIFO of tasks, de-duplicated by [`TaskId`].
pub struct WorkQueue<C> {
    tasks: VecDeque<WorkTask<C>>,
    ids: HashSet<TaskId>,
}

impl<C> Default for WorkQueue<C> {
    fn default() -> Self {
        Self {
            tasks: VecDeque::new(),
            ids: HashSet::new(),
        }
    }
}

impl<C> WorkQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.ids.contains(&id)
    }

    /// Append `task` unless a task with the same id is already queued.
    /// Returns whether the task was added.
    pub fn enqueue(&mut self, task: WorkTask<C>) -> bool {
        if !self.ids.insert(task.id) {
            return false;
        }
        self.tasks.push_back(task);
        true
    }

    pub fn dequeue(&mut self) -> Option<WorkTask<C>> {
        let task = self.tasks.pop_front()?;
        self.ids.remove(&task.id);
        Some(task)
    }

    /// Remove the task with `id`. Returns whether one was queued.
    pub fn remove(&mut self, id: TaskId) -> bool {
        if !self.ids.remove(&id) {
            return false;
        }
        self.tasks.retain(|task| task.id != id);
        true
    }

    /// Move every task of `other` to the back of this queue, keeping order.
    pub fn append(&mut self, other: &mut WorkQueue<C>) {
        while let Some(task) = other.dequeue() {
            self.enqueue(task);
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.iter().map(|task| task.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::task::Budget;
    use glimmer_core::GlimmerResult;
    use std::rc::Rc;

    fn noop(_: &mut (), _: &Budget<'_>) -> GlimmerResult<bool> {
        Ok(true)
    }

    fn task(name: &'static str) -> WorkTask<()> {
        WorkTask::new(TaskId::Named(name), Rc::new(noop))
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = WorkQueue::new();
        queue.enqueue(task("a"));
        queue.enqueue(task("b"));
        queue.enqueue(task("c"));
        let order: Vec<_> = std::iter::from_fn(|| queue.dequeue().map(|t| t.id)).collect();
        assert_eq!(
            order,
            vec![TaskId::Named("a"), TaskId::Named("b"), TaskId::Named("c")]
        );
    }

    #[test]
    fn test_duplicate_ids_are_ignored() {
        let mut queue = WorkQueue::new();
        assert!(queue.enqueue(task("a")));
        assert!(!queue.enqueue(task("a")));
        assert_eq!(queue.len(), 1);

        queue.dequeue();
        assert!(queue.enqueue(task("a")));
    }

    #[test]
    fn test_remove() {
        let mut queue = WorkQueue::new();
        queue.enqueue(task("a"));
        queue.enqueue(task("b"));
        assert!(queue.remove(TaskId::Named("a")));
        assert!(!queue.remove(TaskId::Named("a")));
        assert!(!queue.contains(TaskId::Named("a")));
        assert_eq!(queue.ids().collect::<Vec<_>>(), vec![TaskId::Named("b")]);
    }

    #[test]
    fn test_append_drops_duplicates() {
        let mut present = WorkQueue::new();
        let mut future = WorkQueue::new();
        present.enqueue(task("a"));
        future.enqueue(task("a"));
        future.enqueue(task("b"));
        present.append(&mut future);
        assert!(future.is_empty());
        assert_eq!(
            present.ids().collect::<Vec<_>>(),
            vec![TaskId::Named("a"), TaskId::Named("b")]
        );
    }
}
