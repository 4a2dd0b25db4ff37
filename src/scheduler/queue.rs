use std::collections::VecDeque;

use crate::scheduler::task::Task;

/// Insertion-ordered buffer of pending tasks.
///
/// Unbounded: `enqueue` always succeeds. Shared between the dispatcher and
/// the recovery manager behind an `Arc<RwLock<TaskQueue>>`.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task at the tail.
    pub fn enqueue(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Remove and return the oldest task, or `None` when empty.
    pub fn dequeue(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Append every task, preserving their relative order.
    pub fn extend(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks.extend(tasks);
    }

    /// Snapshot of pending task ids, oldest first
    pub fn pending_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.iter().any(|t| t.id == task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
