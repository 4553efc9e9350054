//! TaskBook — the caller's task list, keyed by id.
//!
//! Keeps insertion order so listings are stable across runs. The scheduler
//! never owns this; callers pass `pending()` (or the whole list) in.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, Result};
use crate::recommend::HistoryEntry;
use crate::task::{CompletionFeedback, Task};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaskBook {
    tasks: Vec<Task>,
}

impl TaskBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a persisted list, re-checking ids and task fields.
    pub fn from_tasks(tasks: Vec<Task>) -> Result<Self> {
        let mut book = Self::new();
        for t in tasks {
            book.add(t)?;
        }
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn add(&mut self, task: Task) -> Result<()> {
        task.validate()?;
        if self.get(&task.id).is_some() {
            return Err(CoreError::DuplicateTask(task.id));
        }
        self.tasks.push(task);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Result<Task> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))?;
        Ok(self.tasks.remove(idx))
    }

    pub fn start(&mut self, id: &str) -> Result<()> {
        self.require_mut(id)?.start()
    }

    pub fn complete(
        &mut self,
        id: &str,
        feedback: CompletionFeedback,
        completed_at: DateTime<Utc>,
    ) -> Result<HistoryEntry> {
        self.require_mut(id)?.complete(feedback, completed_at)
    }

    /// Not yet completed, in insertion order.
    pub fn pending(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| !t.is_completed()).collect()
    }

    pub fn list(&self, include_completed: bool) -> Vec<&Task> {
        if include_completed {
            self.tasks.iter().collect()
        } else {
            self.pending()
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    /// Next free id of the form `t<N>`.
    pub fn next_id(&self) -> String {
        let max = self
            .tasks
            .iter()
            .filter_map(|t| t.id.strip_prefix('t')?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("t{}", max + 1)
    }

    fn require_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.get_mut(id)
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 17, 0, 0).unwrap()
    }

    fn book() -> TaskBook {
        TaskBook::from_tasks(vec![Task::new("t1", "a"), Task::new("t2", "b")]).unwrap()
    }

    #[test]
    fn add_rejects_duplicates() {
        let mut b = book();
        assert_eq!(
            b.add(Task::new("t1", "again")),
            Err(CoreError::DuplicateTask("t1".into()))
        );
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn add_validates() {
        let mut b = TaskBook::new();
        assert!(b.add(Task::new("t1", "x").with_duration(0)).is_err());
        assert!(b.is_empty());
    }

    #[test]
    fn remove_missing_is_not_found() {
        let mut b = book();
        assert_eq!(b.remove("t9"), Err(CoreError::TaskNotFound("t9".into())));
        assert_eq!(b.remove("t1").unwrap().title, "a");
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn complete_twice_fails() {
        let mut b = book();
        b.start("t1").unwrap();
        assert_eq!(b.get("t1").unwrap().status, TaskStatus::InProgress);

        let entry = b.complete("t1", CompletionFeedback::default(), at()).unwrap();
        assert_eq!(entry.task_id, "t1");
        assert_eq!(
            b.complete("t1", CompletionFeedback::default(), at()),
            Err(CoreError::AlreadyCompleted("t1".into()))
        );
    }

    #[test]
    fn bad_satisfaction_leaves_task_open() {
        let mut b = book();
        let fb = CompletionFeedback {
            satisfaction: Some(11),
            ..Default::default()
        };
        assert_eq!(
            b.complete("t2", fb, at()),
            Err(CoreError::InvalidSatisfaction { value: 11 })
        );
        assert_eq!(b.get("t2").unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn pending_and_list() {
        let mut b = book();
        b.complete("t1", CompletionFeedback::default(), at()).unwrap();
        let pending: Vec<&str> = b.pending().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(pending, vec!["t2"]);
        assert_eq!(b.list(true).len(), 2);
        assert_eq!(b.list(false).len(), 1);
    }

    #[test]
    fn next_id_skips_used() {
        let mut b = book();
        b.add(Task::new("custom", "c")).unwrap();
        assert_eq!(b.next_id(), "t3");
        assert_eq!(TaskBook::new().next_id(), "t1");
    }
}
