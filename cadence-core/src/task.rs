//! Task model and its status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{check_energy, check_satisfaction, CoreError, Result};
use crate::recommend::HistoryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Ranking weight used by the scheduler: urgent > high > medium > low.
    pub fn weight(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    DeepWork,
    Creative,
    Meetings,
    Administrative,
    Routine,
    Learning,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::DeepWork,
        Category::Creative,
        Category::Meetings,
        Category::Administrative,
        Category::Routine,
        Category::Learning,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::DeepWork => "deep_work",
            Category::Creative => "creative",
            Category::Meetings => "meetings",
            Category::Administrative => "administrative",
            Category::Routine => "routine",
            Category::Learning => "learning",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let norm = s.trim().to_lowercase().replace('-', "_");
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == norm)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        f.pad(s)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(format!("unknown priority '{s}'")),
        }
    }
}

/// Actuals reported by the user when a task is marked complete.
///
/// Missing actuals fall back to the task's own estimates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionFeedback {
    pub actual_duration: Option<u32>,
    pub actual_energy: Option<u8>,
    pub satisfaction: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,

    pub priority: Priority,
    pub category: Category,
    pub status: TaskStatus,

    /// Minutes.
    pub estimated_duration: u32,

    /// 0-100.
    pub energy_required: u8,

    /// Optional hard deadline (UTC).
    pub deadline: Option<DateTime<Utc>>,

    #[serde(default)]
    pub actual_duration: Option<u32>,
    #[serde(default)]
    pub actual_energy: Option<u8>,
    /// 1-10.
    #[serde(default)]
    pub satisfaction: Option<u8>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            priority: Priority::Medium,
            category: Category::Routine,
            status: TaskStatus::Pending,
            estimated_duration: 30,
            energy_required: 50,
            deadline: None,
            actual_duration: None,
            actual_energy: None,
            satisfaction: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.estimated_duration = minutes;
        self
    }

    pub fn with_energy(mut self, energy: u8) -> Self {
        self.energy_required = energy;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Boundary validation; the scheduler assumes tasks passed this.
    pub fn validate(&self) -> Result<()> {
        if self.estimated_duration == 0 {
            return Err(CoreError::InvalidDuration {
                task_id: self.id.clone(),
                minutes: 0,
            });
        }
        check_energy(self.energy_required.into())?;
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// pending -> in_progress. Starting an in-progress task is a no-op.
    pub fn start(&mut self) -> Result<()> {
        match self.status {
            TaskStatus::Completed => Err(CoreError::AlreadyCompleted(self.id.clone())),
            _ => {
                self.status = TaskStatus::InProgress;
                Ok(())
            }
        }
    }

    /// Mark complete, attach feedback, and produce the history sample for it.
    pub fn complete(
        &mut self,
        feedback: CompletionFeedback,
        completed_at: DateTime<Utc>,
    ) -> Result<HistoryEntry> {
        if self.is_completed() {
            return Err(CoreError::AlreadyCompleted(self.id.clone()));
        }

        let actual_duration = feedback.actual_duration.unwrap_or(self.estimated_duration);
        if actual_duration == 0 {
            return Err(CoreError::InvalidDuration {
                task_id: self.id.clone(),
                minutes: 0,
            });
        }
        let actual_energy = check_energy(
            feedback
                .actual_energy
                .unwrap_or(self.energy_required)
                .into(),
        )?;
        let satisfaction = feedback
            .satisfaction
            .map(|s| check_satisfaction(s.into()))
            .transpose()?;

        self.status = TaskStatus::Completed;
        self.actual_duration = Some(actual_duration);
        self.actual_energy = Some(actual_energy);
        self.satisfaction = satisfaction;

        Ok(HistoryEntry {
            task_id: self.id.clone(),
            category: self.category,
            estimated_duration: self.estimated_duration,
            actual_duration,
            energy_required: self.energy_required,
            actual_energy,
            satisfaction,
            completed_at,
        })
    }
}
