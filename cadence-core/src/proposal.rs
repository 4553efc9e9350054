//! Task proposals produced at the chat boundary.
//!
//! The wire schema is strict: unknown fields are rejected so a malformed
//! reply never turns into a half-understood task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{check_energy, CoreError, Result};
use crate::recommend::RecommendationEngine;
use crate::task::{Category, Priority, Task};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskProposal {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Category,
    /// Minutes. Signed so negative values are reported, not mis-parsed.
    pub estimated_duration: i64,
    #[serde(default)]
    pub energy_required: Option<i64>,
    /// RFC 3339.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

impl TaskProposal {
    /// Parse a JSON proposal body.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| CoreError::InvalidProposal(e.to_string()))
    }

    /// Validate and turn into a pending task. Missing energy falls back to a
    /// priority-based suggestion.
    pub fn into_task(self, id: impl Into<String>) -> Result<Task> {
        let id = id.into();
        let title = self.title.trim();
        if title.is_empty() {
            return Err(CoreError::InvalidProposal("title is empty".into()));
        }
        if self.estimated_duration <= 0 || self.estimated_duration > i64::from(u32::MAX) {
            return Err(CoreError::InvalidDuration {
                task_id: id,
                minutes: self.estimated_duration,
            });
        }
        let minutes = self.estimated_duration as u32;
        let energy = match self.energy_required {
            Some(e) => check_energy(e)?,
            None => RecommendationEngine::suggest_energy(self.priority, minutes),
        };

        let mut task = Task::new(id, title)
            .with_priority(self.priority)
            .with_category(self.category)
            .with_duration(minutes)
            .with_energy(energy)
            .with_description(self.description.unwrap_or_default());
        task.deadline = self.deadline;
        task.validate()?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    #[test]
    fn full_proposal_becomes_task() {
        let p = TaskProposal::from_json(
            r#"{
                "title": "Draft Q3 plan",
                "priority": "high",
                "category": "deep_work",
                "estimated_duration": 90,
                "energy_required": 80,
                "deadline": "2026-03-05T17:00:00Z"
            }"#,
        )
        .unwrap();
        let t = p.into_task("t7").unwrap();
        assert_eq!(t.id, "t7");
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.category, Category::DeepWork);
        assert_eq!(t.energy_required, 80);
        assert!(t.deadline.is_some());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = TaskProposal::from_json(
            r#"{"title":"x","priority":"low","category":"routine","estimated_duration":10,"mood":"great"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidProposal(_)));
    }

    #[test]
    fn missing_energy_is_suggested() {
        let p = TaskProposal::from_json(
            r#"{"title":"file expenses","priority":"low","category":"administrative","estimated_duration":20}"#,
        )
        .unwrap();
        assert_eq!(p.into_task("t1").unwrap().energy_required, 30);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let base = TaskProposal {
            title: "x".into(),
            description: None,
            priority: Priority::Medium,
            category: Category::Routine,
            estimated_duration: -5,
            energy_required: None,
            deadline: None,
        };
        assert!(matches!(
            base.clone().into_task("t1"),
            Err(CoreError::InvalidDuration { minutes: -5, .. })
        ));

        let loud = TaskProposal {
            estimated_duration: 30,
            energy_required: Some(140),
            ..base.clone()
        };
        assert_eq!(loud.into_task("t1"), Err(CoreError::InvalidEnergy { value: 140 }));

        let blank = TaskProposal {
            title: "   ".into(),
            estimated_duration: 30,
            ..base
        };
        assert!(matches!(blank.into_task("t1"), Err(CoreError::InvalidProposal(_))));
    }
}
