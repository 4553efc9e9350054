//! Recommendation engine: rolling per-category statistics over completed tasks.
//!
//! The history log is append-only. Each completion updates its category
//! aggregate in O(1) (Welford running mean/variance); nothing is rescanned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::task::{Category, Priority, Task, TaskStatus};

/// One completed task: estimates vs actuals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub task_id: String,
    pub category: Category,
    pub estimated_duration: u32,
    pub actual_duration: u32,
    pub energy_required: u8,
    pub actual_energy: u8,
    #[serde(default)]
    pub satisfaction: Option<u8>,
    pub completed_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Positive when the task ran longer than estimated.
    pub fn duration_overrun(&self) -> i64 {
        i64::from(self.actual_duration) - i64::from(self.estimated_duration)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStat {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStat {
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample variance; `None` below two samples.
    pub fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }

    pub fn stddev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryAggregate {
    pub duration: RunningStat,
    pub energy: RunningStat,
    pub satisfaction: RunningStat,
    pub overrun: RunningStat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryInsight {
    pub category: Category,
    pub samples: u64,
    pub mean_actual_duration: f64,
    pub duration_stddev: Option<f64>,
    pub mean_overrun: f64,
    pub mean_energy: f64,
    pub mean_satisfaction: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Overrun {
    pub category: Category,
    pub mean_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightReport {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub completion_rate: f64,
    pub avg_task_duration: f64,
    pub high_priority_pending: usize,
    pub mean_satisfaction: Option<f64>,
    pub largest_overrun: Option<Overrun>,
    pub categories: Vec<CategoryInsight>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    history: Vec<HistoryEntry>,
    aggregates: BTreeMap<Category, CategoryAggregate>,
    satisfaction: RunningStat,
}

impl RecommendationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild aggregates from a persisted log.
    pub fn from_history(entries: Vec<HistoryEntry>) -> Self {
        let mut engine = Self::new();
        for e in entries {
            engine.record_completion(e);
        }
        engine
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn aggregate(&self, category: Category) -> Option<&CategoryAggregate> {
        self.aggregates.get(&category)
    }

    pub fn record_completion(&mut self, entry: HistoryEntry) {
        let agg = self.aggregates.entry(entry.category).or_default();
        agg.duration.push(f64::from(entry.actual_duration));
        agg.energy.push(f64::from(entry.actual_energy));
        agg.overrun.push(entry.duration_overrun() as f64);
        if let Some(s) = entry.satisfaction {
            agg.satisfaction.push(f64::from(s));
            self.satisfaction.push(f64::from(s));
        }
        debug!(
            task_id = %entry.task_id,
            category = %entry.category,
            samples = agg.duration.count(),
            "recorded completion"
        );
        self.history.push(entry);
    }

    /// Rolling mean actual duration for the category, else `fallback`.
    pub fn estimate_duration(&self, category: Category, fallback: u32) -> u32 {
        self.aggregates
            .get(&category)
            .and_then(|a| a.duration.mean())
            .map(|m| (m.round() as u32).max(1))
            .unwrap_or(fallback)
    }

    /// Rolling mean actual energy for the category, else `fallback`.
    pub fn estimate_energy(&self, category: Category, fallback: u8) -> u8 {
        self.aggregates
            .get(&category)
            .and_then(|a| a.energy.mean())
            .map(|m| m.round().clamp(0.0, 100.0) as u8)
            .unwrap_or(fallback)
    }

    /// Default energy requirement when the user gives none.
    pub fn suggest_energy(priority: Priority, duration_minutes: u32) -> u8 {
        match priority {
            Priority::Urgent => 80,
            Priority::High if duration_minutes > 60 => 80,
            Priority::High | Priority::Medium => 55,
            Priority::Low => 30,
        }
    }

    pub fn insights(&self, tasks: &[Task]) -> InsightReport {
        let total_tasks = tasks.len();
        let completed_tasks = tasks.iter().filter(|t| t.is_completed()).count();
        let pending_tasks = total_tasks - completed_tasks;
        let completion_rate = if total_tasks == 0 {
            0.0
        } else {
            completed_tasks as f64 / total_tasks as f64
        };
        let avg_task_duration = if total_tasks == 0 {
            0.0
        } else {
            tasks.iter().map(|t| f64::from(t.estimated_duration)).sum::<f64>() / total_tasks as f64
        };
        let high_priority_pending = tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Completed && t.priority >= Priority::High)
            .count();

        let categories: Vec<CategoryInsight> = self
            .aggregates
            .iter()
            .filter_map(|(&category, a)| {
                Some(CategoryInsight {
                    category,
                    samples: a.duration.count(),
                    mean_actual_duration: a.duration.mean()?,
                    duration_stddev: a.duration.stddev(),
                    mean_overrun: a.overrun.mean()?,
                    mean_energy: a.energy.mean()?,
                    mean_satisfaction: a.satisfaction.mean(),
                })
            })
            .collect();

        // BTreeMap order makes the earliest category win ties.
        let mut largest_overrun: Option<Overrun> = None;
        for c in &categories {
            if c.mean_overrun <= 0.0 {
                continue;
            }
            if largest_overrun.is_none_or(|o| c.mean_overrun > o.mean_minutes) {
                largest_overrun = Some(Overrun {
                    category: c.category,
                    mean_minutes: c.mean_overrun,
                });
            }
        }

        let mut recommendations = Vec::new();
        if high_priority_pending > 3 {
            recommendations.push(
                "You have multiple high-priority tasks pending. Consider focusing on these first."
                    .to_string(),
            );
        }
        if completion_rate < 0.5 && total_tasks > 5 {
            recommendations.push(
                "Your completion rate is below 50%. Consider breaking down large tasks into smaller ones."
                    .to_string(),
            );
        }
        if let Some(o) = largest_overrun {
            recommendations.push(format!(
                "You consistently underestimate {} tasks by about {:.0} minutes.",
                o.category, o.mean_minutes
            ));
        }
        if let Some(s) = self.satisfaction.mean() {
            if s < 5.0 && self.satisfaction.count() >= 3 {
                recommendations.push(
                    "Satisfaction has been low lately. Try scheduling one task you enjoy each day."
                        .to_string(),
                );
            }
        }

        InsightReport {
            total_tasks,
            completed_tasks,
            pending_tasks,
            completion_rate,
            avg_task_duration,
            high_priority_pending,
            mean_satisfaction: self.satisfaction.mean(),
            largest_overrun,
            categories,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: &str, category: Category, est: u32, actual: u32, sat: Option<u8>) -> HistoryEntry {
        HistoryEntry {
            task_id: id.to_string(),
            category,
            estimated_duration: est,
            actual_duration: actual,
            energy_required: 60,
            actual_energy: 70,
            satisfaction: sat,
            completed_at: Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap(),
        }
    }

    #[test]
    fn fallback_until_first_sample() {
        let mut e = RecommendationEngine::new();
        assert_eq!(e.estimate_duration(Category::Learning, 45), 45);
        e.record_completion(entry("a", Category::Learning, 45, 60, None));
        assert_eq!(e.estimate_duration(Category::Learning, 45), 60);
        // other categories still fall back
        assert_eq!(e.estimate_duration(Category::Routine, 15), 15);
    }

    #[test]
    fn rolling_mean_and_energy() {
        let mut e = RecommendationEngine::new();
        e.record_completion(entry("a", Category::DeepWork, 60, 90, Some(7)));
        e.record_completion(entry("b", Category::DeepWork, 60, 60, Some(9)));
        assert_eq!(e.estimate_duration(Category::DeepWork, 10), 75);
        assert_eq!(e.estimate_energy(Category::DeepWork, 10), 70);
        assert_eq!(e.estimate_energy(Category::Creative, 10), 10);
    }

    #[test]
    fn running_stat_matches_batch_variance() {
        let mut s = RunningStat::default();
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            s.push(x);
        }
        assert_eq!(s.mean(), Some(5.0));
        assert!((s.variance().unwrap() - 32.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn insights_find_underestimated_category() {
        let mut e = RecommendationEngine::new();
        e.record_completion(entry("a", Category::Administrative, 30, 40, Some(6)));
        e.record_completion(entry("b", Category::DeepWork, 60, 100, Some(8)));
        e.record_completion(entry("c", Category::Routine, 30, 20, None));

        let mut done = Task::new("b", "x");
        done.status = TaskStatus::Completed;
        let tasks = vec![done, Task::new("d", "y")];

        let report = e.insights(&tasks);
        assert_eq!(report.completion_rate, 0.5);
        assert_eq!(report.mean_satisfaction, Some(7.0));
        let o = report.largest_overrun.unwrap();
        assert_eq!(o.category, Category::DeepWork);
        assert_eq!(o.mean_minutes, 40.0);
        assert!(report.recommendations.iter().any(|r| r.contains("deep_work")));
        assert_eq!(report.categories.len(), 3);
    }

    #[test]
    fn no_overrun_when_everything_is_early() {
        let mut e = RecommendationEngine::new();
        e.record_completion(entry("a", Category::Routine, 30, 20, None));
        assert!(e.insights(&[]).largest_overrun.is_none());
        assert_eq!(e.insights(&[]).completion_rate, 0.0);
    }

    #[test]
    fn high_priority_backlog_is_flagged() {
        let e = RecommendationEngine::new();
        let tasks: Vec<Task> = (0..4)
            .map(|i| Task::new(format!("t{i}"), "x").with_priority(Priority::Urgent))
            .collect();
        let report = e.insights(&tasks);
        assert_eq!(report.high_priority_pending, 4);
        assert!(report.recommendations[0].contains("high-priority"));
    }

    #[test]
    fn from_history_rebuilds_state() {
        let log = vec![
            entry("a", Category::Creative, 30, 50, None),
            entry("b", Category::Creative, 30, 30, None),
        ];
        let e = RecommendationEngine::from_history(log.clone());
        assert_eq!(e.history(), log.as_slice());
        assert_eq!(e.estimate_duration(Category::Creative, 1), 40);
    }

    #[test]
    fn suggested_energy_follows_priority() {
        assert_eq!(RecommendationEngine::suggest_energy(Priority::Urgent, 10), 80);
        assert_eq!(RecommendationEngine::suggest_energy(Priority::High, 90), 80);
        assert_eq!(RecommendationEngine::suggest_energy(Priority::High, 30), 55);
        assert_eq!(RecommendationEngine::suggest_energy(Priority::Low, 30), 30);
    }
}
