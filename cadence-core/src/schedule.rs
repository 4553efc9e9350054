//! Schedule artifacts: time blocks, externally supplied blocks, and scores.
//!
//! A `Schedule` is disposable: it is rebuilt on demand and only mutated to
//! toggle a block's completed flag or to attach scores.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Task,
    Break,
    Meal,
    Sleep,
    Exercise,
    Personal,
    Meeting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockOrigin {
    Generated,
    External,
}

/// A fixed block from outside the scheduler (e.g. a calendar meeting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub title: String,
    #[serde(default = "default_external_kind")]
    pub kind: BlockType,
}

fn default_external_kind() -> BlockType {
    BlockType::Meeting
}

impl ExternalBlock {
    pub fn meeting(start: DateTime<Utc>, end: DateTime<Utc>, title: impl Into<String>) -> Self {
        Self {
            start,
            end,
            title: title.into(),
            kind: BlockType::Meeting,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Minutes; always `end - start`.
    pub duration: i64,
    pub kind: BlockType,
    pub title: String,
    pub completed: bool,
    pub origin: BlockOrigin,
    /// Set for generated task blocks.
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub energy_required: Option<u8>,
}

impl TimeBlock {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        kind: BlockType,
        title: impl Into<String>,
        origin: BlockOrigin,
    ) -> Self {
        Self {
            start,
            end,
            duration: (end - start).num_minutes(),
            kind,
            title: title.into(),
            completed: false,
            origin,
            task_id: None,
            energy_required: None,
        }
    }

    pub fn for_task(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        task_id: impl Into<String>,
        title: impl Into<String>,
        energy_required: u8,
    ) -> Self {
        let mut b = Self::new(start, end, BlockType::Task, title, BlockOrigin::Generated);
        b.task_id = Some(task_id.into());
        b.energy_required = Some(energy_required);
        b
    }

    pub fn from_external(ext: &ExternalBlock) -> Self {
        Self::new(ext.start, ext.end, ext.kind, ext.title.clone(), BlockOrigin::External)
    }

    pub fn overlaps(&self, other: &TimeBlock) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Scores on a 0..=100 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleScores {
    pub productivity: f64,
    pub health: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub date: NaiveDate,
    pub blocks: Vec<TimeBlock>,
    pub scores: ScheduleScores,
}

impl Schedule {
    /// Build from unordered blocks; blocks are sorted by (start, end).
    pub fn new(date: NaiveDate, mut blocks: Vec<TimeBlock>) -> Self {
        blocks.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end)));
        Self {
            date,
            blocks,
            scores: ScheduleScores::default(),
        }
    }

    pub fn with_scores(mut self, scores: ScheduleScores) -> Self {
        self.scores = scores;
        self
    }

    /// Invariants: durations match, blocks sorted by start, no overlaps,
    /// scores within 0..=100.
    pub fn validate(&self) -> Result<(), String> {
        for b in &self.blocks {
            if b.end <= b.start {
                return Err(format!("block '{}' has non-positive length", b.title));
            }
            if b.duration != (b.end - b.start).num_minutes() {
                return Err(format!("block '{}' duration does not match its bounds", b.title));
            }
        }
        for pair in self.blocks.windows(2) {
            if pair[1].start < pair[0].start {
                return Err("blocks are not sorted by start".to_string());
            }
            if pair[0].overlaps(&pair[1]) {
                return Err(format!(
                    "blocks '{}' and '{}' overlap",
                    pair[0].title, pair[1].title
                ));
            }
        }
        let s = self.scores;
        for v in [s.productivity, s.health, s.overall] {
            if !(0.0..=100.0).contains(&v) {
                return Err(format!("score {v} is outside 0..=100"));
            }
        }
        Ok(())
    }

    /// Flip the completed flag of the block at `index`, returning the new value.
    pub fn toggle_completed(&mut self, index: usize) -> Option<bool> {
        let block = self.blocks.get_mut(index)?;
        block.completed = !block.completed;
        Some(block.completed)
    }

    pub fn task_blocks(&self) -> impl Iterator<Item = &TimeBlock> {
        self.blocks.iter().filter(|b| b.kind == BlockType::Task)
    }

    pub fn count_kind(&self, kind: BlockType) -> usize {
        self.blocks.iter().filter(|b| b.kind == kind).count()
    }
}
