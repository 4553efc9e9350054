//! cadence-core: energy-aware daily scheduling.
//!
//! Pure and synchronous: callers supply tasks, fixed blocks, an energy
//! profile and a work window; the core never reads the clock or the disk.

pub mod energy;
pub mod error;
pub mod proposal;
pub mod recommend;
pub mod schedule;
pub mod scheduler;
pub mod scoring;
pub mod task;
pub mod task_book;
pub mod time;

pub use energy::{EnergyPoint, EnergyProfile, DEEP_WORK_THRESHOLD};
pub use error::{CoreError, Result};
pub use proposal::TaskProposal;
pub use recommend::{
    CategoryInsight, HistoryEntry, InsightReport, Overrun, RecommendationEngine, RunningStat,
};
pub use schedule::{BlockOrigin, BlockType, ExternalBlock, Schedule, ScheduleScores, TimeBlock};
pub use scheduler::{
    DynamicScheduler, EstimateSource, RawEstimates, ScheduleOutcome, ScheduleWarning,
    SchedulerConfig, UnscheduledReason, UnscheduledTask,
};
pub use scoring::{
    energy_alignment, health_score, overall_score, productivity_score, score_schedule, DayContext,
    ScoreWeights,
};
pub use task::{Category, CompletionFeedback, Priority, Task, TaskStatus};
pub use task_book::TaskBook;
pub use time::{parse_local_deadline_to_utc, parse_timezone, WorkWindow};
