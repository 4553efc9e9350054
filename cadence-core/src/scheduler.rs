//! Dynamic scheduler — greedy, deterministic day planner.
//!
//! Algorithm (single pass):
//! 1) reserve external blocks (immovable); drop invalid or overlapping ones with a warning
//! 2) score each task: 2 x priority + energy alignment + deadline urgency
//! 3) sort by score DESC, then deadline ASC (none last), then id ASC
//! 4) place each task at the earliest free start whose interval is long enough
//!    and whose average energy >= required x tolerance
//! 5) tasks that fit nowhere are reported as unscheduled (NoAvailableSlot)
//! 6) after > `break_after_minutes` of continuous task work, reserve a short break
//!
//! Durations and energy come from an `EstimateSource`, so calibrated history
//! estimates replace raw guesses when available. Output depends only on inputs.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, error};

use crate::energy::EnergyProfile;
use crate::error::Result;
use crate::recommend::RecommendationEngine;
use crate::schedule::{BlockOrigin, BlockType, ExternalBlock, Schedule, TimeBlock};
use crate::task::{Category, Task};
use crate::time::WorkWindow;

/// Deadline urgency saturates here (also the value for overdue tasks).
pub const MAX_DEADLINE_URGENCY: f64 = 10.0;
/// `urgency = DEADLINE_URGENCY_HORIZON_HOURS / hours_left`, capped.
const DEADLINE_URGENCY_HORIZON_HOURS: f64 = 48.0;
const ENERGY_FIT_BONUS: f64 = 3.0;
/// Energy points of deficit per point of alignment penalty.
const ENERGY_DEFICIT_SCALE: f64 = 25.0;

/// Where duration/energy estimates come from.
pub trait EstimateSource {
    fn duration_for(&self, category: Category, fallback: u32) -> u32;
    fn energy_for(&self, category: Category, fallback: u8) -> u8;
}

/// Uses each task's own estimates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEstimates;

impl EstimateSource for RawEstimates {
    fn duration_for(&self, _category: Category, fallback: u32) -> u32 {
        fallback
    }

    fn energy_for(&self, _category: Category, fallback: u8) -> u8 {
        fallback
    }
}

impl EstimateSource for RecommendationEngine {
    fn duration_for(&self, category: Category, fallback: u32) -> u32 {
        self.estimate_duration(category, fallback)
    }

    fn energy_for(&self, category: Category, fallback: u8) -> u8 {
        self.estimate_energy(category, fallback)
    }
}

impl<T: EstimateSource + ?Sized> EstimateSource for &T {
    fn duration_for(&self, category: Category, fallback: u32) -> u32 {
        (**self).duration_for(category, fallback)
    }

    fn energy_for(&self, category: Category, fallback: u8) -> u8 {
        (**self).energy_for(category, fallback)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// A slot qualifies when its average energy >= required x tolerance.
    pub energy_tolerance: f64,
    /// Continuous task work longer than this earns a break.
    pub break_after_minutes: i64,
    pub break_minutes: i64,
    /// Candidate start granularity inside a free interval.
    pub slot_step_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            energy_tolerance: 0.9,
            break_after_minutes: 90,
            break_minutes: 15,
            slot_step_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnscheduledReason {
    NoAvailableSlot,
}

/// A task left pending by this run; it stays eligible for the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnscheduledTask {
    pub task: Task,
    pub reason: UnscheduledReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleWarning {
    /// External block with end <= start.
    InvalidExternalBlock { title: String },
    /// External block overlapping an earlier accepted one.
    OverlappingExternalBlock { title: String, conflicts_with: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleOutcome {
    pub schedule: Schedule,
    pub unscheduled: Vec<UnscheduledTask>,
    pub warnings: Vec<ScheduleWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    External,
    Task,
    Break,
}

/// Occupied minutes, as offsets from the window start.
#[derive(Debug, Clone, Copy)]
struct Reserved {
    start: i64,
    end: i64,
    slot: Slot,
}

#[derive(Debug, Clone)]
struct Candidate<'t> {
    task: &'t Task,
    duration: i64,
    energy: u8,
    score: f64,
}

/// Minute-resolution view of one work window.
struct Timeline<'p> {
    origin: DateTime<Utc>,
    horizon: i64,
    window: WorkWindow,
    profile: &'p EnergyProfile,
    reserved: Vec<Reserved>,
}

impl<'p> Timeline<'p> {
    fn at(&self, offset: i64) -> DateTime<Utc> {
        self.origin + Duration::minutes(offset)
    }

    fn reserve(&mut self, start: i64, end: i64, slot: Slot) {
        self.reserved.push(Reserved { start, end, slot });
        self.reserved.sort_by_key(|r| (r.start, r.end));
    }

    fn free_intervals(&self) -> Vec<(i64, i64)> {
        let mut out = Vec::new();
        let mut cursor = 0;
        for r in &self.reserved {
            if r.start > cursor {
                out.push((cursor, r.start));
            }
            cursor = cursor.max(r.end);
        }
        if cursor < self.horizon {
            out.push((cursor, self.horizon));
        }
        out
    }

    /// Highest hourly energy touching any free minute.
    fn best_free_energy(&self) -> Option<u8> {
        let mut best: Option<u8> = None;
        for (a, b) in self.free_intervals() {
            let mut cursor = a;
            while cursor < b {
                let local = self.at(cursor).with_timezone(&self.window.tz);
                let e = self.profile.energy_at(local.hour() as u8);
                best = Some(best.map_or(e, |x| x.max(e)));
                cursor += 60 - i64::from(local.minute());
            }
        }
        best
    }

    fn average_energy(&self, start: i64, end: i64) -> f64 {
        self.profile
            .average_energy(self.at(start), self.at(end), self.window.tz)
    }

    fn find_slot(&self, duration: i64, threshold: f64, step: i64) -> Option<i64> {
        let step = step.max(1);
        for (a, b) in self.free_intervals() {
            if b - a < duration {
                continue;
            }
            let tail = b - duration;
            let mut s = a;
            loop {
                if self.average_energy(s, s + duration) >= threshold {
                    return Some(s);
                }
                if s == tail {
                    break;
                }
                s = (s + step).min(tail);
            }
        }
        None
    }

    /// Contiguous run of task slots containing `[start, end)`.
    fn task_run(&self, start: i64, end: i64) -> (i64, i64) {
        let (mut run_start, mut run_end) = (start, end);
        while let Some(r) = self
            .reserved
            .iter()
            .find(|r| r.slot == Slot::Task && r.end == run_start)
        {
            run_start = r.start;
        }
        while let Some(r) = self
            .reserved
            .iter()
            .find(|r| r.slot == Slot::Task && r.start == run_end)
        {
            run_end = r.end;
        }
        (run_start, run_end)
    }

    /// Free minutes starting exactly at `offset`.
    fn free_run_at(&self, offset: i64) -> i64 {
        self.free_intervals()
            .into_iter()
            .find(|(a, b)| *a <= offset && offset < *b)
            .map_or(0, |(_, b)| b - offset)
    }
}

#[derive(Debug, Clone)]
pub struct DynamicScheduler<E: EstimateSource = RawEstimates> {
    config: SchedulerConfig,
    estimates: E,
}

impl DynamicScheduler<RawEstimates> {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            estimates: RawEstimates,
        }
    }
}

impl<E: EstimateSource> DynamicScheduler<E> {
    pub fn with_estimates(config: SchedulerConfig, estimates: E) -> Self {
        Self { config, estimates }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Build a day schedule. Completed tasks are ignored.
    pub fn schedule(
        &self,
        tasks: &[Task],
        external: &[ExternalBlock],
        profile: &EnergyProfile,
        window: &WorkWindow,
    ) -> Result<ScheduleOutcome> {
        let origin = window.start_utc()?;
        let horizon = (window.end_utc()? - origin).num_minutes();
        let mut timeline = Timeline {
            origin,
            horizon,
            window: *window,
            profile,
            reserved: Vec::new(),
        };

        let mut blocks = Vec::new();
        let warnings = place_external(external, &mut timeline, &mut blocks);

        let best_free = timeline.best_free_energy();
        let mut candidates: Vec<Candidate<'_>> = tasks
            .iter()
            .filter(|t| !t.is_completed())
            .map(|task| {
                let duration = i64::from(
                    self.estimates
                        .duration_for(task.category, task.estimated_duration)
                        .max(1),
                );
                let energy = self.estimates.energy_for(task.category, task.energy_required);
                let score = placement_score(task, energy, best_free, origin, self.config.energy_tolerance);
                Candidate {
                    task,
                    duration,
                    energy,
                    score,
                }
            })
            .collect();
        candidates.sort_by(compare_candidates);

        let mut unscheduled = Vec::new();
        for c in candidates {
            let threshold = f64::from(c.energy) * self.config.energy_tolerance;
            let Some(start) = timeline.find_slot(c.duration, threshold, self.config.slot_step_minutes)
            else {
                debug!(task_id = %c.task.id, minutes = c.duration, "no slot available");
                unscheduled.push(UnscheduledTask {
                    task: c.task.clone(),
                    reason: UnscheduledReason::NoAvailableSlot,
                });
                continue;
            };

            let end = start + c.duration;
            timeline.reserve(start, end, Slot::Task);
            blocks.push(TimeBlock::for_task(
                timeline.at(start),
                timeline.at(end),
                c.task.id.clone(),
                c.task.title.clone(),
                c.energy,
            ));
            debug!(task_id = %c.task.id, score = c.score, start = %timeline.at(start), "placed task");

            if let Some(b) = self.maybe_break(&mut timeline, start, end) {
                blocks.push(b);
            }
        }

        let schedule = Schedule::new(window.date, blocks);
        let check = schedule.validate();
        if let Err(e) = &check {
            error!(error = %e, "generated schedule violates block invariants");
        }
        debug_assert!(check.is_ok(), "generated schedule invalid: {check:?}");

        Ok(ScheduleOutcome {
            schedule,
            unscheduled,
            warnings,
        })
    }

    fn maybe_break(&self, timeline: &mut Timeline<'_>, start: i64, end: i64) -> Option<TimeBlock> {
        let (run_start, run_end) = timeline.task_run(start, end);
        if run_end - run_start <= self.config.break_after_minutes {
            return None;
        }
        let len = timeline.free_run_at(run_end).min(self.config.break_minutes);
        if len <= 0 {
            return None;
        }
        timeline.reserve(run_end, run_end + len, Slot::Break);
        Some(TimeBlock::new(
            timeline.at(run_end),
            timeline.at(run_end + len),
            BlockType::Break,
            "Break",
            BlockOrigin::Generated,
        ))
    }
}

fn place_external(
    external: &[ExternalBlock],
    timeline: &mut Timeline<'_>,
    blocks: &mut Vec<TimeBlock>,
) -> Vec<ScheduleWarning> {
    let mut sorted: Vec<&ExternalBlock> = external.iter().collect();
    sorted.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| a.end.cmp(&b.end))
            .then_with(|| a.title.cmp(&b.title))
    });

    let mut warnings = Vec::new();
    let mut accepted: Vec<TimeBlock> = Vec::new();
    for ext in sorted {
        if ext.end <= ext.start {
            warnings.push(ScheduleWarning::InvalidExternalBlock {
                title: ext.title.clone(),
            });
            continue;
        }
        let block = TimeBlock::from_external(ext);
        if let Some(other) = accepted.iter().find(|b| b.overlaps(&block)) {
            warnings.push(ScheduleWarning::OverlappingExternalBlock {
                title: ext.title.clone(),
                conflicts_with: other.title.clone(),
            });
            continue;
        }

        let s = (ext.start - timeline.origin).num_minutes().max(0);
        let e = (ext.end - timeline.origin).num_minutes().min(timeline.horizon);
        if s < e {
            timeline.reserve(s, e, Slot::External);
        }
        accepted.push(block);
    }
    blocks.extend(accepted);
    warnings
}

/// `2 x priority_weight + energy_alignment_weight + deadline_urgency_weight`.
///
/// `best_free_energy` is the highest energy available in any free slot of the window.
pub fn placement_score(
    task: &Task,
    energy_required: u8,
    best_free_energy: Option<u8>,
    reference: DateTime<Utc>,
    tolerance: f64,
) -> f64 {
    let priority = 2.0 * f64::from(task.priority.weight());

    let required = f64::from(energy_required);
    let best = best_free_energy.map_or(0.0, f64::from);
    let alignment = if best >= required * tolerance {
        ENERGY_FIT_BONUS
    } else {
        -((required - best) / ENERGY_DEFICIT_SCALE)
    };

    priority + alignment + deadline_urgency(task.deadline, reference)
}

/// 0 without a deadline; grows as `1 / hours_left`; saturates when due or overdue.
pub fn deadline_urgency(deadline: Option<DateTime<Utc>>, reference: DateTime<Utc>) -> f64 {
    let Some(deadline) = deadline else {
        return 0.0;
    };
    let hours_left = (deadline - reference).num_minutes() as f64 / 60.0;
    if hours_left <= 0.0 {
        return MAX_DEADLINE_URGENCY;
    }
    (DEADLINE_URGENCY_HORIZON_HOURS / hours_left).min(MAX_DEADLINE_URGENCY)
}

fn compare_candidates(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| match (a.task.deadline, b.task.deadline) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.task.id.cmp(&b.task.id))
}
