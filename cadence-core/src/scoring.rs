//! Productivity and health scoring.
//!
//! Pure functions over day statistics; `score_schedule` derives those
//! statistics from a built `Schedule`.

use chrono::Timelike;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::energy::EnergyProfile;
use crate::schedule::{BlockType, Schedule, ScheduleScores};

/// Roughly one break per this many hours worked.
const HOURS_PER_BREAK: f64 = 1.5;

/// Combination policy for the overall score.
///
/// Default is an equal-weight average of productivity and health.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub productivity: f64,
    pub health: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            productivity: 0.5,
            health: 0.5,
        }
    }
}

/// Day facts the schedule itself does not carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayContext {
    pub sleep_hours: f64,
    pub tz: Tz,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// `min(100, round(completion_rate * 100 + avg_alignment * 20))`; 0 when `total == 0`.
pub fn productivity_score(completed: usize, total: usize, avg_energy_alignment: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = completed as f64 / total as f64;
    (rate * 100.0 + avg_energy_alignment * 20.0).round().clamp(0.0, 100.0)
}

pub fn sleep_score(sleep_hours: f64) -> f64 {
    if (7.0..=9.0).contains(&sleep_hours) {
        40.0
    } else if (6.0..=10.0).contains(&sleep_hours) {
        30.0
    } else {
        (40.0 - 5.0 * (sleep_hours - 8.0).abs()).max(0.0)
    }
}

pub fn break_score(break_count: usize, work_hours: f64) -> f64 {
    let optimal = ((work_hours / HOURS_PER_BREAK).floor() as usize).max(1);
    (break_count as f64 / optimal as f64 * 30.0).min(30.0)
}

pub fn balance_score(work_hours: f64) -> f64 {
    if work_hours <= 8.0 {
        30.0
    } else {
        (30.0 - 3.0 * (work_hours - 8.0)).max(0.0)
    }
}

/// Sleep (40) + breaks (30) + work/life balance (30), one decimal.
pub fn health_score(sleep_hours: f64, break_count: usize, work_hours: f64) -> f64 {
    let total = sleep_score(sleep_hours) + break_score(break_count, work_hours) + balance_score(work_hours);
    round1(total).min(100.0)
}

/// How well `required_energy` fits the energy available at `scheduled_hour`, in 0..=1.
///
/// A surplus costs 1 point per 100; a deficit costs 1 point per 50.
pub fn energy_alignment(scheduled_hour: u8, required_energy: u8, profile: &EnergyProfile) -> f64 {
    let available = f64::from(profile.energy_at(scheduled_hour));
    let required = f64::from(required_energy);
    if available >= required {
        (1.0 - (available - required) / 100.0).min(1.0)
    } else {
        (1.0 - (required - available) / 50.0).max(0.0)
    }
}

pub fn overall_score(productivity: f64, health: f64, weights: ScoreWeights) -> f64 {
    let sum = weights.productivity + weights.health;
    let (wp, wh) = if sum > 0.0 {
        (weights.productivity / sum, weights.health / sum)
    } else {
        (0.5, 0.5)
    };
    round1(productivity * wp + health * wh).clamp(0.0, 100.0)
}

/// Score a built schedule.
///
/// Task blocks provide completion and energy alignment; break blocks count as
/// breaks; task and meeting minutes count as work.
pub fn score_schedule(
    schedule: &Schedule,
    profile: &EnergyProfile,
    day: DayContext,
    weights: ScoreWeights,
) -> ScheduleScores {
    let mut total = 0usize;
    let mut completed = 0usize;
    let mut alignment_sum = 0.0;
    for b in schedule.task_blocks() {
        total += 1;
        if b.completed {
            completed += 1;
        }
        let hour = b.start.with_timezone(&day.tz).hour() as u8;
        alignment_sum += energy_alignment(hour, b.energy_required.unwrap_or(0), profile);
    }
    let avg_alignment = if total == 0 {
        0.0
    } else {
        alignment_sum / total as f64
    };

    let work_minutes: i64 = schedule
        .blocks
        .iter()
        .filter(|b| matches!(b.kind, BlockType::Task | BlockType::Meeting))
        .map(|b| b.duration)
        .sum();
    let work_hours = work_minutes as f64 / 60.0;

    let productivity = productivity_score(completed, total, avg_alignment);
    let health = health_score(day.sleep_hours, schedule.count_kind(BlockType::Break), work_hours);

    ScheduleScores {
        productivity,
        health,
        overall: overall_score(productivity, health, weights),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{BlockOrigin, TimeBlock};
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn productivity_empty_day_is_zero() {
        for x in [0.0, 0.5, 1.0] {
            assert_eq!(productivity_score(0, 0, x), 0.0);
        }
    }

    #[test]
    fn productivity_eight_of_ten() {
        assert_eq!(productivity_score(8, 10, 0.8), 96.0);
    }

    #[test]
    fn productivity_caps_at_100() {
        assert_eq!(productivity_score(10, 10, 1.0), 100.0);
    }

    #[test]
    fn health_example_day() {
        assert_eq!(sleep_score(8.0), 40.0);
        assert_eq!(break_score(3, 9.0), 15.0);
        assert_eq!(balance_score(9.0), 27.0);
        assert_eq!(health_score(8.0, 3, 9.0), 82.0);
    }

    #[test]
    fn sleep_bands() {
        assert_eq!(sleep_score(6.5), 30.0);
        assert_eq!(sleep_score(10.0), 30.0);
        assert_eq!(sleep_score(4.0), 20.0);
        assert_eq!(sleep_score(12.0), 20.0);
        assert_eq!(sleep_score(0.0), 0.0);
    }

    #[test]
    fn short_days_need_one_break() {
        assert_eq!(break_score(0, 1.0), 0.0);
        assert_eq!(break_score(1, 1.0), 30.0);
        assert_eq!(break_score(5, 3.0), 30.0);
    }

    #[test]
    fn alignment_is_one_at_exact_match() {
        let p = EnergyProfile::default();
        assert_eq!(energy_alignment(10, 90, &p), 1.0);
    }

    #[test]
    fn alignment_decreases_with_gap() {
        let p = EnergyProfile::default();
        // hour 10 -> 90 available
        let surplus: Vec<f64> = [90u8, 80, 60, 30, 0].iter().map(|&r| energy_alignment(10, r, &p)).collect();
        assert!(surplus.windows(2).all(|w| w[0] > w[1]));

        let p2 = EnergyProfile::default();
        // hour 14 -> 50 available
        let deficit: Vec<f64> = [50u8, 60, 80, 100].iter().map(|&r| energy_alignment(14, r, &p2)).collect();
        assert!(deficit.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(energy_alignment(14, 100, &p2), 0.0);
    }

    #[test]
    fn deficit_penalty_is_steeper() {
        let p = EnergyProfile::default();
        let surplus_10 = energy_alignment(10, 80, &p);
        let deficit_10 = energy_alignment(14, 60, &p);
        assert!(deficit_10 < surplus_10);
    }

    #[test]
    fn overall_default_is_average() {
        assert_eq!(overall_score(96.0, 82.0, ScoreWeights::default()), 89.0);
        let w = ScoreWeights {
            productivity: 3.0,
            health: 1.0,
        };
        assert_eq!(overall_score(100.0, 0.0, w), 75.0);
        let zero = ScoreWeights {
            productivity: 0.0,
            health: 0.0,
        };
        assert_eq!(overall_score(80.0, 60.0, zero), 70.0);
    }

    #[test]
    fn scores_a_schedule() {
        let t = |h: u32| Utc.with_ymd_and_hms(2026, 3, 2, h, 0, 0).unwrap();
        let mut done = TimeBlock::for_task(t(9), t(10), "a", "focus", 85);
        done.completed = true;
        let open = TimeBlock::for_task(t(10), t(11), "b", "focus 2", 90);
        let brk = TimeBlock::new(t(11), t(12), BlockType::Break, "Break", BlockOrigin::Generated);
        let schedule = Schedule::new(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), vec![done, open, brk]);

        let scores = score_schedule(
            &schedule,
            &EnergyProfile::default(),
            DayContext {
                sleep_hours: 8.0,
                tz: Tz::UTC,
            },
            ScoreWeights::default(),
        );

        // 1/2 done, both blocks perfectly aligned -> 50 + 20
        assert_eq!(scores.productivity, 70.0);
        // 2h work: 40 sleep + 30 breaks (1 of 1) + 30 balance
        assert_eq!(scores.health, 100.0);
        assert_eq!(scores.overall, 85.0);
    }
}
