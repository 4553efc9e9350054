//! User energy curve across the day.
//!
//! A profile maps hour-of-day (0-23) to an energy level (0-100). Lookups never
//! fail: an hour missing from the pattern borrows the nearest defined hour.

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// Hours at or above this energy are suitable for high-focus work.
pub const DEEP_WORK_THRESHOLD: u8 = 70;

/// Default circadian curve: mid-morning peak, post-lunch dip, evening fade.
pub const DEFAULT_CIRCADIAN: [(u8, u8); 18] = [
    (6, 30),
    (7, 50),
    (8, 70),
    (9, 85),
    (10, 90),
    (11, 85),
    (12, 75),
    (13, 60),
    (14, 50),
    (15, 55),
    (16, 70),
    (17, 75),
    (18, 70),
    (19, 60),
    (20, 50),
    (21, 40),
    (22, 30),
    (23, 20),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyPoint {
    pub hour: u8,
    pub energy: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnergyProfile {
    hourly: BTreeMap<u8, u8>,
}

impl Default for EnergyProfile {
    fn default() -> Self {
        Self {
            hourly: DEFAULT_CIRCADIAN.into_iter().collect(),
        }
    }
}

impl EnergyProfile {
    /// Build a profile from caller-provided points.
    ///
    /// Later points for the same hour replace earlier ones.
    pub fn from_points(points: &[EnergyPoint]) -> Result<Self> {
        if points.is_empty() {
            return Err(CoreError::InvalidEnergyPattern(
                "pattern must define at least one hour".into(),
            ));
        }
        let mut hourly = BTreeMap::new();
        for p in points {
            if p.hour > 23 {
                return Err(CoreError::InvalidEnergyPattern(format!(
                    "hour {} is outside 0..=23",
                    p.hour
                )));
            }
            if p.energy > 100 {
                return Err(CoreError::InvalidEnergyPattern(format!(
                    "energy {} at hour {} is outside 0..=100",
                    p.energy, p.hour
                )));
            }
            hourly.insert(p.hour, p.energy);
        }
        Ok(Self { hourly })
    }

    pub fn points(&self) -> Vec<EnergyPoint> {
        self.hourly
            .iter()
            .map(|(&hour, &energy)| EnergyPoint { hour, energy })
            .collect()
    }

    /// Energy at `hour`, or at the nearest defined hour (earlier hour wins ties).
    pub fn energy_at(&self, hour: u8) -> u8 {
        if let Some(&e) = self.hourly.get(&hour) {
            return e;
        }
        let below = self.hourly.range(..hour).next_back();
        let above = self.hourly.range(hour..).next();
        match (below, above) {
            (Some((&bh, &be)), Some((&ah, &ae))) => {
                if hour - bh <= ah - hour {
                    be
                } else {
                    ae
                }
            }
            (Some((_, &e)), None) | (None, Some((_, &e))) => e,
            // from_points and Default both guarantee a non-empty map.
            (None, None) => 0,
        }
    }

    /// Hours whose energy is at least `required`, ascending.
    pub fn find_windows(&self, required: u8) -> Vec<u8> {
        self.hourly
            .iter()
            .filter(|(_, e)| **e >= required)
            .map(|(h, _)| *h)
            .collect()
    }

    /// (hour, energy) with the highest energy; earliest hour on ties.
    pub fn peak(&self) -> (u8, u8) {
        let mut best: Option<(u8, u8)> = None;
        for (&h, &e) in &self.hourly {
            match best {
                Some((_, be)) if be >= e => {}
                _ => best = Some((h, e)),
            }
        }
        best.unwrap_or((0, 0))
    }

    pub fn deep_work_windows(&self) -> Vec<u8> {
        self.find_windows(DEEP_WORK_THRESHOLD)
    }

    /// Minute-weighted average energy over `[start, end)`, using local hours in `tz`.
    pub fn average_energy(&self, start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> f64 {
        let total = (end - start).num_minutes();
        if total <= 0 {
            return self.energy_at(start.with_timezone(&tz).hour() as u8) as f64;
        }

        let mut weighted = 0.0;
        let mut cursor = start;
        while cursor < end {
            let local = cursor.with_timezone(&tz);
            let into_hour = i64::from(local.minute());
            let step = (60 - into_hour).min((end - cursor).num_minutes()).max(1);
            weighted += self.energy_at(local.hour() as u8) as f64 * step as f64;
            cursor += Duration::minutes(step);
        }
        weighted / total as f64
    }

    /// Text bar chart of the defined hours, for terminal output.
    pub fn render_ascii_chart(&self) -> String {
        let (peak_hour, _) = self.peak();
        let mut out = String::new();
        for (&h, &e) in &self.hourly {
            let bar = "#".repeat(usize::from(e) * 30 / 100);
            let mark = if h == peak_hour {
                " <- peak"
            } else if e >= DEEP_WORK_THRESHOLD {
                " deep"
            } else {
                ""
            };
            out.push_str(&format!("{h:02}:00 {bar:<30} {e:>3}{mark}\n"));
        }
        out
    }
}
