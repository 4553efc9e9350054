use anyhow::{Context, Result};
use cadence_core::{parse_timezone, EnergyPoint, EnergyProfile, SchedulerConfig, ScoreWeights};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_cadence_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub schedule: ScheduleSection,
    #[serde(default)]
    pub scoring: ScoringSection,
    #[serde(default)]
    pub energy: EnergySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// "openai" or "anthropic".
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    /// IANA timezone for work hours and deadlines.
    pub timezone: String,
    pub work_start_hour: u32,
    pub work_end_hour: u32,
    pub break_after_minutes: i64,
    pub break_minutes: i64,
    pub energy_tolerance: f64,
    pub sleep_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    pub productivity_weight: f64,
    pub health_weight: f64,
}

/// Custom energy curve; the built-in circadian curve is used when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergySection {
    pub points: Vec<EnergyPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com".to_string(),
            temperature: 0.4,
        }
    }
}

impl Default for ScheduleSection {
    fn default() -> Self {
        let sched = SchedulerConfig::default();
        Self {
            timezone: "America/Chicago".to_string(),
            work_start_hour: 9,
            work_end_hour: 17,
            break_after_minutes: sched.break_after_minutes,
            break_minutes: sched.break_minutes,
            energy_tolerance: sched.energy_tolerance,
            sleep_hours: 8.0,
        }
    }
}

impl Default for ScoringSection {
    fn default() -> Self {
        let w = ScoreWeights::default();
        Self {
            productivity_weight: w.productivity,
            health_weight: w.health,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.schedule.timezone).context("config [schedule].timezone")
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            energy_tolerance: self.schedule.energy_tolerance,
            break_after_minutes: self.schedule.break_after_minutes,
            break_minutes: self.schedule.break_minutes,
            ..SchedulerConfig::default()
        }
    }

    pub fn weights(&self) -> ScoreWeights {
        ScoreWeights {
            productivity: self.scoring.productivity_weight,
            health: self.scoring.health_weight,
        }
    }

    pub fn energy_profile(&self) -> Result<EnergyProfile> {
        if self.energy.points.is_empty() {
            return Ok(EnergyProfile::default());
        }
        EnergyProfile::from_points(&self.energy.points).context("config [energy].points")
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_cadence_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(p: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&p, &Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        save_config(&p, &Config::default()).unwrap();
        assert_eq!(load_config_from(&p).unwrap(), Config::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        fs::write(
            &p,
            "[schedule]\ntimezone = \"Europe/Berlin\"\nwork_start_hour = 8\n\n[energy]\npoints = [{ hour = 9, energy = 60 }]\n",
        )
        .unwrap();
        let cfg = load_config_from(&p).unwrap();
        assert_eq!(cfg.schedule.work_start_hour, 8);
        assert_eq!(cfg.schedule.work_end_hour, 17);
        assert_eq!(cfg.timezone().unwrap(), chrono_tz::Europe::Berlin);
        assert_eq!(cfg.energy_profile().unwrap().energy_at(14), 60);
        assert_eq!(cfg.llm, LlmSection::default());
        assert_eq!(cfg.scheduler().slot_step_minutes, 15);
    }

    #[test]
    fn bad_timezone_is_reported() {
        let mut cfg = Config::default();
        cfg.schedule.timezone = "Nowhere/Special".into();
        assert!(cfg.timezone().is_err());
    }
}
