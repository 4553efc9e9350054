//! Error taxonomy for cadence-core.
//!
//! Validation errors are raised at the boundary (task creation, proposal
//! intake, configuration). Scheduling never fails because a task does not fit;
//! that outcome is reported through `UnscheduledReason` instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Estimated duration must be a positive number of minutes.
    #[error("invalid duration for task '{task_id}': {minutes} minutes (must be > 0)")]
    InvalidDuration { task_id: String, minutes: i64 },

    /// Energy values live on a 0..=100 scale.
    #[error("invalid energy value {value} (must be within 0..=100)")]
    InvalidEnergy { value: i64 },

    #[error("invalid satisfaction {value} (must be within 1..=10)")]
    InvalidSatisfaction { value: i64 },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task already exists: {0}")]
    DuplicateTask(String),

    #[error("task already completed: {0}")]
    AlreadyCompleted(String),

    #[error("invalid work window: {0}")]
    InvalidWorkWindow(String),

    #[error("invalid energy pattern: {0}")]
    InvalidEnergyPattern(String),

    #[error("invalid task proposal: {0}")]
    InvalidProposal(String),

    /// Calendar adapters surface this as a warning; it never aborts scheduling.
    #[error("external calendar sync failed: {0}")]
    ExternalSyncFailure(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("invalid local datetime '{input}': {reason}")]
    InvalidDateTime { input: String, reason: String },
}

/// Validate a 0..=100 energy value coming from outside the core.
pub fn check_energy(value: i64) -> Result<u8> {
    if (0..=100).contains(&value) {
        Ok(value as u8)
    } else {
        Err(CoreError::InvalidEnergy { value })
    }
}

/// Validate a 1..=10 satisfaction rating.
pub fn check_satisfaction(value: i64) -> Result<u8> {
    if (1..=10).contains(&value) {
        Ok(value as u8)
    } else {
        Err(CoreError::InvalidSatisfaction { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_bounds() {
        assert_eq!(check_energy(0), Ok(0));
        assert_eq!(check_energy(100), Ok(100));
        assert_eq!(check_energy(101), Err(CoreError::InvalidEnergy { value: 101 }));
        assert!(check_energy(-1).is_err());
    }

    #[test]
    fn satisfaction_bounds() {
        assert!(check_satisfaction(0).is_err());
        assert_eq!(check_satisfaction(10), Ok(10));
    }

    #[test]
    fn messages_name_the_task() {
        let e = CoreError::InvalidDuration {
            task_id: "t1".into(),
            minutes: 0,
        };
        assert!(e.to_string().contains("t1"));
    }
}
