use anyhow::{Context, Result};
use cadence_core::{ExternalBlock, HistoryEntry, RecommendationEngine, Schedule, Task, TaskBook};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub fn cadence_home() -> Result<PathBuf> {
    resolve_home(
        std::env::var("CADENCE_HOME").ok(),
        std::env::var("HOME").ok(),
    )
}

/// `CADENCE_HOME` wins; otherwise `$HOME/.cadence`.
fn resolve_home(cadence_home: Option<String>, home: Option<String>) -> Result<PathBuf> {
    if let Some(dir) = cadence_home.filter(|s| !s.trim().is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = home.context("HOME is not set (or set CADENCE_HOME)")?;
    Ok(PathBuf::from(home).join(".cadence"))
}

pub fn ensure_cadence_home() -> Result<PathBuf> {
    let dir = cadence_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn state_path() -> Result<PathBuf> {
    Ok(ensure_cadence_home()?.join("state.json"))
}

/// Everything the CLI persists between invocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub external_blocks: Vec<ExternalBlock>,
    #[serde(default)]
    pub last_schedule: Option<Schedule>,
}

impl AppState {
    pub fn book(&self) -> Result<TaskBook> {
        TaskBook::from_tasks(self.tasks.clone()).context("stored task list is invalid")
    }

    pub fn set_book(&mut self, book: TaskBook) {
        self.tasks = book.into_tasks();
    }

    pub fn engine(&self) -> RecommendationEngine {
        RecommendationEngine::from_history(self.history.clone())
    }
}

pub fn load_state(path: &Path) -> Result<AppState> {
    if !path.exists() {
        return Ok(AppState::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

/// Write via a sibling temp file so a crash never leaves half a document.
pub fn save_state(path: &Path, state: &AppState) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Category, CompletionFeedback, Priority};
    use chrono::{TimeZone, Utc};

    #[test]
    fn home_prefers_override() {
        let p = resolve_home(Some("/tmp/cad".into()), Some("/home/u".into())).unwrap();
        assert_eq!(p, PathBuf::from("/tmp/cad"));
        let p = resolve_home(None, Some("/home/u".into())).unwrap();
        assert_eq!(p, PathBuf::from("/home/u/.cadence"));
        assert!(resolve_home(None, None).is_err());
    }

    #[test]
    fn missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_state(&dir.path().join("state.json")).unwrap();
        assert_eq!(s, AppState::default());
    }

    #[test]
    fn state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut book = TaskBook::new();
        book.add(
            Task::new("t1", "plan sprint")
                .with_priority(Priority::High)
                .with_category(Category::DeepWork),
        )
        .unwrap();
        book.add(Task::new("t2", "email")).unwrap();
        let done_at = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let entry = book.complete("t2", CompletionFeedback::default(), done_at).unwrap();

        let mut state = AppState::default();
        state.set_book(book);
        state.history.push(entry);
        save_state(&path, &state).unwrap();

        let loaded = load_state(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.book().unwrap().pending().len(), 1);
        assert_eq!(loaded.engine().history().len(), 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(load_state(&path).is_err());
    }
}
