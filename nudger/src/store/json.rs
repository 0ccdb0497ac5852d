//! JsonStore - whole-file JSON documents plus an append-only plan history

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{CompanionSnapshot, DailyPlan, UserProfile};
use crate::scheduler::ScheduleConfig;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid user id '{0}'")]
    InvalidUserId(String),
}

/// A record stored as a single JSON file in the user directory
pub trait Document: Serialize + DeserializeOwned {
    /// File name relative to the user directory
    const FILE: &'static str;
}

impl Document for UserProfile {
    const FILE: &'static str = "profile.json";
}

impl Document for CompanionSnapshot {
    const FILE: &'static str = "snapshot.json";
}

impl Document for ScheduleConfig {
    const FILE: &'static str = "schedule.json";
}

const HISTORY_FILE: &str = "plans/history.jsonl";

/// Store rooted at one user's directory
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Open (and create) the directory for `user_id` under `data_dir`
    pub fn open(data_dir: impl AsRef<Path>, user_id: &str) -> Result<Self, StoreError> {
        debug!(data_dir = %data_dir.as_ref().display(), %user_id, "JsonStore::open: called");
        if user_id.is_empty() || user_id.contains(['/', '\\']) || user_id.starts_with('.') {
            return Err(StoreError::InvalidUserId(user_id.to_string()));
        }

        let root = data_dir.as_ref().join("users").join(user_id);
        let plans = root.join("plans");
        fs::create_dir_all(&plans).map_err(|source| StoreError::Io { path: plans, source })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load a document; `Ok(None)` when the file does not exist yet
    pub fn load<T: Document>(&self) -> Result<Option<T>, StoreError> {
        let path = self.root.join(T::FILE);
        debug!(path = %path.display(), "load: called");
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "load: not found");
                return Ok(None);
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    /// Save a document, replacing the file atomically
    pub fn save<T: Document>(&self, record: &T) -> Result<(), StoreError> {
        let path = self.root.join(T::FILE);
        debug!(path = %path.display(), "save: called");
        let json = serde_json::to_string_pretty(record).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })
    }

    /// Append a retired plan to the history file.
    ///
    /// A plan already archived (same date and creation time) is not
    /// appended again, so a retried wrap leaves a single entry.
    pub fn archive_plan(&self, plan: &DailyPlan) -> Result<(), StoreError> {
        let path = self.root.join(HISTORY_FILE);
        debug!(date = %plan.date, path = %path.display(), "archive_plan: called");
        if self
            .read_history()?
            .iter()
            .any(|p| p.date == plan.date && p.created_at == plan.created_at)
        {
            debug!(date = %plan.date, "archive_plan: already archived");
            return Ok(());
        }

        let line = serde_json::to_string(plan).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        writeln!(file, "{}", line).map_err(|source| StoreError::Io { path, source })
    }

    /// Most recent archived plans, newest first
    pub fn plan_history(&self, limit: usize) -> Result<Vec<DailyPlan>, StoreError> {
        debug!(limit, "plan_history: called");
        let mut plans = self.read_history()?;
        plans.reverse();
        plans.truncate(limit);
        Ok(plans)
    }

    /// Every readable history entry, oldest first
    fn read_history(&self) -> Result<Vec<DailyPlan>, StoreError> {
        let path = self.root.join(HISTORY_FILE);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let mut plans = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DailyPlan>(&line) {
                Ok(plan) => plans.push(plan),
                Err(e) => warn!(line = idx + 1, error = %e, "read_history: skipping malformed line"),
            }
        }
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Phase;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(day: u32, h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_open_creates_user_dirs() {
        let temp = tempdir().unwrap();
        let store = JsonStore::open(temp.path(), "alex").unwrap();
        assert!(store.root().join("plans").is_dir());
        assert!(store.root().ends_with("users/alex"));
    }

    #[test]
    fn test_open_rejects_path_like_user_ids() {
        let temp = tempdir().unwrap();
        assert!(matches!(
            JsonStore::open(temp.path(), "../etc"),
            Err(StoreError::InvalidUserId(_))
        ));
        assert!(JsonStore::open(temp.path(), "").is_err());
    }

    #[test]
    fn test_missing_document_loads_none() {
        let temp = tempdir().unwrap();
        let store = JsonStore::open(temp.path(), "alex").unwrap();
        assert!(store.load::<UserProfile>().unwrap().is_none());
        assert!(store.load::<CompanionSnapshot>().unwrap().is_none());
    }

    #[test]
    fn test_profile_save_and_load() {
        let temp = tempdir().unwrap();
        let store = JsonStore::open(temp.path(), "alex").unwrap();
        let mut profile = UserProfile::new("alex", "Alex");
        profile.record_interrupt();
        store.save(&profile).unwrap();

        let loaded: UserProfile = store.load().unwrap().unwrap();
        assert_eq!(loaded.name, "Alex");
        assert_eq!(loaded.summary.interrupts, 1);
        assert!(!store.root().join("profile.json.tmp").exists());
    }

    #[test]
    fn test_snapshot_and_schedule_save_and_load() {
        let temp = tempdir().unwrap();
        let store = JsonStore::open(temp.path(), "alex").unwrap();

        let mut snapshot = CompanionSnapshot::initial(at(4, 7));
        snapshot.phase = Phase::EveningCheckin;
        snapshot.scheduler_enabled = false;
        store.save(&snapshot).unwrap();
        assert_eq!(store.load::<CompanionSnapshot>().unwrap().unwrap(), snapshot);

        let mut schedule = ScheduleConfig::default();
        schedule.set_grace(25).unwrap();
        store.save(&schedule).unwrap();
        assert_eq!(store.load::<ScheduleConfig>().unwrap().unwrap(), schedule);
    }

    #[test]
    fn test_corrupt_document_is_json_error() {
        let temp = tempdir().unwrap();
        let store = JsonStore::open(temp.path(), "alex").unwrap();
        fs::write(store.root().join("snapshot.json"), "{ not json").unwrap();
        assert!(matches!(store.load::<CompanionSnapshot>(), Err(StoreError::Json { .. })));
    }

    #[test]
    fn test_plan_history_newest_first() {
        let temp = tempdir().unwrap();
        let store = JsonStore::open(temp.path(), "alex").unwrap();
        for day in 1..=3 {
            let mut plan = DailyPlan::new(at(day, 7));
            plan.set_content(format!("day {}", day), "test", at(day, 8));
            store.archive_plan(&plan).unwrap();
        }

        let history = store.plan_history(2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "day 3");
        assert_eq!(history[1].content, "day 2");
    }

    #[test]
    fn test_archive_same_plan_twice_keeps_one_entry() {
        let temp = tempdir().unwrap();
        let store = JsonStore::open(temp.path(), "alex").unwrap();
        let mut plan = DailyPlan::new(at(4, 7));
        plan.set_content("walk the dog", "test", at(4, 8));
        store.archive_plan(&plan).unwrap();
        store.archive_plan(&plan).unwrap();

        let mut other = DailyPlan::new(at(5, 7));
        other.set_content("laundry", "test", at(5, 8));
        store.archive_plan(&other).unwrap();

        let history = store.plan_history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "laundry");
        assert_eq!(history[1].content, "walk the dog");
    }

    #[test]
    fn test_plan_history_skips_malformed_lines() {
        let temp = tempdir().unwrap();
        let store = JsonStore::open(temp.path(), "alex").unwrap();
        store.archive_plan(&DailyPlan::new(at(1, 7))).unwrap();
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(store.root().join(HISTORY_FILE))
            .unwrap();
        writeln!(file, "garbage").unwrap();

        assert_eq!(store.plan_history(10).unwrap().len(), 1);
    }
}
