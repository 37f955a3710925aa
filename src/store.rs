use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::Job;

/// Key the job list is stored under.
pub const JOBS_KEY: &str = "job_tracker_jobs";

/// Synchronous blob store keyed by string.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

// --- SQLite backend ---

pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        let store = Self { conn, path: path.to_path_buf() };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobintel") {
            proj_dirs.data_dir().join("jobintel.db")
        } else {
            PathBuf::from("jobintel.db")
        }
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to read key '{}'", key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![key, value],
            )
            .with_context(|| format!("Failed to write key '{}'", key))?;
        Ok(())
    }
}

// --- In-memory backend ---

#[cfg(test)]
use std::{cell::RefCell, collections::HashMap, rc::Rc};

/// Clones share the same map.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// --- Job list adapter ---

/// Persists the whole job list as one JSON array under `JOBS_KEY`.
pub struct RecordStore {
    kv: Box<dyn KeyValueStore>,
}

impl RecordStore {
    pub fn new(kv: Box<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// `Ok(None)` when nothing has been saved yet; an error when the blob is
    /// unreadable or not a JSON array. Records that no longer deserialize are
    /// skipped with a warning so the rest of the list survives.
    pub fn load(&self) -> Result<Option<Vec<Job>>> {
        let Some(raw) = self.kv.get(JOBS_KEY)? else {
            return Ok(None);
        };
        let records: Vec<serde_json::Value> =
            serde_json::from_str(&raw).context("Stored job list is not a JSON array")?;

        let mut jobs = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<Job>(record) {
                Ok(job) => jobs.push(job),
                Err(e) => warn!(index, "Skipping unreadable job record: {}", e),
            }
        }
        Ok(Some(jobs))
    }

    pub fn save(&self, jobs: &[Job]) -> Result<()> {
        let raw = serde_json::to_string(jobs).context("Failed to serialize job list")?;
        self.kv.set(JOBS_KEY, &raw)
    }

    /// The stored blob as-is.
    pub fn raw(&self) -> Result<Option<String>> {
        self.kv.get(JOBS_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;

    fn sample_job(id: &str) -> Job {
        Job {
            id: id.to_string(),
            title: "Head of Product".to_string(),
            company: "Acme".to_string(),
            description: "Lead the roadmap".to_string(),
            status: JobStatus::Draft,
            date_added: "2024-05-01T10:00:00Z".to_string(),
            clarification_answers: None,
            analysis: None,
            market_intel: None,
            artefacts: None,
        }
    }

    #[test]
    fn test_load_returns_none_when_empty() {
        let store = RecordStore::new(Box::new(MemoryStore::new()));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let store = RecordStore::new(Box::new(MemoryStore::new()));
        let jobs = vec![sample_job("a"), sample_job("b")];
        store.save(&jobs).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), jobs);
    }

    #[test]
    fn test_load_malformed_blob_is_error() {
        let kv = MemoryStore::new();
        kv.set(JOBS_KEY, "{not json").unwrap();
        let store = RecordStore::new(Box::new(kv));
        assert!(store.load().is_err());
    }

    #[test]
    fn test_load_keeps_readable_records_when_one_has_drifted() {
        let kv = MemoryStore::new();
        let good = serde_json::to_value(sample_job("good")).unwrap();
        let blob = serde_json::json!([
            good,
            {"id": "old", "title": "Data Lead", "analysis": {"skills_required": ["SQL"]}},
            {"id": "bad", "status": "Archived"},
        ]);
        kv.set(JOBS_KEY, &blob.to_string()).unwrap();

        let jobs = RecordStore::new(Box::new(kv)).load().unwrap().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0], sample_job("good"));
        assert_eq!(jobs[1].id, "old");
        assert_eq!(jobs[1].status, JobStatus::Draft);
        assert_eq!(jobs[1].analysis.as_ref().unwrap().rice_score, 0.0);
    }

    #[test]
    fn test_memory_store_clones_share_entries() {
        let kv = MemoryStore::new();
        let other = kv.clone();
        kv.set("k", "v").unwrap();
        assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_sqlite_store_overwrites_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobintel.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            assert!(store.get(JOBS_KEY).unwrap().is_none());
            store.set(JOBS_KEY, "[]").unwrap();
            store.set(JOBS_KEY, "[1]").unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.path(), &path);
        assert_eq!(reopened.get(JOBS_KEY).unwrap().as_deref(), Some("[1]"));
    }
}
