//! Job records and the registry that holds them.
//!
//! The registry is the only state shared between jobs. Records live in a
//! `RwLock`-protected map and, when a manifest directory is configured, are
//! also written as `<job_id>.json` so a later process can pick a job up again.

use chrono::{DateTime, NaiveDate, Utc};
use orbita_algorithms::temporal::CropType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::export::{ExportTask, JobFolders};
use crate::kpi::KpiRecord;
use crate::zonation::ZoneSummary;

/// Checks that `job_id` can name folders, task descriptions and record files.
pub fn validate_job_id(job_id: &str) -> Result<()> {
    if job_id.trim().is_empty() {
        return Err(EngineError::InvalidRequest("job_id is empty".into()));
    }
    if job_id.contains(['/', '\\']) {
        return Err(EngineError::InvalidRequest(format!(
            "job_id '{job_id}' contains a path separator"
        )));
    }
    if job_id == "." || job_id == ".." {
        return Err(EngineError::InvalidRequest(format!(
            "job_id '{job_id}' is not a valid name"
        )));
    }
    Ok(())
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Dates and crop of an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub crop: CropType,
}

/// Everything known about one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub window: AnalysisWindow,
    /// Closed ring of the resolved ROI, empty until it resolves
    #[serde(default)]
    pub roi: Vec<[f64; 2]>,
    #[serde(default)]
    pub kpis: Option<KpiRecord>,
    #[serde(default)]
    pub zones: Option<Vec<ZoneSummary>>,
    #[serde(default)]
    pub vra_error: Option<String>,
    #[serde(default)]
    pub manifest: Vec<ExportTask>,
    #[serde(default)]
    pub folders: Option<JobFolders>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_id: &str, window: AnalysisWindow) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Pending,
            window,
            roi: Vec::new(),
            kpis: None,
            zones: None,
            vra_error: None,
            manifest: Vec::new(),
            folders: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(reason.into());
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Shared job store, optionally mirrored to a directory
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Job>>,
    store_dir: Option<PathBuf>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that writes every update to `<dir>/<job_id>.json`
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            store_dir: Some(dir.into()),
        }
    }

    pub fn store_dir(&self) -> Option<&Path> {
        self.store_dir.as_deref()
    }

    /// Snapshot of a job, loading it from disk if this process has not seen it
    pub fn get(&self, job_id: &str) -> Option<Job> {
        {
            let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(job) = jobs.get(job_id) {
                return Some(job.clone());
            }
        }
        let job = self.load(job_id)?;
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        Some(jobs.entry(job_id.to_string()).or_insert(job).clone())
    }

    /// Insert or replace a job
    pub fn upsert(&self, mut job: Job) {
        job.updated_at = Utc::now();
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&job);
        jobs.insert(job.job_id.clone(), job);
    }

    /// Apply `f` to a stored job; returns the updated snapshot.
    ///
    /// The write lock is held from read to write-back, so concurrent updates
    /// of the same job are applied one after the other.
    pub fn update<F>(&self, job_id: &str, f: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if !jobs.contains_key(job_id) {
            let loaded = self.load(job_id)?;
            jobs.insert(job_id.to_string(), loaded);
        }
        let job = jobs.get_mut(job_id)?;
        f(job);
        job.updated_at = Utc::now();
        self.persist(job);
        Some(job.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn path_for(&self, job_id: &str) -> Option<PathBuf> {
        let dir = self.store_dir.as_ref()?;
        if let Err(e) = validate_job_id(job_id) {
            warn!(job_id, error = %e, "job record not stored");
            return None;
        }
        Some(dir.join(format!("{job_id}.json")))
    }

    fn persist(&self, job: &Job) {
        let Some(path) = self.path_for(&job.job_id) else {
            return;
        };
        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| {
                let bytes = serde_json::to_vec_pretty(job).map_err(std::io::Error::other)?;
                fs::write(&path, bytes)
            });
        match written {
            Ok(()) => debug!(job_id = %job.job_id, path = %path.display(), "job persisted"),
            Err(e) => warn!(job_id = %job.job_id, error = %e, "could not persist job record"),
        }
    }

    fn load(&self, job_id: &str) -> Option<Job> {
        let path = self.path_for(job_id)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(job_id, error = %e, "could not read job record");
                return None;
            }
        };
        match serde_json::from_slice::<Job>(&bytes) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!(job_id, error = %e, "ignoring malformed job record");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> AnalysisWindow {
        AnalysisWindow {
            start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            crop: CropType::Olive,
        }
    }

    #[test]
    fn update_changes_the_stored_record() {
        let registry = JobRegistry::new();
        registry.upsert(Job::new("j1", window()));
        let job = registry
            .update("j1", |job| job.status = JobStatus::Processing)
            .unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(registry.get("j1").unwrap().status, JobStatus::Processing);
        assert!(registry.update("missing", |_| {}).is_none());
    }

    #[test]
    fn persisted_jobs_survive_a_new_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = JobRegistry::persistent(dir.path());
        let mut job = Job::new("j2", window());
        job.fail("no imagery: 0 scenes");
        registry.upsert(job);
        assert!(dir.path().join("j2.json").exists());

        let fresh = JobRegistry::persistent(dir.path());
        assert!(fresh.is_empty());
        let loaded = fresh.get("j2").unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert_eq!(loaded.window.crop, CropType::Olive);
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let registry = std::sync::Arc::new(JobRegistry::new());
        registry.upsert(Job::new("j3", window()));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        registry.update("j3", |job| job.roi.push([t as f64, i as f64]));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.get("j3").unwrap().roi.len(), 400);
    }

    #[test]
    fn job_ids_cannot_leave_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("jobs");
        let registry = JobRegistry::persistent(&store);

        registry.upsert(Job::new("../escape", window()));
        assert!(!dir.path().join("escape.json").exists());
        assert!(!store.join("../escape.json").exists());

        fs::write(dir.path().join("outside.json"), b"{}").unwrap();
        assert!(registry.get("../outside").is_none());

        assert!(validate_job_id("job-7").is_ok());
        for bad in ["", "  ", "a/b", "a\\b", "..", "."] {
            assert!(matches!(validate_job_id(bad), Err(EngineError::InvalidRequest(_))), "{bad:?}");
        }
    }

    #[test]
    fn malformed_record_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), b"{not json").unwrap();
        let registry = JobRegistry::persistent(dir.path());
        assert!(registry.get("bad").is_none());
    }
}
